//! Cache Invalidator: the only component that deletes across logical names.

use tracing::info;

use crate::session::identity::SessionIdentity;
use crate::session::keys::{LogicalName, LEGACY_UNPREFIXED_KEYS};
use crate::session::store::NamespacedStore;
use crate::storage::StorageError;

/// What `on_identity_established` found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityTransition {
    /// No identity was recorded on this profile.
    FirstLogin,
    SameIdentity,
    /// A different user was recorded; their namespace has been purged.
    Switched {
        previous: SessionIdentity,
        purged: usize,
    },
}

#[derive(Clone)]
pub struct CacheInvalidator {
    store: NamespacedStore,
}

impl CacheInvalidator {
    pub fn new(store: NamespacedStore) -> Self {
        Self { store }
    }

    /// Runs once per successful authentication, before anything is read for
    /// `new_identity`. Purges the previously recorded user if it differs, then
    /// records `new_identity`.
    pub fn on_identity_established(
        &self,
        new_identity: &SessionIdentity,
    ) -> Result<IdentityTransition, StorageError> {
        let transition = match self.store.identity().recorded_identity() {
            None => IdentityTransition::FirstLogin,
            Some(previous) if &previous == new_identity => IdentityTransition::SameIdentity,
            Some(previous) => {
                let purged = self.store.purge_identity(&previous)?;
                IdentityTransition::Switched { previous, purged }
            }
        };
        self.store.identity().record(new_identity)?;
        info!("Identity established: {new_identity} ({transition:?})");
        Ok(transition)
    }

    /// Ends the current session: drops the signed-in user's canonical document
    /// text and the identity record. Analysis evidence, questions and chat
    /// history stay in the user's namespace.
    pub fn teardown_session(&self) -> Result<(), StorageError> {
        let identity = self.store.current_identity();
        for name in LogicalName::TRANSIENT {
            self.store.remove(name)?;
        }
        self.store.identity().clear()?;
        info!("Session torn down for {identity}");
        Ok(())
    }

    /// Removes every prefixed entry for every identity, the identity record,
    /// and the legacy unprefixed keys.
    pub fn full_reset(&self) -> Result<usize, StorageError> {
        let mut removed = self.store.purge_prefixed()?;
        for key in LEGACY_UNPREFIXED_KEYS {
            if self.store.remove_raw(key)? {
                removed += 1;
            }
        }
        info!("Full cache reset ({removed} keys cleared)");
        Ok(removed)
    }
}
