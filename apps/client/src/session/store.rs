//! Namespaced Store: every read and write is scoped to the current identity.

use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, info, warn};

use crate::session::identity::{IdentityResolver, SessionIdentity};
use crate::session::keys::{namespaced_key, parse_key, LogicalName, KEY_PREFIX};
use crate::storage::{KeyValueStorage, StorageError};

/// Literal some writers leave behind for a missing value. Treated as absent.
pub const UNSET_MARKER: &str = "undefined";

#[derive(Clone)]
pub struct NamespacedStore {
    storage: Arc<dyn KeyValueStorage>,
    identity: IdentityResolver,
}

impl NamespacedStore {
    pub fn new(storage: Arc<dyn KeyValueStorage>) -> Self {
        let identity = IdentityResolver::new(storage.clone());
        Self { storage, identity }
    }

    pub fn identity(&self) -> &IdentityResolver {
        &self.identity
    }

    pub fn current_identity(&self) -> SessionIdentity {
        self.identity.current_identity()
    }

    /// Reads `name` for the current identity, or `fallback` if the entry is
    /// absent, the unset marker, unreadable, or not decodable as `T`.
    pub fn get<T: DeserializeOwned>(&self, name: LogicalName, fallback: T) -> T {
        let key = namespaced_key(name, &self.current_identity());
        let raw = match self.storage.get(&key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return fallback,
            Err(e) => {
                warn!("Failed to read {key}: {e}");
                return fallback;
            }
        };
        if raw.is_empty() || raw == UNSET_MARKER {
            return fallback;
        }
        match serde_json::from_str(&raw) {
            Ok(value) => value,
            Err(e) => {
                debug!("Discarding undecodable entry {key}: {e}");
                fallback
            }
        }
    }

    /// Reads a text entry, treating whitespace-only text as absent.
    pub fn get_text(&self, name: LogicalName) -> Option<String> {
        self.get::<Option<String>>(name, None)
            .filter(|text| !text.trim().is_empty())
    }

    pub fn set<T: Serialize + ?Sized>(
        &self,
        name: LogicalName,
        value: &T,
    ) -> Result<(), StorageError> {
        let key = namespaced_key(name, &self.current_identity());
        let raw = serde_json::to_string(value)?;
        self.storage.set(&key, &raw)
    }

    pub fn remove(&self, name: LogicalName) -> Result<(), StorageError> {
        let key = namespaced_key(name, &self.current_identity());
        self.storage.remove(&key)
    }

    /// Deletes every entry in `identity`'s namespace. Returns how many were removed.
    pub(crate) fn purge_identity(&self, identity: &SessionIdentity) -> Result<usize, StorageError> {
        let doomed: Vec<String> = self
            .storage
            .list_keys()?
            .into_iter()
            .filter(|key| parse_key(key).is_some_and(|parsed| parsed.identity == identity.as_str()))
            .collect();
        for key in &doomed {
            self.storage.remove(key)?;
        }
        info!("Purged {} cache entries for identity {identity}", doomed.len());
        Ok(doomed.len())
    }

    /// Deletes every key carrying the client prefix, whoever owns it.
    pub(crate) fn purge_prefixed(&self) -> Result<usize, StorageError> {
        let doomed: Vec<String> = self
            .storage
            .list_keys()?
            .into_iter()
            .filter(|key| key.starts_with(KEY_PREFIX))
            .collect();
        for key in &doomed {
            self.storage.remove(key)?;
        }
        info!("Purged {} prefixed cache entries", doomed.len());
        Ok(doomed.len())
    }

    /// Removes an unscoped key. Returns whether it existed.
    pub(crate) fn remove_raw(&self, key: &str) -> Result<bool, StorageError> {
        let existed = self.storage.get(key)?.is_some();
        if existed {
            self.storage.remove(key)?;
        }
        Ok(existed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::feedback::Feedback;
    use crate::session::identity::USER_ID_KEY;
    use crate::storage::MemoryStorage;

    fn store() -> (Arc<MemoryStorage>, NamespacedStore) {
        let storage = Arc::new(MemoryStorage::new());
        (storage.clone(), NamespacedStore::new(storage))
    }

    fn sign_in(storage: &MemoryStorage, id: &str) {
        storage.set(USER_ID_KEY, id).unwrap();
    }

    #[test]
    fn test_set_then_get_returns_value() {
        let (storage, store) = store();
        sign_in(&storage, "u1");
        store
            .set(LogicalName::QUESTIONS, &vec!["Q1?".to_string(), "Q2?".to_string()])
            .unwrap();
        let questions: Vec<String> = store.get(LogicalName::QUESTIONS, vec![]);
        assert_eq!(questions, vec!["Q1?", "Q2?"]);
        assert!(storage.get("jm_chatprep_questions::u1").unwrap().is_some());
    }

    #[test]
    fn test_anonymous_session_has_its_own_namespace() {
        let (storage, store) = store();
        store.set(LogicalName::CV_FILE_NAME, "cv.pdf").unwrap();
        assert!(storage
            .get("jm_cvFileName::anon-session")
            .unwrap()
            .is_some());
    }

    #[test]
    fn test_identities_are_isolated() {
        let (storage, store) = store();
        sign_in(&storage, "A");
        store.set(LogicalName::CV_TEXT, "alice's resume").unwrap();

        sign_in(&storage, "B");
        assert_eq!(store.get_text(LogicalName::CV_TEXT), None);
        store.set(LogicalName::CV_TEXT, "bob's resume").unwrap();

        sign_in(&storage, "A");
        assert_eq!(
            store.get_text(LogicalName::CV_TEXT).as_deref(),
            Some("alice's resume")
        );
    }

    #[test]
    fn test_get_is_total_over_garbage() {
        let (storage, store) = store();
        sign_in(&storage, "u1");
        let key = "jm_feedback::u1";
        for raw in ["", "undefined", "{", "null", "42", "\u{0}\u{ff}", "\"text\""] {
            storage.set(key, raw).unwrap();
            let feedback: Option<Feedback> = store.get(LogicalName::FEEDBACK, None);
            assert!(feedback.is_none(), "expected fallback for {raw:?}");
        }
    }

    #[test]
    fn test_wrong_shape_falls_back() {
        let (storage, store) = store();
        sign_in(&storage, "u1");
        storage.set("jm_chatprep_questions::u1", "{\"a\":1}").unwrap();
        let questions: Vec<String> = store.get(LogicalName::QUESTIONS, vec!["fallback".into()]);
        assert_eq!(questions, vec!["fallback"]);
    }

    #[test]
    fn test_remove_only_touches_current_identity() {
        let (storage, store) = store();
        sign_in(&storage, "A");
        store.set(LogicalName::JD_FILE_NAME, "jd.pdf").unwrap();
        sign_in(&storage, "B");
        store.set(LogicalName::JD_FILE_NAME, "jd.pdf").unwrap();
        store.remove(LogicalName::JD_FILE_NAME).unwrap();
        store.remove(LogicalName::JD_FILE_NAME).unwrap();

        assert!(storage.get("jm_jobDescriptionFileName::A").unwrap().is_some());
        assert!(storage.get("jm_jobDescriptionFileName::B").unwrap().is_none());
    }

    #[test]
    fn test_purge_identity_leaves_others_and_unscoped_keys() {
        let (storage, store) = store();
        storage.set("jm_feedback::A", "{}").unwrap();
        storage.set("jm_cvText::A", "\"cv\"").unwrap();
        storage.set("jm_feedback::AB", "{}").unwrap();
        storage.set("jm_feedback::B", "{}").unwrap();
        storage.set("jm_userId", "B").unwrap();
        storage.set("feedback", "{}").unwrap();

        let purged = store
            .purge_identity(&SessionIdentity::new("A").unwrap())
            .unwrap();
        assert_eq!(purged, 2);
        assert_eq!(
            storage.list_keys().unwrap(),
            vec!["feedback", "jm_feedback::AB", "jm_feedback::B", "jm_userId"]
        );
    }

    #[test]
    fn test_purge_prefixed_spares_foreign_keys() {
        let (storage, store) = store();
        storage.set("jm_feedback::A", "{}").unwrap();
        storage.set("jm_userId", "A").unwrap();
        storage.set("jm_jobDescription", "\"legacy\"").unwrap();
        storage.set("theme", "dark").unwrap();

        assert_eq!(store.purge_prefixed().unwrap(), 3);
        assert_eq!(storage.list_keys().unwrap(), vec!["theme"]);
    }
}
