use std::fmt;
use std::sync::Arc;

use tracing::warn;

use crate::models::user::Student;
use crate::storage::{KeyValueStorage, StorageError};

/// Unscoped entry holding the identity of the signed-in user.
pub const USER_ID_KEY: &str = "jm_userId";
/// Identity used when nobody is signed in.
pub const ANONYMOUS_SESSION: &str = "anon-session";

/// Opaque, non-empty identifier of the user whose cache is active.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionIdentity(String);

impl SessionIdentity {
    /// Returns `None` for empty or whitespace-only input.
    pub fn new(raw: impl Into<String>) -> Option<Self> {
        let raw = raw.into();
        if raw.trim().is_empty() {
            None
        } else {
            Some(SessionIdentity(raw))
        }
    }

    pub fn anonymous() -> Self {
        SessionIdentity(ANONYMOUS_SESSION.to_string())
    }

    pub fn is_anonymous(&self) -> bool {
        self.0 == ANONYMOUS_SESSION
    }

    /// Identity for a successful login: the student id, else the student's
    /// email, else the email that was typed. Emails are lower-cased.
    pub fn from_login(student: Option<&Student>, typed_email: &str) -> Option<Self> {
        let from_id = student
            .and_then(|s| s.id.as_deref())
            .and_then(|id| Self::new(id.trim()));
        let from_email = || {
            student
                .and_then(|s| s.email.as_deref())
                .and_then(|email| Self::new(email.trim().to_lowercase()))
        };
        from_id
            .or_else(from_email)
            .or_else(|| Self::new(typed_email.trim().to_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reads (and, for the invalidator, writes) the identity record.
#[derive(Clone)]
pub struct IdentityResolver {
    storage: Arc<dyn KeyValueStorage>,
}

impl IdentityResolver {
    pub fn new(storage: Arc<dyn KeyValueStorage>) -> Self {
        Self { storage }
    }

    /// The active identity, or the anonymous session. Never fails.
    pub fn current_identity(&self) -> SessionIdentity {
        self.recorded_identity()
            .unwrap_or_else(SessionIdentity::anonymous)
    }

    /// The stored identity, if a user is signed in.
    pub fn recorded_identity(&self) -> Option<SessionIdentity> {
        match self.storage.get(USER_ID_KEY) {
            Ok(raw) => raw.and_then(SessionIdentity::new),
            Err(e) => {
                warn!("Failed to read identity record: {e}");
                None
            }
        }
    }

    pub(crate) fn record(&self, identity: &SessionIdentity) -> Result<(), StorageError> {
        self.storage.set(USER_ID_KEY, identity.as_str())
    }

    pub(crate) fn clear(&self) -> Result<(), StorageError> {
        self.storage.remove(USER_ID_KEY)
    }
}
