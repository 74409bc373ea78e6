// Session-scoped cache: identity, namespaced keys, the store, and invalidation.
// Nothing outside this module touches `KeyValueStorage` directly.

pub mod identity;
pub mod invalidator;
pub mod keys;
pub mod store;

pub use identity::{IdentityResolver, SessionIdentity, ANONYMOUS_SESSION, USER_ID_KEY};
pub use invalidator::{CacheInvalidator, IdentityTransition};
pub use keys::LogicalName;
pub use store::NamespacedStore;
