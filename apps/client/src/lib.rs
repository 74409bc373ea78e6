//! SkillMatch client: a per-user session cache and grounding resolution for
//! the CV / job-description matching service.
//!
//! Persisted state is namespaced by the signed-in identity and purged when the
//! identity changes. Question generation and chat only run once a job
//! description or CV can be resolved from live state, the cache, or evidence
//! of an earlier analysis.

pub mod api_client;
pub mod config;
pub mod documents;
pub mod errors;
pub mod grounding;
pub mod models;
pub mod session;
pub mod storage;
pub mod telemetry;
pub mod workflow;

pub use api_client::{AnalysisApi, ApiError, HttpAnalysisApi};
pub use config::Config;
pub use documents::DocumentUpload;
pub use errors::ClientError;
pub use grounding::{FeatureGate, GroundedAction, GroundingContext, GroundingResolver};
pub use session::{CacheInvalidator, IdentityResolver, NamespacedStore, SessionIdentity};
pub use storage::{open_storage, KeyValueStorage};
pub use workflow::PrepSession;
