// Orchestration of the prep workflow on top of the session cache and grounding.

pub(crate) mod inflight;
pub mod session;

pub use session::{PrepSession, CHAT_APOLOGY};
