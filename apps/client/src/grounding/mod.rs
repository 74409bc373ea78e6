// Grounding: which job description and resume text a grounded request runs
// against, and whether it may run at all.

pub mod gate;
pub mod live;
pub mod resolver;

pub use gate::{FeatureGate, GroundedAction, GroundedRequest, Scaffolding, UNGROUNDED_MESSAGE};
pub use live::LiveContext;
pub use resolver::{GroundingContext, GroundingResolver, GroundingSource};
