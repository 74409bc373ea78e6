pub mod chat;
pub mod feedback;
pub mod user;

pub use chat::{ChatMessage, Speaker};
pub use feedback::{BitsCourse, CourseRecommendation, Feedback};
pub use user::Student;
