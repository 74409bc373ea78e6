//! Wire shapes of the remote analysis API.

use serde::{Deserialize, Serialize};

use crate::models::{CourseRecommendation, Feedback, Student};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignUpRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// Claims from a Google sign-in, forwarded for server-side verification.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleCredential {
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    pub google_id: String,
    #[serde(default)]
    pub picture: Option<String>,
    /// The raw ID token.
    pub credential: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateQuestionsPayload {
    pub job_description: String,
    pub cv_text: String,
    pub skills_found: Vec<String>,
    pub skills_missing: Vec<String>,
    pub top_courses: Vec<CourseRecommendation>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatPayload {
    pub message: String,
    pub context: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AuthEnvelope {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub student: Option<Student>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct QuestionsEnvelope {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub questions: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatEnvelope {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub response: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AnalyzeEnvelope {
    #[serde(default)]
    pub feedback: Option<Feedback>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Error body shape shared by every endpoint: `message` or `error`.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorEnvelope {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}
