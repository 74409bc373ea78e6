use std::fmt;

use tracing::{debug, warn};

use crate::api_client::{ChatPayload, GenerateQuestionsPayload};
use crate::errors::ClientError;
use crate::grounding::resolver::{GroundingContext, GroundingResolver};
use crate::models::{CourseRecommendation, Feedback};
use crate::session::{LogicalName, NamespacedStore};

pub const UNGROUNDED_MESSAGE: &str =
    "Please upload and analyze a job description and/or CV first in Skill Match.";

const MAX_SKILLS: usize = 15;
const MAX_COURSES: usize = 3;
const CHAT_DOCUMENT_CHARS: usize = 1200;

/// Remote actions that need grounding before they may run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroundedAction {
    GenerateQuestions,
    Chat,
}

impl fmt::Display for GroundedAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroundedAction::GenerateQuestions => write!(f, "question generation"),
            GroundedAction::Chat => write!(f, "chat"),
        }
    }
}

/// Prior-analysis lists sent alongside the documents, already truncated.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scaffolding {
    pub skills_found: Vec<String>,
    pub skills_missing: Vec<String>,
    pub top_courses: Vec<CourseRecommendation>,
}

impl Scaffolding {
    pub fn from_feedback(feedback: &Feedback) -> Self {
        Self {
            skills_found: feedback.similarities.iter().take(MAX_SKILLS).cloned().collect(),
            skills_missing: feedback.missing.iter().take(MAX_SKILLS).cloned().collect(),
            top_courses: feedback
                .course_recommendations
                .iter()
                .take(MAX_COURSES)
                .cloned()
                .collect(),
        }
    }
}

/// Permission to issue a grounded request, carrying what it should send.
#[derive(Debug, Clone)]
pub struct GroundedRequest {
    pub action: GroundedAction,
    pub context: GroundingContext,
    pub scaffolding: Scaffolding,
}

impl GroundedRequest {
    pub fn questions_payload(&self) -> GenerateQuestionsPayload {
        GenerateQuestionsPayload {
            job_description: self.context.job_description.clone(),
            cv_text: self.context.resume_text.clone(),
            skills_found: self.scaffolding.skills_found.clone(),
            skills_missing: self.scaffolding.skills_missing.clone(),
            top_courses: self.scaffolding.top_courses.clone(),
        }
    }

    pub fn chat_payload(&self, message: impl Into<String>) -> ChatPayload {
        ChatPayload {
            message: message.into(),
            context: self.chat_context(),
        }
    }

    /// `JD:`, `CV:`, `SkillsFound:` and `SkillsMissing:` lines; empty parts skipped.
    fn chat_context(&self) -> String {
        let mut parts = Vec::new();
        let jd = self.context.job_description.trim();
        if !jd.is_empty() {
            parts.push(format!("JD: {}", truncate_chars(jd, CHAT_DOCUMENT_CHARS)));
        }
        let cv = self.context.resume_text.trim();
        if !cv.is_empty() {
            parts.push(format!("CV: {}", truncate_chars(cv, CHAT_DOCUMENT_CHARS)));
        }
        if !self.scaffolding.skills_found.is_empty() {
            parts.push(format!("SkillsFound: {}", self.scaffolding.skills_found.join(", ")));
        }
        if !self.scaffolding.skills_missing.is_empty() {
            parts.push(format!(
                "SkillsMissing: {}",
                self.scaffolding.skills_missing.join(", ")
            ));
        }
        if parts.is_empty() {
            return String::new();
        }
        let mut context = parts.join("\n");
        context.push('\n');
        context
    }
}

fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

/// Consulted before every grounded remote request.
#[derive(Clone)]
pub struct FeatureGate {
    resolver: GroundingResolver,
    store: NamespacedStore,
}

impl FeatureGate {
    pub fn new(resolver: GroundingResolver, store: NamespacedStore) -> Self {
        Self { resolver, store }
    }

    pub fn resolver(&self) -> &GroundingResolver {
        &self.resolver
    }

    /// Blocks with `ClientError::Ungrounded` when neither document resolves to
    /// any text. Never writes.
    pub fn assert_grounded_or_block(
        &self,
        action: GroundedAction,
    ) -> Result<GroundedRequest, ClientError> {
        let context = self.resolver.resolve();
        if !context.is_available() {
            warn!("Blocked {action}: no grounding available");
            return Err(ClientError::Ungrounded(UNGROUNDED_MESSAGE.to_string()));
        }
        let scaffolding = self
            .store
            .get::<Option<Feedback>>(LogicalName::FEEDBACK, None)
            .map(|feedback| Scaffolding::from_feedback(&feedback))
            .unwrap_or_default();
        debug!(
            "Permitted {action} (jd={:?}, resume={:?})",
            context.job_description_source, context.resume_source
        );
        Ok(GroundedRequest {
            action,
            context,
            scaffolding,
        })
    }
}
