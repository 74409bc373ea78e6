//! Grounding Resolver: best-available job description and resume text.
//!
//! Each document is resolved independently through the same chain:
//! live context, then persisted canonical text, then a placeholder built from
//! evidence of an earlier analysis, then the empty string.

use tracing::debug;

use crate::grounding::live::LiveContext;
use crate::models::Feedback;
use crate::session::{LogicalName, NamespacedStore};

const HEADLINE_MAX_CHARS: usize = 120;
const PLACEHOLDER_SKILLS: usize = 15;

/// Where a resolved text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroundingSource {
    Live,
    Persisted,
    /// Placeholder referring to a prior analysis.
    Evidence,
    None,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroundingContext {
    pub job_description: String,
    pub resume_text: String,
    pub job_description_source: GroundingSource,
    pub resume_source: GroundingSource,
}

impl GroundingContext {
    pub fn is_available(&self) -> bool {
        !self.job_description.trim().is_empty() || !self.resume_text.trim().is_empty()
    }
}

/// Read-only. Recomputes from live context and the store on every call.
#[derive(Clone)]
pub struct GroundingResolver {
    store: NamespacedStore,
    live: LiveContext,
}

impl GroundingResolver {
    pub fn new(store: NamespacedStore, live: LiveContext) -> Self {
        Self { store, live }
    }

    pub fn resolve_job_description(&self) -> String {
        self.job_description_with_source().0
    }

    pub fn resolve_resume_text(&self) -> String {
        self.resume_with_source().0
    }

    pub fn resolve_grounding_available(&self) -> bool {
        self.resolve().is_available()
    }

    pub fn resolve(&self) -> GroundingContext {
        let (job_description, job_description_source) = self.job_description_with_source();
        let (resume_text, resume_source) = self.resume_with_source();
        debug!(
            "Resolved grounding: jd={job_description_source:?} resume={resume_source:?}"
        );
        GroundingContext {
            job_description,
            resume_text,
            job_description_source,
            resume_source,
        }
    }

    fn job_description_with_source(&self) -> (String, GroundingSource) {
        if let Some(text) = self.live.job_description() {
            return (text, GroundingSource::Live);
        }
        if let Some(text) = self.store.get_text(LogicalName::JOB_DESCRIPTION) {
            return (text, GroundingSource::Persisted);
        }
        if let Some(file_name) = self.store.get_text(LogicalName::JD_FILE_NAME) {
            return (
                format!("Job description analyzed previously: {}", file_name.trim()),
                GroundingSource::Evidence,
            );
        }
        if let Some(feedback) = self.stored_feedback() {
            return (job_description_from_feedback(&feedback), GroundingSource::Evidence);
        }
        (String::new(), GroundingSource::None)
    }

    fn resume_with_source(&self) -> (String, GroundingSource) {
        if let Some(text) = self.live.resume_text() {
            return (text, GroundingSource::Live);
        }
        if let Some(text) = self.store.get_text(LogicalName::CV_TEXT) {
            return (text, GroundingSource::Persisted);
        }
        if let Some(file_name) = self.store.get_text(LogicalName::CV_FILE_NAME) {
            return (
                format!(
                    "Candidate CV was uploaded: {}. Use CV experiences and skills detected during analysis to tailor questions.",
                    file_name.trim()
                ),
                GroundingSource::Evidence,
            );
        }
        if let Some(feedback) = self.stored_feedback() {
            return (resume_from_feedback(&feedback), GroundingSource::Evidence);
        }
        (String::new(), GroundingSource::None)
    }

    fn stored_feedback(&self) -> Option<Feedback> {
        self.store.get::<Option<Feedback>>(LogicalName::FEEDBACK, None)
    }
}

fn job_description_from_feedback(feedback: &Feedback) -> String {
    let headline = feedback
        .job_description
        .as_deref()
        .and_then(|text| text.lines().map(str::trim).find(|line| !line.is_empty()));
    match (headline, feedback.match_percentage) {
        (Some(line), _) => format!(
            "Job description analyzed previously: {}",
            line.chars().take(HEADLINE_MAX_CHARS).collect::<String>()
        ),
        (None, Some(_)) => format!(
            "Job description analyzed previously (match score {})",
            feedback.formatted_match()
        ),
        (None, None) => "Job description analyzed previously.".to_string(),
    }
}

fn resume_from_feedback(feedback: &Feedback) -> String {
    if feedback.similarities.is_empty() {
        return "Candidate CV was analyzed previously.".to_string();
    }
    let skills: Vec<&str> = feedback
        .similarities
        .iter()
        .take(PLACEHOLDER_SKILLS)
        .map(String::as_str)
        .collect();
    format!(
        "Candidate CV was analyzed previously. Skills detected during analysis: {}.",
        skills.join(", ")
    )
}
