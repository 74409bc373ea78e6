//! PrepSession: the interview-prep workflow over the session cache.
//!
//! Flow: login → select uploads → analyze → generate questions / chat.
//! Every grounded action passes the Feature Gate before any request is sent,
//! and every response is dropped if the identity changed while it was pending.

use std::future::Future;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

use anyhow::Context;
use tracing::{info, warn};

use crate::api_client::{
    AnalysisApi, ApiError, GoogleCredential, HttpAnalysisApi, LoginRequest, SignUpRequest,
};
use crate::config::{Config, LogoutPolicy};
use crate::documents::{extract_text_blocking, DocumentUpload};
use crate::errors::ClientError;
use crate::grounding::{FeatureGate, GroundedAction, GroundingContext, GroundingResolver, LiveContext};
use crate::models::{ChatMessage, Feedback, Student};
use crate::session::{CacheInvalidator, LogicalName, NamespacedStore, SessionIdentity};
use crate::storage::{open_storage, KeyValueStorage};
use crate::workflow::inflight::{run_guarded, IdentityEpoch, InFlightGuard};

pub const CHAT_APOLOGY: &str = "Sorry, there was an error. Please try again.";
const MISSING_UPLOADS: &str = "Please upload both the job description and your CV.";

#[derive(Debug, Default)]
struct PendingUploads {
    job_description: Option<DocumentUpload>,
    cv: Option<DocumentUpload>,
}

pub struct PrepSession {
    api: Arc<dyn AnalysisApi>,
    store: NamespacedStore,
    invalidator: CacheInvalidator,
    live: LiveContext,
    gate: FeatureGate,
    config: Config,
    epoch: IdentityEpoch,
    pending: Mutex<PendingUploads>,
    analyzing: AtomicBool,
    generating: AtomicBool,
    chatting: AtomicBool,
}

impl PrepSession {
    pub fn new(config: Config, storage: Arc<dyn KeyValueStorage>, api: Arc<dyn AnalysisApi>) -> Self {
        let store = NamespacedStore::new(storage);
        let live = LiveContext::new();
        let resolver = GroundingResolver::new(store.clone(), live.clone());
        Self {
            api,
            invalidator: CacheInvalidator::new(store.clone()),
            gate: FeatureGate::new(resolver, store.clone()),
            store,
            live,
            config,
            epoch: IdentityEpoch::new(),
            pending: Mutex::new(PendingUploads::default()),
            analyzing: AtomicBool::new(false),
            generating: AtomicBool::new(false),
            chatting: AtomicBool::new(false),
        }
    }

    /// Opens the configured storage backend and an HTTP client for the API.
    pub fn from_config(config: Config) -> anyhow::Result<Self> {
        let storage = open_storage(&config)?;
        let api = HttpAnalysisApi::from_config(&config).context("failed to build HTTP client")?;
        Ok(Self::new(config, storage, Arc::new(api)))
    }

    // ────────────────────────────────────────────────────────────────────────
    // Authentication
    // ────────────────────────────────────────────────────────────────────────

    pub async fn login(&self, email: &str, password: &str) -> Result<Student, ClientError> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(ClientError::Validation(
                "Please enter your email and password.".to_string(),
            ));
        }
        if let Some(domain) = self.rejected_domain(email) {
            return Err(ClientError::Validation(format!(
                "Please use your BITS Pilani email address ({domain})"
            )));
        }
        let request = LoginRequest {
            email: email.trim().to_string(),
            password: password.to_string(),
        };
        let student = self.request(self.api.login(&request)).await?;
        self.establish_identity(&student, &request.email)?;
        Ok(student)
    }

    pub async fn login_with_google(
        &self,
        credential: &GoogleCredential,
    ) -> Result<Student, ClientError> {
        if let Some(domain) = self.rejected_domain(&credential.email) {
            return Err(ClientError::Validation(format!(
                "Access restricted to BITS Pilani students only. Please use your {domain} email."
            )));
        }
        let student = self.request(self.api.google_auth(credential)).await?;
        self.establish_identity(&student, &credential.email)?;
        Ok(student)
    }

    /// Creates an account. The user still has to log in afterwards.
    pub async fn sign_up(&self, name: &str, email: &str, password: &str) -> Result<String, ClientError> {
        if name.trim().is_empty() || email.trim().is_empty() || password.is_empty() {
            return Err(ClientError::Validation(
                "Please fill in your name, email and password.".to_string(),
            ));
        }
        if let Some(domain) = self.rejected_domain(email) {
            return Err(ClientError::Validation(format!(
                "Please use your BITS Pilani email address ({domain})"
            )));
        }
        let request = SignUpRequest {
            name: name.trim().to_string(),
            email: email.trim().to_string(),
            password: password.to_string(),
        };
        self.request(self.api.sign_up(&request)).await
    }

    /// Ends the session according to the configured logout policy.
    pub fn logout(&self) -> Result<(), ClientError> {
        let identity = self.store.current_identity();
        self.epoch.advance();
        match self.config.logout_policy {
            LogoutPolicy::Teardown => self.invalidator.teardown_session()?,
            LogoutPolicy::FullReset => {
                self.invalidator.full_reset()?;
            }
        }
        self.reset_in_memory();
        info!("Logged out {identity} ({:?})", self.config.logout_policy);
        Ok(())
    }

    /// Abandons every pending request; their responses will not be applied.
    pub fn cancel_in_flight(&self) {
        self.epoch.advance();
    }

    pub fn current_identity(&self) -> SessionIdentity {
        self.store.current_identity()
    }

    fn establish_identity(&self, student: &Student, typed_email: &str) -> Result<(), ClientError> {
        let identity = SessionIdentity::from_login(Some(student), typed_email).ok_or_else(|| {
            ClientError::Validation("The server did not identify your account.".to_string())
        })?;
        self.epoch.advance();
        self.invalidator.on_identity_established(&identity)?;
        self.reset_in_memory();
        info!("Logged in as {}", student.display_name());
        Ok(())
    }

    fn rejected_domain(&self, email: &str) -> Option<&str> {
        let domain = self
            .config
            .allowed_email_domain
            .as_deref()
            .filter(|d| !d.is_empty())?;
        let allowed = email
            .trim()
            .to_lowercase()
            .ends_with(&domain.to_lowercase());
        (!allowed).then_some(domain)
    }

    fn reset_in_memory(&self) {
        self.live.clear();
        *self.pending_uploads() = PendingUploads::default();
    }

    // ────────────────────────────────────────────────────────────────────────
    // Analysis
    // ────────────────────────────────────────────────────────────────────────

    /// Records the new file name and drops text kept from the previous
    /// document, so grounding never pairs a new file with old text.
    pub fn select_job_description(&self, upload: DocumentUpload) -> Result<(), ClientError> {
        self.store.set(LogicalName::JD_FILE_NAME, &upload.file_name)?;
        self.store.remove(LogicalName::JOB_DESCRIPTION)?;
        self.live.clear_job_description();
        self.pending_uploads().job_description = Some(upload);
        Ok(())
    }

    pub fn select_cv(&self, upload: DocumentUpload) -> Result<(), ClientError> {
        self.store.set(LogicalName::CV_FILE_NAME, &upload.file_name)?;
        self.store.remove(LogicalName::CV_TEXT)?;
        self.live.clear_resume_text();
        self.pending_uploads().cv = Some(upload);
        Ok(())
    }

    /// Sends both uploads for analysis, then stores the feedback and the text
    /// of each document. A document whose text cannot be extracted is skipped.
    pub async fn analyze(&self) -> Result<Feedback, ClientError> {
        let _guard = InFlightGuard::acquire(&self.analyzing, "analysis")?;
        let (job_description, cv) = {
            let pending = self.pending_uploads();
            match (&pending.job_description, &pending.cv) {
                (Some(jd), Some(cv)) => (jd.clone(), cv.clone()),
                _ => return Err(ClientError::Validation(MISSING_UPLOADS.to_string())),
            }
        };

        info!(
            "Analyzing {} against {}",
            cv.file_name, job_description.file_name
        );
        let feedback = self
            .request(self.api.analyze(&job_description, &cv))
            .await?;
        self.store.set(LogicalName::FEEDBACK, &feedback)?;
        info!("Analysis complete: match {}", feedback.formatted_match());

        match extract_text_blocking(job_description).await {
            Ok(text) => {
                self.store.set(LogicalName::JOB_DESCRIPTION, &text)?;
                self.live.set_job_description(text);
            }
            Err(e) => {
                warn!("Job description text not kept: {e}");
                self.store.remove(LogicalName::JOB_DESCRIPTION)?;
                self.live.clear_job_description();
            }
        }
        match extract_text_blocking(cv).await {
            Ok(text) => {
                self.store.set(LogicalName::CV_TEXT, &text)?;
                self.live.set_resume_text(text);
            }
            Err(e) => {
                warn!("CV text not kept: {e}");
                self.store.remove(LogicalName::CV_TEXT)?;
                self.live.clear_resume_text();
            }
        }
        Ok(feedback)
    }

    // ────────────────────────────────────────────────────────────────────────
    // Grounded features
    // ────────────────────────────────────────────────────────────────────────

    pub async fn generate_questions(&self) -> Result<Vec<String>, ClientError> {
        let _guard = InFlightGuard::acquire(&self.generating, "question generation")?;
        let grounded = self
            .gate
            .assert_grounded_or_block(GroundedAction::GenerateQuestions)?;
        let payload = grounded.questions_payload();

        let questions = self.request(self.api.generate_questions(&payload)).await?;
        self.store.set(LogicalName::QUESTIONS, &questions)?;
        info!("Stored {} interview questions", questions.len());
        Ok(questions)
    }

    /// Asks the prep assistant. The exchange is appended to the chat history;
    /// a failed request records an apology instead of a reply.
    pub async fn ask(&self, question: &str) -> Result<String, ClientError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(ClientError::Validation("Please enter a question.".to_string()));
        }
        let _guard = InFlightGuard::acquire(&self.chatting, "chat")?;
        let grounded = self.gate.assert_grounded_or_block(GroundedAction::Chat)?;
        let payload = grounded.chat_payload(question);

        let outcome = self.request(self.api.chat(&payload)).await;
        if matches!(outcome, Err(ClientError::Superseded)) {
            return outcome;
        }

        let mut history = self.chat_history();
        history.push(ChatMessage::user(question));
        match outcome {
            Ok(reply) => {
                history.push(ChatMessage::bot(reply.clone()));
                self.store.set(LogicalName::QA_LIST, &history)?;
                Ok(reply)
            }
            Err(e) => {
                history.push(ChatMessage::bot(CHAT_APOLOGY));
                self.store.set(LogicalName::QA_LIST, &history)?;
                Err(e)
            }
        }
    }

    // ────────────────────────────────────────────────────────────────────────
    // Clearing and readers
    // ────────────────────────────────────────────────────────────────────────

    pub fn clear_chat(&self) -> Result<(), ClientError> {
        Ok(self.store.remove(LogicalName::QA_LIST)?)
    }

    pub fn clear_questions(&self) -> Result<(), ClientError> {
        Ok(self.store.remove(LogicalName::QUESTIONS)?)
    }

    /// Forgets the analysis result, the recorded file names, and pending uploads.
    pub fn clear_analysis(&self) -> Result<(), ClientError> {
        self.store.remove(LogicalName::FEEDBACK)?;
        self.store.remove(LogicalName::JD_FILE_NAME)?;
        self.store.remove(LogicalName::CV_FILE_NAME)?;
        *self.pending_uploads() = PendingUploads::default();
        Ok(())
    }

    pub fn feedback(&self) -> Option<Feedback> {
        self.store.get(LogicalName::FEEDBACK, None)
    }

    pub fn questions(&self) -> Vec<String> {
        self.store.get(LogicalName::QUESTIONS, Vec::new())
    }

    pub fn chat_history(&self) -> Vec<ChatMessage> {
        self.store.get(LogicalName::QA_LIST, Vec::new())
    }

    pub fn job_description_file_name(&self) -> Option<String> {
        self.store.get_text(LogicalName::JD_FILE_NAME)
    }

    pub fn cv_file_name(&self) -> Option<String> {
        self.store.get_text(LogicalName::CV_FILE_NAME)
    }

    pub fn grounding(&self) -> GroundingContext {
        self.gate.resolver().resolve()
    }

    // ────────────────────────────────────────────────────────────────────────
    // Helpers
    // ────────────────────────────────────────────────────────────────────────

    /// Runs one remote call with the configured timeout. Fails with
    /// `Superseded` if the identity epoch moved while it was pending.
    async fn request<T, F>(&self, call: F) -> Result<T, ClientError>
    where
        F: Future<Output = Result<T, ApiError>>,
    {
        let started = self.epoch.current();
        let outcome = run_guarded(call, self.config.request_timeout, self.epoch.subscribe(), started).await;
        if self.epoch.current() != started {
            info!("Discarding response issued before the session changed");
            return Err(ClientError::Superseded);
        }
        outcome
    }

    fn pending_uploads(&self) -> std::sync::MutexGuard<'_, PendingUploads> {
        self.pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
