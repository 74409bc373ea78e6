//! Analysis API client. Single point of entry for calls to the remote
//! matching service: auth, analysis, question generation and chat.
//!
//! Workflow code depends on the `AnalysisApi` trait so tests can swap in a fake.
use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::documents::DocumentUpload;
use crate::models::{Feedback, Student};

pub mod payloads;

pub use payloads::{
    ChatPayload, GenerateQuestionsPayload, GoogleCredential, LoginRequest, SignUpRequest,
};
use payloads::{AnalyzeEnvelope, AuthEnvelope, ChatEnvelope, ErrorEnvelope, QuestionsEnvelope};

const MAX_RETRIES: u32 = 3;
const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(1000);

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message:?}")]
    Status {
        status: u16,
        message: Option<String>,
    },

    /// The server answered `success: false`.
    #[error("Request rejected: {0}")]
    Rejected(String),

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Server returned no usable content")]
    EmptyResponse,

    #[error("Gave up after {retries} attempts")]
    RetriesExhausted { retries: u32 },
}

impl ApiError {
    /// Message written by the server, if there is one worth showing.
    pub fn server_message(&self) -> Option<&str> {
        match self {
            ApiError::Status {
                message: Some(msg), ..
            }
            | ApiError::Rejected(msg) => Some(msg.as_str()).filter(|m| !m.trim().is_empty()),
            _ => None,
        }
    }
}

/// The remote matching service, as seen by this client.
#[async_trait]
pub trait AnalysisApi: Send + Sync {
    async fn login(&self, request: &LoginRequest) -> Result<Student, ApiError>;

    async fn google_auth(&self, credential: &GoogleCredential) -> Result<Student, ApiError>;

    /// Returns the server's confirmation message. Does not sign the user in.
    async fn sign_up(&self, request: &SignUpRequest) -> Result<String, ApiError>;

    async fn analyze(
        &self,
        job_description: &DocumentUpload,
        cv: &DocumentUpload,
    ) -> Result<Feedback, ApiError>;

    async fn generate_questions(
        &self,
        payload: &GenerateQuestionsPayload,
    ) -> Result<Vec<String>, ApiError>;

    async fn chat(&self, payload: &ChatPayload) -> Result<String, ApiError>;
}

/// `AnalysisApi` over HTTP. Retries 429 and 5xx responses with exponential backoff.
#[derive(Clone)]
pub struct HttpAnalysisApi {
    client: Client,
    base_url: String,
    retry_delay: Duration,
}

impl HttpAnalysisApi {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            retry_delay: DEFAULT_RETRY_DELAY,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, ApiError> {
        Self::new(config.api_url.clone(), config.request_timeout)
    }

    /// Base delay before the first retry; doubles on each later attempt.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Sends the request built by `build`, retrying on 429/5xx and transport
    /// errors. Returns the body of the first 2xx response.
    async fn send<F>(&self, endpoint: &str, build: F) -> Result<String, ApiError>
    where
        F: Fn() -> Result<RequestBuilder, ApiError>,
    {
        let request_id = Uuid::new_v4();
        let mut last_error: Option<ApiError> = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                let delay = self.retry_delay * (1 << (attempt - 1));
                warn!(
                    "{endpoint} attempt {} failed, retrying after {}ms (request {request_id})",
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let response = match build()?.header("x-request-id", request_id.to_string()).send().await {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(ApiError::Http(e));
                    continue;
                }
            };

            let status = response.status();
            let body = response.text().await.unwrap_or_default();

            if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                warn!("{endpoint} returned {status}: {body}");
                last_error = Some(error_from_body(status, &body));
                continue;
            }

            if !status.is_success() {
                return Err(error_from_body(status, &body));
            }

            debug!("{endpoint} succeeded ({} bytes, request {request_id})", body.len());
            return Ok(body);
        }

        Err(last_error.unwrap_or(ApiError::RetriesExhausted {
            retries: MAX_RETRIES,
        }))
    }

    async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: serde::Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.url(path);
        let text = self
            .send(path, || Ok(self.client.post(&url).json(body)))
            .await?;
        Ok(serde_json::from_str(&text)?)
    }
}

fn error_from_body(status: StatusCode, body: &str) -> ApiError {
    let message = serde_json::from_str::<ErrorEnvelope>(body)
        .ok()
        .and_then(|e| e.message.or(e.error));
    ApiError::Status {
        status: status.as_u16(),
        message,
    }
}

fn document_part(upload: &DocumentUpload) -> Result<Part, ApiError> {
    Ok(Part::bytes(upload.bytes.to_vec())
        .file_name(upload.file_name.clone())
        .mime_str(&upload.content_type)?)
}

fn auth_result(envelope: AuthEnvelope, default_failure: &str) -> Result<Student, ApiError> {
    if envelope.success {
        Ok(envelope.student.unwrap_or_default())
    } else {
        Err(ApiError::Rejected(
            envelope
                .message
                .unwrap_or_else(|| default_failure.to_string()),
        ))
    }
}

#[async_trait]
impl AnalysisApi for HttpAnalysisApi {
    async fn login(&self, request: &LoginRequest) -> Result<Student, ApiError> {
        let envelope: AuthEnvelope = self.post_json("/login", request).await?;
        auth_result(envelope, "Login failed.")
    }

    async fn google_auth(&self, credential: &GoogleCredential) -> Result<Student, ApiError> {
        let envelope: AuthEnvelope = self.post_json("/google-auth", credential).await?;
        auth_result(envelope, "Google authentication failed.")
    }

    async fn sign_up(&self, request: &SignUpRequest) -> Result<String, ApiError> {
        let envelope: AuthEnvelope = self.post_json("/signUp", request).await?;
        if envelope.success {
            Ok(envelope
                .message
                .unwrap_or_else(|| "Account created successfully! Please login.".to_string()))
        } else {
            Err(ApiError::Rejected(
                envelope.message.unwrap_or_else(|| "Signup failed.".to_string()),
            ))
        }
    }

    async fn analyze(
        &self,
        job_description: &DocumentUpload,
        cv: &DocumentUpload,
    ) -> Result<Feedback, ApiError> {
        let url = self.url("/analyze");
        let text = self
            .send("/analyze", || {
                let form = Form::new()
                    .part("job_description", document_part(job_description)?)
                    .part("cv", document_part(cv)?);
                Ok(self.client.post(&url).multipart(form))
            })
            .await?;

        let envelope: AnalyzeEnvelope = serde_json::from_str(&text)?;
        match (envelope.feedback, envelope.error) {
            (Some(feedback), _) => Ok(feedback),
            (None, Some(error)) => Err(ApiError::Rejected(error)),
            (None, None) => Err(ApiError::EmptyResponse),
        }
    }

    async fn generate_questions(
        &self,
        payload: &GenerateQuestionsPayload,
    ) -> Result<Vec<String>, ApiError> {
        let envelope: QuestionsEnvelope = self.post_json("/generate-questions", payload).await?;
        match envelope {
            QuestionsEnvelope {
                success: true,
                questions: Some(questions),
                ..
            } => Ok(questions),
            QuestionsEnvelope {
                message: Some(message),
                ..
            } => Err(ApiError::Rejected(message)),
            _ => Err(ApiError::Rejected("Failed to generate questions".to_string())),
        }
    }

    async fn chat(&self, payload: &ChatPayload) -> Result<String, ApiError> {
        let envelope: ChatEnvelope = self.post_json("/chat", payload).await?;
        match envelope {
            ChatEnvelope {
                success: true,
                response: Some(response),
                ..
            } if !response.trim().is_empty() => Ok(response),
            ChatEnvelope {
                message: Some(message),
                ..
            } => Err(ApiError::Rejected(message)),
            _ => Err(ApiError::Rejected("Failed to get response".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use axum::extract::{Multipart, State};
    use axum::http::StatusCode as AxumStatus;
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{json, Value};

    async fn spawn_server(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/")
    }

    fn client(base_url: &str) -> HttpAnalysisApi {
        HttpAnalysisApi::new(base_url, Duration::from_secs(5))
            .unwrap()
            .with_retry_delay(Duration::from_millis(5))
    }

    #[test]
    fn test_error_from_body_prefers_message_then_error() {
        let err = error_from_body(StatusCode::UNAUTHORIZED, r#"{"success":false,"message":"Invalid email or password"}"#);
        assert_eq!(err.server_message(), Some("Invalid email or password"));

        let err = error_from_body(StatusCode::BAD_REQUEST, r#"{"error":"Missing data"}"#);
        assert_eq!(err.server_message(), Some("Missing data"));

        let err = error_from_body(StatusCode::BAD_GATEWAY, "<html>bad gateway</html>");
        assert_eq!(err.server_message(), None);
    }

    #[tokio::test]
    async fn test_login_success_returns_student() {
        let app = Router::new().route(
            "/login",
            post(|Json(body): Json<Value>| async move {
                assert_eq!(body["email"], "f2021@pilani.bits-pilani.ac.in");
                Json(json!({
                    "success": true,
                    "message": "Login successful",
                    "student": {"id": "doc-1", "name": "Asha", "email": "f2021@pilani.bits-pilani.ac.in"}
                }))
            }),
        );
        let api = client(&spawn_server(app).await);

        let student = api
            .login(&LoginRequest {
                email: "f2021@pilani.bits-pilani.ac.in".to_string(),
                password: "pw".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(student.id.as_deref(), Some("doc-1"));
    }

    #[tokio::test]
    async fn test_login_401_surfaces_server_message() {
        let app = Router::new().route(
            "/login",
            post(|| async {
                (
                    AxumStatus::UNAUTHORIZED,
                    Json(json!({"success": false, "message": "Invalid email or password"})),
                )
            }),
        );
        let api = client(&spawn_server(app).await);

        let err = api
            .login(&LoginRequest {
                email: "x@pilani.bits-pilani.ac.in".to_string(),
                password: "bad".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Status { status: 401, .. }));
        assert_eq!(err.server_message(), Some("Invalid email or password"));
    }

    #[tokio::test]
    async fn test_server_errors_are_retried() {
        let hits = Arc::new(AtomicUsize::new(0));
        let app = Router::new()
            .route(
                "/chat",
                post(|State(hits): State<Arc<AtomicUsize>>| async move {
                    if hits.fetch_add(1, Ordering::SeqCst) == 0 {
                        (AxumStatus::SERVICE_UNAVAILABLE, Json(json!({})))
                    } else {
                        (
                            AxumStatus::OK,
                            Json(json!({"success": true, "response": "Lead with the Airflow project."})),
                        )
                    }
                }),
            )
            .with_state(hits.clone());
        let api = client(&spawn_server(app).await);

        let reply = api
            .chat(&ChatPayload {
                message: "How do I open?".to_string(),
                context: String::new(),
            })
            .await
            .unwrap();
        assert_eq!(reply, "Lead with the Airflow project.");
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_persistent_server_error_gives_up() {
        let hits = Arc::new(AtomicUsize::new(0));
        let app = Router::new()
            .route(
                "/generate-questions",
                post(|State(hits): State<Arc<AtomicUsize>>| async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    (
                        AxumStatus::INTERNAL_SERVER_ERROR,
                        Json(json!({"success": false, "message": "model unavailable"})),
                    )
                }),
            )
            .with_state(hits.clone());
        let api = client(&spawn_server(app).await);

        let err = api
            .generate_questions(&GenerateQuestionsPayload::default())
            .await
            .unwrap_err();
        assert_eq!(err.server_message(), Some("model unavailable"));
        assert_eq!(hits.load(Ordering::SeqCst), MAX_RETRIES as usize);
    }

    #[tokio::test]
    async fn test_questions_success_false_is_rejected() {
        let app = Router::new().route(
            "/generate-questions",
            post(|| async { Json(json!({"success": false, "message": "Provide jobDescription and/or cvText"})) }),
        );
        let api = client(&spawn_server(app).await);

        let err = api
            .generate_questions(&GenerateQuestionsPayload::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Rejected(ref m) if m.contains("jobDescription")));
    }

    #[tokio::test]
    async fn test_analyze_sends_both_files_as_multipart() {
        let app = Router::new().route(
            "/analyze",
            post(|mut multipart: Multipart| async move {
                let mut names = Vec::new();
                while let Some(field) = multipart.next_field().await.unwrap() {
                    let name = field.name().unwrap_or_default().to_string();
                    let file_name = field.file_name().unwrap_or_default().to_string();
                    let bytes = field.bytes().await.unwrap();
                    assert!(!bytes.is_empty());
                    names.push(format!("{name}={file_name}"));
                }
                assert_eq!(names, vec!["job_description=jd.pdf", "cv=cv.pdf"]);
                Json(json!({"feedback": {"match_percentage": 72, "similarities": ["SQL"], "missing": ["Airflow"]}}))
            }),
        );
        let api = client(&spawn_server(app).await);

        let feedback = api
            .analyze(
                &DocumentUpload::pdf("jd.pdf", b"%PDF-jd".to_vec()),
                &DocumentUpload::pdf("cv.pdf", b"%PDF-cv".to_vec()),
            )
            .await
            .unwrap();
        assert_eq!(feedback.formatted_match(), "72%");
        assert_eq!(feedback.missing, vec!["Airflow"]);
    }

    #[tokio::test]
    async fn test_analyze_error_body() {
        let app = Router::new().route(
            "/analyze",
            post(|| async {
                (
                    AxumStatus::BAD_REQUEST,
                    Json(json!({"error": "Missing data"})),
                )
            }),
        );
        let api = client(&spawn_server(app).await);

        let err = api
            .analyze(
                &DocumentUpload::pdf("jd.pdf", b"x".to_vec()),
                &DocumentUpload::pdf("cv.pdf", b"y".to_vec()),
            )
            .await
            .unwrap_err();
        assert_eq!(err.server_message(), Some("Missing data"));
    }
}
