//! Uploaded documents and local text extraction.

use bytes::Bytes;
use tracing::debug;

use crate::errors::ClientError;

pub const PDF_CONTENT_TYPE: &str = "application/pdf";

/// A file the user picked for analysis.
#[derive(Debug, Clone)]
pub struct DocumentUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

impl DocumentUpload {
    pub fn new(
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: impl Into<Bytes>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes: bytes.into(),
        }
    }

    pub fn pdf(file_name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self::new(file_name, PDF_CONTENT_TYPE, bytes)
    }

    pub fn plain_text(file_name: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(file_name, "text/plain", Bytes::from(text.into()))
    }

    fn is_pdf(&self) -> bool {
        self.content_type.eq_ignore_ascii_case(PDF_CONTENT_TYPE)
            || self.file_name.to_ascii_lowercase().ends_with(".pdf")
    }

    fn is_text(&self) -> bool {
        self.content_type.to_ascii_lowercase().starts_with("text/")
    }
}

/// Extracts the document's text: PDFs through `pdf-extract`, `text/*` as UTF-8.
pub fn extract_text(upload: &DocumentUpload) -> Result<String, ClientError> {
    let text = if upload.is_text() {
        String::from_utf8(upload.bytes.to_vec()).map_err(|e| {
            ClientError::Document(format!("{} is not valid UTF-8: {e}", upload.file_name))
        })?
    } else if upload.is_pdf() {
        pdf_extract::extract_text_from_mem(&upload.bytes).map_err(|e| {
            ClientError::Document(format!("failed to read {}: {e}", upload.file_name))
        })?
    } else {
        return Err(ClientError::Document(format!(
            "unsupported content type '{}' for {}",
            upload.content_type, upload.file_name
        )));
    };

    let text = text.trim().to_string();
    if text.is_empty() {
        return Err(ClientError::Document(format!(
            "no text found in {}",
            upload.file_name
        )));
    }
    debug!("Extracted {} chars from {}", text.len(), upload.file_name);
    Ok(text)
}

/// `extract_text` on the blocking pool. PDF parsing is CPU-bound.
pub async fn extract_text_blocking(upload: DocumentUpload) -> Result<String, ClientError> {
    let file_name = upload.file_name.clone();
    tokio::task::spawn_blocking(move || extract_text(&upload))
        .await
        .map_err(|e| {
            ClientError::Internal(anyhow::anyhow!(
                "spawn_blocking failed extracting {file_name}: {e}"
            ))
        })?
}
