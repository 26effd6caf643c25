//! HTTP error mapping

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Request-level failure
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// The classifier context is not ready
    #[error("ML model not loaded. Please ensure model files are present.")]
    NotReady { required_files: Vec<String> },

    /// No `file` field in the upload
    #[error("No file provided")]
    NoFile,

    /// The `file` field has an empty filename
    #[error("No file selected")]
    EmptyFilename,

    /// The filename does not end in `.pdf`
    #[error("Only PDF files are supported")]
    NotPdf,

    /// Unreadable multipart body, with the status the parser assigned
    #[error("{message}")]
    Upload { status: StatusCode, message: String },

    /// Classification failed after the document was accepted
    #[error("{0}")]
    Classification(String),
}

impl AppError {
    /// Metric label for this error
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotReady { .. } => "not_ready",
            Self::NoFile | Self::EmptyFilename | Self::NotPdf | Self::Upload { .. } => {
                "bad_request"
            }
            Self::Classification(_) => "classification",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::NotReady { .. } | Self::Classification(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Upload { status, .. } => *status,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

impl From<doclass_core::Error> for AppError {
    fn from(err: doclass_core::Error) -> Self {
        match err {
            doclass_core::Error::ModelNotLoaded { required_files } => {
                AppError::NotReady { required_files }
            }
            other => AppError::Classification(other.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        metrics::counter!("doclass_errors_total", "kind" => self.kind()).increment(1);

        let status = self.status();
        let body = match &self {
            AppError::NotReady { required_files } => json!({
                "error": self.to_string(),
                "required_files": required_files,
            }),
            AppError::Classification(msg) => json!({
                "success": false,
                "error": msg,
            }),
            _ => json!({ "error": self.to_string() }),
        };

        (status, Json(body)).into_response()
    }
}
