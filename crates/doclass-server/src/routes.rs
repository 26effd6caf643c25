//! HTTP routes and handlers

use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        DefaultBodyLimit, Multipart, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use doclass_core::{ClassificationResult, Degradation, TextSource};
use serde::Serialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::io::Write;
use std::time::Instant;
use tower_http::cors::CorsLayer;
use tracing::{debug, error, info, warn};

use crate::error::AppError;
use crate::state::AppState;

pub fn create_router(state: AppState) -> Router {
    let body_limit = state.max_upload_bytes;

    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics))
        .route("/classify", post(classify_document))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "service": "ml-classification",
        "model_loaded": state.context.is_ready(),
    }))
}

async fn metrics(State(state): State<AppState>) -> Response {
    match &state.metrics_handle {
        Some(handle) => handle.render().into_response(),
        None => (StatusCode::NOT_FOUND, "metrics recorder not installed").into_response(),
    }
}

/// Successful classification body
#[derive(Debug, Serialize)]
pub struct ClassifyResponse {
    pub success: bool,
    /// Same as `predicted_class`; kept for existing clients
    pub category: String,
    pub predicted_class: String,
    pub confidence: f64,
    pub probabilities: BTreeMap<String, f64>,
    pub degradation: Degradation,
}

impl From<ClassificationResult> for ClassifyResponse {
    fn from(result: ClassificationResult) -> Self {
        Self {
            success: true,
            category: result.predicted_class.clone(),
            predicted_class: result.predicted_class,
            confidence: result.confidence,
            probabilities: result.probabilities,
            degradation: result.degradation,
        }
    }
}

/// Uploaded document held in memory until spooled
struct Upload {
    filename: String,
    data: axum::body::Bytes,
}

async fn classify_document(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<ClassifyResponse>, AppError> {
    metrics::counter!("doclass_requests_total").increment(1);

    let classifier = state.context.classifier()?;
    // A body that is not multipart carries no file field
    let mut multipart = multipart.map_err(|_| AppError::NoFile)?;
    let upload = read_upload(&mut multipart).await?;
    validate_filename(&upload.filename)?;

    info!("Classifying: {}", upload.filename);

    let spooled = spool_upload(&state, &upload.data)?;
    let filename = upload.filename;

    let start = Instant::now();
    let outcome = tokio::task::spawn_blocking(move || {
        let result = classifier.classify(spooled.path());
        // Temp file is removed here on success and failure alike
        drop(spooled);
        result
    })
    .await
    .map_err(|e| AppError::Classification(format!("classification task failed: {}", e)))?;

    let latency_us = start.elapsed().as_micros() as f64;
    metrics::histogram!("doclass_classify_latency_us").record(latency_us);

    match outcome {
        Ok(result) => {
            record_degradation(&result.degradation);
            info!(
                "Classification complete: {} ({:.2}%)",
                result.predicted_class, result.confidence
            );
            Ok(Json(ClassifyResponse::from(result)))
        }
        Err(e) => {
            error!("Classification error for {}: {}", filename, e);
            Err(e.into())
        }
    }
}

async fn read_upload(multipart: &mut Multipart) -> Result<Upload, AppError> {
    while let Some(field) = multipart.next_field().await.map_err(upload_error)? {
        if field.name() != Some("file") {
            continue;
        }

        // A part without a filename is a plain form value, not a file
        let Some(filename) = field.file_name().map(str::to_string) else {
            continue;
        };
        let data = field.bytes().await.map_err(upload_error)?;

        debug!("Received upload {} ({} bytes)", filename, data.len());
        return Ok(Upload { filename, data });
    }

    Err(AppError::NoFile)
}

fn upload_error(err: MultipartError) -> AppError {
    AppError::Upload {
        status: err.status(),
        message: err.body_text(),
    }
}

/// Reject empty and non-PDF filenames
pub fn validate_filename(filename: &str) -> Result<(), AppError> {
    if filename.is_empty() {
        return Err(AppError::EmptyFilename);
    }

    if !filename.to_lowercase().ends_with(".pdf") {
        return Err(AppError::NotPdf);
    }

    Ok(())
}

/// Write the upload to a uniquely named temp file that deletes itself on drop
fn spool_upload(state: &AppState, data: &[u8]) -> Result<tempfile::NamedTempFile, AppError> {
    let spool_error =
        |e: std::io::Error| AppError::Classification(format!("failed to store upload: {}", e));

    std::fs::create_dir_all(&state.upload_dir).map_err(spool_error)?;

    let mut file = tempfile::Builder::new()
        .prefix("doclass-upload-")
        .suffix(".pdf")
        .tempfile_in(&state.upload_dir)
        .map_err(spool_error)?;

    file.write_all(data).map_err(spool_error)?;
    file.flush().map_err(spool_error)?;

    Ok(file)
}

fn record_degradation(degradation: &Degradation) {
    if degradation.text_source != TextSource::TextLayer {
        warn!(
            "Text branch degraded: {}",
            degradation.text_source.as_str()
        );
        metrics::counter!(
            "doclass_degradations_total",
            "stage" => degradation.text_source.as_str()
        )
        .increment(1);
    }

    if degradation.placeholder_image {
        warn!("Image branch degraded: placeholder page");
        metrics::counter!("doclass_degradations_total", "stage" => "placeholder_image")
            .increment(1);
    }
}
