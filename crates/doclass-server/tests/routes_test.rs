//! HTTP route tests driven through the router without a network listener

use axum::body::Body;
use axum::http::{Request, StatusCode};
use doclass_classifiers::prelude::*;
use doclass_classifiers::{
    build_wordpiece_tokenizer, EncodedInput, FeatureEncoder, OcrEngine, PageRenderer, TextLayer,
};
use doclass_server::{create_router, AppState, ServerConfig};
use image::{DynamicImage, GrayImage, Rgb, RgbImage};
use serde_json::Value;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tower::ServiceExt;

const BOUNDARY: &str = "doclass-test-boundary";

struct FixedTextLayer {
    calls: Arc<AtomicU32>,
}

impl TextLayer for FixedTextLayer {
    fn extract_text(&self, path: &Path) -> Result<String> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        assert!(path.exists(), "upload must exist during classification");
        Ok("invoice number total amount due payment terms net thirty days".to_string())
    }
}

struct FixedRenderer;

impl PageRenderer for FixedRenderer {
    fn render_first_page(&self, _path: &Path, _dpi: u32) -> Result<DynamicImage> {
        Ok(DynamicImage::ImageRgb8(RgbImage::from_pixel(
            100,
            140,
            Rgb([250, 250, 250]),
        )))
    }
}

struct SilentOcr;

impl OcrEngine for SilentOcr {
    fn recognize(&self, _image: &GrayImage) -> Result<String> {
        Ok(String::new())
    }

    fn name(&self) -> &str {
        "silent"
    }
}

struct FixedScorer(Vec<f32>);

impl FusionScorer for FixedScorer {
    fn score(&self, _input: &EncodedInput) -> Result<Vec<f32>> {
        Ok(self.0.clone())
    }

    fn num_classes(&self) -> usize {
        self.0.len()
    }

    fn name(&self) -> &str {
        "fixed"
    }
}

struct FailingScorer;

impl FusionScorer for FailingScorer {
    fn score(&self, _input: &EncodedInput) -> Result<Vec<f32>> {
        Err(Error::inference("Model forward pass failed: out of memory"))
    }

    fn num_classes(&self) -> usize {
        3
    }

    fn name(&self) -> &str {
        "failing"
    }
}

fn required_files() -> Vec<String> {
    vec!["hybrid_pdf_ocr_model.pt".to_string(), "label_map.json".to_string()]
}

struct TestApp {
    router: axum::Router,
    text_calls: Arc<AtomicU32>,
    upload_dir: tempfile::TempDir,
    _vocab_dir: tempfile::TempDir,
}

fn ready_app(scorer: Arc<dyn FusionScorer>) -> TestApp {
    ready_app_with_limit(scorer, ServerConfig::default().max_upload_bytes)
}

fn ready_app_with_limit(scorer: Arc<dyn FusionScorer>, max_upload_bytes: usize) -> TestApp {
    let vocab_dir = tempfile::tempdir().unwrap();
    let vocab = vocab_dir.path().join("vocab.txt");
    std::fs::write(&vocab, "[PAD]\n[UNK]\n[CLS]\n[SEP]\ninvoice\ntotal\n").unwrap();
    let encoder =
        FeatureEncoder::new(build_wordpiece_tokenizer(&vocab).unwrap(), 32, 224).unwrap();

    let text_calls = Arc::new(AtomicU32::new(0));
    let renderer = Arc::new(FixedRenderer);
    let extractor = TextExtractor::new(
        Arc::new(FixedTextLayer {
            calls: text_calls.clone(),
        }),
        renderer.clone(),
        Arc::new(SilentOcr),
    );
    let rasterizer = PageRasterizer::new(renderer, 150, 224);
    let labels = LabelMap::from_labels(["contract", "invoice", "resume"]).unwrap();

    let classifier =
        DocumentClassifier::new(extractor, rasterizer, encoder, scorer, labels).unwrap();

    app_with_context(
        ClassifierContext::ready(classifier, required_files()),
        text_calls,
        vocab_dir,
        max_upload_bytes,
    )
}

fn not_ready_app() -> TestApp {
    let context = ClassifierContext::unavailable(required_files(), "Model file not found");
    app_with_context(
        context,
        Arc::new(AtomicU32::new(0)),
        tempfile::tempdir().unwrap(),
        ServerConfig::default().max_upload_bytes,
    )
}

fn app_with_context(
    context: ClassifierContext,
    text_calls: Arc<AtomicU32>,
    vocab_dir: tempfile::TempDir,
    max_upload_bytes: usize,
) -> TestApp {
    let upload_dir = tempfile::tempdir().unwrap();
    let config = ServerConfig {
        upload_dir: Some(upload_dir.path().to_path_buf()),
        max_upload_bytes,
        ..Default::default()
    };

    TestApp {
        router: create_router(AppState::new(&config, context, None)),
        text_calls,
        upload_dir,
        _vocab_dir: vocab_dir,
    }
}

fn multipart_request(field: &str, filename: Option<&str>, content: &[u8]) -> Request<Body> {
    let disposition = match filename {
        Some(name) => format!("form-data; name=\"{}\"; filename=\"{}\"", field, name),
        None => format!("form-data; name=\"{}\"", field),
    };

    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    body.extend_from_slice(format!("Content-Disposition: {}\r\n", disposition).as_bytes());
    body.extend_from_slice(b"Content-Type: application/pdf\r\n\r\n");
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());

    Request::builder()
        .method("POST")
        .uri("/classify")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

async fn send(router: axum::Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn upload_dir_is_empty(app: &TestApp) -> bool {
    std::fs::read_dir(app.upload_dir.path()).unwrap().next().is_none()
}

#[tokio::test]
async fn test_health_reports_model_state() {
    let app = ready_app(Arc::new(FixedScorer(vec![0.0, 1.0, 0.0])));
    let request = Request::get("/health").body(Body::empty()).unwrap();
    let (status, body) = send(app.router.clone(), request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "ml-classification");
    assert_eq!(body["model_loaded"], true);

    let app = not_ready_app();
    let request = Request::get("/health").body(Body::empty()).unwrap();
    let (_, body) = send(app.router.clone(), request).await;
    assert_eq!(body["model_loaded"], false);
}

#[tokio::test]
async fn test_classify_success() {
    let app = ready_app(Arc::new(FixedScorer(vec![0.1, 3.0, -0.5])));
    let request = multipart_request("file", Some("Invoice-2024.PDF"), b"%PDF-1.4 fake");
    let (status, body) = send(app.router.clone(), request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["category"], "invoice");
    assert_eq!(body["predicted_class"], "invoice");

    let probabilities = body["probabilities"].as_object().unwrap();
    assert_eq!(probabilities.len(), 3);
    let total: f64 = probabilities.values().map(|v| v.as_f64().unwrap()).sum();
    assert!((total - 100.0).abs() < 1e-3);
    assert_eq!(body["confidence"], body["probabilities"]["invoice"]);
    assert_eq!(body["degradation"]["text_source"], "text_layer");

    assert_eq!(app.text_calls.load(Ordering::Relaxed), 1);
    assert!(upload_dir_is_empty(&app), "spooled upload must be removed");
}

#[tokio::test]
async fn test_non_pdf_rejected_before_extraction() {
    let app = ready_app(Arc::new(FixedScorer(vec![0.0, 1.0, 0.0])));
    let request = multipart_request("file", Some("notes.txt"), b"plain text");
    let (status, body) = send(app.router.clone(), request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Only PDF files are supported");
    assert_eq!(app.text_calls.load(Ordering::Relaxed), 0);
    assert!(upload_dir_is_empty(&app));
}

#[tokio::test]
async fn test_missing_file_field() {
    let app = ready_app(Arc::new(FixedScorer(vec![0.0, 1.0, 0.0])));
    let request = multipart_request("document", Some("report.pdf"), b"%PDF-1.4");
    let (status, body) = send(app.router.clone(), request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No file provided");
}

#[tokio::test]
async fn test_non_multipart_body_has_no_file() {
    let app = ready_app(Arc::new(FixedScorer(vec![0.0, 1.0, 0.0])));
    let request = Request::post("/classify")
        .header("content-type", "application/json")
        .body(Body::from("{}"))
        .unwrap();
    let (status, body) = send(app.router.clone(), request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No file provided");
}

#[tokio::test]
async fn test_file_part_without_filename_has_no_file() {
    let app = ready_app(Arc::new(FixedScorer(vec![0.0, 1.0, 0.0])));
    let request = multipart_request("file", None, b"%PDF-1.4");
    let (status, body) = send(app.router.clone(), request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No file provided");
    assert_eq!(app.text_calls.load(Ordering::Relaxed), 0);
}

#[tokio::test]
async fn test_oversized_upload_is_payload_too_large() {
    let app = ready_app_with_limit(Arc::new(FixedScorer(vec![0.0, 1.0, 0.0])), 1024);
    let content = vec![b'x'; 8 * 1024];
    let request = multipart_request("file", Some("large.pdf"), &content);
    let (status, body) = send(app.router.clone(), request).await;

    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert!(body["error"].is_string());
    assert_eq!(app.text_calls.load(Ordering::Relaxed), 0);
    assert!(upload_dir_is_empty(&app));
}

#[tokio::test]
async fn test_empty_filename() {
    let app = ready_app(Arc::new(FixedScorer(vec![0.0, 1.0, 0.0])));
    let request = multipart_request("file", Some(""), b"");
    let (status, body) = send(app.router.clone(), request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No file selected");
}

#[tokio::test]
async fn test_not_ready_names_required_files() {
    let app = not_ready_app();
    let request = multipart_request("file", Some("notes.txt"), b"anything");
    let (status, body) = send(app.router.clone(), request).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().contains("not loaded"));
    assert_eq!(
        body["required_files"],
        serde_json::json!(["hybrid_pdf_ocr_model.pt", "label_map.json"])
    );
    assert!(body.get("success").is_none());
}

#[tokio::test]
async fn test_inference_failure_is_distinct_and_cleans_up() {
    let app = ready_app(Arc::new(FailingScorer));
    let request = multipart_request("file", Some("report.pdf"), b"%PDF-1.4 fake");
    let (status, body) = send(app.router.clone(), request).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("out of memory"));
    assert!(body.get("required_files").is_none());
    assert!(upload_dir_is_empty(&app), "spooled upload must be removed on error");
}

#[tokio::test]
async fn test_metrics_without_recorder() {
    let app = not_ready_app();
    let request = Request::get("/metrics").body(Body::empty()).unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
