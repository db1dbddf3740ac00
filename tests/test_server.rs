//! Integration test: HTTP API

use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use catdog_classifier::error::{ClassifierError, Result};
use catdog_classifier::inference::{InferenceConfig, ModelBackend, ModelRuntime, OutputConvention};
use catdog_classifier::monitoring::ServiceMetrics;
use catdog_classifier::pipeline::ClassificationPipeline;
use catdog_classifier::preprocessing::{InputTensor, PreprocessingConfig};
use catdog_classifier::server::{create_router, AppState, ServerConfig};
use catdog_classifier::tracking::{
    Artifact, Experiment, ExperimentLogger, ExperimentRecord, LogDispatch, TrackingConfig,
    TrackingStore,
};
use image::{ImageFormat, Rgb, RgbImage};
use tower::ServiceExt;

struct FixedBackend {
    values: Vec<f32>,
    calls: AtomicUsize,
}

impl ModelBackend for FixedBackend {
    fn describe(&self) -> String {
        "fixed".to_string()
    }

    fn output_width(&self) -> Option<usize> {
        Some(self.values.len())
    }

    fn predict(&self, _input: &InputTensor) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.values.clone())
    }
}

/// Store that rejects every write
struct UnavailableStore;

impl TrackingStore for UnavailableStore {
    fn ensure_experiment(&self, _name: &str) -> Result<Experiment> {
        Err(ClassifierError::LoggingFailure("tracking server unreachable".to_string()))
    }

    fn append(
        &self,
        _experiment: &str,
        _record: ExperimentRecord,
        _artifact: Option<Artifact<'_>>,
    ) -> Result<ExperimentRecord> {
        Err(ClassifierError::LoggingFailure("disk full".to_string()))
    }
}

struct Fixture {
    app: axum::Router,
    state: Arc<AppState>,
    backend: Arc<FixedBackend>,
    _dir: tempfile::TempDir,
}

fn fixture_with(
    values: Vec<f32>,
    convention: OutputConvention,
    store: Option<Arc<dyn TrackingStore>>,
    server: ServerConfig,
    dispatch: LogDispatch,
) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let backend = Arc::new(FixedBackend {
        values,
        calls: AtomicUsize::new(0),
    });

    let preprocessing = PreprocessingConfig::new().with_target_size(32, 32);
    let inference = InferenceConfig::new()
        .with_output_convention(convention)
        .with_warmup(false);
    let runtime = ModelRuntime::from_backend(
        backend.clone(),
        inference,
        preprocessing.tensor_shape(),
    )
    .unwrap();

    let metrics = Arc::new(ServiceMetrics::default());
    let tracking = TrackingConfig::new()
        .with_dir(dir.path())
        .with_dispatch(dispatch);
    let logger = match store {
        Some(store) => ExperimentLogger::new(store, tracking, metrics.clone()),
        None => ExperimentLogger::local(tracking, metrics.clone()),
    };

    let pipeline =
        ClassificationPipeline::new(Arc::new(runtime), preprocessing, Arc::new(logger), metrics)
            .unwrap();
    let state = Arc::new(AppState::ready(server, Arc::new(pipeline)));

    Fixture {
        app: create_router(state.clone()),
        state,
        backend,
        _dir: dir,
    }
}

fn fixture(values: Vec<f32>, convention: OutputConvention) -> Fixture {
    fixture_with(
        values,
        convention,
        None,
        ServerConfig::default(),
        LogDispatch::Inline,
    )
}

fn png(width: u32, height: u32, color: [u8; 3]) -> Vec<u8> {
    let img = RgbImage::from_pixel(width, height, Rgb(color));
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png).unwrap();
    buf.into_inner()
}

const BOUNDARY: &str = "catdog-test-boundary";

fn upload(field: &str, file_name: &str, content_type: &str, data: &[u8]) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri("/api")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .header(header::CONTENT_LENGTH, body.len())
        .body(Body::from(body))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

fn assert_well_formed(json: &serde_json::Value) {
    let cat = json["probabilities"]["cat"].as_f64().unwrap();
    let dog = json["probabilities"]["dog"].as_f64().unwrap();
    let confidence = json["confidence"].as_f64().unwrap();

    assert!((cat + dog - 1.0).abs() < 1e-4, "probabilities sum to {}", cat + dog);
    assert!((confidence - cat.max(dog)).abs() < 1e-9);
    let expected = if cat > dog { "cat" } else { "dog" };
    if (cat - dog).abs() > 1e-4 {
        assert_eq!(json["classification"], expected);
    }
}

#[tokio::test]
async fn test_health_reports_model_loaded() {
    let fx = fixture(vec![0.5], OutputConvention::Sigmoid);
    let response = fx.app.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = json_body(response).await;
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["model_loaded"], true);
    assert!(json["version"].is_string());
    assert!(json["uptime_secs"].as_i64().unwrap() >= 0);
}

#[tokio::test]
async fn test_ready_when_loaded() {
    let fx = fixture(vec![0.5], OutputConvention::Sigmoid);
    let response = fx.app.oneshot(get("/ready")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_classify_dog() {
    let fx = fixture(vec![0.8], OutputConvention::Sigmoid);
    let response = fx
        .app
        .oneshot(upload("file", "rex.png", "image/png", &png(50, 40, [90, 60, 30])))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = json_body(response).await;
    assert_eq!(json["classification"], "dog");
    assert!((json["confidence"].as_f64().unwrap() - 0.8).abs() < 1e-4);
    assert_well_formed(&json);
}

#[tokio::test]
async fn test_calibration_image_scores_cat() {
    let fx = fixture(vec![0.95, 0.05], OutputConvention::Probabilities);
    let response = fx
        .app
        .oneshot(upload("file", "tabby.png", "image/png", &png(64, 64, [128, 128, 128])))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = json_body(response).await;
    assert_eq!(json["classification"], "cat");
    assert!((json["confidence"].as_f64().unwrap() - 0.95).abs() < 1e-4);
    assert!((json["probabilities"]["cat"].as_f64().unwrap() - 0.95).abs() < 1e-4);
    assert!((json["probabilities"]["dog"].as_f64().unwrap() - 0.05).abs() < 1e-4);
}

#[tokio::test]
async fn test_softmax_logits() {
    let fx = fixture(vec![-1.0, 2.5], OutputConvention::Softmax);
    let response = fx
        .app
        .oneshot(upload("file", "a.png", "image/png", &png(20, 30, [1, 2, 3])))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = json_body(response).await;
    assert_eq!(json["classification"], "dog");
    assert_well_formed(&json);
}

#[tokio::test]
async fn test_all_zero_image() {
    let fx = fixture(vec![0.3], OutputConvention::Sigmoid);
    let response = fx
        .app
        .oneshot(upload("file", "black.png", "image/png", &png(32, 32, [0, 0, 0])))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_well_formed(&json_body(response).await);
}

#[tokio::test]
async fn test_text_upload_rejected_before_runtime() {
    let fx = fixture(vec![0.8], OutputConvention::Sigmoid);
    let response = fx
        .app
        .oneshot(upload("file", "notes.txt", "text/plain", b"definitely not a cat"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = json_body(response).await;
    assert_eq!(json["error"], true);
    assert!(json["message"].as_str().unwrap().contains("image"));
    assert_eq!(fx.backend.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_mislabelled_text_rejected() {
    let fx = fixture(vec![0.8], OutputConvention::Sigmoid);
    let response = fx
        .app
        .oneshot(upload("file", "fake.jpg", "image/jpeg", b"just text pretending"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(fx.backend.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_missing_file_field() {
    let fx = fixture(vec![0.8], OutputConvention::Sigmoid);
    let request = Request::builder()
        .method("POST")
        .uri("/api")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"comment\"\r\n\r\nhello\r\n--{BOUNDARY}--\r\n"
        )))
        .unwrap();

    let response = fx.app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_tracking_failure_does_not_fail_request() {
    let fx = fixture_with(
        vec![0.1],
        OutputConvention::Sigmoid,
        Some(Arc::new(UnavailableStore)),
        ServerConfig::default(),
        LogDispatch::Inline,
    );
    let response = fx
        .app
        .clone()
        .oneshot(upload("file", "tom.png", "image/png", &png(32, 32, [10, 10, 10])))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = json_body(response).await;
    assert_eq!(json["classification"], "cat");
    assert!((json["confidence"].as_f64().unwrap() - 0.9).abs() < 1e-4);

    // inline dispatch: the failure is already counted
    assert_eq!(fx.state.metrics().logging_failures(), 1);
}

#[tokio::test]
async fn test_background_tracking_failure_keeps_response() {
    let fx = fixture_with(
        vec![0.8],
        OutputConvention::Sigmoid,
        Some(Arc::new(UnavailableStore)),
        ServerConfig::default(),
        LogDispatch::Background,
    );
    let response = fx
        .app
        .clone()
        .oneshot(upload("file", "rex.png", "image/png", &png(32, 32, [90, 60, 30])))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = json_body(response).await;
    assert_well_formed(&json);
    assert_eq!(json["classification"], "dog");

    // the record is written after the response, so wait for the counter
    let mut failures = 0;
    for _ in 0..200 {
        failures = fx.state.metrics().logging_failures();
        if failures > 0 {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert_eq!(failures, 1);
}

#[tokio::test]
async fn test_degraded_start_never_reaches_runtime() {
    let state = Arc::new(AppState::degraded(
        ServerConfig::default(),
        Arc::new(ServiceMetrics::default()),
        "model file not found",
    ));
    let app = create_router(state);

    let response = app
        .clone()
        .oneshot(upload("file", "rex.png", "image/png", &png(8, 8, [1, 1, 1])))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let json = json_body(response).await;
    assert_eq!(json["message"], "Model not loaded");

    let response = app.clone().oneshot(get("/ready")).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let json = json_body(app.oneshot(get("/health")).await.unwrap()).await;
    assert_eq!(json["model_loaded"], false);
}

#[tokio::test]
async fn test_oversized_upload_rejected() {
    let server = ServerConfig {
        max_upload_size: 1024,
        ..ServerConfig::default()
    };
    let fx = fixture_with(
        vec![0.5],
        OutputConvention::Sigmoid,
        None,
        server,
        LogDispatch::Inline,
    );

    let response = fx
        .app
        .oneshot(upload("file", "big.png", "image/png", &vec![0u8; 4096]))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(fx.backend.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_stats_endpoint() {
    let fx = fixture(vec![0.7], OutputConvention::Sigmoid);

    let ok = fx
        .app
        .clone()
        .oneshot(upload("file", "a.png", "image/png", &png(16, 16, [5, 5, 5])))
        .await
        .unwrap();
    assert_eq!(ok.status(), StatusCode::OK);
    let bad = fx
        .app
        .clone()
        .oneshot(upload("file", "a.txt", "text/plain", b"nope"))
        .await
        .unwrap();
    assert_eq!(bad.status(), StatusCode::BAD_REQUEST);

    let json = json_body(fx.app.oneshot(get("/api/stats")).await.unwrap()).await;
    assert_eq!(json["total_requests"], 2);
    assert_eq!(json["classified"], 1);
    assert_eq!(json["rejected_inputs"], 1);
    assert_eq!(json["runs_logged"], 1);
}

#[tokio::test]
async fn test_unknown_route_and_method() {
    let fx = fixture(vec![0.5], OutputConvention::Sigmoid);

    let response = fx.app.clone().oneshot(get("/nope")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = fx.app.oneshot(get("/api")).await.unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}
