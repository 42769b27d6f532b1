use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use moodlens::web::{router, AppState};
use moodlens::{
    decide, Calibration, ClassList, ClassifierError, ClassifierInfo, EmotionPredictor, LabelConfig, PredictOptions,
    Prediction, Thresholds,
};
use tower::ServiceExt;

/// Stands in for the ONNX model: returns fixed logits and counts calls.
struct StubPredictor {
    config: LabelConfig,
    logits: Vec<f32>,
    fail: bool,
    calls: AtomicUsize,
}

impl StubPredictor {
    fn new(probabilities: &[f32]) -> Arc<Self> {
        let config = LabelConfig::new(
            ClassList::parse("joy\nsadness\nanger\n").unwrap(),
            Thresholds::new(vec![0.5, 0.5, 0.5]).unwrap(),
            Calibration::Identity,
        )
        .unwrap();
        Arc::new(Self {
            config,
            logits: probabilities.iter().map(|&p| (p / (1.0 - p)).ln()).collect(),
            fail: false,
            calls: AtomicUsize::new(0),
        })
    }

    fn failing() -> Arc<Self> {
        let mut stub = Arc::try_unwrap(Self::new(&[0.5, 0.5, 0.5])).ok().unwrap();
        stub.fail = true;
        Arc::new(stub)
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl EmotionPredictor for StubPredictor {
    fn predict_with(&self, _text: &str, options: &PredictOptions) -> Result<Prediction, ClassifierError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(ClassifierError::ModelError("boom".into()));
        }
        if options.max_length == 0 {
            return Err(ClassifierError::ValidationError("max_length must be greater than zero".into()));
        }
        decide(&self.logits, &self.config, options.top_k_fallback)
    }

    fn info(&self) -> ClassifierInfo {
        ClassifierInfo {
            model_path: "stub/model.onnx".into(),
            tokenizer_path: "stub/tokenizer.json".into(),
            num_classes: self.config.num_classes(),
            class_labels: self.config.classes().as_slice().to_vec(),
            thresholds: self.config.thresholds().as_slice().to_vec(),
            mean_threshold: self.config.thresholds().mean(),
            calibration: self.config.calibration().mode_name().into(),
            max_length: 128,
        }
    }
}

fn app(stub: &Arc<StubPredictor>) -> Router {
    let predictor: Arc<dyn EmotionPredictor> = stub.clone();
    router(AppState::new(predictor).unwrap())
}

async fn body_text(response: axum::response::Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn post_form(app: Router, form: &str) -> (StatusCode, String) {
    let request = Request::builder()
        .method("POST")
        .uri("/analyze")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(form.to_string()))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    (status, body_text(response).await)
}

async fn post_json(app: Router, json: serde_json::Value) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("POST")
        .uri("/api/predict")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json.to_string()))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body = body_text(response).await;
    (status, serde_json::from_str(&body).unwrap())
}

#[tokio::test]
async fn test_index_renders_form() {
    let stub = StubPredictor::new(&[0.8, 0.2, 0.3]);
    let response = app(&stub)
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains("action=\"/analyze\""));
    assert!(html.contains("<li>sadness</li>"));
    assert_eq!(stub.calls(), 0);
}

#[tokio::test]
async fn test_empty_text_is_rejected_before_prediction() {
    let stub = StubPredictor::new(&[0.8, 0.2, 0.3]);
    let (status, html) = post_form(app(&stub), "text=&top_k=3").await;
    assert_eq!(status, StatusCode::OK);
    assert!(html.contains("Please enter some text to analyze"));
    assert!(!html.contains("Analysis results"));
    assert_eq!(stub.calls(), 0);
}

#[tokio::test]
async fn test_short_text_is_rejected_before_prediction() {
    let stub = StubPredictor::new(&[0.8, 0.2, 0.3]);
    let (_, html) = post_form(app(&stub), "text=+hi+&top_k=3").await;
    assert!(html.contains("Enter at least 3 characters"));
    assert_eq!(stub.calls(), 0);
}

#[tokio::test]
async fn test_analyze_renders_selected_emotions() {
    let stub = StubPredictor::new(&[0.8, 0.2, 0.3]);
    let (status, html) = post_form(app(&stub), "text=We+finally+won+the+cup%21&top_k=3").await;
    assert_eq!(status, StatusCode::OK);
    assert!(html.contains("1 emotion(s) detected"));
    assert!(html.contains("<strong>joy</strong>"));
    assert!(html.contains("High confidence"));
    assert!(html.contains("We finally won the cup!</textarea>"));
    assert!(!html.contains("All probabilities"));
    assert_eq!(stub.calls(), 1);
}

#[tokio::test]
async fn test_fallback_uses_slider_value() {
    let stub = StubPredictor::new(&[0.1, 0.4, 0.3]);
    let (_, html) = post_form(app(&stub), "text=not+sure+how+I+feel&top_k=2").await;
    assert!(html.contains("2 emotion(s) detected"));
    let sadness = html.find("<strong>sadness</strong>").unwrap();
    let anger = html.find("<strong>anger</strong>").unwrap();
    assert!(sadness < anger);
    assert!(!html.contains("<strong>joy</strong>"));
}

#[tokio::test]
async fn test_slider_value_is_clamped() {
    let stub = StubPredictor::new(&[0.1, 0.4, 0.3]);
    let (_, html) = post_form(app(&stub), "text=not+sure+how+I+feel&top_k=0").await;
    assert!(html.contains("1 emotion(s) detected"));
    assert!(html.contains("value=\"1\""));

    let (_, html) = post_form(app(&stub), "text=not+sure+how+I+feel&top_k=50").await;
    assert!(html.contains("3 emotion(s) detected"));
    assert!(html.contains("value=\"10\""));
}

#[tokio::test]
async fn test_show_all_renders_table() {
    let stub = StubPredictor::new(&[0.8, 0.2, 0.3]);
    let (_, html) = post_form(app(&stub), "text=What+a+great+day&top_k=3&show_all=on").await;
    assert!(html.contains("All probabilities"));
    assert!(html.contains("<td>✅</td><td><strong>joy</strong></td>"));
    assert!(html.contains("<td>❌</td><td><strong>anger</strong></td>"));
    assert!(html.contains("name=\"show_all\" checked"));
}

#[tokio::test]
async fn test_inference_failure_is_shown() {
    let stub = StubPredictor::failing();
    let (status, html) = post_form(app(&stub), "text=What+a+great+day").await;
    assert_eq!(status, StatusCode::OK);
    assert!(html.contains("Analysis failed: Model error: boom"));
    assert_eq!(stub.calls(), 1);
}

#[tokio::test]
async fn test_api_predict() {
    let stub = StubPredictor::new(&[0.8, 0.6, 0.3]);
    let (status, body) = post_json(app(&stub), serde_json::json!({ "text": "this is wonderful" })).await;
    assert_eq!(status, StatusCode::OK);
    let labels: Vec<&str> = body["selected"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["label"].as_str().unwrap())
        .collect();
    assert_eq!(labels, vec!["joy", "sadness"]);
    assert_eq!(body["probabilities"].as_array().unwrap().len(), 3);
    assert_eq!(body["fallback"], false);
}

#[tokio::test]
async fn test_api_predict_without_fallback() {
    let stub = StubPredictor::new(&[0.1, 0.4, 0.3]);
    let (status, body) = post_json(app(&stub), serde_json::json!({ "text": "meh, whatever", "top_k": 0 })).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["selected"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_api_predict_rejects_short_text() {
    let stub = StubPredictor::new(&[0.8, 0.2, 0.3]);
    let (status, body) = post_json(app(&stub), serde_json::json!({ "text": "ok" })).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "Enter at least 3 characters");
    assert_eq!(stub.calls(), 0);
}

#[tokio::test]
async fn test_api_predict_reports_errors() {
    let stub = StubPredictor::new(&[0.8, 0.2, 0.3]);
    let (status, _) = post_json(app(&stub), serde_json::json!({ "text": "fine text", "max_length": 0 })).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let stub = StubPredictor::failing();
    let (status, body) = post_json(app(&stub), serde_json::json!({ "text": "fine text" })).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Model error: boom");
}

#[tokio::test]
async fn test_api_predict_bounds_max_length() {
    let stub = StubPredictor::new(&[0.8, 0.2, 0.3]);
    let (status, body) = post_json(
        app(&stub),
        serde_json::json!({ "text": "hello there", "max_length": 4_000_000_000u64 }),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "max_length must be between 1 and 128");

    let (status, _) = post_json(app(&stub), serde_json::json!({ "text": "hello there", "max_length": 129 })).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(stub.calls(), 0);

    let (status, _) = post_json(app(&stub), serde_json::json!({ "text": "hello there", "max_length": 64 })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stub.calls(), 1);
}

#[tokio::test]
async fn test_api_info_and_health() {
    let stub = StubPredictor::new(&[0.8, 0.2, 0.3]);
    let response = app(&stub)
        .oneshot(Request::builder().uri("/api/info").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let info: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(info["num_classes"], 3);
    assert_eq!(info["calibration"], "none");

    let response = app(&stub)
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(body_text(response).await, "ok");
}

#[tokio::test]
async fn test_oversized_body_is_refused() {
    let stub = StubPredictor::new(&[0.8, 0.2, 0.3]);
    let form = format!("text={}", "a".repeat(100 * 1024));
    let request = Request::builder()
        .method("POST")
        .uri("/analyze")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .header(header::CONTENT_LENGTH, form.len())
        .body(Body::from(form))
        .unwrap();
    let response = app(&stub).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(stub.calls(), 0);
}
