use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::{Form, Json};
use log::{error, info, warn};
use serde::Deserialize;

use super::input;
use super::render::{self, Outcome, PageView, MAX_TOP_K, MIN_TOP_K};
use super::AppState;
use crate::classifier::{ClassifierError, ClassifierInfo, PredictOptions, Prediction, DEFAULT_TOP_K_FALLBACK};

fn default_top_k() -> usize {
    DEFAULT_TOP_K_FALLBACK
}

/// Fields posted by the page form.
#[derive(Debug, Deserialize)]
pub struct AnalyzeForm {
    #[serde(default)]
    pub text: String,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Browsers send `on` for a checked box and omit the field otherwise
    #[serde(default)]
    pub show_all: Option<String>,
}

/// JSON body accepted by `/api/predict`.
#[derive(Debug, Deserialize)]
pub struct PredictRequest {
    pub text: String,
    #[serde(default)]
    pub top_k: Option<usize>,
    #[serde(default)]
    pub max_length: Option<usize>,
}

pub async fn index(State(state): State<AppState>) -> Response {
    render_page(&state, &PageView {
        info: &state.info,
        text: "",
        top_k: DEFAULT_TOP_K_FALLBACK,
        show_all: false,
        outcome: Outcome::Idle,
    })
}

pub async fn analyze(State(state): State<AppState>, Form(form): Form<AnalyzeForm>) -> Response {
    let top_k = form.top_k.clamp(MIN_TOP_K, MAX_TOP_K);
    let show_all = form.show_all.is_some();

    let outcome = match input::check(&form.text) {
        Err(warning) => Outcome::Warning(warning),
        Ok(()) => {
            let options = PredictOptions {
                top_k_fallback: top_k,
                ..state.predictor.default_options()
            };
            match run_prediction(&state, form.text.clone(), options).await {
                Ok(prediction) => Outcome::Success(prediction),
                Err(e) => Outcome::Failure(e.to_string()),
            }
        }
    };

    render_page(&state, &PageView {
        info: &state.info,
        text: &form.text,
        top_k,
        show_all,
        outcome,
    })
}

pub async fn api_predict(State(state): State<AppState>, Json(request): Json<PredictRequest>) -> Result<Json<Prediction>, ApiError> {
    input::check(&request.text).map_err(|warning| ApiError::new(StatusCode::UNPROCESSABLE_ENTITY, warning.message()))?;

    let defaults = state.predictor.default_options();
    let max_length = request.max_length.unwrap_or(defaults.max_length);
    if max_length == 0 || max_length > state.info.max_length {
        return Err(ApiError::new(
            StatusCode::UNPROCESSABLE_ENTITY,
            format!("max_length must be between 1 and {}", state.info.max_length),
        ));
    }
    let options = PredictOptions {
        max_length,
        top_k_fallback: request.top_k.unwrap_or(defaults.top_k_fallback),
    };

    run_prediction(&state, request.text, options)
        .await
        .map(Json)
        .map_err(ApiError::from)
}

pub async fn api_info(State(state): State<AppState>) -> Json<ClassifierInfo> {
    Json(state.info.as_ref().clone())
}

pub async fn health() -> &'static str {
    "ok"
}

fn render_page(state: &AppState, view: &PageView<'_>) -> Response {
    match render::page(&state.templates, view) {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            error!("Failed to render page: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to render page").into_response()
        }
    }
}

/// Runs the blocking forward pass off the async executor.
async fn run_prediction(state: &AppState, text: String, options: PredictOptions) -> Result<Prediction, ClassifierError> {
    let predictor = Arc::clone(&state.predictor);
    let chars = text.chars().count();
    let result = tokio::task::spawn_blocking(move || predictor.predict_with(&text, &options))
        .await
        .map_err(|e| ClassifierError::PredictionError(format!("Prediction task failed: {}", e)))?;

    match &result {
        Ok(prediction) => info!(
            "Analyzed {} characters: {} emotion(s) reported",
            chars,
            prediction.selected.len()
        ),
        Err(e) if e.is_inference_failure() => error!("Inference failed: {}", e),
        Err(e) => warn!("Prediction rejected: {}", e),
    }
    result
}

/// Error body returned by the JSON API.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl From<ClassifierError> for ApiError {
    fn from(err: ClassifierError) -> Self {
        let status = match err {
            ClassifierError::ValidationError(_) => StatusCode::UNPROCESSABLE_ENTITY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(serde_json::json!({ "error": self.message }))).into_response()
    }
}
