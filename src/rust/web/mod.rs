//! The browser-facing surface: a single page form plus a small JSON API.
//!
//! The classifier is injected once through [`AppState`]; handlers never reach
//! for globals.

use std::io;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use log::info;
use minijinja::Environment;
use tower_http::limit::RequestBodyLimitLayer;

use crate::classifier::{ClassifierInfo, EmotionPredictor};

pub mod handlers;
pub mod input;
pub mod render;

/// Largest request body accepted, form or JSON.
pub const MAX_BODY_BYTES: usize = 64 * 1024;

/// Shared, read-only state handed to every request.
#[derive(Clone)]
pub struct AppState {
    pub predictor: Arc<dyn EmotionPredictor>,
    pub info: Arc<ClassifierInfo>,
    pub templates: Arc<Environment<'static>>,
}

impl AppState {
    /// Fails only if the bundled page template does not parse.
    pub fn new(predictor: Arc<dyn EmotionPredictor>) -> Result<Self, minijinja::Error> {
        let info = Arc::new(predictor.info());
        let templates = Arc::new(render::environment()?);
        Ok(Self {
            predictor,
            info,
            templates,
        })
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/analyze", post(handlers::analyze))
        .route("/api/predict", post(handlers::api_predict))
        .route("/api/info", get(handlers::api_info))
        .route("/health", get(handlers::health))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .with_state(state)
}

/// Binds `addr` and serves until the process is stopped.
pub async fn serve(state: AppState, addr: &str) -> io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router(state)).await
}
