//! HTTP surface: LINE webhook, generated media, health

pub mod routes;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::line::LineHandler;

#[derive(Clone)]
pub struct AppState {
    pub handler: Arc<LineHandler>,
    /// Frame rate used when a reveal video has to be regenerated
    pub video_fps: u32,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(routes::health_check))
        .route("/callback", post(routes::callback))
        .route("/generate", get(routes::generate))
        .route("/:kind/:word", get(routes::media))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods(Any)
                        .allow_headers(Any),
                ),
        )
        .with_state(state)
}
