use std::path::PathBuf;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::api::AppState;
use crate::generator::MediaKind;
use crate::identity::{FontKey, Word};

pub const SIGNATURE_HEADER: &str = "x-line-signature";

type ApiError = (StatusCode, String);

fn bad_request(message: impl ToString) -> ApiError {
    (StatusCode::BAD_REQUEST, message.to_string())
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "kasane-web",
        version: env!("CARGO_PKG_VERSION"),
    })
}

// ============================================================================
// Webhook
// ============================================================================

pub async fn callback(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    let outcome = state.handler.handle_callback(&body, signature).await;
    let status = StatusCode::from_u16(outcome.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, outcome.body).into_response()
}

// ============================================================================
// Media
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct FontQuery {
    pub font: Option<String>,
}

fn parse_target(
    state: &AppState,
    word: &str,
    font: Option<&str>,
) -> Result<(Word, FontKey), ApiError> {
    let word = Word::parse(word).map_err(bad_request)?;
    let font = state.handler.composer().normalize_font(font).map_err(bad_request)?;
    Ok((word, font))
}

/// Serve `<Kind>_<word>[_<font>].<ext>`, regenerating it when it has
/// already been cleaned up
pub async fn media(
    State(state): State<AppState>,
    Path((kind, word)): Path<(String, String)>,
    Query(query): Query<FontQuery>,
) -> Result<Response, ApiError> {
    let kind = MediaKind::from_route(&kind)
        .ok_or_else(|| (StatusCode::NOT_FOUND, format!("unknown media kind '{}'", kind)))?;
    let (word, font) = parse_target(&state, &word, query.font.as_deref())?;

    let composer = state.handler.composer();
    let path = composer.media_path(kind, &word, &font);
    if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
        info!("Regenerating {} for {} (font {})", kind.route(), word, font);
        let generated = match kind {
            MediaKind::Video | MediaKind::Preview => composer
                .generate_video(&word, &font, state.video_fps)
                .await
                .map(|_| ()),
            _ => composer.generate_images(&word, &font).await.map(|_| ()),
        };
        if let Err(e) = generated {
            error!("Media regeneration failed for {}: {}", word, e);
            return Err((StatusCode::INTERNAL_SERVER_ERROR, e.to_string()));
        }
    }

    match tokio::fs::read(&path).await {
        Ok(bytes) => Ok(([(header::CONTENT_TYPE, kind.content_type())], bytes).into_response()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            // e.g. an answer image for a word longer than two characters
            Err((StatusCode::NOT_FOUND, format!("{} not found", path.display())))
        }
        Err(e) => {
            error!("Reading {} failed: {}", path.display(), e);
            Err((StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
        }
    }
}

// ============================================================================
// Generate
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct GenerateQuery {
    pub jukugo: Option<String>,
    pub font: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    pub word: String,
    pub font: String,
    pub question_url: String,
    pub union_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview_url: Option<String>,
}

pub async fn generate(
    State(state): State<AppState>,
    Query(query): Query<GenerateQuery>,
) -> Result<Json<GenerateResponse>, ApiError> {
    let jukugo = query
        .jukugo
        .filter(|w| !w.trim().is_empty())
        .ok_or_else(|| bad_request("jukugo is required"))?;
    let (word, font) = parse_target(&state, jukugo.trim(), query.font.as_deref())?;

    let composer = state.handler.composer();
    let internal = |e: crate::error::KasaneError| {
        error!("Generate failed for {}: {}", word, e);
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    };
    let images = composer.generate_images(&word, &font).await.map_err(internal)?;
    let video = if word.char_count() >= 3 {
        Some(
            composer
                .generate_video(&word, &font, state.video_fps)
                .await
                .map_err(internal)?,
        )
    } else {
        None
    };

    let media = state.handler.media();
    let url = |kind: MediaKind, path: &PathBuf| {
        media.url_for(kind, &word, &font, path).map_err(|e| {
            warn!("Media URL unavailable: {}", e);
            (StatusCode::SERVICE_UNAVAILABLE, e.to_string())
        })
    };

    Ok(Json(GenerateResponse {
        word: word.to_string(),
        font: font.to_string(),
        question_url: url(MediaKind::Question, &images.question)?,
        union_url: url(MediaKind::Union, &images.union)?,
        answer_url: images
            .answer
            .as_ref()
            .map(|p| url(MediaKind::Answer, p))
            .transpose()?,
        video_url: video.as_ref().map(|v| url(MediaKind::Video, &v.video)).transpose()?,
        preview_url: video
            .as_ref()
            .map(|v| url(MediaKind::Preview, &v.preview))
            .transpose()?,
    }))
}
