//! Embedded static file serving under /static

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};

use crate::api::middleware::AppState;
use crate::api::site::error_page;
use crate::render::static_asset;

pub async fn serve_static(State(state): State<AppState>, Path(path): Path<String>) -> Response {
    match static_asset(&path) {
        Some(asset) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, asset.content_type),
                (header::CACHE_CONTROL, "public, max-age=3600"),
            ],
            Body::from(asset.data.into_owned()),
        )
            .into_response(),
        None => {
            tracing::debug!("Static file not found: {}", path);
            error_page(
                &state,
                StatusCode::NOT_FOUND,
                "File not found.",
                &format!("/static/{}", path),
            )
        }
    }
}
