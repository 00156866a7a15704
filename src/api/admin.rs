//! Admin API endpoints
//!
//! - GET/PUT /api/v1/admin/settings/notifications
//! - GET /api/v1/admin/stats

use axum::{extract::State, routing::get, Json, Router};
use serde::{Deserialize, Serialize};

use crate::api::middleware::{ApiError, AppState};
use crate::models::NotificationSettings;
use crate::services::{BookingStats, PostStats};

/// Overview numbers for the dashboard landing page
#[derive(Debug, Serialize, Deserialize)]
pub struct StatsResponse {
    pub posts: PostStats,
    pub bookings: BookingStats,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/settings/notifications",
            get(get_notification_settings).put(update_notification_settings),
        )
        .route("/stats", get(get_stats))
}

/// GET /api/v1/admin/settings/notifications
async fn get_notification_settings(
    State(state): State<AppState>,
) -> Result<Json<NotificationSettings>, ApiError> {
    Ok(Json(state.settings_service.notification_settings().await?))
}

/// PUT /api/v1/admin/settings/notifications
async fn update_notification_settings(
    State(state): State<AppState>,
    Json(body): Json<NotificationSettings>,
) -> Result<Json<NotificationSettings>, ApiError> {
    Ok(Json(state.settings_service.update_notification_settings(body).await?))
}

/// GET /api/v1/admin/stats
async fn get_stats(State(state): State<AppState>) -> Result<Json<StatsResponse>, ApiError> {
    let (posts, bookings) = tokio::try_join!(
        async { state.post_service.stats().await.map_err(ApiError::from) },
        async { state.booking_service.stats().await.map_err(ApiError::from) },
    )?;
    Ok(Json(StatsResponse { posts, bookings }))
}
