//! Admin dashboard page
//!
//! GET /admin renders the booking and post lists for a signed-in admin, or
//! the sign-in form otherwise. `static/js/admin.js` then keeps the tables
//! current from `/api/v1/admin/events` and applies edits optimistically.

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::Response,
    routing::get,
    Router,
};
use chrono::NaiveDate;
use serde::Deserialize;
use tera::Context;

use crate::api::middleware::{extract_session_token, AppState};
use crate::api::site::{error_page, render};
use crate::dashboard::{BookingFilter, DashboardSession, ServiceBackend};
use crate::models::{BookingStatus, User};

const ADMIN_PATH: &str = "/admin";

/// Filter form fields as submitted. Blank or unparsable fields are ignored.
#[derive(Debug, Default, Deserialize)]
pub struct DashboardQuery {
    pub status: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub search: Option<String>,
}

impl DashboardQuery {
    fn filter(&self) -> BookingFilter {
        fn field(value: &Option<String>) -> Option<&str> {
            value.as_deref().map(str::trim).filter(|v| !v.is_empty())
        }
        BookingFilter {
            status: field(&self.status).and_then(|s| s.parse::<BookingStatus>().ok()),
            service: None,
            from: field(&self.from).and_then(|d| d.parse::<NaiveDate>().ok()),
            to: field(&self.to).and_then(|d| d.parse::<NaiveDate>().ok()),
            search: field(&self.search).map(str::to_string),
        }
    }
}

pub fn router() -> Router<AppState> {
    Router::new().route(ADMIN_PATH, get(dashboard))
}

async fn signed_in_user(state: &AppState, headers: &HeaderMap) -> Option<User> {
    let token = extract_session_token(headers)?;
    match state.user_service.validate_session(&token).await {
        Ok(user) => user,
        Err(e) => {
            tracing::warn!("Failed to validate dashboard session: {}", e);
            None
        }
    }
}

async fn dashboard(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<DashboardQuery>,
) -> Response {
    let filter = query.filter();
    let Some(user) = signed_in_user(&state, &headers).await else {
        return render(&state, "admin_login.html", &Context::new(), ADMIN_PATH);
    };

    let backend = ServiceBackend::new(state.post_service.clone(), state.booking_service.clone());
    let session = match DashboardSession::load(backend).await {
        Ok(session) => session,
        Err(e) => {
            tracing::error!("Failed to load dashboard: {:#}", e);
            return error_page(
                &state,
                StatusCode::INTERNAL_SERVER_ERROR,
                "The dashboard is unavailable right now.",
                ADMIN_PATH,
            );
        }
    };

    let statuses: Vec<&str> = BookingStatus::ALL.iter().map(BookingStatus::as_str).collect();

    let mut context = Context::new();
    context.insert("user_email", &user.email);
    context.insert("bookings", &session.visible_bookings(&filter));
    context.insert("posts", session.posts());
    context.insert("statuses", &statuses);
    context.insert("current", &filter);
    render(&state, "admin.html", &context, ADMIN_PATH)
}
