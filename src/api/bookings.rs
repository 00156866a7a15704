//! Booking API endpoints
//!
//! Public (used by the booking wizard page):
//! - GET /api/v1/booking/services
//! - GET /api/v1/booking/dates?service=
//! - GET /api/v1/booking/times?service=&date=
//! - POST /api/v1/bookings
//!
//! Admin:
//! - GET /api/v1/admin/bookings - filtered by status/service/from/to/search
//! - GET/DELETE /api/v1/admin/bookings/{id}
//! - PUT /api/v1/admin/bookings/{id}/status

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use chrono::{Local, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::api::middleware::{ApiError, AppState};
use crate::dashboard::{BookingFilter, Filter};
use crate::models::{Booking, BookingStatus, CreateBookingInput};
use crate::site::{find_service, BookingRequest, ServiceOffering, SERVICES};

#[derive(Debug, Deserialize)]
pub struct DatesQuery {
    pub service: String,
}

#[derive(Debug, Deserialize)]
pub struct TimesQuery {
    pub service: String,
    pub date: NaiveDate,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DatesResponse {
    pub service: String,
    pub dates: Vec<NaiveDate>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TimesResponse {
    pub service: String,
    pub date: NaiveDate,
    pub times: Vec<NaiveTime>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: BookingStatus,
}

pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/booking/services", get(list_services))
        .route("/booking/dates", get(available_dates))
        .route("/booking/times", get(available_times))
        .route("/bookings", post(create_booking))
}

pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_bookings))
        .route("/{id}", get(get_booking).delete(delete_booking))
        .route("/{id}/status", put(update_status))
}

fn lookup_service(id: &str) -> Result<&'static ServiceOffering, ApiError> {
    find_service(id).ok_or_else(|| ApiError::not_found(format!("Unknown service: {}", id)))
}

/// GET /api/v1/booking/services
async fn list_services() -> Json<&'static [ServiceOffering]> {
    Json(SERVICES)
}

/// GET /api/v1/booking/dates?service=
async fn available_dates(
    State(state): State<AppState>,
    Query(query): Query<DatesQuery>,
) -> Result<Json<DatesResponse>, ApiError> {
    let service = lookup_service(&query.service)?;
    let today = Local::now().date_naive();
    Ok(Json(DatesResponse {
        service: service.id.to_string(),
        dates: state.booking_service.rules().available_dates(service, today),
    }))
}

/// GET /api/v1/booking/times?service=&date=
async fn available_times(
    State(state): State<AppState>,
    Query(query): Query<TimesQuery>,
) -> Result<Json<TimesResponse>, ApiError> {
    let service = lookup_service(&query.service)?;
    let today = Local::now().date_naive();
    Ok(Json(TimesResponse {
        service: service.id.to_string(),
        date: query.date,
        times: state
            .booking_service
            .rules()
            .available_times(service, query.date, today),
    }))
}

/// POST /api/v1/bookings
async fn create_booking(
    State(state): State<AppState>,
    Json(request): Json<BookingRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let booking = state
        .booking_service
        .create(CreateBookingInput::from(request))
        .await?;
    Ok((StatusCode::CREATED, Json(booking)))
}

/// GET /api/v1/admin/bookings
async fn list_bookings(
    State(state): State<AppState>,
    Query(filter): Query<BookingFilter>,
) -> Result<Json<Vec<Booking>>, ApiError> {
    let bookings = state.booking_service.list().await?;
    Ok(Json(filter.apply(&bookings)))
}

/// GET /api/v1/admin/bookings/{id}
async fn get_booking(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Json<Booking>, ApiError> {
    Ok(Json(state.booking_service.get(id).await?))
}

/// PUT /api/v1/admin/bookings/{id}/status
async fn update_status(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<UpdateStatusRequest>,
) -> Result<Json<Booking>, ApiError> {
    Ok(Json(state.booking_service.update_status(id, body.status).await?))
}

/// DELETE /api/v1/admin/bookings/{id}
async fn delete_booking(State(state): State<AppState>, Path(id): Path<i64>) -> Result<StatusCode, ApiError> {
    state.booking_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
