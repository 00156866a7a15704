//! API middleware
//!
//! Contains:
//! - shared application state
//! - the JSON error type and service error mapping
//! - session authentication (cookie or Bearer token)

use axum::{
    extract::{ConnectInfo, FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use crate::config::SiteConfig;
use crate::models::User;
use crate::render::SiteRenderer;
use crate::services::{
    BookingService, BookingServiceError, ChangeFeed, LoginRateLimiter, PostService, PostServiceError,
    SettingsService, SettingsServiceError, UserService, UserServiceError,
};

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub site: Arc<SiteConfig>,
    pub renderer: Arc<SiteRenderer>,
    pub user_service: Arc<UserService>,
    pub post_service: Arc<PostService>,
    pub booking_service: Arc<BookingService>,
    pub settings_service: Arc<SettingsService>,
    pub rate_limiter: Arc<LoginRateLimiter>,
    pub feed: ChangeFeed,
    /// Whether proxy headers name the client (see `ServerConfig`)
    pub trust_proxy_headers: bool,
}

/// Authenticated user extracted from request
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub User);

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or_else(|| ApiError::unauthorized("Authentication required"))
    }
}

/// Error response for API errors
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: Some(details),
            },
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("UNAUTHORIZED", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new("FORBIDDEN", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NOT_FOUND", message)
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new("VALIDATION_ERROR", message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new("CONFLICT", message)
    }

    pub fn rate_limited(message: impl Into<String>, retry_after_secs: u64) -> Self {
        Self::with_details(
            "RATE_LIMIT",
            message,
            serde_json::json!({ "retry_after": retry_after_secs }),
        )
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new("INTERNAL_ERROR", message)
    }

    pub fn status(&self) -> StatusCode {
        match self.error.code.as_str() {
            "UNAUTHORIZED" => StatusCode::UNAUTHORIZED,
            "FORBIDDEN" => StatusCode::FORBIDDEN,
            "NOT_FOUND" => StatusCode::NOT_FOUND,
            "VALIDATION_ERROR" => StatusCode::BAD_REQUEST,
            "CONFLICT" => StatusCode::CONFLICT,
            "RATE_LIMIT" => StatusCode::TOO_MANY_REQUESTS,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Log the cause and hide it from the client
    fn internal(error: impl std::fmt::Display) -> Self {
        tracing::error!("Internal error: {}", error);
        Self::internal_error("Internal server error")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self)).into_response()
    }
}

impl From<PostServiceError> for ApiError {
    fn from(e: PostServiceError) -> Self {
        match e {
            PostServiceError::NotFound(_) => ApiError::not_found(e.to_string()),
            PostServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            PostServiceError::DuplicateSlug(slug) => ApiError::with_details(
                "CONFLICT",
                format!("A post with slug '{}' already exists", slug),
                serde_json::json!({ "slug": slug }),
            ),
            PostServiceError::InternalError(e) => ApiError::internal(e),
        }
    }
}

impl From<BookingServiceError> for ApiError {
    fn from(e: BookingServiceError) -> Self {
        match e {
            BookingServiceError::NotFound(_) => ApiError::not_found(e.to_string()),
            BookingServiceError::InvalidBooking(wizard) => {
                let details = match &wizard {
                    crate::site::WizardError::InvalidDetails { field, .. } => {
                        Some(serde_json::json!({ "field": field }))
                    }
                    _ => None,
                };
                let mut error = ApiError::validation_error(wizard.to_string());
                error.error.details = details;
                error
            }
            BookingServiceError::InternalError(e) => ApiError::internal(e),
        }
    }
}

impl From<SettingsServiceError> for ApiError {
    fn from(e: SettingsServiceError) -> Self {
        match e {
            SettingsServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            SettingsServiceError::InternalError(e) => ApiError::internal(e),
        }
    }
}

impl From<UserServiceError> for ApiError {
    fn from(e: UserServiceError) -> Self {
        match e {
            UserServiceError::AuthenticationError(_) => ApiError::unauthorized("Invalid email or password"),
            UserServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            UserServiceError::UserExists(_) => ApiError::conflict(e.to_string()),
            UserServiceError::RegistrationClosed => {
                ApiError::forbidden("An admin account already exists; registration is closed")
            }
            UserServiceError::InternalError(e) => ApiError::internal(e),
        }
    }
}

/// Session token from `Authorization: Bearer` or the `session` cookie
pub fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(auth_header) = headers.get(header::AUTHORIZATION) {
        if let Ok(auth_str) = auth_header.to_str() {
            if let Some(token) = auth_str.strip_prefix("Bearer ") {
                return Some(token.trim().to_string());
            }
        }
    }

    if let Some(cookie_header) = headers.get(header::COOKIE) {
        if let Ok(cookie_str) = cookie_header.to_str() {
            for cookie in cookie_str.split(';') {
                if let Some(token) = cookie.trim().strip_prefix("session=") {
                    if !token.is_empty() {
                        return Some(token.to_string());
                    }
                }
            }
        }
    }

    None
}

/// Client address as reported by a proxy
pub fn extract_ip_address(headers: &HeaderMap) -> Option<String> {
    if let Some(forwarded) = headers.get("x-forwarded-for") {
        if let Ok(forwarded_str) = forwarded.to_str() {
            if let Some(ip) = forwarded_str.split(',').next() {
                return Some(ip.trim().to_string());
            }
        }
    }

    if let Some(real_ip) = headers.get("x-real-ip") {
        if let Ok(ip_str) = real_ip.to_str() {
            return Some(ip_str.trim().to_string());
        }
    }

    None
}

/// Client address for rate limiting.
///
/// Proxy headers are only believed when `trust_proxy` is set; otherwise
/// (or when they are missing or malformed) the TCP peer address is used.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>, trust_proxy: bool) -> Option<IpAddr> {
    if trust_proxy {
        if let Some(ip) = extract_ip_address(headers).and_then(|s| s.parse::<IpAddr>().ok()) {
            return Some(ip);
        }
    }
    peer.map(|addr| addr.ip())
}

/// Resolved client address; `None` when neither source is available
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientIp(pub Option<IpAddr>);

impl FromRequestParts<AppState> for ClientIp {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        Ok(ClientIp(client_ip(&parts.headers, peer, state.trust_proxy_headers)))
    }
}

/// Authentication middleware
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_session_token(request.headers())
        .ok_or_else(|| ApiError::unauthorized("Missing authentication token"))?;

    let user = state
        .user_service
        .validate_session(&token)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Invalid or expired session"))?;

    request.extensions_mut().insert(AuthenticatedUser(user));
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(name: header::HeaderName, value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(name, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_extract_token_from_bearer() {
        let h = headers(header::AUTHORIZATION, "Bearer abc123");
        assert_eq!(extract_session_token(&h), Some("abc123".to_string()));
    }

    #[test]
    fn test_extract_token_from_cookie() {
        let h = headers(header::COOKIE, "theme=dark; session=xyz789; other=1");
        assert_eq!(extract_session_token(&h), Some("xyz789".to_string()));

        let cleared = headers(header::COOKIE, "session=");
        assert_eq!(extract_session_token(&cleared), None);
        assert_eq!(extract_session_token(&HeaderMap::new()), None);
    }

    #[test]
    fn test_extract_ip_address() {
        let h = headers(
            header::HeaderName::from_static("x-forwarded-for"),
            "203.0.113.7, 10.0.0.1",
        );
        assert_eq!(extract_ip_address(&h).as_deref(), Some("203.0.113.7"));

        let h = headers(header::HeaderName::from_static("x-real-ip"), "198.51.100.2");
        assert_eq!(extract_ip_address(&h).as_deref(), Some("198.51.100.2"));
    }

    #[test]
    fn test_client_ip_ignores_proxy_headers_unless_trusted() {
        let peer: SocketAddr = "192.0.2.10:52100".parse().unwrap();
        let h = headers(header::HeaderName::from_static("x-forwarded-for"), "203.0.113.7");

        assert_eq!(client_ip(&h, Some(peer), false), Some(peer.ip()));
        assert_eq!(client_ip(&h, Some(peer), true), "203.0.113.7".parse().ok());
        assert_eq!(client_ip(&HeaderMap::new(), Some(peer), true), Some(peer.ip()));

        let bogus = headers(header::HeaderName::from_static("x-forwarded-for"), "not-an-ip");
        assert_eq!(client_ip(&bogus, Some(peer), true), Some(peer.ip()));
        assert_eq!(client_ip(&h, None, false), None);
    }

    #[test]
    fn test_error_status_codes() {
        assert_eq!(ApiError::unauthorized("x").status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::forbidden("x").status(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::not_found("x").status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::validation_error("x").status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::conflict("x").status(), StatusCode::CONFLICT);
        assert_eq!(ApiError::rate_limited("x", 60).status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(ApiError::internal_error("x").status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_error_body_shape() {
        let json = serde_json::to_value(ApiError::rate_limited("slow down", 900)).unwrap();
        assert_eq!(json["error"]["code"], "RATE_LIMIT");
        assert_eq!(json["error"]["message"], "slow down");
        assert_eq!(json["error"]["details"]["retry_after"], 900);

        let json = serde_json::to_value(ApiError::not_found("gone")).unwrap();
        assert!(json["error"].get("details").is_none());
    }

    #[test]
    fn test_service_error_mapping() {
        let e: ApiError = PostServiceError::DuplicateSlug("hello".into()).into();
        assert_eq!(e.status(), StatusCode::CONFLICT);

        let e: ApiError = BookingServiceError::InvalidBooking(crate::site::WizardError::InvalidDetails {
            field: "phone",
            reason: "too short".into(),
        })
        .into();
        assert_eq!(e.status(), StatusCode::BAD_REQUEST);
        assert_eq!(e.error.details.unwrap()["field"], "phone");

        let e: ApiError = UserServiceError::RegistrationClosed.into();
        assert_eq!(e.status(), StatusCode::FORBIDDEN);

        let e: ApiError = UserServiceError::InternalError(anyhow::anyhow!("db down")).into();
        assert_eq!(e.error.message, "Internal server error");
    }
}
