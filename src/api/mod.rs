//! API layer - HTTP handlers and routing
//!
//! - `/api/v1` JSON API (public posts and booking, auth, admin)
//! - server-rendered public pages and the `/admin` dashboard page
//! - embedded static files under `/static`

pub mod admin;
pub mod auth;
pub mod bookings;
pub mod dashboard;
pub mod events;
pub mod middleware;
pub mod posts;
pub mod site;
pub mod static_files;

use anyhow::Result;
use axum::{
    http::{header, HeaderValue, Method},
    middleware as axum_middleware,
    routing::get,
    Router,
};
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::cache::create_cache;
use crate::config::Config;
use crate::db::repositories::{
    SqlxBookingRepository, SqlxPostRepository, SqlxSessionRepository, SqlxSettingsRepository,
    SqlxUserRepository,
};
use crate::db::DynDatabasePool;
use crate::render::SiteRenderer;
use crate::services::{
    create_mailer, BookingService, ChangeFeed, LoginRateLimiter, MarkdownRenderer, NotificationService,
    PostService, SettingsService, UserService,
};
use crate::site::AvailabilityRules;

pub use middleware::{ApiError, AppState, AuthenticatedUser};

/// Wire repositories and services together
pub fn build_state(config: &Config, pool: DynDatabasePool) -> Result<AppState> {
    let feed = ChangeFeed::default();
    let cache = create_cache(&config.cache);

    let settings_service = Arc::new(SettingsService::new(
        SqlxSettingsRepository::boxed(pool.clone()),
        feed.clone(),
    ));
    let notifications = Arc::new(NotificationService::new(
        settings_service.clone(),
        create_mailer(&config.smtp)?,
        config.site.name.clone(),
    ));

    let post_service = Arc::new(PostService::new(
        SqlxPostRepository::boxed(pool.clone()),
        cache,
        MarkdownRenderer::new(),
        feed.clone(),
    ));
    let booking_service = Arc::new(
        BookingService::new(
            SqlxBookingRepository::boxed(pool.clone()),
            feed.clone(),
            AvailabilityRules::from_config(&config.booking),
        )
        .with_notifications(notifications),
    );
    let user_service = Arc::new(UserService::new(
        SqlxUserRepository::boxed(pool.clone()),
        SqlxSessionRepository::boxed(pool),
    ));

    Ok(AppState {
        site: Arc::new(config.site.clone()),
        renderer: Arc::new(SiteRenderer::new()?),
        user_service,
        post_service,
        booking_service,
        settings_service,
        rate_limiter: Arc::new(LoginRateLimiter::new()),
        feed,
        trust_proxy_headers: config.server.trust_proxy_headers,
    })
}

/// Build the `/api/v1` router
pub fn build_api_router(state: AppState) -> Router<AppState> {
    let protected_routes = Router::new()
        .nest("/auth", auth::protected_router())
        .nest("/admin/posts", posts::admin_router())
        .nest("/admin/bookings", bookings::admin_router())
        .nest("/admin", admin::router())
        .route("/admin/events", get(events::change_events))
        .route_layer(axum_middleware::from_fn_with_state(
            state,
            middleware::require_auth,
        ));

    Router::new()
        .nest("/posts", posts::public_router())
        .nest("/auth", auth::public_router())
        .merge(bookings::public_router())
        .merge(protected_routes)
}

/// Build the complete router with middleware
pub fn build_router(state: AppState, cors_origin: &str) -> Router {
    Router::new()
        .nest("/api/v1", build_api_router(state.clone()))
        .merge(site::router())
        .merge(dashboard::router())
        .route("/static/{*path}", get(static_files::serve_static))
        .fallback(site::not_found)
        .layer(CompressionLayer::new())
        .layer(cors_layer(cors_origin))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(origin: &str) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::COOKIE]);

    // Credentials cannot be combined with a wildcard origin
    if origin.trim() == "*" {
        return cors.allow_origin(AllowOrigin::any());
    }
    match origin.parse::<HeaderValue>() {
        Ok(value) => cors.allow_origin(value).allow_credentials(true),
        Err(e) => {
            tracing::warn!("Invalid CORS origin '{}': {}, cross-origin requests disabled", origin, e);
            cors
        }
    }
}
