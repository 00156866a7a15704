//! Public HTML pages
//!
//! Server-rendered pages for the informational site, the articles and the
//! booking wizard. Data for the wizard itself comes from the JSON API.

use axum::{
    extract::{Path, Query, State},
    http::{StatusCode, Uri},
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};
use serde::Deserialize;
use tera::Context;

use crate::api::middleware::AppState;
use crate::models::ListParams;
use crate::render::PageVars;
use crate::services::PostServiceError;
use crate::site::catalog::{services_of_kind, ServiceKind};
use crate::site::wizard::MAX_MESSAGE_CHARS;
use crate::site::SERVICES;

const HOME_POSTS: u32 = 3;
const ARTICLES_PER_PAGE: u32 = 10;

#[derive(Debug, Deserialize)]
pub struct ArticlesQuery {
    pub page: Option<u32>,
    pub category: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BookingPageQuery {
    pub service: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(home))
        .route("/about", get(about))
        .route("/services", get(services))
        .route("/team", get(team))
        .route("/articles", get(articles))
        .route("/articles/{slug}", get(article))
        .route("/booking", get(booking))
}

pub fn render(state: &AppState, template: &str, context: &Context, path: &str) -> Response {
    let vars = PageVars::new(&state.site, path);
    match state.renderer.render_page(template, context, &vars) {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            tracing::error!("Failed to render {}: {}", template, e);
            error_page(state, StatusCode::INTERNAL_SERVER_ERROR, "Something went wrong.", path)
        }
    }
}

pub fn error_page(state: &AppState, status: StatusCode, message: &str, path: &str) -> Response {
    let vars = PageVars::new(&state.site, path);
    let html = state.renderer.render_error(status.as_u16(), message, &vars);
    (status, Html(html)).into_response()
}

/// 404 for anything no route matched
pub async fn not_found(State(state): State<AppState>, uri: Uri) -> Response {
    error_page(&state, StatusCode::NOT_FOUND, "This page does not exist.", uri.path())
}

async fn home(State(state): State<AppState>) -> Response {
    let latest = match state
        .post_service
        .list_published(&ListParams::new(1, HOME_POSTS), None)
        .await
    {
        Ok(result) => result.items,
        Err(e) => {
            tracing::warn!("Failed to load latest posts for home page: {}", e);
            Vec::new()
        }
    };

    let mut context = Context::new();
    context.insert("services", SERVICES);
    context.insert("latest_posts", &latest);
    render(&state, "home.html", &context, "/")
}

async fn about(State(state): State<AppState>) -> Response {
    render(&state, "about.html", &Context::new(), "/about")
}

async fn services(State(state): State<AppState>) -> Response {
    let counseling: Vec<_> = services_of_kind(ServiceKind::Counseling).collect();
    let corporate: Vec<_> = services_of_kind(ServiceKind::CorporateTraining).collect();

    let mut context = Context::new();
    context.insert("counseling", &counseling);
    context.insert("corporate", &corporate);
    render(&state, "services.html", &context, "/services")
}

async fn team(State(state): State<AppState>) -> Response {
    let mut context = Context::new();
    context.insert("team", &state.site.team);
    render(&state, "team.html", &context, "/team")
}

async fn articles(State(state): State<AppState>, Query(query): Query<ArticlesQuery>) -> Response {
    let params = ListParams::new(query.page.unwrap_or(1), ARTICLES_PER_PAGE);
    let category = query.category.as_deref().map(str::trim).filter(|c| !c.is_empty());

    let (result, categories) = match tokio::try_join!(
        state.post_service.list_published(&params, category),
        state.post_service.categories(),
    ) {
        Ok(loaded) => loaded,
        Err(e) => {
            tracing::error!("Failed to load articles: {}", e);
            return error_page(
                &state,
                StatusCode::INTERNAL_SERVER_ERROR,
                "Articles are unavailable right now.",
                "/articles",
            );
        }
    };

    let mut context = Context::new();
    context.insert("posts", &result.items);
    context.insert("page", &result.page);
    context.insert("total_pages", &result.total_pages());
    context.insert("has_prev", &result.has_prev());
    context.insert("has_next", &result.has_next());
    context.insert("categories", &categories);
    context.insert("current_category", &category);
    render(&state, "articles.html", &context, "/articles")
}

async fn article(State(state): State<AppState>, Path(slug): Path<String>) -> Response {
    let path = format!("/articles/{}", slug);
    match state.post_service.get_published_by_slug(&slug).await {
        Ok(post) => {
            let mut context = Context::new();
            context.insert("post", &post);
            render(&state, "article.html", &context, &path)
        }
        Err(PostServiceError::NotFound(_)) => {
            error_page(&state, StatusCode::NOT_FOUND, "This article does not exist.", &path)
        }
        Err(e) => {
            tracing::error!("Failed to load article {}: {}", slug, e);
            error_page(&state, StatusCode::INTERNAL_SERVER_ERROR, "Something went wrong.", &path)
        }
    }
}

async fn booking(State(state): State<AppState>, Query(query): Query<BookingPageQuery>) -> Response {
    let selected = query
        .service
        .filter(|id| SERVICES.iter().any(|s| s.id == id.as_str()))
        .unwrap_or_default();

    let mut context = Context::new();
    context.insert("services", SERVICES);
    context.insert("selected_service", &selected);
    context.insert("max_message_chars", &MAX_MESSAGE_CHARS);
    render(&state, "booking.html", &context, "/booking")
}
