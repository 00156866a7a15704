//! Post API endpoints
//!
//! Public:
//! - GET /api/v1/posts - published posts, paginated, optional category
//! - GET /api/v1/posts/{slug} - one published post
//!
//! Admin:
//! - GET /api/v1/admin/posts - every post, filtered by status/category/search
//! - POST /api/v1/admin/posts
//! - GET/PUT/DELETE /api/v1/admin/posts/{id}

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::middleware::{ApiError, AppState};
use crate::dashboard::{Filter, PostFilter};
use crate::models::{CreatePostInput, ListParams, Post, UpdatePostInput};

fn default_page() -> u32 {
    1
}

fn default_page_size() -> u32 {
    10
}

#[derive(Debug, Deserialize)]
pub struct ListPostsQuery {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    pub category: Option<String>,
}

/// List entry without the post body
#[derive(Debug, Serialize, Deserialize)]
pub struct PostSummary {
    pub id: i64,
    pub slug: String,
    pub title: String,
    pub category: String,
    pub excerpt: String,
    pub published_at: Option<String>,
    pub view_count: i64,
}

impl From<Post> for PostSummary {
    fn from(post: Post) -> Self {
        Self {
            id: post.id,
            slug: post.slug,
            title: post.title,
            category: post.category,
            excerpt: post.excerpt,
            published_at: post.published_at.map(|dt| dt.to_rfc3339()),
            view_count: post.view_count,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PostListResponse {
    pub posts: Vec<PostSummary>,
    pub total: i64,
    pub page: u32,
    pub page_size: u32,
    pub total_pages: u32,
}

pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_published))
        .route("/{slug}", get(get_published))
}

pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_all).post(create))
        .route("/{id}", get(get_by_id).put(update).delete(delete))
}

/// GET /api/v1/posts
async fn list_published(
    State(state): State<AppState>,
    Query(query): Query<ListPostsQuery>,
) -> Result<Json<PostListResponse>, ApiError> {
    let params = ListParams::new(query.page, query.page_size);
    let result = state
        .post_service
        .list_published(&params, query.category.as_deref())
        .await?;

    let total_pages = result.total_pages();
    Ok(Json(PostListResponse {
        posts: result.items.into_iter().map(PostSummary::from).collect(),
        total: result.total,
        page: result.page,
        page_size: result.per_page,
        total_pages,
    }))
}

/// GET /api/v1/posts/{slug}
async fn get_published(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<Post>, ApiError> {
    Ok(Json(state.post_service.get_published_by_slug(&slug).await?))
}

/// GET /api/v1/admin/posts
async fn list_all(
    State(state): State<AppState>,
    Query(filter): Query<PostFilter>,
) -> Result<Json<Vec<Post>>, ApiError> {
    let posts = state.post_service.list_all().await?;
    Ok(Json(filter.apply(&posts)))
}

/// POST /api/v1/admin/posts
async fn create(
    State(state): State<AppState>,
    Json(input): Json<CreatePostInput>,
) -> Result<impl IntoResponse, ApiError> {
    let post = state.post_service.create(input).await?;
    Ok((StatusCode::CREATED, Json(post)))
}

/// GET /api/v1/admin/posts/{id}
async fn get_by_id(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Json<Post>, ApiError> {
    Ok(Json(state.post_service.get_by_id(id).await?))
}

/// PUT /api/v1/admin/posts/{id}
async fn update(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(input): Json<UpdatePostInput>,
) -> Result<Json<Post>, ApiError> {
    Ok(Json(state.post_service.update(id, input).await?))
}

/// DELETE /api/v1/admin/posts/{id}
async fn delete(State(state): State<AppState>, Path(id): Path<i64>) -> Result<StatusCode, ApiError> {
    state.post_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
