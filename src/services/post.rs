//! Post service
//!
//! Business rules for blog posts:
//! - validation and slug generation
//! - Markdown rendering and excerpts
//! - cached public listing, invalidated on every write
//!
//! Listing keys carry a generation number that every write bumps, so a
//! listing read before a write can never be cached where later readers
//! look for it.
//! - change events for the admin dashboard

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::cache::{CacheLayer, MemoryCache};
use crate::db::repositories::PostRepository;
use crate::models::{CreatePostInput, ListParams, PagedResult, Post, PostStatus, UpdatePostInput};
use crate::services::markdown::{MarkdownRenderer, EXCERPT_CHARS};
use crate::services::realtime::{ChangeEvent, ChangeFeed, Table};

const CACHE_KEY_PUBLISHED: &str = "posts:published";
const CACHE_PATTERN_POSTS: &str = "posts:*";

#[derive(Debug, thiserror::Error)]
pub enum PostServiceError {
    #[error("Post not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Post slug already exists: {0}")]
    DuplicateSlug(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Aggregate numbers for the admin overview
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostStats {
    pub total: i64,
    pub published: i64,
    pub drafts: i64,
    pub total_views: i64,
}

pub struct PostService {
    repo: Arc<dyn PostRepository>,
    cache: Arc<MemoryCache>,
    markdown: MarkdownRenderer,
    feed: ChangeFeed,
    generation: AtomicU64,
}

impl PostService {
    pub fn new(
        repo: Arc<dyn PostRepository>,
        cache: Arc<MemoryCache>,
        markdown: MarkdownRenderer,
        feed: ChangeFeed,
    ) -> Self {
        Self {
            repo,
            cache,
            markdown,
            feed,
            generation: AtomicU64::new(0),
        }
    }

    /// Create a post. The slug is derived from the title when left empty.
    pub async fn create(&self, input: CreatePostInput) -> Result<Post, PostServiceError> {
        let title = required("Title", &input.title)?;
        let category = required("Category", &input.category)?;
        if input.content.trim().is_empty() {
            return Err(PostServiceError::ValidationError("Content cannot be empty".into()));
        }

        let slug = if input.slug.trim().is_empty() {
            generate_slug(&title)
        } else {
            generate_slug(&input.slug)
        };
        if slug.is_empty() {
            return Err(PostServiceError::ValidationError(
                "Slug must contain at least one letter or digit".into(),
            ));
        }
        if self.repo.exists_by_slug(&slug, None).await? {
            return Err(PostServiceError::DuplicateSlug(slug));
        }

        let now = Utc::now();
        let post = Post {
            id: 0,
            slug,
            title,
            category,
            excerpt: self.excerpt_for(&input.excerpt, &input.content),
            content_html: self.markdown.render(&input.content),
            content: input.content,
            status: input.status,
            view_count: 0,
            published_at: (input.status == PostStatus::Published).then_some(now),
            created_at: now,
            updated_at: now,
        };

        let created = self.repo.create(&post).await?;
        tracing::info!("Created post {} ({})", created.id, created.slug);

        self.after_write(ChangeEvent::insert(Table::Posts, created.id, &created)).await;
        Ok(created)
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Post, PostServiceError> {
        self.repo
            .get_by_id(id)
            .await?
            .ok_or_else(|| PostServiceError::NotFound(id.to_string()))
    }

    /// Public lookup. Drafts are reported as not found; each hit counts a view.
    pub async fn get_published_by_slug(&self, slug: &str) -> Result<Post, PostServiceError> {
        let mut post = self
            .repo
            .get_by_slug(slug)
            .await?
            .filter(Post::is_published)
            .ok_or_else(|| PostServiceError::NotFound(slug.to_string()))?;

        if let Err(e) = self.repo.increment_view_count(post.id).await {
            tracing::warn!("Failed to count view for post {}: {}", post.id, e);
        } else {
            post.view_count += 1;
        }
        Ok(post)
    }

    /// Published posts for the public site, newest first
    pub async fn list_published(
        &self,
        params: &ListParams,
        category: Option<&str>,
    ) -> Result<PagedResult<Post>, PostServiceError> {
        let category = category.map(str::trim).filter(|c| !c.is_empty());
        let generation = self.generation.load(Ordering::Acquire);
        let cache_key = listing_key(generation, category, params);

        if let Ok(Some(cached)) = self.cache.get::<PagedResult<Post>>(&cache_key).await {
            return Ok(cached);
        }

        let result = self.repo.list_published(params, category).await?;
        self.store_listing(generation, &cache_key, &result).await;
        Ok(result)
    }

    /// Cache a listing read under `generation`. Skipped once a write has
    /// moved the generation on, since readers no longer use that key.
    async fn store_listing(&self, generation: u64, key: &str, listing: &PagedResult<Post>) {
        if self.generation.load(Ordering::Acquire) != generation {
            tracing::debug!("Post list changed while loading, not caching {}", key);
            return;
        }
        if let Err(e) = self.cache.set(key, listing, self.cache.default_ttl()).await {
            tracing::warn!("Failed to cache post list: {}", e);
        }
    }

    pub async fn categories(&self) -> Result<Vec<String>, PostServiceError> {
        Ok(self.repo.published_categories().await?)
    }

    /// Every post including drafts, for the admin area
    pub async fn list_all(&self) -> Result<Vec<Post>, PostServiceError> {
        Ok(self.repo.list_all().await?)
    }

    pub async fn update(&self, id: i64, input: UpdatePostInput) -> Result<Post, PostServiceError> {
        let mut post = self.get_by_id(id).await?;
        if !input.has_changes() {
            return Ok(post);
        }

        if let Some(title) = &input.title {
            post.title = required("Title", title)?;
        }
        if let Some(category) = &input.category {
            post.category = required("Category", category)?;
        }
        if let Some(slug) = &input.slug {
            let slug = generate_slug(slug);
            if slug.is_empty() {
                return Err(PostServiceError::ValidationError(
                    "Slug must contain at least one letter or digit".into(),
                ));
            }
            if slug != post.slug && self.repo.exists_by_slug(&slug, Some(id)).await? {
                return Err(PostServiceError::DuplicateSlug(slug));
            }
            post.slug = slug;
        }
        if let Some(content) = input.content {
            if content.trim().is_empty() {
                return Err(PostServiceError::ValidationError("Content cannot be empty".into()));
            }
            // An excerpt that was derived from the old content follows the new one
            let derived = post.excerpt == self.markdown.excerpt(&post.content, EXCERPT_CHARS);
            post.content_html = self.markdown.render(&content);
            post.content = content;
            if derived && input.excerpt.is_none() {
                post.excerpt = self.markdown.excerpt(&post.content, EXCERPT_CHARS);
            }
        }
        if let Some(excerpt) = &input.excerpt {
            post.excerpt = self.excerpt_for(excerpt, &post.content);
        }

        let now = Utc::now();
        if let Some(status) = input.status {
            post.status = status;
            if status == PostStatus::Published && post.published_at.is_none() {
                post.published_at = Some(now);
            }
        }
        post.updated_at = now;

        let updated = self.repo.update(&post).await?;
        tracing::info!("Updated post {}", updated.id);

        self.after_write(ChangeEvent::update(Table::Posts, updated.id, &updated)).await;
        Ok(updated)
    }

    pub async fn delete(&self, id: i64) -> Result<(), PostServiceError> {
        if !self.repo.delete(id).await? {
            return Err(PostServiceError::NotFound(id.to_string()));
        }
        tracing::info!("Deleted post {}", id);

        self.after_write(ChangeEvent::delete(Table::Posts, id)).await;
        Ok(())
    }

    pub async fn stats(&self) -> Result<PostStats, PostServiceError> {
        let posts = self.repo.list_all().await?;
        let published = posts.iter().filter(|p| p.is_published()).count() as i64;
        Ok(PostStats {
            total: posts.len() as i64,
            published,
            drafts: posts.len() as i64 - published,
            total_views: posts.iter().map(|p| p.view_count).sum(),
        })
    }

    fn excerpt_for(&self, excerpt: &str, content: &str) -> String {
        let excerpt = excerpt.trim();
        if excerpt.is_empty() {
            self.markdown.excerpt(content, EXCERPT_CHARS)
        } else {
            excerpt.to_string()
        }
    }

    async fn after_write(&self, event: ChangeEvent) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        if let Err(e) = self.cache.delete_pattern(CACHE_PATTERN_POSTS).await {
            tracing::warn!("Failed to invalidate post cache: {}", e);
        }
        self.feed.publish(event);
    }
}

fn listing_key(generation: u64, category: Option<&str>, params: &ListParams) -> String {
    format!(
        "{}:g{}:{}:{}:{}",
        CACHE_KEY_PUBLISHED,
        generation,
        category.unwrap_or("*all*"),
        params.page,
        params.per_page
    )
}

fn required(field: &str, value: &str) -> Result<String, PostServiceError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(PostServiceError::ValidationError(format!("{} cannot be empty", field)));
    }
    Ok(trimmed.to_string())
}

/// URL slug from arbitrary text: lowercase ASCII letters and digits joined
/// by single hyphens. Non-ASCII letters are kept as-is.
pub fn generate_slug(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_hyphen = false;

    for c in text.trim().chars().flat_map(char::to_lowercase) {
        if c.is_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c);
        } else {
            pending_hyphen = true;
        }
    }
    slug
}
