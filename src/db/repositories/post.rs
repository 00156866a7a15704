//! Post repository
//!
//! Database operations for blog posts.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{ListParams, PagedResult, Post, PostStatus};

const POST_COLUMNS: &str = "id, slug, title, category, excerpt, content, content_html, status, \
     view_count, published_at, created_at, updated_at";

/// Post repository trait
#[async_trait]
pub trait PostRepository: Send + Sync {
    /// Insert a new post and return it with its assigned id
    async fn create(&self, post: &Post) -> Result<Post>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Post>>;

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Post>>;

    /// Whether a post other than `exclude_id` already uses `slug`
    async fn exists_by_slug(&self, slug: &str, exclude_id: Option<i64>) -> Result<bool>;

    /// Every post, most recently updated first
    async fn list_all(&self) -> Result<Vec<Post>>;

    /// Published posts, newest first, optionally restricted to one category
    async fn list_published(
        &self,
        params: &ListParams,
        category: Option<&str>,
    ) -> Result<PagedResult<Post>>;

    /// Distinct categories of published posts
    async fn published_categories(&self) -> Result<Vec<String>>;

    /// Overwrite all editable columns of an existing post
    async fn update(&self, post: &Post) -> Result<Post>;

    /// Returns false when no row matched
    async fn delete(&self, id: i64) -> Result<bool>;

    async fn increment_view_count(&self, id: i64) -> Result<()>;
}

#[derive(Debug, sqlx::FromRow)]
struct PostRow {
    id: i64,
    slug: String,
    title: String,
    category: String,
    excerpt: String,
    content: String,
    content_html: String,
    status: String,
    view_count: i64,
    published_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<PostRow> for Post {
    type Error = anyhow::Error;

    fn try_from(row: PostRow) -> Result<Self> {
        Ok(Post {
            id: row.id,
            slug: row.slug,
            title: row.title,
            category: row.category,
            excerpt: row.excerpt,
            content: row.content,
            content_html: row.content_html,
            status: row.status.parse::<PostStatus>()?,
            view_count: row.view_count,
            published_at: row.published_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn into_posts(rows: Vec<PostRow>) -> Result<Vec<Post>> {
    rows.into_iter().map(Post::try_from).collect()
}

/// SQLx-based post repository for SQLite and MySQL
pub struct SqlxPostRepository {
    pool: DynDatabasePool,
}

impl SqlxPostRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn PostRepository> {
        Arc::new(Self::new(pool))
    }
}

const INSERT_POST: &str = r#"
    INSERT INTO posts (slug, title, category, excerpt, content, content_html, status,
                       view_count, published_at, created_at, updated_at)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
"#;

#[async_trait]
impl PostRepository for SqlxPostRepository {
    async fn create(&self, post: &Post) -> Result<Post> {
        let id = match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let result = sqlx::query(INSERT_POST)
                    .bind(&post.slug)
                    .bind(&post.title)
                    .bind(&post.category)
                    .bind(&post.excerpt)
                    .bind(&post.content)
                    .bind(&post.content_html)
                    .bind(post.status.as_str())
                    .bind(post.view_count)
                    .bind(post.published_at)
                    .bind(post.created_at)
                    .bind(post.updated_at)
                    .execute(crate::db::sqlite(&self.pool)?)
                    .await
                    .context("Failed to create post")?;
                result.last_insert_rowid()
            }
            DatabaseDriver::Mysql => {
                let result = sqlx::query(INSERT_POST)
                    .bind(&post.slug)
                    .bind(&post.title)
                    .bind(&post.category)
                    .bind(&post.excerpt)
                    .bind(&post.content)
                    .bind(&post.content_html)
                    .bind(post.status.as_str())
                    .bind(post.view_count)
                    .bind(post.published_at)
                    .bind(post.created_at)
                    .bind(post.updated_at)
                    .execute(crate::db::mysql(&self.pool)?)
                    .await
                    .context("Failed to create post")?;
                result.last_insert_id() as i64
            }
        };

        Ok(Post { id, ..post.clone() })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Post>> {
        let sql = format!("SELECT {} FROM posts WHERE id = ?", POST_COLUMNS);
        let row: Option<PostRow> = with_pool!(self.pool, p => {
            sqlx::query_as(&sql).bind(id).fetch_optional(p).await
        })
        .context("Failed to get post by ID")?;
        row.map(Post::try_from).transpose()
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Post>> {
        let sql = format!("SELECT {} FROM posts WHERE slug = ?", POST_COLUMNS);
        let row: Option<PostRow> = with_pool!(self.pool, p => {
            sqlx::query_as(&sql).bind(slug).fetch_optional(p).await
        })
        .context("Failed to get post by slug")?;
        row.map(Post::try_from).transpose()
    }

    async fn exists_by_slug(&self, slug: &str, exclude_id: Option<i64>) -> Result<bool> {
        let sql = "SELECT COUNT(*) FROM posts WHERE slug = ? AND id <> ?";
        let count: i64 = with_pool!(self.pool, p => {
            sqlx::query_scalar(sql)
                .bind(slug)
                .bind(exclude_id.unwrap_or(0))
                .fetch_one(p)
                .await
        })
        .context("Failed to check post slug")?;
        Ok(count > 0)
    }

    async fn list_all(&self) -> Result<Vec<Post>> {
        let sql = format!("SELECT {} FROM posts ORDER BY updated_at DESC, id DESC", POST_COLUMNS);
        let rows: Vec<PostRow> = with_pool!(self.pool, p => {
            sqlx::query_as(&sql).fetch_all(p).await
        })
        .context("Failed to list posts")?;
        into_posts(rows)
    }

    async fn list_published(
        &self,
        params: &ListParams,
        category: Option<&str>,
    ) -> Result<PagedResult<Post>> {
        let filter = "status = 'published' AND (? IS NULL OR category = ?)";
        let count_sql = format!("SELECT COUNT(*) FROM posts WHERE {}", filter);
        let list_sql = format!(
            "SELECT {} FROM posts WHERE {} ORDER BY published_at DESC, id DESC LIMIT ? OFFSET ?",
            POST_COLUMNS, filter
        );

        let (total, rows): (i64, Vec<PostRow>) = with_pool!(self.pool, p => {
            let total = sqlx::query_scalar(&count_sql)
                .bind(category)
                .bind(category)
                .fetch_one(p)
                .await
                .context("Failed to count published posts")?;
            let rows = sqlx::query_as(&list_sql)
                .bind(category)
                .bind(category)
                .bind(params.limit())
                .bind(params.offset())
                .fetch_all(p)
                .await
                .context("Failed to list published posts")?;
            (total, rows)
        });

        Ok(PagedResult::new(into_posts(rows)?, total, params))
    }

    async fn published_categories(&self) -> Result<Vec<String>> {
        let sql = "SELECT DISTINCT category FROM posts WHERE status = 'published' ORDER BY category";
        let categories = with_pool!(self.pool, p => {
            sqlx::query_scalar(sql).fetch_all(p).await
        })
        .context("Failed to list post categories")?;
        Ok(categories)
    }

    async fn update(&self, post: &Post) -> Result<Post> {
        let sql = r#"
            UPDATE posts
            SET slug = ?, title = ?, category = ?, excerpt = ?, content = ?, content_html = ?,
                status = ?, published_at = ?, updated_at = ?
            WHERE id = ?
        "#;
        with_pool!(self.pool, p => {
            sqlx::query(sql)
                .bind(&post.slug)
                .bind(&post.title)
                .bind(&post.category)
                .bind(&post.excerpt)
                .bind(&post.content)
                .bind(&post.content_html)
                .bind(post.status.as_str())
                .bind(post.published_at)
                .bind(post.updated_at)
                .bind(post.id)
                .execute(p)
                .await
                .map(|_| ())
        })
        .context("Failed to update post")?;

        Ok(post.clone())
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let affected = with_pool!(self.pool, p => {
            sqlx::query("DELETE FROM posts WHERE id = ?")
                .bind(id)
                .execute(p)
                .await
                .map(|r| r.rows_affected())
        })
        .context("Failed to delete post")?;
        Ok(affected > 0)
    }

    async fn increment_view_count(&self, id: i64) -> Result<()> {
        with_pool!(self.pool, p => {
            sqlx::query("UPDATE posts SET view_count = view_count + 1 WHERE id = ?")
                .bind(id)
                .execute(p)
                .await
                .map(|_| ())
        })
        .context("Failed to increment view count")?;
        Ok(())
    }
}
