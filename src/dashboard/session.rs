//! One admin's view of posts and bookings
//!
//! A [`DashboardSession`] loads both lists from an [`AdminBackend`], keeps
//! them current from the change feed and routes every admin edit through
//! an optimistic list, so the view changes at once and is put back when
//! the backend refuses.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use crate::dashboard::filter::{BookingFilter, Filter, PostFilter};
use crate::dashboard::optimistic::{Mutation, OptimisticList};
use crate::models::{Booking, BookingStatus, Post, PostStatus, UpdatePostInput};
use crate::services::realtime::{ChangeEvent, ChangeSubscription, Table};
use crate::services::{BookingService, PostService};

/// The remote side of the dashboard
#[async_trait]
pub trait AdminBackend: Send + Sync {
    async fn posts(&self) -> Result<Vec<Post>>;
    async fn bookings(&self) -> Result<Vec<Booking>>;
    async fn set_post_status(&self, id: i64, status: PostStatus) -> Result<Post>;
    async fn delete_post(&self, id: i64) -> Result<()>;
    async fn set_booking_status(&self, id: i64, status: BookingStatus) -> Result<Booking>;
    async fn delete_booking(&self, id: i64) -> Result<()>;
}

/// Backend that calls the services in-process
#[derive(Clone)]
pub struct ServiceBackend {
    posts: Arc<PostService>,
    bookings: Arc<BookingService>,
}

impl ServiceBackend {
    pub fn new(posts: Arc<PostService>, bookings: Arc<BookingService>) -> Self {
        Self { posts, bookings }
    }
}

#[async_trait]
impl AdminBackend for ServiceBackend {
    async fn posts(&self) -> Result<Vec<Post>> {
        Ok(self.posts.list_all().await?)
    }

    async fn bookings(&self) -> Result<Vec<Booking>> {
        Ok(self.bookings.list().await?)
    }

    async fn set_post_status(&self, id: i64, status: PostStatus) -> Result<Post> {
        let input = UpdatePostInput {
            status: Some(status),
            ..Default::default()
        };
        Ok(self.posts.update(id, input).await?)
    }

    async fn delete_post(&self, id: i64) -> Result<()> {
        Ok(self.posts.delete(id).await?)
    }

    async fn set_booking_status(&self, id: i64, status: BookingStatus) -> Result<Booking> {
        Ok(self.bookings.update_status(id, status).await?)
    }

    async fn delete_booking(&self, id: i64) -> Result<()> {
        Ok(self.bookings.delete(id).await?)
    }
}

pub struct DashboardSession<B> {
    backend: B,
    posts: OptimisticList<Post>,
    bookings: OptimisticList<Booking>,
}

impl<B: AdminBackend> DashboardSession<B> {
    /// Load both lists. Subscribe to the feed before calling this so no
    /// change between the load and the first `follow` is lost.
    pub async fn load(backend: B) -> Result<Self> {
        let (posts, bookings) = tokio::try_join!(backend.posts(), backend.bookings())?;
        Ok(Self {
            backend,
            posts: OptimisticList::new(posts),
            bookings: OptimisticList::new(bookings),
        })
    }

    pub fn posts(&self) -> &[Post] {
        self.posts.items()
    }

    pub fn bookings(&self) -> &[Booking] {
        self.bookings.items()
    }

    pub fn visible_posts(&self, filter: &PostFilter) -> Vec<Post> {
        filter.apply(self.posts.items())
    }

    pub fn visible_bookings(&self, filter: &BookingFilter) -> Vec<Booking> {
        filter.apply(self.bookings.items())
    }

    /// Patch whichever list the event belongs to
    pub fn apply_change(&mut self, event: &ChangeEvent) -> bool {
        self.posts.apply_change(event) || self.bookings.apply_change(event)
    }

    /// Wait for the next change and apply it. `None` once the feed is gone.
    pub async fn follow(&mut self, subscription: &mut ChangeSubscription) -> Option<bool> {
        let event = subscription.recv().await?;
        Some(self.apply_change(&event))
    }

    pub async fn set_booking_status(&mut self, id: i64, status: BookingStatus) -> Result<Booking> {
        let mutation = Mutation::update(move |b: &mut Booking| b.status = status);
        let saved = self
            .bookings
            .run(id, mutation, self.backend.set_booking_status(id, status))
            .await?;
        self.bookings
            .apply_change(&ChangeEvent::update(Table::Bookings, saved.id, &saved));
        Ok(saved)
    }

    pub async fn delete_booking(&mut self, id: i64) -> Result<()> {
        self.bookings
            .run(id, Mutation::Remove, self.backend.delete_booking(id))
            .await
    }

    pub async fn set_post_status(&mut self, id: i64, status: PostStatus) -> Result<Post> {
        let mutation = Mutation::update(move |p: &mut Post| p.status = status);
        let saved = self
            .posts
            .run(id, mutation, self.backend.set_post_status(id, status))
            .await?;
        self.posts
            .apply_change(&ChangeEvent::update(Table::Posts, saved.id, &saved));
        Ok(saved)
    }

    pub async fn delete_post(&mut self, id: i64) -> Result<()> {
        self.posts.run(id, Mutation::Remove, self.backend.delete_post(id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::create_cache;
    use crate::config::{BookingConfig, CacheConfig};
    use crate::db::repositories::{SqlxBookingRepository, SqlxPostRepository};
    use crate::db::{create_test_pool, migrations};
    use crate::models::{CreateBookingInput, CreatePostInput};
    use crate::services::{ChangeFeed, MarkdownRenderer};
    use crate::site::{find_service, AvailabilityRules};
    use chrono::Local;

    async fn setup() -> (ServiceBackend, ChangeFeed) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let feed = ChangeFeed::default();
        let posts = Arc::new(PostService::new(
            SqlxPostRepository::boxed(pool.clone()),
            create_cache(&CacheConfig::default()),
            MarkdownRenderer::new(),
            feed.clone(),
        ));
        let bookings = Arc::new(BookingService::new(
            SqlxBookingRepository::boxed(pool),
            feed.clone(),
            AvailabilityRules::from_config(&BookingConfig::default()),
        ));
        (ServiceBackend::new(posts, bookings), feed)
    }

    async fn add_booking(backend: &ServiceBackend, name: &str) -> Booking {
        let today = Local::now().date_naive();
        let service = find_service("individual-counseling").unwrap();
        let rules = backend.bookings.rules();
        let date = rules.available_dates(service, today)[0];
        let time = rules.available_times(service, date, today)[0];
        backend
            .bookings
            .create_on(
                CreateBookingInput {
                    customer_name: name.to_string(),
                    email: "client@example.com".into(),
                    phone: "555 010 0200".into(),
                    service: service.id.to_string(),
                    message: None,
                    date,
                    time,
                },
                today,
            )
            .await
            .unwrap()
    }

    /// Delegates reads, refuses every write
    struct RefusingBackend(ServiceBackend);

    #[async_trait]
    impl AdminBackend for RefusingBackend {
        async fn posts(&self) -> Result<Vec<Post>> {
            self.0.posts().await
        }
        async fn bookings(&self) -> Result<Vec<Booking>> {
            self.0.bookings().await
        }
        async fn set_post_status(&self, _id: i64, _status: PostStatus) -> Result<Post> {
            anyhow::bail!("offline")
        }
        async fn delete_post(&self, _id: i64) -> Result<()> {
            anyhow::bail!("offline")
        }
        async fn set_booking_status(&self, _id: i64, _status: BookingStatus) -> Result<Booking> {
            anyhow::bail!("offline")
        }
        async fn delete_booking(&self, _id: i64) -> Result<()> {
            anyhow::bail!("offline")
        }
    }

    #[tokio::test]
    async fn test_follow_applies_changes_from_other_writers() {
        let (backend, feed) = setup().await;
        let mut subscription = feed.subscribe();
        let mut session = DashboardSession::load(backend.clone()).await.unwrap();
        assert!(session.bookings().is_empty());

        let booking = add_booking(&backend, "Grace Hopper").await;
        assert_eq!(session.follow(&mut subscription).await, Some(true));
        assert_eq!(session.bookings()[0].id, booking.id);

        backend
            .posts
            .create(CreatePostInput::new("Burnout", "wellbeing", "Rest."))
            .await
            .unwrap();
        assert_eq!(session.follow(&mut subscription).await, Some(true));
        assert_eq!(session.posts().len(), 1);
    }

    #[tokio::test]
    async fn test_status_change_is_saved() {
        let (backend, _feed) = setup().await;
        let booking = add_booking(&backend, "Grace Hopper").await;
        let mut session = DashboardSession::load(backend.clone()).await.unwrap();

        let saved = session
            .set_booking_status(booking.id, BookingStatus::Confirmed)
            .await
            .unwrap();
        assert_eq!(saved.status, BookingStatus::Confirmed);
        assert_eq!(session.bookings()[0].status, BookingStatus::Confirmed);
        assert_eq!(
            backend.bookings.get(booking.id).await.unwrap().status,
            BookingStatus::Confirmed
        );

        let confirmed = BookingFilter {
            status: Some(BookingStatus::Confirmed),
            ..Default::default()
        };
        assert_eq!(session.visible_bookings(&confirmed).len(), 1);
    }

    #[tokio::test]
    async fn test_refused_edits_roll_back() {
        let (backend, _feed) = setup().await;
        let booking = add_booking(&backend, "Grace Hopper").await;
        backend
            .posts
            .create(CreatePostInput::new("Burnout", "wellbeing", "Rest."))
            .await
            .unwrap();
        let mut session = DashboardSession::load(RefusingBackend(backend)).await.unwrap();
        let before = session.bookings().to_vec();

        assert!(session
            .set_booking_status(booking.id, BookingStatus::Cancelled)
            .await
            .is_err());
        assert_eq!(session.bookings(), before.as_slice());

        assert!(session.delete_booking(booking.id).await.is_err());
        assert_eq!(session.bookings(), before.as_slice());

        let post_id = session.posts()[0].id;
        assert!(session.delete_post(post_id).await.is_err());
        assert_eq!(session.posts().len(), 1);
        assert!(session.set_post_status(post_id, PostStatus::Published).await.is_err());
        assert_eq!(session.posts()[0].status, PostStatus::Draft);
    }

    #[tokio::test]
    async fn test_delete_removes_row() {
        let (backend, _feed) = setup().await;
        let first = add_booking(&backend, "Grace Hopper").await;
        add_booking(&backend, "Alan Turing").await;
        let mut session = DashboardSession::load(backend).await.unwrap();

        session.delete_booking(first.id).await.unwrap();
        assert_eq!(session.bookings().len(), 1);
        assert_ne!(session.bookings()[0].id, first.id);
    }
}
