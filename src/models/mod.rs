//! Data models
//!
//! Database entities (Post, Booking, User, Session), key-value notification
//! settings and the input types used to create or change them.

mod booking;
mod notification;
mod post;
mod session;
mod user;

pub use booking::{Booking, BookingStatus, CreateBookingInput};
pub use notification::{NotificationSettings, KEY_NOTIFICATIONS_ENABLED, KEY_NOTIFICATION_EMAIL};
pub use post::{CreatePostInput, ListParams, PagedResult, Post, PostStatus, UpdatePostInput};
pub use session::Session;
pub use user::User;
