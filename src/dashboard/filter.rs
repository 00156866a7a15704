//! List filters shared by the admin list endpoints and dashboard state

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::{Booking, BookingStatus, Post, PostStatus};

pub trait Filter<T> {
    fn matches(&self, item: &T) -> bool;

    /// Visible items, in their original order
    fn apply(&self, items: &[T]) -> Vec<T>
    where
        T: Clone,
    {
        items.iter().filter(|item| self.matches(item)).cloned().collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostFilter {
    pub status: Option<PostStatus>,
    pub category: Option<String>,
    /// Case-insensitive substring of the title
    pub search: Option<String>,
}

impl Filter<Post> for PostFilter {
    fn matches(&self, post: &Post) -> bool {
        if self.status.is_some_and(|s| s != post.status) {
            return false;
        }
        if let Some(category) = non_empty(&self.category) {
            if !post.category.eq_ignore_ascii_case(category) {
                return false;
            }
        }
        match non_empty(&self.search) {
            Some(needle) => contains_ignore_case(&post.title, needle),
            None => true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingFilter {
    pub status: Option<BookingStatus>,
    pub service: Option<String>,
    /// Inclusive lower bound on the appointment date
    pub from: Option<NaiveDate>,
    /// Inclusive upper bound on the appointment date
    pub to: Option<NaiveDate>,
    /// Case-insensitive substring of name, email or phone
    pub search: Option<String>,
}

impl Filter<Booking> for BookingFilter {
    fn matches(&self, booking: &Booking) -> bool {
        if self.status.is_some_and(|s| s != booking.status) {
            return false;
        }
        if non_empty(&self.service).is_some_and(|s| s != booking.service) {
            return false;
        }
        if self.from.is_some_and(|from| booking.date < from) {
            return false;
        }
        if self.to.is_some_and(|to| booking.date > to) {
            return false;
        }
        match non_empty(&self.search) {
            Some(needle) => [&booking.customer_name, &booking.email, &booking.phone]
                .into_iter()
                .any(|field| contains_ignore_case(field, needle)),
            None => true,
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}
