//! Rate limiting for the login endpoint
//!
//! Two sliding windows guard login: failed attempts per account email
//! (5 per 15 minutes) and raw requests per client IP (10 per minute).

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::hash::Hash;
use std::net::IpAddr;
use tokio::sync::RwLock;

/// Timestamps of recent hits per key, forgotten after `window`
struct SlidingWindow<K> {
    limit: usize,
    window: Duration,
    hits: RwLock<HashMap<K, Vec<DateTime<Utc>>>>,
}

impl<K: Eq + Hash> SlidingWindow<K> {
    fn new(limit: usize, window: Duration) -> Self {
        Self {
            limit,
            window,
            hits: RwLock::new(HashMap::new()),
        }
    }

    async fn is_limited(&self, key: &K, now: DateTime<Utc>) -> bool {
        let cutoff = now - self.window;
        let hits = self.hits.read().await;
        hits.get(key)
            .map(|times| times.iter().filter(|t| **t > cutoff).count() >= self.limit)
            .unwrap_or(false)
    }

    async fn record(&self, key: K, now: DateTime<Utc>) {
        let cutoff = now - self.window;
        let mut hits = self.hits.write().await;
        let times = hits.entry(key).or_default();
        times.retain(|t| *t > cutoff);
        times.push(now);
    }

    async fn clear(&self, key: &K) {
        self.hits.write().await.remove(key);
    }

    async fn prune(&self, now: DateTime<Utc>) -> usize {
        let cutoff = now - self.window;
        let mut hits = self.hits.write().await;
        hits.retain(|_, times| {
            times.retain(|t| *t > cutoff);
            !times.is_empty()
        });
        hits.len()
    }
}

/// Login rate limiter shared through `AppState`
pub struct LoginRateLimiter {
    failures: SlidingWindow<String>,
    requests: SlidingWindow<IpAddr>,
}

impl LoginRateLimiter {
    pub fn new() -> Self {
        Self {
            failures: SlidingWindow::new(5, Duration::minutes(15)),
            requests: SlidingWindow::new(10, Duration::minutes(1)),
        }
    }

    /// Whether this account has too many recent failed logins
    pub async fn is_email_limited(&self, email: &str) -> bool {
        self.failures.is_limited(&normalize(email), Utc::now()).await
    }

    pub async fn record_failed_attempt(&self, email: &str) {
        self.failures.record(normalize(email), Utc::now()).await;
    }

    /// Forget failures after a successful login
    pub async fn clear_failures(&self, email: &str) {
        self.failures.clear(&normalize(email)).await;
    }

    pub async fn is_ip_limited(&self, ip: IpAddr) -> bool {
        self.requests.is_limited(&ip, Utc::now()).await
    }

    pub async fn record_ip_request(&self, ip: IpAddr) {
        self.requests.record(ip, Utc::now()).await;
    }

    /// Drop expired entries; returns how many keys are still tracked
    pub async fn cleanup(&self) -> usize {
        let now = Utc::now();
        self.failures.prune(now).await + self.requests.prune(now).await
    }
}

impl Default for LoginRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

fn normalize(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[tokio::test]
    async fn test_email_limit_after_five_failures() {
        let limiter = LoginRateLimiter::new();

        for _ in 0..4 {
            limiter.record_failed_attempt("admin@example.com").await;
        }
        assert!(!limiter.is_email_limited("admin@example.com").await);

        limiter.record_failed_attempt("admin@example.com").await;
        assert!(limiter.is_email_limited("admin@example.com").await);

        limiter.clear_failures("admin@example.com").await;
        assert!(!limiter.is_email_limited("admin@example.com").await);
    }

    #[tokio::test]
    async fn test_email_key_is_normalized() {
        let limiter = LoginRateLimiter::new();
        for email in ["Admin@Example.com", " admin@example.com", "ADMIN@EXAMPLE.COM", "admin@example.com", "admin@example.com "] {
            limiter.record_failed_attempt(email).await;
        }
        assert!(limiter.is_email_limited("admin@example.com").await);
    }

    #[tokio::test]
    async fn test_ip_limit() {
        let limiter = LoginRateLimiter::new();
        let ip = IpAddr::from_str("127.0.0.1").unwrap();
        let other = IpAddr::from_str("10.0.0.2").unwrap();

        for _ in 0..9 {
            limiter.record_ip_request(ip).await;
        }
        assert!(!limiter.is_ip_limited(ip).await);
        limiter.record_ip_request(ip).await;
        assert!(limiter.is_ip_limited(ip).await);
        assert!(!limiter.is_ip_limited(other).await);
    }

    #[tokio::test]
    async fn test_window_expiry_and_prune() {
        let window: SlidingWindow<&str> = SlidingWindow::new(2, Duration::minutes(1));
        let start = Utc::now();
        window.record("k", start).await;
        window.record("k", start).await;
        assert!(window.is_limited(&"k", start).await);

        let later = start + Duration::minutes(2);
        assert!(!window.is_limited(&"k", later).await);
        assert_eq!(window.prune(later).await, 0);
    }
}
