// src/services/login_limiter.rs
//! Login attempt limiter
//!
//! Tracks login attempts per `{ip}-{email}` key inside a fixed window and
//! blocks further attempts once the configured maximum is reached. Every
//! login POST counts as one attempt; a successful login deletes the key
//! outright, so the counter is either absent or counting toward the limit.

use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashMap;
use std::env;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
pub struct LimiterConfig {
    pub max_attempts: u32,
    pub window: Duration,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            max_attempts: 10,                      // 10 login attempts
            window: Duration::from_secs(15 * 60), // per 15 minute window
        }
    }
}

impl LimiterConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(max) = env::var("LOGIN_MAX_ATTEMPTS") {
            if let Ok(val) = max.parse::<u32>() {
                config.max_attempts = val;
            }
        }

        if let Ok(window) = env::var("LOGIN_WINDOW_SECONDS") {
            if let Ok(val) = window.parse::<u64>() {
                config.window = Duration::from_secs(val);
            }
        }

        config
    }
}

#[derive(Debug, Clone)]
struct AttemptState {
    count: u32,
    window_start: Instant,
}

impl AttemptState {
    fn new() -> Self {
        Self {
            count: 0,
            window_start: Instant::now(),
        }
    }

    fn is_expired(&self, window: Duration) -> bool {
        self.window_start.elapsed() > window
    }
}

/// Outcome of counting one login attempt against a key
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LimitDecision {
    Allowed {
        attempts: u32,
    },
    Blocked {
        retry_after_secs: u64,
        attempts: u32,
        max_attempts: u32,
    },
}

/// Per-key attempt status, exposed through the admin inspection endpoint
#[derive(Debug, Clone, Serialize)]
pub struct KeyStatus {
    pub key: String,
    pub attempts: u32,
    pub remaining_attempts: u32,
}

#[derive(Debug, Error)]
pub enum AttemptStoreError {
    #[error("attempt store backend unavailable: {0}")]
    Backend(String),
}

/// Storage backend for login attempt counters.
///
/// Each operation is atomic from the caller's point of view; the in-memory
/// implementation holds its write lock across the whole read-modify-write so
/// concurrent failures for the same key cannot lose updates. An external
/// cache can be slotted in behind the same trait.
#[async_trait]
pub trait AttemptStore: Send + Sync {
    /// Count one attempt for `key` and report whether it is allowed.
    async fn count_attempt(
        &self,
        key: &str,
        config: &LimiterConfig,
    ) -> Result<LimitDecision, AttemptStoreError>;

    /// Remove the counter for `key` entirely (successful login).
    async fn clear(&self, key: &str) -> Result<(), AttemptStoreError>;

    /// Remove every counter whose key contains `fragment` (admin reset).
    /// Returns the number of keys removed.
    async fn reset_matching(&self, fragment: &str) -> Result<usize, AttemptStoreError>;

    /// List counters whose key contains `fragment`.
    async fn status_matching(
        &self,
        fragment: &str,
    ) -> Result<Vec<(String, u32)>, AttemptStoreError>;
}

/// Process-local attempt store
#[derive(Debug, Default)]
pub struct MemoryAttemptStore {
    entries: RwLock<HashMap<String, AttemptState>>,
}

impl MemoryAttemptStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AttemptStore for MemoryAttemptStore {
    async fn count_attempt(
        &self,
        key: &str,
        config: &LimiterConfig,
    ) -> Result<LimitDecision, AttemptStoreError> {
        let mut entries = self.entries.write().await;

        let state = entries
            .entry(key.to_string())
            .or_insert_with(AttemptState::new);

        // Expired windows start over; the window is anchored at the key's
        // first recorded attempt, not at individual login timestamps.
        if state.is_expired(config.window) {
            *state = AttemptState::new();
        }

        state.count += 1;

        if state.count >= config.max_attempts {
            let elapsed = state.window_start.elapsed();
            let retry_after_secs = config.window.saturating_sub(elapsed).as_secs();
            return Ok(LimitDecision::Blocked {
                retry_after_secs,
                attempts: state.count,
                max_attempts: config.max_attempts,
            });
        }

        Ok(LimitDecision::Allowed {
            attempts: state.count,
        })
    }

    async fn clear(&self, key: &str) -> Result<(), AttemptStoreError> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn reset_matching(&self, fragment: &str) -> Result<usize, AttemptStoreError> {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|key, _| !key.contains(fragment));
        Ok(before - entries.len())
    }

    async fn status_matching(
        &self,
        fragment: &str,
    ) -> Result<Vec<(String, u32)>, AttemptStoreError> {
        let entries = self.entries.read().await;
        Ok(entries
            .iter()
            .filter(|(key, _)| key.contains(fragment))
            .map(|(key, state)| (key.clone(), state.count))
            .collect())
    }
}

/// Login rate limiter over an injected attempt store
pub struct LoginLimiter {
    config: LimiterConfig,
    store: Box<dyn AttemptStore>,
}

impl LoginLimiter {
    pub fn new(config: LimiterConfig, store: Box<dyn AttemptStore>) -> Self {
        Self { config, store }
    }

    /// Composite limiter key scoping abuse tracking to one client address
    /// and one account identifier.
    pub fn key(client_addr: &str, email: &str) -> String {
        format!("{}-{}", client_addr, email)
    }

    pub fn max_attempts(&self) -> u32 {
        self.config.max_attempts
    }

    /// Count one login attempt for the key and decide whether it may proceed.
    pub async fn count_attempt(&self, key: &str) -> Result<LimitDecision, AttemptStoreError> {
        self.store.count_attempt(key, &self.config).await
    }

    /// Delete the counter for the key (successful login path).
    pub async fn clear(&self, key: &str) -> Result<(), AttemptStoreError> {
        self.store.clear(key).await
    }

    /// Delete every counter tied to the given account identifier.
    pub async fn reset_matching(&self, email: &str) -> Result<usize, AttemptStoreError> {
        self.store.reset_matching(email).await
    }

    /// Report attempt counts for every key tied to the given account.
    pub async fn status_for(&self, email: &str) -> Result<Vec<KeyStatus>, AttemptStoreError> {
        let statuses = self.store.status_matching(email).await?;
        Ok(statuses
            .into_iter()
            .map(|(key, attempts)| KeyStatus {
                key,
                attempts,
                remaining_attempts: self.config.max_attempts.saturating_sub(attempts),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(max_attempts: u32, window: Duration) -> LoginLimiter {
        LoginLimiter::new(
            LimiterConfig {
                max_attempts,
                window,
            },
            Box::new(MemoryAttemptStore::new()),
        )
    }

    #[test]
    fn test_key_format() {
        assert_eq!(
            LoginLimiter::key("203.0.113.1", "a@x.com"),
            "203.0.113.1-a@x.com"
        );
    }

    #[tokio::test]
    async fn test_attempts_increment_by_one_per_call() {
        let limiter = limiter(10, Duration::from_secs(900));
        let key = LoginLimiter::key("127.0.0.1", "a@x.com");

        for expected in 1..=9u32 {
            match limiter.count_attempt(&key).await.unwrap() {
                LimitDecision::Allowed { attempts } => assert_eq!(attempts, expected),
                other => panic!("unexpected decision: {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn test_blocks_at_max_attempts() {
        let limiter = limiter(10, Duration::from_secs(900));
        let key = LoginLimiter::key("127.0.0.1", "a@x.com");

        for _ in 0..9 {
            assert!(matches!(
                limiter.count_attempt(&key).await.unwrap(),
                LimitDecision::Allowed { .. }
            ));
        }

        // The tenth attempt hits the limit, as does everything after it.
        match limiter.count_attempt(&key).await.unwrap() {
            LimitDecision::Blocked {
                attempts,
                max_attempts,
                retry_after_secs,
            } => {
                assert_eq!(attempts, 10);
                assert_eq!(max_attempts, 10);
                assert!(retry_after_secs <= 900);
            }
            other => panic!("unexpected decision: {:?}", other),
        }
        assert!(matches!(
            limiter.count_attempt(&key).await.unwrap(),
            LimitDecision::Blocked { .. }
        ));
    }

    #[tokio::test]
    async fn test_clear_resets_to_absent() {
        let limiter = limiter(3, Duration::from_secs(900));
        let key = LoginLimiter::key("127.0.0.1", "a@x.com");

        limiter.count_attempt(&key).await.unwrap();
        limiter.count_attempt(&key).await.unwrap();
        limiter.clear(&key).await.unwrap();

        assert!(limiter.status_for("a@x.com").await.unwrap().is_empty());
        match limiter.count_attempt(&key).await.unwrap() {
            LimitDecision::Allowed { attempts } => assert_eq!(attempts, 1),
            other => panic!("unexpected decision: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_window_expiry_unblocks() {
        let limiter = limiter(2, Duration::from_millis(40));
        let key = LoginLimiter::key("127.0.0.1", "a@x.com");

        limiter.count_attempt(&key).await.unwrap();
        assert!(matches!(
            limiter.count_attempt(&key).await.unwrap(),
            LimitDecision::Blocked { .. }
        ));

        tokio::time::sleep(Duration::from_millis(60)).await;

        match limiter.count_attempt(&key).await.unwrap() {
            LimitDecision::Allowed { attempts } => assert_eq!(attempts, 1),
            other => panic!("unexpected decision: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_reset_matching_only_touches_matching_keys() {
        let limiter = limiter(10, Duration::from_secs(900));
        limiter
            .count_attempt(&LoginLimiter::key("10.0.0.1", "a@x.com"))
            .await
            .unwrap();
        limiter
            .count_attempt(&LoginLimiter::key("10.0.0.2", "a@x.com"))
            .await
            .unwrap();
        limiter
            .count_attempt(&LoginLimiter::key("10.0.0.1", "b@x.com"))
            .await
            .unwrap();

        let cleared = limiter.reset_matching("a@x.com").await.unwrap();
        assert_eq!(cleared, 2);
        assert!(limiter.status_for("a@x.com").await.unwrap().is_empty());
        assert_eq!(limiter.status_for("b@x.com").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_status_reports_remaining_attempts() {
        let limiter = limiter(10, Duration::from_secs(900));
        let key = LoginLimiter::key("127.0.0.1", "a@x.com");
        for _ in 0..4 {
            limiter.count_attempt(&key).await.unwrap();
        }

        let statuses = limiter.status_for("a@x.com").await.unwrap();
        assert_eq!(statuses.len(), 1);
        assert_eq!(statuses[0].attempts, 4);
        assert_eq!(statuses[0].remaining_attempts, 6);
    }
}
