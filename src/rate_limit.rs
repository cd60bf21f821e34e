use std::collections::HashMap;
use std::sync::Mutex;

use crate::errors::AppError;
use crate::utils::utc_now;

/// Sliding-window limit applied per actor + location + mutation type.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    pub limit: usize,
    pub window_ms: i64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            limit: 10,
            window_ms: 60_000,
        }
    }
}

/// Mutation-frequency guard. Owned by `AppState` and passed into handlers -
/// there is no process-global bucket table, and `reset` gives tests and
/// shutdown paths an explicit teardown.
#[derive(Debug, Default)]
pub struct RateLimiter {
    config: RateLimitConfig,
    buckets: Mutex<HashMap<String, Vec<i64>>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            buckets: Mutex::new(HashMap::new()),
        }
    }

    pub fn consume(
        &self,
        actor_id: &str,
        location_id: Option<&str>,
        mutation_type: &str,
    ) -> Result<(), AppError> {
        self.consume_at(actor_id, location_id, mutation_type, utc_now().timestamp_millis())
    }

    /// Clock-injected variant of `consume`, used directly by tests.
    pub fn consume_at(
        &self,
        actor_id: &str,
        location_id: Option<&str>,
        mutation_type: &str,
        now_ms: i64,
    ) -> Result<(), AppError> {
        let key = key_of(actor_id, location_id, mutation_type);
        let window_start = now_ms - self.config.window_ms;

        let mut buckets = self
            .buckets
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let recent = buckets.entry(key).or_default();
        recent.retain(|ts| *ts > window_start);

        if recent.len() >= self.config.limit {
            let retry_after_ms = (recent[0] + self.config.window_ms - now_ms).max(0) as u64;
            tracing::warn!(
                actor_id = %actor_id,
                location_id = ?location_id,
                mutation_type = %mutation_type,
                retry_after_ms,
                "mutation rate limit exceeded"
            );
            return Err(AppError::rate_limited(
                format!("[RateLimit] Too many \"{}\" mutations", mutation_type),
                retry_after_ms,
            ));
        }

        recent.push(now_ms);
        Ok(())
    }

    pub fn reset(&self) {
        self.buckets
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
    }
}

fn key_of(actor_id: &str, location_id: Option<&str>, mutation_type: &str) -> String {
    format!("{}::{}::{}", actor_id, location_id.unwrap_or("_"), mutation_type)
}
