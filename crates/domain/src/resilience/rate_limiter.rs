use std::collections::HashMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use serde::Serialize;

use crate::error::Error;

#[derive(Debug, Clone, Serialize)]
pub struct RateLimitResult {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    pub reset_at_unix: u64,
    pub retry_after_ms: Option<u64>,
}

impl RateLimitResult {
    pub fn check_or_raise(self) -> Result<Self, Error> {
        if self.allowed {
            Ok(self)
        } else {
            Err(Error::RateLimited {
                retry_after_ms: self.retry_after_ms.unwrap_or(1000),
            })
        }
    }
}

fn now_unix_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

fn now_unix_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
}

/// Weighted two-bucket approximation of a sliding window: the current
/// window's count plus a fraction of the previous window's count, weighted
/// by how far into the current window we are.
pub struct SlidingWindowRateLimiter {
    limit: u32,
    window: Duration,
    counts: Mutex<HashMap<String, (i64, u32, u32)>>, // key -> (window_index, prev_count, cur_count)
}

impl SlidingWindowRateLimiter {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit,
            window,
            counts: Mutex::new(HashMap::new()),
        }
    }

    pub fn check(&self, key: &str) -> RateLimitResult {
        let window_secs = self.window.as_secs().max(1) as i64;
        let now = now_unix_secs() as i64;
        let window_index = now / window_secs;
        let position = (now % window_secs) as f64 / window_secs as f64;

        let mut counts = self.counts.lock();
        let entry = counts.entry(key.to_string()).or_insert((window_index, 0, 0));

        if entry.0 != window_index {
            // Shift: current becomes previous if contiguous, else zero out.
            if entry.0 == window_index - 1 {
                entry.1 = entry.2;
            } else {
                entry.1 = 0;
            }
            entry.2 = 0;
            entry.0 = window_index;
        }

        let weighted = entry.1 as f64 * (1.0 - position) + entry.2 as f64;
        let allowed = weighted < self.limit as f64;
        if allowed {
            entry.2 += 1;
        }

        let remaining = (self.limit as f64 - weighted).max(0.0) as u32;
        let retry_after_ms = if allowed {
            None
        } else {
            let excess = weighted - self.limit as f64 + 1.0;
            let secs_per_unit = window_secs as f64 / self.limit.max(1) as f64;
            Some((excess * secs_per_unit * 1000.0) as u64)
        };

        RateLimitResult {
            allowed,
            limit: self.limit,
            remaining,
            reset_at_unix: ((window_index + 1) * window_secs) as u64,
            retry_after_ms,
        }
    }

    pub fn reset(&self, key: &str) {
        self.counts.lock().remove(key);
    }
}

/// Classic token bucket: tokens accrue at `rate` per second up to `capacity`,
/// one token consumed per allowed call.
pub struct TokenBucketRateLimiter {
    capacity: f64,
    rate: f64,
    buckets: Mutex<HashMap<String, (f64, u128)>>, // key -> (tokens, last_update_ms)
}

impl TokenBucketRateLimiter {
    pub fn new(capacity: u32, rate_per_sec: f64) -> Self {
        Self {
            capacity: capacity as f64,
            rate: rate_per_sec,
            buckets: Mutex::new(HashMap::new()),
        }
    }

    pub fn check(&self, key: &str) -> RateLimitResult {
        let now = now_unix_millis();
        let mut buckets = self.buckets.lock();
        let entry = buckets
            .entry(key.to_string())
            .or_insert((self.capacity, now));

        let elapsed_secs = (now.saturating_sub(entry.1)) as f64 / 1000.0;
        entry.0 = (entry.0 + elapsed_secs * self.rate).min(self.capacity);
        entry.1 = now;

        let allowed = entry.0 >= 1.0;
        if allowed {
            entry.0 -= 1.0;
        }

        let retry_after_ms = if allowed {
            None
        } else {
            Some(((1.0 - entry.0) / self.rate * 1000.0) as u64)
        };

        RateLimitResult {
            allowed,
            limit: self.capacity as u32,
            remaining: entry.0 as u32,
            reset_at_unix: now_unix_secs(),
            retry_after_ms,
        }
    }

    pub fn reset(&self, key: &str) {
        self.buckets.lock().remove(key);
    }
}

/// Dispatches to one of several named limiter tiers (e.g. "free", "pro").
pub enum Tier {
    SlidingWindow(SlidingWindowRateLimiter),
    TokenBucket(TokenBucketRateLimiter),
}

impl Tier {
    fn check(&self, key: &str) -> RateLimitResult {
        match self {
            Tier::SlidingWindow(l) => l.check(key),
            Tier::TokenBucket(l) => l.check(key),
        }
    }
}

#[derive(Default)]
pub struct RateLimitManager {
    tiers: HashMap<String, Tier>,
}

impl RateLimitManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_tier(&mut self, name: impl Into<String>, tier: Tier) {
        self.tiers.insert(name.into(), tier);
    }

    pub fn check(&self, tier: &str, key: &str) -> Result<RateLimitResult, Error> {
        let tier = self
            .tiers
            .get(tier)
            .ok_or_else(|| Error::Config(format!("unknown rate limit tier: {tier}")))?;
        Ok(tier.check(key))
    }

    pub fn check_or_raise(&self, tier: &str, key: &str) -> Result<RateLimitResult, Error> {
        self.check(tier, key)?.check_or_raise()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_bucket_allows_up_to_capacity() {
        let limiter = TokenBucketRateLimiter::new(3, 1.0);
        assert!(limiter.check("a").allowed);
        assert!(limiter.check("a").allowed);
        assert!(limiter.check("a").allowed);
        assert!(!limiter.check("a").allowed);
    }

    #[test]
    fn sliding_window_allows_up_to_limit() {
        let limiter = SlidingWindowRateLimiter::new(2, Duration::from_secs(60));
        assert!(limiter.check("a").allowed);
        assert!(limiter.check("a").allowed);
        assert!(!limiter.check("a").allowed);
    }

    #[test]
    fn manager_dispatches_by_tier() {
        let mut manager = RateLimitManager::new();
        manager.add_tier("free", Tier::TokenBucket(TokenBucketRateLimiter::new(1, 0.1)));
        assert!(manager.check_or_raise("free", "user-1").is_ok());
        assert!(manager.check_or_raise("free", "user-1").is_err());
        assert!(manager.check("missing-tier", "user-1").is_err());
    }
}
