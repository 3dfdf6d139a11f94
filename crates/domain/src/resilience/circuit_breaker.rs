use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Serialize;

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub success_threshold: u32,
    pub timeout: Duration,
    pub half_open_max_calls: u32,
    pub failure_rate_threshold: f64,
    pub min_calls_before_rate: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            timeout: Duration::from_secs(30),
            half_open_max_calls: 3,
            failure_rate_threshold: 0.5,
            min_calls_before_rate: 10,
        }
    }
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct CircuitStats {
    pub total_calls: u64,
    pub total_failures: u64,
    pub total_successes: u64,
    pub consecutive_failures: u32,
    pub consecutive_successes: u32,
}

impl CircuitStats {
    pub fn failure_rate(&self) -> f64 {
        if self.total_calls == 0 {
            0.0
        } else {
            self.total_failures as f64 / self.total_calls as f64
        }
    }
}

struct Inner {
    state: CircuitState,
    stats: CircuitStats,
    opened_at: Option<Instant>,
    half_open_calls: u32,
}

/// Trips on consecutive failures OR a rolling failure rate (once a minimum
/// sample size has been reached), matching the Python implementation's dual
/// predicate. `execute` callers check `can_execute`, run their call, then
/// report the outcome via `record_success`/`record_failure`.
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                stats: CircuitStats::default(),
                opened_at: None,
                half_open_calls: 0,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    pub fn stats(&self) -> CircuitStats {
        self.inner.lock().stats.clone()
    }

    /// Whether a call is currently permitted. Transitions OPEN -> HALF_OPEN
    /// once the timeout has elapsed.
    pub fn can_execute(&self) -> bool {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed => true,
            CircuitState::HalfOpen => inner.half_open_calls < self.config.half_open_max_calls,
            CircuitState::Open => {
                let elapsed = inner
                    .opened_at
                    .map(|t| t.elapsed())
                    .unwrap_or(Duration::ZERO);
                if elapsed >= self.config.timeout {
                    inner.state = CircuitState::HalfOpen;
                    inner.half_open_calls = 0;
                    inner.stats.consecutive_successes = 0;
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn record_success(&self) {
        let mut inner = self.inner.lock();
        inner.stats.total_calls += 1;
        inner.stats.total_successes += 1;
        inner.stats.consecutive_successes += 1;
        inner.stats.consecutive_failures = 0;

        match inner.state {
            CircuitState::HalfOpen => {
                inner.half_open_calls += 1;
                if inner.stats.consecutive_successes >= self.config.success_threshold {
                    inner.state = CircuitState::Closed;
                    inner.opened_at = None;
                }
            }
            CircuitState::Closed | CircuitState::Open => {}
        }
    }

    pub fn record_failure(&self) {
        let mut inner = self.inner.lock();
        inner.stats.total_calls += 1;
        inner.stats.total_failures += 1;
        inner.stats.consecutive_failures += 1;
        inner.stats.consecutive_successes = 0;

        let should_open = match inner.state {
            CircuitState::HalfOpen => true,
            CircuitState::Closed => {
                inner.stats.consecutive_failures >= self.config.failure_threshold
                    || (inner.stats.total_calls >= self.config.min_calls_before_rate as u64
                        && inner.stats.failure_rate() >= self.config.failure_rate_threshold)
            }
            CircuitState::Open => false,
        };

        if should_open {
            inner.state = CircuitState::Open;
            inner.opened_at = Some(Instant::now());
            inner.half_open_calls = 0;
        }
    }

    /// Manual override back to CLOSED, clearing counters.
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        inner.state = CircuitState::Closed;
        inner.stats = CircuitStats::default();
        inner.opened_at = None;
        inner.half_open_calls = 0;
    }
}

/// Composition-root-owned registry of named circuit breakers, one per
/// provider id. Built explicitly at startup rather than kept as a hidden
/// global static.
#[derive(Default)]
pub struct CircuitBreakerRegistry {
    breakers: Mutex<HashMap<String, std::sync::Arc<CircuitBreaker>>>,
    default_config: CircuitBreakerConfig,
}

impl CircuitBreakerRegistry {
    pub fn new(default_config: CircuitBreakerConfig) -> Self {
        Self {
            breakers: Mutex::new(HashMap::new()),
            default_config,
        }
    }

    pub fn get_or_create(&self, name: &str) -> std::sync::Arc<CircuitBreaker> {
        let mut breakers = self.breakers.lock();
        breakers
            .entry(name.to_string())
            .or_insert_with(|| {
                std::sync::Arc::new(CircuitBreaker::new(name, self.default_config.clone()))
            })
            .clone()
    }

    pub fn all_status(&self) -> HashMap<String, (CircuitState, CircuitStats)> {
        self.breakers
            .lock()
            .iter()
            .map(|(k, v)| (k.clone(), (v.state(), v.stats())))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: 3,
            success_threshold: 2,
            timeout: Duration::from_millis(20),
            half_open_max_calls: 2,
            failure_rate_threshold: 0.5,
            min_calls_before_rate: 10,
        }
    }

    #[test]
    fn opens_after_consecutive_failures() {
        let cb = CircuitBreaker::new("test", config());
        assert_eq!(cb.state(), CircuitState::Closed);
        for _ in 0..3 {
            assert!(cb.can_execute());
            cb.record_failure();
        }
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(!cb.can_execute());
    }

    #[test]
    fn opens_on_failure_rate_before_consecutive_threshold() {
        let cb = CircuitBreaker::new("test", config());
        // alternate so consecutive_failures never reaches 3, but rate does.
        for i in 0..10 {
            if i % 2 == 0 {
                cb.record_failure();
            } else {
                cb.record_success();
            }
        }
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[test]
    fn half_open_recovers_to_closed() {
        let cb = CircuitBreaker::new("test", config());
        for _ in 0..3 {
            cb.record_failure();
        }
        assert_eq!(cb.state(), CircuitState::Open);
        std::thread::sleep(Duration::from_millis(25));
        assert!(cb.can_execute());
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        cb.record_success();
        cb.record_success();
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn half_open_failure_reopens() {
        let cb = CircuitBreaker::new("test", config());
        for _ in 0..3 {
            cb.record_failure();
        }
        std::thread::sleep(Duration::from_millis(25));
        assert!(cb.can_execute());
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[test]
    fn reset_forces_closed() {
        let cb = CircuitBreaker::new("test", config());
        for _ in 0..3 {
            cb.record_failure();
        }
        assert_eq!(cb.state(), CircuitState::Open);
        cb.reset();
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.stats().total_calls, 0);
    }
}
