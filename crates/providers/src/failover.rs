use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use rand::Rng;

use voice_domain::error::Error;
use voice_domain::resilience::{CircuitBreaker, CircuitBreakerConfig, CircuitState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderHealth {
    Healthy,
    Degraded,
    Unhealthy,
    Unknown,
}

#[derive(Debug, Clone)]
pub struct ProviderStatus {
    pub name: String,
    pub health: ProviderHealth,
    pub priority: i32,
    pub weight: f64,
    pub cost_per_unit: f64,
    pub success_count: u64,
    pub failure_count: u64,
    pub total_latency_ms: f64,
    pub last_error: Option<String>,
}

impl ProviderStatus {
    fn success_rate(&self) -> f64 {
        let total = self.success_count + self.failure_count;
        if total == 0 {
            1.0
        } else {
            self.success_count as f64 / total as f64
        }
    }

    fn avg_latency_ms(&self) -> f64 {
        if self.success_count == 0 {
            f64::INFINITY
        } else {
            self.total_latency_ms / self.success_count as f64
        }
    }

    fn record_success(&mut self, latency_ms: f64) {
        self.success_count += 1;
        self.total_latency_ms += latency_ms;
        let rate = self.success_rate();
        self.health = if rate >= 0.95 {
            ProviderHealth::Healthy
        } else if rate >= 0.80 {
            ProviderHealth::Degraded
        } else {
            self.health
        };
    }

    fn record_failure(&mut self, error: String) {
        self.failure_count += 1;
        self.last_error = Some(error);
        let rate = self.success_rate();
        self.health = if rate < 0.50 {
            ProviderHealth::Unhealthy
        } else if rate < 0.80 {
            ProviderHealth::Degraded
        } else {
            self.health
        };
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailoverStrategy {
    Priority,
    RoundRobin,
    Weighted,
    LeastLatency,
    LeastCost,
    Random,
}

#[derive(Debug, Clone)]
pub struct FailoverConfig {
    pub strategy: FailoverStrategy,
    pub max_retries: usize,
    pub call_timeout: Duration,
    pub exclude_unhealthy: bool,
}

impl Default for FailoverConfig {
    fn default() -> Self {
        Self {
            strategy: FailoverStrategy::Priority,
            max_retries: 3,
            call_timeout: Duration::from_secs(30),
            exclude_unhealthy: true,
        }
    }
}

/// Routes calls across registered providers, tracking health and wrapping
/// each provider in its own circuit breaker. Generic over the result type so
/// the same pool drives STT connects, LLM completions, or TTS synthesis.
pub struct ProviderFailoverPool {
    config: FailoverConfig,
    statuses: Mutex<HashMap<String, ProviderStatus>>,
    breakers: Mutex<HashMap<String, Arc<CircuitBreaker>>>,
    round_robin_index: AtomicUsize,
}

impl ProviderFailoverPool {
    pub fn new(config: FailoverConfig) -> Self {
        Self {
            config,
            statuses: Mutex::new(HashMap::new()),
            breakers: Mutex::new(HashMap::new()),
            round_robin_index: AtomicUsize::new(0),
        }
    }

    pub fn register(&self, name: &str, priority: i32, weight: f64, cost_per_unit: f64) {
        self.statuses.lock().insert(
            name.to_string(),
            ProviderStatus {
                name: name.to_string(),
                health: ProviderHealth::Healthy,
                priority,
                weight,
                cost_per_unit,
                success_count: 0,
                failure_count: 0,
                total_latency_ms: 0.0,
                last_error: None,
            },
        );
        self.breakers.lock().insert(
            name.to_string(),
            Arc::new(CircuitBreaker::new(
                format!("provider_{name}"),
                CircuitBreakerConfig::default(),
            )),
        );
    }

    pub fn status(&self, name: &str) -> Option<ProviderStatus> {
        self.statuses.lock().get(name).cloned()
    }

    fn select_order(&self) -> Vec<String> {
        let statuses = self.statuses.lock();
        let breakers = self.breakers.lock();

        let mut available: Vec<ProviderStatus> = statuses
            .values()
            .filter(|s| {
                if !self.config.exclude_unhealthy {
                    return true;
                }
                if s.health == ProviderHealth::Unhealthy {
                    return false;
                }
                !matches!(
                    breakers.get(&s.name).map(|b| b.state()),
                    Some(CircuitState::Open)
                )
            })
            .cloned()
            .collect();

        if available.is_empty() {
            available = statuses.values().cloned().collect();
        }

        match self.config.strategy {
            FailoverStrategy::Priority => {
                available.sort_by_key(|s| s.priority);
            }
            FailoverStrategy::LeastLatency => {
                available.sort_by(|a, b| {
                    a.avg_latency_ms()
                        .partial_cmp(&b.avg_latency_ms())
                        .unwrap_or(std::cmp::Ordering::Equal)
                });
            }
            FailoverStrategy::LeastCost => {
                available.sort_by(|a, b| {
                    a.cost_per_unit
                        .partial_cmp(&b.cost_per_unit)
                        .unwrap_or(std::cmp::Ordering::Equal)
                });
            }
            FailoverStrategy::RoundRobin => {
                if !available.is_empty() {
                    let len = available.len();
                    let idx = self.round_robin_index.fetch_add(1, Ordering::Relaxed) % len;
                    available.rotate_left(idx);
                }
            }
            FailoverStrategy::Weighted => {
                let total_weight: f64 = available.iter().map(|s| s.weight).sum();
                if total_weight > 0.0 {
                    let mut rng = rand::thread_rng();
                    available.sort_by(|a, b| {
                        let ka = rng.gen_range(0.0..1.0) * (a.weight / total_weight);
                        let kb = rng.gen_range(0.0..1.0) * (b.weight / total_weight);
                        kb.partial_cmp(&ka).unwrap_or(std::cmp::Ordering::Equal)
                    });
                }
            }
            FailoverStrategy::Random => {
                let mut rng = rand::thread_rng();
                for i in (1..available.len()).rev() {
                    let j = rng.gen_range(0..=i);
                    available.swap(i, j);
                }
            }
        }

        available.into_iter().map(|s| s.name).collect()
    }

    /// Attempt `call` against providers in strategy order, stopping at the
    /// first success. `preferred` is tried first if given and registered.
    pub async fn execute<T, F, Fut>(
        &self,
        preferred: Option<&str>,
        mut call: F,
    ) -> Result<T, Error>
    where
        F: FnMut(&str) -> Fut,
        Fut: Future<Output = Result<T, Error>>,
    {
        if self.statuses.lock().is_empty() {
            return Err(Error::Config("no providers registered".into()));
        }

        let mut order = self.select_order();
        if let Some(pref) = preferred {
            if self.statuses.lock().contains_key(pref) {
                order.retain(|n| n != pref);
                order.insert(0, pref.to_string());
            }
        }

        let mut last_err = None;
        for name in order.into_iter().take(self.config.max_retries) {
            let breaker = self.breakers.lock().get(&name).cloned();
            if let Some(breaker) = &breaker {
                if !breaker.can_execute() {
                    continue;
                }
            }

            let start = Instant::now();
            let result = tokio::time::timeout(self.config.call_timeout, call(&name)).await;

            match result {
                Ok(Ok(value)) => {
                    if let Some(breaker) = &breaker {
                        breaker.record_success();
                    }
                    if let Some(status) = self.statuses.lock().get_mut(&name) {
                        status.record_success(start.elapsed().as_secs_f64() * 1000.0);
                    }
                    return Ok(value);
                }
                Ok(Err(err)) => {
                    if let Some(breaker) = &breaker {
                        breaker.record_failure();
                    }
                    if let Some(status) = self.statuses.lock().get_mut(&name) {
                        status.record_failure(err.to_string());
                    }
                    last_err = Some(err);
                }
                Err(_) => {
                    if let Some(breaker) = &breaker {
                        breaker.record_failure();
                    }
                    let timeout_err = Error::Timeout(format!("provider {name} timed out"));
                    if let Some(status) = self.statuses.lock().get_mut(&name) {
                        status.record_failure(timeout_err.to_string());
                    }
                    last_err = Some(timeout_err);
                }
            }
        }

        Err(last_err.unwrap_or_else(|| Error::Other("all providers failed".into())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    #[tokio::test]
    async fn falls_back_to_second_provider_on_failure() {
        let pool = ProviderFailoverPool::new(FailoverConfig::default());
        pool.register("a", 0, 1.0, 0.0);
        pool.register("b", 1, 1.0, 0.0);

        let result = pool
            .execute::<i32, _, _>(None, |name| async move {
                if name == "a" {
                    Err(Error::Timeout("a is down".into()))
                } else {
                    Ok(42)
                }
            })
            .await
            .unwrap();
        assert_eq!(result, 42);
    }

    #[tokio::test]
    async fn preferred_provider_is_tried_first() {
        let pool = ProviderFailoverPool::new(FailoverConfig::default());
        pool.register("a", 0, 1.0, 0.0);
        pool.register("b", 1, 1.0, 0.0);

        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();
        let result = pool
            .execute::<&str, _, _>(Some("b"), move |name| {
                calls_clone.fetch_add(1, Ordering::SeqCst);
                async move { Ok(name) }
            })
            .await
            .unwrap();
        assert_eq!(result, "b");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn all_failing_returns_last_error() {
        let pool = ProviderFailoverPool::new(FailoverConfig {
            max_retries: 2,
            ..Default::default()
        });
        pool.register("a", 0, 1.0, 0.0);
        pool.register("b", 1, 1.0, 0.0);

        let result = pool
            .execute::<(), _, _>(None, |_name| async move { Err(Error::Timeout("down".into())) })
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn empty_pool_errors_immediately() {
        let pool = ProviderFailoverPool::new(FailoverConfig::default());
        let result = pool.execute::<(), _, _>(None, |_| async { Ok(()) }).await;
        assert!(result.is_err());
    }
}
