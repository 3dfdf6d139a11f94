use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Circuit breaker / retry defaults
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResilienceConfig {
    #[serde(default = "d_failure_threshold")]
    pub circuit_failure_threshold: u32,
    #[serde(default = "d_success_threshold")]
    pub circuit_success_threshold: u32,
    #[serde(default = "d_circuit_timeout")]
    pub circuit_timeout_seconds: u64,
    #[serde(default = "d_failure_rate_threshold")]
    pub circuit_failure_rate_threshold: f64,
    #[serde(default = "d_min_calls")]
    pub circuit_min_calls_before_rate: u32,
    #[serde(default = "d_max_attempts")]
    pub retry_max_attempts: u32,
    /// Token bucket capacity for the `connection` rate-limit tier, keyed by
    /// caller (agent) id at connection admission time.
    #[serde(default = "d_rate_limit_capacity")]
    pub rate_limit_capacity: u32,
    #[serde(default = "d_rate_limit_per_sec")]
    pub rate_limit_refill_per_sec: f64,
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            circuit_failure_threshold: d_failure_threshold(),
            circuit_success_threshold: d_success_threshold(),
            circuit_timeout_seconds: d_circuit_timeout(),
            circuit_failure_rate_threshold: d_failure_rate_threshold(),
            circuit_min_calls_before_rate: d_min_calls(),
            retry_max_attempts: d_max_attempts(),
            rate_limit_capacity: d_rate_limit_capacity(),
            rate_limit_refill_per_sec: d_rate_limit_per_sec(),
        }
    }
}

fn d_failure_threshold() -> u32 {
    5
}
fn d_success_threshold() -> u32 {
    2
}
fn d_circuit_timeout() -> u64 {
    30
}
fn d_failure_rate_threshold() -> f64 {
    0.5
}
fn d_min_calls() -> u32 {
    10
}
fn d_max_attempts() -> u32 {
    3
}
fn d_rate_limit_capacity() -> u32 {
    20
}
fn d_rate_limit_per_sec() -> f64 {
    1.0
}
