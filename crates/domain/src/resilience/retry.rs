use std::future::Future;
use std::time::Duration;

use rand::Rng;

use crate::error::Error;

#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub exponential_base: f64,
    pub jitter: bool,
    pub jitter_range: (f64, f64),
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            exponential_base: 2.0,
            jitter: true,
            jitter_range: (0.8, 1.2),
        }
    }
}

/// `min(base_delay * exponential_base^attempt, max_delay)`, `attempt` 0-indexed.
pub fn exponential_backoff(attempt: u32, config: &RetryConfig) -> Duration {
    let secs = config.base_delay.as_secs_f64() * config.exponential_base.powi(attempt as i32);
    Duration::from_secs_f64(secs.min(config.max_delay.as_secs_f64()))
}

pub fn add_jitter(delay: Duration, jitter_range: (f64, f64)) -> Duration {
    let factor = rand::thread_rng().gen_range(jitter_range.0..=jitter_range.1);
    Duration::from_secs_f64(delay.as_secs_f64() * factor)
}

/// Retries `op` up to `config.max_attempts` times with exponential backoff
/// and jitter, stopping early on a non-transient error.
pub async fn retry_async<T, F, Fut>(config: &RetryConfig, mut op: F) -> Result<T, Error>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, Error>>,
{
    let mut last_err = None;
    for attempt in 0..config.max_attempts {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !err.is_transient() || attempt + 1 == config.max_attempts {
                    return Err(err);
                }
                let mut delay = exponential_backoff(attempt, config);
                if config.jitter {
                    delay = add_jitter(delay, config.jitter_range);
                }
                tracing::warn!(attempt, delay_ms = delay.as_millis() as u64, error = %err, "retrying after transient error");
                last_err = Some(err);
                tokio::time::sleep(delay).await;
            }
        }
    }
    Err(last_err.unwrap_or_else(|| Error::Other("retry exhausted with no recorded error".into())))
}
