use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Call / session behaviour
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionsConfig {
    #[serde(default = "d_response_timeout")]
    pub response_timeout_seconds: u64,
    #[serde(default = "d_hangup_after_silence")]
    pub hangup_after_silence_seconds: u64,
    #[serde(default = "d_sample_rate")]
    pub sample_rate_hz: u32,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            response_timeout_seconds: d_response_timeout(),
            hangup_after_silence_seconds: d_hangup_after_silence(),
            sample_rate_hz: d_sample_rate(),
        }
    }
}

fn d_response_timeout() -> u64 {
    20
}
fn d_hangup_after_silence() -> u64 {
    30
}
fn d_sample_rate() -> u32 {
    16_000
}
