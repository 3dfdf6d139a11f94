use serde::Serialize;

/// Structured trace events emitted across the voxgate crates.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    SessionStarted {
        session_id: String,
        agent_id: String,
    },
    SessionEnded {
        session_id: String,
        duration_ms: u64,
        reason: String,
    },
    LlmRequest {
        provider: String,
        model: String,
        role: String,
        streaming: bool,
        duration_ms: u64,
        prompt_tokens: Option<u32>,
        completion_tokens: Option<u32>,
    },
    LlmFallback {
        from_provider: String,
        from_model: String,
        to_provider: String,
        to_model: String,
        reason: String,
    },
    CircuitOpened {
        provider: String,
        consecutive_failures: u32,
    },
    Interrupt {
        session_id: String,
        action: String,
    },
    RateLimited {
        tier: String,
        key: String,
        retry_after_ms: u64,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "voxgate_event");
    }
}
