use std::sync::Arc;

use voice_cache::LlmCache;
use voice_domain::config::Config;
use voice_domain::resilience::RateLimitManager;
use voice_providers::{LlmRouter, ProviderRegistry};
use voice_sessions::SessionRegistry;

use crate::connection::ConnectionRegistry;
use crate::runtime::CancelMap;

/// Shared application state passed to every WebSocket connection and CLI
/// subcommand.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,

    /// Direct STT/TTS lookup by provider id (the LLM router keeps its own
    /// copy of the registry for role resolution).
    pub providers: Arc<ProviderRegistry>,
    pub llm_router: Arc<LlmRouter>,
    pub llm_cache: Arc<LlmCache>,

    pub sessions: Arc<SessionRegistry>,
    pub connections: Arc<ConnectionRegistry>,
    pub cancel_map: Arc<CancelMap>,

    /// Connection-admission rate limiting (C4), keyed by agent id.
    pub rate_limits: Arc<RateLimitManager>,
}
