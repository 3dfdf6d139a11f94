//! Capability-driven LLM router.
//!
//! Resolves a role name (e.g. "planner") to `provider_id/model`, dispatches
//! through a [`ProviderFailoverPool`], and falls back across `role.fallbacks`
//! on transient errors.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use voice_domain::config::RoleConfig;
use voice_domain::error::{Error, Result};
use voice_domain::stream::{BoxStream, StreamEvent};
use voice_domain::trace::TraceEvent;

use crate::failover::{FailoverConfig, ProviderFailoverPool};
use crate::registry::ProviderRegistry;
use crate::traits::{ChatRequest, ChatResponse};

pub struct LlmRouter {
    registry: ProviderRegistry,
    role_configs: HashMap<String, RoleConfig>,
    pool: ProviderFailoverPool,
    default_timeout: Duration,
}

fn resolve_model(spec: &str) -> (&str, &str) {
    match spec.split_once('/') {
        Some((provider, model)) => (provider, model),
        None => (spec, spec),
    }
}

impl LlmRouter {
    pub fn new(
        registry: ProviderRegistry,
        role_configs: HashMap<String, RoleConfig>,
        default_timeout_ms: u64,
    ) -> Self {
        let pool = ProviderFailoverPool::new(FailoverConfig::default());
        for role_cfg in role_configs.values() {
            let (provider_id, _) = resolve_model(&role_cfg.primary);
            pool.register(provider_id, 0, 1.0, 0.0);
            for (i, fallback) in role_cfg.fallbacks.iter().enumerate() {
                let (provider_id, _) = resolve_model(fallback);
                pool.register(provider_id, (i + 1) as i32, 1.0, 0.0);
            }
        }
        Self {
            registry,
            role_configs,
            pool,
            default_timeout: Duration::from_millis(default_timeout_ms),
        }
    }

    /// The nominal `provider/model` spec configured as a role's primary
    /// target, used as the cache's model key. Stable across failover (the
    /// cache is keyed on what was asked for, not on which candidate in the
    /// pool actually answered).
    pub fn primary_spec(&self, role: &str) -> Option<&str> {
        self.role_configs.get(role).map(|c| c.primary.as_str())
    }

    pub async fn chat_for_role(&self, role: &str, req: ChatRequest) -> Result<ChatResponse> {
        let role_cfg = self
            .role_configs
            .get(role)
            .ok_or_else(|| Error::Config(format!("no LLM role configured: {role}")))?;

        let mut specs = vec![role_cfg.primary.clone()];
        specs.extend(role_cfg.fallbacks.clone());
        let primary_provider = resolve_model(&role_cfg.primary).0.to_string();

        self.pool
            .execute(Some(&primary_provider), |provider_id| {
                let model = specs
                    .iter()
                    .find_map(|spec| {
                        let (p, m) = resolve_model(spec);
                        (p == provider_id).then(|| m.to_string())
                    })
                    .unwrap_or_default();
                let mut req = req.clone();
                req.model = Some(model);
                let role = role.to_string();
                let provider_id = provider_id.to_string();
                async move { self.try_chat(&provider_id, &role, req).await }
            })
            .await
    }

    /// Streaming counterpart of [`chat_for_role`](Self::chat_for_role): same
    /// role resolution and failover, but opens a token stream instead of
    /// waiting for one whole completion.
    pub async fn chat_stream_for_role(&self, role: &str, req: ChatRequest) -> Result<BoxStream<'static, Result<StreamEvent>>> {
        let role_cfg = self
            .role_configs
            .get(role)
            .ok_or_else(|| Error::Config(format!("no LLM role configured: {role}")))?;

        let mut specs = vec![role_cfg.primary.clone()];
        specs.extend(role_cfg.fallbacks.clone());
        let primary_provider = resolve_model(&role_cfg.primary).0.to_string();

        self.pool
            .execute(Some(&primary_provider), |provider_id| {
                let model = specs
                    .iter()
                    .find_map(|spec| {
                        let (p, m) = resolve_model(spec);
                        (p == provider_id).then(|| m.to_string())
                    })
                    .unwrap_or_default();
                let mut req = req.clone();
                req.model = Some(model);
                let role = role.to_string();
                let provider_id = provider_id.to_string();
                async move { self.try_chat_stream(&provider_id, &role, req).await }
            })
            .await
    }

    async fn try_chat(&self, provider_id: &str, role: &str, req: ChatRequest) -> Result<ChatResponse> {
        let provider = self
            .registry
            .llm(provider_id)
            .ok_or_else(|| Error::Config(format!("unknown LLM provider: {provider_id}")))?;

        let start = Instant::now();
        let result = tokio::time::timeout(self.default_timeout, provider.chat(req)).await;

        match result {
            Ok(Ok(resp)) => {
                TraceEvent::LlmRequest {
                    provider: provider_id.to_string(),
                    model: resp.model.clone(),
                    role: role.to_string(),
                    streaming: false,
                    duration_ms: start.elapsed().as_millis() as u64,
                    prompt_tokens: resp.usage.as_ref().map(|u| u.prompt_tokens),
                    completion_tokens: resp.usage.as_ref().map(|u| u.completion_tokens),
                }
                .emit();
                Ok(resp)
            }
            Ok(Err(err)) => Err(err),
            Err(_) => Err(Error::Timeout(format!("LLM provider {provider_id} timed out"))),
        }
    }

    async fn try_chat_stream(&self, provider_id: &str, role: &str, req: ChatRequest) -> Result<BoxStream<'static, Result<StreamEvent>>> {
        let provider = self
            .registry
            .llm(provider_id)
            .ok_or_else(|| Error::Config(format!("unknown LLM provider: {provider_id}")))?;

        let model = req.model.clone().unwrap_or_else(|| provider_id.to_string());
        let start = Instant::now();
        let result = tokio::time::timeout(self.default_timeout, provider.chat_stream(req)).await;

        match result {
            Ok(Ok(stream)) => {
                TraceEvent::LlmRequest {
                    provider: provider_id.to_string(),
                    model,
                    role: role.to_string(),
                    streaming: true,
                    duration_ms: start.elapsed().as_millis() as u64,
                    prompt_tokens: None,
                    completion_tokens: None,
                }
                .emit();
                Ok(stream)
            }
            Ok(Err(err)) => Err(err),
            Err(_) => Err(Error::Timeout(format!("LLM provider {provider_id} timed out"))),
        }
    }
}
