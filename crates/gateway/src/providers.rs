//! Builds the process's [`ProviderRegistry`] from configuration.
//!
//! No vendor STT/LLM/TTS SDK ships with this gateway (see
//! `voice_providers::reference`); every provider id an agent or LLM role
//! names is bound to the matching in-process reference implementation.
//! Swapping in a real client means registering it under the same id here.

use std::collections::HashSet;

use voice_domain::config::Config;
use voice_providers::{EchoLlmProvider, FixedSttProvider, ProviderRegistry, SilentTtsProvider};
use std::sync::Arc;

pub fn build_provider_registry(config: &Config) -> ProviderRegistry {
    let mut registry = ProviderRegistry::new();

    let mut stt_ids: HashSet<&str> = HashSet::new();
    let mut tts_ids: HashSet<&str> = HashSet::new();
    for agent in config.agents.values() {
        stt_ids.insert(agent.stt_provider.as_str());
        tts_ids.insert(agent.tts_provider.as_str());
    }
    stt_ids.insert("default");
    tts_ids.insert("default");

    for id in stt_ids {
        registry.register_stt(id, Arc::new(FixedSttProvider::new(id, "hello from the reference speech recognizer")));
    }
    for id in tts_ids {
        registry.register_tts(id, Arc::new(SilentTtsProvider::new(id)));
    }

    let mut llm_ids: HashSet<&str> = HashSet::new();
    for role in config.llm.roles.values() {
        for spec in std::iter::once(&role.primary).chain(role.fallbacks.iter()) {
            if let Some((provider_id, _)) = spec.split_once('/') {
                llm_ids.insert(provider_id);
            } else {
                llm_ids.insert(spec.as_str());
            }
        }
    }
    llm_ids.insert("default");
    for id in llm_ids {
        registry.register_llm(id, Arc::new(EchoLlmProvider::new(id)));
    }

    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use voice_domain::config::{AgentConfig, RoleConfig};

    #[test]
    fn registers_providers_for_every_agent_and_role() {
        let mut config = Config::default();
        config.agents.insert(
            "front_desk".into(),
            AgentConfig { stt_provider: "whisper".into(), tts_provider: "elevenlabs".into(), ..AgentConfig::default() },
        );
        config.llm.roles.insert("executor".into(), RoleConfig { primary: "openai/gpt-4o".into(), fallbacks: vec!["anthropic/claude".into()] });

        let registry = build_provider_registry(&config);
        assert!(registry.stt("whisper").is_some());
        assert!(registry.tts("elevenlabs").is_some());
        assert!(registry.llm("openai").is_some());
        assert!(registry.llm("anthropic").is_some());
    }
}
