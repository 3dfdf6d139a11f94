mod agents;
mod cache;
mod llm;
mod resilience;
mod server;
mod sessions;

pub use agents::*;
pub use cache::*;
pub use llm::*;
pub use resilience::*;
pub use server::*;
pub use sessions::*;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::error::Error;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub sessions: SessionsConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub resilience: ResilienceConfig,
    /// agent_id -> provider wiring.
    #[serde(default)]
    pub agents: HashMap<String, AgentConfig>,
}

impl Config {
    /// Load config from an explicit path, `./config.toml`, or defaults, in
    /// that order — matching the gateway CLI's search order.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self, Error> {
        let candidate = explicit_path
            .map(|p| p.to_path_buf())
            .or_else(|| {
                let default = Path::new("config.toml");
                default.exists().then(|| default.to_path_buf())
            });

        match candidate {
            Some(path) => {
                let raw = std::fs::read_to_string(&path)?;
                toml::from_str(&raw)
                    .map_err(|e| Error::Config(format!("{}: {e}", path.display())))
            }
            None => Ok(Config::default()),
        }
    }

    /// Sanity-check cross-references the TOML schema can't express:
    /// an agent's `llm_role` must name a configured LLM role. Errors block
    /// `doctor`/startup; warnings are informational only.
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();

        if self.agents.is_empty() {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Warning,
                message: "no agents configured".into(),
            });
        }

        for (agent_id, agent) in &self.agents {
            if !self.llm.roles.contains_key(&agent.llm_role) {
                issues.push(ConfigIssue {
                    severity: ConfigSeverity::Error,
                    message: format!("agent '{agent_id}' references unknown llm role '{}'", agent.llm_role),
                });
            }
        }

        if self.server.max_connections == 0 {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                message: "server.max_connections must be greater than zero".into(),
            });
        }

        issues
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Warning,
    Error,
}

#[derive(Debug, Clone)]
pub struct ConfigIssue {
    pub severity: ConfigSeverity,
    pub message: String,
}

impl std::fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Warning => "warning",
            ConfigSeverity::Error => "error",
        };
        write!(f, "[{tag}] {}", self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = Config::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.cache.llm_cache_ttl_seconds, 3600);
        assert_eq!(config.resilience.circuit_failure_threshold, 5);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = Config::load(Some(Path::new("/nonexistent/path/config.toml")));
        assert!(config.is_err());
    }

    #[test]
    fn no_explicit_path_and_no_cwd_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let original = std::env::current_dir().unwrap();
        std::env::set_current_dir(dir.path()).unwrap();
        let config = Config::load(None);
        std::env::set_current_dir(original).unwrap();
        assert!(config.is_ok());
    }

    #[test]
    fn parses_toml_overrides() {
        let toml_src = r#"
            [server]
            port = 9999

            [agents.front_desk]
            stt_provider = "whisper"
            llm_role = "executor"
            tts_provider = "elevenlabs"
        "#;
        let config: Config = toml::from_str(toml_src).unwrap();
        assert_eq!(config.server.port, 9999);
        assert_eq!(config.agents["front_desk"].stt_provider, "whisper");
    }

    #[test]
    fn validate_flags_agent_with_unknown_llm_role() {
        let mut config = Config::default();
        config.agents.insert("front_desk".into(), AgentConfig {
            llm_role: "missing_role".into(),
            ..AgentConfig::default()
        });
        let issues = config.validate();
        assert!(issues.iter().any(|i| i.severity == ConfigSeverity::Error));
    }

    #[test]
    fn validate_passes_with_matching_role() {
        let mut config = Config::default();
        config.llm.roles.insert("executor".into(), RoleConfig { primary: "openai/gpt-4o".into(), fallbacks: vec![] });
        config.agents.insert("front_desk".into(), AgentConfig::default());
        let issues = config.validate();
        assert!(!issues.iter().any(|i| i.severity == ConfigSeverity::Error));
    }
}
