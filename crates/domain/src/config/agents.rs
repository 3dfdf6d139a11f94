use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Per-agent provider wiring
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Which STT/LLM/TTS providers a given agent_id is wired to, looked up
/// once per call when a session is established.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    pub stt_provider: String,
    pub llm_role: String,
    pub tts_provider: String,
    #[serde(default = "d_voice")]
    pub tts_voice: String,
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default = "d_barge_in")]
    pub barge_in_enabled: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            stt_provider: "default".into(),
            llm_role: "executor".into(),
            tts_provider: "default".into(),
            tts_voice: d_voice(),
            system_prompt: None,
            barge_in_enabled: d_barge_in(),
        }
    }
}

fn d_voice() -> String {
    "default".into()
}
fn d_barge_in() -> bool {
    true
}
