//! Session supervisor (C11).
//!
//! Binds one call's provider clients, interrupt manager, and usage tracker
//! into a running [`TaskPipeline`], and tears all of it down cleanly on
//! close. One supervisor instance per call; the WebSocket handler owns it.

use std::sync::Arc;

use tokio::sync::mpsc;

use voice_domain::config::AgentConfig;
use voice_domain::error::{Error, Result};
use voice_domain::stream::PipelineEvent;
use voice_vad::{InterruptConfig, InterruptManager, SimpleVad};

use crate::runtime::{PipelineConfig, TaskPipeline};
use crate::state::AppState;

/// A running call: the task pipeline plus the handles needed to feed it
/// audio and tear it down.
pub struct CallSupervisor {
    session_id: String,
    pipeline: Arc<TaskPipeline>,
    audio_tx: mpsc::Sender<Vec<i16>>,
}

impl CallSupervisor {
    /// Instantiate provider clients for `agent`, start the usage tracker and
    /// session record, and spin up the task pipeline. Returns the
    /// supervisor plus the receiver carrying outbound pipeline events.
    pub async fn start(
        state: &AppState,
        session_id: String,
        organization_id: String,
        user_id: Option<String>,
        agent_id: String,
        agent: &AgentConfig,
        transport_kind: &str,
    ) -> Result<(Self, mpsc::Receiver<PipelineEvent>)> {
        let stt_provider = state
            .providers
            .stt(&agent.stt_provider)
            .ok_or_else(|| Error::Config(format!("unknown STT provider: {}", agent.stt_provider)))?;
        let tts_provider = state
            .providers
            .tts(&agent.tts_provider)
            .ok_or_else(|| Error::Config(format!("unknown TTS provider: {}", agent.tts_provider)))?;

        let sample_rate_hz = state.config.sessions.sample_rate_hz;
        let stt_session = stt_provider.connect(sample_rate_hz).await?;

        let handle = state.sessions.create(
            session_id.clone(),
            organization_id,
            user_id,
            agent_id,
            transport_kind.to_string(),
            agent.stt_provider.clone(),
            agent.tts_provider.clone(),
        );

        let interrupt = Arc::new(InterruptManager::with_barge_in(
            Box::new(SimpleVad::new(0.02)),
            InterruptConfig::default(),
            agent.barge_in_enabled,
        ));

        let pipeline_config = PipelineConfig {
            llm_role: agent.llm_role.clone(),
            tts_voice: agent.tts_voice.clone(),
            system_prompt: agent.system_prompt.clone(),
            sample_rate_hz,
        };

        let cancel = state.cancel_map.register(&session_id);

        let pipeline = Arc::new(TaskPipeline::new(
            stt_session,
            tts_provider,
            state.llm_router.clone(),
            state.llm_cache.clone(),
            interrupt,
            handle.usage.clone(),
            pipeline_config,
            cancel,
        ));

        let (audio_tx, audio_rx) = mpsc::channel::<Vec<i16>>(32);
        let out_rx = pipeline.clone().run(audio_rx);

        Ok((Self { session_id, pipeline, audio_tx }, out_rx))
    }

    pub async fn send_audio(&self, pcm16: Vec<i16>) -> Result<()> {
        self.audio_tx
            .send(pcm16)
            .await
            .map_err(|_| Error::Protocol("pipeline ingestion closed".into()))
    }

    /// Close the audio channel so the pipeline's ingestion loop exits, cancel
    /// any turn still in flight, then finalize and return usage for this call.
    pub fn finish(self, state: &AppState) -> Option<voice_sessions::UsageRecord> {
        state.cancel_map.cancel(&self.session_id);
        state.cancel_map.remove(&self.session_id);
        drop(self.audio_tx);
        drop(self.pipeline);
        state.sessions.remove(&self.session_id)
    }
}
