//! Task pipeline (C8) — the per-call orchestrator binding STT, LLM, TTS,
//! the interrupt manager, and the usage tracker into two concurrent loops.
//!
//! Loop A (ingestion) reads inbound audio, feeds STT, and forwards final
//! transcripts on a single-producer-single-consumer channel. Loop B
//! (execution) consumes transcripts and drives one LLM token stream and a
//! sentence-chunked TTS synthesis at a time, emitting [`PipelineEvent`]s for
//! the transport layer as they're produced. Because loop B awaits each turn
//! before reading the next transcript, at most one assistant turn is ever
//! in flight per session.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::sync::{mpsc, Mutex as AsyncMutex};

use voice_audio::pcm16_to_bytes;
use voice_cache::LlmCache;
use voice_domain::stream::{PipelineEvent, StreamEvent};
use voice_providers::{ChatRequest, LlmRouter, Message, SttSession, TtsProvider};
use voice_sessions::UsageTracker;
use voice_vad::InterruptManager;

use super::cancel::CancelToken;

const TRANSCRIPT_POLL: Duration = Duration::from_millis(10);

/// The in-flight assistant turn. Exactly one exists per session at a time;
/// the execution loop is strictly sequential so this is true by
/// construction. Holds the LLM stream while it's being drained (dropping it
/// tears the token stream down); there's no equivalent handle for TTS since
/// `TtsProvider::synthesize` is a one-shot request per buffered sentence,
/// not a long-lived session.
struct TurnState {
    turn_index: u64,
    user_transcript: String,
    response_text: String,
    /// Shared with the interrupt manager: true once caller speech has
    /// barged in on this turn.
    cancelled: Arc<AtomicBool>,
    llm_stream: Option<voice_domain::stream::BoxStream<'static, voice_domain::error::Result<StreamEvent>>>,
    tts_buffer: String,
}

pub struct PipelineConfig {
    pub llm_role: String,
    pub tts_voice: String,
    pub system_prompt: Option<String>,
    pub sample_rate_hz: u32,
}

/// Owns one call's STT/LLM/TTS/interrupt/usage collaborators and drives the
/// two-loop pipeline over them.
pub struct TaskPipeline {
    stt: AsyncMutex<Box<dyn SttSession>>,
    tts: Arc<dyn TtsProvider>,
    llm: Arc<LlmRouter>,
    llm_cache: Arc<LlmCache>,
    interrupt: Arc<InterruptManager>,
    usage: Arc<UsageTracker>,
    config: PipelineConfig,
    cancel: CancelToken,
}

impl TaskPipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        stt: Box<dyn SttSession>,
        tts: Arc<dyn TtsProvider>,
        llm: Arc<LlmRouter>,
        llm_cache: Arc<LlmCache>,
        interrupt: Arc<InterruptManager>,
        usage: Arc<UsageTracker>,
        config: PipelineConfig,
        cancel: CancelToken,
    ) -> Self {
        Self {
            stt: AsyncMutex::new(stt),
            tts,
            llm,
            llm_cache,
            interrupt,
            usage,
            config,
            cancel,
        }
    }

    /// Spawn the ingestion and execution loops. `audio_rx` feeds inbound
    /// PCM16 frames (closing the sender ends the call cleanly); the
    /// returned receiver carries outbound events for the transport layer.
    pub fn run(self: Arc<Self>, mut audio_rx: mpsc::Receiver<Vec<i16>>) -> mpsc::Receiver<PipelineEvent> {
        let (transcript_tx, transcript_rx) = mpsc::channel::<String>(8);
        let (out_tx, out_rx) = mpsc::channel::<PipelineEvent>(64);

        let ingest = self.clone();
        tokio::spawn(async move {
            while let Some(chunk) = audio_rx.recv().await {
                ingest.interrupt.process_audio(&chunk);

                let mut stt = ingest.stt.lock().await;
                if let Err(e) = stt.feed_audio(&chunk).await {
                    tracing::warn!(error = %e, "stt feed_audio failed");
                    continue;
                }
                ingest
                    .usage
                    .add_stt_usage(chunk.len() as f64 / ingest.config.sample_rate_hz as f64);

                while let Ok(Some(piece)) = stt.poll_transcript(TRANSCRIPT_POLL).await {
                    if piece.is_final && !piece.text.is_empty() && transcript_tx.send(piece.text).await.is_err() {
                        return;
                    }
                }
            }
        });

        let exec = self.clone();
        tokio::spawn(async move {
            exec.execution_loop(transcript_rx, out_tx).await;
        });

        out_rx
    }

    /// Synthesize one buffered chunk of assistant text and emit it as audio.
    /// Records TTS usage for the chunk as soon as synthesis succeeds (the
    /// cost was incurred even if the turn is interrupted before the audio
    /// is forwarded). Returns `false` if the output channel is closed, in
    /// which case the caller should stop the turn.
    async fn speak_chunk(&self, text: &str, cancelled: &AtomicBool, out_tx: &mpsc::Sender<PipelineEvent>) -> bool {
        match self.tts.synthesize(text, &self.config.tts_voice, self.config.sample_rate_hz).await {
            Ok(pcm) => {
                self.usage.add_tts_usage(text.chars().count() as u64);
                if cancelled.load(Ordering::Acquire) {
                    return true;
                }
                let data = pcm16_to_bytes(&pcm);
                out_tx.send(PipelineEvent::Audio { data, format: "pcm16".into() }).await.is_ok()
            }
            Err(e) => {
                let _ = out_tx.send(PipelineEvent::Error { message: e.to_string() }).await;
                true
            }
        }
    }

    async fn execution_loop(
        self: Arc<Self>,
        mut transcript_rx: mpsc::Receiver<String>,
        out_tx: mpsc::Sender<PipelineEvent>,
    ) {
        let mut turn_index: u64 = 0;
        while let Some(transcript) = transcript_rx.recv().await {
            if self.cancel.is_cancelled() {
                tracing::debug!("pipeline cancelled, ending execution loop");
                return;
            }
            turn_index += 1;

            let mut turn = TurnState {
                turn_index,
                user_transcript: transcript,
                response_text: String::new(),
                cancelled: self.interrupt.interrupted_handle(),
                llm_stream: None,
                tts_buffer: String::new(),
            };

            if out_tx.send(PipelineEvent::Started { task_index: turn.turn_index }).await.is_err() {
                return;
            }
            if out_tx
                .send(PipelineEvent::Transcription { text: turn.user_transcript.clone(), is_final: true })
                .await
                .is_err()
            {
                return;
            }

            self.interrupt.start_assistant_turn();

            let model_key = self
                .llm
                .primary_spec(&self.config.llm_role)
                .unwrap_or(&self.config.llm_role)
                .to_string();
            let system_prompt = self.config.system_prompt.as_deref();

            let cached = self.llm_cache.get(&turn.user_transcript, &model_key, system_prompt).await;

            if let Some(entry) = cached {
                turn.response_text = entry.response;
                if out_tx
                    .send(PipelineEvent::LlmResponse { text: turn.response_text.clone(), is_final: false })
                    .await
                    .is_err()
                {
                    return;
                }
                turn.tts_buffer = turn.response_text.clone();
            } else {
                let mut messages = Vec::new();
                if let Some(system_prompt) = &self.config.system_prompt {
                    messages.push(Message::system(system_prompt.clone()));
                }
                messages.push(Message::user(turn.user_transcript.clone()));
                let request = ChatRequest { messages, ..Default::default() };

                let stream = match self.llm.chat_stream_for_role(&self.config.llm_role, request).await {
                    Ok(s) => s,
                    Err(e) => {
                        let _ = out_tx.send(PipelineEvent::Error { message: e.to_string() }).await;
                        self.interrupt.end_assistant_turn();
                        continue;
                    }
                };
                turn.llm_stream = Some(stream);

                let mut stream_usage = None;
                let mut emitting = true;
                while let Some(event) = turn.llm_stream.as_mut().unwrap().next().await {
                    match event {
                        Ok(StreamEvent::Token { text }) => {
                            turn.response_text.push_str(&text);
                            if turn.cancelled.load(Ordering::Acquire) {
                                emitting = false;
                            }
                            if emitting {
                                if out_tx
                                    .send(PipelineEvent::LlmResponse { text: text.clone(), is_final: false })
                                    .await
                                    .is_err()
                                {
                                    return;
                                }
                                turn.tts_buffer.push_str(&text);
                                if turn.tts_buffer.trim_end().ends_with(['.', '!', '?']) {
                                    let chunk = std::mem::take(&mut turn.tts_buffer);
                                    if !self.speak_chunk(&chunk, &turn.cancelled, &out_tx).await {
                                        return;
                                    }
                                }
                            }
                        }
                        Ok(StreamEvent::Done { usage, .. }) => {
                            stream_usage = usage;
                            break;
                        }
                        Ok(StreamEvent::Error { message }) => {
                            let _ = out_tx.send(PipelineEvent::Error { message }).await;
                            break;
                        }
                        Ok(_) => {
                            // Tool-call events: no tool-use surface in the voice pipeline yet.
                        }
                        Err(e) => {
                            let _ = out_tx.send(PipelineEvent::Error { message: e.to_string() }).await;
                            break;
                        }
                    }
                }
                // Drop the stream handle now that it's drained; tears down
                // whatever connection the provider held open for it.
                turn.llm_stream = None;

                if let Some(usage) = &stream_usage {
                    self.usage.add_llm_usage(usage.prompt_tokens as u64, usage.completion_tokens as u64);
                }

                if !turn.response_text.is_empty() {
                    self.llm_cache
                        .set(
                            &turn.user_transcript,
                            &turn.response_text,
                            &model_key,
                            system_prompt,
                            None,
                            stream_usage.as_ref().map(|u| u.completion_tokens).unwrap_or(0),
                            0.0,
                        )
                        .await;
                }
            }

            if self.cancel.is_cancelled() {
                self.interrupt.end_assistant_turn();
                return;
            }
            if turn.cancelled.load(Ordering::Acquire) {
                let _ = out_tx.send(PipelineEvent::Interrupt { action: "stop_audio".into() }).await;
                self.interrupt.end_assistant_turn();
                continue;
            }

            if !turn.tts_buffer.is_empty() {
                let chunk = std::mem::take(&mut turn.tts_buffer);
                if !self.speak_chunk(&chunk, &turn.cancelled, &out_tx).await {
                    return;
                }
            }

            if turn.cancelled.load(Ordering::Acquire) {
                let _ = out_tx.send(PipelineEvent::Interrupt { action: "stop_audio".into() }).await;
                self.interrupt.end_assistant_turn();
                continue;
            }

            let _ = out_tx.send(PipelineEvent::LlmResponse { text: turn.response_text, is_final: true }).await;
            self.interrupt.end_assistant_turn();
        }
    }
}
