//! In-process reference providers.
//!
//! No vendor STT/LLM/TTS SDK ships in this crate — only the trait contracts
//! and a registry/router around them. These reference implementations give
//! a gateway something to wire up out of the box for local development,
//! `doctor` checks, and integration tests, the same way `voice-transport`
//! ships reference adapters instead of a real carrier SDK. Production
//! deployments register real provider clients against the same traits.

use std::time::Duration;

use tokio::sync::mpsc;

use voice_domain::capability::LlmCapabilities;
use voice_domain::error::Result;
use voice_domain::stream::{BoxStream, StreamEvent, Usage};

use crate::traits::{ChatRequest, ChatResponse, LlmProvider, SttProvider, SttSession, TranscriptChunk, TtsProvider};

/// Echoes the caller's last user message back with a fixed prefix. Useful
/// for exercising the pipeline end to end without a live model.
pub struct EchoLlmProvider {
    id: String,
    capabilities: LlmCapabilities,
}

impl EchoLlmProvider {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into(), capabilities: LlmCapabilities::default() }
    }
}

#[async_trait::async_trait]
impl LlmProvider for EchoLlmProvider {
    async fn chat(&self, req: ChatRequest) -> Result<ChatResponse> {
        let last_user = req
            .messages
            .iter()
            .rev()
            .find(|m| matches!(m.role, crate::traits::Role::User))
            .map(|m| m.content.as_str())
            .unwrap_or("");
        let content = format!("You said: {last_user}");
        let prompt_tokens = req.messages.iter().map(|m| m.content.split_whitespace().count()).sum::<usize>() as u32;
        let completion_tokens = content.split_whitespace().count() as u32;
        Ok(ChatResponse {
            content,
            usage: Some(Usage {
                prompt_tokens,
                completion_tokens,
                total_tokens: prompt_tokens + completion_tokens,
            }),
            model: req.model.unwrap_or_else(|| self.id.clone()),
            finish_reason: Some("stop".into()),
        })
    }

    async fn chat_stream(&self, req: ChatRequest) -> Result<BoxStream<'static, Result<StreamEvent>>> {
        let response = self.chat(req).await?;
        let (tx, rx) = mpsc::channel(4);
        tokio::spawn(async move {
            let _ = tx.send(Ok(StreamEvent::Token { text: response.content })).await;
            let _ = tx.send(Ok(StreamEvent::Done { usage: response.usage, finish_reason: response.finish_reason })).await;
        });
        Ok(Box::pin(tokio_stream_from_receiver(rx)))
    }

    fn capabilities(&self) -> &LlmCapabilities {
        &self.capabilities
    }

    fn provider_id(&self) -> &str {
        &self.id
    }
}

fn tokio_stream_from_receiver<T: Send + 'static>(mut rx: mpsc::Receiver<T>) -> impl futures_core::Stream<Item = T> {
    async_stream::stream! {
        while let Some(item) = rx.recv().await {
            yield item;
        }
    }
}

/// Returns one fixed transcript chunk a fixed delay after the first audio
/// frame arrives, then nothing further. Stands in for a live ASR session
/// in tests and local demos.
pub struct FixedSttProvider {
    id: String,
    transcript: String,
}

impl FixedSttProvider {
    pub fn new(id: impl Into<String>, transcript: impl Into<String>) -> Self {
        Self { id: id.into(), transcript: transcript.into() }
    }
}

#[async_trait::async_trait]
impl SttProvider for FixedSttProvider {
    async fn connect(&self, _sample_rate_hz: u32) -> Result<Box<dyn SttSession>> {
        Ok(Box::new(FixedSttSession { transcript: Some(self.transcript.clone()), frames_seen: 0 }))
    }

    fn provider_id(&self) -> &str {
        &self.id
    }
}

struct FixedSttSession {
    transcript: Option<String>,
    frames_seen: u32,
}

#[async_trait::async_trait]
impl SttSession for FixedSttSession {
    async fn feed_audio(&mut self, _pcm16: &[i16]) -> Result<()> {
        self.frames_seen += 1;
        Ok(())
    }

    async fn poll_transcript(&mut self, timeout: Duration) -> Result<Option<TranscriptChunk>> {
        if self.frames_seen < 3 {
            tokio::time::sleep(timeout).await;
            return Ok(None);
        }
        Ok(self.transcript.take().map(|text| TranscriptChunk { text, is_final: true }))
    }

    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Synthesizes silence proportional to the text length. Lets the pipeline
/// and transport encoders be exercised without a real voice model.
pub struct SilentTtsProvider {
    id: String,
}

impl SilentTtsProvider {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

#[async_trait::async_trait]
impl TtsProvider for SilentTtsProvider {
    async fn synthesize(&self, text: &str, _voice: &str, sample_rate_hz: u32) -> Result<Vec<i16>> {
        let samples = (sample_rate_hz as usize / 10) * text.len().max(1);
        Ok(vec![0i16; samples])
    }

    fn provider_id(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::Message;

    #[tokio::test]
    async fn echo_llm_reflects_last_user_message() {
        let provider = EchoLlmProvider::new("echo");
        let req = ChatRequest { messages: vec![Message::user("hello")], ..Default::default() };
        let resp = provider.chat(req).await.unwrap();
        assert_eq!(resp.content, "You said: hello");
    }

    #[tokio::test]
    async fn fixed_stt_emits_after_three_frames() {
        let provider = FixedSttProvider::new("fixed", "hi there");
        let mut session = provider.connect(16_000).await.unwrap();
        session.feed_audio(&[0, 0]).await.unwrap();
        session.feed_audio(&[0, 0]).await.unwrap();
        assert!(session.poll_transcript(Duration::from_millis(1)).await.unwrap().is_none());
        session.feed_audio(&[0, 0]).await.unwrap();
        let chunk = session.poll_transcript(Duration::from_millis(1)).await.unwrap().unwrap();
        assert_eq!(chunk.text, "hi there");
        assert!(chunk.is_final);
    }

    #[tokio::test]
    async fn silent_tts_returns_nonempty_pcm() {
        let provider = SilentTtsProvider::new("silent");
        let pcm = provider.synthesize("hello", "default", 16_000).await.unwrap();
        assert!(!pcm.is_empty());
        assert!(pcm.iter().all(|s| *s == 0));
    }
}
