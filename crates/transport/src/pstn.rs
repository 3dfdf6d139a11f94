//! Generic carrier-agnostic PSTN media-stream adapter.
//!
//! Mirrors the JSON envelope shared by the major SIP/PSTN streaming APIs
//! (`connected` / `start` / `media` / `stop` events, base64 mu-law payload
//! keyed by a carrier-assigned stream id). No vendor SDK is involved —
//! callers that need a real carrier integration plug one in upstream of
//! this adapter; this type only speaks the envelope.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use voice_audio::{mulaw_to_pcm16, pcm16_to_mulaw};
use voice_domain::error::{Error, Result};

use crate::adapter::TransportAdapter;
use crate::event::TransportEvent;

#[derive(Debug, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
enum Envelope {
    Connected,
    Start { #[serde(rename = "streamSid")] stream_sid: String },
    Media { #[serde(rename = "streamSid")] stream_sid: Option<String>, media: MediaPayload },
    Stop,
}

#[derive(Debug, Deserialize)]
struct MediaPayload {
    payload: String,
}

#[derive(Debug, Serialize)]
struct OutboundMedia<'a> {
    event: &'a str,
    #[serde(rename = "streamSid")]
    stream_sid: &'a str,
    media: OutboundPayload,
}

#[derive(Debug, Serialize)]
struct OutboundPayload {
    payload: String,
}

#[derive(Debug, Serialize)]
struct OutboundStop<'a> {
    event: &'a str,
    #[serde(rename = "streamSid")]
    stream_sid: &'a str,
}

/// Adapter for the PSTN JSON media-stream envelope. 8kHz mu-law on the
/// wire, PCM16 internally.
pub struct PstnJsonAdapter {
    stream_sid: Mutex<Option<String>>,
}

impl Default for PstnJsonAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl PstnJsonAdapter {
    pub fn new() -> Self {
        Self { stream_sid: Mutex::new(None) }
    }
}

impl TransportAdapter for PstnJsonAdapter {
    fn kind(&self) -> &'static str {
        "pstn_json"
    }

    fn decode(&self, raw: &[u8]) -> Result<Vec<TransportEvent>> {
        let envelope: Envelope = serde_json::from_slice(raw).map_err(Error::Json)?;
        match envelope {
            Envelope::Connected => Ok(vec![]),
            Envelope::Start { stream_sid } => {
                *self.stream_sid.lock() = Some(stream_sid.clone());
                Ok(vec![TransportEvent::Started { stream_id: stream_sid }])
            }
            Envelope::Media { stream_sid, media } => {
                if let Some(sid) = stream_sid {
                    let mut guard = self.stream_sid.lock();
                    if guard.is_none() {
                        *guard = Some(sid);
                    }
                }
                use base64::Engine;
                let mulaw = base64::engine::general_purpose::STANDARD
                    .decode(media.payload.as_bytes())
                    .map_err(|e| Error::Protocol(format!("invalid media payload base64: {e}")))?;
                Ok(vec![TransportEvent::Audio(mulaw_to_pcm16(&mulaw))])
            }
            Envelope::Stop => Ok(vec![TransportEvent::Stopped]),
        }
    }

    fn encode_audio(&self, pcm16: &[i16]) -> Result<Vec<u8>> {
        let stream_sid = self
            .stream_sid
            .lock()
            .clone()
            .ok_or_else(|| Error::Protocol("encode_audio before stream start".into()))?;
        use base64::Engine;
        let mulaw = pcm16_to_mulaw(pcm16);
        let payload = base64::engine::general_purpose::STANDARD.encode(mulaw);
        let envelope = OutboundMedia { event: "media", stream_sid: &stream_sid, media: OutboundPayload { payload } };
        serde_json::to_vec(&envelope).map_err(Error::Json)
    }

    fn encode_close(&self, _reason: &str) -> Result<Option<Vec<u8>>> {
        let Some(stream_sid) = self.stream_sid.lock().clone() else {
            return Ok(None);
        };
        let envelope = OutboundStop { event: "stop", stream_sid: &stream_sid };
        Ok(Some(serde_json::to_vec(&envelope).map_err(Error::Json)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_then_media_roundtrips_audio() {
        let adapter = PstnJsonAdapter::new();
        let start = br#"{"event":"start","streamSid":"MZ123"}"#;
        let events = adapter.decode(start).unwrap();
        assert_eq!(events, vec![TransportEvent::Started { stream_id: "MZ123".into() }]);

        use base64::Engine;
        let pcm = vec![100i16, -200, 300];
        let mulaw = pcm16_to_mulaw(&pcm);
        let payload = base64::engine::general_purpose::STANDARD.encode(&mulaw);
        let media = serde_json::to_vec(&serde_json::json!({
            "event": "media",
            "streamSid": "MZ123",
            "media": { "payload": payload },
        }))
        .unwrap();

        let events = adapter.decode(&media).unwrap();
        match &events[0] {
            TransportEvent::Audio(samples) => assert_eq!(samples.len(), pcm.len()),
            other => panic!("expected Audio, got {other:?}"),
        }

        let encoded = adapter.encode_audio(&pcm).unwrap();
        assert!(!encoded.is_empty());
    }

    #[test]
    fn encode_audio_before_start_errors() {
        let adapter = PstnJsonAdapter::new();
        assert!(adapter.encode_audio(&[1, 2, 3]).is_err());
    }

    #[test]
    fn stop_envelope_decodes() {
        let adapter = PstnJsonAdapter::new();
        let events = adapter.decode(br#"{"event":"stop"}"#).unwrap();
        assert_eq!(events, vec![TransportEvent::Stopped]);
    }
}
