//! Reference WebRTC signaling adapter.
//!
//! Carries offer/answer/ICE-candidate signaling plus raw PCM16 audio frames
//! over a single JSON-framed duplex channel. This stands in for a real
//! media-plane stack (ICE negotiation, DTLS-SRTP, RTP packetization), which
//! is out of scope here — the session supervisor treats this adapter the
//! same way it treats [`crate::pstn::PstnJsonAdapter`]: bytes in, PCM16
//! [`TransportEvent`]s out.

use serde::{Deserialize, Serialize};

use voice_domain::error::{Error, Result};

use crate::adapter::TransportAdapter;
use crate::event::TransportEvent;

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
enum SignalMessage {
    Offer { sdp: String },
    Answer { sdp: String },
    IceCandidate { candidate: serde_json::Value },
    Audio { samples: Vec<i16> },
    Bye,
}

#[derive(Debug, Serialize)]
struct AudioOut<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    samples: &'a [i16],
}

#[derive(Debug, Serialize)]
struct ByeOut<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    reason: &'a str,
}

pub struct WebRtcSignalingAdapter;

impl Default for WebRtcSignalingAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl WebRtcSignalingAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl TransportAdapter for WebRtcSignalingAdapter {
    fn kind(&self) -> &'static str {
        "webrtc_signaling"
    }

    fn decode(&self, raw: &[u8]) -> Result<Vec<TransportEvent>> {
        let message: SignalMessage = serde_json::from_slice(raw).map_err(Error::Json)?;
        match message {
            SignalMessage::Offer { sdp } => {
                Ok(vec![TransportEvent::Control(serde_json::json!({ "type": "offer", "sdp": sdp }))])
            }
            SignalMessage::Answer { sdp } => {
                Ok(vec![TransportEvent::Control(serde_json::json!({ "type": "answer", "sdp": sdp }))])
            }
            SignalMessage::IceCandidate { candidate } => {
                Ok(vec![TransportEvent::Control(serde_json::json!({ "type": "ice-candidate", "candidate": candidate }))])
            }
            SignalMessage::Audio { samples } => {
                Ok(vec![TransportEvent::Started { stream_id: "webrtc".into() }, TransportEvent::Audio(samples)])
            }
            SignalMessage::Bye => Ok(vec![TransportEvent::Stopped]),
        }
    }

    fn encode_audio(&self, pcm16: &[i16]) -> Result<Vec<u8>> {
        serde_json::to_vec(&AudioOut { kind: "audio", samples: pcm16 }).map_err(Error::Json)
    }

    fn encode_close(&self, reason: &str) -> Result<Option<Vec<u8>>> {
        Ok(Some(serde_json::to_vec(&ByeOut { kind: "bye", reason }).map_err(Error::Json)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audio_message_decodes_to_started_and_audio() {
        let adapter = WebRtcSignalingAdapter::new();
        let raw = serde_json::to_vec(&serde_json::json!({ "type": "audio", "samples": [1, 2, 3] })).unwrap();
        let events = adapter.decode(&raw).unwrap();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[1], TransportEvent::Audio(ref s) if s == &vec![1i16, 2, 3]));
    }

    #[test]
    fn bye_decodes_to_stopped() {
        let adapter = WebRtcSignalingAdapter::new();
        let raw = serde_json::to_vec(&serde_json::json!({ "type": "bye" })).unwrap();
        assert_eq!(adapter.decode(&raw).unwrap(), vec![TransportEvent::Stopped]);
    }

    #[test]
    fn encode_audio_roundtrips_through_json() {
        let adapter = WebRtcSignalingAdapter::new();
        let encoded = adapter.encode_audio(&[10, 20, 30]).unwrap();
        let events = adapter.decode(&encoded).unwrap();
        assert!(matches!(&events[1], TransportEvent::Audio(s) if s == &vec![10i16, 20, 30]));
    }
}
