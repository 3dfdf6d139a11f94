//! The `TransportAdapter` contract (C10).
//!
//! An adapter translates between the bytes a carrier puts on the wire and
//! the codec-neutral [`TransportEvent`]/PCM16 representation the task
//! pipeline speaks. It owns no socket: the session supervisor reads raw
//! frames off its WebSocket (or other duplex channel) and hands them to
//! `decode`; outbound audio goes through `encode_audio` before the
//! supervisor writes it back to the wire.

use voice_domain::error::Result;

use crate::event::TransportEvent;

pub trait TransportAdapter: Send + Sync {
    /// Short identifier used in logs and the session's `transport_kind`.
    fn kind(&self) -> &'static str;

    /// Decode one inbound wire message. A single message may yield zero,
    /// one, or several events (a `start` envelope yields `Started`; a
    /// `media` envelope yields `Audio`).
    fn decode(&self, raw: &[u8]) -> Result<Vec<TransportEvent>>;

    /// Encode a chunk of PCM16 audio for this adapter's wire format.
    fn encode_audio(&self, pcm16: &[i16]) -> Result<Vec<u8>>;

    /// Build the adapter's close/stop message, if its protocol has one.
    fn encode_close(&self, reason: &str) -> Result<Option<Vec<u8>>>;
}
