//! Wire-agnostic events exchanged between a transport adapter and the
//! session supervisor (C11).

/// One decoded unit of inbound data from a call's media channel.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// The remote end has opened its media stream, identified by an
    /// adapter-specific stream id (Twilio's `streamSid`, a WebRTC track id).
    Started { stream_id: String },
    /// A chunk of linear PCM16 audio, already decoded from the wire codec.
    Audio(Vec<i16>),
    /// The remote end has closed its media stream.
    Stopped,
    /// An out-of-band control message (signaling, DTMF, custom metadata)
    /// that the adapter does not interpret itself.
    Control(serde_json::Value),
}
