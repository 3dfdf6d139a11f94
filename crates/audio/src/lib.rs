pub mod codec;

pub use codec::{
    bytes_to_pcm16, duration_seconds, mulaw_to_pcm16, pcm16_to_bytes, pcm16_to_mulaw,
    pcm16_to_wav, resample_pcm16, wav_to_pcm16, CodecError,
};
