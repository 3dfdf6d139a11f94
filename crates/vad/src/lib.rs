pub mod interrupt;
pub mod vad;

pub use interrupt::{InterruptConfig, InterruptManager, InterruptState};
pub use vad::{SimpleVad, VoiceActivityDetector};
