pub mod failover;
pub mod reference;
pub mod registry;
pub mod router;
pub mod traits;

// Re-exports for convenience.
pub use failover::{FailoverConfig, FailoverStrategy, ProviderFailoverPool, ProviderHealth, ProviderStatus};
pub use reference::{EchoLlmProvider, FixedSttProvider, SilentTtsProvider};
pub use registry::ProviderRegistry;
pub use router::LlmRouter;
pub use traits::{
    ChatRequest, ChatResponse, LlmProvider, Message, Role, SttProvider, SttSession, TranscriptChunk,
    TtsProvider,
};
