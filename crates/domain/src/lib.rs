pub mod capability;
pub mod config;
pub mod error;
pub mod resilience;
pub mod stream;
pub mod trace;

pub use capability::{LlmCapabilities, ModelRole, ProviderKind, ToolSupport};
pub use config::Config;
pub use error::{Error, Result};
pub use stream::{BoxStream, PipelineEvent, StreamEvent, Usage};
pub use trace::TraceEvent;
