//! Upstream completion providers.

mod error;
mod gemini;
mod provider;
mod registry;
mod rest;
mod types;

pub use error::LLMError;
pub use gemini::GeminiProvider;
pub use provider::{CompletionProvider, Provider};
pub use registry::build_provider;
pub use rest::{RestBodyFormat, RestProvider};
pub use types::{ChatStream, Completion, Message, ProviderRequest, Reply, Role, StreamEvent};
