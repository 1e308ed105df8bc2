//! supercat-llm: remote classifier backed by a text-generation service.

pub mod backend;
pub mod prompt;
pub mod remote;

pub use backend::{CompletionBackend, HttpBackend, LlmSettings, Provider};
pub use remote::RemoteClassifier;
