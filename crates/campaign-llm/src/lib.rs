pub mod provider;
pub mod providers;

pub use provider::{CompletionError, CompletionProvider, CompletionStream};
pub use providers::OpenAIProvider;
