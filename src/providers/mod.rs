pub mod ollama;
pub mod openai;
pub mod traits;
pub mod utils;

pub use ollama::OllamaProvider;
pub use openai::OpenAIProvider;
pub use traits::{CompletionProvider, EmbeddingProvider};
