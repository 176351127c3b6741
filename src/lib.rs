pub mod config;
pub mod database;
pub mod document;
pub mod error;
pub mod llm;
pub mod pipeline;
pub mod providers;
pub mod source;

#[cfg(test)]
mod test_support;

// Re-export commonly used items
pub use config::{PipelineConfig, ProviderConfig, ProviderKind, StoreKind};
pub use error::{PipelineError, RunError, Stage};
pub use llm::Answer;
pub use pipeline::{KnowledgeBase, Pipeline};
