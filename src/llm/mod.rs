pub mod composer;
pub mod retriever;

pub use composer::{Answer, AnswerComposer};
pub use retriever::{RetrievalResult, Retriever};
