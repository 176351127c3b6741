//! Run orchestration: fetch → flatten → chunk → index, then per question
//! retrieve → compose.

use std::sync::Arc;
use std::time::Duration;

use crate::config::PipelineConfig;
use crate::database::vector_db::{IndexHandle, VectorStore};
use crate::document::{CharacterSplitter, Flattener, TextSplitter};
use crate::error::{PipelineError, RunError, Stage, StageExt};
use crate::llm::{Answer, AnswerComposer, RetrievalResult, Retriever};
use crate::providers::traits::CompletionProvider;
use crate::providers::utils::with_timeout;
use crate::source::RecordSource;

pub struct Pipeline {
    source: Box<dyn RecordSource>,
    flattener: Flattener,
    splitter: Box<dyn TextSplitter>,
    store: Arc<dyn VectorStore>,
    composer: AnswerComposer,
    top_k: usize,
    min_score: Option<f32>,
    embed_batch_size: usize,
    timeout: Duration,
}

impl Pipeline {
    pub fn new(
        config: &PipelineConfig,
        source: Box<dyn RecordSource>,
        store: Arc<dyn VectorStore>,
        provider: Arc<dyn CompletionProvider>,
    ) -> Result<Self, PipelineError> {
        config.validate()?;
        let splitter = CharacterSplitter::new(config.chunk_size, config.chunk_overlap)?;
        let flattener = Flattener::new()
            .with_null_literal(config.null_literal.clone())
            .with_empty_containers(config.empty_containers);

        Ok(Self {
            source,
            flattener,
            splitter: Box::new(splitter),
            store,
            composer: AnswerComposer::new(provider),
            top_k: config.top_k,
            min_score: config.min_score,
            embed_batch_size: config.embed_batch_size,
            timeout: config.timeout,
        })
    }

    pub fn with_flattener(mut self, flattener: Flattener) -> Self {
        self.flattener = flattener;
        self
    }

    /// Replaces the character-window splitter, e.g. with a boundary-aware one.
    pub fn with_splitter(mut self, splitter: Box<dyn TextSplitter>) -> Self {
        self.splitter = splitter;
        self
    }

    /// Fetches the record and builds the index it is answered from.
    pub async fn ingest(&self) -> Result<KnowledgeBase, RunError> {
        let record = with_timeout(Stage::Fetch, self.timeout, self.source.fetch())
            .await
            .at_stage(Stage::Fetch)?;
        log::info!(
            "Fetched record from {} with {} scalar values",
            self.source.describe(),
            record.leaf_count()
        );

        let text = self.flattener.flatten_to_text(&record).at_stage(Stage::Flatten)?;
        log::info!("Flattened record into {} chars", text.chars().count());

        let chunks: Vec<String> = self
            .splitter
            .split(&text)
            .at_stage(Stage::Chunk)?
            .into_iter()
            .map(|chunk| chunk.text)
            .collect();
        log::info!("Split text into {} chunks", chunks.len());

        // the build is one embedding call per batch; each gets the full timeout
        let batches = u32::try_from(chunks.len().div_ceil(self.embed_batch_size).max(1)).unwrap_or(u32::MAX);
        let build_timeout = self.timeout.checked_mul(batches).unwrap_or(Duration::MAX);
        let handle = with_timeout(Stage::Index, build_timeout, self.store.build(&chunks))
            .await
            .at_stage(Stage::Index)?;

        let retriever = Retriever::new(Arc::clone(&self.store), handle, self.top_k)
            .at_stage(Stage::Retrieve)?
            .with_min_score(self.min_score);

        Ok(KnowledgeBase {
            retriever,
            composer: self.composer.clone(),
            timeout: self.timeout,
            chunk_count: chunks.len(),
        })
    }

    /// Full run for a single question.
    pub async fn run(&self, question: &str) -> Result<Answer, RunError> {
        self.ingest().await?.ask(question).await
    }
}

/// A built index plus what is needed to answer questions from it.
///
/// Read-only after construction; questions can be asked concurrently.
#[derive(Clone)]
pub struct KnowledgeBase {
    retriever: Retriever,
    composer: AnswerComposer,
    timeout: Duration,
    chunk_count: usize,
}

impl KnowledgeBase {
    pub fn chunk_count(&self) -> usize {
        self.chunk_count
    }

    pub fn handle(&self) -> &IndexHandle {
        self.retriever.handle()
    }

    pub async fn retrieve(&self, question: &str) -> Result<RetrievalResult, RunError> {
        let results = with_timeout(Stage::Retrieve, self.timeout, self.retriever.retrieve(question))
            .await
            .at_stage(Stage::Retrieve)?;

        if results.is_empty() {
            return Err(RunError::new(
                Stage::Retrieve,
                PipelineError::RetrievalFailure(
                    "no context retrieved for the question; refusing to answer without it".to_string(),
                ),
            ));
        }
        Ok(results)
    }

    pub async fn ask(&self, question: &str) -> Result<Answer, RunError> {
        self.ask_with_context(question).await.map(|(_, answer)| answer)
    }

    /// Answers `question` and also returns the chunks the answer was built from.
    pub async fn ask_with_context(&self, question: &str) -> Result<(RetrievalResult, Answer), RunError> {
        let context = self.retrieve(question).await?;
        let texts: Vec<&str> = context.iter().map(|chunk| chunk.text.as_str()).collect();

        let answer = with_timeout(Stage::Compose, self.timeout, self.composer.compose(question, &texts))
            .await
            .at_stage(Stage::Compose)?;
        Ok((context, answer))
    }
}
