//! Character-window chunking.
//!
//! Offsets count chars, not bytes, so a chunk never splits a UTF-8 sequence.

use crate::error::PipelineError;

/// A contiguous slice of the source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Position within the chunk sequence
    pub index: usize,
    /// Start char offset (inclusive)
    pub start: usize,
    /// End char offset (exclusive)
    pub end: usize,
    pub text: String,
}

impl Chunk {
    pub fn char_len(&self) -> usize {
        self.end - self.start
    }
}

/// Strategy turning text into ordered chunks.
pub trait TextSplitter: Send + Sync {
    fn split(&self, text: &str) -> Result<Vec<Chunk>, PipelineError>;
}

/// Fixed-size sliding window over chars with a fixed overlap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CharacterSplitter {
    chunk_size: usize,
    overlap: usize,
}

impl CharacterSplitter {
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self, PipelineError> {
        validate(chunk_size, overlap)?;
        Ok(Self { chunk_size, overlap })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }
}

impl TextSplitter for CharacterSplitter {
    fn split(&self, text: &str) -> Result<Vec<Chunk>, PipelineError> {
        split(text, self.chunk_size, self.overlap)
    }
}

fn validate(chunk_size: usize, overlap: usize) -> Result<(), PipelineError> {
    if chunk_size == 0 {
        return Err(PipelineError::InvalidConfiguration(
            "chunk size must be positive".to_string(),
        ));
    }
    if overlap >= chunk_size {
        return Err(PipelineError::InvalidConfiguration(format!(
            "chunk overlap {} must be smaller than chunk size {}",
            overlap, chunk_size
        )));
    }
    Ok(())
}

/// Splits `text` into windows of at most `chunk_size` chars where each window
/// starts `overlap` chars before the previous one ended.
pub fn split(text: &str, chunk_size: usize, overlap: usize) -> Result<Vec<Chunk>, PipelineError> {
    validate(chunk_size, overlap)?;

    // byte offset of every char boundary, including the end of text
    let mut bounds: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
    bounds.push(text.len());
    let total = bounds.len() - 1;

    let mut chunks = Vec::new();
    if total == 0 {
        return Ok(chunks);
    }

    let mut start = 0;
    loop {
        let end = (start + chunk_size).min(total);
        chunks.push(Chunk {
            index: chunks.len(),
            start,
            end,
            text: text[bounds[start]..bounds[end]].to_string(),
        });
        if end == total {
            break;
        }
        start = (start + 1).max(end - overlap);
    }

    Ok(chunks)
}

/// Rebuilds the source text from chunks by dropping each chunk's overlap
/// with its predecessor.
pub fn reassemble(chunks: &[Chunk]) -> String {
    let mut out = String::new();
    let mut covered: usize = 0;
    for chunk in chunks {
        let skip = covered.saturating_sub(chunk.start);
        out.extend(chunk.text.chars().skip(skip));
        covered = covered.max(chunk.end);
    }
    out
}
