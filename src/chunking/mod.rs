// Chunking module
// Splits extracted document text into overlapping, size-bounded chunks

#[cfg(test)]
mod tests;

pub mod fixed;
pub mod recursive;

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ConfigError;

pub use fixed::FixedSplitter;
pub use recursive::RecursiveSplitter;

/// A contiguous window of the source text, ready for embedding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// The chunk text, always equal to `source[start..end]`
    pub text: String,
    /// Byte offset of the chunk in the source text
    pub start: usize,
    /// Byte offset one past the end of the chunk in the source text
    pub end: usize,
    /// Number of leading bytes repeated from the end of the previous chunk
    pub overlap: usize,
    /// Set when a single unsplittable unit exceeded the configured chunk size
    pub oversized: bool,
}

impl Chunk {
    /// Length of the chunk in characters
    #[inline]
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }

    /// The part of the chunk that was not carried over from its predecessor
    #[inline]
    pub fn fresh_text(&self) -> &str {
        self.text.get(self.overlap..).unwrap_or_default()
    }
}

/// Which splitting strategy to use
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SplitterStrategy {
    /// Split on a single separator and pack units greedily
    #[default]
    Fixed,
    /// Split on progressively finer separators until units fit
    Recursive,
}

impl fmt::Display for SplitterStrategy {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            SplitterStrategy::Fixed => write!(f, "fixed"),
            SplitterStrategy::Recursive => write!(f, "recursive"),
        }
    }
}

/// Configuration for text chunking
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    pub strategy: SplitterStrategy,
    /// Maximum chunk length in characters
    pub chunk_size: usize,
    /// Characters carried from the end of one chunk into the next
    pub chunk_overlap: usize,
    /// Separator for the fixed strategy
    pub separator: String,
    /// Separators for the recursive strategy, coarsest first
    pub separators: Vec<String>,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            strategy: SplitterStrategy::Fixed,
            chunk_size: 1000,
            chunk_overlap: 200,
            separator: "\n".to_string(),
            separators: vec!["\n\n".to_string(), "\n".to_string(), " ".to_string()],
        }
    }
}

impl ChunkingConfig {
    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_sizes(self.chunk_size, self.chunk_overlap)?;

        match self.strategy {
            SplitterStrategy::Fixed => {
                if self.separator.is_empty() {
                    return Err(ConfigError::EmptySeparator);
                }
            }
            SplitterStrategy::Recursive => {
                if self.separators.iter().any(String::is_empty) {
                    return Err(ConfigError::EmptySeparator);
                }
            }
        }

        Ok(())
    }
}

pub(crate) fn validate_sizes(chunk_size: usize, chunk_overlap: usize) -> Result<(), ConfigError> {
    if chunk_size == 0 {
        return Err(ConfigError::InvalidChunkSize(chunk_size));
    }
    if chunk_overlap >= chunk_size {
        return Err(ConfigError::OverlapTooLarge {
            overlap: chunk_overlap,
            size: chunk_size,
        });
    }
    Ok(())
}

/// Common interface of every splitting strategy
pub trait TextSplitter {
    /// Split `text` into ordered chunks. Empty input yields no chunks.
    fn split(&self, text: &str) -> Vec<Chunk>;
}

/// The splitter selected by configuration
#[derive(Debug, Clone)]
pub enum Splitter {
    Fixed(FixedSplitter),
    Recursive(RecursiveSplitter),
}

impl Splitter {
    /// Build the configured splitter, rejecting invalid size settings up front
    #[inline]
    pub fn from_config(config: &ChunkingConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        Ok(match config.strategy {
            SplitterStrategy::Fixed => Self::Fixed(FixedSplitter::new(
                config.separator.clone(),
                config.chunk_size,
                config.chunk_overlap,
            )?),
            SplitterStrategy::Recursive => Self::Recursive(RecursiveSplitter::new(
                config.separators.clone(),
                config.chunk_size,
                config.chunk_overlap,
            )?),
        })
    }
}

impl TextSplitter for Splitter {
    #[inline]
    fn split(&self, text: &str) -> Vec<Chunk> {
        let chunks = match self {
            Self::Fixed(splitter) => splitter.split(text),
            Self::Recursive(splitter) => splitter.split(text),
        };

        debug!(
            "Split {} characters into {} chunks ({} oversized)",
            text.chars().count(),
            chunks.len(),
            chunks.iter().filter(|c| c.oversized).count()
        );

        chunks
    }
}

/// Split `text` with the strategy named in `config`
#[inline]
pub fn split_text(text: &str, config: &ChunkingConfig) -> Result<Vec<Chunk>, ConfigError> {
    Ok(Splitter::from_config(config)?.split(text))
}

/// Byte range of a unit inside the source text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub(crate) const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

pub(crate) fn slice(text: &str, span: Span) -> &str {
    text.get(span.start..span.end).unwrap_or_default()
}

pub(crate) fn char_len(text: &str, span: Span) -> usize {
    slice(text, span).chars().count()
}

/// Non-empty pieces of `span` between occurrences of `separator`
pub(crate) fn split_on(text: &str, span: Span, separator: &str) -> Vec<Span> {
    let mut pieces = Vec::new();
    let mut cursor = span.start;

    for (offset, matched) in slice(text, span).match_indices(separator) {
        let at = span.start + offset;
        if at > cursor {
            pieces.push(Span::new(cursor, at));
        }
        cursor = at + matched.len();
    }

    if cursor < span.end {
        pieces.push(Span::new(cursor, span.end));
    }

    pieces
}

/// Pack ordered units into chunks of at most `chunk_size` characters.
///
/// When a chunk is closed, the next one starts with up to `chunk_overlap`
/// trailing characters of the closed chunk, shortened so that the carried text
/// plus the incoming unit still fits. Text between units that are not joined
/// into the same chunk (the separators) belongs to neither chunk.
pub(crate) fn merge_units(
    text: &str,
    units: &[Span],
    chunk_size: usize,
    chunk_overlap: usize,
) -> Vec<Chunk> {
    let mut chunks: Vec<Chunk> = Vec::new();
    let mut current: Option<Span> = None;

    for unit in units {
        let next = match current {
            None => *unit,
            Some(open) if char_len(text, Span::new(open.start, unit.end)) <= chunk_size => {
                Span::new(open.start, unit.end)
            }
            Some(open) => {
                let closed = make_chunk(text, open, chunks.last(), chunk_size);
                chunks.push(closed);
                let start = carry_start(text, open, *unit, chunk_size, chunk_overlap)
                    .unwrap_or(unit.start);
                Span::new(start, unit.end)
            }
        };
        current = Some(next);
    }

    if let Some(open) = current {
        let last = make_chunk(text, open, chunks.last(), chunk_size);
        chunks.push(last);
    }

    chunks
}

fn make_chunk(text: &str, span: Span, previous: Option<&Chunk>, chunk_size: usize) -> Chunk {
    let overlap = previous.map_or(0, |prev| prev.end.saturating_sub(span.start));
    let chunk_text = slice(text, span).to_string();
    let oversized = chunk_text.chars().count() > chunk_size;

    Chunk {
        text: chunk_text,
        start: span.start,
        end: span.end,
        overlap,
        oversized,
    }
}

/// Byte offset where the chunk following `closed` should start so that it
/// carries trailing context, or `None` when nothing can be carried
fn carry_start(
    text: &str,
    closed: Span,
    next: Span,
    chunk_size: usize,
    chunk_overlap: usize,
) -> Option<usize> {
    let incoming = char_len(text, Span::new(closed.end, next.end));
    if chunk_overlap == 0 || incoming >= chunk_size {
        return None;
    }

    let take = chunk_overlap
        .min(chunk_size - incoming)
        .min(char_len(text, closed));
    if take == 0 {
        return None;
    }

    slice(text, closed)
        .char_indices()
        .rev()
        .nth(take - 1)
        .map(|(offset, _)| closed.start + offset)
}
