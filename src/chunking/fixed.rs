use super::{Chunk, Span, TextSplitter, merge_units, split_on, validate_sizes};
use crate::config::ConfigError;

/// Splits on a single separator and packs the pieces greedily.
///
/// A piece longer than the chunk size is emitted on its own and flagged as
/// oversized rather than being truncated.
#[derive(Debug, Clone)]
pub struct FixedSplitter {
    separator: String,
    chunk_size: usize,
    chunk_overlap: usize,
}

impl FixedSplitter {
    #[inline]
    pub fn new(
        separator: impl Into<String>,
        chunk_size: usize,
        chunk_overlap: usize,
    ) -> Result<Self, ConfigError> {
        let separator = separator.into();
        if separator.is_empty() {
            return Err(ConfigError::EmptySeparator);
        }
        validate_sizes(chunk_size, chunk_overlap)?;

        Ok(Self {
            separator,
            chunk_size,
            chunk_overlap,
        })
    }

    #[inline]
    pub fn separator(&self) -> &str {
        &self.separator
    }
}

impl TextSplitter for FixedSplitter {
    #[inline]
    fn split(&self, text: &str) -> Vec<Chunk> {
        let units = split_on(text, Span::new(0, text.len()), &self.separator);
        merge_units(text, &units, self.chunk_size, self.chunk_overlap)
    }
}
