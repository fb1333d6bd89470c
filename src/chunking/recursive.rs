use super::{Chunk, Span, TextSplitter, char_len, merge_units, slice, split_on, validate_sizes};
use crate::config::ConfigError;

/// Splits on the coarsest separator present, re-splitting pieces that are
/// still too long with the next separator in the list. Pieces no separator
/// can break are cut at character boundaries, so no chunk is ever oversized.
#[derive(Debug, Clone)]
pub struct RecursiveSplitter {
    separators: Vec<String>,
    chunk_size: usize,
    chunk_overlap: usize,
}

impl RecursiveSplitter {
    #[inline]
    pub fn new(
        separators: Vec<String>,
        chunk_size: usize,
        chunk_overlap: usize,
    ) -> Result<Self, ConfigError> {
        if separators.iter().any(String::is_empty) {
            return Err(ConfigError::EmptySeparator);
        }
        validate_sizes(chunk_size, chunk_overlap)?;

        Ok(Self {
            separators,
            chunk_size,
            chunk_overlap,
        })
    }

    fn collect_units(&self, text: &str, span: Span, separators: &[String], out: &mut Vec<Span>) {
        if span.start >= span.end {
            return;
        }

        let piece = slice(text, span);
        let Some((index, separator)) = separators
            .iter()
            .enumerate()
            .find(|(_, separator)| piece.contains(separator.as_str()))
        else {
            if char_len(text, span) > self.chunk_size {
                self.hard_split(text, span, out);
            } else {
                out.push(span);
            }
            return;
        };

        let finer = &separators[index + 1..];
        for unit in split_on(text, span, separator) {
            if char_len(text, unit) > self.chunk_size {
                self.collect_units(text, unit, finer, out);
            } else if has_content(slice(text, unit), finer) {
                out.push(unit);
            }
        }
    }

    fn hard_split(&self, text: &str, span: Span, out: &mut Vec<Span>) {
        let mut start = span.start;
        let mut taken = 0;

        for (offset, _) in slice(text, span).char_indices() {
            if taken == self.chunk_size {
                out.push(Span::new(start, span.start + offset));
                start = span.start + offset;
                taken = 0;
            }
            taken += 1;
        }

        if start < span.end {
            out.push(Span::new(start, span.end));
        }
    }
}

impl TextSplitter for RecursiveSplitter {
    #[inline]
    fn split(&self, text: &str) -> Vec<Chunk> {
        let mut units = Vec::new();
        self.collect_units(text, Span::new(0, text.len()), &self.separators, &mut units);
        merge_units(text, &units, self.chunk_size, self.chunk_overlap)
    }
}

/// Whether anything is left of `piece` once every separator is removed
fn has_content(piece: &str, separators: &[String]) -> bool {
    match separators.split_first() {
        Some((separator, rest)) => piece
            .split(separator.as_str())
            .any(|part| has_content(part, rest)),
        None => !piece.is_empty(),
    }
}
