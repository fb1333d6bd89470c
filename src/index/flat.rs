use std::cmp::Ordering;

use console::user_attended_stderr;
use indicatif::{ProgressBar, ProgressStyle};
use itertools::Itertools;
use tracing::{debug, info};

use super::{SearchHit, VectorIndex};
use crate::chunking::Chunk;
use crate::embeddings::Embedder;
use crate::{AskPdfError, Result};

/// Brute-force cosine index. Every stored vector has the same dimension and
/// its norm is precomputed.
#[derive(Debug, Clone, Default)]
pub struct FlatIndex {
    model: String,
    chunks: Vec<Chunk>,
    embeddings: Vec<Vec<f32>>,
    norms: Vec<f32>,
}

impl FlatIndex {
    /// Pair chunks with their embeddings, one vector per chunk
    #[inline]
    pub fn new(
        model: impl Into<String>,
        chunks: Vec<Chunk>,
        embeddings: Vec<Vec<f32>>,
    ) -> Result<Self> {
        if chunks.len() != embeddings.len() {
            return Err(AskPdfError::Embedding(format!(
                "expected {} embeddings, got {}",
                chunks.len(),
                embeddings.len()
            )));
        }

        if let Some(first) = embeddings.first() {
            let dimension = first.len();
            if dimension == 0 {
                return Err(AskPdfError::Embedding(
                    "embedder returned an empty vector".to_string(),
                ));
            }
            if let Some((position, other)) = embeddings
                .iter()
                .enumerate()
                .find(|(_, e)| e.len() != dimension)
            {
                return Err(AskPdfError::Embedding(format!(
                    "embedding {} has dimension {}, expected {}",
                    position,
                    other.len(),
                    dimension
                )));
            }
        }

        let norms = embeddings.iter().map(|e| norm(e)).collect();

        Ok(Self {
            model: model.into(),
            chunks,
            embeddings,
            norms,
        })
    }

    /// Embed every chunk in batches of `batch_size` and index the results
    #[inline]
    pub async fn build(
        chunks: Vec<Chunk>,
        embedder: &dyn Embedder,
        batch_size: usize,
    ) -> Result<Self> {
        let batch_size = batch_size.max(1);
        info!(
            "Embedding {} chunks with {} in batches of {}",
            chunks.len(),
            embedder.model_name(),
            batch_size
        );

        let progress = embedding_progress(chunks.len() as u64);
        let mut embeddings = Vec::with_capacity(chunks.len());

        for batch in chunks.chunks(batch_size) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let vectors = embedder.embed_batch(&texts).await?;
            if vectors.len() != texts.len() {
                return Err(AskPdfError::Embedding(format!(
                    "embedder returned {} vectors for {} texts",
                    vectors.len(),
                    texts.len()
                )));
            }
            embeddings.extend(vectors);
            progress.inc(batch.len() as u64);
        }

        progress.finish_and_clear();
        debug!("Embedded {} chunks", embeddings.len());

        Self::new(embedder.model_name(), chunks, embeddings)
    }

    /// Name of the model the vectors came from
    #[inline]
    pub fn model(&self) -> &str {
        &self.model
    }

    #[inline]
    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    #[inline]
    pub fn embeddings(&self) -> &[Vec<f32>] {
        &self.embeddings
    }
}

impl VectorIndex for FlatIndex {
    #[inline]
    fn len(&self) -> usize {
        self.chunks.len()
    }

    #[inline]
    fn dimension(&self) -> Option<usize> {
        self.embeddings.first().map(Vec::len)
    }

    fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        let Some(dimension) = self.dimension() else {
            return Ok(Vec::new());
        };
        if query.len() != dimension {
            return Err(AskPdfError::Embedding(format!(
                "query has dimension {}, index has {}",
                query.len(),
                dimension
            )));
        }
        if k == 0 {
            return Ok(Vec::new());
        }

        let query_norm = norm(query);
        let hits = self
            .embeddings
            .iter()
            .zip(&self.norms)
            .enumerate()
            .map(|(position, (embedding, &embedding_norm))| {
                (position, cosine(query, query_norm, embedding, embedding_norm))
            })
            .sorted_by(|(a_pos, a_score), (b_pos, b_score)| {
                b_score
                    .partial_cmp(a_score)
                    .unwrap_or(Ordering::Equal)
                    .then(a_pos.cmp(b_pos))
            })
            .take(k)
            .filter_map(|(position, score)| {
                self.chunks.get(position).map(|chunk| SearchHit {
                    chunk: chunk.clone(),
                    position,
                    score,
                })
            })
            .collect();

        Ok(hits)
    }
}

fn norm(vector: &[f32]) -> f32 {
    vector.iter().map(|v| v * v).sum::<f32>().sqrt()
}

/// Cosine similarity clamped to `[-1, 1]`; zero vectors score 0
fn cosine(a: &[f32], a_norm: f32, b: &[f32], b_norm: f32) -> f32 {
    if a_norm == 0.0 || b_norm == 0.0 {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    (dot / (a_norm * b_norm)).clamp(-1.0, 1.0)
}

fn embedding_progress(total: u64) -> ProgressBar {
    if !user_attended_stderr() {
        return ProgressBar::hidden();
    }

    let progress = ProgressBar::new(total);
    if let Ok(style) = ProgressStyle::with_template(
        "{spinner:.green} Embedding [{bar:40.cyan/blue}] {pos}/{len} chunks ({eta})",
    ) {
        progress.set_style(style.progress_chars("#>-"));
    }
    progress
}
