
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::chunking::Chunk;

const F32_BYTES: usize = std::mem::size_of::<f32>();

/// The single row describing a persisted namespace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Manifest {
    pub namespace: String,
    pub embedding_model: String,
    pub dimension: i64,
    pub chunk_count: i64,
    pub created_at: NaiveDateTime,
}

/// A chunk row of a persisted namespace
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct StoredChunk {
    pub position: i64,
    pub content: String,
    pub start_offset: i64,
    pub end_offset: i64,
    pub overlap: i64,
    pub oversized: bool,
    pub embedding: Vec<u8>,
}

impl StoredChunk {
    #[inline]
    pub fn new(position: usize, chunk: &Chunk, embedding: &[f32]) -> Self {
        Self {
            position: position as i64,
            content: chunk.text.clone(),
            start_offset: chunk.start as i64,
            end_offset: chunk.end as i64,
            overlap: chunk.overlap as i64,
            oversized: chunk.oversized,
            embedding: encode_embedding(embedding),
        }
    }

    /// Split the row back into the chunk and its vector
    #[inline]
    pub fn into_parts(self) -> Result<(Chunk, Vec<f32>), String> {
        let embedding = decode_embedding(&self.embedding).ok_or_else(|| {
            format!(
                "chunk {} has a {} byte embedding, not a whole number of f32 values",
                self.position,
                self.embedding.len()
            )
        })?;

        let offset = |value: i64, name: &str| {
            usize::try_from(value)
                .map_err(|_| format!("chunk {} has a negative {}", self.position, name))
        };

        let chunk = Chunk {
            start: offset(self.start_offset, "start offset")?,
            end: offset(self.end_offset, "end offset")?,
            overlap: offset(self.overlap, "overlap")?,
            oversized: self.oversized,
            text: self.content,
        };

        Ok((chunk, embedding))
    }
}

/// A recorded answer's token usage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct StoredUsage {
    pub id: Uuid,
    pub namespace: Option<String>,
    pub model: String,
    pub prompt_tokens: i64,
    pub completion_tokens: i64,
    pub total_tokens: i64,
    pub cost: f64,
    pub passages: i64,
    pub created_at: NaiveDateTime,
}

/// Aggregated usage, overall or for one namespace
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, FromRow)]
pub struct UsageTotals {
    pub namespace: Option<String>,
    pub questions: i64,
    pub prompt_tokens: i64,
    pub completion_tokens: i64,
    pub total_tokens: i64,
    pub cost: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageSummary {
    pub overall: UsageTotals,
    pub per_namespace: Vec<UsageTotals>,
}

/// Little-endian `f32` blob
#[inline]
pub fn encode_embedding(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|v| v.to_le_bytes()).collect()
}

#[inline]
pub fn decode_embedding(bytes: &[u8]) -> Option<Vec<f32>> {
    if bytes.len() % F32_BYTES != 0 {
        return None;
    }

    bytes
        .chunks_exact(F32_BYTES)
        .map(|b| <[u8; F32_BYTES]>::try_from(b).ok().map(f32::from_le_bytes))
        .collect()
}
