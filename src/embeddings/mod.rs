// Embeddings module
// The capability the vector index needs from an embedding model

use async_trait::async_trait;

use crate::{AskPdfError, Result};

/// Turns text into fixed-length vectors
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed every text, returning exactly one vector per input in input order
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single text, typically a question
    #[inline]
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])
            .await?
            .pop()
            .ok_or_else(|| AskPdfError::Embedding("embedder returned no vector".to_string()))
    }

    /// Name of the model producing the vectors, recorded alongside persisted indexes
    fn model_name(&self) -> &str;
}
