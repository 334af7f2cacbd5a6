//! Embedding generation for chunk indexing and semantic search.

mod openai;

pub use openai::OpenAIEmbedder;

use crate::error::{CompanionError, Result};
use crate::vector_store::l2_normalize;
use async_trait::async_trait;

/// Trait for embedding generation.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Generate an embedding for a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embeddings for multiple texts, in input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Get the embedding dimensions.
    fn dimensions(&self) -> usize;
}

/// Embed texts and scale every vector to unit length.
pub async fn embed_normalized(embedder: &dyn Embedder, texts: &[String]) -> Result<Vec<Vec<f32>>> {
    let raw = embedder.embed_batch(texts).await?;
    if raw.len() != texts.len() {
        return Err(CompanionError::Embedding(format!(
            "expected {} embeddings, got {}",
            texts.len(),
            raw.len()
        )));
    }
    raw.iter().map(|v| l2_normalize(v)).collect()
}
