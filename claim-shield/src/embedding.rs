use async_trait::async_trait;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::error::Result;

/// Embedding dimension of the reference deployment (all-MiniLM-L6-v2).
pub const DEFAULT_EMBEDDING_DIMENSION: usize = 384;

/// Maps free text to a fixed-dimension vector.
///
/// Must be deterministic for a given model version, and `dimension()` must
/// equal the dimension of the index the vectors are stored in.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    fn dimension(&self) -> usize;

    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Feature-hashing bag-of-words embedder.
///
/// Lowercased alphanumeric tokens are hashed into `dimension` buckets and the
/// result is L2-normalized, so texts sharing vocabulary land close together.
/// Used when no neural model is configured.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    pub fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0f32; self.dimension];
        if self.dimension == 0 {
            return vector;
        }

        let tokens = text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .map(str::to_lowercase);

        for token in tokens {
            let mut hasher = DefaultHasher::new();
            token.hash(&mut hasher);
            let hash = hasher.finish();
            let bucket = (hash % self.dimension as u64) as usize;
            let sign = if (hash >> 63) == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|v| *v /= norm);
        }
        vector
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_EMBEDDING_DIMENSION)
    }
}

#[async_trait]
impl EmbeddingProvider for HashingEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_sync(text))
    }
}

#[cfg(feature = "fastembed")]
pub use neural::FastEmbedProvider;

#[cfg(feature = "fastembed")]
mod neural {
    use std::sync::{Arc, Mutex, PoisonError};

    use async_trait::async_trait;
    use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
    use tracing::info;

    use super::{DEFAULT_EMBEDDING_DIMENSION, EmbeddingProvider};
    use crate::error::{FraudError, Result};

    /// all-MiniLM-L6-v2 through fastembed's ONNX runtime.
    ///
    /// Inference runs on a blocking thread holding the model lock. A caller
    /// that times out stops waiting but does not cancel that thread, so calls
    /// made while it runs queue behind it on the lock.
    pub struct FastEmbedProvider {
        model: Arc<Mutex<TextEmbedding>>,
    }

    impl FastEmbedProvider {
        pub fn try_new() -> Result<Self> {
            let model = TextEmbedding::try_new(
                InitOptions::new(EmbeddingModel::AllMiniLML6V2).with_show_download_progress(true),
            )
            .map_err(|e| FraudError::Embedding(e.to_string()))?;
            info!("Loaded all-MiniLM-L6-v2 embedding model");
            Ok(Self {
                model: Arc::new(Mutex::new(model)),
            })
        }
    }

    #[async_trait]
    impl EmbeddingProvider for FastEmbedProvider {
        fn dimension(&self) -> usize {
            DEFAULT_EMBEDDING_DIMENSION
        }

        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            let input = text.to_owned();
            let model = self.model.clone();

            // ONNX inference is CPU bound; keep it off the async workers.
            tokio::task::spawn_blocking(move || {
                let mut model = model.lock().unwrap_or_else(PoisonError::into_inner);
                let embeddings = model
                    .embed(vec![input], None)
                    .map_err(|e| FraudError::Embedding(e.to_string()))?;
                embeddings
                    .into_iter()
                    .next()
                    .ok_or_else(|| FraudError::Embedding("model returned no embedding".to_string()))
            })
            .await
            .map_err(|e| FraudError::Embedding(e.to_string()))?
        }
    }
}
