//! In-memory vector store: useful for testing and ephemeral sessions.

use async_trait::async_trait;
use doppel_core::error::VectorStoreError;
use doppel_core::vector::VectorStore;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::vector::rank_by_similarity;

/// Number of texts a search returns unless configured otherwise.
pub const DEFAULT_TOP_K: usize = 3;

#[derive(Debug, Clone)]
struct StoredText {
    text: String,
    vector: Vec<f32>,
}

/// A vector store that keeps every collection in a `HashMap` of `Vec`s and
/// ranks by cosine similarity. Collections are created on first insert.
pub struct InMemoryVectorStore {
    collections: Arc<RwLock<HashMap<String, Vec<StoredText>>>>,
    top_k: usize,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self {
            collections: Arc::new(RwLock::new(HashMap::new())),
            top_k: DEFAULT_TOP_K,
        }
    }

    /// Set how many texts a search returns.
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// Number of texts stored in `collection`.
    pub async fn count(&self, collection: &str) -> usize {
        self.collections
            .read()
            .await
            .get(collection)
            .map_or(0, Vec::len)
    }
}

impl Default for InMemoryVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn insert(&self, collection: &str, text: &str, vector: &[f32]) -> Result<(), VectorStoreError> {
        let mut collections = self.collections.write().await;
        let stored = collections.entry(collection.to_string()).or_default();

        if let Some(first) = stored.first()
            && first.vector.len() != vector.len()
        {
            return Err(VectorStoreError::DimensionMismatch {
                collection: collection.to_string(),
                expected: first.vector.len(),
                actual: vector.len(),
            });
        }

        stored.push(StoredText {
            text: text.to_string(),
            vector: vector.to_vec(),
        });
        debug!(collection, size = stored.len(), "Stored text in vector collection");
        Ok(())
    }

    async fn search(&self, collection: &str, vector: &[f32]) -> Result<Vec<String>, VectorStoreError> {
        let collections = self.collections.read().await;
        let Some(stored) = collections.get(collection) else {
            return Ok(Vec::new());
        };

        let ranked = rank_by_similarity(
            stored.iter().map(|s| (s.text.as_str(), s.vector.as_slice())),
            vector,
            self.top_k,
        );
        Ok(ranked.into_iter().map(|(_, text)| text.to_string()).collect())
    }
}
