//! Vector store trait: similarity search over embedded texts.

use async_trait::async_trait;

use crate::error::VectorStoreError;

/// Stores texts by embedding and returns the closest ones for a query vector.
///
/// Implementations must be safe to share between sessions.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// A human-readable name for this store (e.g., "in_memory").
    fn name(&self) -> &str;

    /// Insert `text` with its embedding into `collection`.
    async fn insert(&self, collection: &str, text: &str, vector: &[f32]) -> Result<(), VectorStoreError>;

    /// Texts in `collection` ranked by similarity to `vector`, best first.
    async fn search(&self, collection: &str, vector: &[f32]) -> Result<Vec<String>, VectorStoreError>;
}
