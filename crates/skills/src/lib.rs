//! Built-in skills for Doppel agents.
//!
//! These are thin adapters over contracts the runtime already owns: the
//! clock, the vector store, the model client's embeddings and other
//! sessions. Anything that reaches outside the process belongs to the host.

pub mod embedding;
pub mod sleep;
pub mod team;
pub mod vector;

use std::sync::Arc;

use doppel_core::model::ModelClient;
use doppel_core::skill::SkillRegistry;
use doppel_core::vector::VectorStore;

pub use embedding::EmbeddingSkill;
pub use sleep::SleepSkill;
pub use team::TeamSkill;
pub use vector::{VectorInsertSkill, VectorSearchSkill};

/// Registry with `sleep` and `embedding`, plus `vector_insert` and
/// `vector_search` when a store is given. `team` needs member sessions and is
/// registered by the host.
pub fn default_registry(
    model: Arc<dyn ModelClient>,
    store: Option<Arc<dyn VectorStore>>,
) -> SkillRegistry {
    let mut registry = SkillRegistry::new();
    registry.learn_typed("sleep", SleepSkill);
    registry.learn_typed("embedding", EmbeddingSkill::new(model));
    if let Some(store) = store {
        registry.learn_typed("vector_insert", VectorInsertSkill::new(store.clone()));
        registry.learn_typed("vector_search", VectorSearchSkill::new(store));
    }
    registry
}
