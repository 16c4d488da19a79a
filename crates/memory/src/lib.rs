//! Vector store implementations for Doppel.

pub mod in_memory;
pub mod vector;

pub use in_memory::InMemoryVectorStore;
pub use vector::{cosine_similarity, rank_by_similarity};
