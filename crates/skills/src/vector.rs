//! Vector store skills: let the model write to and query a collection directly.

use std::sync::Arc;

use async_trait::async_trait;
use doppel_core::error::SkillError;
use doppel_core::skill::{OutputSink, SkillContext, TypedSkill};
use doppel_core::vector::VectorStore;
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Deserialize)]
pub struct InsertArgs {
    pub collection: String,
    pub content: String,
    pub vector: Vec<f32>,
}

#[derive(Debug, Deserialize)]
pub struct SearchArgs {
    pub collection: String,
    pub vector: Vec<f32>,
}

/// Store a text with a caller-provided embedding.
pub struct VectorInsertSkill {
    store: Arc<dyn VectorStore>,
}

impl VectorInsertSkill {
    pub fn new(store: Arc<dyn VectorStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl TypedSkill for VectorInsertSkill {
    type Args = InsertArgs;

    fn description(&self) -> String {
        format!(
            "Store a text in the {} vector store. Context: {{\"collection\": string, \"content\": string, \"vector\": [number]}}",
            self.store.name()
        )
    }

    async fn run(
        &self,
        ctx: &SkillContext,
        args: InsertArgs,
        _sink: &mut OutputSink<'_>,
    ) -> Result<(), SkillError> {
        self.store
            .insert(&args.collection, &args.content, &args.vector)
            .await
            .map_err(|e| SkillError::failed(&ctx.name, e))
    }
}

/// Find the stored texts nearest to a caller-provided embedding.
pub struct VectorSearchSkill {
    store: Arc<dyn VectorStore>,
}

impl VectorSearchSkill {
    pub fn new(store: Arc<dyn VectorStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl TypedSkill for VectorSearchSkill {
    type Args = SearchArgs;

    fn description(&self) -> String {
        format!(
            "Search the {} vector store. Context: {{\"collection\": string, \"vector\": [number]}}. \
             Outputs the matching texts, best first.",
            self.store.name()
        )
    }

    async fn run(
        &self,
        ctx: &SkillContext,
        args: SearchArgs,
        sink: &mut OutputSink<'_>,
    ) -> Result<(), SkillError> {
        let hits = self
            .store
            .search(&args.collection, &args.vector)
            .await
            .map_err(|e| SkillError::failed(&ctx.name, e))?;
        sink(json!(hits))
    }
}
