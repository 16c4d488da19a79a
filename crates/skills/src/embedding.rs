//! Embedding skill: expose the model client's embedding endpoint.

use std::sync::Arc;

use async_trait::async_trait;
use doppel_core::error::SkillError;
use doppel_core::model::{EmbeddingRequest, ModelClient};
use doppel_core::skill::{OutputSink, SkillContext, TypedSkill};
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Deserialize)]
pub struct EmbeddingArgs {
    pub model: String,
    pub content: String,
}

/// Embeds a text and outputs the vector.
pub struct EmbeddingSkill {
    model: Arc<dyn ModelClient>,
}

impl EmbeddingSkill {
    pub fn new(model: Arc<dyn ModelClient>) -> Self {
        Self { model }
    }
}

#[async_trait]
impl TypedSkill for EmbeddingSkill {
    type Args = EmbeddingArgs;

    fn description(&self) -> String {
        "Turn a text into an embedding vector. Context: {\"model\": string, \"content\": string}. \
         Outputs the vector as a list of numbers."
            .into()
    }

    async fn run(
        &self,
        ctx: &SkillContext,
        args: EmbeddingArgs,
        sink: &mut OutputSink<'_>,
    ) -> Result<(), SkillError> {
        let response = self
            .model
            .embed(EmbeddingRequest {
                model: args.model,
                input: args.content,
            })
            .await
            .map_err(|e| SkillError::failed(&ctx.name, e))?;
        let vector = response
            .first()
            .ok_or_else(|| SkillError::failed(&ctx.name, "model returned no embedding"))?;
        sink(json!(vector))
    }
}
