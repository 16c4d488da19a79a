//! The shared base agent.

use std::sync::{Arc, PoisonError, RwLock};

use doppel_core::error::{BoxError, Error, Result, SkillError};
use doppel_core::model::{ChatRequest, ModelClient};
use doppel_core::skill::{OutputSink, Skill, SkillContext, SkillRegistry};
use doppel_core::vector::VectorStore;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::dispatch::execute;

/// Receives every streamed chunk and folded tool result of a run.
/// Returning an error aborts the run.
pub type StreamCallback<'a> = dyn FnMut(&str) -> std::result::Result<(), BoxError> + Send + 'a;

/// Who the agent is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Persona {
    pub character: String,
    pub role: String,
}

impl Persona {
    pub fn new(character: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            character: character.into(),
            role: role.into(),
        }
    }

    /// The persona block injected at the head of memory.
    pub fn prompt(&self) -> String {
        format!(
            "Personality:\nYou are {}\nRole:\nYour role is {}",
            self.character, self.role
        )
    }
}

/// Persona, skills and collaborator handles shared by any number of sessions.
///
/// Persona and skills can change at runtime; sessions see the change on
/// their next reset (persona, catalogue) or dispatch (skills).
pub struct Agent {
    persona: RwLock<Persona>,
    skills: RwLock<SkillRegistry>,
    model: Arc<dyn ModelClient>,
    vector_store: Option<Arc<dyn VectorStore>>,
}

impl Agent {
    pub fn new(model: Arc<dyn ModelClient>) -> Self {
        Self {
            persona: RwLock::new(Persona::default()),
            skills: RwLock::new(SkillRegistry::new()),
            model,
            vector_store: None,
        }
    }

    pub fn with_persona(mut self, persona: Persona) -> Self {
        self.persona = RwLock::new(persona);
        self
    }

    pub fn with_skills(mut self, skills: SkillRegistry) -> Self {
        self.skills = RwLock::new(skills);
        self
    }

    pub fn with_vector_store(mut self, store: Arc<dyn VectorStore>) -> Self {
        self.vector_store = Some(store);
        self
    }

    pub fn set_character(&self, character: impl Into<String>) {
        self.persona.write().unwrap_or_else(PoisonError::into_inner).character = character.into();
    }

    pub fn set_role(&self, role: impl Into<String>) {
        self.persona.write().unwrap_or_else(PoisonError::into_inner).role = role.into();
    }

    pub fn persona(&self) -> Persona {
        self.persona.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn description(&self) -> String {
        self.persona().prompt()
    }

    /// Register a base-tier skill. Replaces any existing skill with the same name.
    pub fn learn_skill(&self, name: impl Into<String>, skill: impl Skill + 'static) {
        self.learn_shared_skill(name, Arc::new(skill));
    }

    pub fn learn_shared_skill(&self, name: impl Into<String>, skill: Arc<dyn Skill>) {
        self.skills
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .learn_shared(name, skill);
    }

    /// Point-in-time copy of the base registry.
    pub fn skills(&self) -> SkillRegistry {
        self.skills.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn model(&self) -> &Arc<dyn ModelClient> {
        &self.model
    }

    pub fn vector_store(&self) -> Option<&Arc<dyn VectorStore>> {
        self.vector_store.as_ref()
    }

    /// Run a base-tier skill directly.
    pub async fn command(
        &self,
        ctx: &SkillContext,
        name: &str,
        payload: Value,
        sink: &mut OutputSink<'_>,
    ) -> std::result::Result<(), SkillError> {
        let skill = self
            .skills()
            .get(name)
            .ok_or_else(|| SkillError::NotFound(name.to_string()))?;
        execute(skill.as_ref(), ctx, payload, sink).await
    }

    /// Stream a completion, forwarding each chunk to `on_chunk`, and return
    /// the full text. Cancellation or a callback error drops the stream.
    pub(crate) async fn stream_completion(
        &self,
        request: ChatRequest,
        cancel: &CancellationToken,
        on_chunk: &mut StreamCallback<'_>,
    ) -> Result<String> {
        let model = request.model.clone();
        let mut rx = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            rx = self.model.chat(request) => rx?,
        };

        let mut text = String::new();
        let mut chunks = 0usize;
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Error::Cancelled),
                next = rx.recv() => next,
            };
            let Some(chunk) = next else { break };
            let chunk = chunk?;
            if !chunk.content.is_empty() {
                chunks += 1;
                text.push_str(&chunk.content);
                on_chunk(&chunk.content).map_err(Error::Callback)?;
            }
            if chunk.done {
                break;
            }
        }

        debug!(model = %model, chunks, chars = text.chars().count(), "Completion streamed");
        Ok(text)
    }
}
