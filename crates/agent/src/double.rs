//! A session ("agent double") layered over a shared [`Agent`].

use std::fmt;
use std::sync::Arc;

use doppel_config::{AgentConfig, RetrievalConfig};
use doppel_core::error::{Error, Result, SkillError};
use doppel_core::memory::Memory;
use doppel_core::message::{Entry, Role};
use doppel_core::model::EmbeddingRequest;
use doppel_core::skill::{OutputSink, Skill, SkillContext, SkillRegistry};
use doppel_core::vector::VectorStore;
use serde_json::Value;
use tracing::{debug, info};
use uuid::Uuid;

use crate::agent::{Agent, Persona};
use crate::checkpoint::Checkpoint;
use crate::dispatch::execute;
use crate::loop_runner::TurnPhase;
use crate::prompt::{PromptSources, assemble};

/// Session-level overrides applied on top of the base agent.
#[derive(Clone, Default)]
pub struct SessionSpec {
    pub persona: Persona,
    /// Consulted before the base agent's skills
    pub skills: SkillRegistry,
    pub checkpoint: Option<Arc<dyn Checkpoint>>,
}

/// One conversation: its own persona, high-priority skills and memory on top
/// of a shared base agent.
pub struct AgentDouble {
    id: Uuid,
    config: AgentConfig,
    agent: Arc<Agent>,
    persona: Persona,
    skills: SkillRegistry,
    memory: Memory,
    checkpoint: Option<Arc<dyn Checkpoint>>,
    phase: TurnPhase,
}

impl AgentDouble {
    /// Validate the configuration and build a session with a freshly
    /// assembled system prompt.
    pub fn new(config: AgentConfig, agent: Arc<Agent>, spec: SessionSpec) -> Result<Self> {
        config.validate()?;
        if config.retrieval.is_some() && agent.vector_store().is_none() {
            return Err(Error::Config {
                message: "retrieval is configured but the agent has no vector store".into(),
            });
        }

        let mut session = Self {
            id: Uuid::new_v4(),
            config,
            agent,
            persona: spec.persona,
            skills: spec.skills,
            memory: Memory::new(),
            checkpoint: spec.checkpoint,
            phase: TurnPhase::Idle,
        };
        session.init_memory();
        info!(
            session = %session.id,
            model = %session.config.chat_model,
            mode = ?session.config.mode,
            skills = session.skills.len(),
            "Session created"
        );
        Ok(session)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn agent(&self) -> &Arc<Agent> {
        &self.agent
    }

    pub fn persona(&self) -> &Persona {
        &self.persona
    }

    /// The session-tier registry.
    pub fn skills(&self) -> &SkillRegistry {
        &self.skills
    }

    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    pub(crate) fn memory_mut(&mut self) -> &mut Memory {
        &mut self.memory
    }

    pub(crate) fn checkpoint(&self) -> Option<Arc<dyn Checkpoint>> {
        self.checkpoint.clone()
    }

    /// Where the current (or last) turn is.
    pub fn phase(&self) -> TurnPhase {
        self.phase
    }

    pub(crate) fn set_phase(&mut self, phase: TurnPhase) {
        self.phase = phase;
    }

    /// Takes effect on the next [`reset_memory`](Self::reset_memory).
    pub fn set_character(&mut self, character: impl Into<String>) {
        self.persona.character = character.into();
    }

    pub fn set_role(&mut self, role: impl Into<String>) {
        self.persona.role = role.into();
    }

    /// Base persona followed by the session persona.
    pub fn description(&self) -> String {
        format!("{}\n{}", self.agent.description(), self.persona.prompt())
    }

    /// Register a session-tier skill, shadowing any base skill of that name.
    pub fn learn_skill(&mut self, name: impl Into<String>, skill: impl Skill + 'static) {
        self.skills.learn(name, skill);
    }

    /// Run a session-tier skill directly.
    pub async fn command(
        &self,
        ctx: &SkillContext,
        name: &str,
        payload: Value,
        sink: &mut OutputSink<'_>,
    ) -> std::result::Result<(), SkillError> {
        let skill = self
            .skills
            .get(name)
            .ok_or_else(|| SkillError::NotFound(name.to_string()))?;
        execute(skill.as_ref(), ctx, payload, sink).await
    }

    // --- Memory ---

    pub fn add_memory(&mut self, role: Role, content: impl Into<String>, media: Vec<String>) -> &Entry {
        self.memory.append(role, content, media)
    }

    pub fn add_system_memory(&mut self, content: impl Into<String>) -> &Entry {
        self.add_memory(Role::System, content, Vec::new())
    }

    pub fn add_user_memory(&mut self, content: impl Into<String>) -> &Entry {
        self.add_memory(Role::User, content, Vec::new())
    }

    pub fn add_assistant_memory(&mut self, content: impl Into<String>) -> &Entry {
        self.add_memory(Role::Assistant, content, Vec::new())
    }

    pub fn add_tool_memory(&mut self, content: impl Into<String>) -> &Entry {
        self.add_memory(Role::Tool, content, Vec::new())
    }

    /// Teach the session a fact by writing it into memory as the assistant.
    pub fn learn(&mut self, info: impl Into<String>) -> &Entry {
        self.add_assistant_memory(info)
    }

    /// Evict `count` entries from the tail; negative evicts everything.
    pub fn forget(&mut self, count: isize) -> usize {
        let removed = self.memory.evict(count);
        debug!(session = %self.id, removed, "Forgot memory entries");
        removed
    }

    /// Forget everything, then rebuild the system prompt from the current
    /// personas and catalogues.
    pub fn reset_memory(&mut self) {
        self.forget(-1);
        self.init_memory();
    }

    pub fn snapshot(&self) -> Memory {
        self.memory.snapshot()
    }

    pub fn load_memory(&mut self, snapshot: Memory) {
        self.memory.restore(snapshot);
    }

    pub(crate) fn init_memory(&mut self) {
        let base_persona = self.agent.persona();
        let base_skills = self.agent.skills();
        let block = assemble(&PromptSources {
            base_persona: &base_persona,
            session_persona: &self.persona,
            retrieval: self.config.retrieval.as_ref(),
            base_skills: &base_skills,
            session_skills: &self.skills,
            mode: self.config.mode,
        });
        for content in block {
            self.memory.append(Role::System, content, Vec::new());
        }
        self.memory.mark_prefix();
    }

    // --- Long-term memory ---

    /// Embed `info` and store it in the configured collection. An empty
    /// embedding stores nothing.
    pub async fn remember(&self, info: &str) -> Result<()> {
        let (retrieval, store) = self.retrieval()?;
        let Some(vector) = self.embed(&retrieval.embedding_model, info).await? else {
            return Ok(());
        };
        store.insert(&retrieval.collection, info, &vector).await?;
        debug!(session = %self.id, collection = %retrieval.collection, "Remembered text");
        Ok(())
    }

    /// The stored texts most similar to `query`, best first.
    pub async fn recall(&self, query: &str) -> Result<Vec<String>> {
        let (retrieval, store) = self.retrieval()?;
        let Some(vector) = self.embed(&retrieval.embedding_model, query).await? else {
            return Ok(Vec::new());
        };
        let hits = store.search(&retrieval.collection, &vector).await?;
        debug!(session = %self.id, hits = hits.len(), "Recalled texts");
        Ok(hits)
    }

    pub(crate) fn retrieval_enabled(&self) -> bool {
        self.config.retrieval.is_some()
    }

    fn retrieval(&self) -> Result<(&RetrievalConfig, &Arc<dyn VectorStore>)> {
        let retrieval = self.config.retrieval.as_ref().ok_or_else(|| Error::Config {
            message: "retrieval is not configured".into(),
        })?;
        let store = self.agent.vector_store().ok_or_else(|| Error::Config {
            message: "the agent has no vector store".into(),
        })?;
        Ok((retrieval, store))
    }

    async fn embed(&self, model: &str, input: &str) -> Result<Option<Vec<f32>>> {
        let response = self
            .agent
            .model()
            .embed(EmbeddingRequest {
                model: model.to_string(),
                input: input.to_string(),
            })
            .await?;
        Ok(response.first().map(<[f32]>::to_vec))
    }
}

impl fmt::Debug for AgentDouble {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentDouble")
            .field("id", &self.id)
            .field("persona", &self.persona)
            .field("skills", &self.skills)
            .field("memory_len", &self.memory.len())
            .field("phase", &self.phase)
            .finish()
    }
}
