//! Skill trait: the abstraction over agent capabilities.
//!
//! A skill is invoked by name from a `<tool>` block. It receives the raw JSON
//! `context` of the invocation and reports any number of outputs through an
//! [`OutputSink`]; the session folds each output back into memory.
//!
//! Skill families with a fixed argument shape implement [`TypedSkill`] and
//! are registered through [`Typed`], which decodes the payload once before the
//! skill runs.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::error::SkillError;

/// Receives each output a skill produces. Returning an error tells the skill
/// to stop.
pub type OutputSink<'a> = dyn FnMut(Value) -> Result<(), SkillError> + Send + 'a;

/// Per-invocation context handed to a skill.
#[derive(Debug, Clone)]
pub struct SkillContext {
    /// Name the skill was invoked under
    pub name: String,

    /// Cancelled when the caller aborts the run
    pub cancel: CancellationToken,
}

impl SkillContext {
    pub fn new(name: impl Into<String>, cancel: CancellationToken) -> Self {
        Self {
            name: name.into(),
            cancel,
        }
    }
}

#[async_trait]
pub trait Skill: Send + Sync {
    /// What the skill does and what payload it expects (sent to the model).
    fn description(&self) -> String;

    /// Run the skill once with an opaque payload.
    async fn execute(
        &self,
        ctx: &SkillContext,
        payload: Value,
        sink: &mut OutputSink<'_>,
    ) -> Result<(), SkillError>;
}

/// A skill with a typed argument payload.
#[async_trait]
pub trait TypedSkill: Send + Sync {
    type Args: DeserializeOwned + Send;

    fn description(&self) -> String;

    async fn run(
        &self,
        ctx: &SkillContext,
        args: Self::Args,
        sink: &mut OutputSink<'_>,
    ) -> Result<(), SkillError>;
}

/// Adapts a [`TypedSkill`] to the object-safe [`Skill`] contract.
pub struct Typed<S>(pub S);

#[async_trait]
impl<S: TypedSkill> Skill for Typed<S> {
    fn description(&self) -> String {
        self.0.description()
    }

    async fn execute(
        &self,
        ctx: &SkillContext,
        payload: Value,
        sink: &mut OutputSink<'_>,
    ) -> Result<(), SkillError> {
        let args: S::Args = serde_json::from_value(payload)
            .map_err(|e| SkillError::InvalidArguments(format!("{}: {e}", ctx.name)))?;
        self.0.run(ctx, args, sink).await
    }
}

/// A named set of skills. Names are kept sorted so catalogues are stable.
#[derive(Clone, Default)]
pub struct SkillRegistry {
    skills: BTreeMap<String, Arc<dyn Skill>>,
}

impl SkillRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a skill. Replaces any existing skill with the same name.
    pub fn learn(&mut self, name: impl Into<String>, skill: impl Skill + 'static) {
        self.learn_shared(name, Arc::new(skill));
    }

    pub fn learn_typed<S: TypedSkill + 'static>(&mut self, name: impl Into<String>, skill: S) {
        self.learn(name, Typed(skill));
    }

    pub fn learn_shared(&mut self, name: impl Into<String>, skill: Arc<dyn Skill>) {
        self.skills.insert(name.into(), skill);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Skill>> {
        self.skills.get(name).cloned()
    }

    /// `(name, description)` pairs in name order.
    pub fn catalogue(&self) -> Vec<(String, String)> {
        self.skills
            .iter()
            .map(|(name, skill)| (name.clone(), skill.description()))
            .collect()
    }

    pub fn names(&self) -> Vec<&str> {
        self.skills.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.skills.len()
    }

    pub fn is_empty(&self) -> bool {
        self.skills.is_empty()
    }
}

impl std::fmt::Debug for SkillRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SkillRegistry")
            .field("skills", &self.names())
            .finish()
    }
}

/// Look `name` up in `tiers`, highest priority first.
pub fn resolve(tiers: &[&SkillRegistry], name: &str) -> Option<Arc<dyn Skill>> {
    tiers.iter().find_map(|registry| registry.get(name))
}

/// Text form of a skill output: strings verbatim, everything else as JSON.
pub fn render_output(output: &Value) -> String {
    match output {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
