//! Scripted collaborators for unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use doppel_config::AgentConfig;
use doppel_core::error::{ModelError, SkillError};
use doppel_core::model::{
    ChatRequest, ChunkReceiver, EmbeddingRequest, EmbeddingResponse, ModelClient, StreamChunk,
};
use doppel_core::skill::{OutputSink, Skill, SkillContext, SkillRegistry};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::agent::Agent;
use crate::double::{AgentDouble, SessionSpec};

/// Replays canned completions in order and records every request.
/// Chat fails once the script runs out.
pub struct ScriptedModel {
    script: Mutex<VecDeque<Vec<String>>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedModel {
    /// One single-chunk completion per response.
    pub fn new(responses: Vec<&str>) -> Self {
        Self::chunked(responses.into_iter().map(|r| vec![r]).collect())
    }

    pub fn chunked(responses: Vec<Vec<&str>>) -> Self {
        let script = responses
            .into_iter()
            .map(|chunks| chunks.into_iter().map(String::from).collect())
            .collect();
        Self {
            script: Mutex::new(script),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelClient for ScriptedModel {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChunkReceiver, ModelError> {
        self.requests.lock().unwrap().push(request);
        let chunks = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| ModelError::StreamInterrupted("script exhausted".into()))?;

        let (tx, rx) = mpsc::channel(chunks.len() + 1);
        for chunk in chunks {
            tx.try_send(Ok(StreamChunk::text(chunk))).unwrap();
        }
        tx.try_send(Ok(StreamChunk {
            content: String::new(),
            done: true,
        }))
        .unwrap();
        Ok(rx)
    }

    /// Letter-frequency vector: identical texts embed identically.
    async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse, ModelError> {
        let mut vector = vec![0.0f32; 26];
        for c in request.input.to_ascii_lowercase().bytes() {
            if c.is_ascii_lowercase() {
                vector[usize::from(c - b'a')] += 1.0;
            }
        }
        Ok(EmbeddingResponse {
            embeddings: vec![vector],
            model: request.model,
        })
    }
}

enum Behaviour {
    Outputs(Vec<Value>),
    Fail(String),
    Pending,
}

/// A skill with fixed behaviour and a call counter.
pub struct StubSkill {
    name: String,
    behaviour: Behaviour,
    calls: Arc<AtomicUsize>,
}

impl StubSkill {
    fn with(name: &str, behaviour: Behaviour) -> Self {
        Self {
            name: name.to_string(),
            behaviour,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Reports each of `outputs`, then succeeds.
    pub fn returning(name: &str, outputs: Vec<Value>) -> Self {
        Self::with(name, Behaviour::Outputs(outputs))
    }

    pub fn failing(name: &str, reason: &str) -> Self {
        Self::with(name, Behaviour::Fail(reason.to_string()))
    }

    /// Never finishes on its own.
    pub fn pending(name: &str) -> Self {
        Self::with(name, Behaviour::Pending)
    }

    pub fn calls(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }
}

#[async_trait]
impl Skill for StubSkill {
    fn description(&self) -> String {
        format!("stub {}", self.name)
    }

    async fn execute(
        &self,
        _ctx: &SkillContext,
        _payload: Value,
        sink: &mut OutputSink<'_>,
    ) -> Result<(), SkillError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.behaviour {
            Behaviour::Outputs(outputs) => {
                for output in outputs {
                    sink(output.clone())?;
                }
                Ok(())
            }
            Behaviour::Fail(reason) => Err(SkillError::failed(&self.name, reason)),
            Behaviour::Pending => std::future::pending().await,
        }
    }
}

/// A chat-mode session whose session tier holds `skills`.
pub fn session_with(model: ScriptedModel, skills: Vec<(&str, StubSkill)>) -> AgentDouble {
    let mut registry = SkillRegistry::new();
    for (name, skill) in skills {
        registry.learn(name, skill);
    }
    let agent = Arc::new(Agent::new(Arc::new(model)));
    let spec = SessionSpec {
        skills: registry,
        ..SessionSpec::default()
    };
    AgentDouble::new(AgentConfig::default(), agent, spec).unwrap()
}
