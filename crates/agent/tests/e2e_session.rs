//! End-to-end sessions against an in-process model.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use doppel_agent::{Agent, AgentDouble, Persona, SessionSpec, StopReason};
use doppel_config::{AgentConfig, RunMode, SupervisorConfig};
use doppel_core::{
    BoxError, ChatRequest, ChunkReceiver, Error, ModelClient, ModelError, OutputSink, Role,
    SkillContext, SkillError, SkillRegistry, StreamChunk, TypedSkill,
};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Answers from a queue, one chunk per answer.
struct QueueModel {
    answers: Mutex<VecDeque<String>>,
}

impl QueueModel {
    fn new(answers: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            answers: Mutex::new(answers.iter().map(|a| a.to_string()).collect()),
        })
    }
}

fn single_chunk(text: String) -> ChunkReceiver {
    let (tx, rx) = mpsc::channel(2);
    tx.try_send(Ok(StreamChunk::text(text))).unwrap();
    tx.try_send(Ok(StreamChunk {
        content: String::new(),
        done: true,
    }))
    .unwrap();
    rx
}

#[async_trait]
impl ModelClient for QueueModel {
    fn name(&self) -> &str {
        "queue"
    }

    async fn chat(&self, _request: ChatRequest) -> Result<ChunkReceiver, ModelError> {
        let answer = self
            .answers
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| ModelError::StreamInterrupted("no more answers".into()))?;
        Ok(single_chunk(answer))
    }
}

#[derive(Deserialize)]
struct SearchArgs {
    query: String,
}

struct WeatherSearch;

#[async_trait]
impl TypedSkill for WeatherSearch {
    type Args = SearchArgs;

    fn description(&self) -> String {
        "Look up current conditions. Payload: {\"query\": string}".into()
    }

    async fn run(
        &self,
        _ctx: &SkillContext,
        args: SearchArgs,
        sink: &mut OutputSink<'_>,
    ) -> Result<(), SkillError> {
        if args.query.contains("New York") {
            sink(json!("Sunny, 24C"))
        } else {
            Err(SkillError::failed("search", "unknown city"))
        }
    }
}

fn base_agent(model: Arc<dyn ModelClient>) -> Arc<Agent> {
    let mut skills = SkillRegistry::new();
    skills.learn_typed("search", WeatherSearch);
    Arc::new(
        Agent::new(model)
            .with_persona(Persona::new("a concise assistant", "answering weather questions"))
            .with_skills(skills),
    )
}

const WEATHER_CALL: &str = r#"Let me check. <tool>{"function":"search","context":{"query":"weather in New York"},"abort_on_error":true}</tool>"#;

#[tokio::test]
async fn weather_question_folds_tool_result() {
    let agent = base_agent(QueueModel::new(&[WEATHER_CALL]));
    let mut session = AgentDouble::new(AgentConfig::default(), agent, SessionSpec::default()).unwrap();

    let mut streamed = Vec::new();
    let mut on_chunk = |chunk: &str| {
        streamed.push(chunk.to_string());
        Ok::<(), BoxError>(())
    };
    let summary = session
        .listen_and_watch(&CancellationToken::new(), "What's the weather in New York?", vec![], &mut on_chunk)
        .await
        .unwrap();

    assert_eq!(summary.stop, StopReason::SingleTurn);
    assert_eq!(
        streamed,
        vec![
            WEATHER_CALL.to_string(),
            "The result of function [search]: Sunny, 24C".to_string(),
            "The function [search] has been executed successfully.".to_string(),
        ]
    );

    let tail: Vec<_> = session
        .memory()
        .entries()
        .iter()
        .rev()
        .take(4)
        .rev()
        .map(|e| (e.role, e.content.clone()))
        .collect();
    assert_eq!(
        tail,
        vec![
            (Role::User, "What's the weather in New York?".to_string()),
            (Role::Assistant, WEATHER_CALL.to_string()),
            (Role::Tool, "The result of function [search]: Sunny, 24C".to_string()),
            (Role::Tool, "The function [search] has been executed successfully.".to_string()),
        ]
    );
}

#[tokio::test]
async fn failed_call_with_abort_skips_the_rest() {
    let answer = concat!(
        r#"<tool>{"function":"search","context":{"query":"Atlantis"},"abort_on_error":true}</tool>"#,
        r#"<tool>{"function":"search","context":{"query":"New York"}}</tool>"#,
    );
    let agent = base_agent(QueueModel::new(&[answer]));
    let mut session = AgentDouble::new(AgentConfig::default(), agent, SessionSpec::default()).unwrap();
    let mut on_chunk = |_: &str| Ok::<(), BoxError>(());

    session
        .listen_and_watch(&CancellationToken::new(), "weather?", vec![], &mut on_chunk)
        .await
        .unwrap();

    let tools: Vec<_> = session
        .memory()
        .entries()
        .iter()
        .filter(|e| e.role == Role::Tool)
        .map(|e| e.content.as_str())
        .collect();
    assert_eq!(
        tools,
        vec!["The error [Skill execution failed: search: unknown city] happened during executing the function [search]."]
    );
}

#[tokio::test]
async fn invalid_payload_is_narrated() {
    let answer = r#"<tool>{"function":"search","context":{"city":"Paris"}}</tool>"#;
    let agent = base_agent(QueueModel::new(&[answer]));
    let mut session = AgentDouble::new(AgentConfig::default(), agent, SessionSpec::default()).unwrap();
    let mut on_chunk = |_: &str| Ok::<(), BoxError>(());

    session
        .listen_and_watch(&CancellationToken::new(), "weather?", vec![], &mut on_chunk)
        .await
        .unwrap();

    let last = session.memory().last().unwrap();
    assert_eq!(last.role, Role::Tool);
    assert!(last.content.starts_with("The error [Invalid skill arguments: search: missing field `query`"));
}

#[tokio::test]
async fn supervisor_veto_runs_no_tools() {
    let agent = base_agent(QueueModel::new(&[WEATHER_CALL, "true"]));
    let config = AgentConfig {
        supervisor: SupervisorConfig {
            enabled: true,
            model: None,
        },
        ..AgentConfig::default()
    };
    let mut session = AgentDouble::new(config, agent, SessionSpec::default()).unwrap();
    let mut on_chunk = |_: &str| Ok::<(), BoxError>(());

    let err = session
        .listen_and_watch(&CancellationToken::new(), "weather?", vec![], &mut on_chunk)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::SupervisorRejected { .. }));
    assert_eq!(session.memory().last().unwrap().role, Role::User);
}

/// Never ends the loop; cancels the run some time after its third call.
struct Ticker {
    calls: AtomicUsize,
    cancel: CancellationToken,
}

#[async_trait]
impl ModelClient for Ticker {
    fn name(&self) -> &str {
        "ticker"
    }

    async fn chat(&self, _request: ChatRequest) -> Result<ChunkReceiver, ModelError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if n == 3 {
            let cancel = self.cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_secs(600)).await;
                cancel.cancel();
            });
        }
        Ok(single_chunk(format!("tick {n}")))
    }
}

#[tokio::test(start_paused = true)]
async fn loop_mode_stops_promptly_on_cancel() {
    let cancel = CancellationToken::new();
    let model = Arc::new(Ticker {
        calls: AtomicUsize::new(0),
        cancel: cancel.clone(),
    });
    let config = AgentConfig {
        mode: RunMode::Loop,
        loop_interval_ms: 3_600_000,
        ..AgentConfig::default()
    };
    let mut session =
        AgentDouble::new(config, Arc::new(Agent::new(model.clone())), SessionSpec::default()).unwrap();
    let mut on_chunk = |_: &str| Ok::<(), BoxError>(());

    let start = tokio::time::Instant::now();
    let err = session.think(&cancel, &mut on_chunk).await.unwrap_err();

    assert!(matches!(err, Error::Cancelled));
    assert_eq!(model.calls.load(Ordering::SeqCst), 3);
    assert!(start.elapsed() < Duration::from_secs(3 * 3600));
    assert_eq!(
        session
            .memory()
            .entries()
            .iter()
            .filter(|e| e.content.starts_with("tick"))
            .count(),
        3
    );
}
