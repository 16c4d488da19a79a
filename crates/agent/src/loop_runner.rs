//! The turn loop: generate, review, dispatch, checkpoint, evict, decide.

use std::fmt;

use doppel_config::{EvictionPolicy, RunMode};
use doppel_core::error::{Error, Result};
use doppel_core::message::Role;
use doppel_core::model::{ChatRequest, SamplingOptions};
use doppel_core::protocol::{detect_loop_end, parse_tool_calls};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::agent::StreamCallback;
use crate::double::AgentDouble;

/// Prepended to memory by [`AgentDouble::think`].
pub const THINK_PROMPT: &str = "Let me think and output something";

/// Where a session is inside a turn.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TurnPhase {
    #[default]
    Idle,
    Generating,
    Reviewing,
    Dispatching,
    Checkpointing,
    Evicting,
    DecidingContinuation,
}

impl fmt::Display for TurnPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Generating => "generating",
            Self::Reviewing => "reviewing",
            Self::Dispatching => "dispatching",
            Self::Checkpointing => "checkpointing",
            Self::Evicting => "evicting",
            Self::DecidingContinuation => "deciding_continuation",
        };
        f.write_str(name)
    }
}

/// Why a run ended without an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Chat mode always stops after one turn
    SingleTurn,
    /// The model emitted `<loop_end/>`
    LoopEnd,
    /// The model produced no text
    EmptyResponse,
    /// The model repeated its previous answer verbatim
    DuplicateResponse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// Model completions requested, including the one that stopped the run
    pub turns: usize,
    pub stop: StopReason,
}

enum TurnOutcome {
    Continue(String),
    Stop(StopReason),
}

impl AgentDouble {
    /// Take in a user message and run the conversation.
    ///
    /// With retrieval configured, texts recalled for the message are added as
    /// a `Context:` system entry first.
    pub async fn listen_and_watch(
        &mut self,
        cancel: &CancellationToken,
        message: &str,
        media: Vec<String>,
        on_chunk: &mut StreamCallback<'_>,
    ) -> Result<RunSummary> {
        if self.retrieval_enabled() {
            let hits = self.recall(message).await?;
            if !hits.is_empty() {
                self.add_system_memory(format!("Context: \n{}", hits.join("\n")));
            }
        }
        self.add_memory(Role::User, message, media);
        self.run(cancel, on_chunk).await
    }

    /// Let the model talk without new input.
    pub async fn think(
        &mut self,
        cancel: &CancellationToken,
        on_chunk: &mut StreamCallback<'_>,
    ) -> Result<RunSummary> {
        self.add_assistant_memory(THINK_PROMPT);
        self.run(cancel, on_chunk).await
    }

    async fn run(
        &mut self,
        cancel: &CancellationToken,
        on_chunk: &mut StreamCallback<'_>,
    ) -> Result<RunSummary> {
        info!(session = %self.id(), mode = ?self.config().mode, "Run started");

        let mut previous: Option<String> = None;
        let mut turns = 0;
        let result = loop {
            turns += 1;
            let outcome = self.turn(cancel, previous.as_deref(), on_chunk).await;
            match outcome {
                Ok(TurnOutcome::Stop(stop)) => break Ok(RunSummary { turns, stop }),
                Ok(TurnOutcome::Continue(text)) => previous = Some(text),
                Err(e) => break Err(e),
            }
            if let Err(e) = self.pause(cancel).await {
                break Err(e);
            }
        };

        self.enter(TurnPhase::Idle);
        match &result {
            Ok(summary) => info!(
                session = %self.id(),
                turns = summary.turns,
                stop = ?summary.stop,
                "Run finished"
            ),
            Err(e) => warn!(session = %self.id(), turns, error = %e, "Run failed"),
        }
        result
    }

    async fn turn(
        &mut self,
        cancel: &CancellationToken,
        previous: Option<&str>,
        on_chunk: &mut StreamCallback<'_>,
    ) -> Result<TurnOutcome> {
        self.enter(TurnPhase::Generating);
        let options = SamplingOptions {
            temperature: self.config().temperature,
        };
        let annotate = self.config().annotate_recalls;
        let request = ChatRequest {
            model: self.config().chat_model.clone(),
            messages: self.memory_mut().render(annotate),
            options,
        };
        let text = self.agent().stream_completion(request, cancel, on_chunk).await?;

        if self.config().supervisor.enabled {
            self.enter(TurnPhase::Reviewing);
            let reviewer = self.config().supervisor_model().to_string();
            self.agent().review(&reviewer, options, &text, cancel).await?;
        }

        if text.is_empty() {
            debug!(session = %self.id(), "Model returned nothing");
            return Ok(TurnOutcome::Stop(StopReason::EmptyResponse));
        }
        if previous == Some(text.as_str()) {
            debug!(session = %self.id(), "Model repeated itself");
            return Ok(TurnOutcome::Stop(StopReason::DuplicateResponse));
        }

        self.add_assistant_memory(text.as_str());

        self.enter(TurnPhase::Dispatching);
        let calls = parse_tool_calls(&text)?;
        if !calls.is_empty() {
            let report = self.dispatch_batch(cancel, calls, on_chunk).await?;
            debug!(
                session = %self.id(),
                succeeded = report.succeeded,
                failed = report.failed,
                skipped = report.skipped,
                "Tool calls dispatched"
            );
        }

        if let Some(checkpoint) = self.checkpoint() {
            self.enter(TurnPhase::Checkpointing);
            checkpoint.run(self).await.map_err(Error::Checkpoint)?;
        }

        self.enforce_budget();

        self.enter(TurnPhase::DecidingContinuation);
        if self.config().mode == RunMode::Chat {
            return Ok(TurnOutcome::Stop(StopReason::SingleTurn));
        }
        if detect_loop_end(&text) {
            return Ok(TurnOutcome::Stop(StopReason::LoopEnd));
        }
        Ok(TurnOutcome::Continue(text))
    }

    /// Shrink memory once it outgrows the configured context limit.
    fn enforce_budget(&mut self) {
        let chars = self.memory().content_len();
        let limit = self.config().context_limit;
        if chars <= limit {
            return;
        }

        self.enter(TurnPhase::Evicting);
        let policy = self.config().eviction;
        let removed = match policy {
            EvictionPolicy::Reset => self.memory_mut().evict(-1),
            EvictionPolicy::SlidingWindow => self.memory_mut().trim_oldest(limit),
        };
        warn!(
            session = %self.id(),
            chars,
            limit,
            removed,
            policy = ?policy,
            "Context limit exceeded, evicted memory"
        );
    }

    async fn pause(&self, cancel: &CancellationToken) -> Result<()> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Error::Cancelled),
            _ = tokio::time::sleep(self.config().loop_interval()) => Ok(()),
        }
    }

    fn enter(&mut self, phase: TurnPhase) {
        debug!(session = %self.id(), from = %self.phase(), to = %phase, "Phase change");
        self.set_phase(phase);
    }
}
