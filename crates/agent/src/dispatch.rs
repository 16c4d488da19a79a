//! Tool dispatch: resolving invocations to skills and folding results into memory.

use std::sync::Arc;

use doppel_core::error::{BoxError, Error, Result, SkillError};
use doppel_core::message::Role;
use doppel_core::protocol::ToolInvocation;
use doppel_core::skill::{OutputSink, Skill, SkillContext, render_output, resolve};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::agent::StreamCallback;
use crate::double::AgentDouble;

/// What happened to one parsed batch of tool invocations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub succeeded: usize,
    pub failed: usize,
    /// Invocations never started because an earlier one aborted the batch
    pub skipped: usize,
}

/// Run one skill, racing it against cancellation.
pub(crate) async fn execute(
    skill: &dyn Skill,
    ctx: &SkillContext,
    payload: Value,
    sink: &mut OutputSink<'_>,
) -> std::result::Result<(), SkillError> {
    tokio::select! {
        biased;
        _ = ctx.cancel.cancelled() => Err(SkillError::Cancelled),
        result = skill.execute(ctx, payload, sink) => result,
    }
}

impl AgentDouble {
    /// Look a skill up in the session registry, then the base agent's.
    pub fn resolve_skill(&self, name: &str) -> Option<Arc<dyn Skill>> {
        let base = self.agent().skills();
        resolve(&[self.skills(), &base], name)
    }

    /// Run a skill from either tier once.
    pub async fn dispatch(
        &self,
        ctx: &SkillContext,
        name: &str,
        payload: Value,
        sink: &mut OutputSink<'_>,
    ) -> std::result::Result<(), SkillError> {
        let skill = self
            .resolve_skill(name)
            .ok_or_else(|| SkillError::NotFound(name.to_string()))?;
        execute(skill.as_ref(), ctx, payload, sink).await
    }

    /// Execute a parsed batch in document order, narrating every output,
    /// failure and success into memory and to `on_chunk`.
    ///
    /// Skill failures never fail the batch; an `abort_on_error` invocation
    /// that fails skips the rest of it. Cancellation and callback errors do
    /// end the turn.
    pub(crate) async fn dispatch_batch(
        &mut self,
        cancel: &CancellationToken,
        calls: Vec<ToolInvocation>,
        on_chunk: &mut StreamCallback<'_>,
    ) -> Result<DispatchReport> {
        let mut report = DispatchReport::default();
        let total = calls.len();

        for (index, call) in calls.into_iter().enumerate() {
            let name = call.function.as_str();
            let ctx = SkillContext::new(name, cancel.clone());
            debug!(session = %self.id(), skill = name, "Dispatching tool call");

            let mut rejected: Option<BoxError> = None;
            let outcome = match self.resolve_skill(name) {
                None => Err(SkillError::NotFound(name.to_string())),
                Some(skill) => {
                    let memory = self.memory_mut();
                    let rejected = &mut rejected;
                    let mut sink = |output: Value| {
                        let text = format!("The result of function [{name}]: {}", render_output(&output));
                        memory.append(Role::Tool, text.as_str(), Vec::new());
                        on_chunk(&text).map_err(|e| {
                            *rejected = Some(e);
                            SkillError::Aborted
                        })
                    };
                    execute(skill.as_ref(), &ctx, call.context, &mut sink).await
                }
            };

            if let Some(e) = rejected {
                return Err(Error::Callback(e));
            }

            match outcome {
                Ok(()) => {
                    report.succeeded += 1;
                    self.fold(
                        format!("The function [{name}] has been executed successfully."),
                        on_chunk,
                    )?;
                }
                Err(SkillError::Cancelled) => return Err(Error::Cancelled),
                Err(err) => {
                    report.failed += 1;
                    warn!(session = %self.id(), skill = name, error = %err, "Tool call failed");
                    self.fold(
                        format!("The error [{err}] happened during executing the function [{name}]."),
                        on_chunk,
                    )?;
                    if call.abort_on_error {
                        report.skipped = total - index - 1;
                        break;
                    }
                }
            }
        }

        Ok(report)
    }

    fn fold(&mut self, text: String, on_chunk: &mut StreamCallback<'_>) -> Result<()> {
        self.memory_mut().append(Role::Tool, text.as_str(), Vec::new());
        on_chunk(&text).map_err(Error::Callback)
    }
}
