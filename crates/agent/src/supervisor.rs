//! Supervisor gate: a second model call that vetoes incoherent answers.

use doppel_core::error::{BoxError, Error, Result};
use doppel_core::message::ChatMessage;
use doppel_core::model::{ChatRequest, SamplingOptions};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::agent::Agent;

const REVIEW_PROMPT: &str = "Analyze the logical coherence of the following content.
If there are logical problems such as contradictions, unreasonable causal relationships, or incomplete reasoning, output 'true';
if there are no logical problems, output 'false'.
Content to be analyzed:
";

/// The single system message sent to the supervisor model.
pub fn review_prompt(candidate: &str) -> String {
    format!("{REVIEW_PROMPT}{candidate}")
}

/// Only an explicit `false` ("no logical problems") lets a candidate through.
pub fn verdict_accepts(verdict: &str) -> bool {
    verdict.trim() == "false"
}

impl Agent {
    /// Ask `model` whether `candidate` has logical problems.
    pub(crate) async fn review(
        &self,
        model: &str,
        options: SamplingOptions,
        candidate: &str,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let request = ChatRequest {
            model: model.to_string(),
            messages: vec![ChatMessage::system(review_prompt(candidate))],
            options,
        };
        let mut discard = |_: &str| Ok::<(), BoxError>(());
        let verdict = self.stream_completion(request, cancel, &mut discard).await?;

        if verdict_accepts(&verdict) {
            debug!(model, "Supervisor accepted response");
            Ok(())
        } else {
            warn!(model, verdict = %verdict.trim(), "Supervisor rejected response");
            Err(Error::SupervisorRejected { verdict })
        }
    }
}
