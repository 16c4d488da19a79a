//! Post-turn hook.

use async_trait::async_trait;
use doppel_core::error::BoxError;

use crate::double::AgentDouble;

/// Runs after a turn's tool calls have been dispatched, before eviction.
///
/// The hook sees the session read-only; an error ends the run with
/// [`doppel_core::Error::Checkpoint`].
#[async_trait]
pub trait Checkpoint: Send + Sync {
    async fn run(&self, session: &AgentDouble) -> Result<(), BoxError>;
}
