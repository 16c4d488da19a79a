//! Sessions and the turn loop for Doppel agents.
//!
//! An [`Agent`] is the shared base: persona, skills, model client and vector
//! store. An [`AgentDouble`] is one conversation on top of it, with its own
//! persona, higher-priority skills and memory. Each turn:
//!
//! 1. **Generate**: stream the model's answer to the caller
//! 2. **Review**: optionally ask a supervisor model to veto incoherent text
//! 3. **Dispatch**: run every `<tool>` invocation in the answer, folding
//!    results back into memory
//! 4. **Checkpoint**: hand the session to an optional hook
//! 5. **Evict**: shrink memory when it outgrows its budget
//!
//! In loop mode the session keeps taking turns until the model emits
//! `<loop_end/>`, repeats itself, or the caller cancels.

pub mod agent;
pub mod checkpoint;
pub mod dispatch;
pub mod double;
pub mod loop_runner;
pub mod prompt;
pub mod supervisor;

#[cfg(test)]
mod test_helpers;

pub use agent::{Agent, Persona, StreamCallback};
pub use checkpoint::Checkpoint;
pub use dispatch::DispatchReport;
pub use double::{AgentDouble, SessionSpec};
pub use loop_runner::{RunSummary, StopReason, TurnPhase};
