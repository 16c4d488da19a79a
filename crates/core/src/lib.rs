//! # Doppel Core
//!
//! Domain types, traits, and error definitions for the Doppel agent runtime.
//! Nothing in here talks to a network: the model client, the vector store and
//! the skills are traits that other crates (or the host) implement.
//!
//! ## Layout
//!
//! - [`memory`]: the ordered conversation log a session sends to the model
//! - [`protocol`]: extraction of `<tool>` invocations and the loop-end marker
//! - [`skill`]: the skill contract, registries and two-tier resolution
//! - [`model`] / [`vector`]: collaborator contracts

pub mod error;
pub mod memory;
pub mod message;
pub mod model;
pub mod protocol;
pub mod skill;
pub mod vector;

// Re-export key types at crate root for ergonomics
pub use error::{BoxError, Error, ModelError, ProtocolError, Result, SkillError, VectorStoreError};
pub use memory::Memory;
pub use message::{ChatMessage, Entry, Role};
pub use model::{ChatRequest, ChunkReceiver, EmbeddingRequest, EmbeddingResponse, ModelClient, SamplingOptions, StreamChunk};
pub use protocol::{LOOP_END_MARKER, ToolInvocation, detect_loop_end, parse_tool_calls};
pub use skill::{OutputSink, Skill, SkillContext, SkillRegistry, Typed, TypedSkill, render_output, resolve};
pub use vector::VectorStore;
