//! System prompt assembly.
//!
//! Every session reset writes the same ordered block of `system` entries at
//! the head of memory: personas, retrieval disclosures, skill catalogues and,
//! in loop mode, the loop instruction.

use doppel_config::{RetrievalConfig, RunMode};
use doppel_core::skill::SkillRegistry;

use crate::agent::Persona;

const PROTOCOL_INSTRUCTIONS: &str = r#"
When answering questions, if you need to call external tools or resources, please return the function call in JSON format embedded within your response. The JSON should strictly follow this structure:
<tool>{
  "function": "function_name",
  "context": {
    "parameter1": "value1",
    "parameter2": "value2"
  },
  "abort_on_error": true
}
</tool>
The value of context might be JSON object or other data structure strictly according to the payload definition of specific function.
For example, if you need to call a 'search' function to look up information about the weather in New York, you should include this JSON in your response:
<tool>
{
  "function": "search",
  "context": {
    "query": "weather in New York"
  },
  "abort_on_error": true
}
</tool>
Here is a list of supported functions (might also be called as skill or tool) you can call when needed:
"#;

const SESSION_HEADER: &str = "\nHere is a list of supported high priority functions (might also be called as skill or tool) you can call when needed:\n";

pub const LOOP_INSTRUCTION: &str = "Determine if the conversation should continue strictly. If not, include strictly <loop_end/> in your response. If you find too may duplicate content, please exit immediately.";

/// Everything the system block is built from.
pub struct PromptSources<'a> {
    pub base_persona: &'a Persona,
    pub session_persona: &'a Persona,
    pub retrieval: Option<&'a RetrievalConfig>,
    pub base_skills: &'a SkillRegistry,
    pub session_skills: &'a SkillRegistry,
    pub mode: RunMode,
}

/// The system entries, in injection order.
pub fn assemble(sources: &PromptSources<'_>) -> Vec<String> {
    let mut block = vec![sources.base_persona.prompt(), sources.session_persona.prompt()];

    if let Some(retrieval) = sources.retrieval {
        block.push(embedding_disclosure(&retrieval.embedding_model));
        block.push(collection_disclosure(&retrieval.collection));
    }
    if !sources.base_skills.is_empty() {
        block.push(base_catalogue(sources.base_skills));
    }
    if !sources.session_skills.is_empty() {
        block.push(session_catalogue(sources.session_skills));
    }
    if sources.mode == RunMode::Loop {
        block.push(LOOP_INSTRUCTION.to_string());
    }

    block
}

pub fn embedding_disclosure(model: &str) -> String {
    format!("The embedding model currently in use by the agent is: [{model}].")
}

pub fn collection_disclosure(collection: &str) -> String {
    format!("The vector collection currently in use by the agent is: [{collection}].")
}

/// Protocol instructions plus the base registry's skill list.
pub fn base_catalogue(skills: &SkillRegistry) -> String {
    format!("{PROTOCOL_INSTRUCTIONS}{}\n", skill_list(skills))
}

/// The session registry's skill list under the high-priority header.
pub fn session_catalogue(skills: &SkillRegistry) -> String {
    format!("{SESSION_HEADER}{}\n", skill_list(skills))
}

fn skill_list(skills: &SkillRegistry) -> String {
    skills
        .catalogue()
        .into_iter()
        .map(|(name, description)| format!("{name}: {description}"))
        .collect::<Vec<_>>()
        .join("\n\n")
}
