//! Team skill: hand a message to another session and relay its answer.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use doppel_agent::{Agent, AgentDouble};
use doppel_core::error::{BoxError, Error, SkillError};
use doppel_core::skill::{OutputSink, SkillContext, TypedSkill};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::Mutex;
use tracing::debug;

const TEAM_DESCRIPTION: &str = r#"
The "team" skill represents a collaborative group of AI agents, each with specialized roles and capabilities. This enables complex problem-solving through coordinated interactions among team members.
1. Team Members
{members}
Each member is designed to contribute unique expertise to the team's collective intelligence.
2. Invocation Context
To activate the "team" skill, use the following JSON format:
{
  "member": "[specific member name]",
  "message": "[message or task description for the member]"
}
member: Specifies which team member should handle the task.
message: Contains the detailed request, question, or instruction for the designated member.
"#;

#[derive(Debug, Deserialize)]
pub struct TeamArgs {
    pub member: String,
    pub message: String,
}

struct Member {
    agent: Arc<Agent>,
    session: Arc<Mutex<AgentDouble>>,
}

/// Named sessions the agent can delegate to. Each member's streamed answer
/// is reported chunk by chunk.
#[derive(Default)]
pub struct TeamSkill {
    members: BTreeMap<String, Member>,
}

impl TeamSkill {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_member(mut self, name: impl Into<String>, session: AgentDouble) -> Self {
        let agent = session.agent().clone();
        let session = Arc::new(Mutex::new(session));
        self.members.insert(name.into(), Member { agent, session });
        self
    }

    pub fn members(&self) -> Vec<&str> {
        self.members.keys().map(String::as_str).collect()
    }

    /// Shared handle to a member's session, e.g. to inspect its memory.
    pub fn session(&self, name: &str) -> Option<Arc<Mutex<AgentDouble>>> {
        self.members.get(name).map(|m| m.session.clone())
    }
}

#[async_trait]
impl TypedSkill for TeamSkill {
    type Args = TeamArgs;

    fn description(&self) -> String {
        let members = self
            .members
            .iter()
            .map(|(name, member)| format!("{name}:\n{}", member.agent.description()))
            .collect::<Vec<_>>()
            .join("\n\n");
        TEAM_DESCRIPTION.replace("{members}", &members)
    }

    async fn run(
        &self,
        ctx: &SkillContext,
        args: TeamArgs,
        sink: &mut OutputSink<'_>,
    ) -> Result<(), SkillError> {
        let member = self
            .members
            .get(&args.member)
            .ok_or_else(|| SkillError::failed(&ctx.name, format!("not found member [{}]", args.member)))?;
        debug!(skill = %ctx.name, member = %args.member, "Delegating to team member");

        let mut session = member.session.lock().await;
        let mut relay = |chunk: &str| sink(json!(chunk)).map_err(|e| Box::new(e) as BoxError);
        session
            .listen_and_watch(&ctx.cancel, &args.message, Vec::new(), &mut relay)
            .await
            .map(|_| ())
            .map_err(|e| match e {
                Error::Cancelled => SkillError::Cancelled,
                Error::Callback(_) => SkillError::Aborted,
                other => SkillError::failed(&ctx.name, other),
            })
    }
}
