//! Sleep skill: pause the agent for a while.

use std::time::Duration;

use async_trait::async_trait;
use doppel_core::error::SkillError;
use doppel_core::skill::{OutputSink, SkillContext, TypedSkill};
use serde::Deserialize;
use tracing::debug;

#[derive(Debug, Deserialize)]
pub struct SleepArgs {
    /// e.g. `"500ms"`, `"2s"`, `"1h30m"`
    pub duration: String,
}

/// Waits for the requested duration. Produces no output.
pub struct SleepSkill;

#[async_trait]
impl TypedSkill for SleepSkill {
    type Args = SleepArgs;

    fn description(&self) -> String {
        "Pause before continuing. Context: {\"duration\": \"<number><unit>\"} where unit is ms, s, m or h, \
         and parts may be combined (e.g. \"1m30s\")."
            .into()
    }

    async fn run(
        &self,
        ctx: &SkillContext,
        args: SleepArgs,
        _sink: &mut OutputSink<'_>,
    ) -> Result<(), SkillError> {
        let duration = parse_duration(&args.duration)
            .map_err(|e| SkillError::InvalidArguments(format!("{}: {e}", ctx.name)))?;
        debug!(skill = %ctx.name, ?duration, "Sleeping");

        tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => Err(SkillError::Cancelled),
            _ = tokio::time::sleep(duration) => Ok(()),
        }
    }
}

/// Parse a sequence of `<number><unit>` parts. Numbers may be fractional.
pub fn parse_duration(input: &str) -> Result<Duration, String> {
    let input = input.trim();
    if input.is_empty() {
        return Err("empty duration".into());
    }
    if input == "0" {
        return Ok(Duration::ZERO);
    }

    let mut total = 0f64;
    let mut rest = input;
    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .ok_or_else(|| format!("missing unit in duration '{input}'"))?;
        if number_len == 0 {
            return Err(format!("invalid duration '{input}'"));
        }
        let value: f64 = rest[..number_len]
            .parse()
            .map_err(|_| format!("invalid number in duration '{input}'"))?;
        rest = &rest[number_len..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let seconds = match &rest[..unit_len] {
            "ms" => 0.001,
            "s" => 1.0,
            "m" => 60.0,
            "h" => 3600.0,
            unit => return Err(format!("unknown unit '{unit}' in duration '{input}'")),
        };
        rest = &rest[unit_len..];
        total += value * seconds;
    }

    Duration::try_from_secs_f64(total).map_err(|e| format!("duration '{input}' out of range: {e}"))
}
