//! Model-backed moderation.
//!
//! Response grammar (case-insensitive prefix, leading whitespace ignored):
//!
//! ```text
//! CONCLUSION: <final report>         → approved
//! NEXT_STEP: <revision instructions> → rejected
//! {"approved": bool, "feedback": "...", "score": 0.7}
//! ```
//!
//! Prefixed answers may carry a `SCORE: <0..1>` line.

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use std::sync::{Arc, LazyLock};

use super::{Moderator, Round};
use crate::agents::{prompts, AgentCapability, AgentContext};
use crate::error::ModerationError;
use crate::history::Verdict;

static SCORE_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?im)^\s*score\s*[:=]\s*(-?[0-9]*\.?[0-9]+)\s*$").unwrap());

pub struct AgentModerator {
    agent: Arc<dyn AgentCapability>,
}

impl AgentModerator {
    pub fn new(agent: Arc<dyn AgentCapability>) -> Self {
        Self { agent }
    }
}

#[async_trait]
impl Moderator for AgentModerator {
    async fn evaluate(&self, round: &Round, criteria: &str) -> Result<Verdict, ModerationError> {
        let context = AgentContext::new(round.number).with_board(round.contributions.clone());
        let prompt = prompts::evaluation_prompt(criteria, round.number);

        let raw = self.agent.generate(&prompt, &context).await?;
        parse_verdict(round.number, &raw)
    }
}

#[derive(Deserialize)]
struct VerdictPayload {
    approved: bool,
    #[serde(default)]
    feedback: String,
    #[serde(default)]
    score: Option<f32>,
}

/// Interpret a moderator response as the verdict for `round`.
pub fn parse_verdict(round: u32, raw: &str) -> Result<Verdict, ModerationError> {
    let text = raw.trim();

    if let Some(rest) = strip_prefix_ignore_case(text, "CONCLUSION:") {
        return Ok(with_score_line(Verdict::approve(round, feedback_text(rest)), rest));
    }
    if let Some(rest) = strip_prefix_ignore_case(text, "NEXT_STEP:") {
        return Ok(with_score_line(Verdict::reject(round, feedback_text(rest)), rest));
    }

    if text.starts_with('{') {
        if let Ok(payload) = serde_json::from_str::<VerdictPayload>(text) {
            let verdict = Verdict {
                round,
                approved: payload.approved,
                feedback: payload.feedback,
                score: None,
            };
            return Ok(match payload.score {
                Some(score) => verdict.with_score(score),
                None => verdict,
            });
        }
    }

    Err(ModerationError::ParseFailure {
        raw: raw.to_string(),
    })
}

fn strip_prefix_ignore_case<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    let head = text.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        Some(&text[prefix.len()..])
    } else {
        None
    }
}

fn feedback_text(rest: &str) -> String {
    SCORE_LINE.replace_all(rest, "").trim().to_string()
}

fn with_score_line(verdict: Verdict, rest: &str) -> Verdict {
    let score = SCORE_LINE
        .captures(rest)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<f32>().ok());
    match score {
        Some(score) => verdict.with_score(score),
        None => verdict,
    }
}
