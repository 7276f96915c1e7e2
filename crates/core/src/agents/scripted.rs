//! # Scripted Agent
//!
//! Deterministic agent for tests and offline runs. Identical
//! `(prompt, context)` always yields identical output.

use async_trait::async_trait;
use serde_json::json;

use super::{AgentCapability, AgentContext, AgentRole};
use crate::error::AgentGenerationError;

const SLOT_MINUTES: u64 = 45;

#[derive(Debug, Clone)]
enum Script {
    Fixed(String),
    PerRound(Vec<String>),
    Role(AgentRole),
    Fail(AgentGenerationError),
}

#[derive(Debug, Clone)]
pub struct ScriptedAgent {
    script: Script,
}

impl ScriptedAgent {
    /// Same text on every call
    pub fn fixed(text: impl Into<String>) -> Self {
        Self {
            script: Script::Fixed(text.into()),
        }
    }

    /// Entry `r - 1` for round `r`; the last entry repeats
    pub fn per_round<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            script: Script::PerRound(texts.into_iter().map(Into::into).collect()),
        }
    }

    /// Rule-based behaviour of a role
    pub fn for_role(role: AgentRole) -> Self {
        Self {
            script: Script::Role(role),
        }
    }

    /// Fails every call with the given error
    pub fn failing(error: AgentGenerationError) -> Self {
        Self {
            script: Script::Fail(error),
        }
    }
}

#[async_trait]
impl AgentCapability for ScriptedAgent {
    async fn generate(
        &self,
        prompt: &str,
        context: &AgentContext,
    ) -> Result<String, AgentGenerationError> {
        match &self.script {
            Script::Fixed(text) => Ok(text.clone()),
            Script::PerRound(texts) => {
                let idx = (context.round.max(1) as usize - 1).min(texts.len().saturating_sub(1));
                texts
                    .get(idx)
                    .cloned()
                    .ok_or_else(|| AgentGenerationError::invalid("empty round script"))
            }
            Script::Role(role) => Ok(role_response(*role, prompt, context)),
            Script::Fail(error) => Err(error.clone()),
        }
    }
}

fn role_response(role: AgentRole, prompt: &str, context: &AgentContext) -> String {
    // Agents react to the board once there is one, to the task before that.
    let subject = if context.board.is_empty() {
        prompt.to_string()
    } else {
        context.board_text()
    };

    match role {
        AgentRole::Research => {
            let task = prompt.to_lowercase();
            if task.contains("capital of france") {
                "Paris is the capital of France, known for the Eiffel Tower.".to_string()
            } else if task.contains("capital of india") {
                "New Delhi".to_string()
            } else {
                format!("(fact guess about: {}...)", preview(prompt, 40))
            }
        }
        AgentRole::Creative => format!("A whimsical story about: {}", preview(&subject, 200)),
        AgentRole::Analysis => format!("Key points from the board: {}", preview(&subject, 60)),
        AgentRole::Moderator => {
            if subject.contains("Paris") || subject.contains("New Delhi") {
                "CONCLUSION: The report is complete.".to_string()
            } else {
                "NEXT_STEP: The research is incomplete.".to_string()
            }
        }
        AgentRole::TranscriptSummarizer => summarize(prompt),
        AgentRole::ActionItemExtractor => extract_actions(&subject),
    }
}

/// First `max` characters, on char boundaries
fn preview(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

const ACTION_WORDS: &[&str] = &["schedule", "finalize", "review", "need", "outstanding"];

/// Keeps the sentences that carry decisions or open items.
fn summarize(text: &str) -> String {
    let body = text
        .split_once("Transcript:")
        .map(|(_, t)| t)
        .unwrap_or(text);

    let sentences: Vec<&str> = body
        .split_inclusive(['.', '!', '?'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();

    let key: Vec<&str> = sentences
        .iter()
        .copied()
        .filter(|s| {
            let lower = s.to_lowercase();
            ACTION_WORDS.iter().any(|w| lower.contains(w))
        })
        .collect();

    let chosen = if key.is_empty() {
        sentences.into_iter().take(1).collect::<Vec<_>>()
    } else {
        key
    };

    format!("Summary: {}", chosen.join(" "))
}

/// Maps scheduling requests on the board to calendar tool calls.
fn extract_actions(board: &str) -> String {
    let lower = board.to_lowercase();
    let wants_meeting = ["schedule", "finalize", "review"]
        .iter()
        .any(|w| lower.contains(w));
    if !wants_meeting {
        return "[]".to_string();
    }

    let title = if lower.contains("budget") {
        "Finalize Q4 Budget"
    } else if lower.contains("report") {
        "Review Detailed Report"
    } else {
        "General Follow-up Meeting"
    };

    let actions = json!([
        {
            "tool": "find_calendar_slot",
            "params": { "duration_minutes": SLOT_MINUTES }
        },
        {
            "tool": "book_calendar_event",
            "params": {
                "title": title,
                "description": format!("Follow-up based on meeting summary: {}", preview(board, 300)),
                "duration_minutes": SLOT_MINUTES
            }
        }
    ]);
    serde_json::to_string_pretty(&actions).unwrap_or_else(|_| "[]".to_string())
}
