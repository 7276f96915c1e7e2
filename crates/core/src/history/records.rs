//! Record types written to the history log.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ToolError;

/// Text produced by one agent in one round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contribution {
    pub round: u32,
    /// Producing agent (e.g. "ResearchBot")
    pub agent: String,
    pub content: String,
    /// Position within the round, 0-based
    pub index: u32,
}

/// The moderator's decision for one round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub round: u32,
    pub approved: bool,
    pub feedback: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
}

impl Verdict {
    pub fn approve(round: u32, feedback: impl Into<String>) -> Self {
        Self {
            round,
            approved: true,
            feedback: feedback.into(),
            score: None,
        }
    }

    pub fn reject(round: u32, feedback: impl Into<String>) -> Self {
        Self {
            round,
            approved: false,
            feedback: feedback.into(),
            score: None,
        }
    }

    pub fn with_score(mut self, score: f32) -> Self {
        self.score = Some(score.clamp(0.0, 1.0));
        self
    }
}

/// One dispatched action item and its outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Position of the action item in the extracted plan, 0-based
    pub index: u32,
    pub tool: String,
    pub params: Map<String, Value>,
    #[serde(default)]
    pub result: Option<Value>,
    pub success: bool,
    #[serde(default)]
    pub error: Option<ToolError>,
}

impl ToolCall {
    pub fn succeeded(index: u32, tool: &str, params: Map<String, Value>, result: Value) -> Self {
        Self {
            index,
            tool: tool.to_string(),
            params,
            result: Some(result),
            success: true,
            error: None,
        }
    }

    pub fn failed(index: u32, tool: &str, params: Map<String, Value>, error: ToolError) -> Self {
        Self {
            index,
            tool: tool.to_string(),
            params,
            result: None,
            success: false,
            error: Some(error),
        }
    }
}

/// Payload of a history record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HistoryEntry {
    Contribution(Contribution),
    Verdict(Verdict),
    ToolCall(ToolCall),
}

impl HistoryEntry {
    pub fn kind(&self) -> &'static str {
        match self {
            HistoryEntry::Contribution(_) => "contribution",
            HistoryEntry::Verdict(_) => "verdict",
            HistoryEntry::ToolCall(_) => "tool_call",
        }
    }

    /// Round the entry belongs to. Tool calls run after the last round.
    pub fn round(&self) -> Option<u32> {
        match self {
            HistoryEntry::Contribution(c) => Some(c.round),
            HistoryEntry::Verdict(v) => Some(v.round),
            HistoryEntry::ToolCall(_) => None,
        }
    }
}

impl From<Contribution> for HistoryEntry {
    fn from(c: Contribution) -> Self {
        HistoryEntry::Contribution(c)
    }
}

impl From<Verdict> for HistoryEntry {
    fn from(v: Verdict) -> Self {
        HistoryEntry::Verdict(v)
    }
}

impl From<ToolCall> for HistoryEntry {
    fn from(t: ToolCall) -> Self {
        HistoryEntry::ToolCall(t)
    }
}

/// An entry as stored: scenario plus its position in the scenario's log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub scenario: String,
    /// Starts at 1, strictly increasing per scenario
    pub sequence: u64,
    pub entry: HistoryEntry,
}
