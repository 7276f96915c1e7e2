//! # Run Events
//!
//! Progress notifications streamed while a task runs. Advisory only: the
//! history log is the authoritative record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of run event
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunEventKind {
    RunStarted,
    RoundStarted,
    ContributionRecorded,
    VerdictRecorded,
    /// A failed call will be attempted again after a delay
    RetryScheduled,
    ActionItemsExtracted,
    ToolInvoked,
    RunFinished,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunEvent {
    pub timestamp: DateTime<Utc>,
    pub kind: RunEventKind,
    pub scenario: String,
    #[serde(default)]
    pub round: Option<u32>,
    /// Agent or tool the event is about
    #[serde(default)]
    pub actor: Option<String>,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

impl RunEvent {
    pub fn new(kind: RunEventKind, scenario: &str) -> Self {
        Self {
            timestamp: Utc::now(),
            kind,
            scenario: scenario.to_string(),
            round: None,
            actor: None,
            data: None,
        }
    }

    pub fn with_round(mut self, round: u32) -> Self {
        self.round = Some(round);
        self
    }

    pub fn with_actor(mut self, actor: &str) -> Self {
        self.actor = Some(actor.to_string());
        self
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }
}
