//! # Task State Machine
//!
//! ```text
//! Drafting → Reviewing ─┬─ approved ───────────→ Converged
//!    ↑                  ├─ round == max_rounds → Exhausted
//!    └──── Revising ←───┘
//!
//! any non-terminal state ── fail() ──→ Failed
//! ```

use serde::{Deserialize, Serialize};

use crate::error::OrchestratorError;

/// Position of a task in the refinement loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowState {
    /// Agents are producing the round's contributions
    Drafting,
    /// Moderator is judging the round
    Reviewing,
    /// Round rejected, feedback pending for the next round
    Revising,
    Converged,
    Exhausted,
    Failed,
}

impl WorkflowState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            WorkflowState::Converged | WorkflowState::Exhausted | WorkflowState::Failed
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    InProgress,
    Converged,
    Exhausted,
    Failed,
}

impl From<WorkflowState> for TaskStatus {
    fn from(state: WorkflowState) -> Self {
        match state {
            WorkflowState::Drafting | WorkflowState::Reviewing | WorkflowState::Revising => {
                TaskStatus::InProgress
            }
            WorkflowState::Converged => TaskStatus::Converged,
            WorkflowState::Exhausted => TaskStatus::Exhausted,
            WorkflowState::Failed => TaskStatus::Failed,
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::InProgress => write!(f, "in progress"),
            TaskStatus::Converged => write!(f, "converged"),
            TaskStatus::Exhausted => write!(f, "exhausted"),
            TaskStatus::Failed => write!(f, "failed"),
        }
    }
}

/// One bounded refinement run. Only the orchestrator mutates it.
#[derive(Debug, Clone)]
pub struct Task {
    scenario: String,
    goal: String,
    criteria: Option<String>,
    max_rounds: u32,
    tools: Vec<String>,
    round: u32,
    state: WorkflowState,
}

impl Task {
    pub fn new(
        scenario: impl Into<String>,
        goal: impl Into<String>,
        max_rounds: u32,
    ) -> Result<Self, OrchestratorError> {
        let scenario = scenario.into();
        if scenario.trim().is_empty() {
            return Err(OrchestratorError::InvalidTask(
                "scenario must not be empty".to_string(),
            ));
        }
        if max_rounds == 0 {
            return Err(OrchestratorError::InvalidTask(
                "max_rounds must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            scenario,
            goal: goal.into(),
            criteria: None,
            max_rounds,
            tools: Vec::new(),
            round: 1,
            state: WorkflowState::Drafting,
        })
    }

    pub fn with_criteria(mut self, criteria: impl Into<String>) -> Self {
        self.criteria = Some(criteria.into());
        self
    }

    pub fn with_tools<I, S>(mut self, tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tools = tools.into_iter().map(Into::into).collect();
        self
    }

    pub fn scenario(&self) -> &str {
        &self.scenario
    }

    pub fn goal(&self) -> &str {
        &self.goal
    }

    /// Criteria the moderator judges against; the goal when unset
    pub fn criteria(&self) -> &str {
        self.criteria.as_deref().unwrap_or(&self.goal)
    }

    pub fn max_rounds(&self) -> u32 {
        self.max_rounds
    }

    pub fn tools(&self) -> &[String] {
        &self.tools
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn state(&self) -> WorkflowState {
        self.state
    }

    pub fn status(&self) -> TaskStatus {
        self.state.into()
    }

    /// Drafting → Reviewing
    pub fn begin_review(&mut self) -> bool {
        if self.state != WorkflowState::Drafting {
            return false;
        }
        self.state = WorkflowState::Reviewing;
        true
    }

    /// Apply the round's verdict. Returns the new state.
    pub fn record_verdict(&mut self, approved: bool) -> WorkflowState {
        if self.state != WorkflowState::Reviewing {
            return self.state;
        }
        self.state = if approved {
            WorkflowState::Converged
        } else if self.round >= self.max_rounds {
            WorkflowState::Exhausted
        } else {
            WorkflowState::Revising
        };
        self.state
    }

    /// Revising → Drafting of the next round
    pub fn next_round(&mut self) -> bool {
        if self.state != WorkflowState::Revising {
            return false;
        }
        self.round += 1;
        self.state = WorkflowState::Drafting;
        true
    }

    /// Abort the task. No effect once terminal.
    pub fn fail(&mut self) -> bool {
        if self.state.is_terminal() {
            return false;
        }
        self.state = WorkflowState::Failed;
        true
    }
}
