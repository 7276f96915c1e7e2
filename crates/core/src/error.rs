//! # Error Taxonomy
//!
//! Typed failures for every boundary the orchestrator talks to.
//!
//! ```text
//! AgentGenerationError ──┐
//!                        ├─ retried by the orchestrator ─→ OrchestratorError::RetriesExhausted
//! ModerationError ───────┘
//! ToolError ─────────────── recorded per action item, never fatal
//! HistoryError ──────────── fatal (nothing can be recorded afterwards)
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure of an agent's `generate` call. Every kind is retryable.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AgentGenerationError {
    #[error("agent timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },

    #[error("agent was rate limited: {reason}")]
    RateLimited { reason: String },

    #[error("agent returned an invalid response: {reason}")]
    InvalidResponse { reason: String },
}

impl AgentGenerationError {
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidResponse {
            reason: reason.into(),
        }
    }
}

/// Failure of a moderator's `evaluate` call.
///
/// Adjacently tagged: the wrapped `AgentGenerationError` carries its own `kind`.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "error", rename_all = "snake_case")]
pub enum ModerationError {
    /// The evaluator answered, but not in a shape that reads as a verdict.
    #[error("could not parse verdict from moderator response: {raw:?}")]
    ParseFailure { raw: String },

    /// The agent behind a model-backed moderator failed.
    #[error("moderator agent failed: {0}")]
    Agent(AgentGenerationError),
}

impl From<AgentGenerationError> for ModerationError {
    fn from(err: AgentGenerationError) -> Self {
        Self::Agent(err)
    }
}

/// Failure of a single tool invocation.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ToolError {
    #[error("tool '{name}' is not registered")]
    NotFound { name: String },

    #[error("invalid parameter '{field}': {reason}")]
    InvalidParams { field: String, reason: String },

    #[error("tool execution failed: {reason}")]
    ExecutionFailure { reason: String },
}

impl ToolError {
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidParams {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self::ExecutionFailure {
            reason: reason.into(),
        }
    }
}

/// Failure of the append-only history store.
#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("history storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("history serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("history store lock poisoned: {0}")]
    Lock(String),

    #[error("history record is corrupt: {0}")]
    Corrupt(String),
}

/// Which step of a run exhausted its retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStep {
    Draft,
    Review,
    Extraction,
}

impl std::fmt::Display for RunStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStep::Draft => write!(f, "draft"),
            RunStep::Review => write!(f, "review"),
            RunStep::Extraction => write!(f, "extraction"),
        }
    }
}

/// The last error seen by a retried step.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StepError {
    #[error(transparent)]
    Agent(#[from] AgentGenerationError),

    #[error(transparent)]
    Moderation(#[from] ModerationError),
}

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("{step} step of round {round} failed after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        step: RunStep,
        round: u32,
        attempts: u32,
        #[source]
        last_error: StepError,
    },

    #[error("invalid task: {0}")]
    InvalidTask(String),

    #[error(transparent)]
    History(#[from] HistoryError),
}

/// Failure loading or validating a run configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to access config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid config field '{field}': {reason}")]
    Invalid { field: String, reason: String },
}

impl ConfigError {
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.into(),
            reason: reason.into(),
        }
    }
}
