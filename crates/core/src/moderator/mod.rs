//! # Moderator
//!
//! Judges a round's contributions against the task criteria.
//!
//! - `RuleModerator` - fixed, reproducible approval rules
//! - `AgentModerator` - asks an agent and parses its answer
//!
//! Moderators only read their arguments. Recording the verdict is the
//! orchestrator's job.

pub mod agent_backed;
pub mod rule;

pub use agent_backed::{parse_verdict, AgentModerator};
pub use rule::{ApprovalRule, RuleModerator};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::agents::{build_agent, AgentBackend, AgentRole};
use crate::error::ModerationError;
use crate::history::{Contribution, Verdict};

/// All contributions of one round.
#[derive(Debug, Clone, PartialEq)]
pub struct Round {
    pub number: u32,
    pub contributions: Vec<Contribution>,
}

impl Round {
    pub fn new(number: u32, contributions: Vec<Contribution>) -> Self {
        Self {
            number,
            contributions,
        }
    }
}

#[async_trait]
pub trait Moderator: Send + Sync {
    async fn evaluate(&self, round: &Round, criteria: &str) -> Result<Verdict, ModerationError>;
}

/// How a run's moderator is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModeratorConfig {
    /// Deterministic rule, independent of the agent backend
    Rule { rule: ApprovalRule },
    /// Moderator-role agent on the run's agent backend
    Agent,
}

impl Default for ModeratorConfig {
    fn default() -> Self {
        ModeratorConfig::Agent
    }
}

pub fn build_moderator(config: &ModeratorConfig, backend: &AgentBackend) -> Arc<dyn Moderator> {
    match config {
        ModeratorConfig::Rule { rule } => Arc::new(RuleModerator::new(rule.clone())),
        ModeratorConfig::Agent => Arc::new(AgentModerator::new(build_agent(
            AgentRole::Moderator,
            backend,
        ))),
    }
}
