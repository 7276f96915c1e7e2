//! # Agent Capability
//!
//! Uniform text-generation contract for every agent in a run.
//!
//! ## Variants
//!
//! - `ScriptedAgent` - deterministic fixtures and rule-based role behaviour
//!   (tests, offline demos)
//! - `LiveAgent` - radkit LLM function against a configured provider
//!
//! The variant is picked from `AgentBackend` in the run configuration.

pub mod live;
pub mod llm_helpers;
pub mod prompts;
pub mod roles;
pub mod scripted;

pub use live::LiveAgent;
pub use roles::AgentRole;
pub use scripted::ScriptedAgent;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::AgentGenerationError;
use crate::history::Contribution;
use crate::models::ModelConfig;

/// Everything an agent may see besides its prompt.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentContext {
    /// Round being drafted, starting at 1
    pub round: u32,
    /// Moderator feedback from earlier rounds, oldest first
    pub feedback: Vec<String>,
    /// Contributions recorded so far in this run
    pub board: Vec<Contribution>,
}

impl AgentContext {
    pub fn new(round: u32) -> Self {
        Self {
            round,
            ..Self::default()
        }
    }

    pub fn with_feedback(mut self, feedback: Vec<String>) -> Self {
        self.feedback = feedback;
        self
    }

    pub fn with_board(mut self, board: Vec<Contribution>) -> Self {
        self.board = board;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.board.is_empty() && self.feedback.is_empty()
    }

    pub fn board_text(&self) -> String {
        if self.board.is_empty() {
            return "(empty)".to_string();
        }
        self.board
            .iter()
            .map(|c| {
                format!(
                    "--- Contribution from {} (round {}) ---\n{}",
                    c.agent, c.round, c.content
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Board plus moderator feedback, as handed to a model.
    pub fn render(&self) -> String {
        if self.feedback.is_empty() {
            return self.board_text();
        }
        let feedback = self
            .feedback
            .iter()
            .enumerate()
            .map(|(i, f)| format!("- round {}: {}", i + 1, f))
            .collect::<Vec<_>>()
            .join("\n");
        format!("{}\n\nModerator feedback:\n{}", self.board_text(), feedback)
    }
}

#[async_trait]
pub trait AgentCapability: Send + Sync {
    async fn generate(
        &self,
        prompt: &str,
        context: &AgentContext,
    ) -> Result<String, AgentGenerationError>;
}

/// An agent paired with the identifier its contributions are recorded under.
#[derive(Clone)]
pub struct Participant {
    pub id: String,
    pub agent: Arc<dyn AgentCapability>,
}

impl Participant {
    pub fn new(id: impl Into<String>, agent: Arc<dyn AgentCapability>) -> Self {
        Self {
            id: id.into(),
            agent,
        }
    }

    pub fn for_role(role: AgentRole, backend: &AgentBackend) -> Self {
        Self::new(role.id(), build_agent(role, backend))
    }
}

impl std::fmt::Debug for Participant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Participant").field("id", &self.id).finish()
    }
}

/// Which implementation backs the agents of a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AgentBackend {
    #[default]
    Scripted,
    Live(ModelConfig),
}

pub fn build_agent(role: AgentRole, backend: &AgentBackend) -> Arc<dyn AgentCapability> {
    match backend {
        AgentBackend::Scripted => Arc::new(ScriptedAgent::for_role(role)),
        AgentBackend::Live(config) => Arc::new(LiveAgent::new(role, config.clone())),
    }
}
