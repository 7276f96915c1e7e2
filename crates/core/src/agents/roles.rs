use serde::{Deserialize, Serialize};

use super::prompts;

/// The specialized roles an agent can play.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    Research,
    Creative,
    Analysis,
    Moderator,
    TranscriptSummarizer,
    ActionItemExtractor,
}

impl AgentRole {
    /// Identifier written into contributions
    pub fn id(&self) -> &'static str {
        match self {
            AgentRole::Research => "ResearchBot",
            AgentRole::Creative => "CreativeBot",
            AgentRole::Analysis => "AnalysisBot",
            AgentRole::Moderator => "Moderator",
            AgentRole::TranscriptSummarizer => "TranscriptSummarizer",
            AgentRole::ActionItemExtractor => "ActionItemExtractor",
        }
    }

    pub fn system_prompt(&self) -> &'static str {
        match self {
            AgentRole::Research => prompts::RESEARCH,
            AgentRole::Creative => prompts::CREATIVE,
            AgentRole::Analysis => prompts::ANALYSIS,
            AgentRole::Moderator => prompts::MODERATOR,
            AgentRole::TranscriptSummarizer => prompts::TRANSCRIPT_SUMMARIZER,
            AgentRole::ActionItemExtractor => prompts::ACTION_ITEM_EXTRACTOR,
        }
    }

    /// Default drafting roster for research collaboration
    pub fn research_roster() -> Vec<AgentRole> {
        vec![AgentRole::Research, AgentRole::Creative, AgentRole::Analysis]
    }
}

impl std::fmt::Display for AgentRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}
