//! # Run Configuration
//!
//! JSON description of one task plus the collaborators that run it.
//! Stored at `.roundtable/config.json` by default.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::agents::{AgentBackend, AgentRole};
use crate::error::ConfigError;
use crate::moderator::ModeratorConfig;
use crate::orchestration::{RetryPolicy, Task};

pub const DEFAULT_CONFIG_PATH: &str = ".roundtable/config.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// History stream the run appends to
    pub scenario: String,
    pub goal: String,
    /// Moderation criteria; the goal when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub criteria: Option<String>,
    pub max_rounds: u32,
    /// Tools the tool workflow may dispatch
    pub tools: Vec<String>,
    /// Drafting agents, in speaking order
    pub roster: Vec<AgentRole>,
    /// Action item extractor; enables the tool workflow
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extractor: Option<AgentRole>,
    pub backend: AgentBackend,
    pub moderator: ModeratorConfig,
    pub retry: RetryPolicy,
    pub call_timeout_secs: u64,
    /// SQLite history file; in-memory history when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history_path: Option<PathBuf>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            scenario: "research".to_string(),
            goal: "What is the capital of France?".to_string(),
            criteria: None,
            max_rounds: 3,
            tools: Vec::new(),
            roster: AgentRole::research_roster(),
            extractor: None,
            backend: AgentBackend::Scripted,
            moderator: ModeratorConfig::Agent,
            retry: RetryPolicy::default(),
            call_timeout_secs: 60,
            history_path: None,
        }
    }
}

/// Command-line overrides applied on top of a loaded config.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub scenario: Option<String>,
    pub goal: Option<String>,
    pub max_rounds: Option<u32>,
    pub backend: Option<AgentBackend>,
    pub history_path: Option<PathBuf>,
}

impl RunConfig {
    /// Read and validate a config file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config: RunConfig =
            serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.display().to_string(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Like `load`, but a missing file yields the defaults.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let io_err = |source: std::io::Error| ConfigError::Io {
            path: path.display().to_string(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let content = serde_json::to_string_pretty(self).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        std::fs::write(path, content).map_err(io_err)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scenario.trim().is_empty() {
            return Err(ConfigError::invalid("scenario", "must not be empty"));
        }
        if self.max_rounds == 0 {
            return Err(ConfigError::invalid("max_rounds", "must be greater than zero"));
        }
        if self.roster.is_empty() {
            return Err(ConfigError::invalid("roster", "needs at least one agent"));
        }
        if self.call_timeout_secs == 0 {
            return Err(ConfigError::invalid(
                "call_timeout_secs",
                "must be greater than zero",
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::invalid(
                "retry.max_attempts",
                "must be greater than zero",
            ));
        }
        if self.tools.iter().any(|t| t.trim().is_empty()) {
            return Err(ConfigError::invalid("tools", "tool names must not be empty"));
        }
        if !self.tools.is_empty() && self.extractor.is_none() {
            tracing::debug!(
                scenario = %self.scenario,
                "Tools configured without an extractor; they will not be dispatched"
            );
        }
        Ok(())
    }

    pub fn merge(&mut self, overrides: ConfigOverrides) {
        if let Some(scenario) = overrides.scenario {
            self.scenario = scenario;
        }
        if let Some(goal) = overrides.goal {
            self.goal = goal;
        }
        if let Some(max_rounds) = overrides.max_rounds {
            self.max_rounds = max_rounds;
        }
        if let Some(backend) = overrides.backend {
            self.backend = backend;
        }
        if overrides.history_path.is_some() {
            self.history_path = overrides.history_path;
        }
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }

    /// The task this config describes.
    pub fn task(&self) -> Result<Task, ConfigError> {
        self.validate()?;
        let mut task = Task::new(&self.scenario, &self.goal, self.max_rounds)
            .map_err(|e| ConfigError::invalid("scenario", e.to_string()))?
            .with_tools(self.tools.iter().cloned());
        if let Some(criteria) = &self.criteria {
            task = task.with_criteria(criteria);
        }
        Ok(task)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LlmProvider, ModelConfig};
    use crate::moderator::ApprovalRule;
    use tempfile::tempdir;

    #[test]
    fn test_default_is_valid() {
        let config = RunConfig::default();
        config.validate().unwrap();
        assert_eq!(config.roster.len(), 3);
        assert_eq!(config.call_timeout(), Duration::from_secs(60));
    }

    #[test]
    fn test_rejects_zero_rounds() {
        let config = RunConfig {
            max_rounds: 0,
            ..RunConfig::default()
        };
        match config.validate() {
            Err(ConfigError::Invalid { field, .. }) => assert_eq!(field, "max_rounds"),
            other => panic!("expected Invalid, got {:?}", other),
        }
        assert!(config.task().is_err());
    }

    #[test]
    fn test_rejects_empty_roster_and_scenario() {
        let no_roster = RunConfig {
            roster: Vec::new(),
            ..RunConfig::default()
        };
        assert!(matches!(
            no_roster.validate(),
            Err(ConfigError::Invalid { ref field, .. }) if field == "roster"
        ));

        let no_scenario = RunConfig {
            scenario: " ".to_string(),
            ..RunConfig::default()
        };
        assert!(no_scenario.validate().is_err());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let config = RunConfig {
            scenario: "schedule".to_string(),
            tools: vec!["find_calendar_slot".to_string()],
            extractor: Some(AgentRole::ActionItemExtractor),
            moderator: ModeratorConfig::Rule {
                rule: ApprovalRule::Always,
            },
            backend: AgentBackend::Live(ModelConfig::for_provider(LlmProvider::Gemini)),
            ..RunConfig::default()
        };
        config.save(&path).unwrap();

        let loaded = RunConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"scenario": "capitals", "max_rounds": 5}"#).unwrap();

        let config = RunConfig::load(&path).unwrap();
        assert_eq!(config.scenario, "capitals");
        assert_eq!(config.max_rounds, 5);
        assert_eq!(config.retry, RetryPolicy::default());
        assert_eq!(config.moderator, ModeratorConfig::Agent);
    }

    #[test]
    fn test_load_errors() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("missing.json");
        assert!(matches!(
            RunConfig::load(&missing),
            Err(ConfigError::Io { .. })
        ));
        assert_eq!(
            RunConfig::load_or_default(&missing).unwrap(),
            RunConfig::default()
        );

        let broken = dir.path().join("broken.json");
        std::fs::write(&broken, "{ not json").unwrap();
        assert!(matches!(
            RunConfig::load(&broken),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_merge_overrides() {
        let mut config = RunConfig::default();
        config.merge(ConfigOverrides {
            goal: Some("What is the capital of India?".to_string()),
            max_rounds: Some(1),
            ..ConfigOverrides::default()
        });

        assert_eq!(config.goal, "What is the capital of India?");
        assert_eq!(config.max_rounds, 1);
        assert_eq!(config.scenario, "research");

        let task = config.task().unwrap();
        assert_eq!(task.max_rounds(), 1);
        assert_eq!(task.criteria(), "What is the capital of India?");
    }
}
