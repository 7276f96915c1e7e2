//! # Roundtable Core
//!
//! The engine of Roundtable: a bounded, moderated refinement loop over a
//! roster of agents, an optional tool workflow after convergence, and an
//! append-only history of everything a run produced.
//!
//! ## Architecture
//!
//! - `orchestration/` - Task state machine, run loop, retries, events
//! - `agents/` - Agent capability (scripted and radkit-backed), roles, prompts
//! - `moderator/` - Rule-based and agent-backed verdicts
//! - `tools/` - Tool registry and the simulated meeting/calendar tools
//! - `history/` - Append-only history store (in-memory and SQLite)
//! - `config` - JSON run configuration
//! - `models` - LLM provider configuration
//!
//! ## Usage
//!
//! ```rust,ignore
//! use roundtable_core::config::RunConfig;
//! use roundtable_core::history::InMemoryHistoryStore;
//! use roundtable_core::orchestration::Orchestrator;
//! use roundtable_core::tools::ToolRegistry;
//!
//! let config = RunConfig::default();
//! let orchestrator = Orchestrator::from_config(
//!     &config,
//!     Arc::new(InMemoryHistoryStore::new()),
//!     ToolRegistry::new(),
//! );
//! let result = orchestrator.run(config.task()?).await?;
//! ```

pub mod agents;
pub mod config;
pub mod error;
pub mod history;
pub mod models;
pub mod moderator;
pub mod orchestration;
pub mod tools;
