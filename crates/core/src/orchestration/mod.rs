//! # Orchestration
//!
//! The bounded draft/review/revise loop and the tool workflow that follows
//! it.
//!
//! - `task` - Task and its state machine
//! - `orchestrator` - Run loop, retries, tool dispatch
//! - `retry` - Backoff policy
//! - `actions` - Action item parsing
//! - `events` - Progress events

pub mod actions;
pub mod events;
pub mod orchestrator;
pub mod retry;
pub mod task;

pub use actions::{parse_action_items, ActionItem};
pub use events::{RunEvent, RunEventKind};
pub use orchestrator::{Orchestrator, TerminalResult};
pub use retry::RetryPolicy;
pub use task::{Task, TaskStatus, WorkflowState};
