//! # Tools
//!
//! Named side-effecting actions dispatched during the tool workflow.
//!
//! ## Modules
//!
//! - `params` - Typed access to a call's parameter mapping
//! - `calendar` - Simulated calendar (slot search and booking)
//! - `transcript` - Simulated meeting transcript service
//!
//! Lookup is by exact name. The registry never retries and never panics on
//! an unknown name; every outcome becomes a `ToolCall`.

pub mod calendar;
pub mod params;
pub mod transcript;

pub use calendar::{BookCalendarEvent, FindCalendarSlot, SimulatedCalendar, SLOT_FORMAT};
pub use params::{optional_str, optional_u64, required_str, required_u64, ToolParams};
pub use transcript::{sample_transcript, GetMeetingTranscript};

use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::ToolError;
use crate::history::ToolCall;

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    async fn call(&self, params: &ToolParams) -> Result<Value, ToolError>;
}

/// Name → handler map, fixed once a run starts.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool under its own name, replacing any previous holder.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn with_tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.register(tool);
        self
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// A registry exposing only `names`. Names outside the subset resolve to NotFound.
    pub fn restricted_to<S: AsRef<str>>(&self, names: &[S]) -> ToolRegistry {
        let tools = names
            .iter()
            .filter_map(|n| {
                self.tools
                    .get_key_value(n.as_ref())
                    .map(|(k, v)| (k.clone(), Arc::clone(v)))
            })
            .collect();
        ToolRegistry { tools }
    }

    pub async fn try_invoke(&self, name: &str, params: &ToolParams) -> Result<Value, ToolError> {
        let tool = self.tools.get(name).ok_or_else(|| ToolError::NotFound {
            name: name.to_string(),
        })?;
        tool.call(params).await
    }

    /// Invoke `name` and record the outcome as the `index`th tool call.
    pub async fn invoke(&self, name: &str, params: ToolParams, index: u32) -> ToolCall {
        match self.try_invoke(name, &params).await {
            Ok(result) => ToolCall::succeeded(index, name, params, result),
            Err(error) => ToolCall::failed(index, name, params, error),
        }
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}

/// Registry with the bundled meeting and calendar tools.
pub fn standard_registry(calendar: Arc<SimulatedCalendar>) -> ToolRegistry {
    ToolRegistry::new()
        .with_tool(Arc::new(GetMeetingTranscript::new()))
        .with_tool(Arc::new(FindCalendarSlot::new(Arc::clone(&calendar))))
        .with_tool(Arc::new(BookCalendarEvent::new(calendar)))
}
