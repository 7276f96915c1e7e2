//! Action items extracted from a converged contribution.
//!
//! The extractor answers with a JSON array of
//! `{"tool": <name>, "params": {...}}` objects. The array may sit inside a
//! fenced code block or be surrounded by prose.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::AgentGenerationError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionItem {
    pub tool: String,
    #[serde(default)]
    pub params: Map<String, Value>,
}

pub fn parse_action_items(raw: &str) -> Result<Vec<ActionItem>, AgentGenerationError> {
    let body = fenced_block(raw).unwrap_or(raw).trim();

    let json = match (body.find('['), body.rfind(']')) {
        (Some(start), Some(end)) if start < end => &body[start..=end],
        _ => {
            return Err(AgentGenerationError::invalid(
                "no action item array in extractor output",
            ))
        }
    };

    let items: Vec<ActionItem> = serde_json::from_str(json).map_err(|e| {
        AgentGenerationError::invalid(format!("could not parse action items: {}", e))
    })?;

    if let Some(pos) = items.iter().position(|item| item.tool.trim().is_empty()) {
        return Err(AgentGenerationError::invalid(format!(
            "action item {} has no tool name",
            pos
        )));
    }
    Ok(items)
}

/// Contents of the first ``` fence, without its language tag.
fn fenced_block(text: &str) -> Option<&str> {
    let open = text.find("```")?;
    let after = &text[open + 3..];
    let body_start = after.find('\n')? + 1;
    let body = &after[body_start..];
    let close = body.find("```")?;
    Some(&body[..close])
}
