use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;

use super::params::{required_str, ToolParams};
use super::Tool;
use crate::error::ToolError;

const SAMPLE_TRANSCRIPT: &str = "Charles: OK team, for Q4 we need to focus on the holiday sales push. \
Diana: Agreed. I've drafted a proposal for the social media campaign. \
Charles: I've seen it, looks good. The main outstanding item is the budget. We need to lock that in. \
Diana: Let's schedule a meeting to finalize the Q4 budget as soon as possible.";

/// Transcript served for meetings without a registered one.
pub fn sample_transcript(_meeting_id: &str) -> String {
    SAMPLE_TRANSCRIPT.to_string()
}

/// `get_meeting_transcript {meeting_id}` → transcript text
#[derive(Debug, Default)]
pub struct GetMeetingTranscript {
    transcripts: HashMap<String, String>,
}

impl GetMeetingTranscript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_transcript(mut self, meeting_id: impl Into<String>, text: impl Into<String>) -> Self {
        self.transcripts.insert(meeting_id.into(), text.into());
        self
    }

    pub fn transcript(&self, meeting_id: &str) -> String {
        self.transcripts
            .get(meeting_id)
            .cloned()
            .unwrap_or_else(|| sample_transcript(meeting_id))
    }
}

#[async_trait]
impl Tool for GetMeetingTranscript {
    fn name(&self) -> &str {
        "get_meeting_transcript"
    }

    async fn call(&self, params: &ToolParams) -> Result<Value, ToolError> {
        let meeting_id = required_str(params, "meeting_id")?;
        tracing::debug!(meeting_id, "Fetching meeting transcript");
        Ok(Value::String(self.transcript(meeting_id)))
    }
}
