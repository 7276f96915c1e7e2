//! # Live Agent
//!
//! Model-backed agent. Sends the role's system prompt plus the rendered
//! board to the configured provider through radkit.

use async_trait::async_trait;
use radkit::macros::LLMOutput;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use super::{AgentCapability, AgentContext, AgentRole};
use crate::error::AgentGenerationError;
use crate::models::ModelConfig;
use crate::run_llm_function;

/// Output shape requested from the model
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, LLMOutput)]
pub struct GeneratedText {
    /// The complete response, exactly as it should appear on the board
    pub text: String,
}

pub struct LiveAgent {
    role: AgentRole,
    config: ModelConfig,
}

impl LiveAgent {
    pub fn new(role: AgentRole, config: ModelConfig) -> Self {
        Self { role, config }
    }

    pub fn role(&self) -> AgentRole {
        self.role
    }

    async fn run(&self, prompt: &str, context: &AgentContext) -> anyhow::Result<GeneratedText> {
        let input = format!("Task:\n{}\n\nBoard:\n{}", prompt, context.render());
        run_llm_function!(&self.config, GeneratedText, self.role.system_prompt(), input)
    }
}

#[async_trait]
impl AgentCapability for LiveAgent {
    async fn generate(
        &self,
        prompt: &str,
        context: &AgentContext,
    ) -> Result<String, AgentGenerationError> {
        let started = Instant::now();
        match self.run(prompt, context).await {
            Ok(output) if !output.text.trim().is_empty() => Ok(output.text),
            Ok(_) => Err(AgentGenerationError::invalid("model returned empty text")),
            Err(e) => {
                tracing::debug!(
                    agent = %self.role,
                    provider = self.config.provider.display_name(),
                    model = %self.config.model,
                    "Live generation failed: {:#}",
                    e
                );
                Err(classify_error(&e, started.elapsed()))
            }
        }
    }
}

/// Map a provider error onto the retryable generation error kinds.
/// `elapsed` is how long the failed request took.
pub fn classify_error(err: &anyhow::Error, elapsed: Duration) -> AgentGenerationError {
    let message = format!("{:#}", err);
    let lower = message.to_lowercase();

    if lower.contains("429") || lower.contains("rate limit") || lower.contains("too many requests")
    {
        AgentGenerationError::RateLimited { reason: message }
    } else if lower.contains("timed out") || lower.contains("timeout") {
        AgentGenerationError::Timeout {
            elapsed_ms: elapsed.as_millis() as u64,
        }
    } else {
        AgentGenerationError::InvalidResponse { reason: message }
    }
}
