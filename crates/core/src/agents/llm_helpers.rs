//! # LLM Helpers
//!
//! Provider dispatch for radkit LLM functions, in one place.

/// Run an `LlmFunction` returning `$output_type` against the provider in `$config`.
///
/// Must be used inside a function returning `anyhow::Result`.
#[macro_export]
macro_rules! run_llm_function {
    ($config:expr, $output_type:ty, $system_prompt:expr, $input:expr) => {{
        use radkit::agent::LlmFunction;
        use radkit::models::providers::{
            AnthropicLlm, DeepSeekLlm, GeminiLlm, GrokLlm, OpenAILlm, OpenRouterLlm,
        };
        use $crate::models::LlmProvider;

        let config = $config;
        let system = $system_prompt;
        let input = $input;
        let model = config.model.as_str();

        let result: anyhow::Result<$output_type> = match config.provider {
            LlmProvider::Anthropic => {
                LlmFunction::<$output_type>::new_with_system_instructions(
                    AnthropicLlm::from_env(model)?,
                    system,
                )
                .run(input)
                .await
                .map_err(Into::into)
            }
            LlmProvider::OpenAI => {
                let llm = match &config.base_url {
                    Some(base_url) => OpenAILlm::from_env(model)?.with_base_url(base_url),
                    None => OpenAILlm::from_env(model)?,
                };
                LlmFunction::<$output_type>::new_with_system_instructions(llm, system)
                    .run(input)
                    .await
                    .map_err(Into::into)
            }
            LlmProvider::Gemini => {
                LlmFunction::<$output_type>::new_with_system_instructions(
                    GeminiLlm::from_env(model)?,
                    system,
                )
                .run(input)
                .await
                .map_err(Into::into)
            }
            LlmProvider::OpenRouter => {
                LlmFunction::<$output_type>::new_with_system_instructions(
                    OpenRouterLlm::from_env(model)?,
                    system,
                )
                .run(input)
                .await
                .map_err(Into::into)
            }
            LlmProvider::Grok => {
                LlmFunction::<$output_type>::new_with_system_instructions(
                    GrokLlm::from_env(model)?,
                    system,
                )
                .run(input)
                .await
                .map_err(Into::into)
            }
            LlmProvider::DeepSeek => {
                LlmFunction::<$output_type>::new_with_system_instructions(
                    DeepSeekLlm::from_env(model)?,
                    system,
                )
                .run(input)
                .await
                .map_err(Into::into)
            }
        };
        result
    }};
}

pub use run_llm_function;
