pub mod claude;
pub mod ollama;
pub mod openai;

use kb_core::config::LlmConfig;

use crate::provider::{LlmError, LlmProvider};

/// Build the configured LLM provider.
pub fn create_provider(llm_config: &LlmConfig) -> Result<Box<dyn LlmProvider>, LlmError> {
    match llm_config.provider.as_str() {
        "openai" => {
            let api_key = llm_config
                .openai_api_key
                .as_ref()
                .ok_or_else(|| LlmError::NotConfigured("OPENAI_API_KEY not set".into()))?;
            let base_url = llm_config
                .openai_base_url
                .as_deref()
                .unwrap_or("https://api.openai.com");
            Ok(Box::new(openai::OpenAiProvider::new(
                api_key.clone(),
                llm_config.openai_model.clone(),
                base_url.to_string(),
            )))
        }
        "anthropic" | "claude" => {
            let api_key = llm_config
                .anthropic_api_key
                .as_ref()
                .ok_or_else(|| LlmError::NotConfigured("ANTHROPIC_API_KEY not set".into()))?;
            Ok(Box::new(claude::ClaudeProvider::new(
                api_key.clone(),
                llm_config.anthropic_model.clone(),
            )))
        }
        "ollama" => Ok(Box::new(ollama::OllamaProvider::new(
            llm_config.ollama_url.clone(),
            llm_config.ollama_model.clone(),
        ))),
        other => Err(LlmError::NotConfigured(format!(
            "unknown LLM provider: '{}'",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ollama_provider_needs_no_api_key() {
        let cfg = LlmConfig {
            provider: "ollama".into(),
            openai_api_key: None,
            openai_model: "gpt-4o".into(),
            openai_base_url: None,
            anthropic_api_key: None,
            anthropic_model: "claude-sonnet-4-5-20250929".into(),
            ollama_url: "http://localhost:11434".into(),
            ollama_model: "llama3.2".into(),
            temperature: 0.1,
            max_tokens: 4096,
        };
        assert!(create_provider(&cfg).is_ok());
    }

    #[test]
    fn openai_without_api_key_is_not_configured() {
        let cfg = LlmConfig {
            provider: "openai".into(),
            openai_api_key: None,
            openai_model: "gpt-4o".into(),
            openai_base_url: None,
            anthropic_api_key: None,
            anthropic_model: "claude-sonnet-4-5-20250929".into(),
            ollama_url: "http://localhost:11434".into(),
            ollama_model: "llama3.2".into(),
            temperature: 0.1,
            max_tokens: 4096,
        };
        assert!(matches!(create_provider(&cfg), Err(LlmError::NotConfigured(_))));
    }

    #[test]
    fn unknown_provider_is_not_configured() {
        let cfg = LlmConfig {
            provider: "carrier-pigeon".into(),
            openai_api_key: None,
            openai_model: "gpt-4o".into(),
            openai_base_url: None,
            anthropic_api_key: None,
            anthropic_model: "claude-sonnet-4-5-20250929".into(),
            ollama_url: "http://localhost:11434".into(),
            ollama_model: "llama3.2".into(),
            temperature: 0.1,
            max_tokens: 4096,
        };
        assert!(matches!(create_provider(&cfg), Err(LlmError::NotConfigured(_))));
    }
}
