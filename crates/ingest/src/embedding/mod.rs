pub mod batcher;
pub mod cache;
pub mod ollama;
pub mod openai;
pub mod retry;
pub mod traits;

use kb_core::config::EmbeddingConfig;

pub use batcher::EmbeddingBatcher;
pub use cache::EmbeddingCache;
pub use ollama::OllamaEmbedder;
pub use openai::OpenAiEmbedder;
pub use retry::embed_batch_with_retry;
pub use traits::{Embedder, EmbeddingError};

/// Build the configured embedding backend, mirroring
/// `kb_llm::providers::create_provider`'s dispatch shape.
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Box<dyn Embedder>, EmbeddingError> {
    match config.provider.as_str() {
        "openai" => {
            let api_key = config
                .openai_api_key
                .clone()
                .ok_or_else(|| EmbeddingError::Api("EMBEDDING_OPENAI_API_KEY not set".into()))?;
            Ok(Box::new(OpenAiEmbedder::new(
                api_key,
                config.openai_model.clone(),
                config.openai_base_url.clone(),
                config.dimensions as usize,
            )))
        }
        "ollama" => Ok(Box::new(OllamaEmbedder::new(
            config.ollama_url.clone(),
            config.ollama_model.clone(),
            config.dimensions as usize,
        ))),
        other => Err(EmbeddingError::Api(format!("unknown embedding provider: '{other}'"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_config(provider: &str) -> EmbeddingConfig {
        EmbeddingConfig {
            provider: provider.to_string(),
            dimensions: 768,
            batch_size: 64,
            cache_capacity: 1000,
            max_retries: 3,
            backoff_base_secs: 1,
            backoff_cap_secs: 10,
            ollama_url: "http://localhost:11434".to_string(),
            ollama_model: "nomic-embed-text".to_string(),
            openai_api_key: None,
            openai_model: "text-embedding-3-small".to_string(),
            openai_base_url: None,
        }
    }

    #[test]
    fn ollama_needs_no_api_key() {
        assert!(create_embedder(&sample_config("ollama")).is_ok());
    }

    #[test]
    fn openai_without_api_key_errors() {
        assert!(create_embedder(&sample_config("openai")).is_err());
    }

    #[test]
    fn unknown_provider_errors() {
        assert!(create_embedder(&sample_config("carrier-pigeon")).is_err());
    }
}
