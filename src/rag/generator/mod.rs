//! Generator module for text generation
//!
//! Provides the [`ModelLoader`] that resolves a tokenizer and stop tokens for
//! a base model and builds a [`HuggingFaceLlm`] client, plus the trait-based
//! abstraction downstream pipelines generate through.

pub mod candle;
pub mod config;

pub use candle::{GenerationStream, HuggingFaceLlm, LlmMetadata};
pub use config::{GeneratorConfig, SamplingParams};

use anyhow::{Context, Result};

use crate::models::TokenizerWrapper;
use crate::rag::context::PromptTemplate;

/// Trait for text generation models
pub trait Generator: Send + Sync {
    /// Generate a response given a fully formatted prompt
    fn generate(&self, prompt: &str, params: &SamplingParams) -> Result<String>;

    /// Generate with streaming output
    ///
    /// Returns an iterator that yields text pieces as they are generated.
    /// Concatenating the pieces gives the untrimmed output of `generate`.
    fn generate_stream(
        &self,
        prompt: &str,
        params: &SamplingParams,
    ) -> Result<Box<dyn Iterator<Item = Result<String>> + '_>>;

    /// Get the model name/identifier
    fn model_name(&self) -> &str;

    /// Get maximum context length (in tokens)
    fn max_context_length(&self) -> usize;

    /// Count tokens in text
    fn count_tokens(&self, text: &str) -> Result<usize>;
}

/// Loads the tokenizer of the configured base model and builds LLM clients
pub struct ModelLoader {
    config: GeneratorConfig,
    tokenizer: TokenizerWrapper,
    stopping_ids: Vec<u32>,
    system_prompt: String,
    query_wrapper_prompt: PromptTemplate,
}

impl ModelLoader {
    /// Resolve the tokenizer for `config.model_id` and derive its stop-token ids
    pub fn new(
        config: &GeneratorConfig,
        system_prompt: &str,
        query_wrapper_prompt: &PromptTemplate,
    ) -> Result<Self> {
        let tokenizer = TokenizerWrapper::from_pretrained(&config.model_id)?
            .with_max_length(config.tokenizer_max_length);

        let stopping_ids = derive_stopping_ids(&tokenizer, &config.stop_tokens)
            .with_context(|| format!("Failed to derive stop tokens for {}", config.model_id))?;

        tracing::debug!("Stopping ids for {}: {:?}", config.model_id, stopping_ids);

        Ok(Self {
            config: config.clone(),
            tokenizer,
            stopping_ids,
            system_prompt: system_prompt.to_string(),
            query_wrapper_prompt: query_wrapper_prompt.clone(),
        })
    }

    /// Token ids that end generation: eos first, then the configured stop tokens
    pub fn stopping_ids(&self) -> &[u32] {
        &self.stopping_ids
    }

    /// The configured base model identifier
    pub fn base_model(&self) -> &str {
        &self.config.model_id
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Load the model weights and build a generation client
    pub fn load_llm(&self) -> Result<HuggingFaceLlm> {
        tracing::info!("Loading LLM...");
        HuggingFaceLlm::new(
            self.config.clone(),
            self.tokenizer.clone(),
            self.stopping_ids.clone(),
            self.system_prompt.clone(),
            self.query_wrapper_prompt.clone(),
        )
    }
}

/// The eos id followed by the id of each stop token, without duplicates
pub fn derive_stopping_ids(tokenizer: &TokenizerWrapper, stop_tokens: &[String]) -> Result<Vec<u32>> {
    let eos = tokenizer
        .eos_token_id()
        .context("Tokenizer defines no end-of-sequence token")?;

    let mut ids = vec![eos];
    for token in stop_tokens {
        let id = tokenizer
            .token_to_id(token)
            .with_context(|| format!("Stop token {:?} is not in the vocabulary", token))?;
        if !ids.contains(&id) {
            ids.push(id);
        }
    }

    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::tokenizer::test_support::write_tokenizer;

    fn loader_for(dir: &std::path::Path) -> Result<ModelLoader> {
        let config = GeneratorConfig::new(dir.to_str().unwrap());
        ModelLoader::new(&config, "Be brief.", &PromptTemplate::new("Q: {query_str}\nA:"))
    }

    #[test]
    fn test_stopping_ids_contain_eos_and_eot() {
        let dir = tempfile::tempdir().unwrap();
        write_tokenizer(dir.path(), Some("<|end_of_text|>"));

        let loader = loader_for(dir.path()).unwrap();

        assert_eq!(loader.stopping_ids(), &[5, 6]);
        assert_eq!(loader.base_model(), dir.path().to_str().unwrap());
    }

    #[test]
    fn test_stopping_ids_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        write_tokenizer(dir.path(), Some("<|end_of_text|>"));

        let first = loader_for(dir.path()).unwrap();
        let second = loader_for(dir.path()).unwrap();

        assert_eq!(first.stopping_ids(), second.stopping_ids());
    }

    #[test]
    fn test_stopping_ids_deduplicated() {
        let dir = tempfile::tempdir().unwrap();
        write_tokenizer(dir.path(), Some("<|eot_id|>"));

        let loader = loader_for(dir.path()).unwrap();

        assert_eq!(loader.stopping_ids(), &[6]);
    }

    #[test]
    fn test_unknown_stop_token_is_error() {
        let dir = tempfile::tempdir().unwrap();
        write_tokenizer(dir.path(), Some("<|end_of_text|>"));

        let config = GeneratorConfig::new(dir.path().to_str().unwrap())
            .with_stop_tokens(vec!["<|im_end|>".to_string()]);
        let result = ModelLoader::new(&config, "", &PromptTemplate::new("{query_str}"));

        assert!(result.is_err());
    }

    #[test]
    fn test_nonexistent_model_fails() {
        let result = loader_for(std::path::Path::new("/nonexistent/model-dir"));

        assert!(result.is_err_and(|e| e.to_string().contains("does not exist")));
    }

    #[test]
    fn test_load_llm_without_weights_fails() {
        let dir = tempfile::tempdir().unwrap();
        write_tokenizer(dir.path(), Some("<|end_of_text|>"));

        let loader = loader_for(dir.path()).unwrap();

        assert!(loader.load_llm().is_err());
    }
}
