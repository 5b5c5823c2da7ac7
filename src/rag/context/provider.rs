//! System prompt and query-wrapper template provider

use serde::{Deserialize, Serialize};

use super::templates::PromptTemplate;

const DEFAULT_SYSTEM_PROMPT: &str = concat!(
    "<|start_header_id|>system<|end_header_id|>\n\n",
    "You are a helpful assistant that answers questions using the provided documents. ",
    "If the answer cannot be found in the documents, say that you do not know.",
    "<|eot_id|>"
);

const DEFAULT_QUERY_WRAPPER_PROMPT: &str = concat!(
    "<|start_header_id|>user<|end_header_id|>\n\n",
    "{query_str}<|eot_id|>",
    "<|start_header_id|>assistant<|end_header_id|>\n\n"
);

/// Prompt text handed to the model loader
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptConfig {
    /// Instruction text prepended to every model invocation
    pub system_prompt: String,
    /// Template wrapping each query; `{query_str}` receives the query
    pub query_wrapper_prompt: String,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            query_wrapper_prompt: DEFAULT_QUERY_WRAPPER_PROMPT.to_string(),
        }
    }
}

/// Exposes the configured system prompt and query-wrapper template unchanged
pub struct PromptProvider {
    system_prompt: String,
    query_wrapper_prompt: PromptTemplate,
}

impl PromptProvider {
    pub fn new(config: &PromptConfig) -> Self {
        Self {
            system_prompt: config.system_prompt.clone(),
            query_wrapper_prompt: PromptTemplate::new(config.query_wrapper_prompt.clone()),
        }
    }

    /// The instruction text that sets the model's behaviour
    pub fn get_system_prompt(&self) -> &str {
        tracing::debug!("PromptProvider::get_system_prompt()");
        &self.system_prompt
    }

    /// The template used to format each query before it reaches the model
    pub fn get_query_wrapper_prompt(&self) -> &PromptTemplate {
        tracing::debug!("PromptProvider::get_query_wrapper_prompt()");
        &self.query_wrapper_prompt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_prompt_unchanged_and_idempotent() {
        let config = PromptConfig {
            system_prompt: "  Be brief.\n".to_string(),
            query_wrapper_prompt: "Q: {query_str}\nA:".to_string(),
        };
        let provider = PromptProvider::new(&config);

        assert_eq!(provider.get_system_prompt(), "  Be brief.\n");
        assert_eq!(provider.get_system_prompt(), provider.get_system_prompt());
    }

    #[test]
    fn test_query_wrapper_renders_query() {
        let config = PromptConfig {
            system_prompt: String::new(),
            query_wrapper_prompt: "Q: {query_str}\nA:".to_string(),
        };
        let provider = PromptProvider::new(&config);

        let wrapper = provider.get_query_wrapper_prompt();

        assert_eq!(wrapper.template(), "Q: {query_str}\nA:");
        assert_eq!(wrapper.format(&[("query_str", "Why Rust?")]), "Q: Why Rust?\nA:");
    }

    #[test]
    fn test_default_wrapper_has_query_placeholder() {
        let provider = PromptProvider::new(&PromptConfig::default());

        assert_eq!(
            provider.get_query_wrapper_prompt().template_vars(),
            vec!["query_str"]
        );
        assert!(provider.get_system_prompt().ends_with("<|eot_id|>"));
    }
}
