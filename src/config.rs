//! Application settings
//!
//! Settings come from an optional TOML file, then environment variables
//! override individual fields.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::data::DatasetConfig;
use crate::rag::{GeneratorConfig, PromptConfig};

/// Environment variable naming the dataset directory
pub const ENV_DATASET: &str = "DATASET";
/// Environment variable naming the base model
pub const ENV_BASE_MODEL: &str = "BASE_MODEL";
/// Environment variable holding the system prompt
pub const ENV_SYSTEM_PROMPT: &str = "SYSTEM_PROMPT";
/// Environment variable holding the query-wrapper template
pub const ENV_QUERY_WRAPPER_PROMPT: &str = "QUERY_WRAPPER_PROMPT";

/// Top-level settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub dataset: DatasetConfig,
    pub model: GeneratorConfig,
    pub prompts: PromptConfig,
}

impl Settings {
    /// Load settings from `path` (or defaults) and apply environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };

        settings.apply_overrides(|name| std::env::var(name).ok());
        Ok(settings)
    }

    /// Parse a TOML settings file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let settings: Settings = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        tracing::debug!("Loaded settings from {:?}", path);
        Ok(settings)
    }

    /// Override fields from variables returned by `lookup`
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup(ENV_DATASET) {
            self.dataset.dir = dir.into();
        }
        if let Some(model) = lookup(ENV_BASE_MODEL) {
            self.model.model_id = model;
        }
        if let Some(prompt) = lookup(ENV_SYSTEM_PROMPT) {
            self.prompts.system_prompt = prompt;
        }
        if let Some(template) = lookup(ENV_QUERY_WRAPPER_PROMPT) {
            self.prompts.query_wrapper_prompt = template;
        }
    }
}
