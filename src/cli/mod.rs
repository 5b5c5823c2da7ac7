//! Command-line interface
//!
//! Provides CLI commands for dataset, prompts, stop-ids, and complete.

use anyhow::Result;
use std::path::PathBuf;

use crate::config::Settings;
use crate::data::DatasetLoader;
use crate::models::DevicePreference;
use crate::rag::{ModelLoader, PromptProvider};

/// Execute the dataset command
pub fn dataset(settings: &Settings, dir: Option<PathBuf>) -> Result<()> {
    let mut config = settings.dataset.clone();
    if let Some(dir) = dir {
        config.dir = dir;
    }

    tracing::info!("Starting dataset load");
    tracing::info!("  Directory: {:?}", config.dir);
    tracing::info!("  Recursive: {}", config.recursive);

    let loader = DatasetLoader::new(&config);
    let documents = loader.load_dataset()?;

    let mut total_bytes = 0;
    for document in &documents {
        total_bytes += document.content.len();
        println!(
            "{}  {}  {} ({} bytes)",
            document.id,
            document.metadata.file_type,
            document.source,
            document.content.len()
        );
    }

    println!("\nLoaded {} documents ({} bytes) from {:?}", documents.len(), total_bytes, loader.dataset_dir());

    Ok(())
}

/// Execute the prompts command
pub fn prompts(settings: &Settings, query: Option<String>) -> Result<()> {
    let provider = PromptProvider::new(&settings.prompts);
    let wrapper = provider.get_query_wrapper_prompt();

    println!("System prompt:\n{}\n", provider.get_system_prompt());
    println!("Query wrapper:\n{}\n", wrapper.template());
    println!("Variables: {:?}", wrapper.template_vars());

    if let Some(query) = query {
        println!("\nRendered:\n{}", wrapper.format(&[("query_str", query.as_str())]));
    }

    Ok(())
}

/// Execute the stop-ids command
pub fn stop_ids(settings: &Settings, model: Option<String>) -> Result<()> {
    let mut config = settings.model.clone();
    if let Some(model) = model {
        config.model_id = model;
    }

    tracing::info!("Resolving stop tokens for {}", config.model_id);

    let provider = PromptProvider::new(&settings.prompts);
    let loader = ModelLoader::new(
        &config,
        provider.get_system_prompt(),
        provider.get_query_wrapper_prompt(),
    )?;

    println!("Model: {}", loader.base_model());
    println!("Stop tokens: {:?}", config.stop_tokens);
    println!("Stopping ids: {:?}", loader.stopping_ids());

    Ok(())
}

/// Execute the complete command
pub fn complete(
    settings: &Settings,
    query: String,
    model: Option<String>,
    max_new_tokens: Option<usize>,
    device: Option<DevicePreference>,
) -> Result<()> {
    let mut config = settings.model.clone();
    if let Some(model) = model {
        config.model_id = model;
    }
    if let Some(max_new_tokens) = max_new_tokens {
        config.max_new_tokens = max_new_tokens;
    }
    if let Some(device) = device {
        config.device = device;
    }

    tracing::info!("Starting completion");
    tracing::info!("  Model: {}", config.model_id);
    tracing::info!("  Device: {}", config.device);
    tracing::info!("  Max new tokens: {}", config.max_new_tokens);

    let provider = PromptProvider::new(&settings.prompts);
    let loader = ModelLoader::new(
        &config,
        provider.get_system_prompt(),
        provider.get_query_wrapper_prompt(),
    )?;
    let llm = loader.load_llm()?;

    let start = std::time::Instant::now();
    let answer = llm.complete(&query)?;
    tracing::info!("Completed in {:.2}s", start.elapsed().as_secs_f64());

    println!("{}", answer);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_dataset_command_with_dir_override() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("note.txt"), "hello world").unwrap();

        let settings = Settings::default();

        assert!(dataset(&settings, Some(dir.path().to_path_buf())).is_ok());
    }

    #[test]
    fn test_dataset_command_missing_dir() {
        let settings = Settings::default();

        assert!(dataset(&settings, Some(PathBuf::from("/nonexistent/dataset"))).is_err());
    }

    #[test]
    fn test_prompts_command() {
        assert!(prompts(&Settings::default(), Some("What is docrag?".to_string())).is_ok());
    }

    #[test]
    fn test_stop_ids_command_local_tokenizer() {
        let dir = tempfile::tempdir().unwrap();
        crate::models::tokenizer::test_support::write_tokenizer(dir.path(), Some("<|end_of_text|>"));

        let model = dir.path().to_str().map(str::to_string);

        assert!(stop_ids(&Settings::default(), model).is_ok());
    }
}
