//! HuggingFace Hub integration for model and tokenizer resolution
//!
//! A model identifier is either a local directory or a Hub repo id. Local
//! directories are used as-is; repo ids are downloaded into the hf-hub cache.

use anyhow::{anyhow, Context, Result};
use hf_hub::api::sync::Api;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

const CONFIG_FILE: &str = "config.json";
const WEIGHTS_FILE: &str = "model.safetensors";
const WEIGHTS_INDEX_FILE: &str = "model.safetensors.index.json";
const TOKENIZER_FILE: &str = "tokenizer.json";
const TOKENIZER_CONFIG_FILE: &str = "tokenizer_config.json";
const GENERATION_CONFIG_FILE: &str = "generation_config.json";

/// HuggingFace Hub API wrapper
pub struct HubApi {
    api: Api,
}

impl HubApi {
    /// Create a new HubApi instance
    pub fn new() -> Result<Self> {
        let api = Api::new().context("Failed to initialize HuggingFace Hub API")?;
        Ok(Self { api })
    }

    /// Download the tokenizer files of a Hub model
    pub fn download_tokenizer(&self, model_id: &str) -> Result<TokenizerFiles> {
        tracing::info!("Fetching tokenizer from HuggingFace Hub: {}", model_id);

        let repo = self.api.model(model_id.to_string());

        let tokenizer_file = repo
            .get(TOKENIZER_FILE)
            .with_context(|| format!("Failed to download {} for {}", TOKENIZER_FILE, model_id))?;

        Ok(TokenizerFiles {
            tokenizer_file,
            tokenizer_config_file: optional_file(
                model_id,
                TOKENIZER_CONFIG_FILE,
                repo.get(TOKENIZER_CONFIG_FILE),
            ),
            generation_config_file: optional_file(
                model_id,
                GENERATION_CONFIG_FILE,
                repo.get(GENERATION_CONFIG_FILE),
            ),
        })
    }

    /// Download config, weights and tokenizer of a Hub model
    pub fn download_model(&self, model_id: &str) -> Result<ModelPath> {
        tracing::info!("Downloading model from HuggingFace Hub: {}", model_id);

        let repo = self.api.model(model_id.to_string());

        let config_file = repo
            .get(CONFIG_FILE)
            .with_context(|| format!("Failed to download {} for {}", CONFIG_FILE, model_id))?;

        let single = optional_file(model_id, WEIGHTS_FILE, repo.get(WEIGHTS_FILE));
        let weights_files = if let Some(path) = single {
            vec![path]
        } else {
            let index = repo.get(WEIGHTS_INDEX_FILE).with_context(|| {
                format!(
                    "No model weights found for {} (tried {} and {})",
                    model_id, WEIGHTS_FILE, WEIGHTS_INDEX_FILE
                )
            })?;

            let mut files = Vec::new();
            for shard in read_weight_shards(&index)? {
                tracing::debug!("Downloading weight shard {}", shard);
                let path = repo
                    .get(&shard)
                    .with_context(|| format!("Failed to download weight shard {}", shard))?;
                files.push(path);
            }
            files
        };

        let path = config_file
            .parent()
            .ok_or_else(|| anyhow!("Invalid config path: {:?}", config_file))?
            .to_path_buf();

        Ok(ModelPath {
            path,
            model_id: model_id.to_string(),
            is_local: false,
            config_file,
            weights_files,
        })
    }
}

/// Tokenizer files of a model
#[derive(Debug, Clone)]
pub struct TokenizerFiles {
    /// Path to tokenizer.json
    pub tokenizer_file: PathBuf,
    /// Path to tokenizer_config.json, if the model ships one
    pub tokenizer_config_file: Option<PathBuf>,
    /// Path to generation_config.json, if the model ships one
    pub generation_config_file: Option<PathBuf>,
}

impl TokenizerFiles {
    /// Collect tokenizer files from a local model directory
    pub fn from_local(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let tokenizer_file = path.join(TOKENIZER_FILE);
        if !tokenizer_file.exists() {
            return Err(anyhow!("{} not found in {:?}", TOKENIZER_FILE, path));
        }

        Ok(Self {
            tokenizer_file,
            tokenizer_config_file: existing(path.join(TOKENIZER_CONFIG_FILE)),
            generation_config_file: existing(path.join(GENERATION_CONFIG_FILE)),
        })
    }
}

/// Represents a downloaded or local model
#[derive(Debug, Clone)]
pub struct ModelPath {
    /// Root directory containing model files
    pub path: PathBuf,
    /// Original model ID or directory name
    pub model_id: String,
    /// Whether this is a local path (not downloaded from Hub)
    pub is_local: bool,
    /// Path to config.json
    pub config_file: PathBuf,
    /// Safetensors weight files, one or several shards
    pub weights_files: Vec<PathBuf>,
}

impl ModelPath {
    /// Create a ModelPath from a local directory
    pub fn from_local(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if !path.is_dir() {
            return Err(anyhow!("Model directory does not exist: {:?}", path));
        }

        let config_file = path.join(CONFIG_FILE);
        if !config_file.exists() {
            return Err(anyhow!("{} not found in {:?}", CONFIG_FILE, path));
        }

        let weights_files = if path.join(WEIGHTS_FILE).exists() {
            vec![path.join(WEIGHTS_FILE)]
        } else if path.join(WEIGHTS_INDEX_FILE).exists() {
            read_weight_shards(&path.join(WEIGHTS_INDEX_FILE))?
                .into_iter()
                .map(|shard| path.join(shard))
                .collect()
        } else {
            return Err(anyhow!(
                "No model weights found in {:?} (tried {} and {})",
                path,
                WEIGHTS_FILE,
                WEIGHTS_INDEX_FILE
            ));
        };

        Ok(Self {
            model_id: path
                .file_name()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_else(|| "unknown".to_string()),
            path,
            is_local: true,
            config_file,
            weights_files,
        })
    }

    /// Validate that all required files exist
    pub fn validate(&self) -> Result<()> {
        if !self.config_file.exists() {
            return Err(anyhow!("Config file not found: {:?}", self.config_file));
        }
        for weights in &self.weights_files {
            if !weights.exists() {
                return Err(anyhow!("Weights file not found: {:?}", weights));
            }
        }
        Ok(())
    }
}

#[derive(Deserialize)]
struct WeightIndex {
    weight_map: std::collections::HashMap<String, String>,
}

/// Read the distinct shard file names from a safetensors index, sorted
fn read_weight_shards(index_file: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(index_file)
        .with_context(|| format!("Failed to read weight index: {:?}", index_file))?;
    let index: WeightIndex = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse weight index: {:?}", index_file))?;

    let shards: BTreeSet<String> = index.weight_map.into_values().collect();
    if shards.is_empty() {
        return Err(anyhow!("Weight index lists no shards: {:?}", index_file));
    }
    Ok(shards.into_iter().collect())
}

/// A Hub file that a model may legitimately omit
///
/// Any failure, including a network error, is logged before the file is
/// treated as absent.
fn optional_file<E: std::fmt::Display>(
    model_id: &str,
    file: &str,
    fetched: std::result::Result<PathBuf, E>,
) -> Option<PathBuf> {
    match fetched {
        Ok(path) => Some(path),
        Err(e) => {
            tracing::warn!("Could not fetch {} for {}: {}. Continuing without it", file, model_id, e);
            None
        }
    }
}

fn existing(path: PathBuf) -> Option<PathBuf> {
    if path.exists() {
        Some(path)
    } else {
        None
    }
}

/// Fields of a model's config.json needed to pick an architecture
#[derive(Debug, Clone, Deserialize)]
pub struct HubModelConfig {
    /// Model architectures (e.g., ["LlamaForCausalLM"])
    #[serde(default)]
    pub architectures: Vec<String>,

    /// Model type (e.g., "llama", "qwen2")
    pub model_type: Option<String>,

    /// Maximum position embeddings
    pub max_position_embeddings: Option<usize>,
}

impl HubModelConfig {
    /// Parse config.json contents
    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str(content).context("Failed to parse config.json")
    }

    /// Lowercased model type, inferred from architectures when absent
    pub fn model_type(&self) -> String {
        if let Some(model_type) = &self.model_type {
            return model_type.to_lowercase();
        }
        self.architectures
            .first()
            .map(|arch| arch.to_lowercase())
            .unwrap_or_default()
    }
}

/// Resolves model identifiers to local files, downloading from the Hub when needed
#[derive(Default)]
pub struct ModelResolver;

impl ModelResolver {
    pub fn new() -> Self {
        Self
    }

    /// Resolve tokenizer files without touching model weights
    pub fn resolve_tokenizer(&self, model_id_or_path: &str) -> Result<TokenizerFiles> {
        match local_model_dir(model_id_or_path)? {
            Some(dir) => {
                tracing::info!("Loading tokenizer from local path: {:?}", dir);
                TokenizerFiles::from_local(dir)
            }
            None => HubApi::new()?.download_tokenizer(model_id_or_path),
        }
    }

    /// Resolve config and weights
    pub fn resolve_model(&self, model_id_or_path: &str) -> Result<ModelPath> {
        match local_model_dir(model_id_or_path)? {
            Some(dir) => {
                tracing::info!("Loading model from local path: {:?}", dir);
                ModelPath::from_local(dir)
            }
            None => HubApi::new()?.download_model(model_id_or_path),
        }
    }
}

/// Classify an identifier as a local directory (`Some`) or a Hub repo id (`None`)
///
/// Anything that exists on disk, or that starts with `.`, `/` or `~`, is local.
fn local_model_dir(model_id_or_path: &str) -> Result<Option<PathBuf>> {
    let expanded = match model_id_or_path.strip_prefix("~/") {
        Some(rest) => {
            let home = std::env::var("HOME")
                .or_else(|_| std::env::var("USERPROFILE"))
                .context("Cannot expand '~' without HOME")?;
            Path::new(&home).join(rest)
        }
        None => PathBuf::from(model_id_or_path),
    };

    if expanded.exists() {
        return Ok(Some(expanded));
    }

    if model_id_or_path.starts_with('.')
        || model_id_or_path.starts_with('/')
        || model_id_or_path.starts_with('~')
    {
        return Err(anyhow!(
            "Local model path does not exist: {}",
            model_id_or_path
        ));
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_optional_file_failure_is_absent() {
        let fetched: std::result::Result<PathBuf, String> = Err("connection reset".to_string());
        assert_eq!(optional_file("org/model", TOKENIZER_CONFIG_FILE, fetched), None);

        let fetched: std::result::Result<PathBuf, String> = Ok(PathBuf::from("/cache/x.json"));
        assert_eq!(
            optional_file("org/model", TOKENIZER_CONFIG_FILE, fetched),
            Some(PathBuf::from("/cache/x.json"))
        );
    }

    #[test]
    fn test_missing_local_path_is_error() {
        let resolver = ModelResolver::new();

        assert!(resolver
            .resolve_tokenizer("./my-model")
            .is_err_and(|e| e.to_string().contains("does not exist")));
        assert!(resolver
            .resolve_model("/absolute/path/to/nothing")
            .is_err_and(|e| e.to_string().contains("does not exist")));
    }

    #[test]
    fn test_local_tokenizer_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(TOKENIZER_FILE), "{}").unwrap();
        fs::write(dir.path().join(TOKENIZER_CONFIG_FILE), "{}").unwrap();

        let files = ModelResolver::new()
            .resolve_tokenizer(dir.path().to_str().unwrap())
            .unwrap();

        assert_eq!(files.tokenizer_file, dir.path().join(TOKENIZER_FILE));
        assert!(files.tokenizer_config_file.is_some());
        assert!(files.generation_config_file.is_none());
    }

    #[test]
    fn test_local_model_requires_config() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(TOKENIZER_FILE), "{}").unwrap();

        let err = ModelPath::from_local(dir.path()).unwrap_err();
        assert!(err.to_string().contains(CONFIG_FILE));
    }

    #[test]
    fn test_local_sharded_weights() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILE), "{}").unwrap();
        fs::write(
            dir.path().join(WEIGHTS_INDEX_FILE),
            r#"{"metadata": {}, "weight_map": {
                "a": "model-00002-of-00002.safetensors",
                "b": "model-00001-of-00002.safetensors",
                "c": "model-00001-of-00002.safetensors"
            }}"#,
        )
        .unwrap();

        let model_path = ModelPath::from_local(dir.path()).unwrap();

        assert!(model_path.is_local);
        assert_eq!(
            model_path.weights_files,
            vec![
                dir.path().join("model-00001-of-00002.safetensors"),
                dir.path().join("model-00002-of-00002.safetensors"),
            ]
        );
        assert!(model_path.validate().is_err());
    }

    #[test]
    fn test_model_type_detection() {
        let config = HubModelConfig::from_json(
            r#"{"architectures": ["LlamaForCausalLM"], "model_type": "llama", "max_position_embeddings": 8192}"#,
        )
        .unwrap();
        assert_eq!(config.model_type(), "llama");
        assert_eq!(config.max_position_embeddings, Some(8192));

        let inferred = HubModelConfig::from_json(r#"{"architectures": ["Qwen2ForCausalLM"]}"#).unwrap();
        assert_eq!(inferred.model_type(), "qwen2forcausallm");
    }
}
