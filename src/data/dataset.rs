//! Dataset loading

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::reader::DirectoryReader;
use super::Document;

/// Where the dataset lives and how its directory is read
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    /// Dataset directory
    pub dir: PathBuf,
    /// Descend into subdirectories
    pub recursive: bool,
    /// Skip dot-files and dot-directories
    pub exclude_hidden: bool,
    /// Only load these extensions (empty = all)
    pub required_exts: Vec<String>,
    /// Maximum number of files to load
    pub num_files_limit: Option<usize>,
    /// Use file paths as document ids
    pub filename_as_id: bool,
    /// Skip unreadable files instead of failing
    pub skip_on_error: bool,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("data"),
            recursive: false,
            exclude_hidden: true,
            required_exts: Vec::new(),
            num_files_limit: None,
            filename_as_id: false,
            skip_on_error: false,
        }
    }
}

impl DatasetConfig {
    /// Config for the given directory with default reader settings
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            ..Default::default()
        }
    }
}

/// Loads the configured dataset directory into documents
pub struct DatasetLoader {
    config: DatasetConfig,
}

impl DatasetLoader {
    pub fn new(config: &DatasetConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    pub fn dataset_dir(&self) -> &Path {
        &self.config.dir
    }

    /// Read every document in the dataset directory
    pub fn load_dataset(&self) -> Result<Vec<Document>> {
        tracing::info!("Loading dataset...");
        DirectoryReader::from_config(&self.config).load_data()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_load_dataset_hello_world() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("greeting.txt"), "hello world").unwrap();

        let loader = DatasetLoader::new(&DatasetConfig::new(dir.path()));
        let documents = loader.load_dataset().unwrap();

        assert_eq!(loader.dataset_dir(), dir.path());
        assert_eq!(documents.len(), 1);
        assert_eq!(documents[0].content, "hello world");
    }

    #[test]
    fn test_load_dataset_known_files() {
        let dir = tempfile::tempdir().unwrap();
        for (name, body) in [("one.txt", "1"), ("two.md", "2"), ("three.txt", "3")] {
            fs::write(dir.path().join(name), body).unwrap();
        }

        let documents = DatasetLoader::new(&DatasetConfig::new(dir.path()))
            .load_dataset()
            .unwrap();

        assert_eq!(documents.len(), 3);
        let contents: Vec<_> = documents.iter().map(|d| d.content.as_str()).collect();
        assert_eq!(contents, vec!["1", "3", "2"]);
    }

    #[test]
    fn test_load_dataset_missing_dir_propagates() {
        let loader = DatasetLoader::new(&DatasetConfig::new("/definitely/not/a/dataset"));
        assert!(loader.load_dataset().is_err());
    }

    #[test]
    fn test_config_defaults() {
        let config = DatasetConfig::default();
        assert_eq!(config.dir, PathBuf::from("data"));
        assert!(config.exclude_hidden);
        assert!(!config.recursive);
        assert!(!config.skip_on_error);
    }
}
