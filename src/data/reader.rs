//! Directory reader
//!
//! Collects the files of a dataset directory and loads each one into a
//! [`Document`] with the matching format loader.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use super::dataset::DatasetConfig;
use super::loaders::MultiFormatLoader;
use super::Document;

/// Reads every eligible file of a directory into documents, in path order
pub struct DirectoryReader {
    input_dir: PathBuf,
    recursive: bool,
    exclude_hidden: bool,
    required_exts: Vec<String>,
    num_files_limit: Option<usize>,
    filename_as_id: bool,
    skip_on_error: bool,
    loader: MultiFormatLoader,
}

impl DirectoryReader {
    /// Reader with default settings: top level only, hidden files skipped
    pub fn new(input_dir: impl Into<PathBuf>) -> Self {
        Self {
            input_dir: input_dir.into(),
            recursive: false,
            exclude_hidden: true,
            required_exts: Vec::new(),
            num_files_limit: None,
            filename_as_id: false,
            skip_on_error: false,
            loader: MultiFormatLoader::new(),
        }
    }

    /// Reader configured from dataset settings
    pub fn from_config(config: &DatasetConfig) -> Self {
        Self::new(&config.dir)
            .recursive(config.recursive)
            .exclude_hidden(config.exclude_hidden)
            .required_exts(config.required_exts.clone())
            .num_files_limit(config.num_files_limit)
            .filename_as_id(config.filename_as_id)
            .skip_on_error(config.skip_on_error)
    }

    /// Descend into subdirectories
    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    /// Skip files and directories whose name starts with `.`
    pub fn exclude_hidden(mut self, exclude: bool) -> Self {
        self.exclude_hidden = exclude;
        self
    }

    /// Only load files with these extensions (with or without the leading dot)
    pub fn required_exts(mut self, exts: Vec<String>) -> Self {
        self.required_exts = exts
            .into_iter()
            .map(|ext| ext.trim_start_matches('.').to_lowercase())
            .collect();
        self
    }

    /// Load at most this many files, after sorting
    pub fn num_files_limit(mut self, limit: Option<usize>) -> Self {
        self.num_files_limit = limit;
        self
    }

    /// Use the file path as document id instead of its hash
    pub fn filename_as_id(mut self, enabled: bool) -> Self {
        self.filename_as_id = enabled;
        self
    }

    /// Log and skip files that fail to load instead of failing the whole read
    pub fn skip_on_error(mut self, enabled: bool) -> Self {
        self.skip_on_error = enabled;
        self
    }

    /// The directory this reader reads
    pub fn input_dir(&self) -> &Path {
        &self.input_dir
    }

    /// Eligible files, sorted and limited
    pub fn list_files(&self) -> Result<Vec<PathBuf>> {
        if !self.input_dir.is_dir() {
            anyhow::bail!("Directory {} does not exist.", self.input_dir.display());
        }

        let mut files = Vec::new();
        self.collect_files(&self.input_dir, &mut files)?;
        files.sort();

        if let Some(limit) = self.num_files_limit {
            files.truncate(limit);
        }

        if files.is_empty() {
            anyhow::bail!("No files found in {}.", self.input_dir.display());
        }

        Ok(files)
    }

    fn collect_files(&self, dir: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
        for entry in fs::read_dir(dir)
            .with_context(|| format!("Failed to read directory: {:?}", dir))?
        {
            let path = entry?.path();

            if self.exclude_hidden && is_hidden(&path) {
                continue;
            }

            if path.is_dir() {
                if self.recursive {
                    self.collect_files(&path, files)?;
                }
            } else if path.is_file() && self.extension_allowed(&path) {
                files.push(path);
            }
        }

        Ok(())
    }

    fn extension_allowed(&self, path: &Path) -> bool {
        if self.required_exts.is_empty() {
            return true;
        }
        path.extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .is_some_and(|ext| self.required_exts.contains(&ext))
    }

    /// Load every eligible file
    pub fn load_data(&self) -> Result<Vec<Document>> {
        let files = self.list_files()?;
        tracing::debug!("Loading {} files from {:?}", files.len(), self.input_dir);

        let mut documents = Vec::with_capacity(files.len());
        for path in files {
            match self.loader.load(&path) {
                Ok(mut document) => {
                    if self.filename_as_id {
                        document.id = path.to_string_lossy().to_string();
                    }
                    documents.push(document);
                }
                Err(e) if self.skip_on_error => {
                    tracing::warn!("Failed to load file {:?}: {:#}. Skipping...", path, e);
                }
                Err(e) => return Err(e),
            }
        }

        Ok(documents)
    }
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .map(|name| name.to_string_lossy().starts_with('.'))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, name: &str, content: &str) {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_single_file_loads_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "hello.txt", "hello world");

        let documents = DirectoryReader::new(dir.path()).load_data().unwrap();

        assert_eq!(documents.len(), 1);
        assert_eq!(documents[0].content, "hello world");
        assert_eq!(documents[0].metadata.file_name.as_deref(), Some("hello.txt"));
    }

    #[test]
    fn test_documents_sorted_by_path() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "c.txt", "third");
        write(dir.path(), "a.md", "# first");
        write(dir.path(), "b.txt", "second");

        let documents = DirectoryReader::new(dir.path()).load_data().unwrap();

        let names: Vec<_> = documents
            .iter()
            .map(|d| d.metadata.file_name.clone().unwrap())
            .collect();
        assert_eq!(names, vec!["a.md", "b.txt", "c.txt"]);
    }

    #[test]
    fn test_hidden_files_skipped_by_default() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "visible.txt", "yes");
        write(dir.path(), ".hidden.txt", "no");

        let files = DirectoryReader::new(dir.path()).list_files().unwrap();
        assert_eq!(files, vec![dir.path().join("visible.txt")]);

        let all = DirectoryReader::new(dir.path())
            .exclude_hidden(false)
            .list_files()
            .unwrap();
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn test_recursive_and_required_exts() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "top.txt", "top");
        write(dir.path(), "nested/inner.txt", "inner");
        write(dir.path(), "nested/notes.md", "notes");
        write(dir.path(), ".git/config.txt", "ignored");

        let flat = DirectoryReader::new(dir.path()).list_files().unwrap();
        assert_eq!(flat.len(), 1);

        let deep = DirectoryReader::new(dir.path())
            .recursive(true)
            .required_exts(vec![".txt".to_string()])
            .list_files()
            .unwrap();
        assert_eq!(
            deep,
            vec![dir.path().join("nested/inner.txt"), dir.path().join("top.txt")]
        );
    }

    #[test]
    fn test_num_files_limit_and_filename_as_id() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.txt", "a");
        write(dir.path(), "b.txt", "b");

        let documents = DirectoryReader::new(dir.path())
            .num_files_limit(Some(1))
            .filename_as_id(true)
            .load_data()
            .unwrap();

        assert_eq!(documents.len(), 1);
        assert_eq!(
            documents[0].id,
            dir.path().join("a.txt").to_string_lossy().to_string()
        );
    }

    #[test]
    fn test_missing_directory_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");

        let err = DirectoryReader::new(&missing).load_data().unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn test_empty_directory_is_error() {
        let dir = tempfile::tempdir().unwrap();

        let err = DirectoryReader::new(dir.path()).load_data().unwrap_err();
        assert!(err.to_string().contains("No files found"));
    }

    #[test]
    fn test_invalid_utf8_does_not_fail_load() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.txt", "hello world");
        fs::write(dir.path().join("b.txt"), b"caf\xe9").unwrap();

        let documents = DirectoryReader::new(dir.path()).load_data().unwrap();

        assert_eq!(documents.len(), 2);
        assert_eq!(documents[0].content, "hello world");
        assert_eq!(documents[1].content, "caf");
    }

    #[test]
    fn test_load_failure_propagates_unless_skipped() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "good.txt", "fine");
        // Not a PDF; fails with or without the pdf feature
        write(dir.path(), "bad.pdf", "plain text");

        assert!(DirectoryReader::new(dir.path()).load_data().is_err());

        let documents = DirectoryReader::new(dir.path())
            .skip_on_error(true)
            .load_data()
            .unwrap();
        assert_eq!(documents.len(), 1);
        assert_eq!(documents[0].content, "fine");
    }
}
