//! Document loaders for various file formats
//!
//! Supports PDF, Markdown, and plain text documents. Files with any other
//! extension are read as text. Invalid UTF-8 is dropped from all text reads.

use crate::data::{Document, DocumentMetadata};
use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Trait for loading documents from various sources
pub trait DocumentLoader {
    /// Load a document from the given path
    fn load(&self, path: &Path) -> Result<Document>;

    /// Check if this loader can handle the given file extension
    fn can_load(&self, path: &Path) -> bool;
}

/// Text file loader
pub struct TextLoader;

impl DocumentLoader for TextLoader {
    fn load(&self, path: &Path) -> Result<Document> {
        let content = read_text(path)
            .with_context(|| format!("Failed to read text file: {:?}", path))?;

        build_document(path, content, "txt")
    }

    fn can_load(&self, path: &Path) -> bool {
        has_extension(path, &["txt"])
    }
}

/// Markdown file loader
pub struct MarkdownLoader;

impl DocumentLoader for MarkdownLoader {
    fn load(&self, path: &Path) -> Result<Document> {
        let content = read_text(path)
            .with_context(|| format!("Failed to read markdown file: {:?}", path))?;

        build_document(path, content, "md")
    }

    fn can_load(&self, path: &Path) -> bool {
        has_extension(path, &["md", "markdown"])
    }
}

/// PDF file loader
pub struct PdfLoader;

impl DocumentLoader for PdfLoader {
    fn load(&self, _path: &Path) -> Result<Document> {
        #[cfg(feature = "pdf")]
        {
            let content = pdf_extract::extract_text(_path)
                .with_context(|| format!("Failed to extract text from PDF: {:?}", _path))?;

            build_document(_path, content, "pdf")
        }

        #[cfg(not(feature = "pdf"))]
        {
            anyhow::bail!("PDF support not enabled. Compile with --features pdf")
        }
    }

    fn can_load(&self, path: &Path) -> bool {
        has_extension(path, &["pdf"])
    }
}

/// Reads any file as text, dropping invalid UTF-8
pub struct LossyTextLoader;

impl DocumentLoader for LossyTextLoader {
    fn load(&self, path: &Path) -> Result<Document> {
        let content = read_text(path).with_context(|| format!("Failed to read file: {:?}", path))?;

        let file_type = path
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        build_document(path, content, &file_type)
    }

    fn can_load(&self, _path: &Path) -> bool {
        true
    }
}

/// Multi-format document loader that delegates to specific loaders
pub struct MultiFormatLoader {
    loaders: Vec<Box<dyn DocumentLoader>>,
}

impl MultiFormatLoader {
    /// Create a new multi-format loader with all supported loaders
    pub fn new() -> Self {
        let loaders: Vec<Box<dyn DocumentLoader>> = vec![
            Box::new(TextLoader),
            Box::new(MarkdownLoader),
            Box::new(PdfLoader),
            Box::new(LossyTextLoader),
        ];

        Self { loaders }
    }

    /// Load a document, automatically selecting the appropriate loader
    pub fn load(&self, path: &Path) -> Result<Document> {
        for loader in &self.loaders {
            if loader.can_load(path) {
                return loader.load(path);
            }
        }

        anyhow::bail!("No loader found for file: {:?}", path)
    }
}

impl Default for MultiFormatLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| extensions.iter().any(|e| ext.eq_ignore_ascii_case(e)))
        .unwrap_or(false)
}

/// Read a file as UTF-8, skipping byte sequences that are not valid UTF-8
fn read_text(path: &Path) -> std::io::Result<String> {
    let bytes = fs::read(path)?;
    Ok(bytes.utf8_chunks().map(|chunk| chunk.valid()).collect())
}

fn build_document(path: &Path, content: String, file_type: &str) -> Result<Document> {
    let file_metadata = fs::metadata(path)
        .with_context(|| format!("Failed to read metadata: {:?}", path))?;

    let last_modified = file_metadata.modified().ok().map(|time| {
        chrono::DateTime::<chrono::Utc>::from(time)
            .format("%Y-%m-%d")
            .to_string()
    });

    let metadata = DocumentMetadata {
        file_path: Some(path.to_path_buf()),
        file_name: path.file_name().map(|name| name.to_string_lossy().to_string()),
        file_type: file_type.to_string(),
        size: Some(file_metadata.len() as usize),
        last_modified,
        custom: HashMap::new(),
    };

    Ok(Document::new(
        generate_document_id(path),
        path.to_string_lossy().to_string(),
        content,
        metadata,
    ))
}

/// Generate a stable document ID from the SHA-256 of the file path
pub fn generate_document_id(path: &Path) -> String {
    let mut hasher = Sha256::new();
    hasher.update(path.to_string_lossy().as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    format!("doc_{}", &digest[..16])
}
