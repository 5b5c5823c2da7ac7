//! Document ingestion
//!
//! Loads documents from a dataset directory (plain text, Markdown, PDF and
//! anything else readable as text) into an ordered in-memory collection.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

pub mod dataset;
pub mod loaders;
pub mod reader;

// Re-exports for convenience
pub use dataset::{DatasetConfig, DatasetLoader};
pub use loaders::*;
pub use reader::DirectoryReader;

/// Represents a loaded document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Unique identifier for the document
    pub id: String,
    /// The source path or identifier
    pub source: String,
    /// Full text content of the document
    pub content: String,
    /// Metadata associated with the document
    pub metadata: DocumentMetadata,
}

/// Metadata for a document
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DocumentMetadata {
    /// File path if applicable
    pub file_path: Option<PathBuf>,
    /// File name without directories
    pub file_name: Option<String>,
    /// File type (pdf, md, txt, etc.)
    pub file_type: String,
    /// File size in bytes
    pub size: Option<usize>,
    /// Last modification date (YYYY-MM-DD)
    pub last_modified: Option<String>,
    /// Custom metadata fields
    #[serde(flatten)]
    pub custom: HashMap<String, String>,
}

impl Document {
    /// Create a new document
    pub fn new(id: String, source: String, content: String, metadata: DocumentMetadata) -> Self {
        Self {
            id,
            source,
            content,
            metadata,
        }
    }
}
