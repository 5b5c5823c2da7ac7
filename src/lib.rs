//! # docrag
//!
//! Building blocks for a document question-answering pipeline over a local
//! HuggingFace decoder model.
//!
//! ## Overview
//!
//! - Load a directory of documents into memory
//! - Hold the system prompt and the query-wrapper template
//! - Resolve a tokenizer, derive its stop-token ids and load the model
//!
//! ## Architecture
//!
//! - `data` - Directory reading and per-format document loaders
//! - `rag` - Prompt templates and the generation client
//! - `models` - Device selection, Hub resolution and tokenizers
//! - `config` - TOML settings with environment overrides
//! - `cli` - Command-line interface

pub mod cli;
pub mod config;
pub mod data;
pub mod models;
pub mod rag;

// Re-export commonly used types
pub use anyhow::{Error, Result};
