//! Prompt and generation components of the RAG pipeline
//!
//! # Architecture
//!
//! ```text
//! PromptConfig ──► PromptProvider ──┐ system prompt
//!                                   │ query-wrapper template
//!                                   ▼
//! GeneratorConfig ─────────────► ModelLoader ──► HuggingFaceLlm
//!                                (tokenizer,      (weights, device,
//!                                 stop ids)        generation)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use docrag::rag::{GeneratorConfig, ModelLoader, PromptConfig, PromptProvider};
//!
//! let prompts = PromptProvider::new(&PromptConfig::default());
//! let loader = ModelLoader::new(
//!     &GeneratorConfig::default(),
//!     prompts.get_system_prompt(),
//!     prompts.get_query_wrapper_prompt(),
//! )?;
//! let llm = loader.load_llm()?;
//! println!("{}", llm.complete("What is in the dataset?")?);
//! ```

pub mod context;
pub mod generator;

// Re-exports for convenience
pub use context::{PromptConfig, PromptProvider, PromptTemplate};
pub use generator::{
    GenerationStream, Generator, GeneratorConfig, HuggingFaceLlm, LlmMetadata, ModelLoader,
    SamplingParams,
};
