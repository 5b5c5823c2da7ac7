//! Prompt construction
//!
//! Holds the system prompt and the template that wraps each user query
//! before it is handed to the model.

mod provider;
mod templates;

pub use provider::{PromptConfig, PromptProvider};
pub use templates::PromptTemplate;
