//! Model resolution and loading support
//!
//! # Modules
//!
//! - `device` - CPU/CUDA/Metal selection and weight precision
//! - `hub` - HuggingFace Hub and local directory resolution
//! - `tokenizer` - Tokenizer loading with special-token metadata

pub mod device;
pub mod hub;
pub mod tokenizer;

// Re-exports
pub use device::{select_device, DevicePreference, Precision};
pub use hub::{HubApi, HubModelConfig, ModelPath, ModelResolver, TokenizerFiles};
pub use tokenizer::{EncodedInput, TokenizerWrapper};
