//! Configuration for text generators
//!
//! Defines the model-loading configuration and the sampling parameters that
//! control each generation call.

use crate::models::{DevicePreference, Precision};
use serde::{Deserialize, Serialize};

/// Configuration for initializing a generator model
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// HuggingFace model ID or local path
    pub model_id: String,

    /// Context window of the model, in tokens
    pub context_window: usize,

    /// Maximum new tokens to generate
    pub max_new_tokens: usize,

    /// Sampling temperature (ignored under greedy decoding)
    pub temperature: f32,

    /// Sample from the distribution instead of greedy decoding
    pub do_sample: bool,

    /// Device preference (auto, cuda, metal, cpu)
    pub device: DevicePreference,

    /// Weight precision (f16, bf16, f32)
    pub precision: Precision,

    /// Prompts are truncated to this many tokens
    pub tokenizer_max_length: usize,

    /// Special tokens that end generation, in addition to the eos token
    pub stop_tokens: Vec<String>,

    /// Seed for the sampler
    pub seed: u64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            model_id: "meta-llama/Meta-Llama-3-8B-Instruct".to_string(),
            context_window: 8192,
            max_new_tokens: 256,
            temperature: 0.7,
            do_sample: false,
            device: DevicePreference::Auto,
            precision: Precision::F16,
            tokenizer_max_length: 4096,
            stop_tokens: vec!["<|eot_id|>".to_string()],
            seed: 42,
        }
    }
}

impl GeneratorConfig {
    /// Create a new generator config with the given model ID
    pub fn new(model_id: &str) -> Self {
        Self {
            model_id: model_id.to_string(),
            ..Default::default()
        }
    }

    /// Set the device preference
    pub fn with_device(mut self, device: DevicePreference) -> Self {
        self.device = device;
        self
    }

    /// Set the weight precision
    pub fn with_precision(mut self, precision: Precision) -> Self {
        self.precision = precision;
        self
    }

    /// Set the maximum new tokens
    pub fn with_max_new_tokens(mut self, max_tokens: usize) -> Self {
        self.max_new_tokens = max_tokens;
        self
    }

    /// Set the context window
    pub fn with_context_window(mut self, context_window: usize) -> Self {
        self.context_window = context_window;
        self
    }

    /// Set the special stop tokens
    pub fn with_stop_tokens(mut self, tokens: Vec<String>) -> Self {
        self.stop_tokens = tokens;
        self
    }

    /// Enable sampling at the given temperature
    pub fn with_sampling(mut self, temperature: f32) -> Self {
        self.do_sample = true;
        self.temperature = temperature;
        self
    }

    /// Sampling parameters implied by this config
    pub fn sampling_params(&self) -> SamplingParams {
        SamplingParams {
            temperature: self.temperature,
            do_sample: self.do_sample,
            max_new_tokens: Some(self.max_new_tokens),
            seed: Some(self.seed),
            ..Default::default()
        }
    }
}

/// Sampling parameters for text generation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplingParams {
    /// Sample instead of picking the most likely token
    pub do_sample: bool,

    /// Temperature (higher = more random); only used when sampling
    pub temperature: f32,

    /// Top-p (nucleus sampling) cumulative probability threshold
    pub top_p: f32,

    /// Top-k sampling (0 = disabled)
    pub top_k: usize,

    /// Repetition penalty (1.0 = no penalty)
    pub repetition_penalty: f32,

    /// Maximum new tokens to generate (overrides config if set)
    pub max_new_tokens: Option<usize>,

    /// Stop sequences - generation stops when any of these are produced
    pub stop_sequences: Vec<String>,

    /// Random seed for reproducibility (None = fixed default)
    pub seed: Option<u64>,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            do_sample: false,
            temperature: 0.7,
            top_p: 1.0,
            top_k: 50,
            repetition_penalty: 1.0,
            max_new_tokens: None,
            stop_sequences: vec![],
            seed: None,
        }
    }
}

impl SamplingParams {
    /// Create greedy decoding parameters (deterministic)
    pub fn greedy() -> Self {
        Self::default()
    }

    /// Enable sampling at the given temperature
    pub fn with_temperature(mut self, temp: f32) -> Self {
        self.do_sample = true;
        self.temperature = temp;
        self
    }

    /// Set top-p
    pub fn with_top_p(mut self, top_p: f32) -> Self {
        self.top_p = top_p;
        self
    }

    /// Set top-k
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// Set max new tokens
    pub fn with_max_new_tokens(mut self, max_tokens: usize) -> Self {
        self.max_new_tokens = Some(max_tokens);
        self
    }

    /// Add stop sequences
    pub fn with_stop_sequences(mut self, sequences: Vec<String>) -> Self {
        self.stop_sequences = sequences;
        self
    }

    /// Sampler temperature, `None` under greedy decoding
    pub fn effective_temperature(&self) -> Option<f64> {
        if self.do_sample && self.temperature > 0.0 {
            Some(self.temperature as f64)
        } else {
            None
        }
    }
}
