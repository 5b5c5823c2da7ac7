//! Candle-based decoder model client
//!
//! Supports Llama (including Llama 3) and Qwen2 architectures via the Candle
//! ML framework.

use anyhow::{Context, Result};
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::generation::LogitsProcessor;
use candle_transformers::models::llama::{
    Cache as LlamaCache, Config as LlamaModelConfig, Llama, LlamaConfig,
};
use candle_transformers::models::qwen2::{Config as Qwen2Config, ModelForCausalLM as Qwen2Model};
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, MutexGuard};

use super::{Generator, GeneratorConfig, SamplingParams};
use crate::models::{select_device, HubModelConfig, ModelResolver, TokenizerWrapper};
use crate::rag::context::PromptTemplate;

/// Static facts about a loaded model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LlmMetadata {
    /// Context window in tokens
    pub context_window: usize,
    /// Maximum tokens generated per call
    pub num_output: usize,
    /// Model identifier
    pub model_name: String,
    /// Whether the model is driven through a chat interface
    pub is_chat_model: bool,
}

/// Local HuggingFace model client
pub struct HuggingFaceLlm {
    /// Model wrapped in Mutex for interior mutability (required for KV cache)
    model: Mutex<DecoderModel>,
    tokenizer: TokenizerWrapper,
    config: GeneratorConfig,
    device: Device,
    dtype: DType,
    stopping_ids: Vec<u32>,
    system_prompt: String,
    query_wrapper_prompt: PromptTemplate,
}

/// Enum for different model architectures
enum DecoderModel {
    Llama {
        model: Llama,
        config: LlamaModelConfig,
    },
    Qwen2(Qwen2Model),
}

impl DecoderModel {
    /// Reset per-generation state; Llama keeps its KV cache outside the model
    fn start_generation(&mut self, dtype: DType, device: &Device) -> Result<Option<LlamaCache>> {
        match self {
            DecoderModel::Llama { config, .. } => {
                Ok(Some(LlamaCache::new(true, dtype, config, device)?))
            }
            DecoderModel::Qwen2(model) => {
                model.clear_kv_cache();
                Ok(None)
            }
        }
    }

    fn forward(&mut self, input: &Tensor, pos: usize, cache: Option<&mut LlamaCache>) -> Result<Tensor> {
        match self {
            DecoderModel::Llama { model, .. } => {
                let cache = cache.context("Llama generation requires a KV cache")?;
                Ok(model.forward(input, pos, cache)?)
            }
            DecoderModel::Qwen2(model) => Ok(model.forward(input, pos)?),
        }
    }
}

impl HuggingFaceLlm {
    /// Load weights for `config.model_id` and build the client
    pub fn new(
        config: GeneratorConfig,
        tokenizer: TokenizerWrapper,
        stopping_ids: Vec<u32>,
        system_prompt: String,
        query_wrapper_prompt: PromptTemplate,
    ) -> Result<Self> {
        let device = select_device(config.device)?;
        let dtype = config.precision.to_dtype();

        tracing::info!("Loading generator model: {}", config.model_id);
        tracing::info!("  Device: {:?}", device);
        tracing::info!("  Precision: {}", config.precision);
        tracing::info!("  Context window: {}", config.context_window);
        tracing::info!("  Max new tokens: {}", config.max_new_tokens);

        let model = Self::load_model(&config, &device, dtype)?;

        tracing::info!("Generator loaded successfully");

        Ok(Self {
            model: Mutex::new(model),
            tokenizer,
            config,
            device,
            dtype,
            stopping_ids,
            system_prompt,
            query_wrapper_prompt,
        })
    }

    fn load_model(config: &GeneratorConfig, device: &Device, dtype: DType) -> Result<DecoderModel> {
        let model_path = ModelResolver::new().resolve_model(&config.model_id)?;
        model_path.validate()?;

        let config_str = std::fs::read_to_string(&model_path.config_file)
            .context("Failed to read model config")?;
        let hub_config = HubModelConfig::from_json(&config_str)?;
        let model_type = hub_config.model_type();

        tracing::info!(
            "Detected architecture: {:?}, model_type: {}",
            hub_config.architectures,
            model_type
        );

        if let Some(max_positions) = hub_config.max_position_embeddings {
            if max_positions < config.context_window {
                tracing::warn!(
                    "Configured context window {} exceeds the model's {} positions",
                    config.context_window,
                    max_positions
                );
            }
        }

        let is_llama = model_type.contains("llama");
        let is_qwen2 = model_type.contains("qwen2");
        if !is_llama && !is_qwen2 {
            anyhow::bail!(
                "Unsupported model architecture: {}. Supported: llama, qwen2",
                model_type
            );
        }

        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&model_path.weights_files, dtype, device)
                .context("Failed to load model weights")?
        };

        if is_llama {
            let llama_config: LlamaConfig = serde_json::from_str(&config_str)
                .context("Failed to parse Llama config")?;
            let llama_config = llama_config.into_config(false);

            tracing::info!(
                "Loading Llama: vocab={}, hidden={}, layers={}",
                llama_config.vocab_size,
                llama_config.hidden_size,
                llama_config.num_hidden_layers
            );

            let model = Llama::load(vb, &llama_config).context("Failed to create Llama model")?;
            Ok(DecoderModel::Llama {
                model,
                config: llama_config,
            })
        } else {
            let qwen_config: Qwen2Config = serde_json::from_str(&config_str)
                .context("Failed to parse Qwen2 config")?;

            tracing::info!(
                "Loading Qwen2: vocab={}, hidden={}, layers={}",
                qwen_config.vocab_size,
                qwen_config.hidden_size,
                qwen_config.num_hidden_layers
            );

            let model = Qwen2Model::new(&qwen_config, vb).context("Failed to create Qwen2 model")?;
            Ok(DecoderModel::Qwen2(model))
        }
    }

    /// Wrap a query with the query template and prefix the system prompt
    pub fn format_prompt(&self, query: &str) -> String {
        format_completion_prompt(&self.system_prompt, &self.query_wrapper_prompt, query)
    }

    /// Answer a raw query using the configured prompts and generation settings
    pub fn complete(&self, query: &str) -> Result<String> {
        let prompt = self.format_prompt(query);
        self.generate(&prompt, &self.config.sampling_params())
    }

    pub fn metadata(&self) -> LlmMetadata {
        LlmMetadata {
            context_window: self.config.context_window,
            num_output: self.config.max_new_tokens,
            model_name: self.config.model_id.clone(),
            is_chat_model: false,
        }
    }

    pub fn stopping_ids(&self) -> &[u32] {
        &self.stopping_ids
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn query_wrapper_prompt(&self) -> &PromptTemplate {
        &self.query_wrapper_prompt
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Start generating from a fully formatted prompt
    ///
    /// The model stays locked until the returned stream is dropped.
    pub fn stream(&self, prompt: &str, params: &SamplingParams) -> Result<GenerationStream<'_>> {
        let prompt_tokens = self.tokenizer.encode(prompt, true)?.input_ids;

        if prompt_tokens.is_empty() {
            anyhow::bail!("Empty prompt after tokenization");
        }
        if prompt_tokens.len() >= self.config.context_window {
            anyhow::bail!(
                "Prompt of {} tokens leaves no room in the {}-token context window",
                prompt_tokens.len(),
                self.config.context_window
            );
        }

        let prompt_tokens = match self.tokenizer.max_length() {
            Some(max_length) if prompt_tokens.len() > max_length => {
                tracing::warn!(
                    "Prompt of {} tokens exceeds tokenizer max length {}; dropping the oldest tokens",
                    prompt_tokens.len(),
                    max_length
                );
                keep_last_tokens(prompt_tokens, max_length)
            }
            _ => prompt_tokens,
        };
        let prompt_len = prompt_tokens.len();

        let requested = params.max_new_tokens.unwrap_or(self.config.max_new_tokens);
        let remaining = requested.min(self.config.context_window - prompt_len);

        let top_p = if params.do_sample && params.top_p < 1.0 {
            Some(params.top_p as f64)
        } else {
            None
        };
        let logits_processor = LogitsProcessor::new(
            params.seed.unwrap_or(self.config.seed),
            params.effective_temperature(),
            top_p,
        );

        let mut model = self
            .model
            .lock()
            .map_err(|e| anyhow::anyhow!("Model lock poisoned: {}", e))?;
        let cache = model.start_generation(self.dtype, &self.device)?;

        Ok(GenerationStream {
            llm: self,
            model,
            cache,
            logits_processor,
            params: params.clone(),
            tokens: prompt_tokens,
            prompt_len,
            pos: 0,
            remaining,
            emitted: 0,
            done: false,
        })
    }
}

/// Incremental generation, yielding newly decoded text after each token
pub struct GenerationStream<'a> {
    llm: &'a HuggingFaceLlm,
    model: MutexGuard<'a, DecoderModel>,
    cache: Option<LlamaCache>,
    logits_processor: LogitsProcessor,
    params: SamplingParams,
    tokens: Vec<u32>,
    prompt_len: usize,
    pos: usize,
    remaining: usize,
    /// Bytes of decoded output already yielded
    emitted: usize,
    done: bool,
}

impl GenerationStream<'_> {
    /// Run one decoding step; `None` when the token added no printable text
    fn step(&mut self) -> Result<Option<String>> {
        if self.remaining == 0 {
            self.done = true;
            return Ok(None);
        }
        self.remaining -= 1;

        let context_size = if self.pos == 0 { self.tokens.len() } else { 1 };
        let start_pos = self.tokens.len() - context_size;
        let input = Tensor::new(&self.tokens[start_pos..], &self.llm.device)?.unsqueeze(0)?;

        let logits = self.model.forward(&input, self.pos, self.cache.as_mut())?;
        self.pos += context_size;

        // Logits for the last position, as f32
        let logits = logits.squeeze(0)?.to_dtype(DType::F32)?;
        let logits = if logits.dims().len() > 1 {
            logits.get(logits.dim(0)? - 1)?
        } else {
            logits
        };

        let logits = if self.params.do_sample && self.params.top_k > 0 {
            apply_top_k(&logits, self.params.top_k)?
        } else {
            logits
        };

        let logits = if self.params.repetition_penalty != 1.0 {
            apply_repetition_penalty(&logits, &self.tokens, self.params.repetition_penalty)?
        } else {
            logits
        };

        let next_token = self.logits_processor.sample(&logits)?;
        if self.llm.stopping_ids.contains(&next_token) {
            tracing::debug!("Generation stopped: stop token {}", next_token);
            self.done = true;
            return Ok(None);
        }
        self.tokens.push(next_token);

        let text = self
            .llm
            .tokenizer
            .decode(&self.tokens[self.prompt_len..], true)?;
        if self.params.stop_sequences.iter().any(|s| text.contains(s.as_str())) {
            tracing::debug!("Generation stopped: stop sequence");
            self.done = true;
        }

        if text.len() > self.emitted && text.is_char_boundary(self.emitted) {
            let piece = text[self.emitted..].to_string();
            self.emitted = text.len();
            Ok(Some(piece))
        } else {
            Ok(None)
        }
    }

    /// Number of tokens generated so far
    pub fn generated_tokens(&self) -> usize {
        self.tokens.len() - self.prompt_len
    }
}

impl Iterator for GenerationStream<'_> {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            match self.step() {
                Ok(Some(piece)) => return Some(Ok(piece)),
                Ok(None) => {}
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
        None
    }
}

impl Generator for HuggingFaceLlm {
    fn generate(&self, prompt: &str, params: &SamplingParams) -> Result<String> {
        let output: String = self.stream(prompt, params)?.collect::<Result<_>>()?;
        Ok(output.trim().to_string())
    }

    fn generate_stream(
        &self,
        prompt: &str,
        params: &SamplingParams,
    ) -> Result<Box<dyn Iterator<Item = Result<String>> + '_>> {
        Ok(Box::new(self.stream(prompt, params)?))
    }

    fn model_name(&self) -> &str {
        &self.config.model_id
    }

    fn max_context_length(&self) -> usize {
        self.config.context_window
    }

    fn count_tokens(&self, text: &str) -> Result<usize> {
        let encoded = self.tokenizer.encode(text, false)?;
        Ok(encoded.input_ids.len())
    }
}

/// `"<system> <wrapped query>"`, or just the wrapped query without a system prompt
pub fn format_completion_prompt(system_prompt: &str, query_wrapper: &PromptTemplate, query: &str) -> String {
    let wrapped = query_wrapper.format(&[("query_str", query)]);
    if system_prompt.is_empty() {
        wrapped
    } else {
        format!("{} {}", system_prompt, wrapped)
    }
}

/// Drop tokens from the front so the end of the prompt survives
fn keep_last_tokens(mut tokens: Vec<u32>, max_length: usize) -> Vec<u32> {
    if tokens.len() > max_length {
        tokens.drain(..tokens.len() - max_length);
    }
    tokens
}

/// Apply top-k filtering to logits
fn apply_top_k(logits: &Tensor, k: usize) -> Result<Tensor> {
    let vocab_size = logits.dim(0)?;
    if k >= vocab_size {
        return Ok(logits.clone());
    }

    let logits_vec: Vec<f32> = logits.to_vec1()?;
    let mut indexed: Vec<(usize, f32)> = logits_vec.iter().copied().enumerate().collect();
    indexed.sort_by(|a, b| b.1.total_cmp(&a.1));

    // Set non-top-k to -inf
    let mut filtered = vec![f32::NEG_INFINITY; vocab_size];
    for (idx, val) in indexed.into_iter().take(k) {
        filtered[idx] = val;
    }

    Ok(Tensor::new(&filtered[..], logits.device())?)
}

/// Apply repetition penalty
fn apply_repetition_penalty(logits: &Tensor, tokens: &[u32], penalty: f32) -> Result<Tensor> {
    let mut logits_vec: Vec<f32> = logits.to_vec1()?;

    for &token in tokens {
        let idx = token as usize;
        if idx < logits_vec.len() {
            if logits_vec[idx] > 0.0 {
                logits_vec[idx] /= penalty;
            } else {
                logits_vec[idx] *= penalty;
            }
        }
    }

    Ok(Tensor::new(&logits_vec[..], logits.device())?)
}
