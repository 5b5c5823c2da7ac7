//! Tokenizer wrapper for HuggingFace tokenizers
//!
//! Loads `tokenizer.json` together with the special-token metadata that
//! `tokenizer.json` itself does not carry (the end-of-sequence token lives in
//! `tokenizer_config.json` or `generation_config.json`).

use anyhow::{Context, Result};
use serde_json::Value;
use std::path::Path;
use tokenizers::Tokenizer;

use super::hub::{ModelResolver, TokenizerFiles};

/// End-of-sequence tokens tried when the model ships no special-token metadata
const FALLBACK_EOS_TOKENS: &[&str] = &[
    "<|end_of_text|>",
    "<|endoftext|>",
    "</s>",
    "<|im_end|>",
    "<eos>",
];

/// Wrapper around HuggingFace tokenizer
#[derive(Clone)]
pub struct TokenizerWrapper {
    tokenizer: Tokenizer,
    eos_token: Option<String>,
    eos_token_id: Option<u32>,
    max_length: Option<usize>,
}

impl TokenizerWrapper {
    fn load(path: &Path) -> Result<Self> {
        let tokenizer = Tokenizer::from_file(path)
            .map_err(|e| anyhow::anyhow!("Failed to load tokenizer {:?}: {}", path, e))?;

        Ok(Self {
            tokenizer,
            eos_token: None,
            eos_token_id: None,
            max_length: None,
        })
    }

    /// Load tokenizer from a bare tokenizer.json, without special-token metadata
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let mut wrapper = Self::load(path.as_ref())?;
        wrapper.resolve_fallback_eos();
        Ok(wrapper)
    }

    /// Load tokenizer and special-token metadata from resolved files
    ///
    /// The eos token comes from `tokenizer_config.json`, then
    /// `generation_config.json`, then well-known end tokens in the vocabulary.
    pub fn from_files(files: &TokenizerFiles) -> Result<Self> {
        let mut wrapper = Self::load(&files.tokenizer_file)?;

        if let Some(path) = &files.tokenizer_config_file {
            let config = read_json(path)?;
            if let Some(eos) = config.get("eos_token").and_then(special_token_content) {
                let id = wrapper.tokenizer.token_to_id(&eos).ok_or_else(|| {
                    anyhow::anyhow!("eos token {:?} from {:?} is not in the vocabulary", eos, path)
                })?;
                wrapper.eos_token = Some(eos);
                wrapper.eos_token_id = Some(id);
            }
        }

        if wrapper.eos_token_id.is_none() {
            if let Some(path) = &files.generation_config_file {
                let config = read_json(path)?;
                if let Some(id) = config.get("eos_token_id").and_then(first_token_id) {
                    wrapper.eos_token = wrapper.tokenizer.id_to_token(id);
                    wrapper.eos_token_id = Some(id);
                }
            }
        }

        if wrapper.eos_token_id.is_none() {
            wrapper.resolve_fallback_eos();
        }

        Ok(wrapper)
    }

    /// Load tokenizer from HuggingFace Hub or local path
    pub fn from_pretrained(model_id_or_path: &str) -> Result<Self> {
        let files = ModelResolver::new().resolve_tokenizer(model_id_or_path)?;
        Self::from_files(&files)
            .with_context(|| format!("Failed to load tokenizer for {}", model_id_or_path))
    }

    /// Record the longest input the model should be given
    ///
    /// Encoding never truncates; callers decide what to drop.
    pub fn with_max_length(mut self, max_length: usize) -> Self {
        self.max_length = Some(max_length);
        self
    }

    /// Maximum input length, if any
    pub fn max_length(&self) -> Option<usize> {
        self.max_length
    }

    fn resolve_fallback_eos(&mut self) {
        for token in FALLBACK_EOS_TOKENS {
            if let Some(id) = self.tokenizer.token_to_id(token) {
                self.eos_token = Some(token.to_string());
                self.eos_token_id = Some(id);
                return;
            }
        }
    }

    /// End-of-sequence token string
    pub fn eos_token(&self) -> Option<&str> {
        self.eos_token.as_deref()
    }

    /// End-of-sequence token id
    pub fn eos_token_id(&self) -> Option<u32> {
        self.eos_token_id
    }

    /// Look up a token in the vocabulary, including added tokens
    pub fn token_to_id(&self, token: &str) -> Option<u32> {
        self.tokenizer.token_to_id(token)
    }

    /// Encode a single text
    pub fn encode(&self, text: &str, add_special_tokens: bool) -> Result<EncodedInput> {
        let encoding = self
            .tokenizer
            .encode(text, add_special_tokens)
            .map_err(|e| anyhow::anyhow!("Tokenization failed: {}", e))?;

        Ok(EncodedInput {
            input_ids: encoding.get_ids().to_vec(),
            attention_mask: encoding.get_attention_mask().to_vec(),
        })
    }

    /// Decode token IDs back to text
    pub fn decode(&self, ids: &[u32], skip_special_tokens: bool) -> Result<String> {
        self.tokenizer
            .decode(ids, skip_special_tokens)
            .map_err(|e| anyhow::anyhow!("Decoding failed: {}", e))
    }

    /// Get vocabulary size
    pub fn vocab_size(&self) -> usize {
        self.tokenizer.get_vocab_size(true)
    }
}

/// Encoded input for a single text
#[derive(Debug, Clone)]
pub struct EncodedInput {
    /// Token IDs
    pub input_ids: Vec<u32>,
    /// Attention mask (1 for real tokens, 0 for padding)
    pub attention_mask: Vec<u32>,
}

impl EncodedInput {
    /// Get sequence length
    pub fn len(&self) -> usize {
        self.input_ids.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.input_ids.is_empty()
    }
}

fn read_json(path: &Path) -> Result<Value> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {:?}", path))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {:?}", path))
}

/// Special tokens appear either as a bare string or as `{"content": "..."}`
fn special_token_content(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Object(map) => map.get("content").and_then(Value::as_str).map(str::to_string),
        _ => None,
    }
}

fn first_token_id(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n.as_u64().map(|id| id as u32),
        Value::Array(ids) => ids.first().and_then(first_token_id),
        _ => None,
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::write_tokenizer;
    use super::*;

    #[test]
    fn test_eos_from_tokenizer_config() {
        let dir = tempfile::tempdir().unwrap();
        write_tokenizer(dir.path(), Some("<|eot_id|>"));

        let tokenizer = TokenizerWrapper::from_pretrained(dir.path().to_str().unwrap()).unwrap();

        assert_eq!(tokenizer.eos_token(), Some("<|eot_id|>"));
        assert_eq!(tokenizer.eos_token_id(), Some(6));
        assert_eq!(tokenizer.vocab_size(), 7);
    }

    #[test]
    fn test_eos_from_generation_config() {
        let dir = tempfile::tempdir().unwrap();
        write_tokenizer(dir.path(), None);
        std::fs::write(
            dir.path().join("generation_config.json"),
            r#"{"eos_token_id": [6, 5]}"#,
        )
        .unwrap();

        let tokenizer = TokenizerWrapper::from_pretrained(dir.path().to_str().unwrap()).unwrap();

        assert_eq!(tokenizer.eos_token_id(), Some(6));
        assert_eq!(tokenizer.eos_token(), Some("<|eot_id|>"));
    }

    #[test]
    fn test_eos_fallback_to_known_token() {
        let dir = tempfile::tempdir().unwrap();
        write_tokenizer(dir.path(), None);

        let tokenizer = TokenizerWrapper::from_file(dir.path().join("tokenizer.json")).unwrap();

        assert_eq!(tokenizer.eos_token(), Some("<|end_of_text|>"));
        assert_eq!(tokenizer.eos_token_id(), Some(5));
    }

    #[test]
    fn test_eos_missing_from_vocab_is_error() {
        let dir = tempfile::tempdir().unwrap();
        write_tokenizer(dir.path(), Some("<|im_end|>"));

        let result = TokenizerWrapper::from_pretrained(dir.path().to_str().unwrap());
        assert!(result.is_err());
    }

    #[test]
    fn test_encode_decode_ignores_max_length() {
        let dir = tempfile::tempdir().unwrap();
        write_tokenizer(dir.path(), Some("<|end_of_text|>"));

        let tokenizer = TokenizerWrapper::from_file(dir.path().join("tokenizer.json"))
            .unwrap()
            .with_max_length(2);

        let encoded = tokenizer.encode("hello world answer", false).unwrap();
        assert_eq!(tokenizer.max_length(), Some(2));
        assert_eq!(encoded.input_ids, vec![1, 2, 3]);
        assert_eq!(encoded.len(), encoded.attention_mask.len());
        assert_eq!(
            tokenizer.decode(&encoded.input_ids, true).unwrap(),
            "hello world answer"
        );
    }

    #[test]
    fn test_special_token_content_forms() {
        assert_eq!(
            special_token_content(&serde_json::json!("</s>")),
            Some("</s>".to_string())
        );
        assert_eq!(
            special_token_content(&serde_json::json!({"content": "<eos>"})),
            Some("<eos>".to_string())
        );
        assert_eq!(special_token_content(&serde_json::json!(null)), None);
    }

    #[test]
    #[ignore]
    fn test_tokenizer_load_from_hub() {
        let tokenizer = TokenizerWrapper::from_pretrained("Qwen/Qwen2.5-0.5B-Instruct");
        assert!(
            tokenizer.is_ok(),
            "Failed to load tokenizer: {:?}",
            tokenizer.err()
        );
    }
}
