//! Concrete [`codetrove_core::traits::Embedder`] backed by a local MiniLM
//! encoder run through `candle`. Grounded on the teacher's
//! `server/src/semantic.rs` (`resolve_model`, `load_model`, `encode_batch`'s
//! mean-pooling + L2-normalize) — the teacher's own semantic-search stack,
//! unchanged, wired behind the capability trait §6 asks for instead of the
//! teacher's free functions.

mod model;

use std::sync::Mutex;

use candle_core::Device;
use codetrove_core::error::{Error, Result};
use codetrove_core::traits::Embedder;
use tokenizers::Tokenizer;

pub use model::{resolve_model, ModelConfig};

use candle_transformers::models::bert::BertModel;

/// A loaded BERT-family encoder plus the device it runs on.
///
/// `embed`/`embed_batch` take `&self` (the [`Embedder`] trait requires
/// `Send + Sync`), so the forward pass itself is serialized behind a mutex —
/// spec §5: "its `embed` method must be safe to call sequentially and from
/// the search and index paths." `candle`'s CPU tensors aren't internally
/// synchronized, so this mutex is what actually provides that guarantee.
pub struct LocalEmbedder {
    model: Mutex<BertModel>,
    tokenizer: Tokenizer,
    device: Device,
    config: ModelConfig,
}

impl LocalEmbedder {
    /// Load `model_name` (a preset name or a HuggingFace model id) from the
    /// local HF cache, downloading on first use.
    pub fn load(model_name: Option<&str>) -> Result<Self> {
        let config = resolve_model(model_name);
        let (model, tokenizer, device) = model::load_model(&config)?;
        Ok(LocalEmbedder { model: Mutex::new(model), tokenizer, device, config })
    }

    fn encode(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let model = self.model.lock().expect("embedder model lock poisoned");
        model::encode_batch(&model, &self.tokenizer, &self.device, texts, self.config.dim)
    }
}

impl Embedder for LocalEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.encode(&[text])?;
        vectors.pop().ok_or_else(|| Error::Io("embedder returned no vector".to_string()))
    }

    /// Overrides the default one-at-a-time loop to exploit the model's own
    /// batched forward pass (spec §5: "the embedder internally batches up to
    /// 32 items"), chunking the caller's batch into groups of 32 so a single
    /// oversized call doesn't blow up tokenizer padding memory.
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        const BATCH: usize = 32;
        let mut out = Vec::with_capacity(texts.len());
        for group in texts.chunks(BATCH) {
            let refs: Vec<&str> = group.iter().map(|s| s.as_str()).collect();
            out.extend(self.encode(&refs)?);
        }
        Ok(out)
    }

    fn dimensions(&self) -> usize {
        self.config.dim
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_model_defaults_to_minilm() {
        let config = resolve_model(None);
        assert_eq!(config.dim, 384);
        assert!(config.model_id.contains("MiniLM"));
    }

    #[test]
    fn resolve_model_accepts_custom_hf_id() {
        let config = resolve_model(Some("org/custom-encoder"));
        assert_eq!(config.model_id, "org/custom-encoder");
        assert_eq!(config.dim, 768);
    }
}
