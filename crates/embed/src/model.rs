//! Model resolution, loading, and batched encoding — lifted close to
//! verbatim from the teacher's `server/src/semantic.rs` (`resolve_model`,
//! `load_model`, `encode_batch`), generalized to return `codetrove_core`'s
//! `Result` instead of `Result<_, String>` and to drop the CUDA device
//! branch (the capability trait spec §6 describes is CPU-portable; GPU
//! selection is a deployment concern outside the engine's interface).

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use hf_hub::{api::sync::Api, Repo, RepoType};
use tokenizers::Tokenizer;

use codetrove_core::error::{Error, Result};

/// Configuration for an embedding model (spec §6: `embedding.{model,
/// dimensions}`).
#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub model_id: String,
    pub dim: usize,
}

/// Resolve a model name to its configuration. Accepts the preset name
/// `"minilm"`, `None` (defaults to the preset), or any other string as a
/// custom HuggingFace model id (defaults to dim 768 — override
/// `embedding.dimensions` in config.json for non-768 models).
pub fn resolve_model(name: Option<&str>) -> ModelConfig {
    match name {
        None | Some("minilm") => ModelConfig {
            model_id: "sentence-transformers/all-MiniLM-L6-v2".to_string(),
            dim: 384,
        },
        Some(custom) => ModelConfig { model_id: custom.to_string(), dim: 768 },
    }
}

/// Load the BERT model and tokenizer from the HuggingFace Hub, caching in
/// `~/.cache/huggingface` via `hf-hub`'s defaults.
pub fn load_model(config: &ModelConfig) -> Result<(BertModel, Tokenizer, Device)> {
    let device = Device::Cpu;
    let api = Api::new().map_err(|e| Error::Io(format!("failed to create HF API: {e}")))?;
    let repo = api.repo(Repo::with_revision(config.model_id.clone(), RepoType::Model, "main".to_string()));

    let config_path = repo.get("config.json").map_err(|e| Error::Io(format!("failed to get config.json: {e}")))?;
    let tokenizer_path =
        repo.get("tokenizer.json").map_err(|e| Error::Io(format!("failed to get tokenizer.json: {e}")))?;
    let weights_path =
        repo.get("model.safetensors").map_err(|e| Error::Io(format!("failed to get model.safetensors: {e}")))?;

    let config_str = std::fs::read_to_string(&config_path)?;
    let bert_config: BertConfig =
        serde_json::from_str(&config_str).map_err(|e| Error::Invalid(format!("failed to parse model config: {e}")))?;

    let tokenizer =
        Tokenizer::from_file(&tokenizer_path).map_err(|e| Error::Io(format!("failed to load tokenizer: {e}")))?;

    let vb = unsafe {
        VarBuilder::from_mmaped_safetensors(&[weights_path], DType::F32, &device)
            .map_err(|e| Error::Io(format!("failed to load weights: {e}")))?
    };

    let model = BertModel::load(vb, &bert_config).map_err(|e| Error::Io(format!("failed to load BERT model: {e}")))?;

    Ok((model, tokenizer, device))
}

/// Encode a batch of texts into embeddings with mean pooling over the
/// attention mask, then L2-normalize each row so stored vectors are unit
/// vectors and cosine similarity reduces to a dot product (spec §6: `D` is
/// fixed per process).
pub fn encode_batch(
    model: &BertModel,
    tokenizer: &Tokenizer,
    device: &Device,
    texts: &[&str],
    dim: usize,
) -> Result<Vec<Vec<f32>>> {
    if texts.is_empty() {
        return Ok(Vec::new());
    }

    let encodings = tokenizer
        .encode_batch(texts.to_vec(), true)
        .map_err(|e| Error::Invalid(format!("tokenization failed: {e}")))?;

    let max_len = encodings.iter().map(|e| e.get_ids().len()).max().unwrap_or(0);

    let mut all_ids: Vec<u32> = Vec::new();
    let mut all_mask: Vec<u32> = Vec::new();
    let mut all_type_ids: Vec<u32> = Vec::new();

    for enc in &encodings {
        let ids = enc.get_ids();
        let mask = enc.get_attention_mask();
        let type_ids = enc.get_type_ids();
        let pad_len = max_len - ids.len();

        all_ids.extend_from_slice(ids);
        all_ids.extend(std::iter::repeat(0u32).take(pad_len));
        all_mask.extend_from_slice(mask);
        all_mask.extend(std::iter::repeat(0u32).take(pad_len));
        all_type_ids.extend_from_slice(type_ids);
        all_type_ids.extend(std::iter::repeat(0u32).take(pad_len));
    }

    let batch_size = texts.len();
    let to_err = |e: candle_core::Error| Error::Io(format!("tensor op failed: {e}"));

    let input_ids = Tensor::from_vec(all_ids, (batch_size, max_len), device).map_err(to_err)?;
    let attention_mask = Tensor::from_vec(
        all_mask.iter().map(|&x| x as f32).collect::<Vec<_>>(),
        (batch_size, max_len),
        device,
    )
    .map_err(to_err)?;
    let token_type_ids = Tensor::from_vec(all_type_ids, (batch_size, max_len), device).map_err(to_err)?;

    let output =
        model.forward(&input_ids, &token_type_ids, Some(&attention_mask)).map_err(|e| Error::Io(format!("model forward pass failed: {e}")))?;

    let mask_expanded =
        attention_mask.unsqueeze(2).map_err(to_err)?.broadcast_as(output.shape()).map_err(to_err)?;
    let masked = output.mul(&mask_expanded).map_err(to_err)?;
    let summed = masked.sum(1).map_err(to_err)?;
    let mask_sum = mask_expanded.sum(1).map_err(to_err)?.clamp(1e-9, f64::MAX).map_err(to_err)?;
    let mean_pooled = summed.div(&mask_sum).map_err(to_err)?;

    let norms = mean_pooled
        .sqr()
        .map_err(to_err)?
        .sum(1)
        .map_err(to_err)?
        .sqrt()
        .map_err(to_err)?
        .unsqueeze(1)
        .map_err(to_err)?
        .broadcast_as(mean_pooled.shape())
        .map_err(to_err)?
        .clamp(1e-9, f64::MAX)
        .map_err(to_err)?;
    let normalized = mean_pooled.div(&norms).map_err(to_err)?;

    let flat: Vec<f32> = normalized.flatten_all().map_err(to_err)?.to_vec1().map_err(to_err)?;

    let mut result = Vec::with_capacity(batch_size);
    for i in 0..batch_size {
        let start = i * dim;
        let end = start + dim;
        result.push(flat[start..end].to_vec());
    }
    Ok(result)
}
