//! Token-budget estimation, ported from the teacher's `server/src/tokenizer.rs`
//! near-verbatim: a `Tokenizer` trait with a cheap bytes-based estimate as the
//! default and an optional `tiktoken` backend behind the same feature flag the
//! teacher gates it on.

pub trait Tokenizer: Send + Sync {
    fn count_tokens(&self, text: &str) -> usize;
}

/// Approximates GPT-style tokenization at roughly 3 bytes/token, which the
/// teacher found close enough for budget estimates without pulling in a real
/// BPE tokenizer on the hot path.
pub struct BytesEstimateTokenizer;

impl Tokenizer for BytesEstimateTokenizer {
    fn count_tokens(&self, text: &str) -> usize {
        (text.len() + 2) / 3
    }
}

#[cfg(feature = "tiktoken")]
pub struct TiktokenTokenizer {
    bpe: tiktoken_rs::CoreBPE,
}

#[cfg(feature = "tiktoken")]
impl TiktokenTokenizer {
    pub fn new() -> crate::error::Result<Self> {
        let bpe = tiktoken_rs::cl100k_base()
            .map_err(|e| crate::error::Error::Invalid(format!("failed to load tiktoken encoder: {e}")))?;
        Ok(TiktokenTokenizer { bpe })
    }
}

#[cfg(feature = "tiktoken")]
impl Tokenizer for TiktokenTokenizer {
    fn count_tokens(&self, text: &str) -> usize {
        self.bpe.encode_with_special_tokens(text).len()
    }
}

#[cfg(feature = "tiktoken")]
pub fn create_tokenizer() -> Box<dyn Tokenizer> {
    match TiktokenTokenizer::new() {
        Ok(t) => Box::new(t),
        Err(_) => Box::new(BytesEstimateTokenizer),
    }
}

#[cfg(not(feature = "tiktoken"))]
pub fn create_tokenizer() -> Box<dyn Tokenizer> {
    Box::new(BytesEstimateTokenizer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_estimate_scales_with_length() {
        let t = BytesEstimateTokenizer;
        assert_eq!(t.count_tokens(""), 0);
        assert_eq!(t.count_tokens("abc"), 1);
        assert_eq!(t.count_tokens("abcdef"), 2);
    }

    #[test]
    fn create_tokenizer_returns_a_usable_tokenizer() {
        let t = create_tokenizer();
        assert!(t.count_tokens("hello world") > 0);
    }
}
