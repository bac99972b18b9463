//! Capability traits (spec §6): the engine depends on these interfaces, not
//! on a concrete embedding model or vector database. `crates/embed` and
//! `crates/store` provide the concrete implementations; `crates/core` stays
//! buildable and testable without either.
//!
//! Kept synchronous, matching the teacher's own `crates/core` (no async
//! runtime dependency there — `tokio` only appears in `server/`, which
//! implements exactly the transport layer spec §1 places out of scope).
//! Each method here is still a suspension point in the scheduling sense of
//! spec §5: callers on an async transport wrap these in `spawn_blocking`
//! rather than the engine itself depending on an executor.

use crate::error::Result;

/// C1 — map text to a fixed-dimension unit vector.
pub trait Embedder: Send + Sync {
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Default batches by repeated `embed`; concrete embedders may override
    /// to exploit model-level batching (spec §5: "the embedder internally
    /// batches up to 32 items").
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }

    fn dimensions(&self) -> usize;
}

#[derive(Debug, Clone)]
pub struct StoreSearchHit {
    pub id: String,
    pub content: String,
    /// `1 - cosineDistance` for vector search, the lexical engine's native
    /// score for full-text search (spec §6).
    pub score: f64,
    pub metadata: serde_json::Value,
}

/// C2 — per-collection vector + full-text persistence.
pub trait VectorStore: Send + Sync {
    fn initialize(&self, store_id: &str) -> Result<()>;
    fn add_documents(&self, store_id: &str, documents: &[crate::types::Document]) -> Result<()>;
    fn delete_documents(&self, store_id: &str, ids: &[String]) -> Result<()>;
    fn search(&self, store_id: &str, vector: &[f32], k: usize) -> Result<Vec<StoreSearchHit>>;
    fn full_text_search(&self, store_id: &str, query: &str, k: usize) -> Result<Vec<StoreSearchHit>>;
    fn create_fts_index(&self, store_id: &str) -> Result<()>;
    fn delete_store(&self, store_id: &str) -> Result<()>;
}

/// Capability consumed by the registry when creating a `repo`-kind store
/// (spec §6).
pub trait GitClone: Send + Sync {
    fn clone_repo(&self, url: &str, target_dir: &std::path::Path, branch: Option<&str>, depth: u32) -> Result<()>;
}

/// One page yielded by a `Crawler` (spec §6).
#[derive(Debug, Clone)]
pub struct CrawledPage {
    pub url: String,
    pub title: String,
    pub markdown: String,
    pub extracted: Option<String>,
    pub depth: u32,
}

/// Capability consumed when indexing a `web`-kind store. The crawler itself
/// is an external collaborator (spec §1: "specified only at interface level")
/// — this workspace carries the interface so a `web` store's indexing path
/// type-checks against the same capability boundary as `Embedder`,
/// `VectorStore`, and `GitClone`, without shipping a concrete crawler.
pub trait Crawler: Send + Sync {
    fn crawl(&self, seed_url: &str, max_depth: u32) -> Result<Vec<CrawledPage>>;
}
