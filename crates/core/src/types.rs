//! The data model of spec §3: stores, documents/chunks, the code graph, search
//! results and jobs. Generalized from the teacher's single-repo `ScanConfig`/
//! `FileEntry`/`RepoState` shape (`server/src/types.rs`,
//! `crates/core/src/types.rs`) to "one store's indexed state."

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum StoreKind {
    File { path: String },
    Repo { path: String, url: Option<String>, branch: Option<String> },
    Web { seed_url: String, depth: u32 },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StoreStatus {
    Created,
    Indexing,
    Ready,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Store {
    pub id: String,
    pub name: String,
    pub description: String,
    pub tags: Vec<String>,
    #[serde(flatten)]
    pub kind: StoreKind,
    pub status: StoreStatus,
    pub created_at: String,
    pub updated_at: String,
}

// ---------------------------------------------------------------------------
// File classification (spec §3)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FileClass {
    DocumentationPrimary,
    Documentation,
    Example,
    Test,
    Config,
    Source,
    SourceInternal,
    Changelog,
    Other,
}

impl FileClass {
    /// Intrinsic ranking boost per §4.5, applied before any query-specific
    /// signal is folded in.
    pub fn intrinsic_boost(&self) -> f64 {
        match self {
            FileClass::DocumentationPrimary => 1.8,
            FileClass::Documentation => 1.3,
            FileClass::Changelog => 1.1,
            FileClass::Example => 1.2,
            FileClass::Source => 1.0,
            FileClass::SourceInternal => 0.85,
            FileClass::Config => 0.5,
            FileClass::Test => 0.55,
            FileClass::Other => 0.7,
        }
    }
}

/// Classify a file by path, following spec §3's literal rules.
pub fn classify_file(path: &str) -> FileClass {
    let lower = path.to_lowercase();
    let base = lower.rsplit('/').next().unwrap_or(&lower);

    let is_doc_primary_name = matches!(base, "readme.md" | "readme")
        || base.starts_with("migration")
        || lower.contains("/api-reference")
        || lower.contains("/getting-started");
    if is_doc_primary_name {
        return FileClass::DocumentationPrimary;
    }
    if base.starts_with("changelog") {
        return FileClass::Changelog;
    }
    if lower.ends_with(".md") || lower.contains("/docs/") {
        return FileClass::Documentation;
    }
    if lower.contains("/test/") || lower.contains("/tests/") || lower.contains(".test.") || lower.contains(".spec.") {
        return FileClass::Test;
    }
    if lower.contains("/example/") || lower.contains("/examples/") {
        return FileClass::Example;
    }
    if is_config_path(&lower) {
        return FileClass::Config;
    }
    if lower.contains("/internal/") || lower.contains("/compiler/") || lower.contains("/transforms/") {
        return FileClass::SourceInternal;
    }
    if looks_like_monorepo_internal_src(&lower) {
        return FileClass::SourceInternal;
    }
    if is_source_ext(&lower) {
        return FileClass::Source;
    }
    FileClass::Other
}

fn is_config_path(lower: &str) -> bool {
    let base = lower.rsplit('/').next().unwrap_or(lower);
    matches!(
        base,
        "package.json"
            | "cargo.toml"
            | "go.mod"
            | "tsconfig.json"
            | "webpack.config.js"
            | ".eslintrc"
            | ".eslintrc.json"
            | "config.json"
            | "config.yaml"
            | "config.yml"
    ) || base.ends_with(".config.js")
        || base.ends_with(".config.ts")
        || lower.ends_with(".ini")
        || lower.ends_with(".toml")
        || lower.ends_with(".yaml")
        || lower.ends_with(".yml")
}

/// A package entrypoint is `src/index.*` or `src/main.*` one level below a
/// directory containing its own `package.json`/`Cargo.toml`; anything else
/// under a monorepo package's `src/` is `source-internal`.
fn looks_like_monorepo_internal_src(lower: &str) -> bool {
    if !lower.contains("/packages/") && !lower.contains("/crates/") {
        return false;
    }
    let Some(src_pos) = lower.find("/src/") else { return false };
    let after = &lower[src_pos + 5..];
    let is_entrypoint = matches!(
        after.rsplit('/').next().unwrap_or(after),
        "index.ts" | "index.js" | "main.rs" | "lib.rs" | "mod.rs"
    ) && !after.contains('/');
    !is_entrypoint
}

fn is_source_ext(lower: &str) -> bool {
    for ext in SOURCE_EXTENSIONS {
        if lower.ends_with(ext) {
            return true;
        }
    }
    false
}

pub const SOURCE_EXTENSIONS: &[&str] = &[
    ".rs", ".ts", ".tsx", ".js", ".jsx", ".mjs", ".cjs", ".py", ".pyi", ".go", ".java", ".c",
    ".h", ".cpp", ".cc", ".hpp",
];

// ---------------------------------------------------------------------------
// Document / Chunk
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocType {
    File,
    Chunk,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub store_id: String,
    pub source: String,
    pub doc_type: DocType,
    pub source_hash: String,
    pub chunk_index: usize,
    pub total_chunks: usize,
    pub indexed_at: String,
    pub file_class: FileClass,
    pub section_header: Option<String>,
    pub symbol_name: Option<String>,
    pub doc_summary: Option<String>,
    pub crawl_depth: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub content: String,
    pub vector: Vec<f32>,
    pub metadata: DocumentMetadata,
}

/// Deterministic document id from `(storeId, sourceHash, chunkIndex)`.
pub fn document_id(store_id: &str, source_hash: &str, chunk_index: usize) -> String {
    format!("{store_id}:{source_hash}:{chunk_index}")
}

// ---------------------------------------------------------------------------
// Code graph
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Function,
    Class,
    Interface,
    Type,
    Const,
    Method,
    /// Catch-all for a `kind` string this build doesn't recognize (spec
    /// §4.3: "deserialization validates kind enums and drops unknown
    /// variants") — never produced by this engine, only matched on load.
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    pub file: String,
    pub kind: NodeKind,
    pub name: String,
    pub exported: bool,
    pub start_line: usize,
    pub end_line: usize,
    pub signature: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    Calls,
    Imports,
    Extends,
    Implements,
    /// Catch-all for a `kind` string this build doesn't recognize (spec
    /// §4.3: "deserialization validates kind enums and drops unknown
    /// variants") — never produced by this engine, only matched on load.
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphEdge {
    pub from: String,
    pub to: String,
    pub kind: EdgeKind,
    pub confidence: f32,
}

/// Build a node id following spec §3: `"<file>:<symbol>"`, or
/// `"<file>:<class>.<method>"` for methods.
pub fn node_id(file: &str, symbol: &str, parent: Option<&str>) -> String {
    match parent {
        Some(p) => format!("{file}:{p}.{symbol}"),
        None => format!("{file}:{symbol}"),
    }
}

pub fn unknown_node_id(name: &str) -> String {
    format!("unknown:{name}")
}

// ---------------------------------------------------------------------------
// Search result
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetailLevel {
    Minimal,
    Contextual,
    Full,
}

impl Default for DetailLevel {
    fn default() -> Self {
        DetailLevel::Minimal
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultSummary {
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    pub signature: String,
    pub purpose: String,
    pub location: String,
    pub relevance_reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Usage {
    pub called_by: usize,
    pub calls: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultContext {
    pub interfaces: Vec<String>,
    pub imports: Vec<String>,
    pub related_concepts: Vec<String>,
    pub usage: Usage,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RelatedRelationship {
    #[serde(rename = "calls this")]
    CallsThis,
    #[serde(rename = "called by this")]
    CalledByThis,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelatedCode {
    pub file: String,
    pub summary: String,
    pub relationship: RelatedRelationship,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultFull {
    pub code: String,
    pub related: Vec<RelatedCode>,
    pub doc_comment: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub id: String,
    pub store_id: String,
    pub score: f64,
    pub summary: ResultSummary,
    pub context: Option<ResultContext>,
    pub full: Option<ResultFull>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    Vector,
    Fts,
    Hybrid,
}

impl Default for SearchMode {
    fn default() -> Self {
        SearchMode::Hybrid
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchQuery {
    pub query: String,
    pub stores: Vec<String>,
    #[serde(default)]
    pub mode: SearchMode,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub detail: DetailLevel,
    pub threshold: Option<f64>,
    pub min_relevance: Option<f64>,
    pub intent: Option<String>,
}

fn default_limit() -> usize {
    10
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub query: String,
    pub mode: SearchMode,
    pub stores: Vec<String>,
    pub results: Vec<SearchResult>,
    pub total_results: usize,
    pub time_ms: u64,
    pub confidence: Option<Confidence>,
    pub max_raw_score: Option<f64>,
}

// ---------------------------------------------------------------------------
// Job
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    Clone,
    Index,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled)
    }
    pub fn is_active(&self) -> bool {
        matches!(self, JobStatus::Pending | JobStatus::Running)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    #[serde(rename = "type")]
    pub job_type: JobType,
    pub status: JobStatus,
    pub progress: u8,
    pub message: String,
    pub details: HashMap<String, serde_json::Value>,
    pub created_at: String,
    pub updated_at: String,
}

// ---------------------------------------------------------------------------
// Index progress callback payload (spec §4.4)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressEvent {
    Start,
    Progress,
    Complete,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexProgress {
    #[serde(rename = "type")]
    pub event: ProgressEvent,
    pub current: usize,
    pub total: usize,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexResult {
    pub documents_indexed: usize,
    pub chunks_created: usize,
    pub skipped_files: usize,
    pub time_ms: u64,
    pub estimated_tokens: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_readme_as_documentation_primary() {
        assert_eq!(classify_file("README.md"), FileClass::DocumentationPrimary);
        assert_eq!(classify_file("docs/api-reference/auth.md"), FileClass::DocumentationPrimary);
        assert_eq!(classify_file("MIGRATION-v2.md"), FileClass::DocumentationPrimary);
    }

    #[test]
    fn classifies_plain_markdown_as_documentation() {
        assert_eq!(classify_file("docs/guide.md"), FileClass::Documentation);
        assert_eq!(classify_file("web/docs/intro.html"), FileClass::Documentation);
    }

    #[test]
    fn classifies_source_and_internal() {
        assert_eq!(classify_file("src/lib.rs"), FileClass::Source);
        assert_eq!(classify_file("packages/core/src/internals/parser.ts"), FileClass::SourceInternal);
        assert_eq!(classify_file("compiler/lower.rs"), FileClass::SourceInternal);
    }

    #[test]
    fn classifies_tests_and_config() {
        assert_eq!(classify_file("tests/auth.test.ts"), FileClass::Test);
        assert_eq!(classify_file("Cargo.toml"), FileClass::Config);
        assert_eq!(classify_file("package.json"), FileClass::Config);
    }

    #[test]
    fn document_id_is_deterministic() {
        let a = document_id("s1", "abc123", 2);
        let b = document_id("s1", "abc123", 2);
        assert_eq!(a, b);
        assert_ne!(a, document_id("s1", "abc123", 3));
    }

    #[test]
    fn node_id_nests_methods_under_class() {
        assert_eq!(node_id("a.ts", "run", None), "a.ts:run");
        assert_eq!(node_id("a.ts", "run", Some("App")), "a.ts:App.run");
    }
}
