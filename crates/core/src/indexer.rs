//! Indexer (C7, spec §4.4): drives a store end-to-end — scan, chunk,
//! classify, embed, write, then build and persist the code graph. New work —
//! the teacher's `init.rs`/`scan.rs` walk a single workspace once at startup;
//! this generalizes that walk into a per-store, re-runnable pipeline with
//! progress reporting and a `skippedFiles` failure policy (spec §4.4).

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use ignore::WalkBuilder;

use crate::chunker::chunk_text;
use crate::error::Result;
use crate::graph::build_code_graph;
use crate::lang::AdapterRegistry;
use crate::traits::{Embedder, VectorStore};
use crate::types::{classify_file, document_id, DocType, Document, DocumentMetadata, IndexProgress, IndexResult, ProgressEvent};

/// Extensions the indexer will read as text; everything else is skipped
/// without counting toward `skippedFiles` (spec §4.4: "keeping only known
/// text extensions").
const KNOWN_TEXT_EXTENSIONS: &[&str] = &[
    "rs", "ts", "tsx", "js", "jsx", "mjs", "cjs", "py", "pyi", "go", "java", "c", "h", "cpp", "cc", "hpp", "clj", "cljs",
    "cljc", "scm", "ss", "lisp", "lsp", "el", "md", "mdx", "markdown", "json", "toml", "yaml", "yml", "ini", "txt",
];

pub type ProgressCallback<'a> = dyn Fn(IndexProgress) + 'a;

pub struct Indexer<'a> {
    embedder: Arc<dyn Embedder>,
    vector_store: Arc<dyn VectorStore>,
    adapters: &'a AdapterRegistry,
    graphs_dir: std::path::PathBuf,
}

impl<'a> Indexer<'a> {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        vector_store: Arc<dyn VectorStore>,
        adapters: &'a AdapterRegistry,
        data_dir: impl Into<std::path::PathBuf>,
    ) -> Self {
        Indexer { embedder, vector_store, adapters, graphs_dir: data_dir.into().join("graphs") }
    }

    pub fn index_store(
        &self,
        store_id: &str,
        root: &Path,
        ignore_patterns: &[String],
        on_progress: &ProgressCallback,
    ) -> Result<IndexResult> {
        let started = Instant::now();

        let files = self.collect_files(root, ignore_patterns);
        let total = files.len();
        on_progress(IndexProgress { event: ProgressEvent::Start, current: 0, total, message: "scanning".to_string() });

        let mut documents = Vec::new();
        let mut graph_inputs: Vec<(String, String)> = Vec::new();
        let mut skipped_files = 0usize;
        let mut chunks_created = 0usize;
        let mut estimated_tokens = 0usize;

        for (idx, path) in files.iter().enumerate() {
            let rel = path.strip_prefix(root).unwrap_or(path).to_string_lossy().replace('\\', "/");
            let content = match std::fs::read_to_string(path) {
                Ok(c) => c,
                Err(_) => {
                    skipped_files += 1;
                    continue;
                }
            };

            let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
            let file_class = classify_file(&rel);
            let source_hash = content_hash(&content);
            let chunks = chunk_text(&content, ext);
            let now = now_iso8601();

            for chunk in &chunks {
                let vector = match self.embedder.embed(&chunk.content) {
                    Ok(v) => v,
                    Err(_) => {
                        skipped_files += 1;
                        continue;
                    }
                };
                estimated_tokens += (chunk.content.len() + 2) / 3;
                let metadata = DocumentMetadata {
                    store_id: store_id.to_string(),
                    source: rel.clone(),
                    doc_type: if chunk.total_chunks == 1 { DocType::File } else { DocType::Chunk },
                    source_hash: source_hash.clone(),
                    chunk_index: chunk.chunk_index,
                    total_chunks: chunk.total_chunks,
                    indexed_at: now.clone(),
                    file_class,
                    section_header: chunk.section_header.clone(),
                    symbol_name: chunk.symbol_name.clone(),
                    doc_summary: None,
                    crawl_depth: None,
                };
                documents.push(Document {
                    id: document_id(store_id, &source_hash, chunk.chunk_index),
                    content: chunk.content.clone(),
                    vector,
                    metadata,
                });
                chunks_created += 1;
            }

            if self.adapters.by_path(&rel).is_some() {
                graph_inputs.push((rel.clone(), content));
            }

            on_progress(IndexProgress {
                event: ProgressEvent::Progress,
                current: idx + 1,
                total,
                message: format!("indexed {rel}"),
            });
        }

        self.vector_store.add_documents(store_id, &documents)?;
        self.vector_store.create_fts_index(store_id)?;

        let graph = build_code_graph(self.adapters, &graph_inputs);
        std::fs::create_dir_all(&self.graphs_dir)?;
        graph.save(&self.graphs_dir.join(format!("{store_id}.json")))?;

        let result = IndexResult {
            documents_indexed: documents.len(),
            chunks_created,
            skipped_files,
            time_ms: started.elapsed().as_millis() as u64,
            estimated_tokens,
        };

        on_progress(IndexProgress {
            event: ProgressEvent::Complete,
            current: total,
            total,
            message: format!("indexed {} documents", result.documents_indexed),
        });

        Ok(result)
    }

    fn collect_files(&self, root: &Path, ignore_patterns: &[String]) -> Vec<std::path::PathBuf> {
        let mut walker = WalkBuilder::new(root);
        walker.hidden(false).git_ignore(true).follow_links(false);
        let mut files = Vec::new();
        for entry in walker.build().flatten() {
            let path = entry.path();
            if path.components().any(|c| ignore_patterns.iter().any(|p| c.as_os_str() == p.as_str())) {
                continue;
            }
            if !path.is_file() {
                continue;
            }
            let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("").to_lowercase();
            if !KNOWN_TEXT_EXTENSIONS.contains(&ext.as_str()) {
                continue;
            }
            files.push(path.to_path_buf());
        }
        files.sort();
        files
    }
}

/// md5 truncated to 12 hex chars — a local cache key, not a security token
/// (spec §4.4).
fn content_hash(content: &str) -> String {
    let digest = md5::compute(content.as_bytes());
    format!("{digest:x}")[..12].to_string()
}

fn now_iso8601() -> String {
    let now = std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).unwrap_or_default();
    format!("{}", now.as_secs())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::StoreSearchHit;
    use std::sync::Mutex;
    use tempfile::tempdir;

    struct FakeEmbedder;
    impl Embedder for FakeEmbedder {
        fn embed(&self, text: &str) -> Result<Vec<f32>> {
            Ok(vec![text.len() as f32, 0.0, 0.0])
        }
        fn dimensions(&self) -> usize {
            3
        }
    }

    #[derive(Default)]
    struct FakeStore {
        added: Mutex<Vec<Document>>,
    }
    impl VectorStore for FakeStore {
        fn initialize(&self, _store_id: &str) -> Result<()> {
            Ok(())
        }
        fn add_documents(&self, _store_id: &str, documents: &[Document]) -> Result<()> {
            self.added.lock().unwrap().extend(documents.iter().cloned());
            Ok(())
        }
        fn delete_documents(&self, _store_id: &str, _ids: &[String]) -> Result<()> {
            Ok(())
        }
        fn search(&self, _store_id: &str, _vector: &[f32], _k: usize) -> Result<Vec<StoreSearchHit>> {
            Ok(vec![])
        }
        fn full_text_search(&self, _store_id: &str, _query: &str, _k: usize) -> Result<Vec<StoreSearchHit>> {
            Ok(vec![])
        }
        fn create_fts_index(&self, _store_id: &str) -> Result<()> {
            Ok(())
        }
        fn delete_store(&self, _store_id: &str) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn indexes_markdown_and_source_and_builds_graph() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("README.md"), "# Title\n\nSome content here about things.\n").unwrap();
        std::fs::create_dir_all(dir.path().join("node_modules/ignored")).unwrap();
        std::fs::write(dir.path().join("node_modules/ignored/skip.ts"), "export function skip() {}\n").unwrap();
        std::fs::write(
            dir.path().join("lib.ts"),
            "export function add(a, b) {\n  return a + b;\n}\n",
        )
        .unwrap();

        let adapters = AdapterRegistry::with_builtins();
        let data_dir = tempdir().unwrap();
        let indexer = Indexer::new(Arc::new(FakeEmbedder), Arc::new(FakeStore::default()), &adapters, data_dir.path());

        let ignore_patterns = vec!["node_modules".to_string(), ".git".to_string()];
        let mut events = Vec::new();
        let result = indexer
            .index_store("store1", dir.path(), &ignore_patterns, &|p| events.push(p.event))
            .unwrap();

        assert!(result.documents_indexed > 0);
        assert_eq!(result.skipped_files, 0);
        assert!(events.contains(&ProgressEvent::Start));
        assert!(events.contains(&ProgressEvent::Complete));
        assert!(data_dir.path().join("graphs/store1.json").exists());
    }

    #[test]
    fn unreadable_files_increment_skipped_count_without_aborting() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.md"), "# A\n\nhello\n").unwrap();
        let bad_path = dir.path().join("b.md");
        std::fs::write(&bad_path, [0xff, 0xfe, 0xff, 0xfe]).unwrap();

        let adapters = AdapterRegistry::with_builtins();
        let data_dir = tempdir().unwrap();
        let indexer = Indexer::new(Arc::new(FakeEmbedder), Arc::new(FakeStore::default()), &adapters, data_dir.path());

        let result = indexer.index_store("store1", dir.path(), &[], &|_| {}).unwrap();
        assert!(result.skipped_files >= 1);
        assert!(result.documents_indexed >= 1);
    }

    #[test]
    fn doc_type_is_file_for_single_chunk_and_chunk_for_multiple() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("small.ts"), "export function add(a, b) {\n  return a + b;\n}\n").unwrap();
        let big_body = "word ".repeat(2000);
        std::fs::write(dir.path().join("big.ts"), format!("export function big() {{\n  // {big_body}\n}}\n")).unwrap();

        let adapters = AdapterRegistry::with_builtins();
        let data_dir = tempdir().unwrap();
        let store = Arc::new(FakeStore::default());
        let indexer = Indexer::new(Arc::new(FakeEmbedder), store.clone(), &adapters, data_dir.path());

        indexer.index_store("store1", dir.path(), &[], &|_| {}).unwrap();

        let docs = store.added.lock().unwrap();
        let small_docs: Vec<_> = docs.iter().filter(|d| d.metadata.source == "small.ts").collect();
        assert_eq!(small_docs.len(), 1);
        assert_eq!(small_docs[0].metadata.doc_type, crate::types::DocType::File);

        let big_docs: Vec<_> = docs.iter().filter(|d| d.metadata.source == "big.ts").collect();
        assert!(big_docs.len() > 1);
        assert!(big_docs.iter().all(|d| d.metadata.doc_type == crate::types::DocType::Chunk));
    }

    #[test]
    fn content_hash_is_truncated_to_twelve_hex_chars() {
        let hash = content_hash("hello world");
        assert_eq!(hash.len(), 12);
    }
}
