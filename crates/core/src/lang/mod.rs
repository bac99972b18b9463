//! Language adapters and the adapter registry (C4, spec §4.2).
//!
//! Restructures the teacher's single global tree-sitter dispatch
//! (`server/src/ast.rs`'s `classify_node`/`extract_name`/`extract_signature`,
//! `server/src/graph.rs`'s `collect_calls`/`extract_callee_name`/
//! `extract_inheritance`) into the registry-of-adapters shape spec §4.2/§9
//! calls for: a capability trait with four operations, plus a registry that
//! refuses conflicting extensions. Adapters hold no process-wide state.

pub mod go;
pub mod python;
pub mod rust_lang;
pub mod sexpr;
pub mod typescript;
mod util;

use std::collections::HashMap;
use std::sync::Arc;

use crate::chunker::Chunk;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Function,
    Class,
    Interface,
    Type,
    Const,
    Method,
}

#[derive(Debug, Clone)]
pub struct MethodInfo {
    pub name: String,
    pub signature: String,
    pub start_line: usize,
    pub end_line: usize,
}

/// A declared symbol extracted by an adapter's `parse`.
#[derive(Debug, Clone)]
pub struct CodeNode {
    pub kind: NodeKind,
    pub name: String,
    pub exported: bool,
    pub start_line: usize,
    pub end_line: usize,
    pub signature: String,
    /// Populated for class/interface kinds only.
    pub methods: Vec<MethodInfo>,
}

#[derive(Debug, Clone)]
pub struct ImportInfo {
    pub specifier: String,
}

#[derive(Debug, Clone)]
pub struct RawCallEdge {
    pub from_symbol: String,
    pub to_symbol: String,
    pub confidence: f32,
}

/// The capability trait every language adapter implements (spec §4.2).
pub trait LanguageAdapter: Send + Sync {
    fn language_id(&self) -> &str;
    fn extensions(&self) -> &[&str];
    fn display_name(&self) -> Option<&str> {
        None
    }

    fn parse(&self, text: &str, path: &str) -> Vec<CodeNode>;
    fn extract_imports(&self, text: &str, path: &str) -> Vec<ImportInfo>;

    /// Adapters may defer chunking to the generic chunker (C3).
    fn chunk(&self, _text: &str, _path: &str) -> Option<Vec<Chunk>> {
        None
    }

    /// Heuristic call-edge extraction; `None` defers to the graph builder's
    /// own identifier-followed-by-`(` scan (spec §4.3).
    fn analyze_call_relationships(&self, _text: &str, _path: &str) -> Option<Vec<RawCallEdge>> {
        None
    }
}

/// Process-wide `(languageId -> adapter)` and `(extension -> adapter)`
/// mapping. Registering a language id already present is a no-op; claiming
/// an extension already owned by a *different* adapter is a `Conflict`.
#[derive(Default)]
pub struct AdapterRegistry {
    by_language: HashMap<String, Arc<dyn LanguageAdapter>>,
    by_extension: HashMap<String, Arc<dyn LanguageAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        AdapterRegistry::default()
    }

    pub fn register(&mut self, adapter: Arc<dyn LanguageAdapter>) -> Result<()> {
        let lang_id = adapter.language_id().to_string();
        if self.by_language.contains_key(&lang_id) {
            return Ok(());
        }
        for ext in adapter.extensions() {
            let ext = normalize_ext(ext);
            if let Some(existing) = self.by_extension.get(&ext) {
                if existing.language_id() != lang_id {
                    return Err(Error::Conflict(format!(
                        "extension {ext} already owned by adapter {}",
                        existing.language_id()
                    )));
                }
            }
        }
        for ext in adapter.extensions() {
            self.by_extension.insert(normalize_ext(ext), adapter.clone());
        }
        self.by_language.insert(lang_id, adapter);
        Ok(())
    }

    pub fn by_extension(&self, ext: &str) -> Option<Arc<dyn LanguageAdapter>> {
        self.by_extension.get(&normalize_ext(ext)).cloned()
    }

    pub fn by_language(&self, id: &str) -> Option<Arc<dyn LanguageAdapter>> {
        self.by_language.get(id).cloned()
    }

    pub fn by_path(&self, path: &str) -> Option<Arc<dyn LanguageAdapter>> {
        let ext = path.rsplit('.').next()?;
        self.by_extension(ext)
    }

    /// Builds a registry with the built-in adapters required by spec §4.2:
    /// TypeScript/JavaScript, Rust, Go, Python, and one S-expression family.
    pub fn with_builtins() -> Self {
        let mut registry = AdapterRegistry::new();
        registry.register(Arc::new(typescript::TypeScriptAdapter)).expect("builtin ts adapter");
        registry.register(Arc::new(rust_lang::RustAdapter)).expect("builtin rust adapter");
        registry.register(Arc::new(go::GoAdapter)).expect("builtin go adapter");
        registry.register(Arc::new(python::PythonAdapter)).expect("builtin python adapter");
        registry.register(Arc::new(sexpr::SexprAdapter)).expect("builtin sexpr adapter");
        registry
    }
}

fn normalize_ext(ext: &str) -> String {
    let trimmed = ext.trim_start_matches('.').to_lowercase();
    format!(".{trimmed}")
}

#[cfg(test)]
mod tests {
    use super::*;

    struct DummyAdapter(&'static str, &'static [&'static str]);
    impl LanguageAdapter for DummyAdapter {
        fn language_id(&self) -> &str {
            self.0
        }
        fn extensions(&self) -> &[&str] {
            self.1
        }
        fn parse(&self, _text: &str, _path: &str) -> Vec<CodeNode> {
            vec![]
        }
        fn extract_imports(&self, _text: &str, _path: &str) -> Vec<ImportInfo> {
            vec![]
        }
    }

    #[test]
    fn reregistering_same_language_is_a_noop() {
        let mut registry = AdapterRegistry::new();
        registry.register(Arc::new(DummyAdapter("foo", &["foo"]))).unwrap();
        registry.register(Arc::new(DummyAdapter("foo", &["bar"]))).unwrap();
        // Second registration is a no-op: .bar must not be claimed.
        assert!(registry.by_extension("bar").is_none());
        assert!(registry.by_extension("foo").is_some());
    }

    #[test]
    fn conflicting_extension_is_rejected() {
        let mut registry = AdapterRegistry::new();
        registry.register(Arc::new(DummyAdapter("foo", &["foo"]))).unwrap();
        let err = registry.register(Arc::new(DummyAdapter("other", &["foo"]))).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Conflict);
    }

    #[test]
    fn builtins_cover_required_languages() {
        let registry = AdapterRegistry::with_builtins();
        for id in ["typescript", "rust", "go", "python", "sexpr"] {
            assert!(registry.by_language(id).is_some(), "missing builtin {id}");
        }
        assert!(registry.by_extension("ts").is_some());
        assert!(registry.by_extension(".rs").is_some());
    }
}
