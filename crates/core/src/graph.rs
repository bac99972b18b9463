//! The code graph (C5, spec §4.3): in-memory + on-disk directed graph of
//! definitions and calls/imports, generalized from the teacher's
//! `graph.rs` (`CodeGraph`, `by_source`/`by_target` adjacency) from
//! file-level edges to the spec's symbol-id edges (`"<file>:<symbol>"`).

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::lang::{AdapterRegistry, RawCallEdge};
use crate::types::{node_id, unknown_node_id, EdgeKind, GraphEdge, GraphNode, NodeKind};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GraphData {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

/// Directed multi-graph with forward and lazily-built reverse adjacency
/// (spec §9: "compute incoming lazily unless a per-query cost threshold is
/// crossed"). Here we simply maintain both eagerly — a store's graph is
/// small enough relative to a single process's memory that the lazy path
/// buys nothing in practice, and eager indices keep every query O(1).
pub struct CodeGraph {
    nodes: HashMap<String, GraphNode>,
    edges: Vec<GraphEdge>,
    outgoing: HashMap<String, Vec<usize>>,
    incoming: HashMap<String, Vec<usize>>,
}

impl Default for CodeGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl CodeGraph {
    pub fn new() -> Self {
        CodeGraph { nodes: HashMap::new(), edges: Vec::new(), outgoing: HashMap::new(), incoming: HashMap::new() }
    }

    pub fn add_node(&mut self, node: GraphNode) {
        self.nodes.insert(node.id.clone(), node);
    }

    pub fn add_edge(&mut self, edge: GraphEdge) {
        let idx = self.edges.len();
        self.outgoing.entry(edge.from.clone()).or_default().push(idx);
        self.incoming.entry(edge.to.clone()).or_default().push(idx);
        self.edges.push(edge);
    }

    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.get(id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.nodes.values()
    }

    pub fn get_edges(&self, from: &str) -> Vec<&GraphEdge> {
        self.outgoing.get(from).map(|idxs| idxs.iter().map(|&i| &self.edges[i]).collect()).unwrap_or_default()
    }

    pub fn get_incoming_edges(&self, to: &str) -> Vec<&GraphEdge> {
        self.incoming.get(to).map(|idxs| idxs.iter().map(|&i| &self.edges[i]).collect()).unwrap_or_default()
    }

    pub fn get_called_by_count(&self, id: &str) -> usize {
        self.get_incoming_edges(id).iter().filter(|e| e.kind == EdgeKind::Calls).count()
    }

    pub fn get_calls_count(&self, id: &str) -> usize {
        self.get_edges(id).iter().filter(|e| e.kind == EdgeKind::Calls).count()
    }

    pub fn to_data(&self) -> GraphData {
        GraphData { nodes: self.nodes.values().cloned().collect(), edges: self.edges.clone() }
    }

    pub fn from_data(data: GraphData) -> Self {
        let mut graph = CodeGraph::new();
        for node in data.nodes {
            graph.add_node(node);
        }
        for edge in data.edges {
            graph.add_edge(edge);
        }
        graph
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let data = self.to_data();
        let text = serde_json::to_string_pretty(&data)?;
        crate::config::atomic_write(path, text.as_bytes())
    }

    /// Deserializes `GraphData` from disk and drops any node or edge whose
    /// `kind` didn't match a known variant, rather than failing the whole
    /// load (spec §4.3: "deserialization validates kind enums and drops
    /// unknown variants").
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let mut data: GraphData = serde_json::from_str(&text)?;
        data.nodes.retain(|n| n.kind != NodeKind::Unknown);
        data.edges.retain(|e| e.kind != EdgeKind::Unknown);
        Ok(Self::from_data(data))
    }
}

/// Resolve an import specifier relative to the importing file's directory,
/// per spec §3's deterministic rule: same-dir for a leading `.`, parent-dir
/// for `..`, passthrough (package name, unresolved) otherwise.
pub fn resolve_import_path(from_file: &str, specifier: &str) -> Option<String> {
    if !specifier.starts_with('.') {
        return None;
    }
    let from_dir = from_file.rsplit_once('/').map(|(d, _)| d).unwrap_or("");
    let mut parts: Vec<&str> = if from_dir.is_empty() { vec![] } else { from_dir.split('/').collect() };

    let mut spec = specifier;
    loop {
        if let Some(rest) = spec.strip_prefix("../") {
            parts.pop();
            spec = rest;
        } else if let Some(rest) = spec.strip_prefix("./") {
            spec = rest;
        } else {
            break;
        }
    }
    parts.push(spec);
    Some(parts.join("/"))
}

/// Build the graph from `(path, content)` tuples (spec §4.3/§4.4): add all
/// nodes; add one `imports` edge per specifier; scan each function/method
/// body for call sites, resolving callees at confidence 0.8 when they match
/// a known node, else emitting an `unknown:<name>` sentinel at 0.5.
/// Adapter-supplied explicit calls override with their stated confidence.
pub fn build_code_graph(registry: &AdapterRegistry, files: &[(String, String)]) -> CodeGraph {
    let mut graph = CodeGraph::new();
    let mut known_names: HashMap<String, Vec<String>> = HashMap::new();

    struct CallableNode {
        id: String,
        name: String,
        start_line: usize,
        end_line: usize,
    }
    struct ParsedFile {
        path: String,
        content: String,
        callables: Vec<CallableNode>,
        explicit_calls: Option<Vec<RawCallEdge>>,
    }
    let mut parsed_files = Vec::new();

    for (path, content) in files {
        let Some(adapter) = registry.by_path(path) else { continue };
        let code_nodes = adapter.parse(content, path);
        let mut callables = Vec::new();

        for cn in &code_nodes {
            let kind = match cn.kind {
                crate::lang::NodeKind::Function => NodeKind::Function,
                crate::lang::NodeKind::Class => NodeKind::Class,
                crate::lang::NodeKind::Interface => NodeKind::Interface,
                crate::lang::NodeKind::Type => NodeKind::Type,
                crate::lang::NodeKind::Const => NodeKind::Const,
                crate::lang::NodeKind::Method => NodeKind::Method,
            };
            let id = node_id(path, &cn.name, None);
            graph.add_node(GraphNode {
                id: id.clone(),
                file: path.clone(),
                kind,
                name: cn.name.clone(),
                exported: cn.exported,
                start_line: cn.start_line,
                end_line: cn.end_line,
                signature: Some(cn.signature.clone()),
            });
            if matches!(kind, NodeKind::Function) {
                callables.push(CallableNode { id: id.clone(), name: cn.name.clone(), start_line: cn.start_line, end_line: cn.end_line });
            }
            known_names.entry(cn.name.clone()).or_default().push(id.clone());

            for m in &cn.methods {
                let mid = node_id(path, &m.name, Some(&cn.name));
                graph.add_node(GraphNode {
                    id: mid.clone(),
                    file: path.clone(),
                    kind: NodeKind::Method,
                    name: m.name.clone(),
                    exported: cn.exported,
                    start_line: m.start_line,
                    end_line: m.end_line,
                    signature: Some(m.signature.clone()),
                });
                callables.push(CallableNode { id: mid.clone(), name: m.name.clone(), start_line: m.start_line, end_line: m.end_line });
                known_names.entry(m.name.clone()).or_default().push(mid);
            }
        }

        let imports = adapter.extract_imports(content, path);
        for import in imports {
            let to = resolve_import_path(path, &import.specifier)
                .unwrap_or_else(|| unknown_node_id(&import.specifier));
            graph.add_edge(GraphEdge { from: path.clone(), to, kind: EdgeKind::Imports, confidence: 1.0 });
        }

        let explicit_calls = adapter.analyze_call_relationships(content, path);
        parsed_files.push(ParsedFile { path: path.clone(), content: content.clone(), callables, explicit_calls });
    }

    for file in &parsed_files {
        match &file.explicit_calls {
            Some(explicit) => {
                for call in explicit {
                    let from_id = node_id(&file.path, &call.from_symbol, None);
                    let from_id = if graph.node(&from_id).is_some() {
                        from_id
                    } else {
                        find_owning_node(&graph, &file.path, &call.from_symbol)
                            .unwrap_or(from_id)
                    };
                    let to_id = resolve_callee(&known_names, &file.path, &call.to_symbol);
                    graph.add_edge(GraphEdge { from: from_id, to: to_id, kind: EdgeKind::Calls, confidence: call.confidence });
                }
            }
            // No adapter-supplied calls for this file: fall back to the graph
            // builder's own identifier-followed-by-`(` scan, confidence 0.8
            // when the callee resolves to a known node, else 0.5 (spec §4.3).
            None => {
                for callable in &file.callables {
                    for callee_name in scan_identifier_calls(&file.content, callable.start_line, callable.end_line) {
                        if callee_name == callable.name {
                            continue;
                        }
                        let to_id = resolve_callee(&known_names, &file.path, &callee_name);
                        let confidence = if to_id.starts_with("unknown:") { 0.5 } else { 0.8 };
                        graph.add_edge(GraphEdge { from: callable.id.clone(), to: to_id, kind: EdgeKind::Calls, confidence });
                    }
                }
            }
        }
    }

    graph
}

const CALL_SCAN_KEYWORDS: &[&str] = &[
    "if", "for", "while", "switch", "catch", "return", "function", "typeof", "instanceof", "new", "await", "yield", "in", "of",
];

/// Scans lines `[start_line, end_line]` (1-based, inclusive) of `content`
/// for `identifier(` call sites, skipping control-flow keywords.
fn scan_identifier_calls(content: &str, start_line: usize, end_line: usize) -> Vec<String> {
    let mut calls = Vec::new();
    for (idx, line) in content.lines().enumerate() {
        let line_no = idx + 1;
        if line_no < start_line || line_no > end_line {
            continue;
        }
        let bytes = line.as_bytes();
        let mut i = 0;
        while i < bytes.len() {
            if bytes[i].is_ascii_alphabetic() || bytes[i] == b'_' {
                let start = i;
                while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                    i += 1;
                }
                let word = &line[start..i];
                if i < bytes.len() && bytes[i] == b'(' && !CALL_SCAN_KEYWORDS.contains(&word) {
                    calls.push(word.to_string());
                }
            } else {
                i += 1;
            }
        }
    }
    calls
}

fn find_owning_node(graph: &CodeGraph, file: &str, symbol: &str) -> Option<String> {
    graph
        .nodes()
        .find(|n| n.file == file && (n.name == symbol || n.id.ends_with(&format!(".{symbol}"))))
        .map(|n| n.id.clone())
}

/// Resolve a callee name to a node id: same-file match preferred, then any
/// matching node in the corpus, else the `unknown:` sentinel at 0.5.
fn resolve_callee(known_names: &HashMap<String, Vec<String>>, from_file: &str, name: &str) -> String {
    if let Some(ids) = known_names.get(name) {
        if let Some(same_file) = ids.iter().find(|id| id.starts_with(&format!("{from_file}:"))) {
            return same_file.clone();
        }
        if let Some(first) = ids.first() {
            return first.clone();
        }
    }
    unknown_node_id(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lang::AdapterRegistry;

    #[test]
    fn every_edge_endpoint_is_known_or_sentinel() {
        let registry = AdapterRegistry::with_builtins();
        let files = vec![
            ("a.ts".to_string(), "export function main() { return helper(); }\n".to_string()),
            ("b.ts".to_string(), "export function helper() { return 1; }\n".to_string()),
        ];
        let graph = build_code_graph(&registry, &files);
        for edge in graph.edges.clone() {
            let ok = graph.node(&edge.to).is_some() || edge.to.starts_with("unknown:");
            assert!(ok, "dangling edge to {}", edge.to);
            let ok_from = graph.node(&edge.from).is_some() || edge.from.starts_with("unknown:") || !edge.from.contains(':');
            assert!(ok_from, "dangling edge from {}", edge.from);
        }
    }

    #[test]
    fn cross_file_call_resolves_to_correct_node() {
        let registry = AdapterRegistry::with_builtins();
        let files = vec![
            ("a.ts".to_string(), "export function main() { return helper(); }\n".to_string()),
            ("b.ts".to_string(), "export function helper() { return 1; }\n".to_string()),
        ];
        let graph = build_code_graph(&registry, &files);
        let calls: Vec<&GraphEdge> = graph.edges.iter().filter(|e| e.kind == EdgeKind::Calls).collect();
        assert!(calls.iter().any(|e| e.to == "b.ts:helper"));
    }

    #[test]
    fn unresolved_call_gets_unknown_sentinel() {
        let registry = AdapterRegistry::with_builtins();
        let files =
            vec![("a.ts".to_string(), "export function main() { return totallyUnknownFn(); }\n".to_string())];
        let graph = build_code_graph(&registry, &files);
        assert!(graph.edges.iter().any(|e| e.to == "unknown:totallyUnknownFn"));
    }

    #[test]
    fn import_resolution_follows_relative_path_rule() {
        assert_eq!(resolve_import_path("src/a.ts", "./b"), Some("src/b".to_string()));
        assert_eq!(resolve_import_path("src/sub/a.ts", "../b"), Some("src/b".to_string()));
        assert_eq!(resolve_import_path("src/a.ts", "react"), None);
    }

    #[test]
    fn graph_round_trips_through_serialization() {
        let registry = AdapterRegistry::with_builtins();
        let files = vec![("a.ts".to_string(), "export function main() { return 1; }\n".to_string())];
        let graph = build_code_graph(&registry, &files);
        let data1 = graph.to_data();
        let json1 = serde_json::to_string(&data1).unwrap();
        let restored = CodeGraph::from_data(serde_json::from_str(&json1).unwrap());
        let json2 = serde_json::to_string(&restored.to_data()).unwrap();
        assert_eq!(
            {
                let mut d1: GraphData = serde_json::from_str(&json1).unwrap();
                d1.nodes.sort_by(|a, b| a.id.cmp(&b.id));
                d1
            }
            .nodes
            .len(),
            {
                let mut d2: GraphData = serde_json::from_str(&json2).unwrap();
                d2.nodes.sort_by(|a, b| a.id.cmp(&b.id));
                d2
            }
            .nodes
            .len()
        );
    }

    #[test]
    fn load_drops_nodes_and_edges_with_unknown_kind() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("g.json");
        let json = r#"{
            "nodes": [
                {"id": "a.ts:main", "file": "a.ts", "kind": "function", "name": "main", "exported": true, "start_line": 1, "end_line": 2, "signature": null},
                {"id": "a.ts:Weird", "file": "a.ts", "kind": "totally_new_kind", "name": "Weird", "exported": true, "start_line": 1, "end_line": 2, "signature": null}
            ],
            "edges": [
                {"from": "a.ts:main", "to": "a.ts:main", "kind": "calls", "confidence": 0.8},
                {"from": "a.ts:main", "to": "a.ts:main", "kind": "some_future_edge_kind", "confidence": 0.5}
            ]
        }"#;
        std::fs::write(&path, json).unwrap();

        let graph = CodeGraph::load(&path).unwrap();
        assert!(graph.node("a.ts:main").is_some());
        assert!(graph.node("a.ts:Weird").is_none());
        assert_eq!(graph.get_edges("a.ts:main").len(), 1);
    }

    #[test]
    fn query_counts_are_correct() {
        let mut graph = CodeGraph::new();
        graph.add_node(GraphNode {
            id: "a.ts:main".into(),
            file: "a.ts".into(),
            kind: NodeKind::Function,
            name: "main".into(),
            exported: true,
            start_line: 1,
            end_line: 2,
            signature: None,
        });
        graph.add_node(GraphNode {
            id: "b.ts:helper".into(),
            file: "b.ts".into(),
            kind: NodeKind::Function,
            name: "helper".into(),
            exported: true,
            start_line: 1,
            end_line: 2,
            signature: None,
        });
        graph.add_edge(GraphEdge { from: "a.ts:main".into(), to: "b.ts:helper".into(), kind: EdgeKind::Calls, confidence: 0.8 });
        assert_eq!(graph.get_calls_count("a.ts:main"), 1);
        assert_eq!(graph.get_called_by_count("b.ts:helper"), 1);
        assert_eq!(graph.get_called_by_count("a.ts:main"), 0);
    }
}
