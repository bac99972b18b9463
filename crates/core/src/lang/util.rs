//! Shared tree-sitter walking helpers reused across language adapters.
//! Grounded on the teacher's `server/src/graph.rs` (`extract_callee_name`,
//! `collect_calls`) and `server/src/ast.rs` (`extract_signature`).

use tree_sitter::Node;

use super::RawCallEdge;

/// Build a one-line signature from a node, stripping the body, following
/// `ast.rs`'s `extract_signature`.
pub fn extract_signature(node: &Node, source: &[u8], is_python: bool) -> String {
    let text = node.utf8_text(source).unwrap_or("");
    let first_line = text.lines().next().unwrap_or("").trim();

    let sig = if is_python {
        if let Some(colon) = first_line.find(':') {
            &first_line[..=colon]
        } else {
            first_line
        }
    } else if let Some(brace) = first_line.find('{') {
        first_line[..brace].trim()
    } else {
        first_line
    };

    if sig.len() > 200 {
        let boundary = floor_char_boundary(sig, 200);
        format!("{}...", &sig[..boundary])
    } else {
        sig.to_string()
    }
}

fn floor_char_boundary(s: &str, index: usize) -> usize {
    if index >= s.len() {
        return s.len();
    }
    let mut i = index;
    while i > 0 && !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

/// Walk a function body collecting call-expression callee names, following
/// `graph.rs`'s `collect_calls`/`extract_callee_name`.
pub fn collect_calls(node: &Node, source: &[u8], call_kinds: &[&str], calls: &mut Vec<String>) {
    let kind = node.kind();
    if call_kinds.contains(&kind) {
        if let Some(name) = extract_callee_name(node, source) {
            calls.push(name);
        }
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_calls(&child, source, call_kinds, calls);
    }
}

pub fn extract_callee_name(node: &Node, source: &[u8]) -> Option<String> {
    let func_node = node
        .child_by_field_name("function")
        .or_else(|| node.child_by_field_name("name"))
        .or_else(|| node.child_by_field_name("method"))?;

    let text = func_node.utf8_text(source).ok()?.trim().to_string();
    let name = text
        .rsplit_once("::")
        .map(|(_, n)| n)
        .or_else(|| text.rsplit_once('.').map(|(_, n)| n))
        .unwrap_or(&text);

    if name.is_empty() || name.starts_with(|c: char| c.is_ascii_digit()) {
        return None;
    }
    Some(name.to_string())
}

/// Turn per-function call lists into `RawCallEdge`s, skipping self-calls and
/// de-duplicating within one function body — shared across adapters that
/// report explicit call relationships (spec §4.2's optional fourth op).
pub fn edges_from_calls(from_symbol: &str, calls: Vec<String>) -> Vec<RawCallEdge> {
    let mut seen = std::collections::HashSet::new();
    calls
        .into_iter()
        .filter(|c| c != from_symbol && seen.insert(c.clone()))
        .map(|to_symbol| RawCallEdge { from_symbol: from_symbol.to_string(), to_symbol, confidence: 0.75 })
        .collect()
}
