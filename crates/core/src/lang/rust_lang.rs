//! Rust adapter, grounded on the teacher's own `ast.rs` handling of
//! `function_item`/`struct_item`/`impl_item`/`trait_item` nodes — the
//! teacher's language, read back through the adapter shape.

use tree_sitter::{Node, Parser};

use super::util::{collect_calls, edges_from_calls, extract_signature};
use super::{CodeNode, ImportInfo, LanguageAdapter, MethodInfo, NodeKind, RawCallEdge};

pub struct RustAdapter;

fn classify(kind: &str) -> Option<NodeKind> {
    match kind {
        "function_item" => Some(NodeKind::Function),
        "struct_item" | "enum_item" => Some(NodeKind::Class),
        "trait_item" => Some(NodeKind::Interface),
        "type_item" => Some(NodeKind::Type),
        "const_item" | "static_item" => Some(NodeKind::Const),
        _ => None,
    }
}

fn is_pub(node: &Node, source: &[u8]) -> bool {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == "visibility_modifier" {
            return true;
        }
        if child.start_position() != node.start_position() && child.kind() != "visibility_modifier" {
            break;
        }
    }
    node.utf8_text(source).map(|t| t.trim_start().starts_with("pub")).unwrap_or(false)
}

fn extract_name(node: &Node, source: &[u8]) -> Option<String> {
    if let Some(name_node) = node.child_by_field_name("name") {
        return name_node.utf8_text(source).ok().map(|s| s.trim().to_string());
    }
    None
}

fn impl_type_name(node: &Node, source: &[u8]) -> Option<String> {
    node.child_by_field_name("type").and_then(|t| t.utf8_text(source).ok()).map(|s| s.trim().to_string())
}

fn walk_top_level(node: &Node, source: &[u8]) -> Vec<CodeNode> {
    let mut out = Vec::new();
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        let kind = child.kind();
        if kind == "impl_item" {
            if let Some(name) = impl_type_name(&child, source) {
                let methods = collect_impl_methods(&child, source);
                out.push(CodeNode {
                    kind: NodeKind::Class,
                    name,
                    exported: true,
                    start_line: child.start_position().row + 1,
                    end_line: child.end_position().row + 1,
                    signature: extract_signature(&child, source, false),
                    methods,
                });
            }
            continue;
        }
        if let Some(node_kind) = classify(kind) {
            if let Some(name) = extract_name(&child, source) {
                out.push(CodeNode {
                    kind: node_kind,
                    name,
                    exported: is_pub(&child, source),
                    start_line: child.start_position().row + 1,
                    end_line: child.end_position().row + 1,
                    signature: extract_signature(&child, source, false),
                    methods: Vec::new(),
                });
            }
        }
    }
    out
}

fn collect_impl_methods(impl_node: &Node, source: &[u8]) -> Vec<MethodInfo> {
    let mut methods = Vec::new();
    let Some(body) = impl_node.child_by_field_name("body") else { return methods };
    let mut cursor = body.walk();
    for child in body.children(&mut cursor) {
        if child.kind() == "function_item" {
            if let Some(name) = extract_name(&child, source) {
                methods.push(MethodInfo {
                    name,
                    signature: extract_signature(&child, source, false),
                    start_line: child.start_position().row + 1,
                    end_line: child.end_position().row + 1,
                });
            }
        }
    }
    methods
}

impl LanguageAdapter for RustAdapter {
    fn language_id(&self) -> &str {
        "rust"
    }

    fn extensions(&self) -> &[&str] {
        &[".rs"]
    }

    fn display_name(&self) -> Option<&str> {
        Some("Rust")
    }

    fn parse(&self, text: &str, _path: &str) -> Vec<CodeNode> {
        let mut parser = Parser::new();
        if parser.set_language(&tree_sitter_rust::LANGUAGE.into()).is_err() {
            return Vec::new();
        }
        let Some(tree) = parser.parse(text, None) else { return Vec::new() };
        walk_top_level(&tree.root_node(), text.as_bytes())
    }

    fn extract_imports(&self, text: &str, _path: &str) -> Vec<ImportInfo> {
        let mut parser = Parser::new();
        if parser.set_language(&tree_sitter_rust::LANGUAGE.into()).is_err() {
            return Vec::new();
        }
        let Some(tree) = parser.parse(text, None) else { return Vec::new() };
        let source = text.as_bytes();
        let mut imports = Vec::new();
        let mut cursor = tree.root_node().walk();
        for child in tree.root_node().children(&mut cursor) {
            if child.kind() == "use_declaration" {
                if let Ok(text) = child.utf8_text(source) {
                    let specifier = text
                        .trim_start_matches("pub")
                        .trim_start()
                        .trim_start_matches("use")
                        .trim()
                        .trim_end_matches(';')
                        .to_string();
                    imports.push(ImportInfo { specifier });
                }
            }
        }
        imports
    }

    fn analyze_call_relationships(&self, text: &str, _path: &str) -> Option<Vec<RawCallEdge>> {
        let mut parser = Parser::new();
        parser.set_language(&tree_sitter_rust::LANGUAGE.into()).ok()?;
        let tree = parser.parse(text, None)?;
        let source = text.as_bytes();
        let mut edges = Vec::new();

        fn walk_fns(node: &Node, source: &[u8], edges: &mut Vec<RawCallEdge>) {
            if node.kind() == "function_item" {
                if let Some(name_node) = node.child_by_field_name("name") {
                    if let Ok(name) = name_node.utf8_text(source) {
                        let mut calls = Vec::new();
                        if let Some(body) = node.child_by_field_name("body") {
                            collect_calls(&body, source, &["call_expression"], &mut calls);
                        }
                        edges.extend(edges_from_calls(name, calls));
                    }
                }
            }
            let mut cursor = node.walk();
            for child in node.children(&mut cursor) {
                walk_fns(&child, source, edges);
            }
        }
        walk_fns(&tree.root_node(), source, &mut edges);
        Some(edges)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_struct_impl_and_methods() {
        let src = r#"
pub struct Config {
    name: String,
}

impl Config {
    pub fn new() -> Self {
        Config { name: String::new() }
    }

    fn validate(&self) -> bool {
        !self.name.is_empty()
    }
}

fn helper() -> i32 { 1 }
"#;
        let adapter = RustAdapter;
        let nodes = adapter.parse(src, "config.rs");
        let config_struct = nodes.iter().find(|n| n.name == "Config" && n.kind == NodeKind::Class).unwrap();
        assert!(config_struct.exported);

        let config_impl = nodes.iter().filter(|n| n.name == "Config").count();
        assert_eq!(config_impl, 2); // struct + impl block

        let helper = nodes.iter().find(|n| n.name == "helper").unwrap();
        assert!(!helper.exported);
    }

    #[test]
    fn extracts_use_declarations() {
        let src = "use std::collections::HashMap;\nuse crate::error::Error;\n";
        let adapter = RustAdapter;
        let imports = adapter.extract_imports(src, "lib.rs");
        assert_eq!(imports.len(), 2);
    }
}
