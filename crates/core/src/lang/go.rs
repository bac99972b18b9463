//! Go adapter, grounded on the teacher's `ast.rs`/`graph.rs` handling of
//! `method_declaration`/`type_spec` nodes for this language.

use tree_sitter::{Node, Parser};

use super::util::{collect_calls, edges_from_calls, extract_signature};
use super::{CodeNode, ImportInfo, LanguageAdapter, NodeKind, RawCallEdge};

pub struct GoAdapter;

fn is_exported(name: &str) -> bool {
    name.chars().next().map(|c| c.is_uppercase()).unwrap_or(false)
}

fn receiver_type(node: &Node, source: &[u8]) -> Option<String> {
    let params = node.child_by_field_name("receiver")?;
    let mut cursor = params.walk();
    for child in params.children(&mut cursor) {
        if child.kind() == "parameter_declaration" {
            if let Some(type_node) = child.child_by_field_name("type") {
                let text = type_node.utf8_text(source).ok()?.trim();
                return Some(text.trim_start_matches('*').to_string());
            }
        }
    }
    None
}

fn walk_top_level(node: &Node, source: &[u8]) -> Vec<CodeNode> {
    let mut out = Vec::new();
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "function_declaration" => {
                if let Some(name_node) = child.child_by_field_name("name") {
                    if let Ok(name) = name_node.utf8_text(source) {
                        out.push(CodeNode {
                            kind: NodeKind::Function,
                            name: name.to_string(),
                            exported: is_exported(name),
                            start_line: child.start_position().row + 1,
                            end_line: child.end_position().row + 1,
                            signature: extract_signature(&child, source, false),
                            methods: Vec::new(),
                        });
                    }
                }
            }
            "method_declaration" => {
                if let Some(name_node) = child.child_by_field_name("name") {
                    if let Ok(name) = name_node.utf8_text(source) {
                        let recv = receiver_type(&child, source);
                        out.push(CodeNode {
                            kind: NodeKind::Method,
                            name: recv.map(|r| format!("{r}.{name}")).unwrap_or_else(|| name.to_string()),
                            exported: is_exported(name),
                            start_line: child.start_position().row + 1,
                            end_line: child.end_position().row + 1,
                            signature: extract_signature(&child, source, false),
                            methods: Vec::new(),
                        });
                    }
                }
            }
            "type_declaration" => {
                let mut tcursor = child.walk();
                for spec in child.children(&mut tcursor) {
                    if spec.kind() == "type_spec" {
                        if let Some(name_node) = spec.named_child(0) {
                            if let Ok(name) = name_node.utf8_text(source) {
                                out.push(CodeNode {
                                    kind: NodeKind::Type,
                                    name: name.to_string(),
                                    exported: is_exported(name),
                                    start_line: spec.start_position().row + 1,
                                    end_line: spec.end_position().row + 1,
                                    signature: extract_signature(&spec, source, false),
                                    methods: Vec::new(),
                                });
                            }
                        }
                    }
                }
            }
            _ => {}
        }
    }
    out
}

impl LanguageAdapter for GoAdapter {
    fn language_id(&self) -> &str {
        "go"
    }
    fn extensions(&self) -> &[&str] {
        &[".go"]
    }
    fn display_name(&self) -> Option<&str> {
        Some("Go")
    }

    fn parse(&self, text: &str, _path: &str) -> Vec<CodeNode> {
        let mut parser = Parser::new();
        if parser.set_language(&tree_sitter_go::LANGUAGE.into()).is_err() {
            return Vec::new();
        }
        let Some(tree) = parser.parse(text, None) else { return Vec::new() };
        walk_top_level(&tree.root_node(), text.as_bytes())
    }

    fn extract_imports(&self, text: &str, _path: &str) -> Vec<ImportInfo> {
        let mut parser = Parser::new();
        if parser.set_language(&tree_sitter_go::LANGUAGE.into()).is_err() {
            return Vec::new();
        }
        let Some(tree) = parser.parse(text, None) else { return Vec::new() };
        let source = text.as_bytes();
        let mut imports = Vec::new();

        fn collect(node: &Node, source: &[u8], imports: &mut Vec<ImportInfo>) {
            if node.kind() == "import_spec" {
                if let Some(path_node) = node.child_by_field_name("path") {
                    if let Ok(raw) = path_node.utf8_text(source) {
                        imports.push(ImportInfo { specifier: raw.trim_matches('"').to_string() });
                    }
                }
            }
            let mut cursor = node.walk();
            for child in node.children(&mut cursor) {
                collect(&child, source, imports);
            }
        }
        collect(&tree.root_node(), source, &mut imports);
        imports
    }

    fn analyze_call_relationships(&self, text: &str, _path: &str) -> Option<Vec<RawCallEdge>> {
        let mut parser = Parser::new();
        parser.set_language(&tree_sitter_go::LANGUAGE.into()).ok()?;
        let tree = parser.parse(text, None)?;
        let source = text.as_bytes();
        let mut edges = Vec::new();

        fn walk_fns(node: &Node, source: &[u8], edges: &mut Vec<RawCallEdge>) {
            if node.kind() == "function_declaration" || node.kind() == "method_declaration" {
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
    fn parses_functions_methods_and_types() {
        let src = r#"
package main

type Server struct {
    addr string
}

func (s *Server) Run() error {
    return listen(s.addr)
}

func helper() int {
    return 1
}
"#;
        let adapter = GoAdapter;
        let nodes = adapter.parse(src, "main.go");
        assert!(nodes.iter().any(|n| n.name == "Server" && n.kind == NodeKind::Type));
        assert!(nodes.iter().any(|n| n.name == "Server.Run" && n.exported));
        let helper = nodes.iter().find(|n| n.name == "helper").unwrap();
        assert!(!helper.exported);
    }
}
