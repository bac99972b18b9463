//! Python adapter. Spec §4.2 notes Python's parser may be an external
//! capability; here it is implemented directly via `tree-sitter-python`
//! (already in the teacher's own grammar set in `ast.rs`), which keeps the
//! whole registry usable without a subprocess dependency in this rewrite.

use tree_sitter::{Node, Parser};

use super::util::{collect_calls, edges_from_calls, extract_signature};
use super::{CodeNode, ImportInfo, LanguageAdapter, MethodInfo, NodeKind, RawCallEdge};

pub struct PythonAdapter;

fn extract_name(node: &Node, source: &[u8]) -> Option<String> {
    node.child_by_field_name("name").and_then(|n| n.utf8_text(source).ok()).map(|s| s.trim().to_string())
}

fn walk_top_level(node: &Node, source: &[u8]) -> Vec<CodeNode> {
    let mut out = Vec::new();
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "function_definition" => {
                if let Some(name) = extract_name(&child, source) {
                    out.push(CodeNode {
                        kind: NodeKind::Function,
                        exported: !name.starts_with('_'),
                        name,
                        start_line: child.start_position().row + 1,
                        end_line: child.end_position().row + 1,
                        signature: extract_signature(&child, source, true),
                        methods: Vec::new(),
                    });
                }
            }
            "class_definition" => {
                if let Some(name) = extract_name(&child, source) {
                    let methods = collect_methods(&child, source);
                    out.push(CodeNode {
                        kind: NodeKind::Class,
                        exported: !name.starts_with('_'),
                        name,
                        start_line: child.start_position().row + 1,
                        end_line: child.end_position().row + 1,
                        signature: extract_signature(&child, source, true),
                        methods,
                    });
                }
            }
            _ => {}
        }
    }
    out
}

fn collect_methods(class_node: &Node, source: &[u8]) -> Vec<MethodInfo> {
    let mut methods = Vec::new();
    let Some(body) = class_node.child_by_field_name("body") else { return methods };
    let mut cursor = body.walk();
    for child in body.children(&mut cursor) {
        if child.kind() == "function_definition" {
            if let Some(name) = extract_name(&child, source) {
                methods.push(MethodInfo {
                    name,
                    signature: extract_signature(&child, source, true),
                    start_line: child.start_position().row + 1,
                    end_line: child.end_position().row + 1,
                });
            }
        }
    }
    methods
}

impl LanguageAdapter for PythonAdapter {
    fn language_id(&self) -> &str {
        "python"
    }
    fn extensions(&self) -> &[&str] {
        &[".py", ".pyi"]
    }
    fn display_name(&self) -> Option<&str> {
        Some("Python")
    }

    fn parse(&self, text: &str, _path: &str) -> Vec<CodeNode> {
        let mut parser = Parser::new();
        if parser.set_language(&tree_sitter_python::LANGUAGE.into()).is_err() {
            return Vec::new();
        }
        let Some(tree) = parser.parse(text, None) else { return Vec::new() };
        walk_top_level(&tree.root_node(), text.as_bytes())
    }

    fn extract_imports(&self, text: &str, _path: &str) -> Vec<ImportInfo> {
        let mut parser = Parser::new();
        if parser.set_language(&tree_sitter_python::LANGUAGE.into()).is_err() {
            return Vec::new();
        }
        let Some(tree) = parser.parse(text, None) else { return Vec::new() };
        let source = text.as_bytes();
        let mut imports = Vec::new();
        let mut cursor = tree.root_node().walk();
        for child in tree.root_node().children(&mut cursor) {
            match child.kind() {
                "import_statement" => {
                    if let Ok(raw) = child.utf8_text(source) {
                        let spec = raw.trim_start_matches("import").trim();
                        imports.push(ImportInfo { specifier: spec.to_string() });
                    }
                }
                "import_from_statement" => {
                    if let Some(module) = child.child_by_field_name("module_name") {
                        if let Ok(raw) = module.utf8_text(source) {
                            imports.push(ImportInfo { specifier: raw.trim().to_string() });
                        }
                    }
                }
                _ => {}
            }
        }
        imports
    }

    fn analyze_call_relationships(&self, text: &str, _path: &str) -> Option<Vec<RawCallEdge>> {
        let mut parser = Parser::new();
        parser.set_language(&tree_sitter_python::LANGUAGE.into()).ok()?;
        let tree = parser.parse(text, None)?;
        let source = text.as_bytes();
        let mut edges = Vec::new();

        fn walk_fns(node: &Node, source: &[u8], edges: &mut Vec<RawCallEdge>) {
            if node.kind() == "function_definition" {
                if let Some(name) = extract_name(node, source) {
                    let mut calls = Vec::new();
                    if let Some(body) = node.child_by_field_name("body") {
                        collect_calls(&body, source, &["call"], &mut calls);
                    }
                    edges.extend(edges_from_calls(&name, calls));
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
    fn parses_functions_and_classes() {
        let src = r#"
def greet(name: str) -> str:
    return f"Hello, {name}!"

class Config:
    def __init__(self, name):
        self.name = name

    def process(self):
        return len(self.name) > 0
"#;
        let adapter = PythonAdapter;
        let nodes = adapter.parse(src, "app.py");
        let greet = nodes.iter().find(|n| n.name == "greet").unwrap();
        assert!(greet.exported);
        let config = nodes.iter().find(|n| n.name == "Config").unwrap();
        assert_eq!(config.methods.len(), 2);
    }

    #[test]
    fn extracts_imports() {
        let src = "import os\nfrom collections import OrderedDict\n";
        let adapter = PythonAdapter;
        let imports = adapter.extract_imports(src, "app.py");
        assert_eq!(imports.len(), 2);
    }
}
