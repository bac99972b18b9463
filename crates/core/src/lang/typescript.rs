//! TypeScript/JavaScript adapter, grounded on the teacher's `ast.rs`
//! (`classify_node`, `extract_name`) and `graph.rs` (`collect_calls`,
//! `extract_inheritance`) for this language family.

use tree_sitter::{Node, Parser};

use super::util::{collect_calls, edges_from_calls, extract_signature};
use super::{CodeNode, ImportInfo, LanguageAdapter, MethodInfo, NodeKind, RawCallEdge};

pub struct TypeScriptAdapter;

fn language_for(path: &str) -> tree_sitter::Language {
    if path.ends_with(".tsx") {
        tree_sitter_typescript::LANGUAGE_TSX.into()
    } else if path.ends_with(".ts") {
        tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()
    } else {
        tree_sitter_javascript::LANGUAGE.into()
    }
}

fn classify(kind: &str) -> Option<NodeKind> {
    match kind {
        "function_declaration" => Some(NodeKind::Function),
        "class_declaration" => Some(NodeKind::Class),
        "interface_declaration" => Some(NodeKind::Interface),
        "type_alias_declaration" => Some(NodeKind::Type),
        "method_definition" => Some(NodeKind::Method),
        "lexical_declaration" | "variable_declaration" => Some(NodeKind::Const),
        _ => None,
    }
}

fn is_exported(node: &Node) -> bool {
    node.parent().map(|p| p.kind() == "export_statement").unwrap_or(false)
}

fn extract_name(node: &Node, source: &[u8]) -> Option<String> {
    if let Some(name_node) = node.child_by_field_name("name") {
        if let Ok(text) = name_node.utf8_text(source) {
            return Some(text.trim().to_string());
        }
    }
    if node.kind() == "lexical_declaration" || node.kind() == "variable_declaration" {
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if child.kind() == "variable_declarator" {
                if let Some(name_node) = child.child_by_field_name("name") {
                    if let Ok(text) = name_node.utf8_text(source) {
                        return Some(text.trim().to_string());
                    }
                }
            }
        }
    }
    None
}

fn walk_top_level(node: &Node, source: &[u8], into_export: bool) -> Vec<CodeNode> {
    let mut out = Vec::new();
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        let kind = child.kind();
        if kind == "export_statement" {
            out.extend(walk_top_level(&child, source, true));
            continue;
        }
        if let Some(node_kind) = classify(kind) {
            let name = match extract_name(&child, source) {
                Some(n) => n,
                None => continue,
            };
            let start_line = child.start_position().row + 1;
            let end_line = child.end_position().row + 1;
            let signature = extract_signature(&child, source, false);
            let exported = into_export || is_exported(&child);

            let methods = if matches!(node_kind, NodeKind::Class) {
                collect_methods(&child, source)
            } else {
                Vec::new()
            };

            out.push(CodeNode { kind: node_kind, name, exported, start_line, end_line, signature, methods });
        }
    }
    out
}

fn collect_methods(class_node: &Node, source: &[u8]) -> Vec<MethodInfo> {
    let mut methods = Vec::new();
    let Some(body) = class_node.child_by_field_name("body") else { return methods };
    let mut cursor = body.walk();
    for child in body.children(&mut cursor) {
        if child.kind() == "method_definition" {
            if let Some(name_node) = child.child_by_field_name("name") {
                if let Ok(name) = name_node.utf8_text(source) {
                    methods.push(MethodInfo {
                        name: name.trim().to_string(),
                        signature: extract_signature(&child, source, false),
                        start_line: child.start_position().row + 1,
                        end_line: child.end_position().row + 1,
                    });
                }
            }
        }
    }
    methods
}

impl LanguageAdapter for TypeScriptAdapter {
    fn language_id(&self) -> &str {
        "typescript"
    }

    fn extensions(&self) -> &[&str] {
        &[".ts", ".tsx", ".js", ".jsx", ".mjs", ".cjs"]
    }

    fn display_name(&self) -> Option<&str> {
        Some("TypeScript/JavaScript")
    }

    fn parse(&self, text: &str, path: &str) -> Vec<CodeNode> {
        let lang = language_for(path);
        let mut parser = Parser::new();
        if parser.set_language(&lang).is_err() {
            return Vec::new();
        }
        let Some(tree) = parser.parse(text, None) else { return Vec::new() };
        walk_top_level(&tree.root_node(), text.as_bytes(), false)
    }

    fn extract_imports(&self, text: &str, path: &str) -> Vec<ImportInfo> {
        let lang = language_for(path);
        let mut parser = Parser::new();
        if parser.set_language(&lang).is_err() {
            return Vec::new();
        }
        let Some(tree) = parser.parse(text, None) else { return Vec::new() };
        let source = text.as_bytes();
        let mut imports = Vec::new();
        let mut cursor = tree.root_node().walk();
        for child in tree.root_node().children(&mut cursor) {
            if child.kind() == "import_statement" {
                if let Some(src) = child.child_by_field_name("source") {
                    if let Ok(raw) = src.utf8_text(source) {
                        let specifier = raw.trim_matches(|c| c == '"' || c == '\'').to_string();
                        imports.push(ImportInfo { specifier });
                    }
                }
            }
        }
        imports
    }

    fn analyze_call_relationships(&self, text: &str, path: &str) -> Option<Vec<RawCallEdge>> {
        let lang = language_for(path);
        let mut parser = Parser::new();
        parser.set_language(&lang).ok()?;
        let tree = parser.parse(text, None)?;
        let source = text.as_bytes();
        let mut edges = Vec::new();

        fn walk_fns(node: &Node, source: &[u8], edges: &mut Vec<RawCallEdge>) {
            if node.kind() == "function_declaration" || node.kind() == "method_definition" {
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
    fn parses_exported_class_and_function() {
        let src = r#"
export class AuthService {
  verifyAccessToken(token) {
    return jwt.verify(token);
  }
}

export function login(user) {
  return authenticate(user);
}

interface Options {
  retries: number;
}
"#;
        let adapter = TypeScriptAdapter;
        let nodes = adapter.parse(src, "auth.ts");
        let class = nodes.iter().find(|n| n.name == "AuthService").unwrap();
        assert!(class.exported);
        assert_eq!(class.methods.len(), 1);
        assert_eq!(class.methods[0].name, "verifyAccessToken");

        let func = nodes.iter().find(|n| n.name == "login").unwrap();
        assert!(func.exported);

        let iface = nodes.iter().find(|n| n.name == "Options").unwrap();
        assert_eq!(iface.kind, NodeKind::Interface);
    }

    #[test]
    fn extracts_import_specifiers() {
        let src = r#"import { foo } from "./foo";
import bar from "../bar";
import * as path from "path";
"#;
        let adapter = TypeScriptAdapter;
        let imports = adapter.extract_imports(src, "x.ts");
        let specs: Vec<&str> = imports.iter().map(|i| i.specifier.as_str()).collect();
        assert!(specs.contains(&"./foo"));
        assert!(specs.contains(&"../bar"));
        assert!(specs.contains(&"path"));
    }

    #[test]
    fn call_relationships_skip_self_calls() {
        let src = r#"
function helper() { return 1; }
function main() {
  const x = helper();
  return x;
}
"#;
        let adapter = TypeScriptAdapter;
        let edges = adapter.analyze_call_relationships(src, "x.ts").unwrap();
        assert!(edges.iter().any(|e| e.from_symbol == "main" && e.to_symbol == "helper"));
    }
}
