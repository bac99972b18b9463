//! Hand-rolled S-expression adapter (Clojure/Scheme/Common Lisp family) —
//! no tree-sitter grammar for this family exists anywhere in the retrieval
//! pack, so this demonstrates the registry pattern (spec §4.2) with a
//! paren-balancing scanner instead, in the same spirit as the chunker's
//! brace counter.

use super::{CodeNode, ImportInfo, LanguageAdapter, NodeKind};

pub struct SexprAdapter;

const DEF_FORMS: &[(&str, NodeKind)] = &[
    ("defn", NodeKind::Function),
    ("defn-", NodeKind::Function),
    ("define", NodeKind::Function),
    ("defun", NodeKind::Function),
    ("defmacro", NodeKind::Function),
    ("defstruct", NodeKind::Class),
    ("defrecord", NodeKind::Class),
    ("deftype", NodeKind::Type),
    ("def", NodeKind::Const),
];

/// Scan top-level forms `(keyword name ...)`, paren-balancing to find each
/// form's extent while skipping string and `;`-comment contexts.
fn top_level_forms(text: &str) -> Vec<(usize, usize)> {
    let bytes = text.as_bytes();
    let mut spans = Vec::new();
    let mut i = 0usize;
    let mut in_string = false;

    while i < bytes.len() {
        let c = bytes[i];
        if in_string {
            if c == b'\\' {
                i += 2;
                continue;
            }
            if c == b'"' {
                in_string = false;
            }
            i += 1;
            continue;
        }
        match c {
            b';' => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
            }
            b'"' => {
                in_string = true;
                i += 1;
            }
            b'(' => {
                let start = i;
                let mut depth = 0i32;
                while i < bytes.len() {
                    match bytes[i] {
                        b'"' if !in_string => in_string = true,
                        b'"' if in_string => in_string = false,
                        b'(' if !in_string => depth += 1,
                        b')' if !in_string => {
                            depth -= 1;
                            if depth == 0 {
                                i += 1;
                                break;
                            }
                        }
                        _ => {}
                    }
                    i += 1;
                }
                spans.push((start, i));
            }
            _ => i += 1,
        }
    }
    spans
}

fn parse_form<'a>(text: &'a str, start: usize, end: usize) -> Option<(&'a str, &'a str)> {
    let inner = text[start + 1..end.saturating_sub(1)].trim_start();
    let mut tokens = inner.split_whitespace();
    let keyword = tokens.next()?;
    let name = tokens.next()?.trim_start_matches('^').trim_matches(|c| c == '(' || c == ')');
    Some((keyword, name))
}

fn line_of(text: &str, byte_offset: usize) -> usize {
    text[..byte_offset.min(text.len())].matches('\n').count() + 1
}

impl LanguageAdapter for SexprAdapter {
    fn language_id(&self) -> &str {
        "sexpr"
    }

    fn extensions(&self) -> &[&str] {
        &[".clj", ".cljs", ".cljc", ".scm", ".ss", ".lisp", ".lsp", ".el"]
    }

    fn display_name(&self) -> Option<&str> {
        Some("Lisp/Scheme/Clojure")
    }

    fn parse(&self, text: &str, _path: &str) -> Vec<CodeNode> {
        let mut out = Vec::new();
        for (start, end) in top_level_forms(text) {
            let Some((keyword, name)) = parse_form(text, start, end) else { continue };
            let Some((_, kind)) = DEF_FORMS.iter().find(|(k, _)| *k == keyword) else { continue };
            let start_line = line_of(text, start);
            let end_line = line_of(text, end.saturating_sub(1).max(start));
            let signature = text[start..end].lines().next().unwrap_or("").trim().to_string();
            out.push(CodeNode {
                kind: *kind,
                name: name.to_string(),
                exported: !keyword.ends_with('-'),
                start_line,
                end_line,
                signature,
                methods: Vec::new(),
            });
        }
        out
    }

    fn extract_imports(&self, text: &str, _path: &str) -> Vec<ImportInfo> {
        let mut imports = Vec::new();
        for (start, end) in top_level_forms(text) {
            let inner = text[start + 1..end.saturating_sub(1)].trim_start();
            if inner.starts_with("require") || inner.starts_with("use ") || inner.starts_with("import ") {
                for token in inner.split_whitespace().skip(1) {
                    let cleaned = token.trim_matches(|c| c == '[' || c == ']' || c == '(' || c == ')' || c == '\'');
                    if !cleaned.is_empty() {
                        imports.push(ImportInfo { specifier: cleaned.to_string() });
                        break;
                    }
                }
            }
        }
        imports
    }
}
