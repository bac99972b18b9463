//! Content-aware chunking (C3, spec §4.1).
//!
//! Two preset shapes — code (target 768, overlap 100) and web/docs (target
//! 1200, overlap 200) — plus a shared, string/comment-aware brace counter
//! reused here and by `search::extract_code_unit` (§4.6.6). The counter is
//! new work grounded on the character-scanning technique the teacher uses
//! for signature truncation in `ast.rs` and block extraction in `stubs.rs`,
//! generalized into one shared scanner.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy)]
pub struct ChunkPreset {
    pub target: usize,
    pub overlap: usize,
}

impl ChunkPreset {
    pub const CODE: ChunkPreset = ChunkPreset { target: 768, overlap: 100 };
    pub const WEB: ChunkPreset = ChunkPreset { target: 1200, overlap: 200 };
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub content: String,
    pub chunk_index: usize,
    pub total_chunks: usize,
    pub start_offset: usize,
    pub end_offset: usize,
    pub section_header: Option<String>,
    pub symbol_name: Option<String>,
}

/// Split `text` assuming it is Markdown (ATX headers depth 1-4).
pub fn chunk_markdown(text: &str, preset: ChunkPreset) -> Vec<Chunk> {
    let sections = split_markdown_sections(text);
    let mut out = Vec::new();
    for section in sections {
        if section.body.len() <= preset.target {
            out.push(RawChunk {
                content: section.body,
                start: section.start,
                end: section.end,
                section_header: section.header,
                symbol_name: None,
            });
        } else {
            let sub = sliding_window_raw(&section.body, section.start, preset);
            for mut chunk in sub {
                chunk.section_header = section.header.clone();
                out.push(chunk);
            }
        }
    }
    finalize(out)
}

struct MdSection {
    header: Option<String>,
    body: String,
    start: usize,
    end: usize,
}

fn split_markdown_sections(text: &str) -> Vec<MdSection> {
    let mut sections = Vec::new();
    let mut current_header: Option<String> = None;
    let mut current_start = 0usize;
    let mut current_body = String::new();
    let mut offset = 0usize;

    for line in text.split_inclusive('\n') {
        let trimmed = line.trim_end_matches('\n');
        if let Some(level_text) = atx_header(trimmed) {
            if !current_body.is_empty() || current_header.is_some() {
                sections.push(MdSection {
                    header: current_header.take(),
                    body: std::mem::take(&mut current_body),
                    start: current_start,
                    end: offset,
                });
            }
            current_header = Some(level_text);
            current_start = offset;
            current_body.push_str(line);
        } else {
            if current_body.is_empty() && current_header.is_none() {
                current_start = offset;
            }
            current_body.push_str(line);
        }
        offset += line.len();
    }
    if !current_body.is_empty() || current_header.is_some() {
        sections.push(MdSection { header: current_header, body: current_body, start: current_start, end: offset });
    }
    if sections.is_empty() {
        sections.push(MdSection { header: None, body: text.to_string(), start: 0, end: text.len() });
    }
    sections
}

/// Returns the header text (without the leading `#`s) for ATX headers of
/// depth 1-4, else `None`.
fn atx_header(line: &str) -> Option<String> {
    let trimmed = line.trim_start();
    let hashes = trimmed.chars().take_while(|&c| c == '#').count();
    if hashes == 0 || hashes > 4 {
        return None;
    }
    let rest = &trimmed[hashes..];
    if !rest.starts_with(' ') && !rest.is_empty() {
        return None;
    }
    Some(rest.trim().to_string())
}

/// Split source code on top-level declarations, brace-balancing block
/// bodies with a string/comment-aware scanner (spec §4.1).
pub fn chunk_source(text: &str, preset: ChunkPreset) -> Vec<Chunk> {
    let declarations = split_top_level_declarations(text);
    let mut out = Vec::new();
    for decl in declarations {
        let body = &text[decl.start..decl.end];
        if body.len() <= preset.target {
            out.push(RawChunk {
                content: body.to_string(),
                start: decl.start,
                end: decl.end,
                section_header: None,
                symbol_name: decl.name,
            });
        } else {
            let sub = sliding_window_raw(body, decl.start, preset);
            for mut chunk in sub {
                chunk.symbol_name = decl.name.clone();
                out.push(chunk);
            }
        }
    }
    finalize(out)
}

struct Declaration {
    start: usize,
    end: usize,
    name: Option<String>,
}

const DECLARATION_KEYWORDS: &[&str] =
    &["function", "class", "interface", "type", "const", "let", "var", "enum"];

/// Find top-level declaration spans. A declaration starts at a leading
/// JSDoc/line-comment run or the keyword line itself, and ends either at the
/// matching closing brace (block-bodied) or at the next top-level
/// declaration / end of file (non-block, e.g. `type X = ...;`).
fn split_top_level_declarations(text: &str) -> Vec<Declaration> {
    let bytes = text.as_bytes();
    let mut decls = Vec::new();
    let mut cursor = 0usize;
    let mut pending_comment_start: Option<usize> = None;

    let mut i = 0usize;
    while i < bytes.len() {
        // Skip leading whitespace at top level, tracking comment runs so
        // they attach to the following declaration.
        if is_line_start(text, i) {
            let line_end = text[i..].find('\n').map(|o| i + o).unwrap_or(text.len());
            let line = text[i..line_end].trim_start();
            if line.starts_with("//") || line.starts_with("/**") || line.starts_with("/*") || line.starts_with('*') {
                if pending_comment_start.is_none() {
                    pending_comment_start = Some(i);
                }
                i = line_end + 1;
                continue;
            }
            if line.is_empty() {
                i = line_end + 1;
                continue;
            }
            if let Some(kw) = DECLARATION_KEYWORDS.iter().find(|kw| starts_with_keyword(line, kw)) {
                let decl_start = pending_comment_start.take().unwrap_or(i);
                let name = extract_declaration_name(line, kw);
                let (decl_end, consumed_to) = find_declaration_end(text, i, line_end);
                decls.push(Declaration { start: decl_start, end: decl_end, name });
                i = consumed_to;
                cursor = i;
                continue;
            }
            pending_comment_start = None;
        }
        i += 1;
    }
    if decls.is_empty() {
        return vec![Declaration { start: 0, end: text.len(), name: None }];
    }
    // Trailing content after the last declaration (or before the first) is
    // folded into neighboring spans so concatenation reproduces the input.
    if decls[0].start > 0 {
        decls[0].start = 0;
    }
    for i in 1..decls.len() {
        if decls[i].start > decls[i - 1].end {
            decls[i - 1].end = decls[i].start;
        }
    }
    if let Some(last) = decls.last_mut() {
        last.end = last.end.max(cursor).max(text.len().min(last.end));
    }
    if let Some(last) = decls.last_mut() {
        last.end = text.len();
    }
    decls
}

fn is_line_start(text: &str, i: usize) -> bool {
    i == 0 || text.as_bytes().get(i - 1) == Some(&b'\n')
}

fn starts_with_keyword(line: &str, kw: &str) -> bool {
    let line = line.trim_start_matches("export ").trim_start_matches("default ").trim_start_matches("declare ");
    if !line.starts_with(kw) {
        return false;
    }
    matches!(line.as_bytes().get(kw.len()), Some(b' ') | Some(b'*') | None)
}

fn extract_declaration_name(line: &str, kw: &str) -> Option<String> {
    let rest = line.trim_start_matches("export ").trim_start_matches("default ").trim_start_matches("declare ");
    let rest = rest.strip_prefix(kw)?.trim_start();
    let rest = rest.trim_start_matches('*').trim_start();
    let name: String = rest.chars().take_while(|c| c.is_alphanumeric() || *c == '_' || *c == '$').collect();
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}

/// From the declaration's keyword line, find where the declaration ends:
/// brace-balance to the matching `}` for block bodies, else to the first
/// top-level `;` or newline for statement-style declarations (`type X = Y;`).
/// Byte offset of the end of the declaration starting at `decl_line_start`:
/// brace-balanced for block bodies, or the first top-level `;` otherwise.
/// Shared with `search::extract_code_unit` (§4.6.6), which reuses this exact
/// scanner to bound a symbol's full text for `full`-detail enrichment.
pub(crate) fn find_declaration_end(text: &str, decl_line_start: usize, _line_end: usize) -> (usize, usize) {
    let bytes = text.as_bytes();
    let mut i = decl_line_start;
    let mut depth: i32 = 0;
    let mut seen_brace = false;
    let mut in_string: Option<u8> = None;
    let mut in_template = false;
    let mut in_line_comment = false;
    let mut in_block_comment = false;

    while i < bytes.len() {
        let c = bytes[i];
        if in_line_comment {
            if c == b'\n' {
                in_line_comment = false;
            }
            i += 1;
            continue;
        }
        if in_block_comment {
            if c == b'*' && bytes.get(i + 1) == Some(&b'/') {
                in_block_comment = false;
                i += 2;
                continue;
            }
            i += 1;
            continue;
        }
        if let Some(q) = in_string {
            if c == b'\\' {
                i += 2;
                continue;
            }
            if c == q {
                in_string = None;
            }
            i += 1;
            continue;
        }
        if in_template {
            if c == b'\\' {
                i += 2;
                continue;
            }
            if c == b'`' {
                in_template = false;
            }
            i += 1;
            continue;
        }
        match c {
            b'/' if bytes.get(i + 1) == Some(&b'/') => {
                in_line_comment = true;
                i += 2;
                continue;
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                in_block_comment = true;
                i += 2;
                continue;
            }
            b'"' | b'\'' => {
                in_string = Some(c);
                i += 1;
                continue;
            }
            b'`' => {
                in_template = true;
                i += 1;
                continue;
            }
            b'{' => {
                depth += 1;
                seen_brace = true;
                i += 1;
                continue;
            }
            b'}' => {
                depth -= 1;
                i += 1;
                if seen_brace && depth <= 0 {
                    return (i, i);
                }
                continue;
            }
            b';' if !seen_brace => {
                return (i + 1, i + 1);
            }
            _ => {}
        }
        i += 1;
    }
    (bytes.len(), bytes.len())
}

/// All other inputs use sliding-window by character count.
pub fn chunk_sliding_window(text: &str, preset: ChunkPreset) -> Vec<Chunk> {
    finalize(sliding_window_raw(text, 0, preset))
}

struct RawChunk {
    content: String,
    start: usize,
    end: usize,
    section_header: Option<String>,
    symbol_name: Option<String>,
}

fn sliding_window_raw(text: &str, base_offset: usize, preset: ChunkPreset) -> Vec<RawChunk> {
    if text.is_empty() {
        return vec![];
    }
    let char_indices: Vec<usize> = text.char_indices().map(|(i, _)| i).chain(std::iter::once(text.len())).collect();
    let total_chars = char_indices.len() - 1;
    if total_chars <= preset.target {
        return vec![RawChunk {
            content: text.to_string(),
            start: base_offset,
            end: base_offset + text.len(),
            section_header: None,
            symbol_name: None,
        }];
    }

    let mut out = Vec::new();
    let mut start_char = 0usize;
    let step = preset.target.saturating_sub(preset.overlap).max(1);
    while start_char < total_chars {
        let end_char = (start_char + preset.target).min(total_chars);
        let start_byte = char_indices[start_char];
        let end_byte = char_indices[end_char];
        out.push(RawChunk {
            content: text[start_byte..end_byte].to_string(),
            start: base_offset + start_byte,
            end: base_offset + end_byte,
            section_header: None,
            symbol_name: None,
        });
        if end_char >= total_chars {
            break;
        }
        start_char += step;
    }
    out
}

fn finalize(raw: Vec<RawChunk>) -> Vec<Chunk> {
    let total = raw.len();
    raw.into_iter()
        .enumerate()
        .map(|(i, r)| Chunk {
            content: r.content,
            chunk_index: i,
            total_chunks: total,
            start_offset: r.start,
            end_offset: r.end,
            section_header: r.section_header,
            symbol_name: r.symbol_name,
        })
        .collect()
}

/// Dispatch by extension, following spec §4.1's three input families.
pub fn chunk_text(text: &str, ext: &str) -> Vec<Chunk> {
    let lower = ext.trim_start_matches('.').to_lowercase();
    match lower.as_str() {
        "md" | "markdown" | "mdx" => chunk_markdown(text, ChunkPreset::WEB),
        "ts" | "tsx" | "js" | "jsx" | "mjs" | "cjs" => chunk_source(text, ChunkPreset::CODE),
        _ => chunk_sliding_window(text, ChunkPreset::CODE),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn concat_reconstructs(text: &str, chunks: &[Chunk]) -> bool {
        let mut rebuilt = String::new();
        let mut cursor = 0usize;
        for c in chunks {
            if c.start_offset < cursor {
                // overlap region: only take the non-overlapping tail
                let skip = cursor - c.start_offset;
                if skip < c.content.len() {
                    rebuilt.push_str(&c.content[skip..]);
                }
            } else {
                rebuilt.push_str(&c.content);
            }
            cursor = cursor.max(c.end_offset);
        }
        rebuilt == text
    }

    #[test]
    fn markdown_sections_split_on_headers() {
        let body = "x".repeat(300);
        let text = format!("# Intro\n{body}\n\n## Usage\n{body}\n\n## FAQ\n{body}\n");
        let chunks = chunk_markdown(&text, ChunkPreset::WEB);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].section_header.as_deref(), Some("Intro"));
        assert_eq!(chunks[1].section_header.as_deref(), Some("Usage"));
        assert_eq!(chunks[2].section_header.as_deref(), Some("FAQ"));
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.chunk_index, i);
            assert_eq!(c.total_chunks, 3);
        }
    }

    #[test]
    fn markdown_round_trips_via_offsets() {
        let text = "# A\nhello world\n\n## B\nmore text here\n";
        let chunks = chunk_markdown(text, ChunkPreset::WEB);
        assert!(concat_reconstructs(text, &chunks));
    }

    #[test]
    fn large_markdown_section_falls_back_to_sliding_window() {
        let body = "word ".repeat(2000);
        let text = format!("# Big\n{body}");
        let chunks = chunk_markdown(&text, ChunkPreset::WEB);
        assert!(chunks.len() > 1);
        for c in &chunks {
            assert_eq!(c.section_header.as_deref(), Some("Big"));
        }
    }

    #[test]
    fn chunk_indices_are_well_formed() {
        let text = "a".repeat(5000);
        let chunks = chunk_sliding_window(&text, ChunkPreset::CODE);
        assert!(chunks.len() > 1);
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.chunk_index, i);
            assert!(c.chunk_index < c.total_chunks);
        }
        assert_eq!(chunks.last().unwrap().total_chunks, chunks.len());
    }

    #[test]
    fn source_splits_on_top_level_declarations() {
        let text = r#"function foo() {
  return 1;
}

class Bar {
  method() { return 2; }
}

const baz = 3;
"#;
        let chunks = chunk_source(text, ChunkPreset::CODE);
        let names: Vec<Option<String>> = chunks.iter().map(|c| c.symbol_name.clone()).collect();
        assert!(names.contains(&Some("foo".to_string())));
        assert!(names.contains(&Some("Bar".to_string())));
        assert!(names.contains(&Some("baz".to_string())));
    }

    #[test]
    fn source_brace_balancing_skips_strings_and_comments() {
        let text = r#"function tricky() {
  const s = "} not a brace {";
  // } also not a brace
  const t = `template ${"}"} end`;
  return s + t;
}

function after() {
  return true;
}
"#;
        let chunks = chunk_source(text, ChunkPreset::CODE);
        let tricky = chunks.iter().find(|c| c.symbol_name.as_deref() == Some("tricky")).unwrap();
        assert!(tricky.content.contains("return s + t;"));
        assert!(!tricky.content.contains("function after"));
    }

    #[test]
    fn source_round_trips_via_offsets() {
        let text = "function a() {\n  return 1;\n}\n\nfunction b() {\n  return 2;\n}\n";
        let chunks = chunk_source(text, ChunkPreset::CODE);
        assert!(concat_reconstructs(text, &chunks));
    }

    #[test]
    fn sliding_window_never_discards_content() {
        let text = "0123456789".repeat(100);
        let chunks = chunk_sliding_window(&text, ChunkPreset::CODE);
        assert!(concat_reconstructs(&text, &chunks));
    }

    #[test]
    fn empty_text_yields_no_chunks() {
        assert!(chunk_sliding_window("", ChunkPreset::CODE).is_empty());
    }
}
