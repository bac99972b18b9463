//! Hybrid search engine (C9, spec §4.6): vector + FTS retrieval, Reciprocal
//! Rank Fusion, intent/file-type/framework/keyword boosts, min-max
//! normalization, confidence estimation, deduplication, and progressive
//! enrichment. New work — the teacher has no retrieval layer at all (its
//! `server/src/scan.rs` builds a static search index for a single MCP tool
//! call) — built in the teacher's error-propagation idiom (`Result<T>`
//! everywhere, FTS failures swallowed per-store) and reusing the chunker's
//! brace-balancing scanner for code-unit extraction (§4.6.6).

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use regex::Regex;

use crate::cache::ResultCache;
use crate::chunker::find_declaration_end;
use crate::error::Result;
use crate::graph::CodeGraph;
use crate::intent;
use crate::lang::AdapterRegistry;
use crate::traits::{Embedder, StoreSearchHit, VectorStore};
use crate::types::{
    Confidence, DetailLevel, DocumentMetadata, RelatedCode, RelatedRelationship, ResultContext, ResultFull, ResultSummary,
    SearchMode, SearchQuery, SearchResponse, SearchResult, Usage,
};

struct RrfPreset {
    k: f64,
    vector_weight: f64,
    fts_weight: f64,
}

const CODE_PRESET: RrfPreset = RrfPreset { k: 20.0, vector_weight: 0.6, fts_weight: 0.4 };
const WEB_PRESET: RrfPreset = RrfPreset { k: 30.0, vector_weight: 0.55, fts_weight: 0.45 };

#[derive(Clone)]
struct CandidateRecord {
    content: String,
    metadata: DocumentMetadata,
}

pub struct SearchEngine<'a> {
    embedder: Arc<dyn Embedder>,
    vector_store: Arc<dyn VectorStore>,
    adapters: &'a AdapterRegistry,
    graphs_dir: PathBuf,
    graph_cache: DashMap<String, Arc<CodeGraph>>,
    candidates: DashMap<String, CandidateRecord>,
    confidence_high: f64,
    confidence_medium: f64,
}

impl<'a> SearchEngine<'a> {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        vector_store: Arc<dyn VectorStore>,
        adapters: &'a AdapterRegistry,
        data_dir: impl Into<PathBuf>,
    ) -> Self {
        let confidence_high =
            std::env::var("SEARCH_CONFIDENCE_HIGH").ok().and_then(|v| v.parse().ok()).unwrap_or(0.5);
        let confidence_medium =
            std::env::var("SEARCH_CONFIDENCE_MEDIUM").ok().and_then(|v| v.parse().ok()).unwrap_or(0.3);
        SearchEngine {
            embedder,
            vector_store,
            adapters,
            graphs_dir: data_dir.into().join("graphs"),
            graph_cache: DashMap::new(),
            candidates: DashMap::new(),
            confidence_high,
            confidence_medium,
        }
    }

    fn graph_for(&self, store_id: &str) -> Option<Arc<CodeGraph>> {
        if let Some(g) = self.graph_cache.get(store_id) {
            return Some(g.clone());
        }
        let path = self.graphs_dir.join(format!("{store_id}.json"));
        let graph = CodeGraph::load(&path).ok()?;
        let graph = Arc::new(graph);
        self.graph_cache.insert(store_id.to_string(), graph.clone());
        Some(graph)
    }

    pub fn search(&self, query: &SearchQuery, cache: &ResultCache) -> Result<SearchResponse> {
        let started = Instant::now();
        let per_leg_limit = query.limit.max(1) * 3;
        let classification = intent::classify(&query.query);

        let mut vector_hits: Vec<(String, StoreSearchHit)> = Vec::new();
        if query.mode != SearchMode::Fts {
            let query_vector = self.embedder.embed(&query.query)?;
            for store_id in &query.stores {
                let hits = self.vector_store.search(store_id, &query_vector, per_leg_limit)?;
                for hit in hits {
                    vector_hits.push((store_id.clone(), hit));
                }
            }
            vector_hits.sort_by(|a, b| b.1.score.partial_cmp(&a.1.score).unwrap_or(std::cmp::Ordering::Equal));
        }

        let mut fts_hits: Vec<(String, StoreSearchHit)> = Vec::new();
        if query.mode != SearchMode::Vector {
            for store_id in &query.stores {
                if let Ok(hits) = self.vector_store.full_text_search(store_id, &query.query, per_leg_limit) {
                    for hit in hits {
                        fts_hits.push((store_id.clone(), hit));
                    }
                }
            }
            fts_hits.sort_by(|a, b| b.1.score.partial_cmp(&a.1.score).unwrap_or(std::cmp::Ordering::Equal));
        }

        let max_raw_vector_score = vector_hits.iter().map(|(_, h)| h.score).fold(None, |acc: Option<f64>, s| {
            Some(acc.map_or(s, |a| a.max(s)))
        });
        let max_raw_fts_score = fts_hits.iter().map(|(_, h)| h.score).fold(None, |acc: Option<f64>, s| {
            Some(acc.map_or(s, |a| a.max(s)))
        });

        let max_raw_score = match query.mode {
            SearchMode::Fts => max_raw_fts_score,
            _ => max_raw_vector_score,
        };

        if let (Some(min_relevance), Some(max_raw)) = (query.min_relevance, max_raw_vector_score) {
            if query.mode != SearchMode::Fts && max_raw < min_relevance {
                let confidence = self.derive_confidence(query.mode, max_raw_score);
                return Ok(SearchResponse {
                    query: query.query.clone(),
                    mode: query.mode,
                    stores: query.stores.clone(),
                    results: vec![],
                    total_results: 0,
                    time_ms: started.elapsed().as_millis() as u64,
                    confidence,
                    max_raw_score,
                });
            }
        }

        // Determine the content-type preset: if a majority of candidates
        // carry `crawlDepth` (web-crawled), use the web RRF preset.
        let web_candidate_count = vector_hits
            .iter()
            .chain(fts_hits.iter())
            .filter(|(_, h)| metadata_of(h).map(|m| m.crawl_depth.is_some()).unwrap_or(false))
            .count();
        let total_candidate_count = vector_hits.len() + fts_hits.len();
        let preset = if total_candidate_count > 0 && web_candidate_count * 2 > total_candidate_count {
            &WEB_PRESET
        } else {
            &CODE_PRESET
        };

        let vector_rank: HashMap<&str, usize> =
            vector_hits.iter().enumerate().map(|(i, (_, h))| (h.id.as_str(), i + 1)).collect();
        let fts_rank: HashMap<&str, usize> = fts_hits.iter().enumerate().map(|(i, (_, h))| (h.id.as_str(), i + 1)).collect();

        let mut by_id: HashMap<String, (String, StoreSearchHit)> = HashMap::new();
        for (store_id, hit) in vector_hits.iter().chain(fts_hits.iter()) {
            by_id.entry(hit.id.clone()).or_insert_with(|| (store_id.clone(), hit.clone()));
        }

        let mut scored: Vec<(String, String, StoreSearchHit, f64)> = Vec::new();
        for (id, (store_id, hit)) in by_id {
            let metadata = metadata_of(&hit);
            let final_score = match query.mode {
                SearchMode::Vector => hit.score,
                SearchMode::Fts => hit.score,
                SearchMode::Hybrid => {
                    let rv = vector_rank.get(id.as_str()).copied().unwrap_or(usize::MAX);
                    let rf = fts_rank.get(id.as_str()).copied().unwrap_or(usize::MAX);
                    let rrf_v = if rv == usize::MAX { 0.0 } else { preset.vector_weight / (preset.k + rv as f64) };
                    let rrf_f = if rf == usize::MAX { 0.0 } else { preset.fts_weight / (preset.k + rf as f64) };
                    let rrf = rrf_v + rrf_f;

                    let boost = metadata.as_ref().map_or(1.0, |m| {
                        let file_boost = intent::intent_weighted_boost(m.file_class, &classification);
                        let framework_boost = intent::framework_boost(&query.query, &m.source, &hit.content);
                        let url_boost = if m.crawl_depth.is_some() {
                            intent::keyword_boost(&query.query, &m.source)
                        } else {
                            1.0
                        };
                        let path_boost = if m.crawl_depth.is_none() {
                            intent::keyword_boost(&query.query, &m.source)
                        } else {
                            1.0
                        };
                        file_boost * framework_boost * url_boost * path_boost
                    });
                    rrf * boost
                }
            };

            if let Some(metadata) = metadata {
                self.candidates.insert(id.clone(), CandidateRecord { content: hit.content.clone(), metadata });
            }
            scored.push((id, store_id, hit, final_score));
        }

        normalize_scores(&mut scored);

        let threshold = query.threshold;
        let mut filtered: Vec<(String, String, StoreSearchHit, f64)> =
            scored.into_iter().filter(|(_, _, _, score)| threshold.map(|t| *score >= t).unwrap_or(true)).collect();

        dedup_by_source(&mut filtered, &query.query);
        filtered.sort_by(|a, b| b.3.partial_cmp(&a.3).unwrap_or(std::cmp::Ordering::Equal));
        filtered.truncate(query.limit);

        let total_results = filtered.len();
        let confidence = if query.mode == SearchMode::Fts { None } else { self.derive_confidence(query.mode, max_raw_score) };

        let mut results = Vec::new();
        for (id, store_id, hit, score) in filtered {
            let result = self.enrich(&id, &store_id, &hit, score, &query.query, query.detail, cache)?;
            results.push(result);
        }

        Ok(SearchResponse {
            query: query.query.clone(),
            mode: query.mode,
            stores: query.stores.clone(),
            results,
            total_results,
            time_ms: started.elapsed().as_millis() as u64,
            confidence,
            max_raw_score,
        })
    }

    fn derive_confidence(&self, mode: SearchMode, max_raw_score: Option<f64>) -> Option<Confidence> {
        if mode == SearchMode::Fts {
            return None;
        }
        let raw = max_raw_score?;
        Some(if raw >= self.confidence_high {
            Confidence::High
        } else if raw >= self.confidence_medium {
            Confidence::Medium
        } else {
            Confidence::Low
        })
    }

    fn enrich(
        &self,
        id: &str,
        store_id: &str,
        hit: &StoreSearchHit,
        score: f64,
        query: &str,
        detail: DetailLevel,
        cache: &ResultCache,
    ) -> Result<SearchResult> {
        if let Some(cached) = cache.get(id) {
            if detail_satisfied(&cached, detail) {
                return Ok(cached);
            }
        }

        let metadata = metadata_of(hit);
        let unit = metadata
            .as_ref()
            .filter(|m| self.adapters.by_path(&m.source).is_some())
            .and_then(|m| m.symbol_name.as_deref())
            .and_then(|sym| extract_code_unit(&hit.content, sym));

        let summary = build_summary(hit, metadata.as_ref(), unit.as_ref(), query);

        let mut result = SearchResult { id: id.to_string(), store_id: store_id.to_string(), score, summary, context: None, full: None };

        let source = metadata.as_ref().map(|m| m.source.as_str()).unwrap_or("");
        if detail == DetailLevel::Contextual || detail == DetailLevel::Full {
            result.context = Some(self.build_context(store_id, source, &hit.content, unit.as_ref()));
        }
        if detail == DetailLevel::Full {
            result.full = Some(self.build_full(store_id, unit.as_ref(), hit));
        }

        cache.set(id.to_string(), result.clone());
        Ok(result)
    }

    /// Re-fetch a previously returned result and upgrade it to `full` detail
    /// without touching the embedder or re-running retrieval (spec §8
    /// scenario 5).
    pub fn fetch_full(&self, id: &str, store_id: &str, query: &str, cache: &ResultCache) -> Option<SearchResult> {
        if let Some(cached) = cache.get(id) {
            if cached.full.is_some() {
                return Some(cached);
            }
        }
        let record = self.candidates.get(id)?.clone();
        let hit = StoreSearchHit { id: id.to_string(), content: record.content.clone(), score: 0.0, metadata: serde_json::Value::Null };
        let unit = if self.adapters.by_path(&record.metadata.source).is_some() {
            record.metadata.symbol_name.as_deref().and_then(|sym| extract_code_unit(&record.content, sym))
        } else {
            None
        };
        let mut result = cache.get(id).unwrap_or_else(|| {
            let summary = build_summary(&hit, Some(&record.metadata), unit.as_ref(), query);
            SearchResult { id: id.to_string(), store_id: store_id.to_string(), score: 0.0, summary, context: None, full: None }
        });
        result.full = Some(self.build_full(store_id, unit.as_ref(), &hit));
        if result.context.is_none() {
            result.context = Some(self.build_context(store_id, &record.metadata.source, &record.content, unit.as_ref()));
        }
        cache.set(id.to_string(), result.clone());
        Some(result)
    }

    fn build_context(&self, store_id: &str, source: &str, content: &str, unit: Option<&CodeUnit>) -> ResultContext {
        let interfaces = extract_interfaces_regex(content);
        let imports = extract_imports_regex(content);
        let mut related_concepts = top_word_frequencies(content, 5);
        if let Some((_, deps)) = crate::conventions::manifest_related_concepts(std::path::Path::new(source), content) {
            for dep in deps {
                if !related_concepts.contains(&dep) {
                    related_concepts.push(dep);
                }
            }
        }
        let usage = unit
            .and_then(|u| self.graph_for(store_id).map(|g| (g, u)))
            .map(|(g, u)| {
                let id_guess = g.nodes().find(|n| n.name == u.name).map(|n| n.id.clone());
                id_guess.map(|nid| Usage { called_by: g.get_called_by_count(&nid), calls: g.get_calls_count(&nid) }).unwrap_or_default()
            })
            .unwrap_or_default();

        ResultContext { interfaces, imports, related_concepts, usage }
    }

    fn build_full(&self, store_id: &str, unit: Option<&CodeUnit>, hit: &StoreSearchHit) -> ResultFull {
        let code = unit.map(|u| u.full_content.clone()).unwrap_or_else(|| hit.content.clone());
        let doc_comment = leading_doc_comment(&hit.content);

        let related = unit
            .and_then(|u| self.graph_for(store_id).map(|g| (g, u)))
            .map(|(g, u)| {
                let node_id = g.nodes().find(|n| n.name == u.name).map(|n| n.id.clone());
                let Some(node_id) = node_id else { return vec![] };
                let mut related = Vec::new();
                for edge in g.get_edges(&node_id) {
                    if let Some(target) = g.node(&edge.to) {
                        related.push(RelatedCode { file: target.file.clone(), summary: target.name.clone(), relationship: RelatedRelationship::CallsThis });
                    }
                }
                for edge in g.get_incoming_edges(&node_id) {
                    if let Some(source) = g.node(&edge.from) {
                        related.push(RelatedCode { file: source.file.clone(), summary: source.name.clone(), relationship: RelatedRelationship::CalledByThis });
                    }
                }
                related.truncate(10);
                related
            })
            .unwrap_or_default();

        ResultFull { code, related, doc_comment }
    }
}

fn detail_satisfied(result: &SearchResult, requested: DetailLevel) -> bool {
    match requested {
        DetailLevel::Minimal => true,
        DetailLevel::Contextual => result.context.is_some(),
        DetailLevel::Full => result.full.is_some(),
    }
}

fn metadata_of(hit: &StoreSearchHit) -> Option<DocumentMetadata> {
    serde_json::from_value(hit.metadata.clone()).ok()
}

/// Min-max normalize into `[0,1]` with six-decimal rounding, only when the
/// range is strictly positive (spec §4.6.3).
fn normalize_scores(scored: &mut [(String, String, StoreSearchHit, f64)]) {
    if scored.is_empty() {
        return;
    }
    let min = scored.iter().map(|(_, _, _, s)| *s).fold(f64::INFINITY, f64::min);
    let max = scored.iter().map(|(_, _, _, s)| *s).fold(f64::NEG_INFINITY, f64::max);
    if max > min {
        for entry in scored.iter_mut() {
            let normalized = (entry.3 - min) / (max - min);
            entry.3 = (normalized * 1_000_000.0).round() / 1_000_000.0;
        }
    }
}

/// Group by source key (path/url, else id); keep the candidate whose content
/// has the most non-trivial (>2 char) query-term hits, tie-broken by score
/// (spec §4.6.4).
fn dedup_by_source(candidates: &mut Vec<(String, String, StoreSearchHit, f64)>, query: &str) {
    let mut best: HashMap<String, usize> = HashMap::new();
    for (idx, (id, _, hit, score)) in candidates.iter().enumerate() {
        let key = metadata_of(hit).map(|m| m.source).unwrap_or_else(|| id.clone());
        let term_count = |i: usize| -> usize {
            let (_, _, h, _) = &candidates[i];
            non_trivial_term_hits(query, &h.content)
        };
        match best.get(&key) {
            None => {
                best.insert(key, idx);
            }
            Some(&existing) => {
                let existing_score = candidates[existing].3;
                if term_count(idx) > term_count(existing) || (term_count(idx) == term_count(existing) && *score > existing_score) {
                    best.insert(key, idx);
                }
            }
        }
    }
    let mut keep: Vec<usize> = best.values().copied().collect();
    keep.sort_unstable();
    let mut kept = Vec::with_capacity(keep.len());
    for i in keep.drain(..) {
        kept.push(candidates[i].clone());
    }
    *candidates = kept;
}

fn non_trivial_term_hits(query: &str, content: &str) -> usize {
    let lower_content = content.to_lowercase();
    query
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() > 2)
        .filter(|t| lower_content.contains(&t.to_lowercase()))
        .count()
}

#[derive(Debug, Clone)]
struct CodeUnit {
    kind: String,
    name: String,
    signature: String,
    full_content: String,
    start_line: usize,
    end_line: usize,
}

const UNIT_KEYWORDS: &[(&str, &str)] =
    &[("function", "function"), ("class", "class"), ("interface", "interface"), ("type", "type")];

/// Scan a chunk line-by-line for the declaration header naming `symbol`,
/// then bound its body with the same brace counter the chunker uses
/// (spec §4.6.6).
fn extract_code_unit(content: &str, symbol: &str) -> Option<CodeUnit> {
    let mut offset = 0usize;
    for (line_idx, line) in content.lines().enumerate() {
        let trimmed = line.trim_start();
        let header = UNIT_KEYWORDS.iter().find_map(|(label, kw)| {
            let rest = trimmed.strip_prefix("export ").unwrap_or(trimmed);
            let rest = rest.strip_prefix("default ").unwrap_or(rest);
            if let Some(after_kw) = rest.strip_prefix(kw) {
                if after_kw.starts_with(' ') && after_kw.trim_start().starts_with(symbol) {
                    return Some(*label);
                }
            }
            None
        });

        let is_binding = ["const", "let", "var"].iter().any(|kw| {
            let rest = trimmed.strip_prefix("export ").unwrap_or(trimmed);
            rest.strip_prefix(kw).map(|after| after.trim_start().starts_with(symbol)).unwrap_or(false)
        });

        if header.is_some() || is_binding {
            let kind = header.unwrap_or("const").to_string();
            let decl_start = offset;
            let (end, _) = find_declaration_end(content, decl_start, decl_start + line.len());
            let full_content = content[decl_start..end].to_string();
            let signature = first_line(&full_content);
            return Some(CodeUnit {
                kind,
                name: symbol.to_string(),
                signature,
                full_content,
                start_line: line_idx + 1,
                end_line: line_idx + 1 + full_content.matches('\n').count(),
            });
        }
        offset += line.len() + 1;
    }
    None
}

fn first_line(text: &str) -> String {
    text.lines().next().unwrap_or("").trim().to_string()
}

fn build_summary(hit: &StoreSearchHit, metadata: Option<&DocumentMetadata>, unit: Option<&CodeUnit>, query: &str) -> ResultSummary {
    let kind = unit.map(|u| u.kind.clone()).unwrap_or_else(|| {
        metadata.map(|m| format!("{:?}", m.file_class).to_lowercase()).unwrap_or_else(|| "chunk".to_string())
    });
    let name = unit.map(|u| u.name.clone()).or_else(|| metadata.and_then(|m| m.symbol_name.clone())).unwrap_or_default();
    let signature = unit.map(|u| u.signature.clone()).unwrap_or_else(|| first_line(&hit.content));
    let location = metadata
        .map(|m| {
            let line = unit.map(|u| u.start_line).unwrap_or(1);
            format!("{}:{}", m.source, line)
        })
        .unwrap_or_default();
    let purpose = choose_purpose(&hit.content, query);
    let relevance_reason = relevance_reason(&hit.content, query);

    ResultSummary { kind, name, signature, purpose, location, relevance_reason }
}

/// Score each non-empty line by query-term coverage, sentence-terminator
/// presence, and call/assignment shape; always non-empty on a non-trivial
/// chunk (spec §4.6.5).
fn choose_purpose(content: &str, query: &str) -> String {
    let terms: Vec<String> = query.to_lowercase().split_whitespace().map(|s| s.to_string()).collect();
    let mut best: Option<(i32, String)> = None;
    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let lower = trimmed.to_lowercase();
        let mut score = 0i32;
        score += terms.iter().filter(|t| lower.contains(t.as_str())).count() as i32 * 2;
        if trimmed.ends_with('.') || trimmed.ends_with('!') || trimmed.ends_with('?') {
            score += 1;
        }
        if trimmed.contains('=') || trimmed.contains('(') {
            score += 1;
        }
        if best.as_ref().map(|(s, _)| score > *s).unwrap_or(true) {
            best = Some((score, trimmed.to_string()));
        }
    }
    best.map(|(_, line)| line).unwrap_or_else(|| "No description available".to_string())
}

fn relevance_reason(content: &str, query: &str) -> String {
    let lower_content = content.to_lowercase();
    let matched: Vec<&str> = query
        .split_whitespace()
        .filter(|t| t.len() > 1 && lower_content.contains(&t.to_lowercase()))
        .collect();
    if matched.is_empty() {
        "Semantically similar to query".to_string()
    } else {
        format!("Matches: {}", matched.join(", "))
    }
}

fn extract_imports_regex(content: &str) -> Vec<String> {
    let re = Regex::new(r#"(?:from|import)\s+['"]([^'"]+)['"]"#).unwrap();
    re.captures_iter(content).map(|c| c[1].to_string()).take(5).collect()
}

/// Up to five `interface Name` declarations in the chunk (spec §3: "declared
/// interfaces in the chunk").
fn extract_interfaces_regex(content: &str) -> Vec<String> {
    let re = Regex::new(r"\binterface\s+([A-Za-z_$][A-Za-z0-9_$]*)").unwrap();
    let mut seen = Vec::new();
    for cap in re.captures_iter(content) {
        let name = cap[1].to_string();
        if !seen.contains(&name) {
            seen.push(name);
        }
        if seen.len() == 5 {
            break;
        }
    }
    seen
}

const STOPWORDS_FOR_CONCEPTS: &[&str] =
    &["the", "and", "for", "with", "this", "that", "from", "into", "then", "else", "return", "function", "const", "let", "var"];

fn top_word_frequencies(content: &str, limit: usize) -> Vec<String> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for word in content.to_lowercase().split(|c: char| !c.is_alphanumeric()) {
        if word.len() <= 3 || STOPWORDS_FOR_CONCEPTS.contains(&word) {
            continue;
        }
        *counts.entry(word.to_string()).or_insert(0) += 1;
    }
    let mut pairs: Vec<(String, usize)> = counts.into_iter().collect();
    pairs.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    pairs.into_iter().take(limit).map(|(w, _)| w).collect()
}

fn leading_doc_comment(content: &str) -> Option<String> {
    let mut lines = Vec::new();
    for line in content.lines() {
        let trimmed = line.trim_start();
        if trimmed.starts_with("//") || trimmed.starts_with("/**") || trimmed.starts_with("*") || trimmed.starts_with("/*") {
            lines.push(trimmed.trim_start_matches('/').trim_start_matches('*').trim().to_string());
        } else if trimmed.is_empty() {
            continue;
        } else {
            break;
        }
    }
    if lines.is_empty() {
        None
    } else {
        Some(lines.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{classify_file, document_id, DocType, FileClass};
    use std::sync::Mutex;
    use tempfile::tempdir;

    struct FakeEmbedder;
    impl Embedder for FakeEmbedder {
        fn embed(&self, text: &str) -> Result<Vec<f32>> {
            Ok(vec![text.len() as f32])
        }
        fn dimensions(&self) -> usize {
            1
        }
    }

    struct FakeStore {
        docs: Mutex<Vec<(String, StoreSearchHit)>>,
    }
    impl VectorStore for FakeStore {
        fn initialize(&self, _store_id: &str) -> Result<()> {
            Ok(())
        }
        fn add_documents(&self, _store_id: &str, _documents: &[crate::types::Document]) -> Result<()> {
            Ok(())
        }
        fn delete_documents(&self, _store_id: &str, _ids: &[String]) -> Result<()> {
            Ok(())
        }
        fn search(&self, store_id: &str, _vector: &[f32], k: usize) -> Result<Vec<StoreSearchHit>> {
            let docs = self.docs.lock().unwrap();
            Ok(docs.iter().filter(|(s, _)| s == store_id).map(|(_, h)| h.clone()).take(k).collect())
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

    fn hit_for(store_id: &str, source: &str, content: &str, score: f64, symbol: Option<&str>) -> (String, StoreSearchHit) {
        let file_class = classify_file(source);
        let metadata = DocumentMetadata {
            store_id: store_id.to_string(),
            source: source.to_string(),
            doc_type: DocType::Chunk,
            source_hash: "abc123".to_string(),
            chunk_index: 0,
            total_chunks: 1,
            indexed_at: "0".to_string(),
            file_class,
            section_header: None,
            symbol_name: symbol.map(|s| s.to_string()),
            doc_summary: None,
            crawl_depth: None,
        };
        let id = document_id(store_id, "abc123", 0);
        (
            store_id.to_string(),
            StoreSearchHit { id, content: content.to_string(), score, metadata: serde_json::to_value(metadata).unwrap() },
        )
    }

    #[test]
    fn vector_only_search_returns_sorted_results() {
        let store = Arc::new(FakeStore { docs: Mutex::new(vec![]) });
        {
            let mut docs = store.docs.lock().unwrap();
            docs.push(hit_for("s1", "src/auth.ts", "class AuthService { verifyAccessToken(token) {} }", 0.9, Some("AuthService")));
            docs.push(hit_for("s1", "src/other.ts", "class Other {}", 0.2, Some("Other")));
        }
        let adapters = AdapterRegistry::with_builtins();
        let data_dir = tempdir().unwrap();
        let engine = SearchEngine::new(Arc::new(FakeEmbedder), store, &adapters, data_dir.path());
        let cache = ResultCache::default();

        let query = SearchQuery {
            query: "JWT token verification".to_string(),
            stores: vec!["s1".to_string()],
            mode: SearchMode::Vector,
            limit: 10,
            detail: DetailLevel::Minimal,
            threshold: None,
            min_relevance: None,
            intent: None,
        };
        let response = engine.search(&query, &cache).unwrap();
        assert!(!response.results.is_empty());
        assert_eq!(response.results[0].summary.name, "AuthService");
    }

    #[test]
    fn min_relevance_above_max_raw_score_returns_empty() {
        let store = Arc::new(FakeStore { docs: Mutex::new(vec![]) });
        {
            let mut docs = store.docs.lock().unwrap();
            docs.push(hit_for("s1", "src/a.ts", "const a = 1;", 0.1, Some("a")));
        }
        let adapters = AdapterRegistry::with_builtins();
        let data_dir = tempdir().unwrap();
        let engine = SearchEngine::new(Arc::new(FakeEmbedder), store, &adapters, data_dir.path());
        let cache = ResultCache::default();

        let query = SearchQuery {
            query: "xxxzzzno-match".to_string(),
            stores: vec!["s1".to_string()],
            mode: SearchMode::Vector,
            limit: 10,
            detail: DetailLevel::Minimal,
            threshold: None,
            min_relevance: Some(0.9),
            intent: None,
        };
        let response = engine.search(&query, &cache).unwrap();
        assert!(response.results.is_empty());
        assert!(response.max_raw_score.unwrap() < 0.9);
        assert_eq!(response.confidence, Some(Confidence::Low));
    }

    #[test]
    fn fts_only_mode_omits_confidence() {
        let store = Arc::new(FakeStore { docs: Mutex::new(vec![]) });
        let adapters = AdapterRegistry::with_builtins();
        let data_dir = tempdir().unwrap();
        let engine = SearchEngine::new(Arc::new(FakeEmbedder), store, &adapters, data_dir.path());
        let cache = ResultCache::default();

        let query = SearchQuery {
            query: "anything".to_string(),
            stores: vec!["s1".to_string()],
            mode: SearchMode::Fts,
            limit: 10,
            detail: DetailLevel::Minimal,
            threshold: None,
            min_relevance: None,
            intent: None,
        };
        let response = engine.search(&query, &cache).unwrap();
        assert!(response.confidence.is_none());
    }

    #[test]
    fn fetch_full_reuses_cached_record_without_embedder() {
        let store = Arc::new(FakeStore { docs: Mutex::new(vec![]) });
        {
            let mut docs = store.docs.lock().unwrap();
            docs.push(hit_for("s1", "src/auth.ts", "class AuthService { verifyAccessToken(token) {} }", 0.9, Some("AuthService")));
        }
        let adapters = AdapterRegistry::with_builtins();
        let data_dir = tempdir().unwrap();
        let engine = SearchEngine::new(Arc::new(FakeEmbedder), store, &adapters, data_dir.path());
        let cache = ResultCache::default();

        let query = SearchQuery {
            query: "AuthService".to_string(),
            stores: vec!["s1".to_string()],
            mode: SearchMode::Vector,
            limit: 10,
            detail: DetailLevel::Minimal,
            threshold: None,
            min_relevance: None,
            intent: None,
        };
        let response = engine.search(&query, &cache).unwrap();
        let id = response.results[0].id.clone();

        let full1 = engine.fetch_full(&id, "s1", "AuthService", &cache).unwrap();
        assert!(full1.full.is_some());
        let full2 = engine.fetch_full(&id, "s1", "AuthService", &cache).unwrap();
        assert!(full2.full.is_some());
    }

    #[test]
    fn code_unit_extraction_bounds_class_body() {
        let content = "class AuthService {\n  verifyAccessToken(token) {\n    return true;\n  }\n}\n";
        let unit = extract_code_unit(content, "AuthService").unwrap();
        assert_eq!(unit.kind, "class");
        assert!(unit.full_content.contains("verifyAccessToken"));
    }

    #[test]
    fn purpose_is_never_empty_on_nontrivial_chunk() {
        let purpose = choose_purpose("const x = 1;\nconst y = 2;\n", "anything");
        assert!(!purpose.is_empty());
    }

    #[test]
    fn context_lists_declared_interfaces() {
        let content = "interface Options {\n  depth: number;\n}\n\ninterface Options {\n  depth: number;\n}\n\nexport class Runner {}\n";
        let interfaces = extract_interfaces_regex(content);
        assert_eq!(interfaces, vec!["Options".to_string()]);
    }
}
