//! Intent classifier and boost policy (C8, spec §4.5). Multi-label,
//! pattern-list classification in the style of the retrieval pack's
//! `QueryIntent::classify` (`steeltroops-ai-omnicontext`'s
//! `search/intent.rs`), generalized from that single-label keyword cascade
//! into the spec's multi-label, fixed-confidence scheme over five intents.

use std::collections::HashSet;

use crate::types::FileClass;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Intent {
    Implementation,
    Debugging,
    Comparison,
    HowTo,
    Conceptual,
}

impl Intent {
    fn label(self) -> &'static str {
        match self {
            Intent::Implementation => "implementation",
            Intent::Debugging => "debugging",
            Intent::Comparison => "comparison",
            Intent::HowTo => "how-to",
            Intent::Conceptual => "conceptual",
        }
    }

    fn patterns(self) -> &'static [&'static str] {
        match self {
            Intent::Implementation => {
                &["implement", "create", "write", "build", "add a", "generate", "scaffold"]
            }
            Intent::Debugging => {
                &["bug", "error", "fail", "crash", "issue", "broken", "debug", "exception", "trace", "why is"]
            }
            Intent::Comparison => &["vs", "versus", "compare", "comparison", "difference between", "better than", "alternative to"],
            Intent::HowTo => &["how to", "how do i", "how can i", "guide", "tutorial", "steps to"],
            Intent::Conceptual => &["what is", "what does", "why does", "explain", "understand", "concept", "architecture", "overview"],
        }
    }

    /// Fixed per-intent confidence applied whenever this intent's pattern
    /// list matches the query (spec §4.5: "a match yields a label with a
    /// per-intent fixed confidence").
    fn fixed_confidence(self) -> f64 {
        match self {
            Intent::Implementation => 0.8,
            Intent::Debugging => 0.85,
            Intent::Comparison => 0.75,
            Intent::HowTo => 0.7,
            Intent::Conceptual => 0.7,
        }
    }

    fn multiplier(self, file_class: FileClass) -> f64 {
        use FileClass::*;
        match (self, file_class) {
            (Intent::Implementation, Source) => 1.2,
            (Intent::Implementation, SourceInternal) => 1.1,
            (Intent::Implementation, Example) => 1.1,
            (Intent::Implementation, Test) => 0.9,
            (Intent::Implementation, DocumentationPrimary) => 0.9,
            (Intent::Implementation, Documentation) => 0.8,
            (Intent::Implementation, Config) => 0.7,
            (Intent::Implementation, Changelog) => 0.6,
            (Intent::Implementation, Other) => 1.0,

            (Intent::Debugging, Test) => 1.3,
            (Intent::Debugging, Source) => 1.2,
            (Intent::Debugging, SourceInternal) => 1.2,
            (Intent::Debugging, Config) => 0.9,
            (Intent::Debugging, Example) => 0.8,
            (Intent::Debugging, Changelog) => 0.8,
            (Intent::Debugging, DocumentationPrimary) => 0.7,
            (Intent::Debugging, Documentation) => 0.7,
            (Intent::Debugging, Other) => 1.0,

            (Intent::Comparison, DocumentationPrimary) => 1.3,
            (Intent::Comparison, Documentation) => 1.2,
            (Intent::Comparison, Example) => 1.1,
            (Intent::Comparison, Changelog) => 0.9,
            (Intent::Comparison, Source) => 0.9,
            (Intent::Comparison, Config) => 0.8,
            (Intent::Comparison, SourceInternal) => 0.8,
            (Intent::Comparison, Test) => 0.7,
            (Intent::Comparison, Other) => 1.0,

            (Intent::HowTo, DocumentationPrimary) => 1.4,
            (Intent::HowTo, Documentation) => 1.3,
            (Intent::HowTo, Example) => 1.3,
            (Intent::HowTo, Source) => 0.9,
            (Intent::HowTo, Config) => 0.9,
            (Intent::HowTo, Test) => 0.8,
            (Intent::HowTo, SourceInternal) => 0.8,
            (Intent::HowTo, Changelog) => 0.7,
            (Intent::HowTo, Other) => 1.0,

            (Intent::Conceptual, DocumentationPrimary) => 1.4,
            (Intent::Conceptual, Documentation) => 1.3,
            (Intent::Conceptual, Example) => 0.9,
            (Intent::Conceptual, Source) => 0.9,
            (Intent::Conceptual, SourceInternal) => 0.8,
            (Intent::Conceptual, Changelog) => 0.8,
            (Intent::Conceptual, Config) => 0.7,
            (Intent::Conceptual, Test) => 0.6,
            (Intent::Conceptual, Other) => 1.0,
        }
    }
}

/// `(label, confidence)`, sorted by descending confidence. Never empty: an
/// empty pattern match falls back to `[("how-to", 0.5)]` (spec §4.5).
#[derive(Debug, Clone)]
pub struct IntentClassification {
    pub labels: Vec<(&'static str, f64)>,
}

impl IntentClassification {
    pub fn primary(&self) -> &'static str {
        self.labels.first().map(|(l, _)| *l).unwrap_or("how-to")
    }
}

const ALL_INTENTS: [Intent; 5] =
    [Intent::Implementation, Intent::Debugging, Intent::Comparison, Intent::HowTo, Intent::Conceptual];

pub fn classify(query: &str) -> IntentClassification {
    let lower = query.to_lowercase();
    let mut labels: Vec<(&'static str, f64)> = ALL_INTENTS
        .iter()
        .filter(|intent| intent.patterns().iter().any(|p| lower.contains(p)))
        .map(|intent| (intent.label(), intent.fixed_confidence()))
        .collect();

    if labels.is_empty() {
        labels.push(("how-to", 0.5));
    }

    labels.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    IntentClassification { labels }
}

const FRAMEWORK_TOKENS: &[&str] =
    &["express", "react", "zod", "vue", "angular", "django", "flask", "rails", "spring", "fastapi", "next", "nuxt", "svelte"];

const STOPWORDS: &[&str] = &[
    "the", "a", "an", "of", "in", "to", "for", "with", "and", "or", "is", "are", "how", "what", "why", "does", "do", "on", "at",
    "this", "that", "it", "as", "from", "by",
];

fn split_terms(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

fn non_stopword_terms(query: &str) -> Vec<String> {
    split_terms(query).into_iter().filter(|t| !STOPWORDS.contains(&t.as_str())).collect()
}

/// `1 + matched/total` where `total` is the query's non-stopword term count
/// and `matched` is how many of those terms appear (after the same
/// splitting) in `haystack` — a URL or filesystem path (spec §4.5).
pub fn keyword_boost(query: &str, haystack: &str) -> f64 {
    let terms = non_stopword_terms(query);
    if terms.is_empty() {
        return 1.0;
    }
    let haystack_terms: HashSet<String> = split_terms(haystack).into_iter().collect();
    let matched = terms.iter().filter(|t| haystack_terms.contains(*t)).count();
    1.0 + (matched as f64 / terms.len() as f64)
}

/// 1.5 if the query names a framework and the candidate mentions it, 0.8 if
/// the query names a framework but the candidate doesn't, 1.0 if the query
/// names no framework at all (spec §4.5).
pub fn framework_boost(query: &str, path: &str, content: &str) -> f64 {
    let lower_query = query.to_lowercase();
    let mentioned: Vec<&str> = FRAMEWORK_TOKENS.iter().filter(|t| lower_query.contains(**t)).copied().collect();
    if mentioned.is_empty() {
        return 1.0;
    }
    let lower_path = path.to_lowercase();
    let lower_content = content.to_lowercase();
    if mentioned.iter().any(|t| lower_path.contains(t) || lower_content.contains(t)) {
        1.5
    } else {
        0.8
    }
}

/// `baseBoost * (Σ multiplier(intent) * confidence(intent)) / (Σ confidence(intent))`
/// — a confidence-weighted average of intent-specific multipliers applied
/// to the file class's intrinsic boost (spec §4.5).
pub fn intent_weighted_boost(file_class: FileClass, classification: &IntentClassification) -> f64 {
    let base = file_class.intrinsic_boost();
    let label_of = |label: &str| -> Option<Intent> {
        ALL_INTENTS.iter().copied().find(|i| i.label() == label)
    };

    let mut weighted_sum = 0.0;
    let mut confidence_sum = 0.0;
    for (label, confidence) in &classification.labels {
        if let Some(intent) = label_of(label) {
            weighted_sum += intent.multiplier(file_class) * confidence;
            confidence_sum += confidence;
        }
    }

    if confidence_sum == 0.0 {
        base
    } else {
        base * (weighted_sum / confidence_sum)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn implementation_intent_matches_create_verbs() {
        let c = classify("implement a rate limiter");
        assert_eq!(c.primary(), "implementation");
    }

    #[test]
    fn debugging_intent_matches_error_vocabulary() {
        let c = classify("why is this throwing an exception");
        assert_eq!(c.primary(), "debugging");
    }

    #[test]
    fn empty_match_falls_back_to_how_to_at_half_confidence() {
        let c = classify("AuthService");
        assert_eq!(c.labels, vec![("how-to", 0.5)]);
    }

    #[test]
    fn multi_label_queries_sort_by_confidence_descending() {
        let c = classify("how to fix this bug");
        assert!(c.labels.len() >= 2);
        for pair in c.labels.windows(2) {
            assert!(pair[0].1 >= pair[1].1);
        }
    }

    #[test]
    fn keyword_boost_rewards_path_term_overlap() {
        let boost = keyword_boost("jwt token verification", "src/auth/jwt-token.ts");
        assert!(boost > 1.0);
        assert!(boost <= 2.0);
    }

    #[test]
    fn keyword_boost_is_neutral_with_no_overlap() {
        let boost = keyword_boost("jwt token verification", "src/widgets/button.tsx");
        assert_eq!(boost, 1.0);
    }

    #[test]
    fn framework_boost_rewards_matching_candidates() {
        assert_eq!(framework_boost("express middleware", "src/express/router.ts", ""), 1.5);
        assert_eq!(framework_boost("express middleware", "src/other.ts", "no mention here"), 0.8);
        assert_eq!(framework_boost("generic query", "src/other.ts", ""), 1.0);
    }

    #[test]
    fn doc_primary_gets_highest_how_to_boost() {
        let c = classify("how to configure auth");
        let doc_boost = intent_weighted_boost(FileClass::DocumentationPrimary, &c);
        let config_boost = intent_weighted_boost(FileClass::Config, &c);
        assert!(doc_boost > config_boost);
    }
}
