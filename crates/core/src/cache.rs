//! Result cache (C10, spec §4.8): a bounded LRU from result id to the last
//! returned `SearchResult`. Generalized from the teacher's
//! `stub_cache: DashMap<String, CachedStub>` (`server/src/types.rs`) — an
//! unbounded map there — into a true LRU with promotion-on-hit, using the
//! `lru` crate the rest of the retrieval pack reaches for when it needs a
//! bounded cache (e.g. `steeltroops-ai-omnicontext`'s workspace
//! dependencies).

use std::sync::Mutex;

use lru::LruCache;
use std::num::NonZeroUsize;

use crate::types::SearchResult;

pub struct ResultCache {
    inner: Mutex<LruCache<String, SearchResult>>,
}

impl ResultCache {
    pub fn new(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity.max(1)).unwrap();
        ResultCache { inner: Mutex::new(LruCache::new(cap)) }
    }

    pub fn set(&self, id: String, result: SearchResult) {
        self.inner.lock().expect("cache lock poisoned").put(id, result);
    }

    pub fn get(&self, id: &str) -> Option<SearchResult> {
        self.inner.lock().expect("cache lock poisoned").get(id).cloned()
    }

    pub fn has(&self, id: &str) -> bool {
        self.inner.lock().expect("cache lock poisoned").contains(id)
    }

    pub fn delete(&self, id: &str) -> bool {
        self.inner.lock().expect("cache lock poisoned").pop(id).is_some()
    }

    pub fn clear(&self) {
        self.inner.lock().expect("cache lock poisoned").clear();
    }

    pub fn size(&self) -> usize {
        self.inner.lock().expect("cache lock poisoned").len()
    }
}

impl Default for ResultCache {
    fn default() -> Self {
        ResultCache::new(1000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ResultSummary;

    fn sample(id: &str) -> SearchResult {
        SearchResult {
            id: id.to_string(),
            store_id: "s".to_string(),
            score: 1.0,
            summary: ResultSummary {
                kind: "function".into(),
                name: "f".into(),
                signature: "fn f()".into(),
                purpose: "does a thing".into(),
                location: "a.rs:1".into(),
                relevance_reason: "Matches: f".into(),
            },
            context: None,
            full: None,
        }
    }

    #[test]
    fn evicts_least_recently_used_past_capacity() {
        let cache = ResultCache::new(2);
        cache.set("a".into(), sample("a"));
        cache.set("b".into(), sample("b"));
        cache.set("c".into(), sample("c"));
        assert!(!cache.has("a"));
        assert!(cache.has("b"));
        assert!(cache.has("c"));
    }

    #[test]
    fn get_promotes_to_most_recently_used() {
        let cache = ResultCache::new(2);
        cache.set("a".into(), sample("a"));
        cache.set("b".into(), sample("b"));
        let _ = cache.get("a");
        cache.set("c".into(), sample("c"));
        assert!(cache.has("a"));
        assert!(!cache.has("b"));
    }

    #[test]
    fn set_on_existing_key_promotes_too() {
        let cache = ResultCache::new(2);
        cache.set("a".into(), sample("a"));
        cache.set("b".into(), sample("b"));
        cache.set("a".into(), sample("a"));
        cache.set("c".into(), sample("c"));
        assert!(cache.has("a"));
        assert!(!cache.has("b"));
    }

    #[test]
    fn delete_and_clear() {
        let cache = ResultCache::new(4);
        cache.set("a".into(), sample("a"));
        assert!(cache.delete("a"));
        assert!(!cache.has("a"));
        cache.set("b".into(), sample("b"));
        cache.clear();
        assert_eq!(cache.size(), 0);
    }
}
