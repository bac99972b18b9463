//! codetrove-core: store lifecycle, chunking, code graph, and hybrid search
//! — the engine every transport (CLI, future server) builds on. Mirrors the
//! teacher's `crates/core` role (a transport-agnostic library crate) and its
//! flat module layout (`ast`, `graph`, `scan`, `types` side by side under
//! `src/`).

pub mod cache;
pub mod chunker;
pub mod config;
pub mod conventions;
pub mod error;
pub mod graph;
pub mod indexer;
pub mod intent;
pub mod jobs;
pub mod lang;
pub mod registry;
pub mod search;
pub mod tokenizer;
pub mod traits;
pub mod types;

pub use error::{Error, ErrorKind, Result};

use std::sync::{Arc, RwLock};

use lang::AdapterRegistry;

/// Process-wide adapter registry (spec §9: "the adapter registry and the
/// logger are the only process-wide singletons; both need an explicit reset
/// path for test isolation"). Lazily built from the five built-in adapters
/// on first use, shared as an `Arc` so callers aren't forced through a
/// lifetime tied to this module.
static ADAPTERS: RwLock<Option<Arc<AdapterRegistry>>> = RwLock::new(None);

pub fn global_adapters() -> Arc<AdapterRegistry> {
    if let Some(existing) = ADAPTERS.read().expect("adapter registry lock poisoned").as_ref() {
        return existing.clone();
    }
    let mut guard = ADAPTERS.write().expect("adapter registry lock poisoned");
    if guard.is_none() {
        *guard = Some(Arc::new(AdapterRegistry::with_builtins()));
    }
    guard.as_ref().expect("just initialized").clone()
}

/// Drop the cached registry so the next `global_adapters()` call rebuilds it
/// from scratch. Tests that register custom adapters against the process
/// singleton (rather than a locally constructed `AdapterRegistry`) call this
/// in teardown to avoid leaking state across test cases.
pub fn reset_global_adapters() {
    *ADAPTERS.write().expect("adapter registry lock poisoned") = None;
}

static TRACING_INIT: RwLock<bool> = RwLock::new(false);

/// Install a `tracing_subscriber` fmt layer reading `LOG_LEVEL` (default
/// `info`), idempotently. Following the teacher's `init_tracing` in
/// `server/src/main.rs`.
pub fn init_tracing() {
    if *TRACING_INIT.read().expect("tracing init lock poisoned") {
        return;
    }
    let mut guard = TRACING_INIT.write().expect("tracing init lock poisoned");
    if *guard {
        return;
    }
    let level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    let filter = tracing_subscriber::EnvFilter::try_new(&level).unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_target(false).try_init();
    *guard = true;
}

/// Marks the subscriber as uninstalled for this process's bookkeeping.
/// `tracing`'s global dispatcher itself cannot be swapped out once set — this
/// only lets a later `init_tracing()` call re-attempt installation, which is
/// enough for tests that don't assert on captured log output.
pub fn reset_tracing_init_flag() {
    *TRACING_INIT.write().expect("tracing init lock poisoned") = false;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_adapters_survive_reset_and_rebuild() {
        reset_global_adapters();
        let first = global_adapters();
        assert!(first.by_language("rust").is_some());
        let second = global_adapters();
        assert!(Arc::ptr_eq(&first, &second));

        reset_global_adapters();
        let third = global_adapters();
        assert!(!Arc::ptr_eq(&first, &third));
        assert!(third.by_language("typescript").is_some());
    }
}
