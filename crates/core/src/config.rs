//! Config loading and project-root resolution (spec §6), following the
//! teacher's `init.rs` "detect-or-default, then persist" pattern and its
//! upward directory walk in `resolve_rust_workspace`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub model: String,
    pub batch_size: usize,
    pub dimensions: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        EmbeddingConfig {
            model: "sentence-transformers/all-MiniLM-L6-v2".to_string(),
            batch_size: 32,
            dimensions: 384,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexingConfig {
    pub concurrency: usize,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub ignore_patterns: Vec<String>,
}

impl Default for IndexingConfig {
    fn default() -> Self {
        IndexingConfig {
            concurrency: 4,
            chunk_size: 768,
            chunk_overlap: 100,
            // Ecosystem-aware defaults, grounded on the teacher's
            // `ScanConfig::new` skip-dir list.
            ignore_patterns: vec![
                "node_modules".into(),
                ".git".into(),
                "dist".into(),
                "build".into(),
                ".next".into(),
                "vendor".into(),
                "target".into(),
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RrfConfig {
    pub k: f64,
    pub vector_weight: f64,
    pub fts_weight: f64,
}

impl Default for RrfConfig {
    fn default() -> Self {
        RrfConfig { k: 20.0, vector_weight: 0.6, fts_weight: 0.4 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    pub default_mode: String,
    pub default_limit: usize,
    pub min_score: f64,
    pub rrf: RrfConfig,
}

impl Default for SearchConfig {
    fn default() -> Self {
        SearchConfig { default_mode: "hybrid".to_string(), default_limit: 10, min_score: 0.0, rrf: RrfConfig::default() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlConfig {
    pub user_agent: String,
    pub timeout_ms: u64,
    pub max_concurrency: usize,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        CrawlConfig {
            user_agent: "codetrove-crawler/0.1".to_string(),
            timeout_ms: 30_000,
            max_concurrency: 4,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig { port: 7800, host: "127.0.0.1".to_string() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub data_dir: String,
    pub embedding: EmbeddingConfig,
    pub indexing: IndexingConfig,
    pub search: SearchConfig,
    pub crawl: CrawlConfig,
    pub server: ServerConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            data_dir: "~/.codetrove".to_string(),
            embedding: EmbeddingConfig::default(),
            indexing: IndexingConfig::default(),
            search: SearchConfig::default(),
            crawl: CrawlConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl Config {
    /// Load `config.json` at `path`. If it doesn't exist, a default config is
    /// written to `path` and returned — "detect or default, then persist."
    pub fn load_or_init(path: &Path) -> Result<Config> {
        if path.exists() {
            let text = std::fs::read_to_string(path)?;
            let config: Config = serde_json::from_str(&text)?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save(path)?;
            Ok(config)
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let text = serde_json::to_string_pretty(self)?;
        atomic_write(path, text.as_bytes())
    }

    /// Expand `~` and resolve `dataDir` relative to `project_root`.
    pub fn resolved_data_dir(&self, project_root: &Path) -> PathBuf {
        expand_tilde(&self.data_dir, project_root)
    }
}

fn expand_tilde(raw: &str, project_root: &Path) -> PathBuf {
    if let Some(rest) = raw.strip_prefix("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join(rest);
        }
    }
    let p = Path::new(raw);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        project_root.join(p)
    }
}

/// Write `contents` to `path` via a temp file + rename, so a reader never
/// observes a partially written file (spec §5).
pub fn atomic_write(path: &Path, contents: &[u8]) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)?;
    let tmp = dir.join(format!(
        ".{}.tmp-{}",
        path.file_name().and_then(|n| n.to_str()).unwrap_or("codetrove"),
        std::process::id()
    ));
    std::fs::write(&tmp, contents)?;
    std::fs::rename(&tmp, path).map_err(|e| {
        let _ = std::fs::remove_file(&tmp);
        Error::Io(e.to_string())
    })?;
    Ok(())
}

/// Project-root resolution (spec §6): explicit argument → `PROJECT_ROOT` env
/// → `PWD` env → walk up from CWD looking for `.git` → CWD.
pub fn resolve_project_root(explicit: Option<&Path>) -> PathBuf {
    if let Some(p) = explicit {
        return canonicalize_or_self(p);
    }
    if let Ok(env_root) = std::env::var("PROJECT_ROOT") {
        if !env_root.is_empty() {
            return canonicalize_or_self(Path::new(&env_root));
        }
    }
    if let Ok(pwd) = std::env::var("PWD") {
        if !pwd.is_empty() {
            let pwd_path = Path::new(&pwd);
            if let Some(found) = walk_up_for_git(pwd_path) {
                return found;
            }
            return canonicalize_or_self(pwd_path);
        }
    }
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    walk_up_for_git(&cwd).unwrap_or(cwd)
}

fn walk_up_for_git(start: &Path) -> Option<PathBuf> {
    let mut current = canonicalize_or_self(start);
    loop {
        if current.join(".git").exists() {
            return Some(current);
        }
        match current.parent() {
            Some(parent) => current = parent.to_path_buf(),
            None => return None,
        }
    }
}

fn canonicalize_or_self(p: &Path) -> PathBuf {
    p.canonicalize().unwrap_or_else(|_| p.to_path_buf())
}

/// Resolve `config.json`'s own location: explicit → `CONFIG_PATH` env →
/// `<dataDir>/config.json`.
pub fn resolve_config_path(explicit: Option<&Path>, data_dir: &Path) -> PathBuf {
    if let Some(p) = explicit {
        return p.to_path_buf();
    }
    if let Ok(env_path) = std::env::var("CONFIG_PATH") {
        if !env_path.is_empty() {
            return PathBuf::from(env_path);
        }
    }
    data_dir.join("config.json")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_config_is_created_with_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        let loaded = Config::load_or_init(&path).unwrap();
        assert!(path.exists());
        assert_eq!(loaded.embedding.dimensions, 384);
    }

    #[test]
    fn existing_config_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        let mut config = Config::default();
        config.search.default_limit = 25;
        config.save(&path).unwrap();

        let loaded = Config::load_or_init(&path).unwrap();
        assert_eq!(loaded.search.default_limit, 25);
    }

    #[test]
    fn project_root_walks_up_to_git_dir() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join(".git")).unwrap();
        let nested = root.join("a/b/c");
        std::fs::create_dir_all(&nested).unwrap();

        let found = walk_up_for_git(&nested).unwrap();
        assert_eq!(found, root.canonicalize().unwrap());
    }

    #[test]
    fn explicit_project_root_wins() {
        let dir = tempdir().unwrap();
        let found = resolve_project_root(Some(dir.path()));
        assert_eq!(found, dir.path().canonicalize().unwrap());
    }
}
