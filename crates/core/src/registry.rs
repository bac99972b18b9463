//! Store registry (C6, spec §4.7): named collections with typed source,
//! persisted as `stores.json` at the data-directory root. New work — the
//! teacher is single-repo-per-process and has no multi-store registry —
//! following the on-disk-JSON persistence idiom the teacher uses for
//! `.codescope.toml`/`.mcp.json` in `init.rs`, combined with the
//! atomic-write discipline spec §5 requires ("wrapped by an atomic
//! replace").

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::atomic_write;
use crate::error::{Error, Result};
use crate::traits::{GitClone, VectorStore};
use crate::types::{Store, StoreKind, StoreStatus};

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoresFile {
    stores: Vec<Store>,
}

pub struct StoreRegistry {
    data_dir: PathBuf,
    inner: RwLock<HashMap<String, Store>>,
    vector_store: Arc<dyn VectorStore>,
    git: Option<Arc<dyn GitClone>>,
}

pub struct CreateStoreRequest {
    pub name: String,
    pub description: String,
    pub tags: Vec<String>,
    pub kind: StoreKind,
    pub skip_definition_sync: bool,
}

impl StoreRegistry {
    fn stores_path(&self) -> PathBuf {
        self.data_dir.join("stores.json")
    }

    pub fn open(data_dir: impl Into<PathBuf>, vector_store: Arc<dyn VectorStore>, git: Option<Arc<dyn GitClone>>) -> Result<Self> {
        let data_dir = data_dir.into();
        std::fs::create_dir_all(&data_dir)?;
        let registry = StoreRegistry { data_dir, inner: RwLock::new(HashMap::new()), vector_store, git };
        registry.load()?;
        Ok(registry)
    }

    fn load(&self) -> Result<()> {
        let path = self.stores_path();
        if !path.exists() {
            return Ok(());
        }
        let text = std::fs::read_to_string(&path)?;
        let file: StoresFile = serde_json::from_str(&text)?;
        let mut guard = self.inner.write().expect("registry lock poisoned");
        for store in file.stores {
            guard.insert(store.id.clone(), store);
        }
        Ok(())
    }

    fn persist(&self) -> Result<()> {
        let guard = self.inner.read().expect("registry lock poisoned");
        let mut stores: Vec<Store> = guard.values().cloned().collect();
        stores.sort_by(|a, b| a.id.cmp(&b.id));
        let file = StoresFile { stores };
        let text = serde_json::to_string_pretty(&file)?;
        atomic_write(&self.stores_path(), text.as_bytes())
    }

    pub fn list(&self) -> Vec<Store> {
        self.inner.read().expect("registry lock poisoned").values().cloned().collect()
    }

    pub fn get(&self, id: &str) -> Option<Store> {
        self.inner.read().expect("registry lock poisoned").get(id).cloned()
    }

    pub fn get_by_name(&self, name: &str) -> Option<Store> {
        self.inner.read().expect("registry lock poisoned").values().find(|s| s.name == name).cloned()
    }

    pub fn get_by_id_or_name(&self, id_or_name: &str) -> Option<Store> {
        self.get(id_or_name).or_else(|| self.get_by_name(id_or_name))
    }

    pub fn create(&self, req: CreateStoreRequest) -> Result<Store> {
        if req.name.trim().is_empty() {
            return Err(Error::Invalid("store name must not be empty".to_string()));
        }
        if self.get_by_name(&req.name).is_some() {
            return Err(Error::Conflict(format!("store name '{}' already exists", req.name)));
        }

        let id = Uuid::new_v4().simple().to_string();
        let kind = self.materialize_kind(&id, req.kind)?;
        let now = now_iso8601();

        let store = Store {
            id: id.clone(),
            name: req.name,
            description: req.description,
            tags: req.tags,
            kind,
            status: StoreStatus::Created,
            created_at: now.clone(),
            updated_at: now,
        };

        self.vector_store.initialize(&id)?;
        {
            let mut guard = self.inner.write().expect("registry lock poisoned");
            guard.insert(id.clone(), store.clone());
        }
        self.persist()?;
        let _ = req.skip_definition_sync;
        Ok(store)
    }

    fn materialize_kind(&self, id: &str, kind: StoreKind) -> Result<StoreKind> {
        match kind {
            StoreKind::File { path } => {
                let resolved = normalize_existing_dir(&path)?;
                Ok(StoreKind::File { path: resolved })
            }
            StoreKind::Repo { path, url, branch } => {
                if let Some(url) = &url {
                    let target = self.data_dir.join("repos").join(id);
                    let git = self.git.as_ref().ok_or_else(|| {
                        Error::Unsupported("repo creation with a url requires a git capability".to_string())
                    })?;
                    git.clone_repo(url, &target, branch.as_deref(), 1)?;
                    Ok(StoreKind::Repo { path: target.to_string_lossy().to_string(), url: Some(url.clone()), branch })
                } else {
                    let resolved = normalize_existing_dir(&path)?;
                    Ok(StoreKind::Repo { path: resolved, url: None, branch })
                }
            }
            StoreKind::Web { seed_url, depth } => Ok(StoreKind::Web { seed_url, depth }),
        }
    }

    pub fn update(&self, id: &str, description: Option<String>, tags: Option<Vec<String>>, status: Option<StoreStatus>) -> Result<Store> {
        let mut guard = self.inner.write().expect("registry lock poisoned");
        let store = guard.get_mut(id).ok_or_else(|| Error::NotFound(format!("store {id} not found")))?;
        if let Some(d) = description {
            store.description = d;
        }
        if let Some(t) = tags {
            store.tags = t;
        }
        if let Some(s) = status {
            store.status = s;
        }
        store.updated_at = now_iso8601();
        let result = store.clone();
        drop(guard);
        self.persist()?;
        Ok(result)
    }

    /// Deletion must drop the vector+FTS table and any cloned working tree
    /// (spec §4.7).
    pub fn delete(&self, id: &str) -> Result<()> {
        let store = {
            let guard = self.inner.read().expect("registry lock poisoned");
            guard.get(id).cloned().ok_or_else(|| Error::NotFound(format!("store {id} not found")))?
        };

        self.vector_store.delete_store(id)?;
        if let StoreKind::Repo { url: Some(_), path, .. } = &store.kind {
            let _ = std::fs::remove_dir_all(path);
        }

        {
            let mut guard = self.inner.write().expect("registry lock poisoned");
            guard.remove(id);
        }
        self.persist()
    }

    pub fn root_path(&self, store: &Store) -> Option<PathBuf> {
        match &store.kind {
            StoreKind::File { path } | StoreKind::Repo { path, .. } => Some(PathBuf::from(path)),
            StoreKind::Web { .. } => None,
        }
    }
}

fn normalize_existing_dir(raw: &str) -> Result<String> {
    let path = Path::new(raw);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };
    let canonical = absolute.canonicalize().map_err(|e| Error::Invalid(format!("{raw}: {e}")))?;
    if !canonical.is_dir() {
        return Err(Error::Invalid(format!("{raw} is not a directory")));
    }
    Ok(canonical.to_string_lossy().to_string())
}

fn now_iso8601() -> String {
    let now = std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).unwrap_or_default();
    format!("{}", now.as_secs())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::StoreSearchHit;
    use tempfile::tempdir;

    struct FakeVectorStore {
        deleted: std::sync::Mutex<Vec<String>>,
    }
    impl VectorStore for FakeVectorStore {
        fn initialize(&self, _store_id: &str) -> Result<()> {
            Ok(())
        }
        fn add_documents(&self, _store_id: &str, _documents: &[crate::types::Document]) -> Result<()> {
            Ok(())
        }
        fn delete_documents(&self, _store_id: &str, _ids: &[String]) -> Result<()> {
            Ok(())
        }
        fn search(&self, _store_id: &str, _vector: &[f32], _k: usize) -> Result<Vec<StoreSearchHit>> {
            Ok(vec![])
        }
        fn full_text_search(&self, _store_id: &str, _query: &str, _k: usize) -> Result<Vec<StoreSearchHit>> {
            Ok(vec![])
        }
        fn create_fts_index(&self, _store_id: &str) -> Result<()> {
            Ok(())
        }
        fn delete_store(&self, store_id: &str) -> Result<()> {
            self.deleted.lock().unwrap().push(store_id.to_string());
            Ok(())
        }
    }

    fn registry(dir: &Path) -> StoreRegistry {
        StoreRegistry::open(dir, Arc::new(FakeVectorStore { deleted: Default::default() }), None).unwrap()
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let dir = tempdir().unwrap();
        let src_dir = tempdir().unwrap();
        let reg = registry(dir.path());
        let kind = StoreKind::File { path: src_dir.path().to_string_lossy().to_string() };
        reg.create(CreateStoreRequest {
            name: "proj".into(),
            description: "".into(),
            tags: vec![],
            kind: kind.clone(),
            skip_definition_sync: false,
        })
        .unwrap();

        let err = reg
            .create(CreateStoreRequest { name: "proj".into(), description: "".into(), tags: vec![], kind, skip_definition_sync: false })
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Conflict);
    }

    #[test]
    fn create_list_get_delete_round_trip() {
        let dir = tempdir().unwrap();
        let src_dir = tempdir().unwrap();
        let reg = registry(dir.path());
        let store = reg
            .create(CreateStoreRequest {
                name: "proj".into(),
                description: "d".into(),
                tags: vec!["rust".into()],
                kind: StoreKind::File { path: src_dir.path().to_string_lossy().to_string() },
                skip_definition_sync: false,
            })
            .unwrap();

        assert_eq!(reg.list().len(), 1);
        assert!(reg.get(&store.id).is_some());
        assert!(reg.get_by_name("proj").is_some());

        reg.delete(&store.id).unwrap();
        assert!(reg.get(&store.id).is_none());
        assert_eq!(reg.list().len(), 0);
    }

    #[test]
    fn registry_persists_across_reopen() {
        let dir = tempdir().unwrap();
        let src_dir = tempdir().unwrap();
        {
            let reg = registry(dir.path());
            reg.create(CreateStoreRequest {
                name: "proj".into(),
                description: "".into(),
                tags: vec![],
                kind: StoreKind::File { path: src_dir.path().to_string_lossy().to_string() },
                skip_definition_sync: false,
            })
            .unwrap();
        }
        let reg2 = registry(dir.path());
        assert_eq!(reg2.list().len(), 1);
        assert!(reg2.get_by_name("proj").is_some());
    }

    #[test]
    fn invalid_path_is_rejected() {
        let dir = tempdir().unwrap();
        let reg = registry(dir.path());
        let err = reg
            .create(CreateStoreRequest {
                name: "proj".into(),
                description: "".into(),
                tags: vec![],
                kind: StoreKind::File { path: "/definitely/not/a/real/path/xyz".into() },
                skip_definition_sync: false,
            })
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Invalid);
    }
}
