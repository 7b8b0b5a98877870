use std::{
    collections::BTreeMap,
    fmt,
    path::{Path, PathBuf},
    str::FromStr,
    sync::Arc,
};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    engine::{EngineDb, SledEngine},
    error::{DbError, DbResult},
    memdb::MemDb,
    Db,
};

/// The supported store backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendType {
    MemDb,
    Sled,
}

impl BackendType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendType::MemDb => "memdb",
            BackendType::Sled => "sled",
        }
    }
}

impl fmt::Display for BackendType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendType {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "memdb" => Ok(BackendType::MemDb),
            "sled" => Ok(BackendType::Sled),
            _ => Err(DbError::UnknownBackend(s.to_string())),
        }
    }
}

/// Opens the store `name` in directory `dir`.
pub type Creator = fn(name: &str, dir: &Path) -> DbResult<Arc<dyn Db>>;

/// Store settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DbConfig {
    pub name: String,
    pub backend: BackendType,
    pub dir: PathBuf,
}

impl Default for DbConfig {
    fn default() -> Self {
        DbConfig {
            name: "kvdb".to_string(),
            backend: BackendType::MemDb,
            dir: PathBuf::from("data"),
        }
    }
}

/// Maps each [BackendType] to the function opening a store of that backend.
///
/// Built once at startup and handed to whatever needs to open stores by backend.
#[derive(Clone, Default)]
pub struct Registry {
    creators: BTreeMap<BackendType, Creator>,
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("backends", &self.backends())
            .finish()
    }
}

impl Registry {
    /// Creates an empty [Registry].
    pub fn new() -> Self {
        Registry::default()
    }

    /// Creates a [Registry] with every built-in backend registered.
    pub fn with_defaults() -> Self {
        let mut registry = Registry::new();
        registry.register(BackendType::MemDb, open_memdb, false);
        registry.register(BackendType::Sled, open_sled, false);

        registry
    }

    /// Registers `creator` for `backend`. An existing creator is only replaced when `force` is
    /// set. Returns whether `creator` was registered.
    pub fn register(&mut self, backend: BackendType, creator: Creator, force: bool) -> bool {
        if !force && self.creators.contains_key(&backend) {
            debug!(%backend, "Backend already registered");
            return false;
        }

        self.creators.insert(backend, creator);
        true
    }

    /// Returns the registered backends.
    pub fn backends(&self) -> Vec<BackendType> {
        self.creators.keys().copied().collect()
    }

    /// Opens the store `name` of the given `backend` in `dir`.
    pub fn open(
        &self,
        name: &str,
        backend: BackendType,
        dir: impl AsRef<Path>,
    ) -> DbResult<Arc<dyn Db>> {
        let creator = self
            .creators
            .get(&backend)
            .ok_or_else(|| DbError::UnknownBackend(backend.to_string()))?;

        let dir = dir.as_ref();
        info!(name, %backend, dir = %dir.display(), "Opening store");

        creator(name, dir)
    }

    /// Opens the store described by `config`.
    pub fn open_config(&self, config: &DbConfig) -> DbResult<Arc<dyn Db>> {
        self.open(&config.name, config.backend, &config.dir)
    }
}

fn open_memdb(_name: &str, _dir: &Path) -> DbResult<Arc<dyn Db>> {
    Ok(Arc::new(MemDb::new()))
}

fn open_sled(name: &str, dir: &Path) -> DbResult<Arc<dyn Db>> {
    let engine = SledEngine::open(dir.join(format!("{name}.db")))?;
    Ok(Arc::new(EngineDb::new(engine)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_type_names() {
        for backend in [BackendType::MemDb, BackendType::Sled] {
            assert_eq!(backend.to_string().parse::<BackendType>().unwrap(), backend);
        }
        assert_eq!(BackendType::MemDb.to_string(), "memdb");
        assert!(matches!(
            "rocksdb".parse::<BackendType>(),
            Err(DbError::UnknownBackend(name)) if name == "rocksdb"
        ));
    }

    #[test]
    fn test_register() {
        let mut registry = Registry::new();
        assert!(registry.backends().is_empty());

        assert!(registry.register(BackendType::Sled, open_memdb, false));
        assert!(!registry.register(BackendType::Sled, open_sled, false));
        assert_eq!(registry.backends(), vec![BackendType::Sled]);

        // Still the first creator: the store is in memory.
        let dir = tempfile::tempdir().unwrap();
        let db = registry.open("test", BackendType::Sled, dir.path()).unwrap();
        assert_eq!(db.stats()["database.type"], "memDB");

        assert!(registry.register(BackendType::Sled, open_sled, true));
        let db = registry.open("test", BackendType::Sled, dir.path()).unwrap();
        assert_eq!(db.stats()["database.type"], "sled");
        assert!(dir.path().join("test.db").exists());
    }

    #[test]
    fn test_open_unregistered_backend() {
        let registry = Registry::new();
        let err = registry.open("test", BackendType::MemDb, "data").err().unwrap();
        assert!(matches!(err, DbError::UnknownBackend(name) if name == "memdb"));
    }

    #[test]
    fn test_with_defaults() {
        let registry = Registry::with_defaults();
        assert_eq!(registry.backends(), vec![BackendType::MemDb, BackendType::Sled]);

        let db = registry.open_config(&DbConfig::default()).unwrap();
        db.set(b"k", b"v").unwrap();
        assert_eq!(db.get(b"k").unwrap(), Some(b"v".to_vec()));
    }

    #[test]
    fn test_config_deserialization() {
        let config: DbConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, DbConfig::default());

        let config: DbConfig =
            serde_json::from_str(r#"{"name": "app", "backend": "sled", "dir": "/tmp/app"}"#)
                .unwrap();
        assert_eq!(config.name, "app");
        assert_eq!(config.backend, BackendType::Sled);
        assert_eq!(config.dir, PathBuf::from("/tmp/app"));

        assert!(serde_json::from_str::<DbConfig>(r#"{"backend": "rocksdb"}"#).is_err());
    }
}
