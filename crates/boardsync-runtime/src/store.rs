//! File-backed variant cache
//!
//! One pretty-printed JSON file per key inside a cache directory. Missing
//! files read as absent entries.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use boardsync_core::{SyncError, SyncResult, VariantCache, VariantOptions};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> SyncResult<PathBuf> {
        if key.is_empty() || key.contains(|c: char| matches!(c, '/' | '\\' | '.')) {
            return Err(SyncError::storage(format!("invalid cache key: {:?}", key)));
        }
        Ok(self.dir.join(format!("{}.json", key)))
    }
}

impl VariantCache for JsonFileStore {
    fn load(&self, key: &str) -> SyncResult<Option<VariantOptions>> {
        let path = self.path_for(key)?;
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(SyncError::storage(format!(
                    "failed to read {}: {}",
                    path.display(),
                    e
                )))
            }
        };
        let options = serde_json::from_slice(&bytes)?;
        debug!(path = %path.display(), "Loaded cached variant");
        Ok(Some(options))
    }

    fn store(&mut self, key: &str, options: &VariantOptions) -> SyncResult<()> {
        let path = self.path_for(key)?;
        fs::create_dir_all(&self.dir).map_err(|e| {
            SyncError::storage(format!("failed to create {}: {}", self.dir.display(), e))
        })?;
        let bytes = serde_json::to_vec_pretty(options)?;
        fs::write(&path, bytes)
            .map_err(|e| SyncError::storage(format!("failed to write {}: {}", path.display(), e)))?;
        debug!(path = %path.display(), "Stored cached variant");
        Ok(())
    }

    fn delete(&mut self, key: &str) -> SyncResult<bool> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(SyncError::storage(format!(
                "failed to delete {}: {}",
                path.display(),
                e
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use boardsync_core::{variant_cache_key, ClassicalPositions, GameId};

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "boardsync-store-{}-{}",
            name,
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn test_store_load_delete() {
        let dir = scratch_dir("roundtrip");
        let mut store = JsonFileStore::new(&dir);
        let key = variant_cache_key(GameId::new(12));
        let options = ClassicalPositions::classical();

        assert_eq!(store.load(&key).unwrap(), None);
        store.store(&key, &options).unwrap();
        assert!(dir.join("online-game-variant-options12.json").exists());
        assert_eq!(store.load(&key).unwrap(), Some(options));

        assert!(store.delete(&key).unwrap());
        assert!(!store.delete(&key).unwrap());
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_rejects_path_like_keys() {
        let store = JsonFileStore::new(scratch_dir("keys"));
        assert!(store.load("../escape").is_err());
        assert!(store.load("").is_err());
    }
}
