use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use quarry_core::SerializeFormat;
use quarry_index::{IndexFile, INDEX_FILE_VERSION};

use crate::error::CacheError;
use crate::util::{atomic_write, escape_file_name};

/// Load/store of per-file indexes keyed by source path.
///
/// `try_load` peeks at a shared copy; `try_take_or_load` transfers
/// ownership out of the in-memory set, so a later `try_load` misses until
/// a `write_to_cache` re-installs the entry (the persisted copy, if any,
/// still backs reloads).
pub trait CacheManager: Send + Sync {
    fn try_load(&self, path: &str) -> Option<Arc<IndexFile>>;

    fn try_take_or_load(&self, path: &str) -> Option<IndexFile>;

    /// Persist `file` and re-install the in-memory copy. Best effort:
    /// persistence failures are logged, never propagated.
    fn write_to_cache(&self, file: IndexFile);

    /// The source text that was last indexed for `path`.
    fn load_cached_file_contents(&self, path: &str) -> Option<String>;

    /// Visit the in-memory set without exposing ownership. The callback
    /// must not reenter the cache manager.
    fn iterate_loaded_caches(&self, f: &mut dyn FnMut(&IndexFile));
}

/// Disk-backed cache. Each source file owns two flat entries under the
/// cache directory: the escaped path holds the indexed source text, and an
/// `.json`/`.mpack` sibling holds the serialized index.
pub struct DiskCache {
    cache_dir: PathBuf,
    format: SerializeFormat,
    loaded: Mutex<HashMap<String, Arc<IndexFile>>>,
}

impl DiskCache {
    pub fn new(cache_dir: impl Into<PathBuf>, format: SerializeFormat) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            format,
            loaded: Mutex::new(HashMap::new()),
        }
    }

    fn content_path(&self, path: &str) -> PathBuf {
        self.cache_dir.join(escape_file_name(path))
    }

    fn index_path(&self, path: &str) -> PathBuf {
        let extension = match self.format {
            SerializeFormat::Json => ".json",
            SerializeFormat::MessagePack => ".mpack",
        };
        self.cache_dir
            .join(format!("{}{}", escape_file_name(path), extension))
    }

    fn load_from_disk(&self, path: &str) -> Option<IndexFile> {
        let bytes = std::fs::read(self.index_path(path)).ok()?;
        quarry_index::deserialize(self.format, path, &bytes, INDEX_FILE_VERSION)
    }

    fn persist(&self, file: &IndexFile) -> Result<(), CacheError> {
        atomic_write(&self.content_path(&file.path), file.file_contents.as_bytes())?;
        let bytes = quarry_index::serialize(self.format, file)?;
        atomic_write(&self.index_path(&file.path), &bytes)?;
        Ok(())
    }
}

impl CacheManager for DiskCache {
    fn try_load(&self, path: &str) -> Option<Arc<IndexFile>> {
        let loaded = self.loaded.lock().expect("cache mutex poisoned");
        if let Some(file) = loaded.get(path) {
            return Some(Arc::clone(file));
        }
        drop(loaded);

        let file = Arc::new(self.load_from_disk(path)?);
        let mut loaded = self.loaded.lock().expect("cache mutex poisoned");
        // A racing load may have installed a copy; either copy decodes the
        // same persisted bytes.
        Some(Arc::clone(
            loaded.entry(path.to_string()).or_insert(file),
        ))
    }

    fn try_take_or_load(&self, path: &str) -> Option<IndexFile> {
        let taken = self
            .loaded
            .lock()
            .expect("cache mutex poisoned")
            .remove(path);
        match taken {
            Some(file) => Some(Arc::try_unwrap(file).unwrap_or_else(|arc| (*arc).clone())),
            None => self.load_from_disk(path),
        }
    }

    fn write_to_cache(&self, file: IndexFile) {
        if let Err(err) = self.persist(&file) {
            tracing::warn!(path = %file.path, error = %err, "failed to persist cached index");
        }
        self.loaded
            .lock()
            .expect("cache mutex poisoned")
            .insert(file.path.clone(), Arc::new(file));
    }

    fn load_cached_file_contents(&self, path: &str) -> Option<String> {
        std::fs::read_to_string(self.content_path(path)).ok()
    }

    fn iterate_loaded_caches(&self, f: &mut dyn FnMut(&IndexFile)) {
        let loaded = self.loaded.lock().expect("cache mutex poisoned");
        for file in loaded.values() {
            f(file);
        }
    }
}

/// In-memory stand-in for [`DiskCache`]. `persisted` plays the role of the
/// disk: entries written (or preseeded) there survive `try_take_or_load`.
#[derive(Default)]
pub struct FakeCache {
    persisted: Mutex<HashMap<String, IndexFile>>,
    loaded: Mutex<HashMap<String, Arc<IndexFile>>>,
}

impl FakeCache {
    pub fn new(initial: impl IntoIterator<Item = IndexFile>) -> Self {
        let cache = Self::default();
        {
            let mut persisted = cache.persisted.lock().expect("cache mutex poisoned");
            for file in initial {
                persisted.insert(file.path.clone(), file);
            }
        }
        cache
    }
}

impl CacheManager for FakeCache {
    fn try_load(&self, path: &str) -> Option<Arc<IndexFile>> {
        let mut loaded = self.loaded.lock().expect("cache mutex poisoned");
        if let Some(file) = loaded.get(path) {
            return Some(Arc::clone(file));
        }
        let file = self
            .persisted
            .lock()
            .expect("cache mutex poisoned")
            .get(path)
            .cloned()?;
        let file = Arc::new(file);
        loaded.insert(path.to_string(), Arc::clone(&file));
        Some(file)
    }

    fn try_take_or_load(&self, path: &str) -> Option<IndexFile> {
        let taken = self
            .loaded
            .lock()
            .expect("cache mutex poisoned")
            .remove(path);
        match taken {
            Some(file) => Some(Arc::try_unwrap(file).unwrap_or_else(|arc| (*arc).clone())),
            None => self
                .persisted
                .lock()
                .expect("cache mutex poisoned")
                .get(path)
                .cloned(),
        }
    }

    fn write_to_cache(&self, file: IndexFile) {
        self.persisted
            .lock()
            .expect("cache mutex poisoned")
            .insert(file.path.clone(), file.clone());
        self.loaded
            .lock()
            .expect("cache mutex poisoned")
            .insert(file.path.clone(), Arc::new(file));
    }

    fn load_cached_file_contents(&self, path: &str) -> Option<String> {
        self.persisted
            .lock()
            .expect("cache mutex poisoned")
            .get(path)
            .map(|file| file.file_contents.clone())
    }

    fn iterate_loaded_caches(&self, f: &mut dyn FnMut(&IndexFile)) {
        let loaded = self.loaded.lock().expect("cache mutex poisoned");
        for file in loaded.values() {
            f(file);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample(path: &str) -> IndexFile {
        let mut file = IndexFile::new(path);
        file.last_modification_time = 42;
        file.file_contents = "int x;\n".to_string();
        file
    }

    #[test]
    fn disk_cache_round_trips_index_and_contents() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::new(dir.path(), SerializeFormat::Json);

        cache.write_to_cache(sample("/p/foo.cc"));

        let loaded = cache.try_load("/p/foo.cc").unwrap();
        assert_eq!(loaded.last_modification_time, 42);
        assert_eq!(
            cache.load_cached_file_contents("/p/foo.cc").as_deref(),
            Some("int x;\n")
        );
    }

    #[test]
    fn take_transfers_ownership_but_disk_backs_reload() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::new(dir.path(), SerializeFormat::MessagePack);
        cache.write_to_cache(sample("/p/foo.cc"));

        let taken = cache.try_take_or_load("/p/foo.cc").unwrap();
        assert_eq!(taken.path, "/p/foo.cc");

        let mut seen = 0;
        cache.iterate_loaded_caches(&mut |_| seen += 1);
        assert_eq!(seen, 0);

        // The persisted copy still exists, so a load reinstates the entry.
        assert!(cache.try_load("/p/foo.cc").is_some());
    }

    #[test]
    fn corrupt_entry_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::new(dir.path(), SerializeFormat::Json);
        cache.write_to_cache(sample("/p/foo.cc"));

        std::fs::write(dir.path().join("@p@foo.cc.json"), b"{ corrupt").unwrap();
        let fresh = DiskCache::new(dir.path(), SerializeFormat::Json);
        assert!(fresh.try_load("/p/foo.cc").is_none());
    }

    #[test]
    fn version_skew_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();

        let mut stale = sample("/p/foo.cc");
        stale.version = quarry_index::INDEX_FILE_VERSION + 1;
        let bytes = quarry_index::serialize(SerializeFormat::Json, &stale).unwrap();
        std::fs::write(dir.path().join("@p@foo.cc.json"), bytes).unwrap();

        // The entry deserializes fine, but its schema version is not ours:
        // the pipeline sees a miss and the next request reparses.
        let cache = DiskCache::new(dir.path(), SerializeFormat::Json);
        assert!(cache.try_load("/p/foo.cc").is_none());
    }

    #[test]
    fn fake_cache_matches_disk_semantics() {
        let cache = FakeCache::new([sample("/p/foo.cc")]);
        assert!(cache.try_load("/p/foo.cc").is_some());

        let taken = cache.try_take_or_load("/p/foo.cc").unwrap();
        assert_eq!(taken.last_modification_time, 42);

        let mut seen = 0;
        cache.iterate_loaded_caches(&mut |_| seen += 1);
        assert_eq!(seen, 0);

        assert!(cache.try_load("/p/foo.cc").is_some());
    }
}
