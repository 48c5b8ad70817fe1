//! Persisted data cache.
//!
//! Expensive build products (the route cost index, optionally the whole
//! graph) are saved under a string key and loaded on the next start. The
//! planner only relies on the [`DataCache`] contract; [`FileDataCache`]
//! keeps one JSON file per key in a folder.

use std::fs;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

/// Error from the data cache.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cache entry {0:?} does not exist")]
    Missing(String),

    #[error("invalid cache key {0:?}")]
    InvalidKey(String),

    #[error("cache i/o failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cache entry {key:?} could not be (de)serialized: {source}")]
    Serde {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Keyed storage for serializable values.
pub trait DataCache {
    /// True if a value has been saved under `key`.
    fn has(&self, key: &str) -> bool;

    /// Save `value` under `key`, replacing any previous value.
    fn save<T: Serialize>(&self, key: &str, value: &T) -> Result<(), CacheError>;

    /// Load the value saved under `key`.
    fn load<T: DeserializeOwned>(&self, key: &str) -> Result<T, CacheError>;
}

/// A [`DataCache`] storing JSON files in one folder.
#[derive(Debug, Clone)]
pub struct FileDataCache {
    folder: PathBuf,
}

impl FileDataCache {
    /// Use `folder`, creating it if needed.
    pub fn new(folder: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let folder = folder.into();
        fs::create_dir_all(&folder).map_err(|source| CacheError::Io {
            path: folder.clone(),
            source,
        })?;
        Ok(Self { folder })
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, CacheError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
            && !key.starts_with('.');
        if !valid {
            return Err(CacheError::InvalidKey(key.to_string()));
        }
        Ok(self.folder.join(format!("{key}.json")))
    }
}

impl DataCache for FileDataCache {
    fn has(&self, key: &str) -> bool {
        self.path_for(key).is_ok_and(|p| p.is_file())
    }

    fn save<T: Serialize>(&self, key: &str, value: &T) -> Result<(), CacheError> {
        let path = self.path_for(key)?;
        // Write beside the target and rename so readers never see half a file.
        let partial = path.with_extension("json.partial");
        if let Err(e) = write_json(&partial, key, value) {
            let _ = fs::remove_file(&partial);
            return Err(e);
        }
        fs::rename(&partial, &path).map_err(|source| CacheError::Io {
            path: path.clone(),
            source,
        })?;
        debug!(key, path = %path.display(), "saved cache entry");
        Ok(())
    }

    fn load<T: DeserializeOwned>(&self, key: &str) -> Result<T, CacheError> {
        let path = self.path_for(key)?;
        if !path.is_file() {
            return Err(CacheError::Missing(key.to_string()));
        }
        let file = fs::File::open(&path).map_err(|source| CacheError::Io {
            path: path.clone(),
            source,
        })?;
        let value = serde_json::from_reader(BufReader::new(file)).map_err(|source| {
            CacheError::Serde {
                key: key.to_string(),
                source,
            }
        })?;
        debug!(key, "loaded cache entry");
        Ok(value)
    }
}

/// Write `value` to `path` as JSON and flush it to disk.
fn write_json<T: Serialize>(path: &Path, key: &str, value: &T) -> Result<(), CacheError> {
    let io = |source| CacheError::Io {
        path: path.to_path_buf(),
        source,
    };
    let file = fs::File::create(path).map_err(io)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, value).map_err(|source| CacheError::Serde {
        key: key.to_string(),
        source,
    })?;
    let file = writer.into_inner().map_err(|e| io(e.into_error()))?;
    file.sync_all().map_err(io)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq, serde::Serialize, serde::Deserialize)]
    struct Entry {
        name: String,
        hops: Vec<u8>,
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileDataCache::new(dir.path()).unwrap();
        let entry = Entry {
            name: "matrix".into(),
            hops: vec![0, 1, 255],
        };

        assert!(!cache.has("index"));
        cache.save("index", &entry).unwrap();
        assert!(cache.has("index"));
        assert_eq!(cache.load::<Entry>("index").unwrap(), entry);
    }

    #[test]
    fn missing_entry() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileDataCache::new(dir.path()).unwrap();
        assert!(matches!(
            cache.load::<Entry>("nothing"),
            Err(CacheError::Missing(_))
        ));
    }

    #[test]
    fn corrupt_entry_is_serde_error() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileDataCache::new(dir.path()).unwrap();
        fs::write(dir.path().join("index.json"), "{not json").unwrap();
        assert!(cache.has("index"));
        assert!(matches!(
            cache.load::<Entry>("index"),
            Err(CacheError::Serde { .. })
        ));
    }

    #[test]
    fn failed_save_keeps_previous_entry() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileDataCache::new(dir.path()).unwrap();
        cache.save("v", &42u32).unwrap();

        // JSON object keys must be strings
        let unserializable = std::collections::BTreeMap::from([((1u8, 2u8), 3u8)]);
        assert!(matches!(
            cache.save("v", &unserializable),
            Err(CacheError::Serde { .. })
        ));
        assert_eq!(cache.load::<u32>("v").unwrap(), 42);
        assert!(!dir.path().join("v.json.partial").exists());
    }

    #[test]
    fn keys_cannot_escape_folder() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileDataCache::new(dir.path()).unwrap();
        for key in ["", "../index", "a/b", ".hidden"] {
            assert!(matches!(
                cache.save(key, &1u8),
                Err(CacheError::InvalidKey(_))
            ));
            assert!(!cache.has(key));
        }
    }

    #[test]
    fn creates_nested_folder() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        let cache = FileDataCache::new(&nested).unwrap();
        cache.save("v", &42u32).unwrap();
        assert_eq!(cache.load::<u32>("v").unwrap(), 42);
        assert_eq!(cache.folder(), nested.as_path());
    }
}
