use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::persist::{AtomicFileWriter, PersistError};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("invalid store key {0:?}")]
    InvalidKey(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("persist error: {0}")]
    Persist(#[from] PersistError),
    #[error("failed to encode record {key}: {message}")]
    Encode { key: String, message: String },
    #[error("failed to decode record {key}: {message}")]
    Decode { key: String, message: String },
    #[error("store lock poisoned")]
    Poisoned,
}

/// Key/value storage that outlives a context reset.
///
/// Each `set` replaces the whole value for its key in one step.
pub trait DurableStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    fn delete(&self, key: &str) -> Result<(), StoreError>;
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DurableStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        entries.remove(key);
        Ok(())
    }
}

/// One file per key inside a state directory, replaced atomically on every write.
#[derive(Debug, Clone)]
pub struct FileStore {
    writer: AtomicFileWriter,
}

const RECORD_EXTENSION: &str = "ron";

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            writer: AtomicFileWriter::new(dir.into()),
        }
    }

    pub fn dir(&self) -> &Path {
        self.writer.dir()
    }

    fn file_name(key: &str) -> Result<String, StoreError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if valid {
            Ok(format!("{key}.{RECORD_EXTENSION}"))
        } else {
            Err(StoreError::InvalidKey(key.to_string()))
        }
    }
}

impl DurableStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let path = self.dir().join(Self::file_name(key)?);
        match fs::read_to_string(&path) {
            Ok(text) => Ok(Some(text)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.writer.write(&Self::file_name(key)?, value)?;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        let path = self.dir().join(Self::file_name(key)?);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

pub(crate) fn load_record<T: serde::de::DeserializeOwned>(
    store: &dyn DurableStore,
    key: &str,
) -> Result<Option<T>, StoreError> {
    let Some(text) = store.get(key)? else {
        return Ok(None);
    };
    ron::from_str(&text)
        .map(Some)
        .map_err(|err| StoreError::Decode {
            key: key.to_string(),
            message: err.to_string(),
        })
}

pub(crate) fn save_record<T: serde::Serialize>(
    store: &dyn DurableStore,
    key: &str,
    record: &T,
) -> Result<(), StoreError> {
    let pretty = ron::ser::PrettyConfig::new();
    let text = ron::ser::to_string_pretty(record, pretty).map_err(|err| StoreError::Encode {
        key: key.to_string(),
        message: err.to_string(),
    })?;
    store.set(key, &text)
}
