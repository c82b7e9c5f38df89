use std::{
    cell::RefCell,
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use serde_json::Value;

use super::LocalCache;
use crate::error::CacheError;

/// A directory of JSON files, one per key
#[derive(Debug)]
pub struct FileCache {
    directory: PathBuf,
}

impl FileCache {
    pub fn new(directory: PathBuf) -> Result<Self, CacheError> {
        if !directory.exists() {
            fs::create_dir_all(&directory)
                .map_err(|error| CacheError::CreateDirectory(directory.clone(), error))?;
        }
        Ok(Self { directory })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn path(&self, key: &str) -> PathBuf {
        let name: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.directory.join(format!("{name}.json"))
    }
}

impl LocalCache for FileCache {
    fn load(&self, key: &str) -> Result<Option<Value>, CacheError> {
        let path = self.path(key);
        if !path.is_file() {
            return Ok(None);
        }

        let content = fs::read_to_string(&path).map_err(CacheError::ReadFile)?;
        serde_json::from_str(&content)
            .map(Some)
            .map_err(CacheError::Parse)
    }

    fn store(&self, key: &str, value: &Value) -> Result<(), CacheError> {
        let json = serde_json::to_string_pretty(value).map_err(CacheError::Parse)?;
        fs::write(self.path(key), json).map_err(CacheError::WriteFile)
    }

    fn remove(&self, key: &str) -> Result<(), CacheError> {
        let path = self.path(key);
        if path.is_file() {
            fs::remove_file(path).map_err(CacheError::WriteFile)?;
        }
        Ok(())
    }
}

/// A [LocalCache] that lives as long as the process
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: RefCell<HashMap<String, Value>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LocalCache for MemoryCache {
    fn load(&self, key: &str) -> Result<Option<Value>, CacheError> {
        Ok(self.entries.borrow().get(key).cloned())
    }

    fn store(&self, key: &str, value: &Value) -> Result<(), CacheError> {
        self.entries
            .borrow_mut()
            .insert(key.to_string(), value.clone());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), CacheError> {
        self.entries.borrow_mut().remove(key);
        Ok(())
    }
}
