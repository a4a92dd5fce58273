//! Key-value persistence backends for the task store

use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::error::StorageError;

type StorageResult<T> = std::result::Result<T, StorageError>;

/// A string-valued key-value store provided by the host environment
pub trait Storage {
    fn get(&self, key: &str) -> StorageResult<Option<String>>;

    /// Replace the value under `key`. Readers see either the old or the new value.
    fn set(&mut self, key: &str, value: &str) -> StorageResult<()>;

    fn remove(&mut self, key: &str) -> StorageResult<()>;

    /// Copy the stored bytes of `from` to `to` without decoding them
    fn copy(&mut self, from: &str, to: &str) -> StorageResult<()>;
}

/// One `<key>.json` file per key inside a data directory
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> StorageResult<PathBuf> {
        validate_key(key)?;
        Ok(self.dir.join(format!("{key}.json")))
    }
}

fn validate_key(key: &str) -> StorageResult<()> {
    let valid = !key.is_empty()
        && !key.starts_with('.')
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidKey(key.to_string()))
    }
}

impl Storage for FileStorage {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn set(&mut self, key: &str, value: &str) -> StorageResult<()> {
        let path = self.path_for(key)?;
        replace_file(&self.dir, key, &path, value.as_bytes())
    }

    fn remove(&mut self, key: &str) -> StorageResult<()> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    fn copy(&mut self, from: &str, to: &str) -> StorageResult<()> {
        let source = self.path_for(from)?;
        let target = self.path_for(to)?;
        let bytes = fs::read(&source)?;
        replace_file(&self.dir, to, &target, &bytes)
    }
}

// Write beside the target, then rename over it
fn replace_file(dir: &Path, key: &str, path: &Path, bytes: &[u8]) -> StorageResult<()> {
    fs::create_dir_all(dir)?;
    let tmp = dir.join(format!(".{key}.json.tmp"));
    let written = (|| {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        fs::rename(&tmp, path)
    })();
    if written.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    written.map_err(StorageError::from)
}

/// In-process storage; nothing survives the session
#[derive(Debug, Default, Clone)]
pub struct MemoryStorage {
    entries: HashMap<String, String>,
    fail_writes: bool,
    fail_reads: bool,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage whose writes always fail, for exercising error paths
    pub fn failing() -> Self {
        Self {
            fail_writes: true,
            ..Self::default()
        }
    }

    /// Storage whose reads always fail while writes still succeed
    pub fn unreadable() -> Self {
        Self {
            fail_reads: true,
            ..Self::default()
        }
    }

    pub fn with_entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.entries.insert(key.into(), value.into());
        self
    }

    fn check_writable(&self) -> StorageResult<()> {
        if self.fail_writes {
            Err(io::Error::other("storage is read-only").into())
        } else {
            Ok(())
        }
    }

    fn check_readable(&self) -> StorageResult<()> {
        if self.fail_reads {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "storage is unreadable").into())
        } else {
            Ok(())
        }
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        self.check_readable()?;
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> StorageResult<()> {
        self.check_writable()?;
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> StorageResult<()> {
        self.check_writable()?;
        self.entries.remove(key);
        Ok(())
    }

    fn copy(&mut self, from: &str, to: &str) -> StorageResult<()> {
        self.check_readable()?;
        self.check_writable()?;
        if let Some(value) = self.entries.get(from).cloned() {
            self.entries.insert(to.to_string(), value);
        }
        Ok(())
    }
}
