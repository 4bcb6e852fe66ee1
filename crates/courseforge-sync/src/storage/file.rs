//! Directory-backed key-value store.
//!
//! One file per key. File names are the percent-encoded key plus
//! [`ENTRY_EXTENSION`], so keys like `snapshot:{taskId}` are safe on every
//! platform. Writes go to a temporary file first and are renamed into place.

use std::borrow::Cow;
use std::fmt::Write as _;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use courseforge_core::{KeyValueStore, StorageError};
use tracing::debug;

const ENTRY_EXTENSION: &str = ".entry";
const TEMP_EXTENSION: &str = "tmp";

/// Key-value store persisted under a directory.
#[derive(Debug, Clone)]
pub struct FileKeyValueStore {
    root: PathBuf,
}

impl FileKeyValueStore {
    /// Open (and create if needed) a store rooted at `root`.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        tokio::fs::create_dir_all(&root)
            .await
            .map_err(|e| backend_error(&root, &e))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}{ENTRY_EXTENSION}", encode_key(key)))
    }
}

fn backend_error(path: &Path, err: &std::io::Error) -> StorageError {
    StorageError::Backend(format!("{}: {err}", path.display()))
}

fn encode_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for b in key.as_bytes() {
        match *b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' => out.push(char::from(*b)),
            b => {
                let _ = write!(out, "%{b:02X}");
            }
        }
    }
    out
}

/// Inverse of [`encode_key`]. Names that do not decode to UTF-8 are not ours.
fn decode_key(name: &str) -> Option<String> {
    urlencoding::decode(name).ok().map(Cow::into_owned)
}

#[async_trait]
impl KeyValueStore for FileKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.path_for(key);
        match tokio::fs::read_to_string(&path).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(backend_error(&path, &e)),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let path = self.path_for(key);
        let tmp = path.with_extension(TEMP_EXTENSION);
        tokio::fs::write(&tmp, value)
            .await
            .map_err(|e| backend_error(&tmp, &e))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| backend_error(&path, &e))?;
        debug!(key, path = %path.display(), "Stored entry");
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        let path = self.path_for(key);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(backend_error(&path, &e)),
        }
    }

    async fn keys(&self) -> Result<Vec<String>, StorageError> {
        let mut entries = tokio::fs::read_dir(&self.root)
            .await
            .map_err(|e| backend_error(&self.root, &e))?;

        let mut keys = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| backend_error(&self.root, &e))?
        {
            let name = entry.file_name();
            let Some(stem) = name.to_str().and_then(|n| n.strip_suffix(ENTRY_EXTENSION)) else {
                continue;
            };
            if let Some(key) = decode_key(stem) {
                keys.push(key);
            }
        }
        keys.sort();
        Ok(keys)
    }
}
