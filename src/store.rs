//! Content-addressed artifact store.
//!
//! Large analysis snapshots and derived documents are persisted under
//! stable keys so only keys travel through the pipeline state. Writes
//! go to a unique temporary path first and are published with an
//! atomic rename, so concurrent writers never expose a partial
//! artifact and a repeated `put` of identical content is a no-op.

use crate::core::errors::{Error, Result};
use log::debug;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

#[derive(Clone, Debug)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    /// Open (creating if needed) a store rooted at the given directory.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(root.join("snapshots"))
            .map_err(|e| Error::store(format!("cannot create store at {}", root.display()), e))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Derive the content-addressed key for a payload.
    pub fn key_for(payload: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(payload);
        format!("{:x}", hasher.finalize())
    }

    /// Publish a payload under a key. Idempotent: if the key already
    /// exists the write is skipped entirely.
    pub fn put(&self, key: &str, payload: &[u8]) -> Result<String> {
        validate_key(key)?;
        let target = self.key_path(key);
        if target.exists() {
            debug!("store: key {key} already published, skipping write");
            return Ok(key.to_string());
        }
        self.write_atomic(&target, payload)?;
        Ok(key.to_string())
    }

    /// Fetch a payload by key.
    pub fn get(&self, key: &str) -> Result<Vec<u8>> {
        validate_key(key)?;
        let target = self.key_path(key);
        if !target.exists() {
            return Err(Error::ArtifactMissing(key.to_string()));
        }
        fs::read(&target).map_err(|e| Error::store(format!("cannot read artifact {key}"), e))
    }

    pub fn contains(&self, key: &str) -> bool {
        validate_key(key).is_ok() && self.key_path(key).exists()
    }

    /// Publish a document under a stable name in the workspace root,
    /// overwriting any previous version atomically.
    pub fn publish_named(&self, name: &str, content: &str) -> Result<PathBuf> {
        validate_key(name)?;
        let target = self.root.join(name);
        self.write_atomic(&target, content.as_bytes())?;
        Ok(target)
    }

    fn key_path(&self, key: &str) -> PathBuf {
        self.root.join("snapshots").join(key)
    }

    fn write_atomic(&self, target: &Path, payload: &[u8]) -> Result<()> {
        let temp = temp_path(target);
        fs::write(&temp, payload)
            .map_err(|e| Error::store(format!("cannot write {}", temp.display()), e))?;
        fs::rename(&temp, target).map_err(|e| {
            let _ = fs::remove_file(&temp);
            Error::store(format!("cannot publish {}", target.display()), e)
        })?;
        Ok(())
    }
}

/// Unique sibling path for the in-flight write.
fn temp_path(target: &Path) -> PathBuf {
    let counter = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    target.with_file_name(format!(".{name}.tmp.{}.{counter}", std::process::id()))
}

/// Keys and stable names are single path components.
fn validate_key(key: &str) -> Result<()> {
    if key.is_empty()
        || key.contains(['/', '\\'])
        || key.contains("..")
    {
        return Err(Error::Configuration(format!(
            "invalid artifact key: {key:?}"
        )));
    }
    Ok(())
}
