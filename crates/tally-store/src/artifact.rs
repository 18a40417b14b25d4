//! Artifact store boundary. The core renders pack bytes and hands them to
//! `put`; byte-level PDF rendering and signed-URL mechanics live outside.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::warn;

pub trait ArtifactStore: Send + Sync {
    fn put(&self, key: &str, bytes: &[u8]) -> Result<()>;
    fn sign(&self, key: &str) -> Result<String>;
}

/// Directory-backed artifact store. Keys map to relative paths under a root.
#[derive(Debug, Clone)]
pub struct DirArtifactStore {
    root: PathBuf,
}

impl DirArtifactStore {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }
}

impl ArtifactStore for DirArtifactStore {
    fn put(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create artifact dir {parent:?}"))?;
        }
        std::fs::write(&path, bytes).with_context(|| format!("write artifact {path:?}"))?;
        Ok(())
    }

    fn sign(&self, key: &str) -> Result<String> {
        let path = self.path_for(key);
        if !path.exists() {
            anyhow::bail!("artifact not found: {key}");
        }
        Ok(format!("file://{}", path.display()))
    }
}

/// Upload with bounded retries and a fixed delay. The upload is the only
/// operation in the core permitted to retry; persistence writes never do.
pub fn put_with_retry(
    store: &dyn ArtifactStore,
    key: &str,
    bytes: &[u8],
    attempts: u32,
    delay: Duration,
) -> Result<()> {
    let mut last_err = None;
    for attempt in 1..=attempts.max(1) {
        match store.put(key, bytes) {
            Ok(()) => return Ok(()),
            Err(e) => {
                warn!(key, attempt, error = %e, "artifact upload attempt failed");
                last_err = Some(e);
                if attempt < attempts {
                    std::thread::sleep(delay);
                }
            }
        }
    }
    Err(last_err
        .unwrap_or_else(|| anyhow::anyhow!("artifact upload failed with no attempts made")))
}
