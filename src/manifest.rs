//! Processed-file manifest.
//!
//! Maps the absolute path of every ingested PDF to the SHA-256 digest of its
//! bytes at the time it was stored. A file is ingested again only when its
//! digest no longer matches (or it has no entry). The manifest is a plain
//! pretty-printed JSON object so it can be inspected and edited by hand.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Block size used when streaming a file through the hasher.
const HASH_BLOCK_SIZE: usize = 8192;

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("no manifest at {0}")]
    NotFound(PathBuf),
    #[error("failed to read manifest {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("manifest {path} is not a valid path-to-hash mapping: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Manifest {
    entries: BTreeMap<String, String>,
}

impl Manifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads the manifest, distinguishing a missing file from a broken one.
    pub fn read(path: &Path) -> Result<Self, ManifestError> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ManifestError::NotFound(path.to_path_buf()))
            }
            Err(e) => {
                return Err(ManifestError::Io {
                    path: path.to_path_buf(),
                    source: e,
                })
            }
        };
        serde_json::from_str(&content).map_err(|e| ManifestError::Parse {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Loads the manifest, falling back to an empty one on any failure.
    pub fn load(path: &Path) -> Self {
        match Self::read(path) {
            Ok(m) => m,
            Err(ManifestError::NotFound(_)) => {
                tracing::info!(path = %path.display(), "no manifest yet, starting fresh");
                Self::new()
            }
            Err(e) => {
                tracing::warn!(error = %e, "could not read existing manifest, starting fresh");
                Self::new()
            }
        }
    }

    /// Atomically replaces the manifest file with the current entries.
    pub fn save(&self, path: &Path) -> Result<()> {
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create manifest directory: {}", dir.display()))?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir)
            .with_context(|| format!("Failed to create temp file in {}", dir.display()))?;
        serde_json::to_writer_pretty(&mut tmp, &self.entries)?;
        tmp.write_all(b"\n")?;
        tmp.flush()?;
        tmp.persist(path)
            .with_context(|| format!("Failed to write manifest: {}", path.display()))?;
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// True when `key` is recorded with exactly `hash`.
    pub fn is_current(&self, key: &str, hash: &str) -> bool {
        self.get(key) == Some(hash)
    }

    pub fn record(&mut self, key: impl Into<String>, hash: impl Into<String>) {
        self.entries.insert(key.into(), hash.into());
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// SHA-256 of the file's bytes as lowercase hex.
pub fn hash_file(path: &Path) -> std::io::Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; HASH_BLOCK_SIZE];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Manifest key for a file: its canonical absolute path.
pub fn manifest_key(path: &Path) -> std::io::Result<String> {
    Ok(std::fs::canonicalize(path)?.to_string_lossy().to_string())
}
