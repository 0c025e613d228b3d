//! Backup manifest materialization.
//!
//! A manifest is a small JSON file describing one backup unit. It is written
//! to a uniquely named temp file first and renamed into place, so readers
//! see either the old file or the complete new one.

use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File stem used when no identifier is given.
pub const INCREMENTAL_STEM: &str = "incrementalMeta";

/// Errors raised while writing a manifest.
#[derive(Debug, Error)]
pub enum ManifestError {
    /// A filesystem operation failed.
    #[error("manifest I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The identifier would not produce a plain file name.
    #[error("invalid manifest identifier: '{0}'")]
    InvalidIdentifier(String),

    /// Entries could not be encoded as JSON.
    #[error("failed to serialize manifest: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl ManifestError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Writes manifest files into one directory.
#[derive(Debug, Clone)]
pub struct ManifestMaterializer {
    tmp_dir: PathBuf,
}

impl ManifestMaterializer {
    pub fn new(tmp_dir: impl Into<PathBuf>) -> Self {
        Self {
            tmp_dir: tmp_dir.into(),
        }
    }

    /// Directory manifests are written to.
    pub fn tmp_dir(&self) -> &Path {
        &self.tmp_dir
    }

    /// Where `finalize(identifier)` will place its file.
    pub fn destination(&self, identifier: Option<&str>) -> Result<PathBuf, ManifestError> {
        let stem = stem(identifier)?;
        Ok(self.tmp_dir.join(format!("{stem}.json")))
    }

    /// Write an empty manifest and return its final path.
    pub fn finalize(&self, identifier: Option<&str>) -> Result<PathBuf, ManifestError> {
        self.write_manifest(identifier, b"[]")
    }

    /// Write `entries` as the manifest body and return its final path.
    pub fn finalize_with<T: Serialize>(
        &self,
        identifier: Option<&str>,
        entries: &[T],
    ) -> Result<PathBuf, ManifestError> {
        let body = serde_json::to_vec(entries)?;
        self.write_manifest(identifier, &body)
    }

    fn write_manifest(&self, identifier: Option<&str>, body: &[u8]) -> Result<PathBuf, ManifestError> {
        let stem = stem(identifier)?;
        let destination = self.tmp_dir.join(format!("{stem}.json"));

        // Dropping the temp file on any early return deletes it.
        let mut temp = tempfile::Builder::new()
            .prefix(stem)
            .suffix(".json")
            .tempfile_in(&self.tmp_dir)
            .map_err(|e| ManifestError::io(&self.tmp_dir, e))?;

        temp.write_all(body)
            .and_then(|()| temp.flush())
            .and_then(|()| temp.as_file().sync_all())
            .map_err(|e| ManifestError::io(temp.path(), e))?;

        match fs::remove_file(&destination) {
            Ok(()) => {
                tracing::debug!(path = %destination.display(), "Replaced existing manifest");
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(ManifestError::io(&destination, e)),
        }

        temp.persist(&destination)
            .map_err(|e| ManifestError::io(&destination, e.error))?;

        tracing::info!(path = %destination.display(), bytes = body.len(), "Wrote manifest");
        Ok(destination)
    }
}

fn stem(identifier: Option<&str>) -> Result<&str, ManifestError> {
    let Some(id) = identifier else {
        return Ok(INCREMENTAL_STEM);
    };
    let plain = !id.is_empty()
        && id != "."
        && id != ".."
        && !id.contains(['/', '\\'])
        && !id.contains(std::path::MAIN_SEPARATOR);
    if plain {
        Ok(id)
    } else {
        Err(ManifestError::InvalidIdentifier(id.to_string()))
    }
}
