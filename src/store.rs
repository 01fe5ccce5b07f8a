//! Directory of transcript artifacts.
//!
//! The store only needs two primitives from the filesystem, listing names and
//! writing a document; everything else (existence checks) is derived from the
//! listing. Listing-then-writing is not guarded against concurrent external
//! changes to the directory.

use std::collections::BTreeSet;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use walkdir::WalkDir;

use crate::error::{IngestError, Result};
use crate::naming::{ARTIFACT_EXTENSION, sanitize_identifier};

#[derive(Debug, Clone)]
pub struct TranscriptStore {
    dir: PathBuf,
}

impl TranscriptStore {
    /// Opens the store, creating the directory when missing.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|err| IngestError::persistence(&dir, err))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Names of every regular file directly inside the store directory.
    pub fn list_names(&self) -> Result<BTreeSet<String>> {
        let mut names = BTreeSet::new();
        for entry in WalkDir::new(&self.dir).min_depth(1).max_depth(1) {
            let entry =
                entry.map_err(|err| IngestError::persistence(&self.dir, io::Error::from(err)))?;
            if !entry.file_type().is_file() {
                continue;
            }
            names.insert(entry.file_name().to_string_lossy().into_owned());
        }
        Ok(names)
    }

    /// True when an artifact for `video_id` was already captured, whatever
    /// title or author ended up in its name.
    pub fn exists(&self, video_id: &str) -> Result<bool> {
        Ok(self.find_existing(video_id)?.is_some())
    }

    /// First artifact name anchored on `video_id`, if any.
    pub fn find_existing(&self, video_id: &str) -> Result<Option<String>> {
        let safe_id = sanitize_identifier(video_id);
        let exact = format!("{safe_id}.{ARTIFACT_EXTENSION}");
        let prefix = format!("{safe_id}_");
        Ok(self
            .list_names()?
            .into_iter()
            .find(|name| *name == exact || name.starts_with(&prefix)))
    }

    /// Writes `content` under `name`, replacing any file with that name.
    ///
    /// The document is staged in a temporary file inside the store and renamed
    /// into place, so a half-written artifact never carries the final name.
    pub fn write(&self, name: &str, content: &str) -> Result<PathBuf> {
        let path = self.dir.join(name);
        let mut staged =
            NamedTempFile::new_in(&self.dir).map_err(|err| IngestError::persistence(&path, err))?;
        staged
            .write_all(content.as_bytes())
            .and_then(|_| staged.flush())
            .map_err(|err| IngestError::persistence(&path, err))?;
        staged
            .persist(&path)
            .map_err(|err| IngestError::persistence(&path, err.error))?;
        tracing::debug!(path = %path.display(), bytes = content.len(), "artifact written");
        Ok(path)
    }
}
