//! Upload intake: validates an incoming file and lands it in the upload
//! directory, handing back a storage handle for the registry.

mod sanitize;

pub use sanitize::sanitize_filename;

use bytes::Bytes;
use chrono::Utc;
use classcast_registry::StorageHandle;
use futures::{Stream, StreamExt};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::config::settings::StorageConfig;

const MAX_NAME_ATTEMPTS: i64 = 16;

#[derive(Error, Debug)]
pub enum IntakeError {
    #[error("Invalid file type {0:?}. Only PDF, PPTX, PNG, JPEG allowed.")]
    UnsupportedType(String),

    #[error("File too large (limit {limit} bytes).")]
    TooLarge { limit: u64 },

    #[error("Cannot upload zero-byte file.")]
    Empty,

    #[error("Upload interrupted: {0}")]
    Stream(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

#[derive(Debug, Clone)]
pub struct UploadStore {
    dir: PathBuf,
    max_bytes: u64,
    allowed_mime: Vec<String>,
}

/// A file written to disk but not yet owned by a session.
///
/// Dropping it deletes the file; `commit` hands ownership to the caller.
#[derive(Debug)]
pub struct StagedUpload {
    pub handle: StorageHandle,
    pub stored_name: String,
    pub original_name: String,
    pub size: u64,
    pub mime_type: String,
    armed: bool,
}

impl StagedUpload {
    pub fn commit(mut self) -> StorageHandle {
        self.armed = false;
        self.handle.clone()
    }
}

impl Drop for StagedUpload {
    fn drop(&mut self) {
        if self.armed {
            remove_quietly(self.handle.path());
        }
    }
}

impl UploadStore {
    pub fn new(cfg: &StorageConfig) -> Self {
        Self {
            dir: PathBuf::from(&cfg.upload_dir),
            max_bytes: cfg.max_upload_bytes,
            allowed_mime: cfg.allowed_mime_types.clone(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    pub fn accepts(&self, mime_type: &str) -> bool {
        self.allowed_mime.iter().any(|m| m.eq_ignore_ascii_case(mime_type))
    }

    /// Creates the upload directory and clears files left by a previous run.
    ///
    /// Sessions do not survive a restart, so nothing could ever claim or
    /// sweep those files.
    pub async fn prepare(&self) -> io::Result<usize> {
        fs::create_dir_all(&self.dir).await?;

        let mut removed = 0;
        let mut entries = fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                match fs::remove_file(entry.path()).await {
                    Ok(()) => removed += 1,
                    Err(e) => warn!("Failed to remove stale upload {:?}: {}", entry.path(), e),
                }
            }
        }

        if removed > 0 {
            info!("Removed {} stale uploads from {:?}", removed, self.dir);
        }
        Ok(removed)
    }

    /// Streams `body` to a fresh file, enforcing type, size and non-emptiness.
    pub async fn store<S>(
        &self,
        original_name: &str,
        mime_type: &str,
        body: S,
    ) -> Result<StagedUpload, IntakeError>
    where
        S: Stream<Item = Result<Bytes, IntakeError>>,
    {
        if !self.accepts(mime_type) {
            return Err(IntakeError::UnsupportedType(mime_type.to_string()));
        }

        let safe_name = sanitize_filename(original_name);
        let (path, stored_name, file) = self.create_unique(&safe_name).await?;

        let mut staged = StagedUpload {
            handle: StorageHandle::new(path),
            stored_name,
            original_name: original_name.to_string(),
            size: 0,
            mime_type: mime_type.to_string(),
            armed: true,
        };

        staged.size = self.copy_limited(body, file).await?;
        if staged.size == 0 {
            return Err(IntakeError::Empty);
        }

        debug!(
            "Stored {} ({} bytes) as {}",
            staged.original_name, staged.size, staged.stored_name
        );
        Ok(staged)
    }

    async fn create_unique(&self, safe_name: &str) -> io::Result<(PathBuf, String, File)> {
        let stamp = Utc::now().timestamp_millis();

        for bump in 0..MAX_NAME_ATTEMPTS {
            let stored_name = format!("{}_{}", stamp + bump, safe_name);
            let path = self.dir.join(&stored_name);
            match OpenOptions::new().write(true).create_new(true).open(&path).await {
                Ok(file) => return Ok((path, stored_name, file)),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e),
            }
        }

        Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("no free file name for {}", safe_name),
        ))
    }

    async fn copy_limited<S>(&self, body: S, mut file: File) -> Result<u64, IntakeError>
    where
        S: Stream<Item = Result<Bytes, IntakeError>>,
    {
        let mut body = std::pin::pin!(body);
        let mut written: u64 = 0;

        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            written += chunk.len() as u64;
            if written > self.max_bytes {
                return Err(IntakeError::TooLarge {
                    limit: self.max_bytes,
                });
            }
            file.write_all(&chunk).await?;
        }

        file.flush().await?;
        Ok(written)
    }
}

fn remove_quietly(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => debug!("Discarded staged upload {:?}", path),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to discard staged upload {:?}: {}", path, e),
    }
}
