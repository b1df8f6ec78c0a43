use std::io;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use thiserror::Error;
use time::OffsetDateTime;

use crate::config::UploadConfig;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UploadRejected {
    #[error("file has no extension; allowed: {allowed}")]
    MissingExtension { allowed: String },
    #[error("file type .{extension} is not allowed; allowed: {allowed}")]
    DisallowedExtension { extension: String, allowed: String },
    #[error("file is {size} bytes, the limit is {max} bytes")]
    TooLarge { size: usize, max: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub path: PathBuf,
    pub sha256: String,
}

/// Uploaded documents on local disk, laid out as
/// `{root}/{company_id}/{worker_id}/{unix_nanos}_{filename}`.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
    max_file_size: usize,
    allowed_extensions: Vec<String>,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>, max_file_size: usize, allowed_extensions: Vec<String>) -> Self {
        Self {
            root: root.into(),
            max_file_size,
            allowed_extensions,
        }
    }

    pub fn from_config(config: &UploadConfig) -> Self {
        Self::new(&config.dir, config.max_file_size, config.allowed_extensions.clone())
    }

    /// Extension and size checks, run before anything is written.
    pub fn check(&self, filename: &str, size: usize) -> Result<(), UploadRejected> {
        let allowed = self.allowed_extensions.join(", ");
        let extension = extension_of(filename).ok_or_else(|| UploadRejected::MissingExtension {
            allowed: allowed.clone(),
        })?;

        if !self.allowed_extensions.iter().any(|e| *e == extension) {
            return Err(UploadRejected::DisallowedExtension { extension, allowed });
        }
        if size > self.max_file_size {
            return Err(UploadRejected::TooLarge {
                size,
                max: self.max_file_size,
            });
        }
        Ok(())
    }

    pub async fn save(
        &self,
        company_id: i64,
        worker_id: i64,
        filename: &str,
        bytes: &[u8],
    ) -> io::Result<StoredFile> {
        let dir = self
            .root
            .join(company_id.to_string())
            .join(worker_id.to_string());
        tokio::fs::create_dir_all(&dir).await?;

        let stamp = OffsetDateTime::now_utc().unix_timestamp_nanos();
        let path = dir.join(format!("{}_{}", stamp, sanitize_filename(filename)));
        tokio::fs::write(&path, bytes).await?;

        tracing::debug!(path = %path.display(), size = bytes.len(), "stored upload");

        Ok(StoredFile {
            path,
            sha256: sha256_hex(bytes),
        })
    }

    pub async fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        if !path.starts_with(&self.root) {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "path outside the upload directory",
            ));
        }
        tokio::fs::read(path).await
    }

    /// Best-effort removal of a file whose row was never committed.
    pub async fn remove(&self, path: &Path) {
        if let Err(e) = tokio::fs::remove_file(path).await {
            tracing::warn!(path = %path.display(), "Failed to remove orphaned upload: {}", e);
        }
    }
}

/// Lowercased extension without the dot.
pub fn extension_of(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty())
        .map(str::to_ascii_lowercase)
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);

    let sanitized: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();

    let sanitized = sanitized.trim_matches('.');
    if sanitized.is_empty() {
        return "unnamed".to_string();
    }

    sanitized.chars().take(200).collect()
}
