//! Storage service seam.
//!
//! The invoker only ever downloads through [`StorageConnector`]; the real
//! service sits behind it, and [`super::FsStorage`] implements it over a local
//! directory tree.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use judge_protocol::ResourceKind;
use thiserror::Error;

/// A download from storage into a local folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    pub resource: ResourceKind,
    pub problem_id: u64,
    pub submit_id: u64,
    pub test_id: u64,
    /// Folder the file is written into; created by the connector.
    pub download_folder: PathBuf,
}

/// What storage wrote into the download folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadResponse {
    /// File name relative to the download folder.
    pub filename: String,
    /// Size in bytes.
    pub size: u64,
}

/// Errors from storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("file not found in storage")]
    NotFound,

    #[error("storage transport error: {0}")]
    Transport(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Download access to the storage service.
pub trait StorageConnector: Send + Sync {
    fn download(&self, request: &DownloadRequest) -> Result<DownloadResponse, StorageError>;
}

impl<T: StorageConnector + ?Sized> StorageConnector for Arc<T> {
    fn download(&self, request: &DownloadRequest) -> Result<DownloadResponse, StorageError> {
        (**self).download(request)
    }
}
