//! Resource fetch adapter.
//!
//! Turns a [`CacheKey`] into a storage download under the epoch's cache
//! directory and reports the result in the shape the cache expects.
//!
//! On-disk layout: `<cache_root>/<epoch>/<ResourceKind>/<scope>/<file>` where
//! scope is the submission id for submission-scoped kinds, the problem id for
//! checkers and interactors, and `<problem>-<test>` for test data.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use judge_protocol::ResourceKind;
use thiserror::Error;

use super::connector::{DownloadRequest, StorageConnector, StorageError};
use crate::cache::{CacheEntry, CacheKey, CacheLoader, Loaded};

/// Why an artifact could not be fetched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("{resource} does not exist in storage")]
    NotFound { resource: ResourceKind },

    #[error("failed to fetch {resource}: {message}")]
    Transport { resource: ResourceKind, message: String },
}

impl FetchError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Directory segment that scopes a resource, or `None` for kinds that are
/// never fetched into the cache.
pub fn scope_segment(resource: ResourceKind, problem_id: u64, submit_id: u64, test_id: u64) -> Option<String> {
    match resource {
        ResourceKind::SourceCode | ResourceKind::CompiledBinary | ResourceKind::CompileOutput => {
            Some(submit_id.to_string())
        }
        ResourceKind::Checker | ResourceKind::Interactor => Some(problem_id.to_string()),
        ResourceKind::TestInput | ResourceKind::TestAnswer => Some(format!("{}-{}", problem_id, test_id)),
        ResourceKind::TestOutput | ResourceKind::TestStderr | ResourceKind::CheckerOutput => None,
    }
}

/// Folder a key is downloaded into.
///
/// # Panics
///
/// Panics for resource kinds that have no cache layout. Such a key can only
/// come from a programming error, and continuing would break the layout
/// invariants the cache relies on.
pub fn download_folder(cache_root: &Path, key: &CacheKey) -> PathBuf {
    let Some(scope) = scope_segment(key.resource, key.problem_id, key.submit_id, key.test_id) else {
        tracing::error!(resource = %key.resource, "resource kind has no cache layout");
        panic!("cannot build download folder for resource kind {}", key.resource);
    };
    cache_root
        .join(key.epoch.to_string())
        .join(key.resource.as_str())
        .join(scope)
}

/// Cache loader backed by a storage connector.
pub struct ResourceFetcher {
    cache_root: PathBuf,
    connector: Arc<dyn StorageConnector>,
}

impl ResourceFetcher {
    pub fn new(cache_root: impl Into<PathBuf>, connector: Arc<dyn StorageConnector>) -> Self {
        Self {
            cache_root: cache_root.into(),
            connector,
        }
    }

    pub fn cache_root(&self) -> &Path {
        &self.cache_root
    }

    fn request_for(&self, key: &CacheKey) -> DownloadRequest {
        DownloadRequest {
            resource: key.resource,
            problem_id: key.problem_id,
            submit_id: key.submit_id,
            test_id: key.test_id,
            download_folder: download_folder(&self.cache_root, key),
        }
    }
}

impl CacheLoader<CacheKey, CacheEntry> for ResourceFetcher {
    type Error = FetchError;

    fn load(&self, key: &CacheKey) -> Result<Loaded<CacheEntry>, FetchError> {
        let request = self.request_for(key);
        tracing::debug!(key = ?key, folder = %request.download_folder.display(), "downloading resource");

        match self.connector.download(&request) {
            Ok(response) => {
                let path = request.download_folder.join(&response.filename);
                Ok(Loaded {
                    value: CacheEntry {
                        path,
                        size: response.size,
                    },
                    size: response.size,
                })
            }
            Err(StorageError::NotFound) => {
                tracing::debug!(key = ?key, "resource does not exist in storage");
                Err(FetchError::NotFound { resource: key.resource })
            }
            Err(e) => {
                tracing::warn!(key = ?key, error = %e, "resource download failed");
                // Don't leave a half-written folder behind; a later get retries into it.
                if let Err(cleanup) = fs::remove_dir_all(&request.download_folder) {
                    if cleanup.kind() != io::ErrorKind::NotFound {
                        tracing::error!(
                            folder = %request.download_folder.display(),
                            error = %cleanup,
                            "cannot remove folder of failed download"
                        );
                    }
                }
                Err(FetchError::Transport {
                    resource: key.resource,
                    message: e.to_string(),
                })
            }
        }
    }

    fn clean_up(&self, key: &CacheKey, entry: &CacheEntry) {
        let Some(folder) = entry.path.parent() else {
            return;
        };
        if let Err(e) = fs::remove_dir_all(folder) {
            tracing::error!(
                key = ?key,
                file = %entry.path.display(),
                error = %e,
                "cannot clean up evicted resource"
            );
        }
    }
}
