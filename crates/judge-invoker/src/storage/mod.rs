//! Invoker storage: epoch-scoped artifact cache in front of the storage service.
//!
//! `InvokerStorage` owns the on-disk cache root. The root is wiped when the
//! storage is created and removed on [`InvokerStorage::shutdown`]; in between
//! only the cache's eviction path deletes anything under it.
//!
//! Every getter builds its key with the epoch current at call time, so after
//! a reset new fetches land in a fresh `<root>/<epoch>/` namespace while
//! entries from older epochs simply age out of the LRU.

mod connector;
mod fetch;
mod local;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use judge_protocol::ResourceKind;

use crate::cache::{CacheEntry, CacheKey, CacheStats, LruSizeCache};
use crate::epoch::EpochHolder;

pub use connector::{DownloadRequest, DownloadResponse, StorageConnector, StorageError};
pub use fetch::{download_folder, scope_segment, FetchError, ResourceFetcher};
pub use local::FsStorage;

/// Artifact cache of one invoker process.
pub struct InvokerStorage {
    cache_root: PathBuf,
    epoch: Arc<EpochHolder>,
    cache: LruSizeCache<CacheKey, CacheEntry, ResourceFetcher>,
}

impl InvokerStorage {
    /// Create the storage, discarding anything a previous run left under
    /// `cache_root`.
    ///
    /// # Panics
    ///
    /// Panics if the cache root cannot be cleared or created. The invoker
    /// cannot run without exclusive ownership of that directory.
    pub fn new(
        cache_root: impl Into<PathBuf>,
        size_limit: u64,
        connector: Arc<dyn StorageConnector>,
        epoch: Arc<EpochHolder>,
    ) -> Self {
        let cache_root = cache_root.into();

        match fs::remove_dir_all(&cache_root) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::error!(path = %cache_root.display(), error = %e, "cannot clean up previous cache");
                panic!("can not clean up previous cache at {}: {}", cache_root.display(), e);
            }
        }
        if let Err(e) = fs::create_dir_all(&cache_root) {
            tracing::error!(path = %cache_root.display(), error = %e, "cannot create cache directory");
            panic!("can not create cache directory {}: {}", cache_root.display(), e);
        }

        let fetcher = ResourceFetcher::new(cache_root.clone(), connector);
        tracing::info!(path = %cache_root.display(), size_limit, "created invoker storage");

        Self {
            cache_root,
            epoch,
            cache: LruSizeCache::new(size_limit, fetcher),
        }
    }

    /// Fetch any cacheable resource under the current epoch.
    pub fn get(
        &self,
        resource: ResourceKind,
        problem_id: u64,
        submit_id: u64,
        test_id: u64,
    ) -> Result<CacheEntry, FetchError> {
        let key = CacheKey::new(resource, problem_id, submit_id, test_id, self.epoch.current());
        self.cache.get(&key)
    }

    pub fn source(&self, submit_id: u64) -> Result<CacheEntry, FetchError> {
        self.get(ResourceKind::SourceCode, 0, submit_id, 0)
    }

    pub fn binary(&self, submit_id: u64) -> Result<CacheEntry, FetchError> {
        self.get(ResourceKind::CompiledBinary, 0, submit_id, 0)
    }

    pub fn compile_output(&self, submit_id: u64) -> Result<CacheEntry, FetchError> {
        self.get(ResourceKind::CompileOutput, 0, submit_id, 0)
    }

    pub fn checker(&self, problem_id: u64) -> Result<CacheEntry, FetchError> {
        self.get(ResourceKind::Checker, problem_id, 0, 0)
    }

    /// Interactive problems only; `NotFound` means the problem has none.
    pub fn interactor(&self, problem_id: u64) -> Result<CacheEntry, FetchError> {
        self.get(ResourceKind::Interactor, problem_id, 0, 0)
    }

    pub fn test_input(&self, problem_id: u64, test_id: u64) -> Result<CacheEntry, FetchError> {
        self.get(ResourceKind::TestInput, problem_id, 0, test_id)
    }

    pub fn test_answer(&self, problem_id: u64, test_id: u64) -> Result<CacheEntry, FetchError> {
        self.get(ResourceKind::TestAnswer, problem_id, 0, test_id)
    }

    /// Move to a new epoch. Cached entries are left to age out.
    ///
    /// An [`Invoker`](crate::invoker::Invoker) resets through its job
    /// registry instead, which bumps the same holder under the job lock.
    pub fn reset(&self) -> u64 {
        self.epoch.reset()
    }

    pub fn current_epoch(&self) -> u64 {
        self.epoch.current()
    }

    pub fn epoch(&self) -> &Arc<EpochHolder> {
        &self.epoch
    }

    pub fn cache_root(&self) -> &Path {
        &self.cache_root
    }

    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Whether the artifact for `key` is resident.
    pub fn is_cached(&self, key: &CacheKey) -> bool {
        self.cache.contains(key)
    }

    /// Remove the whole cache root. Called once on process shutdown.
    pub fn shutdown(&self) {
        match fs::remove_dir_all(&self.cache_root) {
            Ok(()) => tracing::info!(path = %self.cache_root.display(), "removed invoker cache"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => tracing::error!(
                path = %self.cache_root.display(),
                error = %e,
                "cannot remove invoker cache"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup(size_limit: u64) -> (TempDir, FsStorage, InvokerStorage) {
        let temp_dir = TempDir::new().unwrap();
        let remote = FsStorage::new(temp_dir.path().join("storage")).unwrap();
        let storage = InvokerStorage::new(
            temp_dir.path().join("cache"),
            size_limit,
            Arc::new(remote.clone()),
            Arc::new(EpochHolder::with_instance("test")),
        );
        (temp_dir, remote, storage)
    }

    #[test]
    fn test_new_clears_previous_run() {
        let temp_dir = TempDir::new().unwrap();
        let cache_root = temp_dir.path().join("cache");
        fs::create_dir_all(cache_root.join("0/Checker/1")).unwrap();
        fs::write(cache_root.join("0/Checker/1/check"), b"stale").unwrap();

        let remote = FsStorage::new(temp_dir.path().join("storage")).unwrap();
        let _storage = InvokerStorage::new(&cache_root, 100, Arc::new(remote), Arc::new(EpochHolder::new()));

        assert!(cache_root.exists());
        assert_eq!(fs::read_dir(&cache_root).unwrap().count(), 0);
    }

    #[test]
    fn test_checker_path_is_problem_scoped() {
        let (_temp, remote, storage) = setup(1024);
        remote.put(ResourceKind::Checker, 5, 0, 0, "check", b"#!/bin/true").unwrap();

        let entry = storage.checker(5).unwrap();
        let relative = entry.path.strip_prefix(storage.cache_root()).unwrap();
        assert_eq!(relative, Path::new("0/Checker/5/check"));
        assert_eq!(entry.size, 11);
    }

    #[test]
    fn test_missing_answer_is_not_found_and_not_cached() {
        let (_temp, _remote, storage) = setup(1024);

        let err = storage.test_answer(1, 1).unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(storage.stats().entries, 0);
    }

    #[test]
    fn test_reset_fetches_into_new_namespace() {
        let (_temp, remote, storage) = setup(1024);
        remote.put(ResourceKind::TestInput, 2, 0, 1, "01", b"abc").unwrap();

        let before = storage.test_input(2, 1).unwrap();
        assert_eq!(storage.reset(), 1);
        let after = storage.test_input(2, 1).unwrap();

        assert_ne!(before.path, after.path);
        assert!(after.path.starts_with(storage.cache_root().join("1")));
        // The old entry is still resident and untouched.
        assert!(before.path.exists());
        assert!(storage.is_cached(&CacheKey::new(ResourceKind::TestInput, 2, 0, 1, 0)));
        assert_eq!(storage.stats().entries, 2);
    }

    #[test]
    fn test_eviction_removes_files() {
        let (_temp, remote, storage) = setup(100);
        remote.put(ResourceKind::SourceCode, 0, 1, 0, "a.cpp", &[b'a'; 60]).unwrap();
        remote.put(ResourceKind::SourceCode, 0, 2, 0, "b.cpp", &[b'b'; 60]).unwrap();

        let a = storage.source(1).unwrap();
        let b = storage.source(2).unwrap();

        assert!(!a.path.exists());
        assert!(b.path.exists());
        assert_eq!(storage.stats().total_size, 60);
    }

    #[test]
    fn test_shutdown_removes_root() {
        let (_temp, remote, storage) = setup(100);
        remote.put(ResourceKind::Checker, 1, 0, 0, "check", b"x").unwrap();
        storage.checker(1).unwrap();

        storage.shutdown();
        assert!(!storage.cache_root().exists());
    }
}
