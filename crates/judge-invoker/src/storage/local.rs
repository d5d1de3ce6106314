//! Filesystem-backed storage connector.
//!
//! Layout: `<root>/<ResourceKind>/<scope>/<file>`, one file per scope
//! directory, with the same scope segments the cache uses. Downloads copy
//! through a temp file and rename into place.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use judge_protocol::ResourceKind;

use super::connector::{DownloadRequest, DownloadResponse, StorageConnector, StorageError};
use super::fetch::scope_segment;

/// Storage service stand-in reading from a local directory tree.
#[derive(Debug, Clone)]
pub struct FsStorage {
    root: PathBuf,
}

impl FsStorage {
    /// Open a store rooted at `root`, creating it if needed.
    pub fn new(root: impl AsRef<Path>) -> io::Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resource_dir(&self, resource: ResourceKind, problem_id: u64, submit_id: u64, test_id: u64) -> PathBuf {
        let dir = self.root.join(resource.as_str());
        match scope_segment(resource, problem_id, submit_id, test_id) {
            Some(scope) => dir.join(scope),
            None => dir.join(format!("{}-{}-{}", problem_id, submit_id, test_id)),
        }
    }

    /// Store `contents` as the single file for a resource, replacing any
    /// previous file.
    pub fn put(
        &self,
        resource: ResourceKind,
        problem_id: u64,
        submit_id: u64,
        test_id: u64,
        filename: &str,
        contents: &[u8],
    ) -> io::Result<PathBuf> {
        let dir = self.resource_dir(resource, problem_id, submit_id, test_id);
        if dir.exists() {
            fs::remove_dir_all(&dir)?;
        }
        fs::create_dir_all(&dir)?;
        let path = dir.join(filename);
        fs::write(&path, contents)?;
        Ok(path)
    }

    fn stored_file(dir: &Path) -> Result<PathBuf, StorageError> {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(StorageError::NotFound),
            Err(e) => return Err(StorageError::Io(e)),
        };

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                files.push(entry.path());
            }
        }
        files.sort();
        files.into_iter().next().ok_or(StorageError::NotFound)
    }
}

impl StorageConnector for FsStorage {
    fn download(&self, request: &DownloadRequest) -> Result<DownloadResponse, StorageError> {
        let dir = self.resource_dir(request.resource, request.problem_id, request.submit_id, request.test_id);
        let source = Self::stored_file(&dir)?;
        let filename = source
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
            .ok_or(StorageError::NotFound)?;

        fs::create_dir_all(&request.download_folder)?;

        let temp_path = request.download_folder.join(format!(
            ".tmp.{}.{}",
            std::process::id(),
            SystemTime::now()
                .duration_since(SystemTime::UNIX_EPOCH)
                .map(|d| d.as_nanos())
                .unwrap_or(0)
        ));
        let size = match fs::copy(&source, &temp_path) {
            Ok(size) => size,
            Err(e) => {
                let _ = fs::remove_file(&temp_path);
                return Err(StorageError::Io(e));
            }
        };

        let final_path = request.download_folder.join(&filename);
        if let Err(e) = fs::rename(&temp_path, &final_path) {
            let _ = fs::remove_file(&temp_path);
            return Err(StorageError::Io(e));
        }

        Ok(DownloadResponse { filename, size })
    }
}
