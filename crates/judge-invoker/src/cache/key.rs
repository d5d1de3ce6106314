//! Cache keys for storage artifacts.

use std::path::PathBuf;

use judge_protocol::ResourceKind;

/// Identifies one artifact as fetched under one epoch.
///
/// Identifiers that do not scope the resource kind are zeroed on
/// construction, so two requests for the same checker from different
/// submissions resolve to the same key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub resource: ResourceKind,
    pub problem_id: u64,
    pub submit_id: u64,
    pub test_id: u64,
    pub epoch: u64,
}

impl CacheKey {
    pub fn new(resource: ResourceKind, problem_id: u64, submit_id: u64, test_id: u64, epoch: u64) -> Self {
        let (problem_id, submit_id, test_id) = match resource {
            ResourceKind::SourceCode | ResourceKind::CompiledBinary | ResourceKind::CompileOutput => {
                (0, submit_id, 0)
            }
            ResourceKind::Checker | ResourceKind::Interactor => (problem_id, 0, 0),
            ResourceKind::TestInput | ResourceKind::TestAnswer => (problem_id, 0, test_id),
            ResourceKind::TestOutput | ResourceKind::TestStderr | ResourceKind::CheckerOutput => {
                (problem_id, submit_id, test_id)
            }
        };
        Self {
            resource,
            problem_id,
            submit_id,
            test_id,
            epoch,
        }
    }
}

/// A locally materialized artifact owned by the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// Absolute path of the downloaded file.
    pub path: PathBuf,
    /// Size in bytes.
    pub size: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checker_key_ignores_submission() {
        let a = CacheKey::new(ResourceKind::Checker, 5, 10, 3, 0);
        let b = CacheKey::new(ResourceKind::Checker, 5, 11, 0, 0);
        assert_eq!(a, b);
        assert_eq!(a.submit_id, 0);
    }

    #[test]
    fn test_source_key_ignores_problem() {
        let a = CacheKey::new(ResourceKind::SourceCode, 1, 42, 0, 0);
        let b = CacheKey::new(ResourceKind::SourceCode, 2, 42, 0, 0);
        assert_eq!(a, b);
    }

    #[test]
    fn test_epoch_distinguishes_keys() {
        let a = CacheKey::new(ResourceKind::TestInput, 1, 0, 4, 1);
        let b = CacheKey::new(ResourceKind::TestInput, 1, 0, 4, 2);
        assert_ne!(a, b);
    }
}
