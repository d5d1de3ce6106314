//! Resource kinds known to the storage service.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Category of artifact held by storage.
///
/// The first seven kinds are fetched and cached by invokers. The remaining
/// kinds are only ever uploaded by invokers and have no cache layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    SourceCode,
    CompiledBinary,
    CompileOutput,
    Checker,
    Interactor,
    TestInput,
    TestAnswer,
    TestOutput,
    TestStderr,
    CheckerOutput,
}

impl ResourceKind {
    /// Kinds an invoker may fetch into its cache.
    pub const CACHEABLE: [ResourceKind; 7] = [
        Self::SourceCode,
        Self::CompiledBinary,
        Self::CompileOutput,
        Self::Checker,
        Self::Interactor,
        Self::TestInput,
        Self::TestAnswer,
    ];

    /// Stable name, also used as a directory name on disk.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SourceCode => "SourceCode",
            Self::CompiledBinary => "CompiledBinary",
            Self::CompileOutput => "CompileOutput",
            Self::Checker => "Checker",
            Self::Interactor => "Interactor",
            Self::TestInput => "TestInput",
            Self::TestAnswer => "TestAnswer",
            Self::TestOutput => "TestOutput",
            Self::TestStderr => "TestStderr",
            Self::CheckerOutput => "CheckerOutput",
        }
    }

    /// Whether the kind is scoped by submission.
    pub fn is_submission_scoped(&self) -> bool {
        matches!(self, Self::SourceCode | Self::CompiledBinary | Self::CompileOutput)
    }

    /// Whether the kind is scoped by a (problem, test) pair.
    pub fn is_test_scoped(&self) -> bool {
        matches!(self, Self::TestInput | Self::TestAnswer)
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
