//! Changed files and review artifacts

use serde::{Deserialize, Serialize};

/// How a file was touched by a pull request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Added,
    Modified,
    Removed,
    Renamed,
    Copied,
    Changed,
    Unchanged,
}

impl std::fmt::Display for FileStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FileStatus::Added => "added",
            FileStatus::Modified => "modified",
            FileStatus::Removed => "removed",
            FileStatus::Renamed => "renamed",
            FileStatus::Copied => "copied",
            FileStatus::Changed => "changed",
            FileStatus::Unchanged => "unchanged",
        };
        write!(f, "{}", s)
    }
}

/// One file touched by a pull request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangedFile {
    /// Path after the change
    pub path: String,
    /// Path before a rename or copy
    pub previous_path: Option<String>,
    /// Kind of change
    pub status: FileStatus,
    /// Unified diff hunk; absent for binary or oversized files
    pub patch: Option<String>,
    /// Lines added
    pub additions: u64,
    /// Lines removed
    pub deletions: u64,
    /// Total lines changed
    pub changes: u64,
}

impl ChangedFile {
    /// A file record with no line counts or patch
    pub fn new(path: impl Into<String>, status: FileStatus) -> Self {
        Self {
            path: path.into(),
            previous_path: None,
            status,
            patch: None,
            additions: 0,
            deletions: 0,
            changes: 0,
        }
    }

    /// Attach a patch
    pub fn with_patch(mut self, patch: impl Into<String>) -> Self {
        self.patch = Some(patch.into());
        self
    }
}

/// Overall outcome a review submits
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewVerdict {
    #[default]
    Comment,
    Approve,
    RequestChanges,
}

/// A comment anchored to one line of the new side of a diff
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineComment {
    /// File path
    pub path: String,
    /// Line number in the new version of the file
    pub line: u64,
    /// Comment text
    pub body: String,
}

/// Result of review generation
///
/// The dispatcher hands this from generator to publisher without looking
/// inside it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewArtifact {
    /// Review summary body
    #[serde(default)]
    pub summary: String,
    /// Overall verdict
    #[serde(default)]
    pub verdict: ReviewVerdict,
    /// Per-line comments
    #[serde(default)]
    pub comments: Vec<InlineComment>,
}
