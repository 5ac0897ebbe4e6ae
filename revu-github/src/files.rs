//! Pull request change sets

use async_trait::async_trait;
use octocrab::{Octocrab, Page};
use revu_core::{ChangeSetFetcher, ChangedFile, FileStatus};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{Error, Result};

/// Largest page the files endpoint serves
const PER_PAGE: u8 = 100;

/// One entry of `GET /repos/{owner}/{repo}/pulls/{number}/files`
#[derive(Debug, Clone, Deserialize)]
pub struct FileEntry {
    /// Path after the change
    pub filename: String,
    /// Change kind as GitHub names it
    pub status: String,
    /// Lines added
    #[serde(default)]
    pub additions: u64,
    /// Lines removed
    #[serde(default)]
    pub deletions: u64,
    /// Total lines changed
    #[serde(default)]
    pub changes: u64,
    /// Diff hunk, absent for binary or oversized files
    #[serde(default)]
    pub patch: Option<String>,
    /// Path before a rename
    #[serde(default)]
    pub previous_filename: Option<String>,
}

fn parse_status(status: &str, filename: &str) -> FileStatus {
    match status {
        "added" => FileStatus::Added,
        "modified" => FileStatus::Modified,
        "removed" => FileStatus::Removed,
        "renamed" => FileStatus::Renamed,
        "copied" => FileStatus::Copied,
        "changed" => FileStatus::Changed,
        "unchanged" => FileStatus::Unchanged,
        other => {
            warn!(status = other, file = filename, "Unknown file status, treating as changed");
            FileStatus::Changed
        }
    }
}

impl From<FileEntry> for ChangedFile {
    fn from(entry: FileEntry) -> Self {
        let status = parse_status(&entry.status, &entry.filename);

        ChangedFile {
            path: entry.filename,
            previous_path: entry.previous_filename,
            status,
            patch: entry.patch,
            additions: entry.additions,
            deletions: entry.deletions,
            changes: entry.changes,
        }
    }
}

#[derive(Serialize)]
struct PageParams {
    per_page: u8,
}

/// Every changed file of a pull request, in the order GitHub returns them
///
/// Follows pagination until the last page before returning.
pub async fn list_pr_files(
    client: &Octocrab,
    owner: &str,
    repo: &str,
    pr_number: u64,
) -> Result<Vec<ChangedFile>> {
    debug!(owner, repo, pr_number, "Fetching pull request files");

    let route = format!("/repos/{}/{}/pulls/{}/files", owner, repo, pr_number);
    let first: Page<FileEntry> = client
        .get(route, Some(&PageParams { per_page: PER_PAGE }))
        .await
        .map_err(|e| Error::or_not_found(e, Error::PrNotFound(pr_number)))?;

    let entries = client.all_pages(first).await.map_err(Error::Api)?;
    let files: Vec<ChangedFile> = entries.into_iter().map(ChangedFile::from).collect();

    info!(pr_number, count = files.len(), "Fetched pull request files");

    Ok(files)
}

/// [`ChangeSetFetcher`] over the GitHub REST API
#[derive(Debug, Clone, Copy, Default)]
pub struct GitHubChangeSetFetcher;

impl GitHubChangeSetFetcher {
    /// Create a fetcher
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ChangeSetFetcher<Octocrab> for GitHubChangeSetFetcher {
    async fn list_changed_files(
        &self,
        client: &Octocrab,
        owner: &str,
        repo: &str,
        pr_number: u64,
    ) -> revu_core::Result<Vec<ChangedFile>> {
        list_pr_files(client, owner, repo, pr_number)
            .await
            .map_err(|e| revu_core::Error::Fetch {
                pr_number,
                message: e.to_string(),
            })
    }
}
