//! Review request generation for the review agent
//!
//! A `ReviewRequest` collects what the agent needs to review one pull request
//! (title, description, changed files with their patches) and renders it into
//! a prompt that asks for a JSON [`ReviewArtifact`](crate::model::ReviewArtifact).

use serde::{Deserialize, Serialize};

use crate::event::WebhookEvent;
use crate::model::ChangedFile;

/// Focus areas every review covers
const FOCUS_AREAS: &[&str] = &[
    "Correctness of the change",
    "Error handling and edge cases",
    "Security considerations",
    "Readability and maintainability",
];

/// A structured review request for the review agent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewRequest {
    /// `owner/name` of the repository
    pub repository: String,
    /// PR number
    pub pr_number: u64,
    /// PR title
    pub title: String,
    /// PR description
    pub description: Option<String>,
    /// Changed files, in platform order
    pub files: Vec<ChangedFile>,
    /// Whether per-line comments may be returned
    pub inline_suggestions: bool,
}

impl ReviewRequest {
    /// Create a request for `pr_number` in `repository`
    pub fn new(repository: impl Into<String>, pr_number: u64) -> Self {
        Self {
            repository: repository.into(),
            pr_number,
            title: String::new(),
            description: None,
            files: Vec::new(),
            inline_suggestions: true,
        }
    }

    /// Build a request from a pull request event and its change set
    pub fn from_event(
        event: &WebhookEvent,
        files: &[ChangedFile],
        inline_suggestions: bool,
    ) -> Self {
        let mut request = Self::new(
            event.repository.full_name.clone(),
            event.pr_number().unwrap_or_default(),
        )
        .with_files(files.to_vec())
        .with_inline_suggestions(inline_suggestions);

        if let Some(pr) = &event.pull_request {
            request = request.with_title(pr.title.clone());
            if let Some(body) = pr.body.as_deref().filter(|b| !b.trim().is_empty()) {
                request = request.with_description(body);
            }
        }

        request
    }

    /// Set the PR title
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Set the PR description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the changed files
    pub fn with_files(mut self, files: Vec<ChangedFile>) -> Self {
        self.files = files;
        self
    }

    /// Enable or disable per-line comments
    pub fn with_inline_suggestions(mut self, enabled: bool) -> Self {
        self.inline_suggestions = enabled;
        self
    }

    /// Generate the review prompt for the review agent
    pub fn to_prompt(&self) -> String {
        let mut prompt = String::new();

        // Header
        prompt.push_str(&format!(
            "# Code Review Request: {} #{}\n\n",
            self.repository, self.pr_number
        ));

        if !self.title.is_empty() {
            prompt.push_str(&format!("## Title\n\n{}\n\n", self.title));
        }

        if let Some(ref description) = self.description {
            prompt.push_str("## Description\n\n");
            prompt.push_str(description);
            prompt.push_str("\n\n");
        }

        // Focus areas
        prompt.push_str("## Focus Areas\n\n");
        for area in FOCUS_AREAS {
            prompt.push_str(&format!("- {}\n", area));
        }
        prompt.push('\n');

        // Changes
        prompt.push_str("## Changed Files\n\n");
        if self.files.is_empty() {
            prompt.push_str("No files changed.\n\n");
        }
        for file in &self.files {
            match &file.previous_path {
                Some(previous) => prompt.push_str(&format!(
                    "### `{}` ({} from `{}`, +{} -{})\n\n",
                    file.path, file.status, previous, file.additions, file.deletions
                )),
                None => prompt.push_str(&format!(
                    "### `{}` ({}, +{} -{})\n\n",
                    file.path, file.status, file.additions, file.deletions
                )),
            }
            match &file.patch {
                Some(patch) => {
                    prompt.push_str("```diff\n");
                    prompt.push_str(patch);
                    prompt.push_str("\n```\n\n");
                }
                None => prompt.push_str("_No textual diff (binary or too large)._\n\n"),
            }
        }

        // Expected output format
        prompt.push_str("## Expected Output Format\n\n");
        prompt.push_str("Respond with a single JSON object and nothing else:\n\n");
        prompt.push_str("```json\n");
        prompt.push_str("{\n");
        prompt.push_str("  \"summary\": \"Markdown summary of the review\",\n");
        prompt.push_str("  \"verdict\": \"comment | approve | request_changes\",\n");
        prompt.push_str(
            "  \"comments\": [{\"path\": \"file path\", \"line\": 1, \"body\": \"comment\"}]\n",
        );
        prompt.push_str("}\n");
        prompt.push_str("```\n\n");

        if self.inline_suggestions {
            prompt.push_str(
                "Anchor each comment to a line on the new side of the diff of a listed file.\n",
            );
        } else {
            prompt.push_str("Inline comments are disabled: leave `comments` empty.\n");
        }

        prompt
    }
}
