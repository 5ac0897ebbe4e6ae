//! Review agent invocation
//!
//! `AgentReviewGenerator` renders a [`ReviewRequest`] into a prompt, runs the
//! claude CLI in print mode, and parses the JSON review it answers with.

use std::collections::HashSet;
use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::config::ReviewConfig;
use crate::event::WebhookEvent;
use crate::model::{ChangedFile, ReviewArtifact};
use crate::pipeline::ReviewGenerator;
use crate::{Error, Result};

use super::ReviewRequest;

/// Final message of `claude --print --output-format json`
#[derive(Debug, Deserialize)]
struct AgentOutput {
    #[serde(default)]
    is_error: bool,
    #[serde(default)]
    result: String,
}

/// Review generator backed by the claude CLI
#[derive(Debug, Clone)]
pub struct AgentReviewGenerator {
    claude_path: String,
    model: Option<String>,
    workdir: PathBuf,
}

impl Default for AgentReviewGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentReviewGenerator {
    /// Create a generator using `claude` from PATH
    pub fn new() -> Self {
        Self {
            claude_path: "claude".to_string(),
            model: None,
            workdir: std::env::temp_dir(),
        }
    }

    /// Create a generator from review configuration
    pub fn from_config(config: &ReviewConfig) -> Self {
        let generator = Self::new().with_claude_path(config.claude_path.clone());
        match &config.model {
            Some(model) => generator.with_model(model.clone()),
            None => generator,
        }
    }

    /// Set a custom path to the claude executable
    pub fn with_claude_path(mut self, path: impl Into<String>) -> Self {
        self.claude_path = path.into();
        self
    }

    /// Use a specific model
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set the directory the agent runs in
    pub fn with_workdir(mut self, workdir: impl Into<PathBuf>) -> Self {
        self.workdir = workdir.into();
        self
    }

    /// The prompt is fed on stdin; patches easily exceed the per-argument limit
    fn build_command(&self) -> Command {
        let mut cmd = Command::new(&self.claude_path);
        cmd.arg("--print").arg("--output-format").arg("json");

        if let Some(ref model) = self.model {
            cmd.arg("--model").arg(model);
        }

        cmd.current_dir(&self.workdir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        cmd
    }

    /// Run the agent on `request` and parse its review
    pub async fn review(&self, request: &ReviewRequest) -> Result<ReviewArtifact> {
        let prompt = request.to_prompt();
        debug!(
            pr_number = request.pr_number,
            files = request.files.len(),
            prompt_len = prompt.len(),
            "Invoking review agent"
        );

        let mut child = self.build_command().spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::Generation(format!(
                    "Claude executable not found at '{}'. Is Claude Code installed?",
                    self.claude_path
                ))
            } else {
                Error::Generation(format!("Failed to run review agent: {}", e))
            }
        })?;

        // Fed concurrently with draining stdout
        let writer = child.stdin.take().map(|mut stdin| {
            tokio::spawn(async move {
                stdin.write_all(prompt.as_bytes()).await?;
                stdin.shutdown().await
            })
        });

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| Error::Generation(format!("Failed to run review agent: {}", e)))?;

        if let Some(writer) = writer {
            if let Ok(Err(e)) = writer.await {
                debug!(error = %e, "Review agent closed stdin before reading the whole prompt");
            }
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Generation(format!(
                "Review agent exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let artifact = parse_agent_output(&stdout)?;
        Ok(sanitize(artifact, &request.files, request.inline_suggestions))
    }
}

#[async_trait]
impl<C: Send + Sync> ReviewGenerator<C> for AgentReviewGenerator {
    async fn generate_review(
        &self,
        _client: &C,
        event: &WebhookEvent,
        changed_files: &[ChangedFile],
        inline_suggestions: bool,
    ) -> Result<ReviewArtifact> {
        let request = ReviewRequest::from_event(event, changed_files, inline_suggestions);
        self.review(&request).await
    }
}

/// Parse the CLI's JSON envelope and the review object inside its result text
fn parse_agent_output(stdout: &str) -> Result<ReviewArtifact> {
    let output: AgentOutput = serde_json::from_str(stdout.trim())
        .map_err(|e| Error::Generation(format!("Unparsable agent output: {}", e)))?;

    if output.is_error {
        return Err(Error::Generation(format!(
            "Review agent reported an error: {}",
            output.result
        )));
    }

    let json = extract_json_object(&output.result).ok_or_else(|| {
        Error::Generation("Agent answer contains no JSON review object".to_string())
    })?;

    serde_json::from_str(json)
        .map_err(|e| Error::Generation(format!("Invalid review object: {}", e)))
}

/// The outermost `{ ... }` span of `text`, ignoring any prose or fences around it
fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// Drop comments the platform cannot anchor or the policy forbids
fn sanitize(
    mut artifact: ReviewArtifact,
    files: &[ChangedFile],
    inline_suggestions: bool,
) -> ReviewArtifact {
    if !inline_suggestions {
        if !artifact.comments.is_empty() {
            debug!(
                dropped = artifact.comments.len(),
                "Dropping inline comments, suggestions disabled"
            );
        }
        artifact.comments.clear();
        return artifact;
    }

    let paths: HashSet<&str> = files.iter().map(|f| f.path.as_str()).collect();
    artifact.comments.retain(|comment| {
        let keep = comment.line > 0 && paths.contains(comment.path.as_str());
        if !keep {
            warn!(path = %comment.path, line = comment.line, "Dropping unanchorable comment");
        }
        keep
    });
    artifact
}
