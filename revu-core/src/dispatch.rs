//! Event dispatcher for opened pull requests
//!
//! The dispatcher drives one event through four strictly sequential stages:
//!
//! ```text
//! acquire credential -> fetch changes -> generate review -> publish review
//! ```
//!
//! A failing stage stops the pipeline for that event. Every failure is
//! logged once with the event's identifying fields and then swallowed, so
//! one bad delivery can never take down the server or another event's task.
//! Redelivered events are processed again; there is no deduplication.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::instrument::WithSubscriber;
use tracing::{debug, error, info, info_span, Instrument};

use crate::config::Config;
use crate::event::WebhookEvent;
use crate::pipeline::{ChangeSetFetcher, CredentialProvider, ReviewGenerator, ReviewPublisher};
use crate::registry::EventHandler;
use crate::Error;

/// Pipeline stage an event failed in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    AcquireCredential,
    FetchChanges,
    GenerateReview,
    PublishReview,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::AcquireCredential => "acquire_credential",
            Stage::FetchChanges => "fetch_changes",
            Stage::GenerateReview => "generate_review",
            Stage::PublishReview => "publish_review",
        };
        write!(f, "{}", s)
    }
}

/// What happened to one event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Review was published
    Published {
        /// Number of changed files reviewed
        files: usize,
    },
    /// A stage returned an error; later stages did not run
    Failed {
        /// Stage that failed
        stage: Stage,
        /// Rendered error
        error: String,
    },
    /// The pipeline task panicked
    Aborted {
        /// Panic description
        error: String,
    },
}

impl DispatchOutcome {
    /// Whether the review was published
    pub fn is_published(&self) -> bool {
        matches!(self, DispatchOutcome::Published { .. })
    }
}

/// Per-invocation review policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReviewPolicy {
    /// Whether generated reviews may carry per-line comments
    pub inline_suggestions: bool,
}

impl Default for ReviewPolicy {
    fn default() -> Self {
        Self {
            inline_suggestions: true,
        }
    }
}

impl From<&Config> for ReviewPolicy {
    fn from(config: &Config) -> Self {
        Self {
            inline_suggestions: config.review.inline_suggestions,
        }
    }
}

struct StageFailure {
    stage: Stage,
    error: Error,
}

fn at(stage: Stage) -> impl FnOnce(Error) -> StageFailure {
    move |error| StageFailure { stage, error }
}

/// Runs the review pipeline for `pull_request.opened` events
pub struct EventDispatcher<C: Send + Sync + 'static> {
    credentials: Arc<dyn CredentialProvider<Client = C>>,
    fetcher: Arc<dyn ChangeSetFetcher<C>>,
    generator: Arc<dyn ReviewGenerator<C>>,
    publisher: Arc<dyn ReviewPublisher<C>>,
    policy: ReviewPolicy,
}

impl<C: Send + Sync + 'static> Clone for EventDispatcher<C> {
    fn clone(&self) -> Self {
        Self {
            credentials: Arc::clone(&self.credentials),
            fetcher: Arc::clone(&self.fetcher),
            generator: Arc::clone(&self.generator),
            publisher: Arc::clone(&self.publisher),
            policy: self.policy,
        }
    }
}

impl<C: Send + Sync + 'static> fmt::Debug for EventDispatcher<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl<C: Send + Sync + 'static> EventDispatcher<C> {
    /// Create a dispatcher over the four pipeline stages
    pub fn new(
        credentials: Arc<dyn CredentialProvider<Client = C>>,
        fetcher: Arc<dyn ChangeSetFetcher<C>>,
        generator: Arc<dyn ReviewGenerator<C>>,
        publisher: Arc<dyn ReviewPublisher<C>>,
    ) -> Self {
        Self {
            credentials,
            fetcher,
            generator,
            publisher,
            policy: ReviewPolicy::default(),
        }
    }

    /// Set the review policy
    pub fn with_policy(mut self, policy: ReviewPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Current review policy
    pub fn policy(&self) -> ReviewPolicy {
        self.policy
    }

    /// Process one event to completion
    ///
    /// Never returns an error: failures are logged and reported through the
    /// returned outcome only.
    pub async fn dispatch(&self, event: WebhookEvent) -> DispatchOutcome {
        let pr_number = event.pr_number().unwrap_or_default();
        let repository = event.repository.full_name.clone();
        let delivery_id = event.delivery_id.clone();
        let installation_id = event.installation_id;

        let span = info_span!(
            "review",
            pr_number,
            repository = %repository,
            delivery_id = %delivery_id
        );

        // A panicking stage surfaces here as a JoinError.
        let pipeline = self.clone();
        let task = tokio::spawn(
            async move { pipeline.run(&event).await }
                .instrument(span)
                .with_current_subscriber(),
        );

        match task.await {
            Ok(Ok(files)) => {
                info!(
                    pr_number,
                    repository = %repository,
                    delivery_id = %delivery_id,
                    files,
                    "Review published"
                );
                DispatchOutcome::Published { files }
            }
            Ok(Err(StageFailure { stage, error })) => {
                error!(
                    pr_number,
                    repository = %repository,
                    delivery_id = %delivery_id,
                    installation_id = ?installation_id,
                    stage = %stage,
                    error = %error,
                    "Review pipeline failed"
                );
                DispatchOutcome::Failed {
                    stage,
                    error: error.to_string(),
                }
            }
            Err(join_error) => {
                error!(
                    pr_number,
                    repository = %repository,
                    delivery_id = %delivery_id,
                    installation_id = ?installation_id,
                    error = %join_error,
                    "Review pipeline aborted"
                );
                DispatchOutcome::Aborted {
                    error: join_error.to_string(),
                }
            }
        }
    }

    async fn run(&self, event: &WebhookEvent) -> std::result::Result<usize, StageFailure> {
        let installation_id = event.installation_id.ok_or_else(|| {
            at(Stage::AcquireCredential)(Error::Credential {
                installation_id: 0,
                message: "event carries no installation".to_string(),
            })
        })?;

        debug!(installation_id, "Acquiring installation client");
        let client = self
            .credentials
            .acquire(installation_id)
            .await
            .map_err(at(Stage::AcquireCredential))?;

        let pr = event.pull_request.as_ref().ok_or_else(|| {
            at(Stage::FetchChanges)(Error::Fetch {
                pr_number: 0,
                message: "event carries no pull request".to_string(),
            })
        })?;

        let files = self
            .fetcher
            .list_changed_files(
                &client,
                &event.repository.owner,
                &event.repository.name,
                pr.number,
            )
            .await
            .map_err(at(Stage::FetchChanges))?;
        debug!(files = files.len(), "Fetched changed files");

        let review = self
            .generator
            .generate_review(&client, event, &files, self.policy.inline_suggestions)
            .await
            .map_err(at(Stage::GenerateReview))?;
        debug!(
            comments = review.comments.len(),
            verdict = ?review.verdict,
            "Generated review"
        );

        self.publisher
            .publish_review(&client, event, &review)
            .await
            .map_err(at(Stage::PublishReview))?;

        Ok(files.len())
    }
}

#[async_trait]
impl<C: Send + Sync + 'static> EventHandler for EventDispatcher<C> {
    async fn handle(&self, event: WebhookEvent) {
        self.dispatch(event).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::fixtures::opened_event;
    use crate::model::{ChangedFile, FileStatus, InlineComment, ReviewArtifact, ReviewVerdict};
    use crate::Result;
    use std::io::Write;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    struct FakeClient {
        installation_id: u64,
    }

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Acquire(u64),
        Fetch {
            installation_id: u64,
            owner: String,
            repo: String,
            pr_number: u64,
        },
        Generate {
            pr_number: u64,
            files: Vec<ChangedFile>,
            inline: bool,
        },
        Publish {
            pr_number: u64,
            delivery_id: String,
            payload: serde_json::Value,
            review: ReviewArtifact,
        },
    }

    type Log = Arc<Mutex<Vec<Call>>>;

    /// One fake playing all four stages, failing on demand
    struct Fake {
        calls: Log,
        fail_acquire: bool,
        fail_fetch_for: Option<u64>,
        fail_generate: bool,
        fail_publish: bool,
        panic_generate: bool,
        files: Vec<ChangedFile>,
        review: ReviewArtifact,
    }

    impl Fake {
        fn new() -> Self {
            Self {
                calls: Arc::new(Mutex::new(Vec::new())),
                fail_acquire: false,
                fail_fetch_for: None,
                fail_generate: false,
                fail_publish: false,
                panic_generate: false,
                files: vec![ChangedFile::new("a.ts", FileStatus::Modified)],
                review: ReviewArtifact {
                    summary: "Looks reasonable".to_string(),
                    verdict: ReviewVerdict::Comment,
                    comments: vec![InlineComment {
                        path: "a.ts".to_string(),
                        line: 3,
                        body: "Consider a const here".to_string(),
                    }],
                },
            }
        }

        fn record(&self, call: Call) {
            self.calls.lock().unwrap().push(call);
        }

        fn dispatcher(self) -> (EventDispatcher<FakeClient>, Log) {
            let calls = self.calls.clone();
            let fake = Arc::new(self);
            let dispatcher =
                EventDispatcher::new(fake.clone(), fake.clone(), fake.clone(), fake);
            (dispatcher, calls)
        }
    }

    #[async_trait]
    impl CredentialProvider for Fake {
        type Client = FakeClient;

        async fn acquire(&self, installation_id: u64) -> Result<FakeClient> {
            self.record(Call::Acquire(installation_id));
            if self.fail_acquire {
                return Err(Error::Credential {
                    installation_id,
                    message: "installation suspended".to_string(),
                });
            }
            Ok(FakeClient { installation_id })
        }
    }

    #[async_trait]
    impl ChangeSetFetcher<FakeClient> for Fake {
        async fn list_changed_files(
            &self,
            client: &FakeClient,
            owner: &str,
            repo: &str,
            pr_number: u64,
        ) -> Result<Vec<ChangedFile>> {
            self.record(Call::Fetch {
                installation_id: client.installation_id,
                owner: owner.to_string(),
                repo: repo.to_string(),
                pr_number,
            });
            if self.fail_fetch_for == Some(pr_number) {
                return Err(Error::Fetch {
                    pr_number,
                    message: "connection reset".to_string(),
                });
            }
            Ok(self.files.clone())
        }
    }

    #[async_trait]
    impl ReviewGenerator<FakeClient> for Fake {
        async fn generate_review(
            &self,
            _client: &FakeClient,
            event: &WebhookEvent,
            changed_files: &[ChangedFile],
            inline_suggestions: bool,
        ) -> Result<ReviewArtifact> {
            self.record(Call::Generate {
                pr_number: event.pr_number().unwrap(),
                files: changed_files.to_vec(),
                inline: inline_suggestions,
            });
            if self.panic_generate {
                panic!("generator bug");
            }
            if self.fail_generate {
                return Err(Error::Generation("model unavailable".to_string()));
            }
            Ok(self.review.clone())
        }
    }

    #[async_trait]
    impl ReviewPublisher<FakeClient> for Fake {
        async fn publish_review(
            &self,
            _client: &FakeClient,
            event: &WebhookEvent,
            review: &ReviewArtifact,
        ) -> Result<()> {
            self.record(Call::Publish {
                pr_number: event.pr_number().unwrap(),
                delivery_id: event.delivery_id.clone(),
                payload: event.payload.clone(),
                review: review.clone(),
            });
            if self.fail_publish {
                return Err(Error::Publication("422 Unprocessable Entity".to_string()));
            }
            Ok(())
        }
    }

    fn stages(calls: &Log) -> Vec<&'static str> {
        calls
            .lock()
            .unwrap()
            .iter()
            .map(|c| match c {
                Call::Acquire(_) => "acquire",
                Call::Fetch { .. } => "fetch",
                Call::Generate { .. } => "generate",
                Call::Publish { .. } => "publish",
            })
            .collect()
    }

    #[derive(Clone, Default)]
    struct Capture(Arc<Mutex<Vec<u8>>>);

    impl Write for Capture {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl Capture {
        fn error_lines(&self) -> Vec<String> {
            String::from_utf8(self.0.lock().unwrap().clone())
                .unwrap()
                .lines()
                .filter(|l| l.contains("ERROR"))
                .map(str::to_string)
                .collect()
        }
    }

    async fn dispatch_captured(
        dispatcher: &EventDispatcher<FakeClient>,
        event: WebhookEvent,
    ) -> (DispatchOutcome, Capture) {
        let capture = Capture::default();
        let writer = capture.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::DEBUG)
            .finish();

        let outcome = dispatcher
            .dispatch(event)
            .with_subscriber(subscriber)
            .await;
        (outcome, capture)
    }

    #[tokio::test]
    async fn test_stages_run_once_in_order() {
        let (dispatcher, calls) = Fake::new().dispatcher();

        let outcome = dispatcher
            .dispatch(opened_event(42, "acme", "widgets", 7))
            .await;

        assert_eq!(outcome, DispatchOutcome::Published { files: 1 });
        assert_eq!(stages(&calls), vec!["acquire", "fetch", "generate", "publish"]);
    }

    #[tokio::test]
    async fn test_scenario_files_and_artifact_pass_through() {
        let fake = Fake::new();
        let expected_review = fake.review.clone();
        let (dispatcher, calls) = fake.dispatcher();
        let event = opened_event(42, "acme", "widgets", 7);
        let payload = event.payload.clone();

        dispatcher.dispatch(event).await;

        let calls = calls.lock().unwrap();
        assert_eq!(calls[0], Call::Acquire(42));
        assert_eq!(
            calls[1],
            Call::Fetch {
                installation_id: 42,
                owner: "acme".to_string(),
                repo: "widgets".to_string(),
                pr_number: 7,
            }
        );
        assert_eq!(
            calls[2],
            Call::Generate {
                pr_number: 7,
                files: vec![ChangedFile::new("a.ts", FileStatus::Modified)],
                inline: true,
            }
        );
        assert_eq!(
            calls[3],
            Call::Publish {
                pr_number: 7,
                delivery_id: "delivery-7".to_string(),
                payload,
                review: expected_review,
            }
        );
    }

    #[tokio::test]
    async fn test_policy_controls_inline_flag() {
        let (dispatcher, calls) = Fake::new().dispatcher();
        let dispatcher = dispatcher.with_policy(ReviewPolicy {
            inline_suggestions: false,
        });

        dispatcher
            .dispatch(opened_event(42, "acme", "widgets", 7))
            .await;

        let calls = calls.lock().unwrap();
        assert!(matches!(calls[2], Call::Generate { inline: false, .. }));
    }

    #[tokio::test]
    async fn test_credential_failure_stops_pipeline() {
        let mut fake = Fake::new();
        fake.fail_acquire = true;
        let (dispatcher, calls) = fake.dispatcher();

        let (outcome, capture) =
            dispatch_captured(&dispatcher, opened_event(42, "acme", "widgets", 7)).await;

        assert!(matches!(
            outcome,
            DispatchOutcome::Failed {
                stage: Stage::AcquireCredential,
                ..
            }
        ));
        assert_eq!(stages(&calls), vec!["acquire"]);

        let errors = capture.error_lines();
        assert_eq!(errors.len(), 1, "{:?}", errors);
        assert!(errors[0].contains("pr_number=7"));
        assert!(errors[0].contains("acme/widgets"));
    }

    #[tokio::test]
    async fn test_missing_installation_is_credential_failure() {
        let (dispatcher, calls) = Fake::new().dispatcher();
        let mut event = opened_event(42, "acme", "widgets", 7);
        event.installation_id = None;

        let outcome = dispatcher.dispatch(event).await;

        assert!(matches!(
            outcome,
            DispatchOutcome::Failed {
                stage: Stage::AcquireCredential,
                ..
            }
        ));
        assert!(stages(&calls).is_empty());
    }

    #[tokio::test]
    async fn test_fetch_failure_logged_with_pr_number() {
        let mut fake = Fake::new();
        fake.fail_fetch_for = Some(9);
        let (dispatcher, calls) = fake.dispatcher();

        let (outcome, capture) =
            dispatch_captured(&dispatcher, opened_event(42, "acme", "widgets", 9)).await;

        assert!(matches!(
            outcome,
            DispatchOutcome::Failed {
                stage: Stage::FetchChanges,
                ..
            }
        ));
        assert_eq!(stages(&calls), vec!["acquire", "fetch"]);

        let errors = capture.error_lines();
        assert_eq!(errors.len(), 1, "{:?}", errors);
        assert!(errors[0].contains("pr_number=9"));
        assert!(errors[0].contains("connection reset"));
        assert!(errors[0].contains("stage=fetch_changes"));
    }

    #[tokio::test]
    async fn test_generation_failure_skips_publish() {
        let mut fake = Fake::new();
        fake.fail_generate = true;
        let (dispatcher, calls) = fake.dispatcher();

        let outcome = dispatcher
            .dispatch(opened_event(42, "acme", "widgets", 7))
            .await;

        assert!(matches!(
            outcome,
            DispatchOutcome::Failed {
                stage: Stage::GenerateReview,
                ..
            }
        ));
        assert_eq!(stages(&calls), vec!["acquire", "fetch", "generate"]);
    }

    #[tokio::test]
    async fn test_publication_failure_reported() {
        let mut fake = Fake::new();
        fake.fail_publish = true;
        let (dispatcher, calls) = fake.dispatcher();

        let outcome = dispatcher
            .dispatch(opened_event(42, "acme", "widgets", 7))
            .await;

        match outcome {
            DispatchOutcome::Failed { stage, error } => {
                assert_eq!(stage, Stage::PublishReview);
                assert!(error.contains("422"));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(stages(&calls).len(), 4);
    }

    #[tokio::test]
    async fn test_panicking_stage_is_contained() {
        let mut fake = Fake::new();
        fake.panic_generate = true;
        let (dispatcher, calls) = fake.dispatcher();

        let outcome = dispatcher
            .dispatch(opened_event(42, "acme", "widgets", 7))
            .await;

        assert!(matches!(outcome, DispatchOutcome::Aborted { .. }));
        assert_eq!(stages(&calls), vec!["acquire", "fetch", "generate"]);
    }

    #[tokio::test]
    async fn test_failure_does_not_affect_next_event() {
        let mut fake = Fake::new();
        fake.fail_fetch_for = Some(9);
        let (dispatcher, _calls) = fake.dispatcher();

        let failing = tokio::spawn({
            let dispatcher = dispatcher.clone();
            async move { dispatcher.dispatch(opened_event(42, "acme", "widgets", 9)).await }
        });
        let passing = tokio::spawn({
            let dispatcher = dispatcher.clone();
            async move { dispatcher.dispatch(opened_event(43, "acme", "gadgets", 10)).await }
        });

        assert!(!failing.await.unwrap().is_published());
        assert!(passing.await.unwrap().is_published());

        // The dispatcher is still usable after a failure
        let later = dispatcher
            .dispatch(opened_event(42, "acme", "widgets", 11))
            .await;
        assert!(later.is_published());
    }

    #[tokio::test]
    async fn test_handler_swallows_failures() {
        let mut fake = Fake::new();
        fake.fail_acquire = true;
        let (dispatcher, calls) = fake.dispatcher();
        let handler: Arc<dyn EventHandler> = Arc::new(dispatcher);

        handler.handle(opened_event(42, "acme", "widgets", 7)).await;

        assert_eq!(stages(&calls), vec!["acquire"]);
    }

    #[test]
    fn test_stage_display() {
        assert_eq!(Stage::AcquireCredential.to_string(), "acquire_credential");
        assert_eq!(Stage::PublishReview.to_string(), "publish_review");
    }

    #[test]
    fn test_policy_from_config() {
        let mut config = Config::default();
        assert!(ReviewPolicy::from(&config).inline_suggestions);
        config.review.inline_suggestions = false;
        assert!(!ReviewPolicy::from(&config).inline_suggestions);
    }
}
