//! Concurrent fan-out over every resource provider.
//!
//! Each provider runs in its own task behind the [`Retrier`]. Results are
//! only combined once every task has finished, and always in kind priority
//! order so the outcome does not depend on completion timing.

use crate::client::SageMakerClient;
use crate::errors::{error_chain, ApiError, Cancelled, ClassifiedError, ProviderFailure};
use crate::provider::ResourceProvider;
use crate::providers::{AppProvider, EndpointProvider, NotebookProvider};
use crate::retry::Retrier;
use futures::future::join_all;
use log::{debug, error, info, warn};
use sagewatch_core::{ResourceKind, ResourceRecord};
use sagewatch_utils::WarningLog;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Coarse outcome of an aggregation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateStatus {
    /// At least one record was listed and every provider answered.
    Resources,
    /// Every provider answered and none returned a record.
    NoResources,
    /// At least one provider exhausted its retries, so its kind is unknown.
    Incomplete,
    /// A provider failed non-retryably; partial results may still be attached.
    Fatal,
}

/// Combined output of one aggregation run.
#[derive(Debug, Default)]
pub struct AggregateResult {
    /// Records in kind priority order, provider order preserved within a kind.
    pub resources: Vec<ResourceRecord>,
    /// One entry per distinct exhausted retryable failure.
    pub warnings: Vec<String>,
    /// The first non-retryable failure in kind priority order.
    pub fatal_error: Option<ProviderFailure>,
}

impl AggregateResult {
    pub fn status(&self) -> AggregateStatus {
        if self.fatal_error.is_some() {
            AggregateStatus::Fatal
        } else if !self.warnings.is_empty() {
            AggregateStatus::Incomplete
        } else if self.resources.is_empty() {
            AggregateStatus::NoResources
        } else {
            AggregateStatus::Resources
        }
    }
}

pub struct Aggregator {
    providers: Vec<Arc<dyn ResourceProvider>>,
    retrier: Retrier,
}

impl Aggregator {
    /// Providers are run in parallel and their results merged in kind order.
    pub fn new(mut providers: Vec<Arc<dyn ResourceProvider>>, retrier: Retrier) -> Self {
        providers.sort_by_key(|provider| provider.kind());
        Self { providers, retrier }
    }

    /// The standard endpoint, notebook and app providers over one client.
    pub fn from_client(client: Arc<SageMakerClient>, detailed: bool, retrier: Retrier) -> Self {
        let providers: Vec<Arc<dyn ResourceProvider>> = vec![
            Arc::new(EndpointProvider::new(Arc::clone(&client), detailed)),
            Arc::new(NotebookProvider::new(Arc::clone(&client), detailed)),
            Arc::new(AppProvider::new(client)),
        ];
        Self::new(providers, retrier)
    }

    pub fn kinds(&self) -> Vec<ResourceKind> {
        self.providers.iter().map(|provider| provider.kind()).collect()
    }

    /// Poll every provider once.
    ///
    /// Returns as soon as `cancel` fires; tasks still running are told to
    /// stop but are not awaited.
    pub async fn run(&self, cancel: &CancellationToken) -> Result<AggregateResult, Cancelled> {
        let tasks = cancel.child_token();

        let handles: Vec<_> = self
            .providers
            .iter()
            .map(|provider| {
                let provider = Arc::clone(provider);
                let retrier = self.retrier.clone();
                let token = tasks.clone();
                tokio::spawn(async move {
                    debug!("Listing {}", provider.kind().plural());
                    retrier.execute(&token, || provider.list()).await
                })
            })
            .collect();

        let joined = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("Aggregation cancelled; signalling {} provider tasks", self.providers.len());
                tasks.cancel();
                return Err(Cancelled);
            }
            joined = join_all(handles) => joined,
        };

        let mut result = AggregateResult::default();
        let mut warnings = WarningLog::new();

        for (kind, joined) in self.kinds().into_iter().zip(joined) {
            let outcome = joined.unwrap_or_else(|e| {
                Err(ClassifiedError::NonRetryable(ApiError::Task(format!(
                    "{} task failed: {}",
                    kind.plural(),
                    e
                ))))
            });

            match outcome {
                Ok(records) => {
                    let listed = records.len();
                    let named: Vec<ResourceRecord> =
                        records.into_iter().filter(ResourceRecord::has_name).collect();
                    if named.len() < listed {
                        debug!("Dropped {} unnamed {}", listed - named.len(), kind.plural());
                    }
                    result.resources.extend(named);
                }
                Err(ClassifiedError::Cancelled) => return Err(Cancelled),
                Err(ClassifiedError::Retryable(cause)) => {
                    let message = format!(
                        "retryable error listing {}: {}",
                        kind.plural(),
                        error_chain(&cause)
                    );
                    if warnings.record(message.clone()) {
                        warn!("{}", message);
                    }
                }
                Err(ClassifiedError::NonRetryable(cause)) => {
                    if result.fatal_error.is_none() {
                        result.fatal_error = Some(ProviderFailure { kind, cause });
                    } else {
                        error!("Failed to list {}: {}", kind.plural(), error_chain(&cause));
                    }
                }
            }
        }

        result.warnings = warnings.into_messages();
        info!(
            "Aggregated {} resources with {} warnings",
            result.resources.len(),
            result.warnings.len()
        );

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{HttpError, Result};
    use crate::retry::RetryPolicy;
    use async_trait::async_trait;
    use chrono::Utc;
    use sagewatch_core::IN_SERVICE;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Clone)]
    enum Script {
        Records(Vec<&'static str>),
        Throttled,
        Denied,
        Hang,
    }

    struct MockProvider {
        kind: ResourceKind,
        delay: Duration,
        script: Script,
        calls: AtomicUsize,
    }

    impl MockProvider {
        fn new(kind: ResourceKind, script: Script) -> Arc<Self> {
            Self::delayed(kind, script, Duration::ZERO)
        }

        fn delayed(kind: ResourceKind, script: Script, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                kind,
                delay,
                script,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl ResourceProvider for MockProvider {
        fn kind(&self) -> ResourceKind {
            self.kind
        }

        async fn list(&self) -> Result<Vec<ResourceRecord>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;

            match &self.script {
                Script::Records(names) => Ok(names
                    .iter()
                    .map(|name| {
                        ResourceRecord::new(self.kind, *name, IN_SERVICE, "ml.t3.medium", Utc::now())
                    })
                    .collect()),
                Script::Throttled => Err(ApiError::Http(HttpError::Service {
                    status: 400,
                    code: "ThrottlingException".to_string(),
                    message: "Rate exceeded".to_string(),
                })),
                Script::Denied => Err(ApiError::Http(HttpError::Service {
                    status: 400,
                    code: "AccessDeniedException".to_string(),
                    message: "not authorized".to_string(),
                })),
                Script::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(Vec::new())
                }
            }
        }
    }

    fn retrier() -> Retrier {
        Retrier::new(RetryPolicy {
            max_attempts: 2,
            initial_interval: Duration::from_millis(100),
            max_interval: Duration::from_secs(1),
            multiplier: 2.0,
            jitter_factor: 0.1,
        })
    }

    fn names(result: &AggregateResult) -> Vec<&str> {
        result.resources.iter().map(|record| record.name.as_str()).collect()
    }

    fn aggregator(providers: Vec<Arc<MockProvider>>) -> Aggregator {
        let providers = providers
            .into_iter()
            .map(|provider| provider as Arc<dyn ResourceProvider>)
            .collect();
        Aggregator::new(providers, retrier())
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_providers_succeed_in_kind_order() {
        // Apps finish first, endpoints last
        let aggregator = aggregator(vec![
            MockProvider::delayed(ResourceKind::App, Script::Records(vec!["app-1"]), Duration::from_millis(1)),
            MockProvider::delayed(
                ResourceKind::Endpoint,
                Script::Records(vec!["ep-2", "ep-1"]),
                Duration::from_millis(30),
            ),
            MockProvider::delayed(ResourceKind::Notebook, Script::Records(vec!["nb-1"]), Duration::from_millis(10)),
        ]);

        let result = aggregator.run(&CancellationToken::new()).await.unwrap();
        assert_eq!(names(&result), vec!["ep-2", "ep-1", "nb-1", "app-1"]);
        assert!(result.warnings.is_empty());
        assert!(result.fatal_error.is_none());
        assert_eq!(result.status(), AggregateStatus::Resources);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_failure_keeps_partial_results() {
        let endpoints = MockProvider::new(ResourceKind::Endpoint, Script::Denied);
        let aggregator = aggregator(vec![
            Arc::clone(&endpoints),
            MockProvider::new(ResourceKind::Notebook, Script::Records(vec!["nb-1", "nb-2"])),
            MockProvider::new(ResourceKind::App, Script::Records(vec!["app-1"])),
        ]);

        let result = aggregator.run(&CancellationToken::new()).await.unwrap();
        let fatal = result.fatal_error.as_ref().unwrap();
        assert_eq!(fatal.kind, ResourceKind::Endpoint);
        assert_eq!(fatal.cause.code(), Some("AccessDeniedException"));
        assert_eq!(names(&result), vec!["nb-1", "nb-2", "app-1"]);
        assert_eq!(result.status(), AggregateStatus::Fatal);
        assert_eq!(endpoints.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_fatal_error_follows_kind_priority() {
        let aggregator = aggregator(vec![
            MockProvider::delayed(ResourceKind::App, Script::Denied, Duration::from_millis(1)),
            MockProvider::delayed(ResourceKind::Notebook, Script::Denied, Duration::from_millis(50)),
            MockProvider::new(ResourceKind::Endpoint, Script::Records(vec!["ep-1"])),
        ]);

        let result = aggregator.run(&CancellationToken::new()).await.unwrap();
        assert_eq!(result.fatal_error.unwrap().kind, ResourceKind::Notebook);
        assert_eq!(result.resources.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retryable_exhaustion_becomes_warning() {
        let notebooks = MockProvider::new(ResourceKind::Notebook, Script::Throttled);
        let aggregator = aggregator(vec![
            MockProvider::new(ResourceKind::Endpoint, Script::Records(vec!["ep-1"])),
            Arc::clone(&notebooks),
            MockProvider::new(ResourceKind::App, Script::Records(vec!["app-1"])),
        ]);

        let result = aggregator.run(&CancellationToken::new()).await.unwrap();
        assert!(result.fatal_error.is_none());
        assert_eq!(result.warnings.len(), 1);
        assert!(result.warnings[0].starts_with("retryable error listing notebooks"));
        assert!(result.warnings[0].contains("ThrottlingException"));
        assert_eq!(names(&result), vec!["ep-1", "app-1"]);
        assert_eq!(result.status(), AggregateStatus::Incomplete);
        assert_eq!(notebooks.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_providers_are_not_an_empty_listing() {
        let aggregator = aggregator(vec![
            MockProvider::new(ResourceKind::Endpoint, Script::Throttled),
            MockProvider::new(ResourceKind::Notebook, Script::Throttled),
            MockProvider::new(ResourceKind::App, Script::Throttled),
        ]);

        let result = aggregator.run(&CancellationToken::new()).await.unwrap();
        assert!(result.resources.is_empty());
        assert!(result.fatal_error.is_none());
        assert_eq!(result.warnings.len(), 3);
        assert_eq!(result.status(), AggregateStatus::Incomplete);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unnamed_records_are_dropped() {
        let aggregator = aggregator(vec![
            MockProvider::new(ResourceKind::Endpoint, Script::Records(vec!["ep-1", "", "  "])),
            MockProvider::new(ResourceKind::Notebook, Script::Records(vec![])),
            MockProvider::new(ResourceKind::App, Script::Records(vec![""])),
        ]);

        let result = aggregator.run(&CancellationToken::new()).await.unwrap();
        assert_eq!(names(&result), vec!["ep-1"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_resources_is_distinct_from_failure() {
        let aggregator = aggregator(vec![
            MockProvider::new(ResourceKind::Endpoint, Script::Records(vec![])),
            MockProvider::new(ResourceKind::Notebook, Script::Records(vec![])),
            MockProvider::new(ResourceKind::App, Script::Records(vec![""])),
        ]);

        let result = aggregator.run(&CancellationToken::new()).await.unwrap();
        assert_eq!(result.status(), AggregateStatus::NoResources);
        assert!(result.fatal_error.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_returns_promptly() {
        let aggregator = aggregator(vec![
            MockProvider::new(ResourceKind::Endpoint, Script::Hang),
            MockProvider::new(ResourceKind::Notebook, Script::Throttled),
            MockProvider::new(ResourceKind::App, Script::Records(vec!["app-1"])),
        ]);

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let started = tokio::time::Instant::now();
        let result = aggregator.run(&cancel).await;
        assert!(matches!(result, Err(Cancelled)));
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_stops_further_retries() {
        let notebooks = MockProvider::new(ResourceKind::Notebook, Script::Throttled);
        let aggregator = aggregator(vec![
            MockProvider::new(ResourceKind::Endpoint, Script::Hang),
            Arc::clone(&notebooks),
        ]);

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            // First attempt fails at once; its backoff is at least 90ms
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        assert!(matches!(aggregator.run(&cancel).await, Err(Cancelled)));
        assert_eq!(notebooks.calls.load(Ordering::SeqCst), 1);

        // Well past every backoff the policy could schedule
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(notebooks.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_already_cancelled_token() {
        let aggregator = aggregator(vec![MockProvider::new(
            ResourceKind::Endpoint,
            Script::Records(vec!["ep-1"]),
        )]);

        let cancel = CancellationToken::new();
        cancel.cancel();
        assert!(matches!(aggregator.run(&cancel).await, Err(Cancelled)));
    }
}
