//! One turn, end to end: session lookup, subprocess, aggregation, rendering.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use omnik_core::config::OmnikConfig;
use omnik_core::{
    ContentAggregator, ContentLog, PermissionMode, QueryClient, QueryRequest, QueryStream, Result,
    StreamEvent,
};
use omnik_execution::renderer::{BUSY_NOTICE, ERROR_PREFIX};
use omnik_execution::{CancellationCoordinator, OutputRenderer, Registration};
use omnik_infrastructure::SessionRegistry;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// How long a stopped turn waits for the subprocess to be reaped.
const TERMINATION_GRACE: Duration = Duration::from_secs(5);

/// Lower bound on the idle flush tick.
const MIN_FLUSH_TICK: Duration = Duration::from_millis(10);

/// Settings applied to every turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnDefaults {
    pub permission_mode: PermissionMode,
    pub allowed_tools: Vec<String>,
    /// Where the `default` session lives when a turn has to create it.
    pub default_working_dir: PathBuf,
}

impl TurnDefaults {
    pub fn from_config(config: &OmnikConfig, default_working_dir: impl Into<PathBuf>) -> Self {
        Self {
            permission_mode: config.client.permission_mode,
            allowed_tools: config.client.allowed_tools.clone(),
            default_working_dir: default_working_dir.into(),
        }
    }
}

/// An inbound message to forward to the assistant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnRequest {
    pub conversation_key: String,
    pub prompt: String,
    /// Overrides the configured model for this turn only.
    pub model: Option<String>,
}

impl TurnRequest {
    pub fn new(conversation_key: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            conversation_key: conversation_key.into(),
            prompt: prompt.into(),
            model: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

/// How a turn ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    Completed { session: String, containers: usize },
    Stopped,
    /// The assistant failed; `summary` is what the user was shown.
    Failed { summary: String },
    /// Another turn holds this conversation key. Nothing was started.
    Busy,
}

enum TurnEnd {
    Completed,
    Stopped,
    Failed(String),
}

/// Wires registry, query client, coordinator and renderer for each turn.
pub struct TurnOrchestrator {
    registry: Arc<SessionRegistry>,
    client: Arc<dyn QueryClient>,
    coordinator: Arc<CancellationCoordinator>,
    renderer: OutputRenderer,
    defaults: TurnDefaults,
    aggregator: ContentAggregator,
}

impl TurnOrchestrator {
    pub fn new(
        registry: Arc<SessionRegistry>,
        client: Arc<dyn QueryClient>,
        coordinator: Arc<CancellationCoordinator>,
        renderer: OutputRenderer,
        defaults: TurnDefaults,
    ) -> Self {
        Self {
            registry,
            client,
            coordinator,
            renderer,
            defaults,
            aggregator: ContentAggregator::new(),
        }
    }

    pub fn coordinator(&self) -> &Arc<CancellationCoordinator> {
        &self.coordinator
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Asks the turn running under `conversation_key` to stop.
    pub async fn stop(&self, conversation_key: &str) -> bool {
        self.coordinator.signal_stop(conversation_key).await
    }

    /// Runs one turn. At most one turn per conversation key runs at a time;
    /// a second one gets a busy notice and [`TurnOutcome::Busy`].
    ///
    /// Errors are registry or transport failures that kept the turn from
    /// starting. Assistant failures are reported as [`TurnOutcome::Failed`].
    pub async fn run_turn(&self, request: TurnRequest) -> Result<TurnOutcome> {
        let key = request.conversation_key.as_str();

        let cancel = match self.coordinator.register(key).await {
            Registration::Registered(token) => token,
            Registration::Busy => {
                if let Err(e) = self.renderer.post_notice(key, BUSY_NOTICE).await {
                    tracing::warn!(conversation_key = %key, error = %e, "failed to post busy notice");
                }
                return Ok(TurnOutcome::Busy);
            }
        };

        let outcome = self.drive(&request, cancel).await;
        self.coordinator.release(key).await;
        outcome
    }

    async fn drive(&self, request: &TurnRequest, cancel: CancellationToken) -> Result<TurnOutcome> {
        let key = request.conversation_key.as_str();

        let mut record = match self
            .registry
            .current_or_create_default(&self.defaults.default_working_dir)
            .await
        {
            Ok(record) => record,
            Err(e) => {
                tracing::error!(conversation_key = %key, error = %e, "no session for turn");
                let notice = format!("{}{}", ERROR_PREFIX, e.user_summary());
                if let Err(post_err) = self.renderer.post_notice(key, &notice).await {
                    tracing::warn!(conversation_key = %key, error = %post_err, "failed to post error notice");
                }
                return Err(e);
            }
        };

        let mut state = self.renderer.start_turn(key, cancel.clone()).await?;
        let mut log = ContentLog::new();

        let query = QueryRequest {
            prompt: request.prompt.clone(),
            resume_id: record.resume_id().map(str::to_string),
            working_dir: record.working_dir.clone(),
            permission_mode: self.defaults.permission_mode,
            allowed_tools: self.defaults.allowed_tools.clone(),
            model: request.model.clone(),
        };

        tracing::info!(
            conversation_key = %key,
            session = %record.name,
            resume = query.resume_id.is_some(),
            working_dir = %query.working_dir.display(),
            "turn started"
        );

        let QueryStream {
            mut events,
            mut errors,
        } = self.client.run(query, cancel.clone());

        // Flushes buffered content while the assistant is quiet, e.g. during a tool run.
        let mut ticker = tokio::time::interval(self.renderer.flush_interval().max(MIN_FLUSH_TICK));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let end = loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break TurnEnd::Stopped,
                Some(err) = errors.recv() => {
                    tracing::warn!(conversation_key = %key, error = %err, "assistant failed");
                    break TurnEnd::Failed(err.user_summary());
                }
                event = events.recv() => match event {
                    Some(StreamEvent::Terminal) => {
                        break if cancel.is_cancelled() {
                            TurnEnd::Stopped
                        } else {
                            TurnEnd::Completed
                        };
                    }
                    Some(event) => {
                        state.note_event();
                        if let Some(correlation_id) = self.aggregator.apply(&event, &mut log, &mut record) {
                            if let Err(e) = self
                                .registry
                                .update_correlation_id(&record.name, &correlation_id)
                                .await
                            {
                                tracing::warn!(session = %record.name, error = %e, "failed to persist correlation id");
                            }
                        }
                        self.renderer.flush(&log, &mut state, false).await;
                    }
                    None => {
                        // The client queues its error before closing the event stream.
                        break match errors.try_recv() {
                            Ok(err) => {
                                tracing::warn!(conversation_key = %key, error = %err, "assistant failed");
                                TurnEnd::Failed(err.user_summary())
                            }
                            Err(_) if cancel.is_cancelled() => TurnEnd::Stopped,
                            Err(_) => TurnEnd::Failed("the assistant ended without finishing".to_string()),
                        };
                    }
                },
                _ = ticker.tick() => {
                    if state.events_since_flush() > 0 {
                        self.renderer.flush(&log, &mut state, false).await;
                    }
                }
            }
        };

        let outcome = match end {
            TurnEnd::Completed => {
                self.renderer.finish(&log, &mut state).await;
                if let Err(e) = self.registry.touch(&record.name).await {
                    tracing::warn!(session = %record.name, error = %e, "failed to update last used time");
                }
                TurnOutcome::Completed {
                    session: record.name.clone(),
                    containers: state.continuation_index + 1,
                }
            }
            TurnEnd::Stopped => {
                self.renderer.on_cancelled(&mut state).await;
                // The client closes the stream once the process is reaped.
                let drained = tokio::time::timeout(TERMINATION_GRACE, async {
                    while events.recv().await.is_some() {}
                })
                .await;
                if drained.is_err() {
                    tracing::warn!(conversation_key = %key, "assistant did not exit after stop");
                }
                TurnOutcome::Stopped
            }
            TurnEnd::Failed(summary) => {
                self.renderer.fail(&mut state, &summary).await;
                TurnOutcome::Failed { summary }
            }
        };

        tracing::info!(conversation_key = %key, session = %record.name, outcome = ?outcome, "turn finished");
        Ok(outcome)
    }
}
