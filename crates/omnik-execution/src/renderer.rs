//! Incremental rendering of a [`ContentLog`] onto chat containers.
//!
//! The rendered log is written left to right. Characters before
//! `committed_chars` sit in finalized containers; the rest is the body of the
//! live container. Once a flush returns, finalized slices followed by the live
//! body equal the rendered log.

use std::sync::Arc;
use std::time::Duration;

use omnik_core::config::RenderConfig;
use omnik_core::{CancelAffordance, ChatTransport, ContainerId, ContentLog, Result};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

pub const PROCESSING_NOTICE: &str = "🤔 Processing...";
pub const NO_OUTPUT_NOTICE: &str = "✅ Done (no output)";
pub const STOPPED_NOTICE: &str = "⏹️ Stopped by user";
pub const BUSY_NOTICE: &str = "⏳ A request is already running. Wait for it to finish or press Stop.";
pub const ERROR_PREFIX: &str = "❌ Error: ";

/// Appended to a container when its content continues in the next one.
pub const CONTINUED_MARKER: &str = "\n\n... (continued)";

/// Prefix of the container holding part `part` (1-based) of the output.
pub fn continuation_header(part: usize) -> String {
    format!("(part {})\n\n", part)
}

/// When a non-forced flush may run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlushPolicy {
    /// Flush once this many events arrived since the last flush. `0` disables.
    pub every_events: u32,
    /// Flush once this much time passed since the last flush.
    pub interval: Duration,
    /// Never edit more often than this, whatever the other thresholds say.
    pub min_edit_interval: Duration,
}

impl FlushPolicy {
    pub fn from_config(config: &RenderConfig) -> Self {
        Self {
            every_events: config.flush_every_events,
            interval: Duration::from_millis(config.flush_interval_ms),
            min_edit_interval: Duration::from_millis(config.min_edit_interval_ms),
        }
    }

    pub fn is_due(&self, events_since_flush: u32, since_last_flush: Duration) -> bool {
        if since_last_flush < self.min_edit_interval {
            return false;
        }
        (self.every_events > 0 && events_since_flush >= self.every_events)
            || since_last_flush >= self.interval
    }
}

impl Default for FlushPolicy {
    fn default() -> Self {
        Self::from_config(&RenderConfig::default())
    }
}

/// Rendering state of one turn.
#[derive(Debug)]
pub struct TurnState {
    pub conversation_key: String,
    /// Most recently created container; the only one still edited.
    pub live_container: ContainerId,
    /// Characters of the rendered log already in finalized containers. Never decreases.
    pub committed_chars: usize,
    /// Number of containers finalized so far.
    pub continuation_index: usize,
    pub cancel: CancellationToken,
    /// Body last written to the live container. `None` while it shows the placeholder.
    live_text: Option<String>,
    events_since_flush: u32,
    last_flush: Instant,
    finished: bool,
}

impl TurnState {
    pub fn new(
        conversation_key: impl Into<String>,
        live_container: ContainerId,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            conversation_key: conversation_key.into(),
            live_container,
            committed_chars: 0,
            continuation_index: 0,
            cancel,
            live_text: None,
            events_since_flush: 0,
            last_flush: Instant::now(),
            finished: false,
        }
    }

    pub fn live_text(&self) -> Option<&str> {
        self.live_text.as_deref()
    }

    /// Counts an event towards the flush threshold.
    pub fn note_event(&mut self) {
        self.events_since_flush = self.events_since_flush.saturating_add(1);
    }

    pub fn events_since_flush(&self) -> u32 {
        self.events_since_flush
    }

    /// True once the turn completed, failed, or was stopped.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// No further content may reach the transport.
    fn is_frozen(&self) -> bool {
        self.finished || self.cancel.is_cancelled()
    }
}

/// Writes content logs to a [`ChatTransport`].
///
/// Transport failures are logged and never abort a turn; the next flush
/// retries whatever did not land.
pub struct OutputRenderer {
    transport: Arc<dyn ChatTransport>,
    max_container_chars: usize,
    policy: FlushPolicy,
}

impl OutputRenderer {
    pub fn new(transport: Arc<dyn ChatTransport>, max_container_chars: usize, policy: FlushPolicy) -> Self {
        Self {
            transport,
            max_container_chars: max_container_chars.max(1),
            policy,
        }
    }

    pub fn from_config(transport: Arc<dyn ChatTransport>, config: &RenderConfig) -> Self {
        Self::new(transport, config.max_container_chars, FlushPolicy::from_config(config))
    }

    pub fn max_container_chars(&self) -> usize {
        self.max_container_chars
    }

    /// How long buffered content may wait for a flush when no events arrive.
    pub fn flush_interval(&self) -> Duration {
        self.policy.interval
    }

    /// Posts the placeholder container for a new turn.
    pub async fn start_turn(
        &self,
        conversation_key: &str,
        cancel: CancellationToken,
    ) -> Result<TurnState> {
        let container = self
            .transport
            .create_container(conversation_key, PROCESSING_NOTICE, CancelAffordance::Attached)
            .await?;
        Ok(TurnState::new(conversation_key, container, cancel))
    }

    /// Posts a standalone message without a cancel control.
    pub async fn post_notice(&self, conversation_key: &str, text: &str) -> Result<ContainerId> {
        self.transport
            .create_container(conversation_key, text, CancelAffordance::Removed)
            .await
    }

    pub fn should_flush(&self, state: &TurnState) -> bool {
        self.policy
            .is_due(state.events_since_flush, state.last_flush.elapsed())
    }

    /// Brings the containers up to date with `log`.
    ///
    /// Without `force` this only runs when the flush policy says so. Nothing is
    /// written once the turn is frozen. Returns whether a flush ran.
    pub async fn flush(&self, log: &ContentLog, state: &mut TurnState, force: bool) -> bool {
        if state.is_frozen() {
            return false;
        }
        if !force && !self.should_flush(state) {
            return false;
        }

        let rendered = log.render();
        self.write_out(&rendered, state, CancelAffordance::Attached)
            .await;

        state.events_since_flush = 0;
        state.last_flush = Instant::now();
        true
    }

    /// End of a successful turn: final flush, then drop the cancel control.
    pub async fn finish(&self, log: &ContentLog, state: &mut TurnState) {
        if state.is_frozen() {
            return;
        }

        let rendered = log.render();
        if rendered.is_empty() {
            if let Err(e) = self
                .transport
                .edit_container(&state.live_container, NO_OUTPUT_NOTICE, CancelAffordance::Removed)
                .await
            {
                tracing::warn!(conversation_key = %state.conversation_key, error = %e, "failed to post completion notice");
            }
        } else if !self.write_out(&rendered, state, CancelAffordance::Removed).await {
            self.remove_affordance(state).await;
        }

        state.finished = true;
        tracing::debug!(
            conversation_key = %state.conversation_key,
            containers = state.continuation_index + 1,
            chars = rendered.chars().count(),
            "turn rendered"
        );
    }

    /// Stop requested: keep what is on screen, drop the control, post a notice.
    pub async fn on_cancelled(&self, state: &mut TurnState) {
        if state.finished {
            return;
        }
        state.finished = true;

        self.remove_affordance(state).await;
        if let Err(e) = self
            .post_notice(&state.conversation_key, STOPPED_NOTICE)
            .await
        {
            tracing::warn!(conversation_key = %state.conversation_key, error = %e, "failed to post stop notice");
        }
    }

    /// The turn failed: replace the live container with a short error.
    pub async fn fail(&self, state: &mut TurnState, summary: &str) {
        if state.finished {
            return;
        }
        state.finished = true;

        let text = format!("{}{}", ERROR_PREFIX, summary);
        if let Err(e) = self
            .transport
            .edit_container(&state.live_container, &text, CancelAffordance::Removed)
            .await
        {
            tracing::warn!(conversation_key = %state.conversation_key, error = %e, "failed to post error notice");
        }
    }

    async fn remove_affordance(&self, state: &TurnState) {
        if let Err(e) = self
            .transport
            .set_cancel_affordance(&state.live_container, CancelAffordance::Removed)
            .await
        {
            tracing::warn!(conversation_key = %state.conversation_key, error = %e, "failed to remove cancel control");
        }
    }

    /// Splits full containers off the unsent text, then edits the live one.
    ///
    /// Returns true when the live container was edited with `live_cancel`.
    async fn write_out(&self, rendered: &str, state: &mut TurnState, live_cancel: CancelAffordance) -> bool {
        let max = self.max_container_chars;
        let mut unsent = split_chars(rendered, state.committed_chars).1;

        loop {
            let (head, rest) = split_chars(unsent, max);
            if rest.is_empty() {
                break;
            }
            if state.cancel.is_cancelled() {
                return false;
            }

            // Create the continuation first so a failure leaves nothing half-done.
            let seed = split_chars(rest, max).0;
            let next_index = state.continuation_index + 1;
            let seed_text = format!("{}{}", continuation_header(next_index + 1), seed);
            let next = match self
                .transport
                .create_container(&state.conversation_key, &seed_text, CancelAffordance::Attached)
                .await
            {
                Ok(container) => container,
                Err(e) => {
                    tracing::warn!(
                        conversation_key = %state.conversation_key,
                        error = %e,
                        "failed to create continuation container"
                    );
                    return false;
                }
            };

            let final_text = if state.continuation_index > 0 {
                format!(
                    "{}{}{}",
                    continuation_header(state.continuation_index + 1),
                    head,
                    CONTINUED_MARKER
                )
            } else {
                format!("{}{}", head, CONTINUED_MARKER)
            };
            if let Err(e) = self
                .transport
                .edit_container(&state.live_container, &final_text, CancelAffordance::Removed)
                .await
            {
                tracing::warn!(
                    conversation_key = %state.conversation_key,
                    container = %state.live_container,
                    error = %e,
                    "failed to finalize container"
                );
            }

            state.committed_chars += max;
            state.continuation_index = next_index;
            state.live_container = next;
            state.live_text = Some(seed.to_string());
            tracing::debug!(
                conversation_key = %state.conversation_key,
                part = next_index + 1,
                committed_chars = state.committed_chars,
                "continued in new container"
            );

            unsent = rest;
        }

        if state.cancel.is_cancelled() {
            return false;
        }
        if unsent.is_empty() || state.live_text.as_deref() == Some(unsent) {
            return false;
        }

        let text = if state.continuation_index > 0 {
            format!("{}{}", continuation_header(state.continuation_index + 1), unsent)
        } else {
            unsent.to_string()
        };

        match self
            .transport
            .edit_container(&state.live_container, &text, live_cancel)
            .await
        {
            Ok(()) => {
                state.live_text = Some(unsent.to_string());
                true
            }
            Err(e) => {
                tracing::warn!(
                    conversation_key = %state.conversation_key,
                    container = %state.live_container,
                    error = %e,
                    "failed to edit live container"
                );
                false
            }
        }
    }
}

/// Splits after `chars` characters; never inside a UTF-8 sequence.
fn split_chars(text: &str, chars: usize) -> (&str, &str) {
    let offset = text
        .char_indices()
        .nth(chars)
        .map_or(text.len(), |(offset, _)| offset);
    text.split_at(offset)
}
