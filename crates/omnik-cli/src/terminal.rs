//! Terminal rendition of the chat transport.
//!
//! A terminal cannot edit past output, so each container keeps the text
//! already printed and an edit prints only what was appended. Edits that
//! rewrite earlier text (errors, stop notices) are printed whole on a new line.

use std::collections::HashMap;
use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use colored::Colorize;
use omnik_core::{CancelAffordance, ChatTransport, ContainerId, OmnikError, Result};
use omnik_execution::renderer::{ERROR_PREFIX, PROCESSING_NOTICE};

#[derive(Default)]
pub struct TerminalTransport {
    next_id: AtomicU64,
    shown: Mutex<HashMap<ContainerId, String>>,
}

impl TerminalTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn styled(text: &str) -> String {
        if text.starts_with(ERROR_PREFIX) {
            text.red().to_string()
        } else if text == PROCESSING_NOTICE {
            text.dimmed().to_string()
        } else if is_notice(text) {
            text.yellow().to_string()
        } else {
            text.to_string()
        }
    }

    fn write(out: &str) -> Result<()> {
        let mut stdout = std::io::stdout().lock();
        stdout
            .write_all(out.as_bytes())
            .and_then(|_| stdout.flush())
            .map_err(|e| OmnikError::Transport(e.to_string()))
    }
}

/// Single-line status messages the renderer posts on its own.
fn is_notice(text: &str) -> bool {
    ["✅", "⏹️", "⏳"].iter().any(|prefix| text.starts_with(prefix))
}

#[async_trait]
impl ChatTransport for TerminalTransport {
    async fn create_container(
        &self,
        conversation_key: &str,
        text: &str,
        _cancel: CancelAffordance,
    ) -> Result<ContainerId> {
        let id = ContainerId::new(format!(
            "{}-{}",
            conversation_key,
            self.next_id.fetch_add(1, Ordering::Relaxed)
        ));

        {
            let mut shown = self
                .shown
                .lock()
                .map_err(|_| OmnikError::internal("terminal state poisoned"))?;
            shown.insert(id.clone(), text.to_string());
        }

        Self::write(&format!("\n{}", Self::styled(text)))?;
        Ok(id)
    }

    async fn edit_container(
        &self,
        container: &ContainerId,
        text: &str,
        _cancel: CancelAffordance,
    ) -> Result<()> {
        let previous = {
            let mut shown = self
                .shown
                .lock()
                .map_err(|_| OmnikError::internal("terminal state poisoned"))?;
            let previous = shown
                .get(container)
                .cloned()
                .ok_or_else(|| OmnikError::Transport(format!("unknown container {}", container)))?;
            shown.insert(container.clone(), text.to_string());
            previous
        };

        if previous == text {
            return Ok(());
        }

        let out = match text.strip_prefix(previous.as_str()) {
            // The placeholder is replaced rather than extended.
            Some(suffix) if previous != PROCESSING_NOTICE => suffix.to_string(),
            _ => format!("\n{}", Self::styled(text)),
        };
        Self::write(&out)
    }

    async fn set_cancel_affordance(
        &self,
        container: &ContainerId,
        _cancel: CancelAffordance,
    ) -> Result<()> {
        tracing::trace!(container = %container, "cancel affordance changed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn edit_of_unknown_container_fails() {
        let transport = TerminalTransport::new();
        let result = transport
            .edit_container(&ContainerId::new("nope"), "x", CancelAffordance::Removed)
            .await;
        assert!(matches!(result, Err(OmnikError::Transport(_))));
    }

    #[tokio::test]
    async fn containers_get_distinct_ids() {
        let transport = TerminalTransport::new();
        let a = transport
            .create_container("k", "a", CancelAffordance::Attached)
            .await
            .unwrap();
        let b = transport
            .create_container("k", "b", CancelAffordance::Removed)
            .await
            .unwrap();
        assert_ne!(a, b);

        transport
            .edit_container(&a, "a and more", CancelAffordance::Removed)
            .await
            .unwrap();
        let shown = transport.shown.lock().unwrap();
        assert_eq!(shown.get(&a).map(String::as_str), Some("a and more"));
    }

    #[test]
    fn notices_are_recognised() {
        assert!(is_notice(omnik_execution::renderer::STOPPED_NOTICE));
        assert!(is_notice(omnik_execution::renderer::NO_OUTPUT_NOTICE));
        assert!(is_notice(omnik_execution::renderer::BUSY_NOTICE));
        assert!(!is_notice("plain reply"));
    }
}
