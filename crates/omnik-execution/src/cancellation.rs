//! One in-flight turn per conversation key.

use std::collections::HashMap;

use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

/// Result of [`CancellationCoordinator::register`].
#[derive(Debug, Clone)]
pub enum Registration {
    /// The caller owns the turn for this key until it calls `release`.
    Registered(CancellationToken),
    /// Another turn is running for this key.
    Busy,
}

impl Registration {
    pub fn is_busy(&self) -> bool {
        matches!(self, Registration::Busy)
    }
}

/// Table of stop tokens, keyed by conversation.
#[derive(Debug, Default)]
pub struct CancellationCoordinator {
    tokens: RwLock<HashMap<String, CancellationToken>>,
}

impl CancellationCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims `conversation_key` for a new turn.
    ///
    /// Check and insert happen under one write lock, so of two concurrent
    /// callers exactly one is registered.
    pub async fn register(&self, conversation_key: &str) -> Registration {
        let mut tokens = self.tokens.write().await;
        if tokens.contains_key(conversation_key) {
            tracing::debug!(conversation_key = %conversation_key, "turn already running");
            return Registration::Busy;
        }

        let token = CancellationToken::new();
        tokens.insert(conversation_key.to_string(), token.clone());
        Registration::Registered(token)
    }

    /// Asks the running turn to stop.
    ///
    /// Returns `false` when nothing is registered. Repeated calls are no-ops.
    pub async fn signal_stop(&self, conversation_key: &str) -> bool {
        let tokens = self.tokens.read().await;
        match tokens.get(conversation_key) {
            Some(token) => {
                if !token.is_cancelled() {
                    tracing::info!(conversation_key = %conversation_key, "stop requested");
                    token.cancel();
                }
                true
            }
            None => false,
        }
    }

    /// Frees `conversation_key`. Releasing an unknown key does nothing.
    pub async fn release(&self, conversation_key: &str) {
        self.tokens.write().await.remove(conversation_key);
    }

    pub async fn is_busy(&self, conversation_key: &str) -> bool {
        self.tokens.read().await.contains_key(conversation_key)
    }
}
