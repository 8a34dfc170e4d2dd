//! Contract between a turn and the process that answers it.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::{QueryError, Result};
use crate::event::StreamEvent;

/// How much the assistant may do without asking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString)]
pub enum PermissionMode {
    #[serde(rename = "default")]
    #[strum(serialize = "default")]
    Default,
    #[serde(rename = "acceptEdits")]
    #[strum(serialize = "acceptEdits")]
    AcceptEdits,
    #[default]
    #[serde(rename = "bypassPermissions")]
    #[strum(serialize = "bypassPermissions")]
    BypassPermissions,
    #[serde(rename = "plan")]
    #[strum(serialize = "plan")]
    Plan,
}

/// Everything needed to start one subprocess run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRequest {
    pub prompt: String,
    /// Conversation to resume, if the session already has one.
    pub resume_id: Option<String>,
    pub working_dir: PathBuf,
    pub permission_mode: PermissionMode,
    pub allowed_tools: Vec<String>,
    /// Overrides the client's configured model.
    pub model: Option<String>,
}

/// Receiving ends of one run.
///
/// `events` closes when the run is over. A cancelled run closes it without
/// sending [`StreamEvent::Terminal`]. `errors` carries at most one failure.
#[derive(Debug)]
pub struct QueryStream {
    pub events: mpsc::Receiver<StreamEvent>,
    pub errors: mpsc::Receiver<QueryError>,
}

/// Starts runs of the external assistant.
#[async_trait]
pub trait QueryClient: Send + Sync {
    /// Starts a run in the background. Cancelling `cancel` terminates it.
    fn run(&self, request: QueryRequest, cancel: CancellationToken) -> QueryStream;

    /// Verifies the assistant binary responds. Returns its version banner.
    async fn health(&self) -> Result<String>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_permission_mode_strings() {
        assert_eq!(PermissionMode::BypassPermissions.to_string(), "bypassPermissions");
        assert_eq!(PermissionMode::from_str("acceptEdits").unwrap(), PermissionMode::AcceptEdits);
        assert!(PermissionMode::from_str("yolo").is_err());
        assert_eq!(PermissionMode::default(), PermissionMode::BypassPermissions);
    }
}
