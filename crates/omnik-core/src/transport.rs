//! Chat transport seam.
//!
//! A container is one editable message on the chat side. The renderer only
//! needs to create, edit, and toggle the cancel control on containers.

use std::fmt;

use async_trait::async_trait;

use crate::error::Result;

/// Transport-assigned identifier of a container.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContainerId(pub String);

impl ContainerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Whether the cancel control is shown on a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelAffordance {
    Attached,
    Removed,
}

#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Posts a new container into the conversation.
    async fn create_container(
        &self,
        conversation_key: &str,
        text: &str,
        cancel: CancelAffordance,
    ) -> Result<ContainerId>;

    /// Replaces a container's text.
    async fn edit_container(
        &self,
        container: &ContainerId,
        text: &str,
        cancel: CancelAffordance,
    ) -> Result<()>;

    /// Shows or hides the cancel control without touching the text.
    async fn set_cancel_affordance(
        &self,
        container: &ContainerId,
        cancel: CancelAffordance,
    ) -> Result<()>;
}
