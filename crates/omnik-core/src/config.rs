//! Configuration model. Loading lives in `omnik-infrastructure::config_service`.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::query::PermissionMode;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OmnikConfig {
    pub client: ClientConfig,
    pub render: RenderConfig,
    pub registry: RegistryConfig,
}

/// How the assistant binary is invoked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub binary: String,
    pub model: Option<String>,
    pub permission_mode: PermissionMode,
    pub allowed_tools: Vec<String>,
    pub health_timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            binary: "claude".to_string(),
            model: Some("sonnet".to_string()),
            permission_mode: PermissionMode::BypassPermissions,
            allowed_tools: ["Bash", "Read", "Write", "Edit", "Glob", "Grep"]
                .into_iter()
                .map(String::from)
                .collect(),
            health_timeout_secs: 10,
        }
    }
}

impl ClientConfig {
    pub fn health_timeout(&self) -> Duration {
        Duration::from_secs(self.health_timeout_secs)
    }
}

/// Container size and edit cadence.
///
/// The thresholds are tuning knobs, not correctness constraints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Characters of transcript per container, decorations excluded.
    pub max_container_chars: usize,
    /// Flush after this many events since the last flush.
    pub flush_every_events: u32,
    /// Flush once this much time has passed since the last flush.
    pub flush_interval_ms: u64,
    /// Minimum spacing between two edits of the live container.
    pub min_edit_interval_ms: u64,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            max_container_chars: 4000,
            flush_every_events: 3,
            flush_interval_ms: 1000,
            min_edit_interval_ms: 0,
        }
    }
}

/// Where registry state lives. Unset paths fall back to platform defaults.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub sessions_file: Option<PathBuf>,
    pub archive_dir: Option<PathBuf>,
    pub transcripts_root: Option<PathBuf>,
    pub default_working_dir: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: OmnikConfig = toml::from_str(
            r#"
            [client]
            model = "opus"

            [render]
            max_container_chars = 3500
            "#,
        )
        .unwrap();

        assert_eq!(config.client.model.as_deref(), Some("opus"));
        assert_eq!(config.client.binary, "claude");
        assert_eq!(config.render.max_container_chars, 3500);
        assert_eq!(config.render.flush_every_events, 3);
        assert!(config.registry.sessions_file.is_none());
    }

    #[test]
    fn test_permission_mode_from_toml() {
        let config: OmnikConfig = toml::from_str(
            r#"
            [client]
            permission_mode = "acceptEdits"
            "#,
        )
        .unwrap();
        assert_eq!(config.client.permission_mode, PermissionMode::AcceptEdits);
    }
}
