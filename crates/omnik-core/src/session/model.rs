//! Session and archive records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A named conversation with the assistant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Unique, human-chosen key.
    pub name: String,
    /// The assistant's own conversation id. Empty until the first turn reports one.
    #[serde(default)]
    pub correlation_id: String,
    /// Directory the assistant runs in.
    pub working_dir: PathBuf,
    pub created_at: DateTime<Utc>,
    pub last_used_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

impl SessionRecord {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        working_dir: impl Into<PathBuf>,
    ) -> Self {
        let now = Utc::now();
        Self {
            name: name.into(),
            correlation_id: String::new(),
            working_dir: working_dir.into(),
            created_at: now,
            last_used_at: now,
            description: description.into(),
        }
    }

    /// True once the assistant has assigned a conversation id.
    pub fn has_correlation_id(&self) -> bool {
        !self.correlation_id.is_empty()
    }

    /// Id to pass as `--resume`, if any.
    pub fn resume_id(&self) -> Option<&str> {
        self.has_correlation_id()
            .then_some(self.correlation_id.as_str())
    }

    /// Matches either the session name or its correlation id.
    pub fn matches(&self, name_or_id: &str) -> bool {
        self.name == name_or_id || (self.has_correlation_id() && self.correlation_id == name_or_id)
    }
}

/// What remains of a session after deletion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveRecord {
    pub original_name: String,
    #[serde(default)]
    pub original_correlation_id: String,
    pub working_dir: PathBuf,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub archived_at: DateTime<Utc>,
    /// Copy of the transcript. Empty when only metadata was archived.
    #[serde(default)]
    pub archive_path: String,
    #[serde(default)]
    pub size_bytes: u64,
    #[serde(default)]
    pub entry_count: usize,
}

impl ArchiveRecord {
    /// Archive entry for a session whose transcript could not be found.
    pub fn metadata_only(record: &SessionRecord) -> Self {
        Self {
            original_name: record.name.clone(),
            original_correlation_id: record.correlation_id.clone(),
            working_dir: record.working_dir.clone(),
            description: record.description.clone(),
            archived_at: Utc::now(),
            archive_path: String::new(),
            size_bytes: 0,
            entry_count: 0,
        }
    }

    pub fn has_copy(&self) -> bool {
        !self.archive_path.is_empty()
    }

    pub fn matches(&self, name_or_id: &str) -> bool {
        self.original_name == name_or_id
            || (!self.original_correlation_id.is_empty()
                && self.original_correlation_id == name_or_id)
    }
}
