//! Durable map from session name to [`SessionRecord`].
//!
//! The whole registry is one JSON document, rewritten on every mutation.
//! Mutations are applied to a copy of the document, persisted, and only then
//! swapped in, so a failed write leaves memory untouched.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::Utc;
use omnik_core::session::DEFAULT_SESSION_NAME;
use omnik_core::{ArchiveRecord, OmnikError, Result, SessionRecord};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::archive::{SessionArchiver, TranscriptStats};
use crate::storage::AtomicJsonFile;

/// On-disk shape of the registry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegistryDocument {
    #[serde(default)]
    pub sessions: BTreeMap<String, SessionRecord>,
    /// Name of the selected session.
    #[serde(default)]
    pub current: Option<String>,
}

impl RegistryDocument {
    /// Looks up by name first, then by correlation id.
    fn find(&self, name_or_id: &str) -> Option<&SessionRecord> {
        self.sessions
            .get(name_or_id)
            .or_else(|| self.sessions.values().find(|record| record.matches(name_or_id)))
    }

    fn key_of(&self, name_or_id: &str) -> Result<String> {
        self.find(name_or_id)
            .map(|record| record.name.clone())
            .ok_or_else(|| OmnikError::not_found("Session", name_or_id))
    }

    fn current_record(&self) -> Option<&SessionRecord> {
        self.current.as_ref().and_then(|name| self.sessions.get(name))
    }
}

/// Session registry backed by a single JSON document.
pub struct SessionRegistry {
    document: RwLock<RegistryDocument>,
    file: AtomicJsonFile<RegistryDocument>,
    archiver: SessionArchiver,
}

impl SessionRegistry {
    /// Opens the registry at `sessions_file`.
    ///
    /// A missing file yields an empty registry. Any other read or parse
    /// failure is returned.
    pub async fn open(sessions_file: impl Into<PathBuf>, archiver: SessionArchiver) -> Result<Self> {
        let file = AtomicJsonFile::<RegistryDocument>::new(sessions_file);
        let mut document: RegistryDocument = file.load().await?.unwrap_or_default();

        if let Some(current) = &document.current {
            if !document.sessions.contains_key(current) {
                tracing::warn!(session = %current, "current session missing from registry, clearing");
                document.current = None;
            }
        }

        tracing::debug!(
            path = %file.path().display(),
            sessions = document.sessions.len(),
            "session registry loaded"
        );

        Ok(Self {
            document: RwLock::new(document),
            file,
            archiver,
        })
    }

    pub fn archiver(&self) -> &SessionArchiver {
        &self.archiver
    }

    /// Persists `next` and swaps it in. On failure `current` is left as it was.
    async fn commit(&self, current: &mut RegistryDocument, next: RegistryDocument) -> Result<()> {
        self.file.save(&next).await?;
        *current = next;
        Ok(())
    }

    /// Creates a session and makes it current.
    pub async fn create(
        &self,
        name: &str,
        description: &str,
        working_dir: impl Into<PathBuf>,
    ) -> Result<SessionRecord> {
        let name = name.trim();
        if name.is_empty() {
            return Err(OmnikError::InvalidInput("session name must not be empty".to_string()));
        }

        let mut document = self.document.write().await;
        if document.sessions.contains_key(name) {
            return Err(OmnikError::already_exists("Session", name));
        }

        let record = SessionRecord::new(name, description, working_dir);
        let mut next = document.clone();
        next.sessions.insert(name.to_string(), record.clone());
        next.current = Some(name.to_string());
        self.commit(&mut document, next).await?;

        tracing::info!(session = %name, working_dir = %record.working_dir.display(), "session created");
        Ok(record)
    }

    /// Makes an existing session current.
    pub async fn switch(&self, name_or_id: &str) -> Result<SessionRecord> {
        let mut document = self.document.write().await;
        let key = document.key_of(name_or_id)?;

        let mut next = document.clone();
        let record = next
            .sessions
            .get_mut(&key)
            .ok_or_else(|| OmnikError::not_found("Session", name_or_id))?;
        record.last_used_at = Utc::now();
        let record = record.clone();
        next.current = Some(key.clone());
        self.commit(&mut document, next).await?;

        tracing::info!(session = %key, "switched session");
        Ok(record)
    }

    pub async fn current(&self) -> Option<SessionRecord> {
        self.document.read().await.current_record().cloned()
    }

    pub async fn get(&self, name_or_id: &str) -> Result<SessionRecord> {
        self.document
            .read()
            .await
            .find(name_or_id)
            .cloned()
            .ok_or_else(|| OmnikError::not_found("Session", name_or_id))
    }

    /// All sessions, ordered by name.
    pub async fn list(&self) -> Vec<SessionRecord> {
        self.document.read().await.sessions.values().cloned().collect()
    }

    /// Records the assistant's conversation id for `name`.
    ///
    /// The first id wins: returns `false` without writing when the session
    /// already has one.
    pub async fn update_correlation_id(&self, name: &str, correlation_id: &str) -> Result<bool> {
        let mut document = self.document.write().await;
        let existing = document
            .sessions
            .get(name)
            .ok_or_else(|| OmnikError::not_found("Session", name))?;

        if existing.has_correlation_id() || correlation_id.is_empty() {
            if existing.correlation_id != correlation_id {
                tracing::debug!(
                    session = %name,
                    kept = %existing.correlation_id,
                    ignored = %correlation_id,
                    "correlation id already set"
                );
            }
            return Ok(false);
        }

        let mut next = document.clone();
        if let Some(record) = next.sessions.get_mut(name) {
            record.correlation_id = correlation_id.to_string();
            record.last_used_at = Utc::now();
        }
        self.commit(&mut document, next).await?;

        tracing::info!(session = %name, correlation_id = %correlation_id, "correlation id recorded");
        Ok(true)
    }

    /// Changes the working directory of the current session.
    pub async fn update_working_dir(&self, working_dir: impl Into<PathBuf>) -> Result<SessionRecord> {
        let mut document = self.document.write().await;
        let key = document.current.clone().ok_or(OmnikError::NoCurrentSession)?;

        let mut next = document.clone();
        let record = next
            .sessions
            .get_mut(&key)
            .ok_or(OmnikError::NoCurrentSession)?;
        record.working_dir = working_dir.into();
        record.last_used_at = Utc::now();
        let record = record.clone();
        self.commit(&mut document, next).await?;

        tracing::info!(session = %key, working_dir = %record.working_dir.display(), "working directory updated");
        Ok(record)
    }

    /// Bumps `last_used_at` of a session.
    pub async fn touch(&self, name: &str) -> Result<()> {
        let mut document = self.document.write().await;
        let mut next = document.clone();
        let record = next
            .sessions
            .get_mut(name)
            .ok_or_else(|| OmnikError::not_found("Session", name))?;
        record.last_used_at = Utc::now();
        self.commit(&mut document, next).await
    }

    /// Deletes a session, archiving it first.
    ///
    /// Archival is best-effort: a failure is logged and the deletion goes
    /// ahead. The archive is indexed only once the deletion is persisted.
    /// Returns the archive entry when one was written.
    pub async fn delete(&self, name_or_id: &str) -> Result<Option<ArchiveRecord>> {
        let mut document = self.document.write().await;
        let key = document.key_of(name_or_id)?;
        let record = document
            .sessions
            .get(&key)
            .cloned()
            .ok_or_else(|| OmnikError::not_found("Session", name_or_id))?;

        let preserved = match self.archiver.preserve(&record).await {
            Ok(archive) => Some(archive),
            Err(e) => {
                tracing::warn!(session = %key, error = %e, "failed to archive session before deletion");
                None
            }
        };

        let mut next = document.clone();
        next.sessions.remove(&key);
        if next.current.as_deref() == Some(key.as_str()) {
            next.current = None;
        }
        if let Err(e) = self.commit(&mut document, next).await {
            // The session stays, so its archive must not be indexed.
            if let Some(archive) = &preserved {
                self.archiver.discard(archive).await;
            }
            return Err(e);
        }
        tracing::info!(session = %key, "session deleted");

        let Some(archive) = preserved else {
            return Ok(None);
        };
        if let Err(e) = self.archiver.record(&archive).await {
            tracing::warn!(session = %key, error = %e, "failed to record archive");
            self.archiver.discard(&archive).await;
            return Ok(None);
        }
        tracing::info!(
            session = %key,
            archive_path = %archive.archive_path,
            size_bytes = archive.size_bytes,
            entries = archive.entry_count,
            "session archived"
        );
        Ok(Some(archive))
    }

    /// Deletes a session and recreates it with a fresh conversation.
    ///
    /// Name, description and working directory carry over; the correlation id
    /// does not. The recreated session becomes current.
    pub async fn reload(&self, name_or_id: &str) -> Result<SessionRecord> {
        let record = self.get(name_or_id).await?;
        self.delete(&record.name).await?;
        self.create(&record.name, &record.description, record.working_dir)
            .await
    }

    /// Transcript size of a session. Zero before its first turn.
    pub async fn session_size(&self, name_or_id: &str) -> Result<TranscriptStats> {
        let record = self.get(name_or_id).await?;
        Ok(self
            .archiver
            .transcript_stats(&record)
            .await?
            .unwrap_or_default())
    }

    /// Returns the current session, selecting or creating `default` when none is.
    pub async fn current_or_create_default(
        &self,
        default_working_dir: impl Into<PathBuf>,
    ) -> Result<SessionRecord> {
        if let Some(record) = self.current().await {
            return Ok(record);
        }

        match self.switch(DEFAULT_SESSION_NAME).await {
            Ok(record) => Ok(record),
            Err(e) if e.is_not_found() => {
                match self
                    .create(DEFAULT_SESSION_NAME, "Default session", default_working_dir)
                    .await
                {
                    // Lost a race with another turn creating it.
                    Err(e) if e.is_already_exists() => self.switch(DEFAULT_SESSION_NAME).await,
                    other => other,
                }
            }
            Err(e) => Err(e),
        }
    }

    pub async fn list_archives(&self) -> Result<Vec<ArchiveRecord>> {
        self.archiver.list().await
    }

    pub async fn get_archive(&self, name_or_id: &str) -> Result<ArchiveRecord> {
        self.archiver.get(name_or_id).await
    }

    pub async fn delete_archive(&self, name_or_id: &str) -> Result<ArchiveRecord> {
        self.archiver.delete(name_or_id).await
    }
}
