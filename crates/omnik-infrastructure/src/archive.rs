//! Session archival.
//!
//! The assistant keeps its own transcript for every conversation under
//! `<transcripts_root>/<working dir with '/' replaced by '-'>/<correlation id>.jsonl`.
//! Archiving copies that file next to a JSON index of [`ArchiveRecord`]s.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::Utc;
use omnik_core::session::sanitize_session_name;
use omnik_core::{ArchiveRecord, OmnikError, Result, SessionRecord};
use tokio::fs;
use tokio::sync::Mutex;

use crate::storage::AtomicJsonFile;

const INDEX_FILE: &str = "index.json";

/// Size of a transcript on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TranscriptStats {
    pub size_bytes: u64,
    /// Non-blank lines; the assistant writes one JSON entry per line.
    pub entry_count: usize,
}

/// Copies transcripts into the archive directory and maintains its index.
#[derive(Debug)]
pub struct SessionArchiver {
    archive_dir: PathBuf,
    transcripts_root: PathBuf,
    index: AtomicJsonFile<Vec<ArchiveRecord>>,
    /// Serializes read-modify-write cycles on the index.
    index_lock: Mutex<()>,
}

impl SessionArchiver {
    pub fn new(archive_dir: impl Into<PathBuf>, transcripts_root: impl Into<PathBuf>) -> Self {
        let archive_dir = archive_dir.into();
        let index = AtomicJsonFile::new(archive_dir.join(INDEX_FILE));
        Self {
            archive_dir,
            transcripts_root: transcripts_root.into(),
            index,
            index_lock: Mutex::new(()),
        }
    }

    pub fn archive_dir(&self) -> &Path {
        &self.archive_dir
    }

    /// Where the transcript for `record` would live. `None` before the first turn.
    pub fn transcript_path(&self, record: &SessionRecord) -> Option<PathBuf> {
        if !record.has_correlation_id() {
            return None;
        }
        let project_dir = record.working_dir.to_string_lossy().replace('/', "-");
        Some(
            self.transcripts_root
                .join(project_dir)
                .join(format!("{}.jsonl", record.correlation_id)),
        )
    }

    /// Size and entry count of the transcript, or `None` if there is none yet.
    pub async fn transcript_stats(&self, record: &SessionRecord) -> Result<Option<TranscriptStats>> {
        let Some(path) = self.transcript_path(record) else {
            return Ok(None);
        };
        read_stats(&path).await
    }

    /// Copies the transcript of `record` into the archive directory.
    ///
    /// Without a readable transcript, or when the copy fails, the result is a
    /// metadata-only entry. The index is not touched; see [`Self::record`].
    pub async fn preserve(&self, record: &SessionRecord) -> Result<ArchiveRecord> {
        fs::create_dir_all(&self.archive_dir).await?;

        let Some(source) = self.transcript_path(record) else {
            return Ok(ArchiveRecord::metadata_only(record));
        };
        let stats = match read_stats(&source).await {
            Ok(Some(stats)) => stats,
            Ok(None) => {
                tracing::debug!(session = %record.name, "no transcript found, archiving metadata only");
                return Ok(ArchiveRecord::metadata_only(record));
            }
            Err(e) => {
                tracing::warn!(session = %record.name, error = %e, "failed to read transcript, archiving metadata only");
                return Ok(ArchiveRecord::metadata_only(record));
            }
        };

        let archived_at = Utc::now();
        let file_name = format!(
            "{}_{}_{}.jsonl",
            sanitize_session_name(&record.name),
            archived_at.format("%Y%m%d_%H%M%S"),
            sanitize_session_name(&record.correlation_id)
        );
        let destination = self.archive_dir.join(file_name);
        if let Err(e) = fs::copy(&source, &destination).await {
            tracing::warn!(
                session = %record.name,
                destination = %destination.display(),
                error = %e,
                "failed to copy transcript, archiving metadata only"
            );
            return Ok(ArchiveRecord::metadata_only(record));
        }

        Ok(ArchiveRecord {
            archived_at,
            archive_path: destination.to_string_lossy().into_owned(),
            size_bytes: stats.size_bytes,
            entry_count: stats.entry_count,
            ..ArchiveRecord::metadata_only(record)
        })
    }

    /// Appends `archive` to the index.
    pub async fn record(&self, archive: &ArchiveRecord) -> Result<()> {
        let _guard = self.index_lock.lock().await;
        let mut archives = self.index.load().await?.unwrap_or_default();
        archives.push(archive.clone());
        self.index.save(&archives).await
    }

    /// Removes the copy made by [`Self::preserve`] for an archive that was never recorded.
    pub async fn discard(&self, archive: &ArchiveRecord) {
        if !archive.has_copy() {
            return;
        }
        match fs::remove_file(&archive.archive_path).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(archive_path = %archive.archive_path, error = %e, "failed to remove unrecorded archive copy");
            }
        }
    }

    pub async fn list(&self) -> Result<Vec<ArchiveRecord>> {
        Ok(self.index.load().await?.unwrap_or_default())
    }

    /// First archive whose original name or correlation id matches.
    pub async fn get(&self, name_or_id: &str) -> Result<ArchiveRecord> {
        self.list()
            .await?
            .into_iter()
            .find(|archive| archive.matches(name_or_id))
            .ok_or_else(|| OmnikError::not_found("Archive", name_or_id))
    }

    /// Removes the archived copy and its index entry.
    pub async fn delete(&self, name_or_id: &str) -> Result<ArchiveRecord> {
        let _guard = self.index_lock.lock().await;
        let mut archives = self.index.load().await?.unwrap_or_default();
        let position = archives
            .iter()
            .position(|archive| archive.matches(name_or_id))
            .ok_or_else(|| OmnikError::not_found("Archive", name_or_id))?;

        let removed = archives.remove(position);
        if removed.has_copy() {
            match fs::remove_file(&removed.archive_path).await {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }

        self.index.save(&archives).await?;
        Ok(removed)
    }
}

async fn read_stats(path: &Path) -> Result<Option<TranscriptStats>> {
    let bytes = match fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let entry_count = bytes
        .split(|b| *b == b'\n')
        .filter(|line| line.iter().any(|b| !b.is_ascii_whitespace()))
        .count();

    Ok(Some(TranscriptStats {
        size_bytes: bytes.len() as u64,
        entry_count,
    }))
}
