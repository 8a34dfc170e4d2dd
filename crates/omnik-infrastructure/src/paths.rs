//! Unified path management for omnik state files.
//!
//! # Directory Structure
//!
//! ```text
//! ~/.config/omnik/             # Config directory
//! └── config.toml              # Application configuration
//!
//! ~/.local/share/omnik/        # Data directory
//! ├── sessions.json            # Session registry document
//! └── archives/                # Archived transcripts
//!     └── index.json           # Archive index
//!
//! ~/.claude/projects/          # Transcripts written by the assistant itself
//! ```

use std::path::PathBuf;

use omnik_core::config::RegistryConfig;
use omnik_core::{OmnikError, Result};

const APP_NAME: &str = "omnik";

/// Resolves platform directories through `dirs`.
pub struct OmnikPaths;

impl OmnikPaths {
    /// Returns the omnik configuration directory (e.g. `~/.config/omnik/`).
    pub fn config_dir() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join(APP_NAME))
            .ok_or_else(|| OmnikError::config("cannot determine config directory"))
    }

    /// Returns the omnik data directory (e.g. `~/.local/share/omnik/`).
    pub fn data_dir() -> Result<PathBuf> {
        dirs::data_dir()
            .map(|dir| dir.join(APP_NAME))
            .ok_or_else(|| OmnikError::config("cannot determine data directory"))
    }

    pub fn config_file() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    pub fn sessions_file() -> Result<PathBuf> {
        Ok(Self::data_dir()?.join("sessions.json"))
    }

    pub fn archive_dir() -> Result<PathBuf> {
        Ok(Self::data_dir()?.join("archives"))
    }

    /// Where the assistant keeps its per-project transcripts.
    pub fn transcripts_root() -> Result<PathBuf> {
        dirs::home_dir()
            .map(|home| home.join(".claude").join("projects"))
            .ok_or_else(|| OmnikError::config("cannot determine home directory"))
    }

    /// Working directory for sessions created without one.
    pub fn default_working_dir() -> Result<PathBuf> {
        dirs::home_dir()
            .or_else(|| std::env::current_dir().ok())
            .ok_or_else(|| OmnikError::config("cannot determine a default working directory"))
    }
}

/// Registry locations with every unset path resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRegistryPaths {
    pub sessions_file: PathBuf,
    pub archive_dir: PathBuf,
    pub transcripts_root: PathBuf,
    pub default_working_dir: PathBuf,
}

impl ResolvedRegistryPaths {
    pub fn resolve(config: &RegistryConfig) -> Result<Self> {
        Ok(Self {
            sessions_file: match &config.sessions_file {
                Some(path) => path.clone(),
                None => OmnikPaths::sessions_file()?,
            },
            archive_dir: match &config.archive_dir {
                Some(path) => path.clone(),
                None => OmnikPaths::archive_dir()?,
            },
            transcripts_root: match &config.transcripts_root {
                Some(path) => path.clone(),
                None => OmnikPaths::transcripts_root()?,
            },
            default_working_dir: match &config.default_working_dir {
                Some(path) => path.clone(),
                None => OmnikPaths::default_working_dir()?,
            },
        })
    }
}
