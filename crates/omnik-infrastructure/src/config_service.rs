//! Loads [`OmnikConfig`] from `config.toml` plus `OMNI_*` environment overrides.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use omnik_core::config::OmnikConfig;
use omnik_core::{OmnikError, PermissionMode, Result};

use crate::paths::OmnikPaths;

/// Environment variables read by [`ConfigService::load_from_env`].
pub const ENV_OVERRIDES: &[&str] = &[
    "OMNI_CLAUDE_BINARY",
    "OMNI_CLAUDE_MODEL",
    "OMNI_PERMISSION_MODE",
    "OMNI_SESSIONS_FILE",
    "OMNI_ARCHIVE_DIR",
    "OMNI_TRANSCRIPTS_ROOT",
    "OMNI_WORKSPACE",
    "OMNI_MAX_CONTAINER_CHARS",
];

pub struct ConfigService;

impl ConfigService {
    /// Reads the config file and applies overrides from the process environment.
    ///
    /// `path` defaults to `~/.config/omnik/config.toml`.
    pub fn load_from_env(path: Option<&Path>) -> Result<OmnikConfig> {
        let overrides = ENV_OVERRIDES
            .iter()
            .filter_map(|key| std::env::var(key).ok().map(|value| (key.to_string(), value)));
        Self::load(path, overrides)
    }

    /// Reads the config file, then applies `overrides`.
    ///
    /// A missing file yields defaults. An unreadable or invalid file is an error.
    pub fn load<I>(path: Option<&Path>, overrides: I) -> Result<OmnikConfig>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => OmnikPaths::config_file()?,
        };

        let mut config = Self::read_file(&path)?;
        Self::apply_overrides(&mut config, overrides)?;
        Ok(config)
    }

    fn read_file(path: &Path) -> Result<OmnikConfig> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no config file, using defaults");
                return Ok(OmnikConfig::default());
            }
            Err(e) => {
                return Err(OmnikError::config(format!(
                    "failed to read {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        toml::from_str(&content)
            .map_err(|e| OmnikError::config(format!("invalid {}: {}", path.display(), e)))
    }

    /// Applies `OMNI_*` key/value pairs. Unknown keys are ignored.
    pub fn apply_overrides<I>(config: &mut OmnikConfig, overrides: I) -> Result<()>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in overrides {
            let value = value.trim().to_string();
            match key.as_str() {
                "OMNI_CLAUDE_BINARY" if !value.is_empty() => config.client.binary = value,
                "OMNI_CLAUDE_MODEL" => {
                    config.client.model = (!value.is_empty()).then_some(value);
                }
                "OMNI_PERMISSION_MODE" if !value.is_empty() => {
                    config.client.permission_mode = PermissionMode::from_str(&value).map_err(|_| {
                        OmnikError::config(format!("unknown permission mode '{}'", value))
                    })?;
                }
                "OMNI_SESSIONS_FILE" if !value.is_empty() => {
                    config.registry.sessions_file = Some(PathBuf::from(value));
                }
                "OMNI_ARCHIVE_DIR" if !value.is_empty() => {
                    config.registry.archive_dir = Some(PathBuf::from(value));
                }
                "OMNI_TRANSCRIPTS_ROOT" if !value.is_empty() => {
                    config.registry.transcripts_root = Some(PathBuf::from(value));
                }
                "OMNI_WORKSPACE" if !value.is_empty() => {
                    config.registry.default_working_dir = Some(PathBuf::from(value));
                }
                "OMNI_MAX_CONTAINER_CHARS" if !value.is_empty() => {
                    let chars: usize = value.parse().map_err(|_| {
                        OmnikError::config(format!("OMNI_MAX_CONTAINER_CHARS must be a number, got '{}'", value))
                    })?;
                    if chars == 0 {
                        return Err(OmnikError::config("OMNI_MAX_CONTAINER_CHARS must be at least 1"));
                    }
                    config.render.max_container_chars = chars;
                }
                _ => {}
            }
        }

        if config.render.max_container_chars == 0 {
            return Err(OmnikError::config("render.max_container_chars must be at least 1"));
        }

        Ok(())
    }
}
