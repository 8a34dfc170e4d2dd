//! Error types for omnik.

use thiserror::Error;

/// A shared error type for the registry, configuration and transport layers.
///
/// Subprocess failures have their own type ([`QueryError`]) because they travel
/// over the query client's error stream rather than through `?`.
#[derive(Error, Debug, Clone)]
pub enum OmnikError {
    /// Entity not found error with type information
    #[error("Entity not found: {entity_type} '{id}'")]
    NotFound {
        entity_type: &'static str,
        id: String,
    },

    /// Entity already exists
    #[error("Entity already exists: {entity_type} '{id}'")]
    AlreadyExists {
        entity_type: &'static str,
        id: String,
    },

    /// Caller supplied something unusable (empty name, bad path, ...)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// IO error (file system operations)
    #[error("IO error: {message}")]
    Io { message: String },

    /// Serialization/deserialization error
    #[error("Serialization error: {format} - {message}")]
    Serialization {
        format: String, // "TOML", "JSON"
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// An operation needed a current session but none is selected
    #[error("No current session")]
    NoCurrentSession,

    /// The external assistant process could not be driven
    #[error("Subprocess error: {0}")]
    Subprocess(String),

    /// The chat transport rejected a create/edit call
    #[error("Transport error: {0}")]
    Transport(String),

    /// Internal error (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl OmnikError {
    // ============================================================================
    // Constructor helpers
    // ============================================================================

    /// Creates a NotFound error
    pub fn not_found(entity_type: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type,
            id: id.into(),
        }
    }

    /// Creates an AlreadyExists error
    pub fn already_exists(entity_type: &'static str, id: impl Into<String>) -> Self {
        Self::AlreadyExists {
            entity_type,
            id: id.into(),
        }
    }

    /// Creates an IO error
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    /// Creates a Config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Creates a Transport error
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    /// Creates an Internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    // ============================================================================
    // Type checking methods
    // ============================================================================

    /// Check if this is a NotFound error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if this is an AlreadyExists error
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }

    /// Check if this is an IO error
    pub fn is_io(&self) -> bool {
        matches!(self, Self::Io { .. })
    }

    /// Short text that is safe to show on the chat transport.
    ///
    /// Paths, OS error codes and parser positions stay in the logs.
    pub fn user_summary(&self) -> String {
        match self {
            Self::NotFound { entity_type, id } => format!("{} '{}' not found", entity_type, id),
            Self::AlreadyExists { entity_type, id } => {
                format!("{} '{}' already exists", entity_type, id)
            }
            Self::InvalidInput(message) => message.clone(),
            Self::Io { .. } | Self::Serialization { .. } => {
                "could not read or save session data".to_string()
            }
            Self::Config(_) => "configuration problem, check the server logs".to_string(),
            Self::NoCurrentSession => {
                "no active session, create one with `session new`".to_string()
            }
            Self::Subprocess(_) => "the assistant process failed".to_string(),
            Self::Transport(_) => "could not update the chat".to_string(),
            Self::Internal(_) => "internal error".to_string(),
        }
    }
}

// ============================================================================
// From implementations for automatic conversion
// ============================================================================

impl From<std::io::Error> for OmnikError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: format!("{} (kind: {:?})", err, err.kind()),
        }
    }
}

impl From<serde_json::Error> for OmnikError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            format: "JSON".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<toml::de::Error> for OmnikError {
    fn from(err: toml::de::Error) -> Self {
        Self::Serialization {
            format: "TOML".to_string(),
            message: err.to_string(),
        }
    }
}

/// A type alias for `Result<T, OmnikError>`.
pub type Result<T> = std::result::Result<T, OmnikError>;

/// Failure of one subprocess run, delivered on the query client's error stream.
#[derive(Error, Debug)]
pub enum QueryError {
    #[error("failed to start {binary}: {source}")]
    Spawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    #[error("error reading assistant output: {0}")]
    Read(#[source] std::io::Error),

    #[error("assistant exited with status {}", code.map_or_else(|| "signal".to_string(), |c| c.to_string()))]
    Exited { code: Option<i32> },

    #[error("failed waiting for assistant process: {0}")]
    Wait(#[source] std::io::Error),
}

impl QueryError {
    /// Short text that is safe to show on the chat transport.
    pub fn user_summary(&self) -> String {
        match self {
            Self::Spawn { binary, .. } => {
                format!("could not start `{}`, is it installed?", binary)
            }
            Self::Read(_) => "lost the assistant's output stream".to_string(),
            Self::Exited { code: Some(code) } => format!("assistant exited with code {}", code),
            Self::Exited { code: None } => "assistant was terminated".to_string(),
            Self::Wait(_) => "lost track of the assistant process".to_string(),
        }
    }
}
