//! Session domain module.
//!
//! - `model`: `SessionRecord` and `ArchiveRecord`
//! - `naming`: name sanitising and `cd`-style path resolution
//!
//! The registry that owns these records lives in `omnik-infrastructure`.

mod model;
mod naming;

pub use model::{ArchiveRecord, SessionRecord};
pub use naming::{resolve_working_dir, sanitize_session_name};

/// Name of the session created when a turn arrives and nothing is selected.
pub const DEFAULT_SESSION_NAME: &str = "default";
