pub mod archive;
pub mod config_service;
pub mod paths;
pub mod session_registry;
pub mod storage;

pub use crate::archive::{SessionArchiver, TranscriptStats};
pub use crate::config_service::ConfigService;
pub use crate::paths::{OmnikPaths, ResolvedRegistryPaths};
pub use crate::session_registry::{RegistryDocument, SessionRegistry};
