pub mod config;
pub mod content_log;
pub mod error;
pub mod event;
pub mod query;
pub mod session;
pub mod tool_preview;
pub mod transport;

// Re-export common types
pub use config::OmnikConfig;
pub use content_log::{ContentAggregator, ContentLog, ContentLogEntry, EntryKind};
pub use error::{OmnikError, QueryError, Result};
pub use event::{ContentItem, MalformedReason, StreamEvent};
pub use query::{PermissionMode, QueryClient, QueryRequest, QueryStream};
pub use session::{ArchiveRecord, SessionRecord};
pub use transport::{CancelAffordance, ChatTransport, ContainerId};
