pub mod claude_cli;
pub mod stream_json;

pub use claude_cli::ClaudeCliClient;
pub use stream_json::parse_line;
