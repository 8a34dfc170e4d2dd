use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod context;
mod logging;
mod terminal;

#[derive(Parser)]
#[command(name = "omnik")]
#[command(about = "omnik - chat with the Claude CLI through streamed, editable messages", long_about = None)]
struct Cli {
    /// Config file (defaults to ~/.config/omnik/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send a prompt to the assistant in the current session
    Ask {
        /// Conversation key used for single-flight and stop
        #[arg(long, default_value = "terminal")]
        key: String,

        /// Model for this turn only
        #[arg(long)]
        model: Option<String>,

        /// Prompt text
        #[arg(required = true, trailing_var_arg = true)]
        prompt: Vec<String>,
    },
    /// Check that the assistant binary responds
    Health,
    /// Manage sessions
    Session {
        #[command(subcommand)]
        action: SessionAction,
    },
}

#[derive(Subcommand)]
enum SessionAction {
    /// Create a session and make it current
    New {
        name: String,
        #[arg(long, default_value = "")]
        description: String,
        /// Working directory (defaults to a directory named after the session)
        #[arg(long)]
        dir: Option<String>,
    },
    /// List sessions
    List,
    /// Make a session current
    Switch { name_or_id: String },
    /// Show the current session
    Current,
    /// Change the current session's working directory
    Cd { path: String },
    /// Delete a session, archiving its transcript
    Delete { name_or_id: String },
    /// Start the current session over with a fresh conversation
    Reload,
    /// List archived sessions
    Archives,
    /// Show one archived session
    ArchiveShow { name_or_id: String },
    /// Delete an archived session and its transcript copy
    ArchiveDelete { name_or_id: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.log_json)?;

    let ctx = context::AppContext::load(cli.config.as_deref()).await?;

    match cli.command {
        Commands::Ask { key, model, prompt } => {
            commands::ask::run(&ctx, key, model, prompt.join(" ")).await?
        }
        Commands::Health => commands::health::run(&ctx).await?,
        Commands::Session { action } => match action {
            SessionAction::New {
                name,
                description,
                dir,
            } => commands::session::new(&ctx, &name, &description, dir.as_deref()).await?,
            SessionAction::List => commands::session::list(&ctx).await?,
            SessionAction::Switch { name_or_id } => commands::session::switch(&ctx, &name_or_id).await?,
            SessionAction::Current => commands::session::current(&ctx).await?,
            SessionAction::Cd { path } => commands::session::cd(&ctx, &path).await?,
            SessionAction::Delete { name_or_id } => commands::session::delete(&ctx, &name_or_id).await?,
            SessionAction::Reload => commands::session::reload(&ctx).await?,
            SessionAction::Archives => commands::session::archives(&ctx).await?,
            SessionAction::ArchiveShow { name_or_id } => {
                commands::session::archive_show(&ctx, &name_or_id).await?
            }
            SessionAction::ArchiveDelete { name_or_id } => {
                commands::session::archive_delete(&ctx, &name_or_id).await?
            }
        },
    }

    Ok(())
}
