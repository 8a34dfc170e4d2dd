use std::sync::Arc;

use anyhow::{bail, Result};
use colored::Colorize;
use omnik_application::{TurnOutcome, TurnRequest};
use omnik_core::QueryClient;

use crate::context::AppContext;
use crate::terminal::TerminalTransport;

pub async fn run(ctx: &AppContext, key: String, model: Option<String>, prompt: String) -> Result<()> {
    if let Err(e) = ctx.client.health().await {
        tracing::warn!(error = %e, "assistant health check failed, trying anyway");
    }

    let orchestrator = Arc::new(ctx.orchestrator(Arc::new(TerminalTransport::new())));

    // Ctrl-C stops the turn instead of killing omnik, so the stop path runs.
    let stopper = {
        let orchestrator = orchestrator.clone();
        let key = key.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                orchestrator.stop(&key).await;
            }
        })
    };

    let mut request = TurnRequest::new(key, prompt);
    if let Some(model) = model {
        request = request.with_model(model);
    }

    let outcome = orchestrator.run_turn(request).await;
    stopper.abort();
    println!();

    match outcome? {
        TurnOutcome::Completed { session, containers } => {
            tracing::debug!(session = %session, containers, "turn completed");
            eprintln!("{}", format!("[session: {}]", session).dimmed());
            Ok(())
        }
        TurnOutcome::Stopped => Ok(()),
        TurnOutcome::Busy => Ok(()),
        TurnOutcome::Failed { summary } => bail!(summary),
    }
}
