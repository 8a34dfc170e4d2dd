use anyhow::{Context, Result};
use colored::Colorize;
use omnik_core::QueryClient;

use crate::context::AppContext;

pub async fn run(ctx: &AppContext) -> Result<()> {
    let version = ctx
        .client
        .health()
        .await
        .with_context(|| format!("{} is not usable", ctx.client.binary()))?;

    println!("{} {} ({})", "✓".green(), ctx.client.binary(), version);
    Ok(())
}
