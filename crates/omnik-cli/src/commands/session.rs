use std::path::Path;

use anyhow::{bail, Context, Result};
use colored::Colorize;
use omnik_core::session::{resolve_working_dir, sanitize_session_name};
use omnik_core::{ArchiveRecord, SessionRecord};

use crate::context::AppContext;

pub async fn new(ctx: &AppContext, name: &str, description: &str, dir: Option<&str>) -> Result<()> {
    let working_dir = match dir {
        Some(dir) => {
            let cwd = std::env::current_dir().context("failed to read current directory")?;
            resolve_working_dir(&cwd, dir)
        }
        None => ctx.paths.default_working_dir.join(sanitize_session_name(name)),
    };

    tokio::fs::create_dir_all(&working_dir)
        .await
        .with_context(|| format!("failed to create {}", working_dir.display()))?;

    let record = ctx.registry.create(name, description, working_dir).await?;
    println!("{} Created session '{}'", "✓".green(), record.name.bold());
    print_record(&record, None);
    Ok(())
}

pub async fn list(ctx: &AppContext) -> Result<()> {
    let sessions = ctx.registry.list().await;
    if sessions.is_empty() {
        println!("No sessions. Create one with `omnik session new <name>`.");
        return Ok(());
    }

    let current = ctx.registry.current().await.map(|record| record.name);
    for record in sessions {
        let marker = if current.as_deref() == Some(record.name.as_str()) {
            "*".green().to_string()
        } else {
            " ".to_string()
        };
        let size = match ctx.registry.session_size(&record.name).await {
            Ok(stats) => format!("{} entries, {}", stats.entry_count, human_size(stats.size_bytes)),
            Err(e) => {
                tracing::warn!(session = %record.name, error = %e, "failed to read transcript size");
                "size unknown".to_string()
            }
        };
        println!(
            "{} {:<20} {}  {}",
            marker,
            record.name.bold(),
            record.working_dir.display(),
            format!("({}, last used {})", size, record.last_used_at.format("%Y-%m-%d %H:%M")).dimmed()
        );
    }
    Ok(())
}

pub async fn switch(ctx: &AppContext, name_or_id: &str) -> Result<()> {
    let record = ctx.registry.switch(name_or_id).await?;
    println!("{} Switched to '{}'", "✓".green(), record.name.bold());
    Ok(())
}

pub async fn current(ctx: &AppContext) -> Result<()> {
    match ctx.registry.current().await {
        Some(record) => {
            let stats = ctx.registry.session_size(&record.name).await.ok();
            print_record(&record, stats.map(|s| (s.entry_count, s.size_bytes)));
        }
        None => println!("No current session."),
    }
    Ok(())
}

pub async fn cd(ctx: &AppContext, path: &str) -> Result<()> {
    let Some(record) = ctx.registry.current().await else {
        bail!("no current session; create or switch to one first");
    };

    let target = resolve_working_dir(&record.working_dir, path);
    if !is_dir(&target).await {
        bail!("{} is not a directory", target.display());
    }

    let record = ctx.registry.update_working_dir(target).await?;
    println!("{} {}", "✓".green(), record.working_dir.display());
    Ok(())
}

pub async fn delete(ctx: &AppContext, name_or_id: &str) -> Result<()> {
    let name = ctx.registry.get(name_or_id).await?.name;
    match ctx.registry.delete(name_or_id).await? {
        Some(archive) if archive.has_copy() => println!(
            "{} Deleted '{}', transcript archived to {}",
            "✓".green(),
            name.bold(),
            archive.archive_path
        ),
        Some(_) => println!("{} Deleted '{}' (no transcript to archive)", "✓".green(), name.bold()),
        None => println!(
            "{} Deleted '{}' {}",
            "✓".green(),
            name.bold(),
            "(archiving failed, see log)".yellow()
        ),
    }
    Ok(())
}

pub async fn reload(ctx: &AppContext) -> Result<()> {
    let Some(record) = ctx.registry.current().await else {
        bail!("no current session to reload");
    };
    let record = ctx.registry.reload(&record.name).await?;
    println!("{} Reloaded '{}' with a fresh conversation", "✓".green(), record.name.bold());
    Ok(())
}

pub async fn archives(ctx: &AppContext) -> Result<()> {
    let archives = ctx.registry.list_archives().await?;
    if archives.is_empty() {
        println!("No archives.");
        return Ok(());
    }
    for archive in &archives {
        println!(
            "{:<20} {}  {}",
            archive.original_name.bold(),
            archive.archived_at.format("%Y-%m-%d %H:%M"),
            format!("({} entries, {})", archive.entry_count, human_size(archive.size_bytes)).dimmed()
        );
    }
    Ok(())
}

pub async fn archive_show(ctx: &AppContext, name_or_id: &str) -> Result<()> {
    let archive = ctx.registry.get_archive(name_or_id).await?;
    print_archive(&archive);
    Ok(())
}

pub async fn archive_delete(ctx: &AppContext, name_or_id: &str) -> Result<()> {
    let archive = ctx.registry.delete_archive(name_or_id).await?;
    println!("{} Deleted archive of '{}'", "✓".green(), archive.original_name.bold());
    Ok(())
}

fn print_record(record: &SessionRecord, stats: Option<(usize, u64)>) {
    println!("  name:        {}", record.name);
    if !record.description.is_empty() {
        println!("  description: {}", record.description);
    }
    println!("  directory:   {}", record.working_dir.display());
    println!(
        "  conversation: {}",
        record.resume_id().unwrap_or("(not started)")
    );
    println!("  created:     {}", record.created_at.format("%Y-%m-%d %H:%M"));
    println!("  last used:   {}", record.last_used_at.format("%Y-%m-%d %H:%M"));
    if let Some((entries, bytes)) = stats {
        println!("  transcript:  {} entries, {}", entries, human_size(bytes));
    }
}

fn print_archive(archive: &ArchiveRecord) {
    println!("  name:        {}", archive.original_name);
    if !archive.description.is_empty() {
        println!("  description: {}", archive.description);
    }
    println!("  directory:   {}", archive.working_dir.display());
    println!("  conversation: {}", archive.original_correlation_id);
    println!("  archived:    {}", archive.archived_at.format("%Y-%m-%d %H:%M"));
    if archive.has_copy() {
        println!("  transcript:  {}", archive.archive_path);
        println!(
            "               {} entries, {}",
            archive.entry_count,
            human_size(archive.size_bytes)
        );
    } else {
        println!("  transcript:  {}", "(metadata only)".dimmed());
    }
}

async fn is_dir(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|meta| meta.is_dir())
        .unwrap_or(false)
}

fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", bytes)
    } else {
        format!("{:.1} {}", size, UNITS[unit])
    }
}
