//! Cache command - inspect and prune the binary cache

use crate::cache::{format_bytes, BinaryCache, CacheEntry};
use crate::cli::args::{CacheAction, CacheArgs, OutputFormat};
use crate::config::{Config, Overrides};
use crate::error::ProviderResult;
use chrono::Utc;
use console::style;
use std::io::{self, Write};
use std::path::PathBuf;
use tracing::debug;

/// Execute the cache command
pub async fn execute(
    args: CacheArgs,
    config: &Config,
    bin_dir: Option<PathBuf>,
) -> ProviderResult<()> {
    let resolved = config.resolve(&Overrides {
        bin_dir,
        ..Default::default()
    });
    let cache = BinaryCache::new(resolved.bin_dir);

    match args.action {
        CacheAction::Path => {
            println!("{}", cache.root().display());
            Ok(())
        }
        CacheAction::List { format } => list_binaries(&cache, format).await,
        CacheAction::Remove { id } => remove_binary(&cache, &id).await,
        CacheAction::Gc { days, dry_run } => gc_binaries(&cache, config, days, dry_run).await,
        CacheAction::Clear { yes } => clear_binaries(&cache, yes).await,
    }
}

/// List cached binaries
async fn list_binaries(cache: &BinaryCache, format: OutputFormat) -> ProviderResult<()> {
    let entries = cache.entries().await?;

    match format {
        OutputFormat::Table => print_table(&entries),
        OutputFormat::Json => print_json(&entries)?,
        OutputFormat::Plain => print_plain(&entries),
    }

    Ok(())
}

fn print_table(entries: &[CacheEntry]) {
    if entries.is_empty() {
        println!("No cached binaries.");
        return;
    }

    println!("{:<44} {:<10} {:<20}", "BUILD ID", "SIZE", "CREATED");
    println!("{}", "-".repeat(76));

    for entry in entries {
        let created = entry.modified.format("%Y-%m-%d %H:%M").to_string();
        println!(
            "{:<44} {:<10} {:<20}",
            entry.id,
            format_bytes(entry.size),
            created
        );
    }

    let total: u64 = entries.iter().map(|e| e.size).sum();
    println!();
    println!(
        "Total: {} binary(s), {}",
        entries.len(),
        format_bytes(total)
    );
}

fn print_json(entries: &[CacheEntry]) -> ProviderResult<()> {
    #[derive(serde::Serialize)]
    struct EntryJson<'a> {
        id: &'a str,
        path: String,
        size: u64,
        created_at: String,
    }

    let json_entries: Vec<EntryJson> = entries
        .iter()
        .map(|e| EntryJson {
            id: &e.id,
            path: e.path.display().to_string(),
            size: e.size,
            created_at: e.modified.to_rfc3339(),
        })
        .collect();

    println!("{}", serde_json::to_string_pretty(&json_entries)?);
    Ok(())
}

fn print_plain(entries: &[CacheEntry]) {
    for entry in entries {
        println!("{}", entry.path.display());
    }
}

/// Remove a single cached binary
async fn remove_binary(cache: &BinaryCache, id: &str) -> ProviderResult<()> {
    if cache.remove(id).await? {
        println!("{} removed {}", style("✓").green(), id);
    } else {
        println!("No cached binary for {}", id);
    }
    Ok(())
}

/// Remove binaries older than the configured age
async fn gc_binaries(
    cache: &BinaryCache,
    config: &Config,
    days_override: Option<u32>,
    dry_run: bool,
) -> ProviderResult<()> {
    let gc_days = days_override.unwrap_or(config.cache.gc_days);

    if gc_days == 0 {
        println!("Cache GC is disabled (gc_days = 0)");
        return Ok(());
    }

    let entries = cache.entries().await?;
    let to_remove: Vec<&CacheEntry> = entries
        .iter()
        .filter(|e| e.is_older_than_days(gc_days))
        .collect();

    if to_remove.is_empty() {
        println!("No binaries older than {} days.", gc_days);
        return Ok(());
    }

    println!(
        "Found {} binary(s) older than {} days:",
        to_remove.len(),
        gc_days
    );

    for entry in &to_remove {
        let age_days = (Utc::now() - entry.modified).num_days();
        println!(
            "  {} {} ({} days old)",
            style("•").red(),
            entry.id,
            age_days
        );
    }

    if dry_run {
        println!();
        println!("Dry run - no binaries removed.");
        return Ok(());
    }

    let mut removed = 0;
    for entry in to_remove {
        debug!("Removing cached binary: {}", entry.id);
        if cache.remove(&entry.id).await? {
            removed += 1;
        }
    }

    println!("{} removed {} binary(s)", style("✓").green(), removed);
    Ok(())
}

/// Remove every cached binary
async fn clear_binaries(cache: &BinaryCache, skip_confirm: bool) -> ProviderResult<()> {
    let entries = cache.entries().await?;

    if entries.is_empty() {
        println!("No cached binaries to clear.");
        return Ok(());
    }

    println!("This will remove {} cached binary(s):", entries.len());
    for entry in &entries {
        println!("  {} {}", style("•").red(), entry.id);
    }
    println!();

    if !skip_confirm {
        print!("Are you sure? [y/N] ");
        let _ = io::stdout().flush();

        let mut input = String::new();
        if io::stdin().read_line(&mut input).is_err() {
            println!("Failed to read input, aborting.");
            return Ok(());
        }

        if !input.trim().eq_ignore_ascii_case("y") {
            println!("Aborted.");
            return Ok(());
        }
    }

    let removed = cache.clear().await?;
    println!("{} cleared {} cache entry(s)", style("✓").green(), removed);

    Ok(())
}
