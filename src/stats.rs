//! Vector store statistics.
//!
//! Provides a quick summary of what's indexed: chunk counts, distinct
//! source files, and when each organization last received content. Used by
//! `kb stats` to confirm that ingestion runs landed where expected.

use anyhow::Result;

use crate::config::Config;
use crate::index::VectorIndex;
use crate::manifest::Manifest;
use crate::progress::format_number;
use crate::store::StoreStats;

/// Run the stats command: query the store and print a summary.
pub async fn run_stats(config: &Config) -> Result<()> {
    let index = VectorIndex::open_existing(config).await?;
    let stats = index.stats().await?;

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);
    let manifest = Manifest::load(&config.paths.manifest);

    print!("{}", render_stats(config, &stats, db_size, manifest.len()));
    Ok(())
}

fn render_stats(config: &Config, stats: &StoreStats, db_size: u64, tracked_files: usize) -> String {
    let mut out = String::new();
    out.push_str("Knowledge Base: Vector Store Stats\n");
    out.push_str("===================================\n\n");
    out.push_str(&format!("  Database:    {}\n", config.db.path.display()));
    out.push_str(&format!("  Size:        {}\n", format_bytes(db_size)));
    out.push_str(&format!("  Manifest:    {} files tracked\n\n", tracked_files));
    out.push_str(&format!(
        "  Chunks:      {}\n",
        format_number(stats.total_chunks)
    ));

    if !stats.orgs.is_empty() {
        out.push_str("\n  By organization:\n");
        out.push_str(&format!(
            "  {:<24} {:>8} {:>8}   {}\n",
            "ORG", "SOURCES", "CHUNKS", "LAST ADDED"
        ));
        out.push_str(&format!("  {}\n", "-".repeat(64)));
        for org in &stats.orgs {
            let added = match org.last_added {
                Some(ts) => format_ts_relative(ts),
                None => "never".to_string(),
            };
            out.push_str(&format!(
                "  {:<24} {:>8} {:>8}   {}\n",
                org.org_id, org.sources, org.chunks, added
            ));
        }
    }

    out.push('\n');
    out
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

/// Format a Unix timestamp as a relative time string (e.g. "3 hours ago").
fn format_ts_relative(ts: i64) -> String {
    let delta = chrono::Utc::now().timestamp() - ts;

    if delta < 0 {
        return format_ts(ts);
    }

    if delta < 60 {
        "just now".to_string()
    } else if delta < 3600 {
        let mins = delta / 60;
        format!("{} min{} ago", mins, if mins == 1 { "" } else { "s" })
    } else if delta < 86400 {
        let hours = delta / 3600;
        format!("{} hour{} ago", hours, if hours == 1 { "" } else { "s" })
    } else if delta < 86400 * 30 {
        let days = delta / 86400;
        format!("{} day{} ago", days, if days == 1 { "" } else { "s" })
    } else {
        format_ts(ts)
    }
}

fn format_ts(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ts.to_string())
}
