//! `kb search`: filtered retrieval from the command line.
//!
//! Runs the same embed → org-filtered similarity search the chat endpoint
//! uses, and prints every hit with its score and provenance. Useful for
//! checking what context a question would receive.

use anyhow::{bail, Result};

use crate::config::Config;
use crate::index::VectorIndex;
use crate::models::{normalize_org_id, ScoredChunk};

const EXCERPT_CHARS: usize = 240;

pub async fn run_search(config: &Config, query: &str, org_id: &str, limit: Option<usize>) -> Result<()> {
    if query.trim().is_empty() {
        bail!("query must not be empty");
    }
    let org_id = normalize_org_id(org_id);
    if org_id.is_empty() {
        bail!("--org must not be empty");
    }
    let limit = limit.unwrap_or(config.retrieval.top_k).max(1);

    let index = VectorIndex::open_existing(config).await?;
    let stats = index.stats().await?;
    println!("Stored chunks: {}", stats.total_chunks);

    let hits = index.search(query, &org_id, limit).await?;
    if hits.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (i, hit) in hits.iter().enumerate() {
        print!("{}", render_hit(i + 1, hit));
    }
    Ok(())
}

fn render_hit(rank: usize, hit: &ScoredChunk) -> String {
    let excerpt: String = hit
        .text
        .chars()
        .take(EXCERPT_CHARS)
        .collect::<String>()
        .replace('\n', " ");
    format!(
        "{}. [{:.3}] {} (page {})\n    org: {} ({})\n    path: {}\n    excerpt: \"{}\"\n    id: {}\n\n",
        rank,
        hit.score,
        hit.source,
        hit.page,
        hit.org_id,
        hit.scope,
        hit.file_path,
        excerpt.trim(),
        hit.id
    )
}
