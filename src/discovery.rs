//! Knowledge-base discovery.
//!
//! Walks the global root and every organization directory under the
//! documents root, collecting PDFs tagged with their scope and organization.
//! Paths found under both roots (overlapping layouts) are returned twice, once
//! per scope.

use anyhow::{Context, Result};
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use std::path::Path;
use walkdir::WalkDir;

use crate::config::PathsConfig;
use crate::models::DiscoveredFile;

const PDF_GLOB: &str = "**/*.pdf";

/// Collects every PDF under the configured roots: global first, then one
/// organization at a time in directory-name order.
pub fn discover(paths: &PathsConfig) -> Result<Vec<DiscoveredFile>> {
    let pdfs = build_globset(&[PDF_GLOB])?;
    let mut files = Vec::new();

    if paths.global_dir.is_dir() {
        for path in collect_matching(&paths.global_dir, &pdfs)? {
            files.push(DiscoveredFile::global(path));
        }
    }

    if paths.documents_dir.is_dir() {
        for (org_name, org_dir) in organization_dirs(&paths.documents_dir, &paths.reserved_org_dir)? {
            for path in collect_matching(&org_dir, &pdfs)? {
                files.push(DiscoveredFile::org(path, &org_name));
            }
        }
    }

    Ok(files)
}

/// Immediate subdirectories of `root` except the reserved one, sorted by name.
fn organization_dirs(root: &Path, reserved: &str) -> Result<Vec<(String, std::path::PathBuf)>> {
    let mut orgs = Vec::new();
    let entries = std::fs::read_dir(root)
        .with_context(|| format!("Failed to list documents root: {}", root.display()))?;
    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        if name == reserved {
            continue;
        }
        orgs.push((name, entry.path()));
    }
    orgs.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(orgs)
}

fn collect_matching(root: &Path, include: &GlobSet) -> Result<Vec<std::path::PathBuf>> {
    let mut out = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        if include.is_match(relative) {
            out.push(path.to_path_buf());
        }
    }
    Ok(out)
}

fn build_globset(patterns: &[&str]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(GlobBuilder::new(pattern).case_insensitive(true).build()?);
    }
    Ok(builder.build()?)
}
