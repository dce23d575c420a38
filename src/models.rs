//! Core data models used throughout the knowledge base.
//!
//! These types represent the files, chunks, and retrieval hits that flow
//! through the ingestion and retrieval pipeline.

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

/// Organization identifier carried by every globally visible chunk.
pub const GLOBAL_ORG_ID: &str = "GLOBAL";

/// Visibility of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// Visible to every organization.
    Global,
    /// Restricted to a single organization.
    Org,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Global => "global",
            Scope::Org => "org",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "global" => Some(Scope::Global),
            "org" => Some(Scope::Org),
            _ => None,
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalizes an organization identifier to the stored form.
pub fn normalize_org_id(org_id: &str) -> String {
    org_id.trim().to_uppercase()
}

/// A PDF found under one of the knowledge-base roots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredFile {
    pub path: PathBuf,
    pub scope: Scope,
    pub org_id: String,
}

impl DiscoveredFile {
    pub fn global(path: PathBuf) -> Self {
        Self {
            path,
            scope: Scope::Global,
            org_id: GLOBAL_ORG_ID.to_string(),
        }
    }

    pub fn org(path: PathBuf, org_name: &str) -> Self {
        Self {
            path,
            scope: Scope::Org,
            org_id: normalize_org_id(org_name),
        }
    }

    /// File name used as the `source` metadata field.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }
}

/// One window of extracted text plus its provenance.
///
/// Every chunk cut from one file shares the same `scope` and `org_id`.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentChunk {
    pub text: String,
    /// File name of the source PDF.
    pub source: String,
    /// Absolute path of the source PDF.
    pub file_path: String,
    pub scope: Scope,
    pub org_id: String,
    /// 1-based page the text was taken from.
    pub page: u32,
}

/// A stored chunk returned from a similarity search.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredChunk {
    pub id: String,
    pub text: String,
    pub source: String,
    pub file_path: String,
    pub scope: Scope,
    pub org_id: String,
    pub page: u32,
    /// Cosine similarity to the query vector.
    pub score: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn org_ids_are_uppercased() {
        let f = DiscoveredFile::org(PathBuf::from("documents/acme/a.pdf"), "acme");
        assert_eq!(f.org_id, "ACME");
        assert_eq!(f.scope, Scope::Org);
        assert_eq!(f.file_name(), "a.pdf");
    }

    #[test]
    fn global_files_use_global_org() {
        let f = DiscoveredFile::global(PathBuf::from("documents/general/report.pdf"));
        assert_eq!(f.org_id, GLOBAL_ORG_ID);
        assert_eq!(f.scope.as_str(), "global");
    }

    #[test]
    fn scope_parse_roundtrips_known_values() {
        assert_eq!(Scope::parse("org"), Some(Scope::Org));
        assert_eq!(Scope::parse("global"), Some(Scope::Global));
        assert_eq!(Scope::parse("GLOBAL"), None);
    }

    #[test]
    fn normalize_trims_and_uppercases() {
        assert_eq!(normalize_org_id(" ec-org-1 "), "EC-ORG-1");
    }
}
