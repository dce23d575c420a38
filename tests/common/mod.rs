//! Shared helpers for integration tests.
#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use std::fs;
use std::path::{Path, PathBuf};

use kb_rag::config::Config;
use kb_rag::embedding::Embedder;

/// Deterministic bag-of-words embedder: each lowercase word increments one
/// of 64 buckets chosen by an FNV-1a hash.
pub struct HashEmbedder;

pub const HASH_DIMS: usize = 64;

fn fnv1a(word: &str) -> u64 {
    let mut h: u64 = 0xcbf29ce484222325;
    for b in word.bytes() {
        h ^= b as u64;
        h = h.wrapping_mul(0x100000001b3);
    }
    h
}

pub fn hash_vector(text: &str) -> Vec<f32> {
    let mut v = vec![0.0f32; HASH_DIMS];
    for word in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
    {
        let bucket = (fnv1a(&word.to_lowercase()) % HASH_DIMS as u64) as usize;
        v[bucket] += 1.0;
    }
    v
}

#[async_trait]
impl Embedder for HashEmbedder {
    fn model_name(&self) -> &str {
        "hash-test"
    }
    fn dims(&self) -> usize {
        HASH_DIMS
    }
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| hash_vector(t)).collect())
    }
}

/// Minimal valid PDF with one page per entry, each page showing its text on
/// a single line. Offsets and stream lengths are computed so pdf-extract can
/// parse it. Text must be plain ASCII without parentheses or backslashes.
pub fn minimal_pdf(pages: &[&str]) -> Vec<u8> {
    let page_count = pages.len();
    // 1 catalog, 2 pages, 3 font, then (page, contents) pairs.
    let total_objects = 3 + 2 * page_count;
    let mut offsets = Vec::with_capacity(total_objects);
    let mut out = Vec::new();
    out.extend_from_slice(b"%PDF-1.4\n");

    offsets.push(out.len());
    out.extend_from_slice(b"1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj\n");

    let kids: Vec<String> = (0..page_count)
        .map(|i| format!("{} 0 R", 4 + 2 * i))
        .collect();
    offsets.push(out.len());
    out.extend_from_slice(
        format!(
            "2 0 obj << /Type /Pages /Kids [{}] /Count {} >> endobj\n",
            kids.join(" "),
            page_count
        )
        .as_bytes(),
    );

    offsets.push(out.len());
    out.extend_from_slice(
        b"3 0 obj << /Type /Font /Subtype /Type1 /BaseFont /Helvetica >> endobj\n",
    );

    for (i, text) in pages.iter().enumerate() {
        let page_obj = 4 + 2 * i;
        let content_obj = page_obj + 1;
        offsets.push(out.len());
        out.extend_from_slice(
            format!(
                "{} 0 obj << /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents {} 0 R /Resources << /Font << /F1 3 0 R >> >> >> endobj\n",
                page_obj, content_obj
            )
            .as_bytes(),
        );

        let stream = format!("BT /F1 12 Tf 72 700 Td ({}) Tj ET", text);
        offsets.push(out.len());
        out.extend_from_slice(
            format!(
                "{} 0 obj << /Length {} >> stream\n{}\nendstream endobj\n",
                content_obj,
                stream.len(),
                stream
            )
            .as_bytes(),
        );
    }

    let xref_start = out.len();
    out.extend_from_slice(format!("xref\n0 {}\n", total_objects + 1).as_bytes());
    out.extend_from_slice(format!("{:010} 65535 f \n", 0).as_bytes());
    for offset in &offsets {
        out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    out.extend_from_slice(
        format!(
            "trailer << /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
            total_objects + 1,
            xref_start
        )
        .as_bytes(),
    );
    out
}

/// Writes a PDF, creating parent directories.
pub fn write_pdf(path: &Path, pages: &[&str]) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, minimal_pdf(pages)).unwrap();
}

/// Config rooted in `root`: `documents/`, `documents/general/`, manifest and
/// vector store beside them.
pub fn config_in(root: &Path) -> Config {
    let mut config = Config::default();
    config.paths.documents_dir = root.join("documents");
    config.paths.global_dir = root.join("documents").join("general");
    config.paths.manifest = root.join("processed_files.json");
    config.db.path = root.join("vector_store").join("chunks.sqlite");
    config.server.static_dir = root.join("dist");
    config
}

pub fn global_pdf(root: &Path, name: &str) -> PathBuf {
    root.join("documents").join("general").join(name)
}

pub fn org_pdf(root: &Path, org: &str, name: &str) -> PathBuf {
    root.join("documents").join(org).join(name)
}
