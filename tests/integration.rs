mod common;

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

use common::{global_pdf, org_pdf, write_pdf};

fn kb_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("kb");
    path
}

fn write_config(root: &Path, extra: &str) -> PathBuf {
    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let config_content = format!(
        r#"[paths]
documents_dir = "{root}/documents"
global_dir = "{root}/documents/general"
manifest = "{root}/processed_files.json"

[db]
path = "{root}/vector_store/chunks.sqlite"

[embedding]
provider = "disabled"

[llm]
provider = "disabled"

[server]
static_dir = "{root}/dist"
{extra}
"#,
        root = root.display(),
        extra = extra
    );

    let config_path = config_dir.join("kb.toml");
    fs::write(&config_path, config_content).unwrap();
    config_path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let config_path = write_config(tmp.path(), "");
    (tmp, config_path)
}

fn run_kb(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = kb_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .env("RUST_LOG", "warn")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run kb binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

#[test]
fn test_init_creates_database() {
    let (tmp, config) = setup_test_env();
    let (stdout, stderr, success) = run_kb(&config, &["init"]);
    assert!(success, "init failed: {}", stderr);
    assert!(stdout.contains("Vector store initialized"));
    assert!(tmp.path().join("vector_store/chunks.sqlite").exists());
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config) = setup_test_env();
    let (_, _, first) = run_kb(&config, &["init"]);
    assert!(first);
    let (_, stderr, second) = run_kb(&config, &["init"]);
    assert!(second, "second init failed: {}", stderr);
}

#[test]
fn test_stats_after_init() {
    let (_tmp, config) = setup_test_env();
    run_kb(&config, &["init"]);
    let (stdout, stderr, success) = run_kb(&config, &["stats"]);
    assert!(success, "stats failed: {}", stderr);
    assert!(stdout.contains("Chunks:      0"));
    assert!(stdout.contains("0 files tracked"));
}

#[test]
fn test_ingest_without_pdfs() {
    let (tmp, config) = setup_test_env();
    let (stdout, stderr, success) = run_kb(&config, &["ingest", "--progress", "off"]);
    assert!(success, "ingest failed: {}", stderr);
    assert!(stdout.contains("No PDFs found in KB folders."));
    assert!(!tmp.path().join("vector_store/chunks.sqlite").exists());
}

#[test]
fn test_ingest_dry_run() {
    let (tmp, config) = setup_test_env();
    write_pdf(&org_pdf(tmp.path(), "acme", "plan.pdf"), &["Acme plan"]);

    let (stdout, stderr, success) = run_kb(&config, &["ingest", "--dry-run", "--progress", "off"]);
    assert!(success, "dry run failed: {}", stderr);
    assert!(stdout.contains("ingest (dry-run)"));
    assert!(stdout.contains("files to ingest: 1"));
    assert!(stdout.contains("[org:ACME]"));
    assert!(!tmp.path().join("processed_files.json").exists());
    assert!(!tmp.path().join("vector_store/chunks.sqlite").exists());
}

#[test]
fn test_ingest_failure_is_reported_and_not_recorded() {
    let (tmp, config) = setup_test_env();
    write_pdf(&global_pdf(tmp.path(), "report.pdf"), &["Shared report"]);

    // Embeddings are disabled, so storing the chunks fails.
    let (stdout, stderr, success) = run_kb(&config, &["ingest", "--progress", "off"]);
    assert!(success, "ingest failed: {}", stderr);
    assert!(stdout.contains("failed files: 1"));
    assert!(stdout.contains("report.pdf"));
    assert!(!stdout.contains("\nok"));
    assert!(!tmp.path().join("processed_files.json").exists());

    // Still pending on the next run.
    let (stdout, _, _) = run_kb(&config, &["ingest", "--dry-run", "--progress", "off"]);
    assert!(stdout.contains("files to ingest: 1"));
}

#[test]
fn test_ingest_json_progress_goes_to_stderr() {
    let (tmp, config) = setup_test_env();
    write_pdf(&global_pdf(tmp.path(), "report.pdf"), &["Shared report"]);

    let (stdout, stderr, _) = run_kb(&config, &["ingest", "--progress", "json"]);
    assert!(stderr.contains("\"event\":\"file_failed\""));
    assert!(!stdout.contains("\"event\""));
}

#[test]
fn test_search_before_init_fails() {
    let (_tmp, config) = setup_test_env();
    let (_, stderr, success) = run_kb(&config, &["search", "budget", "--org", "acme"]);
    assert!(!success);
    assert!(stderr.contains("vector store not found"));
}

#[test]
fn test_search_empty_store() {
    let (_tmp, config) = setup_test_env();
    run_kb(&config, &["init"]);
    let (stdout, _, success) = run_kb(&config, &["search", "budget", "--org", "acme"]);
    // Query embedding is unavailable with embeddings disabled.
    assert!(!success);
    assert!(stdout.contains("Stored chunks: 0"));
}

#[test]
fn test_invalid_chunking_config_fails() {
    let tmp = TempDir::new().unwrap();
    let config = write_config(tmp.path(), "\n[chunking]\nchunk_size = 100\nchunk_overlap = 100\n");
    let (_, stderr, success) = run_kb(&config, &["init"]);
    assert!(!success);
    assert!(stderr.contains("chunk_overlap"));
}

#[test]
fn test_unknown_progress_mode_fails() {
    let (_tmp, config) = setup_test_env();
    let (_, _, success) = run_kb(&config, &["ingest", "--progress", "loud"]);
    assert!(!success);
}
