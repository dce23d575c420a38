//! Ingestion progress reporting.
//!
//! Progress is emitted on **stderr** so the ingest summary on stdout stays
//! parseable for scripts.

use std::io::Write;

/// A single progress event for `kb ingest`.
#[derive(Clone, Debug, PartialEq)]
pub enum IngestProgressEvent {
    /// Walking the knowledge-base roots and hashing files.
    Scanning,
    /// About to process file `n` of `total`.
    File { n: u64, total: u64, name: String },
    /// A file finished. `stored` is zero for all-duplicate files.
    FileDone { name: String, stored: u64 },
    /// A file failed and will be retried next run.
    FileFailed { name: String, error: String },
}

/// Reports ingestion progress. Implementations write to stderr.
pub trait IngestProgressReporter: Send + Sync {
    fn report(&self, event: IngestProgressEvent);
}

/// Human-friendly progress on stderr: "ingest  [3 / 12]  report.pdf".
pub struct StderrProgress;

impl IngestProgressReporter for StderrProgress {
    fn report(&self, event: IngestProgressEvent) {
        let line = match &event {
            IngestProgressEvent::Scanning => "ingest  scanning...\n".to_string(),
            IngestProgressEvent::File { n, total, name } => format!(
                "ingest  [{} / {}]  {}\n",
                format_number(*n),
                format_number(*total),
                name
            ),
            IngestProgressEvent::FileDone { name, stored } => {
                format!("ingest  {}  {} chunks stored\n", name, format_number(*stored))
            }
            IngestProgressEvent::FileFailed { name, error } => {
                format!("ingest  {}  FAILED: {}\n", name, error)
            }
        };
        let mut stderr = std::io::stderr().lock();
        let _ = stderr.write_all(line.as_bytes());
        let _ = stderr.flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl IngestProgressReporter for JsonProgress {
    fn report(&self, event: IngestProgressEvent) {
        if let Ok(line) = serde_json::to_string(&event_json(&event)) {
            let mut stderr = std::io::stderr().lock();
            let _ = writeln!(stderr, "{}", line);
            let _ = stderr.flush();
        }
    }
}

fn event_json(event: &IngestProgressEvent) -> serde_json::Value {
    match event {
        IngestProgressEvent::Scanning => serde_json::json!({
            "event": "progress",
            "phase": "scanning"
        }),
        IngestProgressEvent::File { n, total, name } => serde_json::json!({
            "event": "progress",
            "phase": "ingesting",
            "file": name,
            "n": n,
            "total": total
        }),
        IngestProgressEvent::FileDone { name, stored } => serde_json::json!({
            "event": "file_done",
            "file": name,
            "stored": stored
        }),
        IngestProgressEvent::FileFailed { name, error } => serde_json::json!({
            "event": "file_failed",
            "file": name,
            "error": error
        }),
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl IngestProgressReporter for NoProgress {
    fn report(&self, _event: IngestProgressEvent) {}
}

pub(crate) fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    /// Parses the `--progress` flag; `None` means use the TTY default.
    pub fn from_flag(flag: Option<&str>) -> anyhow::Result<Self> {
        match flag {
            None => Ok(Self::default_for_tty()),
            Some("human") => Ok(ProgressMode::Human),
            Some("json") => Ok(ProgressMode::Json),
            Some("off") => Ok(ProgressMode::Off),
            Some(other) => anyhow::bail!(
                "Unknown progress mode '{}' (expected human, json or off)",
                other
            ),
        }
    }

    pub fn reporter(&self) -> Box<dyn IngestProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_number_comma() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(1_234_567), "1,234,567");
    }

    #[test]
    fn progress_flag_parsing() {
        assert_eq!(ProgressMode::from_flag(Some("json")).unwrap(), ProgressMode::Json);
        assert_eq!(ProgressMode::from_flag(Some("off")).unwrap(), ProgressMode::Off);
        assert!(ProgressMode::from_flag(Some("loud")).is_err());
    }

    #[test]
    fn json_events_carry_file_names() {
        let v = event_json(&IngestProgressEvent::File {
            n: 2,
            total: 5,
            name: "report.pdf".to_string(),
        });
        assert_eq!(v["phase"], "ingesting");
        assert_eq!(v["file"], "report.pdf");
        assert_eq!(v["total"], 5);

        let v = event_json(&IngestProgressEvent::FileFailed {
            name: "bad.pdf".to_string(),
            error: "boom".to_string(),
        });
        assert_eq!(v["event"], "file_failed");
    }
}
