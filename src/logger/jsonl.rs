//! JSONL activity log: one self-contained JSON object per line.
//!
//! Lines are assembled in memory and written with a single `write_all`, so a
//! reader tailing the file never sees a partial line from us. A logging
//! failure never fails a quarantine or shred: the writer falls back to the
//! next candidate file, then stderr, then drops lines.

#![allow(missing_docs)]

use std::collections::VecDeque;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::errors::HwdError;
use crate::scanner::digest::HashAlgorithm;

/// Severity level for log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

/// Activity events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    SessionStart,
    ScanComplete,
    FileInfected,
    FileUnreadable,
    Quarantined,
    Restored,
    Shredded,
    Inconsistency,
    Error,
}

/// A single JSONL log entry. Only `ts`, `event` and `severity` are always present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    /// RFC 3339 UTC timestamp.
    pub ts: String,
    pub event: EventType,
    pub severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Second path involved (quarantine occupant, restore destination).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub algorithm: Option<HashAlgorithm>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub passes: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ok: Option<bool>,
    /// HWD error code if the action failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl LogEntry {
    /// Create a new entry stamped with the current UTC time.
    pub fn new(event: EventType, severity: Severity) -> Self {
        Self {
            ts: format_utc_now(),
            event,
            severity,
            path: None,
            target: None,
            size: None,
            algorithm: None,
            digest: None,
            passes: None,
            count: None,
            duration_ms: None,
            ok: None,
            error_code: None,
            error_message: None,
            details: None,
        }
    }

    #[must_use]
    pub fn with_path(mut self, path: &Path) -> Self {
        self.path = Some(path.to_string_lossy().into_owned());
        self
    }

    #[must_use]
    pub fn with_target(mut self, target: &Path) -> Self {
        self.target = Some(target.to_string_lossy().into_owned());
        self
    }

    #[must_use]
    pub fn with_error(mut self, err: &HwdError) -> Self {
        self.ok = Some(false);
        self.error_code = Some(err.code().to_string());
        self.error_message = Some(err.to_string());
        self
    }
}

/// Configuration for the JSONL writer.
#[derive(Debug, Clone)]
pub struct JsonlConfig {
    pub path: PathBuf,
    /// Tried when `path` cannot be opened or stops accepting writes.
    pub fallback_path: Option<PathBuf>,
    /// A log at least this large is rotated when the writer opens it.
    pub max_size_bytes: u64,
    /// Rotated generations kept as `<path>.1` .. `<path>.N`.
    pub max_rotated_files: u32,
}

impl JsonlConfig {
    /// Defaults for an activity log at `path`.
    #[must_use]
    pub fn for_path(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            ..Self::default()
        }
    }
}

impl Default for JsonlConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("activity.jsonl"),
            fallback_path: Some(std::env::temp_dir().join("hashward-activity.jsonl")),
            max_size_bytes: 10 * 1024 * 1024,
            max_rotated_files: 3,
        }
    }
}

/// Where lines currently go.
enum Sink {
    File { path: PathBuf, out: BufWriter<File> },
    Stderr,
    Discard,
}

/// Append-only JSONL writer for one invocation.
///
/// Candidate files are tried in order (primary, then fallback). When the
/// current file stops accepting writes the next candidate is opened; once
/// none are left lines go to stderr, and if stderr fails they are dropped.
pub struct JsonlWriter {
    sink: Sink,
    pending: VecDeque<PathBuf>,
}

impl JsonlWriter {
    /// Rotate an oversized primary, then open the first usable candidate.
    pub fn open(config: JsonlConfig) -> Self {
        rotate_if_oversized(&config.path, config.max_size_bytes, config.max_rotated_files);

        let mut pending = VecDeque::from([config.path]);
        pending.extend(config.fallback_path);
        let mut writer = Self {
            sink: Sink::Discard,
            pending,
        };
        writer.advance();
        writer
    }

    /// Write a single log entry as one JSONL line.
    pub fn write_entry(&mut self, entry: &LogEntry) {
        match serde_json::to_string(entry) {
            Ok(json) => self.write_line(&format!("{json}\n")),
            Err(e) => {
                let _ = writeln!(io::stderr(), "[HWD-JSONL] serialize error: {e}");
            }
        }
    }

    /// Flush buffered lines and sync the file to storage.
    pub fn sync(&mut self) {
        if let Sink::File { out, .. } = &mut self.sink {
            let _ = out.flush();
            let _ = out.get_ref().sync_data();
        }
    }

    #[cfg(test)]
    fn destination(&self) -> Option<&Path> {
        match &self.sink {
            Sink::File { path, .. } => Some(path),
            Sink::Stderr | Sink::Discard => None,
        }
    }

    fn write_line(&mut self, line: &str) {
        loop {
            let written = match &mut self.sink {
                Sink::File { out, .. } => out.write_all(line.as_bytes()),
                Sink::Stderr => write!(io::stderr(), "[HWD-JSONL] {line}"),
                Sink::Discard => return,
            };
            if written.is_ok() {
                return;
            }
            self.advance();
        }
    }

    /// Move to the next sink that accepts writes.
    fn advance(&mut self) {
        let failed = match std::mem::replace(&mut self.sink, Sink::Discard) {
            Sink::File { path, .. } => Some(path),
            Sink::Stderr => return,
            Sink::Discard => None,
        };

        while let Some(path) = self.pending.pop_front() {
            match open_append(&path) {
                Ok(file) => {
                    if let Some(failed) = &failed {
                        let _ = writeln!(
                            io::stderr(),
                            "[HWD-JSONL] {} failed, continuing in {}",
                            failed.display(),
                            path.display()
                        );
                    }
                    self.sink = Sink::File {
                        path,
                        out: BufWriter::new(file),
                    };
                    return;
                }
                Err(err) => {
                    let _ = writeln!(io::stderr(), "[HWD-JSONL] cannot open {}: {err}", path.display());
                }
            }
        }
        let _ = writeln!(io::stderr(), "[HWD-JSONL] no writable activity log, using stderr");
        self.sink = Sink::Stderr;
    }
}

impl Drop for JsonlWriter {
    fn drop(&mut self) {
        self.sync();
    }
}

// ──────────────────────── helpers ────────────────────────

fn open_append(path: &Path) -> io::Result<File> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}

/// Rotate `path` when it has reached `max_size_bytes`: `<path>` becomes
/// `<path>.1`, older generations shift up by one, and the oldest past `keep`
/// is dropped.
fn rotate_if_oversized(path: &Path, max_size_bytes: u64, keep: u32) {
    let oversized = fs::metadata(path).is_ok_and(|m| m.len() >= max_size_bytes);
    if !oversized {
        return;
    }
    if keep == 0 {
        let _ = fs::remove_file(path);
        return;
    }
    let _ = fs::remove_file(rotated_name(path, keep));
    for i in (1..keep).rev() {
        let _ = fs::rename(rotated_name(path, i), rotated_name(path, i + 1));
    }
    let _ = fs::rename(path, rotated_name(path, 1));
}

/// `activity.jsonl` -> `activity.jsonl.3`.
fn rotated_name(base: &Path, index: u32) -> PathBuf {
    let mut name = base.as_os_str().to_owned();
    name.push(format!(".{index}"));
    PathBuf::from(name)
}

fn format_utc_now() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}
