//! Human-readable session log: one block per session, append-only.
//!
//! ```text
//! === Session 2026-10-19T09:14:02.113Z (config 9f2c01aa5be7d310) ===
//! [INFECTED] /home/u/dl/evil.exe (sha256 275a021b…)
//! [QUARANTINED] /home/u/dl/evil.exe -> /q/evil.exe_quarantined
//!
//! ```
//!
//! Nothing parses this file; the prefixes are for people reading it.

#![allow(missing_docs)]

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::core::errors::{HwdError, Result};
use crate::quarantine::store::Inconsistency;
use crate::scanner::walker::{Detection, ScanReport};

/// Line prefix. The tag is the bracketed word at the start of the line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineTag {
    Infected,
    Quarantined,
    Restored,
    Deleted,
    Unreadable,
    Error,
    Warning,
}

impl LineTag {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Infected => "[INFECTED]",
            Self::Quarantined => "[QUARANTINED]",
            Self::Restored => "[RESTORED]",
            Self::Deleted => "[DELETED]",
            Self::Unreadable => "[UNREADABLE]",
            Self::Error => "[ERROR]",
            Self::Warning => "[WARNING]",
        }
    }
}

/// One session's block, assembled in memory before a single append.
#[derive(Debug, Clone)]
pub struct SessionBlock {
    header: String,
    lines: Vec<String>,
}

impl SessionBlock {
    #[must_use]
    pub fn new(config_hash: Option<&str>) -> Self {
        let ts = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true);
        let header = match config_hash {
            Some(hash) => format!("=== Session {ts} (config {hash}) ==="),
            None => format!("=== Session {ts} ==="),
        };
        Self {
            header,
            lines: Vec::new(),
        }
    }

    pub fn push(&mut self, tag: LineTag, text: impl AsRef<str>) {
        self.lines.push(format!("{} {}", tag.as_str(), text.as_ref()));
    }

    /// Untagged note, e.g. `No infected files found.`
    pub fn note(&mut self, text: impl Into<String>) {
        self.lines.push(text.into());
    }

    pub fn infected(&mut self, detection: &Detection) {
        self.push(
            LineTag::Infected,
            format!(
                "{} ({} {})",
                detection.path.display(),
                detection.algorithm,
                detection.digest
            ),
        );
    }

    pub fn quarantined(&mut self, original: &Path, occupant: &Path) {
        self.push(
            LineTag::Quarantined,
            format!("{} -> {}", original.display(), occupant.display()),
        );
    }

    pub fn restored(&mut self, occupant: &Path, destination: &Path) {
        self.push(
            LineTag::Restored,
            format!("{} -> {}", occupant.display(), destination.display()),
        );
    }

    pub fn deleted(&mut self, path: &Path, passes: u32) {
        self.push(
            LineTag::Deleted,
            format!("{} ({passes} overwrite passes)", path.display()),
        );
    }

    pub fn error(&mut self, err: &HwdError) {
        self.push(LineTag::Error, err.to_string());
    }

    pub fn inconsistency(&mut self, problem: &Inconsistency) {
        self.push(
            LineTag::Warning,
            format!(
                "inconsistent quarantine entry {}: {}",
                problem.path.display(),
                problem.details
            ),
        );
    }

    /// Record a scan's findings: infections, unreadable files, and the
    /// explicit empty-result and empty-signature-set notes.
    pub fn scan_report(&mut self, report: &ScanReport) {
        if report.signatures_loaded == 0 {
            self.push(
                LineTag::Warning,
                "signature set is empty; nothing can be detected",
            );
        }
        if report.interrupted {
            self.push(LineTag::Warning, "scan interrupted; results are partial");
        }
        if report.detections.is_empty() {
            self.note("No infected files found.");
        }
        for detection in &report.detections {
            self.infected(detection);
        }
        for unreadable in &report.unreadable {
            self.push(
                LineTag::Unreadable,
                format!(
                    "{}: {} [{}]",
                    unreadable.path.display(),
                    unreadable.details,
                    unreadable.error_code
                ),
            );
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Block text including the trailing blank line.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::with_capacity(
            self.header.len() + self.lines.iter().map(|l| l.len() + 1).sum::<usize>() + 2,
        );
        out.push_str(&self.header);
        out.push('\n');
        for line in &self.lines {
            out.push_str(line);
            out.push('\n');
        }
        out.push('\n');
        out
    }
}

/// Append-only session log file.
#[derive(Debug, Clone)]
pub struct SessionLog {
    path: PathBuf,
}

impl SessionLog {
    #[must_use]
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a block with one `write_all`.
    pub fn append(&self, block: &SessionBlock) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| HwdError::io(parent, e))?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| HwdError::io(&self.path, e))?;
        file.write_all(block.render().as_bytes())
            .map_err(|e| HwdError::io(&self.path, e))
    }

    /// Last `lines` lines of the log. A missing log reads as empty.
    pub fn tail(&self, lines: usize) -> Result<Vec<String>> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(HwdError::io(&self.path, err)),
        };
        let all: Vec<&str> = raw.lines().collect();
        let start = all.len().saturating_sub(lines);
        Ok(all[start..].iter().map(|l| (*l).to_string()).collect())
    }
}
