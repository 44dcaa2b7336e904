//! Provenance records: the `.meta` file colocated with each quarantined file.
//!
//! Records are written as a single JSON object. Records holding nothing but
//! the original path as plain text are still read, so older quarantine
//! directories keep restoring.

#![allow(missing_docs)]

use std::ffi::{OsStr, OsString};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::core::errors::{HwdError, Result};
use crate::scanner::digest::HashAlgorithm;
use crate::shredder::is_shred_temp_name;

/// Appended to the original file name to form the occupant name.
pub const QUARANTINE_SUFFIX: &str = "_quarantined";
/// Appended to the occupant name to form the record name.
pub const META_SUFFIX: &str = ".meta";
/// Prefix of every scratch file the store creates inside the quarantine dir.
pub const SCRATCH_PREFIX: &str = ".hwd-";
/// Lock file serializing quarantine mutations.
pub const LOCK_FILE_NAME: &str = ".lock";

/// Where a quarantined file came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvenanceRecord {
    pub original_path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quarantined_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_algorithm: Option<HashAlgorithm>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_digest: Option<String>,
}

impl ProvenanceRecord {
    #[must_use]
    pub fn new(original_path: PathBuf, size_bytes: u64) -> Self {
        Self {
            original_path,
            quarantined_at: Some(Utc::now()),
            size_bytes: Some(size_bytes),
            matched_algorithm: None,
            matched_digest: None,
        }
    }

    #[must_use]
    pub fn with_match(mut self, algorithm: HashAlgorithm, digest: impl Into<String>) -> Self {
        self.matched_algorithm = Some(algorithm);
        self.matched_digest = Some(digest.into());
        self
    }

    /// True for records read from the plain-text format.
    #[must_use]
    pub fn is_legacy(&self) -> bool {
        self.quarantined_at.is_none()
    }

    pub fn encode(&self) -> Result<String> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }

    /// Parse either the JSON form or a bare original path.
    pub fn decode(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(HwdError::Serialization {
                context: "provenance",
                details: "record is empty".to_string(),
            });
        }
        if trimmed.starts_with('{') {
            let record: Self = serde_json::from_str(trimmed)?;
            if record.original_path.as_os_str().is_empty() {
                return Err(HwdError::Serialization {
                    context: "provenance",
                    details: "original_path is empty".to_string(),
                });
            }
            return Ok(record);
        }
        Ok(Self {
            original_path: PathBuf::from(trimmed),
            quarantined_at: None,
            size_bytes: None,
            matched_algorithm: None,
            matched_digest: None,
        })
    }
}

// ──────────────────── naming ────────────────────

/// Occupant name for a file: `<file name>_quarantined`.
#[must_use]
pub fn occupant_name(original: &Path) -> Option<OsString> {
    let mut name = original.file_name()?.to_os_string();
    name.push(QUARANTINE_SUFFIX);
    Some(name)
}

/// Record path for an occupant path: `<occupant>.meta`.
#[must_use]
pub fn record_path_for(occupant: &Path) -> PathBuf {
    let mut raw = occupant.as_os_str().to_os_string();
    raw.push(META_SUFFIX);
    PathBuf::from(raw)
}

/// What a directory entry in the quarantine dir is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Occupant,
    Record,
    /// Lock file or an in-flight scratch file.
    Scratch,
    /// Renamed by the shredder but never unlinked.
    ShredRemnant,
    Foreign,
}

/// Classify a quarantine dir entry by name.
///
/// The occupant and record suffixes win over the scratch prefix: an original
/// named `.hwd-cache` becomes the occupant `.hwd-cache_quarantined`, while
/// scratch names never end in either suffix.
#[must_use]
pub fn classify_name(name: &OsStr) -> EntryKind {
    let bytes = name.as_encoded_bytes();
    let occupant_like =
        |b: &[u8]| b.ends_with(QUARANTINE_SUFFIX.as_bytes()) && b.len() > QUARANTINE_SUFFIX.len();

    if let Some(stem) = bytes.strip_suffix(META_SUFFIX.as_bytes())
        && occupant_like(stem)
    {
        return EntryKind::Record;
    }
    if occupant_like(bytes) {
        return EntryKind::Occupant;
    }
    if name.to_str().is_some_and(is_shred_temp_name) {
        return EntryKind::ShredRemnant;
    }
    if bytes == LOCK_FILE_NAME.as_bytes() || bytes.starts_with(SCRATCH_PREFIX.as_bytes()) {
        return EntryKind::Scratch;
    }
    EntryKind::Foreign
}

/// Random scratch name inside the quarantine dir.
#[must_use]
pub fn scratch_name(kind: &str) -> String {
    let mut suffix = [0u8; 8];
    rand::rng().fill_bytes(&mut suffix);
    format!("{SCRATCH_PREFIX}{kind}-{}", hex::encode(suffix))
}

// ──────────────────── persistence ────────────────────

/// Read a record. `Ok(None)` when the record file does not exist.
pub fn read_record(path: &Path) -> Result<Option<ProvenanceRecord>> {
    match fs::read_to_string(path) {
        Ok(raw) => ProvenanceRecord::decode(&raw).map(Some),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(HwdError::io(path, err)),
    }
}

/// Write a record atomically: scratch file, fsync, rename over `path`.
///
/// Any previous record at `path` is replaced whole, never merged.
pub fn write_record(path: &Path, record: &ProvenanceRecord) -> Result<()> {
    let encoded = record.encode()?;
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let scratch = dir.join(scratch_name("record"));

    let written = (|| -> std::io::Result<()> {
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&scratch)?;
        file.write_all(encoded.as_bytes())?;
        file.sync_all()?;
        fs::rename(&scratch, path)
    })();

    if let Err(err) = written {
        let _ = fs::remove_file(&scratch);
        return Err(HwdError::io(path, err));
    }
    Ok(())
}
