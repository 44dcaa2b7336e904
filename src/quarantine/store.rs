//! Quarantine store: moves infected files into a flat holding directory,
//! keeps one provenance record per occupant, and resolves them back out.
//!
//! Layout, for an original `/home/u/evil.exe`:
//!
//! ```text
//! <quarantine_dir>/evil.exe_quarantined        the file itself
//! <quarantine_dir>/evil.exe_quarantined.meta   provenance record
//! <quarantine_dir>/.lock                       flock serializing mutations
//! ```
//!
//! Every mutation (quarantine, restore, destroy) runs under an exclusive
//! `flock()` on `.lock`, held for the whole move + record transaction.
//! A quarantine move is only declared successful after checking that the
//! source is gone and the occupant is present.

#![allow(missing_docs)]

use std::collections::HashSet;
use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;

use serde::Serialize;

use crate::core::errors::{HwdError, Result};
use crate::core::paths::{is_within, resolve_absolute_path, resolve_entry_path};
use crate::quarantine::provenance::{
    self, EntryKind, LOCK_FILE_NAME, ProvenanceRecord, QUARANTINE_SUFFIX, classify_name,
    occupant_name, record_path_for, scratch_name,
};
use crate::scanner::digest::HashAlgorithm;
use crate::scanner::walker::Detection;
use crate::shredder::{DestructionReceipt, Shredder};

// ──────────────────── entries ────────────────────

/// One occupant of the quarantine directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuarantineEntry {
    /// Occupant file name, e.g. `evil.exe_quarantined`.
    pub name: String,
    pub quarantined_path: PathBuf,
    pub record_path: PathBuf,
    /// `None` when the record is missing or unreadable; restore refuses such entries.
    pub provenance: Option<ProvenanceRecord>,
    pub size_bytes: u64,
}

impl QuarantineEntry {
    #[must_use]
    pub fn original_path(&self) -> Option<&Path> {
        self.provenance.as_ref().map(|p| p.original_path.as_path())
    }
}

/// Kind of bookkeeping mismatch found while listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InconsistencyKind {
    /// Occupant with no record.
    MissingRecord,
    /// Record with no occupant.
    OrphanedRecord,
    /// Record present but not parseable.
    UnreadableRecord,
    /// Occupant name used by something that is not a regular file.
    NotAFile,
    /// Overwritten by the shredder but never unlinked.
    ShredRemnant,
}

/// A detected inconsistency. Reported, never auto-resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Inconsistency {
    pub path: PathBuf,
    pub kind: InconsistencyKind,
    pub details: String,
}

impl Inconsistency {
    #[must_use]
    pub fn to_error(&self) -> HwdError {
        HwdError::InconsistentQuarantineEntry {
            path: self.path.clone(),
            details: self.details.clone(),
        }
    }
}

/// Result of enumerating the quarantine directory.
#[derive(Debug, Clone, Default, Serialize)]
pub struct QuarantineListing {
    pub entries: Vec<QuarantineEntry>,
    pub inconsistencies: Vec<Inconsistency>,
}

// ──────────────────── store ────────────────────

/// Manages the holding area. Construct one per quarantine directory.
#[derive(Debug, Clone)]
pub struct QuarantineStore {
    dir: PathBuf,
}

impl QuarantineStore {
    /// Open (creating if needed) the quarantine directory.
    pub fn open(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir).map_err(|e| HwdError::io(dir, e))?;
        Ok(Self {
            dir: resolve_absolute_path(dir),
        })
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    // ──────────────────── locking ────────────────────

    #[cfg(unix)]
    fn acquire_lock(&self) -> Result<nix::fcntl::Flock<File>> {
        let lock_path = self.dir.join(LOCK_FILE_NAME);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .mode(0o600)
            .open(&lock_path)
            .map_err(|e| HwdError::LockFailed {
                path: lock_path.clone(),
                details: e.to_string(),
            })?;

        nix::fcntl::Flock::lock(file, nix::fcntl::FlockArg::LockExclusive).map_err(|(_file, e)| {
            HwdError::LockFailed {
                path: lock_path,
                details: e.to_string(),
            }
        })
    }

    #[cfg(not(unix))]
    fn acquire_lock(&self) -> Result<File> {
        let lock_path = self.dir.join(LOCK_FILE_NAME);
        OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(|e| HwdError::LockFailed {
                path: lock_path,
                details: e.to_string(),
            })
    }

    // ──────────────────── quarantine ────────────────────

    /// Move `path` into quarantine.
    ///
    /// An occupant with the same name is superseded: its file and record are
    /// replaced whole.
    pub fn quarantine(&self, path: &Path) -> Result<QuarantineEntry> {
        self.quarantine_with(path, None)
    }

    /// Quarantine a scan match, recording the matched algorithm and digest.
    pub fn quarantine_detection(&self, detection: &Detection) -> Result<QuarantineEntry> {
        self.quarantine_with(
            &detection.path,
            Some((detection.algorithm, detection.digest.as_str())),
        )
    }

    fn quarantine_with(
        &self,
        path: &Path,
        matched: Option<(HashAlgorithm, &str)>,
    ) -> Result<QuarantineEntry> {
        let meta = match fs::symlink_metadata(path) {
            Ok(meta) => meta,
            Err(err) => {
                return Err(HwdError::QuarantineMoveFailed {
                    path: path.to_path_buf(),
                    details: err.to_string(),
                });
            }
        };
        if !meta.file_type().is_file() {
            return Err(HwdError::NotARegularFile {
                path: path.to_path_buf(),
            });
        }

        let original = resolve_entry_path(path);
        if is_within(&original, &self.dir) {
            return Err(HwdError::QuarantineMoveFailed {
                path: path.to_path_buf(),
                details: "file is already inside the quarantine directory".to_string(),
            });
        }
        let name = occupant_name(&original).ok_or_else(|| HwdError::QuarantineMoveFailed {
            path: path.to_path_buf(),
            details: "path has no file name".to_string(),
        })?;

        let occupant = self.dir.join(&name);
        let record_path = record_path_for(&occupant);
        let mut record = ProvenanceRecord::new(original.clone(), meta.len());
        if let Some((algorithm, digest)) = matched {
            record = record.with_match(algorithm, digest);
        }

        let _lock = self.acquire_lock()?;

        // Stage inside the quarantine dir first so a failed record write never
        // leaves a stale occupant paired with the wrong record.
        let staging = self.dir.join(scratch_name("staging"));
        move_file(&original, &staging).map_err(|e| HwdError::QuarantineMoveFailed {
            path: original.clone(),
            details: e.to_string(),
        })?;
        if !moved(&original, &staging) {
            return Err(undo_staging(
                &staging,
                &original,
                "source still present or staging copy missing after move",
            ));
        }

        // A superseded occupant keeps its record until the new file is in place.
        let parked = match self.park_record(&record_path) {
            Ok(parked) => parked,
            Err(err) => {
                return Err(undo_staging(
                    &staging,
                    &original,
                    &format!("could not set aside previous record: {err}"),
                ));
            }
        };
        let supersede = Supersede {
            occupant: &occupant,
            record_path: &record_path,
            parked: parked.as_deref(),
        };

        if let Err(err) = provenance::write_record(&record_path, &record) {
            return Err(supersede.roll_back(
                &staging,
                &original,
                &format!("provenance write failed: {err}"),
            ));
        }

        if let Err(err) = fs::rename(&staging, &occupant) {
            return Err(supersede.roll_back(
                &staging,
                &original,
                &format!("could not place occupant: {err}"),
            ));
        }
        if let Some(parked) = &parked {
            let _ = fs::remove_file(parked);
        }
        if !occupant.is_file() {
            return Err(HwdError::InconsistentQuarantineEntry {
                path: occupant,
                details: "occupant missing right after move".to_string(),
            });
        }

        Ok(QuarantineEntry {
            name: name.to_string_lossy().into_owned(),
            quarantined_path: occupant,
            record_path,
            provenance: Some(record),
            size_bytes: meta.len(),
        })
    }

    /// Move an existing record to a scratch name. `None` when there was none.
    fn park_record(&self, record_path: &Path) -> std::io::Result<Option<PathBuf>> {
        let parked = self.dir.join(scratch_name("superseded"));
        match fs::rename(record_path, &parked) {
            Ok(()) => Ok(Some(parked)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err),
        }
    }

    // ──────────────────── listing ────────────────────

    /// Enumerate occupants, cross-referenced with their records.
    ///
    /// Occupants without a usable record are still listed (with `provenance:
    /// None`) and also reported as inconsistencies.
    pub fn list_entries(&self) -> Result<QuarantineListing> {
        let mut occupants: Vec<(OsString, PathBuf)> = Vec::new();
        let mut records: Vec<(OsString, PathBuf)> = Vec::new();
        let mut remnants: Vec<PathBuf> = Vec::new();

        for dir_entry in fs::read_dir(&self.dir).map_err(|e| HwdError::io(&self.dir, e))? {
            let dir_entry = dir_entry.map_err(|e| HwdError::io(&self.dir, e))?;
            let name = dir_entry.file_name();
            match classify_name(&name) {
                EntryKind::Occupant => occupants.push((name, dir_entry.path())),
                EntryKind::Record => records.push((name, dir_entry.path())),
                EntryKind::ShredRemnant => remnants.push(dir_entry.path()),
                EntryKind::Scratch | EntryKind::Foreign => {}
            }
        }

        let mut listing = QuarantineListing::default();
        listing
            .inconsistencies
            .extend(remnants.into_iter().map(|path| Inconsistency {
                path,
                kind: InconsistencyKind::ShredRemnant,
                details: "shredded file was renamed but never removed".to_string(),
            }));
        let mut expected_records: HashSet<OsString> = HashSet::new();

        for (name, path) in occupants {
            let mut record_name = name.clone();
            record_name.push(provenance::META_SUFFIX);
            expected_records.insert(record_name);

            match self.load_entry(&name, &path) {
                Ok((entry, problem)) => {
                    if let Some(problem) = problem {
                        listing.inconsistencies.push(problem);
                    }
                    listing.entries.push(entry);
                }
                Err(problem) => listing.inconsistencies.push(problem),
            }
        }

        for (name, path) in records {
            if !expected_records.contains(&name) {
                listing.inconsistencies.push(Inconsistency {
                    path,
                    kind: InconsistencyKind::OrphanedRecord,
                    details: "provenance record has no quarantined file".to_string(),
                });
            }
        }

        listing.entries.sort_by(|a, b| a.name.cmp(&b.name));
        listing.inconsistencies.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(listing)
    }

    /// Build an entry for one occupant; a second value flags a record problem.
    fn load_entry(
        &self,
        name: &OsString,
        path: &Path,
    ) -> std::result::Result<(QuarantineEntry, Option<Inconsistency>), Inconsistency> {
        let meta = fs::symlink_metadata(path).map_err(|e| Inconsistency {
            path: path.to_path_buf(),
            kind: InconsistencyKind::NotAFile,
            details: e.to_string(),
        })?;
        if !meta.file_type().is_file() {
            return Err(Inconsistency {
                path: path.to_path_buf(),
                kind: InconsistencyKind::NotAFile,
                details: "quarantine name is used by something other than a regular file"
                    .to_string(),
            });
        }

        let record_path = record_path_for(path);
        let (provenance, problem) = match provenance::read_record(&record_path) {
            Ok(Some(record)) => (Some(record), None),
            Ok(None) => (
                None,
                Some(Inconsistency {
                    path: path.to_path_buf(),
                    kind: InconsistencyKind::MissingRecord,
                    details: "quarantined file has no provenance record".to_string(),
                }),
            ),
            Err(err) => (
                None,
                Some(Inconsistency {
                    path: record_path.clone(),
                    kind: InconsistencyKind::UnreadableRecord,
                    details: err.to_string(),
                }),
            ),
        };

        Ok((
            QuarantineEntry {
                name: name.to_string_lossy().into_owned(),
                quarantined_path: path.to_path_buf(),
                record_path,
                provenance,
                size_bytes: meta.len(),
            },
            problem,
        ))
    }

    /// Look an entry up by occupant name or by original file name.
    pub fn find(&self, name: &str) -> Result<QuarantineEntry> {
        let not_found = || HwdError::EntryNotFound {
            name: name.to_string(),
        };
        if name.is_empty() || name.contains(std::path::MAIN_SEPARATOR) || name.contains('/') {
            return Err(not_found());
        }

        let occupant = if name.ends_with(QUARANTINE_SUFFIX) {
            name.to_string()
        } else {
            format!("{name}{QUARANTINE_SUFFIX}")
        };
        let os_name = OsString::from(&occupant);
        if classify_name(&os_name) != EntryKind::Occupant {
            return Err(not_found());
        }

        let path = self.dir.join(&occupant);
        match fs::symlink_metadata(&path) {
            Ok(_) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => return Err(not_found()),
            Err(err) => return Err(HwdError::io(&path, err)),
        }
        self.load_entry(&os_name, &path)
            .map(|(entry, _)| entry)
            .map_err(|problem| problem.to_error())
    }

    // ──────────────────── restore ────────────────────

    /// Move an entry back to its recorded original path and drop its record.
    ///
    /// Fails without touching the quarantined copy when the record is missing,
    /// the destination is occupied, or the destination's parent cannot be created.
    pub fn restore(&self, entry: &QuarantineEntry) -> Result<PathBuf> {
        let _lock = self.acquire_lock()?;

        let source = &entry.quarantined_path;
        if fs::symlink_metadata(source).is_err() {
            return Err(HwdError::EntryNotFound {
                name: entry.name.clone(),
            });
        }

        // Re-read under the lock; the caller's copy may be stale.
        let record = match provenance::read_record(&entry.record_path) {
            Ok(Some(record)) => record,
            Ok(None) => {
                return Err(HwdError::ProvenanceMissing {
                    path: source.clone(),
                });
            }
            Err(err) => {
                return Err(HwdError::InconsistentQuarantineEntry {
                    path: entry.record_path.clone(),
                    details: format!("provenance record unreadable: {err}"),
                });
            }
        };
        let destination = record.original_path;

        if fs::symlink_metadata(&destination).is_ok() {
            return Err(HwdError::RestoreConflict { path: destination });
        }
        if let Some(parent) = destination.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| HwdError::RestoreFailed {
                path: destination.clone(),
                details: format!("cannot create {}: {e}", parent.display()),
            })?;
        }

        move_file(source, &destination).map_err(|e| HwdError::RestoreFailed {
            path: destination.clone(),
            details: e.to_string(),
        })?;
        if !moved(source, &destination) {
            return Err(HwdError::RestoreFailed {
                path: destination,
                details: "post-move check failed".to_string(),
            });
        }

        if let Err(err) = fs::remove_file(&entry.record_path)
            && err.kind() != ErrorKind::NotFound
        {
            return Err(HwdError::InconsistentQuarantineEntry {
                path: entry.record_path.clone(),
                details: format!(
                    "file restored to {} but record could not be removed: {err}",
                    destination.display()
                ),
            });
        }
        Ok(destination)
    }

    // ──────────────────── destroy ────────────────────

    /// Shred an entry's file, then drop its record.
    pub fn destroy(&self, entry: &QuarantineEntry, shredder: &Shredder) -> Result<DestructionReceipt> {
        let _lock = self.acquire_lock()?;

        if fs::symlink_metadata(&entry.quarantined_path).is_err() {
            return Err(HwdError::EntryNotFound {
                name: entry.name.clone(),
            });
        }
        let receipt = shredder.shred(&entry.quarantined_path)?;

        if let Err(err) = fs::remove_file(&entry.record_path)
            && err.kind() != ErrorKind::NotFound
        {
            return Err(HwdError::InconsistentQuarantineEntry {
                path: entry.record_path.clone(),
                details: format!("file shredded but record could not be removed: {err}"),
            });
        }
        Ok(receipt)
    }
}

// ──────────────────── moves ────────────────────

/// Record bookkeeping for one quarantine transaction that may replace an
/// existing occupant.
struct Supersede<'a> {
    occupant: &'a Path,
    record_path: &'a Path,
    parked: Option<&'a Path>,
}

impl Supersede<'_> {
    /// Drop the new record, return the staged file, then reinstate the
    /// previous occupant's record.
    fn roll_back(&self, staging: &Path, original: &Path, reason: &str) -> HwdError {
        let _ = fs::remove_file(self.record_path);
        let staged = undo_staging(staging, original, reason);
        let Some(parked) = self.parked else {
            return staged;
        };
        match fs::rename(parked, self.record_path) {
            Ok(()) => staged,
            Err(err) => HwdError::InconsistentQuarantineEntry {
                path: self.occupant.to_path_buf(),
                details: format!(
                    "{staged}; previous record could not be put back and remains at {}: {err}",
                    parked.display()
                ),
            },
        }
    }
}

/// Put a staged file back where it came from after a failed transaction.
fn undo_staging(staging: &Path, original: &Path, reason: &str) -> HwdError {
    if fs::symlink_metadata(staging).is_err() {
        // Nothing staged; the source never left.
        return HwdError::QuarantineMoveFailed {
            path: original.to_path_buf(),
            details: reason.to_string(),
        };
    }
    if fs::symlink_metadata(original).is_ok() {
        // Source still in place; the staged file is a duplicate.
        let _ = fs::remove_file(staging);
        return HwdError::QuarantineMoveFailed {
            path: original.to_path_buf(),
            details: reason.to_string(),
        };
    }
    if move_file(staging, original).is_ok()
        && moved(staging, original)
    {
        return HwdError::QuarantineMoveFailed {
            path: original.to_path_buf(),
            details: format!("{reason}; file returned to its original location"),
        };
    }
    HwdError::InconsistentQuarantineEntry {
        path: staging.to_path_buf(),
        details: format!(
            "{reason}; could not return file to {}, it remains at {}",
            original.display(),
            staging.display()
        ),
    }
}

/// Rename, falling back to copy + fsync + remove across filesystems.
fn move_file(from: &Path, to: &Path) -> std::io::Result<()> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::CrossesDevices => copy_then_remove(from, to),
        Err(err) => Err(err),
    }
}

fn copy_then_remove(from: &Path, to: &Path) -> std::io::Result<()> {
    let dir = to.parent().unwrap_or_else(|| Path::new("."));
    let scratch = dir.join(scratch_name("copy"));

    let copied = (|| -> std::io::Result<()> {
        fs::copy(from, &scratch)?;
        File::open(&scratch)?.sync_all()?;
        fs::rename(&scratch, to)
    })();
    if let Err(err) = copied {
        let _ = fs::remove_file(&scratch);
        return Err(err);
    }

    if let Err(err) = fs::remove_file(from) {
        // Keep exactly one copy: drop the new one, the source stays.
        let _ = fs::remove_file(to);
        return Err(err);
    }
    Ok(())
}

/// Post-condition of a move: source absent and destination present.
fn moved(from: &Path, to: &Path) -> bool {
    let source_gone = matches!(
        fs::symlink_metadata(from),
        Err(ref err) if err.kind() == ErrorKind::NotFound
    );
    source_gone && fs::symlink_metadata(to).is_ok_and(|m| m.file_type().is_file())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::ShredderConfig;
    use tempfile::TempDir;

    struct Fixture {
        _tmp: TempDir,
        work: PathBuf,
        store: QuarantineStore,
    }

    fn fixture() -> Fixture {
        let tmp = TempDir::new().unwrap();
        let work = tmp.path().join("work");
        fs::create_dir_all(&work).unwrap();
        let store = QuarantineStore::open(&tmp.path().join("quarantine")).unwrap();
        Fixture {
            work: resolve_absolute_path(&work),
            store,
            _tmp: tmp,
        }
    }

    fn occupants(store: &QuarantineStore) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(store.dir())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|n| n != LOCK_FILE_NAME)
            .collect();
        names.sort();
        names
    }

    #[test]
    fn quarantine_moves_file_and_writes_record() {
        let fx = fixture();
        let file = fx.work.join("evil.exe");
        fs::write(&file, b"EICAR").unwrap();

        let entry = fx.store.quarantine(&file).unwrap();
        assert!(!file.exists());
        assert_eq!(entry.name, "evil.exe_quarantined");
        assert_eq!(fs::read(&entry.quarantined_path).unwrap(), b"EICAR");
        assert_eq!(entry.original_path(), Some(file.as_path()));
        assert_eq!(
            occupants(&fx.store),
            vec!["evil.exe_quarantined", "evil.exe_quarantined.meta"]
        );
        let record = provenance::read_record(&entry.record_path).unwrap().unwrap();
        assert_eq!(record.original_path, file);
        assert_eq!(record.size_bytes, Some(5));
    }

    #[test]
    fn detection_provenance_is_recorded() {
        let fx = fixture();
        let file = fx.work.join("sample.bin");
        fs::write(&file, b"x").unwrap();
        let detection = Detection {
            path: file,
            digest: "deadbeef".to_string(),
            algorithm: HashAlgorithm::Sha1,
        };
        let entry = fx.store.quarantine_detection(&detection).unwrap();
        let record = entry.provenance.unwrap();
        assert_eq!(record.matched_algorithm, Some(HashAlgorithm::Sha1));
        assert_eq!(record.matched_digest.as_deref(), Some("deadbeef"));
    }

    #[test]
    fn restore_round_trips_content_and_clears_quarantine() {
        let fx = fixture();
        let file = fx.work.join("nested/dir/doc.txt");
        fs::create_dir_all(file.parent().unwrap()).unwrap();
        fs::write(&file, b"payload bytes").unwrap();

        let entry = fx.store.quarantine(&file).unwrap();
        fs::remove_dir_all(fx.work.join("nested")).unwrap();

        let restored = fx.store.restore(&entry).unwrap();
        assert_eq!(restored, file);
        assert_eq!(fs::read(&file).unwrap(), b"payload bytes");
        assert!(occupants(&fx.store).is_empty());
    }

    #[test]
    fn same_name_supersedes_previous_occupant() {
        let fx = fixture();
        let first = fx.work.join("a/x.bin");
        let second = fx.work.join("b/x.bin");
        for (path, body) in [(&first, b"one".as_slice()), (&second, b"two".as_slice())] {
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, body).unwrap();
        }

        fx.store.quarantine(&first).unwrap();
        let entry = fx.store.quarantine(&second).unwrap();

        let listing = fx.store.list_entries().unwrap();
        assert_eq!(listing.entries.len(), 1);
        assert!(listing.inconsistencies.is_empty());
        assert_eq!(listing.entries[0].original_path(), Some(second.as_path()));
        assert_eq!(fs::read(&entry.quarantined_path).unwrap(), b"two");
        assert_eq!(occupants(&fx.store).len(), 2);
    }

    #[test]
    fn failed_supersede_keeps_previous_record() {
        let fx = fixture();
        let occupant = fx.store.dir().join("x.bin_quarantined");
        let previous = ProvenanceRecord::new(PathBuf::from("/old/x.bin"), 3);
        provenance::write_record(&record_path_for(&occupant), &previous).unwrap();
        // A non-empty directory squats on the occupant name, so the final
        // rename fails after the new record would have been written.
        fs::create_dir_all(occupant.join("inner")).unwrap();

        let file = fx.work.join("x.bin");
        fs::write(&file, b"new").unwrap();
        let err = fx.store.quarantine(&file).unwrap_err();

        assert!(matches!(err, HwdError::QuarantineMoveFailed { .. }));
        assert_eq!(fs::read(&file).unwrap(), b"new");
        let kept = provenance::read_record(&record_path_for(&occupant))
            .unwrap()
            .unwrap();
        assert_eq!(kept, previous);
        assert_eq!(
            occupants(&fx.store),
            vec!["x.bin_quarantined", "x.bin_quarantined.meta"]
        );
    }

    #[test]
    fn scratch_prefixed_file_lists_finds_and_restores() {
        let fx = fixture();
        let file = fx.work.join(".hwd-cache");
        fs::write(&file, b"cached").unwrap();

        let entry = fx.store.quarantine(&file).unwrap();
        assert_eq!(entry.name, ".hwd-cache_quarantined");

        let listing = fx.store.list_entries().unwrap();
        assert_eq!(listing.entries.len(), 1);
        assert!(listing.inconsistencies.is_empty());
        assert_eq!(listing.entries[0].original_path(), Some(file.as_path()));

        let found = fx.store.find(".hwd-cache").unwrap();
        assert_eq!(fx.store.restore(&found).unwrap(), file);
        assert_eq!(fs::read(&file).unwrap(), b"cached");
        assert!(occupants(&fx.store).is_empty());
    }

    #[test]
    fn shred_remnants_are_reported() {
        let fx = fixture();
        let remnant = fx.store.dir().join(".hwd-shred-0123456789abcdef");
        fs::write(&remnant, b"noise").unwrap();
        fs::write(fx.store.dir().join(".hwd-staging-00"), b"in flight").unwrap();

        let listing = fx.store.list_entries().unwrap();
        assert!(listing.entries.is_empty());
        assert_eq!(listing.inconsistencies.len(), 1);
        assert_eq!(
            listing.inconsistencies[0].kind,
            InconsistencyKind::ShredRemnant
        );
        assert_eq!(listing.inconsistencies[0].path, remnant);
    }

    #[test]
    fn restore_refuses_occupied_destination() {
        let fx = fixture();
        let file = fx.work.join("f.txt");
        fs::write(&file, b"quarantined").unwrap();
        let entry = fx.store.quarantine(&file).unwrap();
        fs::write(&file, b"newcomer").unwrap();

        let err = fx.store.restore(&entry).unwrap_err();
        assert!(matches!(err, HwdError::RestoreConflict { .. }));
        assert_eq!(fs::read(&entry.quarantined_path).unwrap(), b"quarantined");
        assert!(entry.record_path.exists());
        assert_eq!(fs::read(&file).unwrap(), b"newcomer");
    }

    #[test]
    fn restore_without_record_fails_loudly() {
        let fx = fixture();
        let file = fx.work.join("f.txt");
        fs::write(&file, b"data").unwrap();
        let entry = fx.store.quarantine(&file).unwrap();
        fs::remove_file(&entry.record_path).unwrap();

        let err = fx.store.restore(&entry).unwrap_err();
        assert!(matches!(err, HwdError::ProvenanceMissing { .. }));
        assert!(entry.quarantined_path.exists());
        assert!(!file.exists());
    }

    #[cfg(unix)]
    #[test]
    fn restore_fails_when_parent_cannot_be_created() {
        let fx = fixture();
        let file = fx.work.join("blocked/f.txt");
        fs::create_dir_all(file.parent().unwrap()).unwrap();
        fs::write(&file, b"data").unwrap();
        let entry = fx.store.quarantine(&file).unwrap();

        // A regular file where the parent directory should be.
        fs::remove_dir(fx.work.join("blocked")).unwrap();
        fs::write(fx.work.join("blocked"), b"in the way").unwrap();

        let err = fx.store.restore(&entry).unwrap_err();
        assert!(matches!(err, HwdError::RestoreFailed { .. }));
        assert!(entry.quarantined_path.exists());
        assert!(entry.record_path.exists());
    }

    #[test]
    fn legacy_plain_text_record_restores() {
        let fx = fixture();
        let original = fx.work.join("old.dat");
        let occupant = fx.store.dir().join("old.dat_quarantined");
        fs::write(&occupant, b"legacy").unwrap();
        fs::write(
            record_path_for(&occupant),
            original.to_string_lossy().as_bytes(),
        )
        .unwrap();

        let entry = fx.store.find("old.dat").unwrap();
        assert!(entry.provenance.as_ref().unwrap().is_legacy());
        fx.store.restore(&entry).unwrap();
        assert_eq!(fs::read(&original).unwrap(), b"legacy");
    }

    #[test]
    fn listing_reports_orphans_both_ways() {
        let fx = fixture();
        fs::write(fx.store.dir().join("lonely_quarantined"), b"x").unwrap();
        fs::write(fx.store.dir().join("ghost_quarantined.meta"), b"/tmp/ghost").unwrap();
        fs::write(fx.store.dir().join("unrelated.txt"), b"ignored").unwrap();

        let listing = fx.store.list_entries().unwrap();
        assert_eq!(listing.entries.len(), 1);
        assert!(listing.entries[0].provenance.is_none());
        let kinds: Vec<_> = listing.inconsistencies.iter().map(|i| i.kind).collect();
        assert_eq!(kinds.len(), 2);
        assert!(kinds.contains(&InconsistencyKind::MissingRecord));
        assert!(kinds.contains(&InconsistencyKind::OrphanedRecord));
        assert_eq!(listing.inconsistencies[0].to_error().code(), "HWD-3005");
    }

    #[test]
    fn destroy_shreds_file_and_record() {
        let fx = fixture();
        let file = fx.work.join("doomed.bin");
        fs::write(&file, vec![7u8; 10_000]).unwrap();
        let entry = fx.store.quarantine(&file).unwrap();

        let shredder = Shredder::new(&ShredderConfig::default());
        let receipt = fx.store.destroy(&entry, &shredder).unwrap();
        assert_eq!(receipt.passes, 3);
        assert_eq!(receipt.size_bytes, 10_000);
        assert!(occupants(&fx.store).is_empty());
        assert!(fx.store.list_entries().unwrap().entries.is_empty());
        assert!(!file.exists());
    }

    #[test]
    fn find_accepts_both_name_forms_and_rejects_paths() {
        let fx = fixture();
        let file = fx.work.join("n.txt");
        fs::write(&file, b"n").unwrap();
        fx.store.quarantine(&file).unwrap();

        assert_eq!(fx.store.find("n.txt").unwrap().name, "n.txt_quarantined");
        assert_eq!(
            fx.store.find("n.txt_quarantined").unwrap().name,
            "n.txt_quarantined"
        );
        assert!(matches!(
            fx.store.find("../n.txt"),
            Err(HwdError::EntryNotFound { .. })
        ));
        assert!(matches!(
            fx.store.find("missing"),
            Err(HwdError::EntryNotFound { .. })
        ));
    }

    #[test]
    fn quarantine_of_missing_file_fails_cleanly() {
        let fx = fixture();
        let err = fx.store.quarantine(&fx.work.join("nope")).unwrap_err();
        assert!(matches!(err, HwdError::QuarantineMoveFailed { .. }));
        assert!(occupants(&fx.store).is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn symlink_is_not_quarantined() {
        let fx = fixture();
        let target = fx.work.join("target");
        fs::write(&target, b"t").unwrap();
        let link = fx.work.join("link");
        std::os::unix::fs::symlink(&target, &link).unwrap();

        let err = fx.store.quarantine(&link).unwrap_err();
        assert!(matches!(err, HwdError::NotARegularFile { .. }));
        assert!(target.exists());
    }

    #[test]
    fn files_inside_quarantine_are_refused() {
        let fx = fixture();
        let inside = fx.store.dir().join("stray.bin");
        fs::write(&inside, b"s").unwrap();
        let err = fx.store.quarantine(&inside).unwrap_err();
        assert!(matches!(err, HwdError::QuarantineMoveFailed { .. }));
        assert!(inside.exists());
    }

    #[cfg(unix)]
    #[test]
    fn failed_move_leaves_source_in_place() {
        use std::os::unix::fs::PermissionsExt;
        if nix::unistd::geteuid().is_root() {
            return;
        }
        let fx = fixture();
        let locked_dir = fx.work.join("locked");
        fs::create_dir_all(&locked_dir).unwrap();
        let file = locked_dir.join("f.bin");
        fs::write(&file, b"keep").unwrap();
        fs::set_permissions(&locked_dir, fs::Permissions::from_mode(0o500)).unwrap();

        let err = fx.store.quarantine(&file).unwrap_err();
        fs::set_permissions(&locked_dir, fs::Permissions::from_mode(0o700)).unwrap();
        assert!(matches!(err, HwdError::QuarantineMoveFailed { .. }));
        assert_eq!(fs::read(&file).unwrap(), b"keep");
        assert!(occupants(&fx.store).is_empty());
    }

    #[test]
    fn copy_fallback_moves_content() {
        let tmp = TempDir::new().unwrap();
        let from = tmp.path().join("from");
        let to = tmp.path().join("to");
        fs::write(&from, b"abc").unwrap();
        copy_then_remove(&from, &to).unwrap();
        assert!(moved(&from, &to));
        assert_eq!(fs::read(&to).unwrap(), b"abc");
    }
}
