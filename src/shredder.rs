//! Destruction engine: multi-pass random overwrite, then unlink.
//!
//! Every pass rewrites the file's full current length with fresh random bytes
//! and is flushed with `fsync` before the next one starts. The directory entry
//! is removed only after all passes succeed; any failure leaves the file on
//! disk with its length unchanged.
//!
//! Overwriting in place does not guarantee physical erasure on wear-leveled
//! flash, copy-on-write filesystems, or volumes with snapshots. That is a
//! limitation of the medium, not of this module.

#![allow(missing_docs)]
#![allow(clippy::cast_possible_truncation)]

use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use rand::RngCore;
use serde::Serialize;

use crate::core::config::ShredderConfig;
use crate::core::errors::{HwdError, Result};

// ──────────────────── constants ────────────────────

const CHUNK_SIZE: usize = 1024 * 1024;
const SHRED_NAME_PREFIX: &str = ".hwd-shred-";

// ──────────────────── receipt ────────────────────

/// Evidence that a path was overwritten `passes` times and removed.
#[derive(Debug, Clone, Serialize)]
pub struct DestructionReceipt {
    pub path: PathBuf,
    pub passes: u32,
    pub size_bytes: u64,
    pub bytes_overwritten: u64,
    #[serde(serialize_with = "serialize_millis")]
    pub duration: Duration,
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn serialize_millis<S: serde::Serializer>(
    d: &Duration,
    s: S,
) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

/// Whether a file name was produced by the pre-unlink rename.
#[must_use]
pub fn is_shred_temp_name(name: &str) -> bool {
    name.starts_with(SHRED_NAME_PREFIX)
}

// ──────────────────── shredder ────────────────────

/// Irreversible file destruction. Independent of quarantine bookkeeping.
#[derive(Debug, Clone)]
pub struct Shredder {
    passes: u32,
    rename_before_unlink: bool,
}

impl Default for Shredder {
    fn default() -> Self {
        Self::new(&ShredderConfig::default())
    }
}

impl Shredder {
    #[must_use]
    pub fn new(config: &ShredderConfig) -> Self {
        Self {
            passes: config.passes,
            rename_before_unlink: config.rename_before_unlink,
        }
    }

    #[must_use]
    pub fn passes(&self) -> u32 {
        self.passes
    }

    /// Shred with the configured pass count.
    pub fn shred(&self, path: &Path) -> Result<DestructionReceipt> {
        self.shred_with_passes(path, self.passes)
    }

    /// Overwrite `path` `passes` times with random bytes, then remove it.
    pub fn shred_with_passes(&self, path: &Path, passes: u32) -> Result<DestructionReceipt> {
        let start = Instant::now();
        if passes == 0 {
            return Err(HwdError::InvalidConfig {
                details: "shred passes must be >= 1".to_string(),
            });
        }

        // Never follow a symlink: shredding its target would destroy a file
        // the caller did not name.
        let meta = fs::symlink_metadata(path).map_err(|e| HwdError::io(path, e))?;
        if !meta.file_type().is_file() {
            return Err(HwdError::NotARegularFile {
                path: path.to_path_buf(),
            });
        }

        let mut file = OpenOptions::new()
            .write(true)
            .open(path)
            .map_err(|e| overwrite_failed(path, 1, &e))?;
        let size_bytes = file
            .metadata()
            .map_err(|e| overwrite_failed(path, 1, &e))?
            .len();

        let mut chunk = vec![0u8; CHUNK_SIZE];
        for pass in 1..=passes {
            overwrite_pass(&mut file, size_bytes, &mut chunk)
                .map_err(|e| overwrite_failed(path, pass, &e))?;
        }
        drop(file);

        let doomed = if self.rename_before_unlink {
            rename_to_random(path)
        } else {
            path.to_path_buf()
        };
        fs::remove_file(&doomed).map_err(|e| HwdError::io(&doomed, e))?;
        ensure_unlinked(&doomed)?;

        Ok(DestructionReceipt {
            path: path.to_path_buf(),
            passes,
            size_bytes,
            bytes_overwritten: size_bytes.saturating_mul(u64::from(passes)),
            duration: start.elapsed(),
        })
    }
}

/// Post-condition of the unlink. Scoped to the one path, so batches go on.
fn ensure_unlinked(doomed: &Path) -> Result<()> {
    match fs::symlink_metadata(doomed) {
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(HwdError::io(doomed, err)),
        Ok(_) => Err(HwdError::io(
            doomed,
            std::io::Error::new(ErrorKind::AlreadyExists, "still present after unlink"),
        )),
    }
}

fn overwrite_failed(path: &Path, pass: u32, err: &std::io::Error) -> HwdError {
    HwdError::OverwriteFailed {
        path: path.to_path_buf(),
        pass,
        details: err.to_string(),
    }
}

/// One full-length pass from offset zero, flushed to storage.
fn overwrite_pass(file: &mut File, size_bytes: u64, chunk: &mut [u8]) -> std::io::Result<()> {
    let mut rng = rand::rng();
    file.seek(SeekFrom::Start(0))?;

    let mut written: u64 = 0;
    while written < size_bytes {
        let remaining = size_bytes - written;
        let to_write = if remaining > chunk.len() as u64 {
            chunk.len()
        } else {
            remaining as usize
        };
        rng.fill_bytes(&mut chunk[..to_write]);
        file.write_all(&chunk[..to_write])?;
        written += to_write as u64;
    }

    file.flush()?;
    file.sync_all()
}

/// Rename within the same directory; on failure unlink under the original name.
fn rename_to_random(path: &Path) -> PathBuf {
    let mut suffix = [0u8; 8];
    rand::rng().fill_bytes(&mut suffix);
    let name = format!("{SHRED_NAME_PREFIX}{}", hex::encode(suffix));
    let target = path
        .parent()
        .map_or_else(|| PathBuf::from(&name), |parent| parent.join(&name));
    match fs::rename(path, &target) {
        Ok(()) => target,
        Err(err) => {
            eprintln!(
                "[HWD-SHRED] WARNING: rename before unlink failed for {}: {err}",
                path.display()
            );
            path.to_path_buf()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn shredder(passes: u32, rename_before_unlink: bool) -> Shredder {
        Shredder::new(&ShredderConfig {
            passes,
            rename_before_unlink,
        })
    }

    #[test]
    fn shred_removes_file_and_reports_passes() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("victim.bin");
        fs::write(&path, vec![0x41u8; 3 * CHUNK_SIZE + 17]).unwrap();

        let receipt = shredder(3, true).shred(&path).unwrap();
        assert!(!path.exists());
        assert_eq!(receipt.passes, 3);
        assert_eq!(receipt.size_bytes, (3 * CHUNK_SIZE + 17) as u64);
        assert_eq!(receipt.bytes_overwritten, receipt.size_bytes * 3);
        // Nothing left behind, including the renamed entry.
        assert_eq!(fs::read_dir(tmp.path()).unwrap().count(), 0);
    }

    #[test]
    fn shred_without_rename_removes_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("plain.txt");
        fs::write(&path, b"secret").unwrap();
        shredder(1, false).shred(&path).unwrap();
        assert!(!path.exists());
        assert_eq!(fs::read_dir(tmp.path()).unwrap().count(), 0);
    }

    #[test]
    fn empty_file_is_removed() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("empty");
        fs::write(&path, b"").unwrap();
        let receipt = Shredder::default().shred(&path).unwrap();
        assert_eq!(receipt.bytes_overwritten, 0);
        assert!(!path.exists());
    }

    #[test]
    fn overwrite_pass_replaces_content_without_changing_length() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("f");
        let original = vec![0u8; 4096];
        fs::write(&path, &original).unwrap();
        let mut file = OpenOptions::new().write(true).open(&path).unwrap();
        let mut chunk = vec![0u8; 1000];
        overwrite_pass(&mut file, 4096, &mut chunk).unwrap();
        drop(file);
        let after = fs::read(&path).unwrap();
        assert_eq!(after.len(), 4096);
        assert_ne!(after, original);
    }

    #[test]
    fn zero_passes_rejected_and_file_kept() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("keep");
        fs::write(&path, b"data").unwrap();
        let err = shredder(1, true).shred_with_passes(&path, 0).unwrap_err();
        assert_eq!(err.code(), "HWD-1001");
        assert_eq!(fs::read(&path).unwrap(), b"data");
    }

    #[test]
    fn directory_is_not_a_regular_file() {
        let tmp = TempDir::new().unwrap();
        let err = Shredder::default().shred(tmp.path()).unwrap_err();
        assert!(matches!(err, HwdError::NotARegularFile { .. }));
        assert!(tmp.path().exists());
    }

    #[cfg(unix)]
    #[test]
    fn symlink_is_refused_and_target_untouched() {
        let tmp = TempDir::new().unwrap();
        let target = tmp.path().join("target");
        let link = tmp.path().join("link");
        fs::write(&target, b"precious").unwrap();
        std::os::unix::fs::symlink(&target, &link).unwrap();

        let err = Shredder::default().shred(&link).unwrap_err();
        assert!(matches!(err, HwdError::NotARegularFile { .. }));
        assert_eq!(fs::read(&target).unwrap(), b"precious");
        assert!(fs::symlink_metadata(&link).is_ok());
    }

    #[test]
    fn missing_file_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let err = Shredder::default()
            .shred(&tmp.path().join("ghost"))
            .unwrap_err();
        assert_eq!(err.code(), "HWD-5002");
    }

    #[cfg(unix)]
    #[test]
    fn unwritable_file_fails_and_stays_intact() {
        use std::os::unix::fs::PermissionsExt;
        if nix::unistd::geteuid().is_root() {
            return;
        }
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("ro");
        fs::write(&path, b"read only").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o400)).unwrap();

        let err = Shredder::default().shred(&path).unwrap_err();
        assert!(matches!(err, HwdError::OverwriteFailed { pass: 1, .. }));
        assert_eq!(fs::read(&path).unwrap(), b"read only");
    }

    #[test]
    fn shred_temp_names_are_recognized() {
        assert!(is_shred_temp_name(".hwd-shred-00ff00ff00ff00ff"));
        assert!(!is_shred_temp_name("report.pdf_quarantined"));
    }

    #[test]
    fn lingering_path_after_unlink_is_a_per_entry_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("recreated");
        fs::write(&path, b"back again").unwrap();

        let err = ensure_unlinked(&path).unwrap_err();
        assert_eq!(err.code(), "HWD-5002");
        assert!(!err.is_fatal());
        assert!(err.to_string().contains("still present after unlink"));

        fs::remove_file(&path).unwrap();
        ensure_unlinked(&path).unwrap();
    }
}
