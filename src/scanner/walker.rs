//! Parallel scan walker: subtree traversal, per-file digesting, signature matching.
//!
//! The walker fans directories out to worker threads over a crossbeam work
//! queue. Each worker lists one directory, queues its subdirectories and
//! digests its regular files in place, so digesting runs in parallel across
//! files with no shared mutable state beyond the in-flight counter.
//!
//! Symlink policy: entries below the target are never followed. A symlinked
//! file or directory is counted in `symlinks_skipped` and nothing else; this
//! rules out traversal loops and scanning outside the declared target. The
//! target path itself is resolved, since the caller named it explicitly.

#![allow(missing_docs)]

use std::collections::HashSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel as channel;
use serde::Serialize;

use crate::core::errors::{HwdError, Result};
use crate::core::interrupt::ScanInterrupt;
use crate::core::paths::resolve_absolute_path;
use crate::scanner::digest::{DigestEngine, DigestSet, HashAlgorithm};
use crate::scanner::signatures::SignatureSet;

/// Walker configuration derived from `ScannerConfig`.
#[derive(Debug, Clone)]
pub struct WalkerConfig {
    pub parallelism: usize,
    /// Subtrees never entered. Compared after resolution to absolute form.
    pub excluded_paths: HashSet<PathBuf>,
}

impl Default for WalkerConfig {
    fn default() -> Self {
        Self {
            parallelism: 1,
            excluded_paths: HashSet::new(),
        }
    }
}

/// One infected file: the first matching algorithm in priority order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Detection {
    pub path: PathBuf,
    pub digest: String,
    pub algorithm: HashAlgorithm,
}

/// A file (or directory listing) that could not be read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnreadableFile {
    pub path: PathBuf,
    pub error_code: String,
    pub details: String,
}

impl UnreadableFile {
    fn from_error(path: &Path, err: &HwdError) -> Self {
        let details = match err {
            HwdError::Unreadable { details, .. } => details.clone(),
            other => other.to_string(),
        };
        Self {
            path: path.to_path_buf(),
            error_code: err.code().to_string(),
            details,
        }
    }
}

/// Outcome of scanning one target.
///
/// `detections` and `unreadable` are sorted by path, so two scans of the same
/// tree with the same signatures produce identical reports.
#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    pub target: PathBuf,
    pub detections: Vec<Detection>,
    pub unreadable: Vec<UnreadableFile>,
    pub files_clean: usize,
    pub symlinks_skipped: usize,
    pub signatures_loaded: usize,
    pub interrupted: bool,
    #[serde(serialize_with = "serialize_millis")]
    pub duration: Duration,
}

impl ScanReport {
    /// Files whose content was fully digested (clean + infected).
    pub fn files_scanned(&self) -> usize {
        self.files_clean + self.detections.len()
    }

    /// No infections and no unreadable files.
    pub fn is_clean(&self) -> bool {
        self.detections.is_empty() && self.unreadable.is_empty()
    }
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn serialize_millis<S: serde::Serializer>(d: &Duration, s: S) -> std::result::Result<S::Ok, S::Error> {
    #[allow(clippy::cast_possible_truncation)]
    s.serialize_u64(d.as_millis() as u64)
}

/// Digests and verdict for a single file.
#[derive(Debug, Clone, Serialize)]
pub struct FileInspection {
    pub path: PathBuf,
    pub digests: DigestSet,
    pub detection: Option<Detection>,
}

/// Per-entry result emitted by workers.
enum Verdict {
    Clean,
    Infected(Detection),
    Unreadable(UnreadableFile),
    SymlinkSkipped,
}

/// Work item: (path as reported to the caller, resolved path for exclusion checks).
type WorkItem = (PathBuf, PathBuf);

/// Classifies files under a target against a signature set.
///
/// Scanning never moves, modifies, or deletes anything.
pub struct ScanWalker {
    config: WalkerConfig,
    engine: DigestEngine,
    signatures: Arc<SignatureSet>,
    interrupt: ScanInterrupt,
    excluded: Arc<HashSet<PathBuf>>,
}

impl ScanWalker {
    pub fn new(config: WalkerConfig, engine: DigestEngine, signatures: Arc<SignatureSet>) -> Self {
        let excluded = config
            .excluded_paths
            .iter()
            .map(|p| resolve_absolute_path(p))
            .collect();
        Self {
            config,
            engine,
            signatures,
            interrupt: ScanInterrupt::new(),
            excluded: Arc::new(excluded),
        }
    }

    /// Share an interrupt flag; the walk stops between files once it fires.
    #[must_use]
    pub fn with_interrupt(mut self, interrupt: ScanInterrupt) -> Self {
        self.interrupt = interrupt;
        self
    }

    pub fn signatures(&self) -> &SignatureSet {
        &self.signatures
    }

    /// First digest (strongest algorithm first) present in the signature set.
    ///
    /// Digests under algorithms this walker was not built with never match,
    /// so a wider [`DigestSet`] gets the same verdict a scan would give.
    pub fn classify(&self, digests: &DigestSet) -> Option<(HashAlgorithm, String)> {
        let configured = self.engine.algorithms();
        digests
            .iter()
            .filter(|(algorithm, _)| configured.contains(algorithm))
            .find(|(_, hex)| self.signatures.contains(hex))
            .map(|(algorithm, hex)| (algorithm, hex.to_string()))
    }

    /// Digest one file under every configured algorithm and match it.
    pub fn inspect_file(&self, path: &Path) -> Result<FileInspection> {
        let digests = self.engine.digest_file(path)?;
        Ok(self.inspect_digests(path, digests))
    }

    /// Verdict for a file whose digests were computed elsewhere.
    #[must_use]
    pub fn inspect_digests(&self, path: &Path, digests: DigestSet) -> FileInspection {
        let detection = self.classify(&digests).map(|(algorithm, digest)| Detection {
            path: path.to_path_buf(),
            digest,
            algorithm,
        });
        FileInspection {
            path: path.to_path_buf(),
            digests,
            detection,
        }
    }

    /// Scan a file or directory tree.
    ///
    /// Fails only when the target itself is missing or unstattable; per-file
    /// failures are collected in [`ScanReport::unreadable`].
    pub fn scan(&self, target: &Path) -> Result<ScanReport> {
        let start = Instant::now();
        let meta = match fs::metadata(target) {
            Ok(m) => m,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(HwdError::TargetNotFound {
                    path: target.to_path_buf(),
                });
            }
            Err(err) => return Err(HwdError::io(target, err)),
        };

        let mut report = ScanReport {
            target: target.to_path_buf(),
            detections: Vec::new(),
            unreadable: Vec::new(),
            files_clean: 0,
            symlinks_skipped: 0,
            signatures_loaded: self.signatures.len(),
            interrupted: false,
            duration: Duration::ZERO,
        };

        if meta.is_dir() {
            let resolved = resolve_absolute_path(target);
            if !is_excluded(&resolved, &self.excluded) {
                for verdict in self.stream((target.to_path_buf(), resolved)) {
                    tally(&mut report, verdict);
                }
            }
        } else {
            let verdict = match self.inspect_file(target) {
                Ok(FileInspection {
                    detection: Some(d), ..
                }) => Verdict::Infected(d),
                Ok(_) => Verdict::Clean,
                Err(err) => Verdict::Unreadable(UnreadableFile::from_error(target, &err)),
            };
            tally(&mut report, verdict);
        }

        report.detections.sort_by(|a, b| a.path.cmp(&b.path));
        report.unreadable.sort_by(|a, b| a.path.cmp(&b.path));
        report.interrupted = self.interrupt.is_triggered();
        report.duration = start.elapsed();
        Ok(report)
    }

    /// Run the parallel walk from `root` and return the verdict stream.
    fn stream(&self, root: WorkItem) -> channel::Receiver<Verdict> {
        let parallelism = self.config.parallelism.max(1);

        // Unbounded: a full queue must never cost us a subtree.
        let (work_tx, work_rx) = channel::unbounded::<WorkItem>();
        let (result_tx, result_rx) = channel::unbounded::<Verdict>();
        let in_flight = Arc::new(AtomicUsize::new(1));
        let _ = work_tx.send(root);

        for _ in 0..parallelism {
            let work_rx = work_rx.clone();
            let work_tx = work_tx.clone();
            let result_tx = result_tx.clone();
            let in_flight = Arc::clone(&in_flight);
            let ctx = WorkerContext {
                engine: self.engine.clone(),
                signatures: Arc::clone(&self.signatures),
                excluded: Arc::clone(&self.excluded),
                interrupt: self.interrupt.clone(),
            };

            thread::spawn(move || {
                walker_thread(&work_rx, &work_tx, &result_tx, &in_flight, &ctx);
            });
        }

        // Only worker-held senders remain; the receiver ends when they exit.
        result_rx
    }
}

fn tally(report: &mut ScanReport, verdict: Verdict) {
    match verdict {
        Verdict::Clean => report.files_clean += 1,
        Verdict::Infected(d) => report.detections.push(d),
        Verdict::Unreadable(u) => report.unreadable.push(u),
        Verdict::SymlinkSkipped => report.symlinks_skipped += 1,
    }
}

fn match_signature(signatures: &SignatureSet, digests: &DigestSet) -> Option<(HashAlgorithm, String)> {
    digests
        .iter()
        .find(|(_, hex)| signatures.contains(hex))
        .map(|(algorithm, hex)| (algorithm, hex.to_string()))
}

fn is_excluded(resolved: &Path, excluded: &HashSet<PathBuf>) -> bool {
    excluded.iter().any(|e| resolved.starts_with(e))
}

struct WorkerContext {
    engine: DigestEngine,
    signatures: Arc<SignatureSet>,
    excluded: Arc<HashSet<PathBuf>>,
    interrupt: ScanInterrupt,
}

fn walker_thread(
    work_rx: &channel::Receiver<WorkItem>,
    work_tx: &channel::Sender<WorkItem>,
    result_tx: &channel::Sender<Verdict>,
    in_flight: &AtomicUsize,
    ctx: &WorkerContext,
) {
    loop {
        match work_rx.recv_timeout(Duration::from_millis(50)) {
            Ok((dir_path, resolved)) => {
                process_directory(&dir_path, &resolved, work_tx, result_tx, in_flight, ctx);
                in_flight.fetch_sub(1, Ordering::AcqRel);
            }
            Err(channel::RecvTimeoutError::Timeout) => {
                if in_flight.load(Ordering::Acquire) == 0 {
                    return;
                }
            }
            Err(channel::RecvTimeoutError::Disconnected) => return,
        }
    }
}

/// List one directory: queue subdirectories, digest regular files.
///
/// Children are queued before this item's in-flight slot is released, so the
/// counter reaches zero only once the whole subtree has been processed.
fn process_directory(
    dir_path: &Path,
    resolved: &Path,
    work_tx: &channel::Sender<WorkItem>,
    result_tx: &channel::Sender<Verdict>,
    in_flight: &AtomicUsize,
    ctx: &WorkerContext,
) {
    if ctx.interrupt.is_triggered() {
        return;
    }

    let entries = match fs::read_dir(dir_path) {
        Ok(entries) => entries,
        Err(err) => {
            let err = HwdError::unreadable(dir_path, format!("cannot list directory: {err}"));
            let _ = result_tx.send(Verdict::Unreadable(UnreadableFile::from_error(dir_path, &err)));
            return;
        }
    };

    for entry_result in entries {
        let entry = match entry_result {
            Ok(entry) => entry,
            Err(err) => {
                let err = HwdError::unreadable(dir_path, format!("directory entry error: {err}"));
                let _ =
                    result_tx.send(Verdict::Unreadable(UnreadableFile::from_error(dir_path, &err)));
                continue;
            }
        };
        let child_path = entry.path();
        let child_resolved = resolved.join(entry.file_name());

        // file_type() comes from the directory entry and does not follow links.
        let ft = match entry.file_type() {
            Ok(ft) => ft,
            Err(err) => {
                let err = HwdError::unreadable(&child_path, err.to_string());
                let _ = result_tx.send(Verdict::Unreadable(UnreadableFile::from_error(
                    &child_path,
                    &err,
                )));
                continue;
            }
        };

        if ft.is_symlink() {
            let _ = result_tx.send(Verdict::SymlinkSkipped);
        } else if ft.is_dir() {
            if !is_excluded(&child_resolved, &ctx.excluded) {
                in_flight.fetch_add(1, Ordering::AcqRel);
                if work_tx.send((child_path, child_resolved)).is_err() {
                    in_flight.fetch_sub(1, Ordering::AcqRel);
                }
            }
        } else if ft.is_file() {
            if ctx.interrupt.is_triggered() {
                return;
            }
            let _ = result_tx.send(digest_verdict(&child_path, ctx));
        } else {
            let err = HwdError::unreadable(&child_path, "not a regular file");
            let _ = result_tx.send(Verdict::Unreadable(UnreadableFile::from_error(
                &child_path,
                &err,
            )));
        }
    }
}

fn digest_verdict(path: &Path, ctx: &WorkerContext) -> Verdict {
    match ctx.engine.digest_file(path) {
        Ok(digests) => match match_signature(&ctx.signatures, &digests) {
            Some((algorithm, digest)) => Verdict::Infected(Detection {
                path: path.to_path_buf(),
                digest,
                algorithm,
            }),
            None => Verdict::Clean,
        },
        Err(err) => Verdict::Unreadable(UnreadableFile::from_error(path, &err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn walker_for(signatures: SignatureSet, parallelism: usize) -> ScanWalker {
        ScanWalker::new(
            WalkerConfig {
                parallelism,
                excluded_paths: HashSet::new(),
            },
            DigestEngine::default(),
            Arc::new(signatures),
        )
    }

    fn signatures_of(contents: &[&[u8]], algorithm: HashAlgorithm) -> SignatureSet {
        let engine = DigestEngine::new(&[algorithm], 4096);
        SignatureSet::from_entries(contents.iter().map(|c| {
            engine
                .digest_bytes(c)
                .get(algorithm)
                .map(str::to_string)
                .unwrap()
        }))
    }

    #[test]
    fn detects_nested_infected_files() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("a/b")).unwrap();
        fs::write(tmp.path().join("a/b/bad.bin"), b"malicious").unwrap();
        fs::write(tmp.path().join("a/ok.txt"), b"fine").unwrap();
        fs::write(tmp.path().join("top.bad"), b"malicious").unwrap();

        let walker = walker_for(signatures_of(&[b"malicious"], HashAlgorithm::Sha256), 3);
        let report = walker.scan(tmp.path()).unwrap();

        let paths: Vec<_> = report.detections.iter().map(|d| d.path.clone()).collect();
        assert_eq!(
            paths,
            vec![tmp.path().join("a/b/bad.bin"), tmp.path().join("top.bad")]
        );
        assert_eq!(report.files_clean, 1);
        assert_eq!(report.files_scanned(), 3);
        assert!(!report.interrupted);
    }

    #[test]
    fn one_detection_per_file_even_when_every_algorithm_matches() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("x.bin"), b"payload").unwrap();

        let all = DigestEngine::default().digest_bytes(b"payload");
        let signatures = SignatureSet::from_entries(all.iter().map(|(_, hex)| hex.to_string()));
        let report = walker_for(signatures, 2).scan(tmp.path()).unwrap();

        assert_eq!(report.detections.len(), 1);
        assert_eq!(report.detections[0].algorithm, HashAlgorithm::Sha512);
    }

    #[test]
    fn weaker_algorithm_match_is_reported_when_only_it_matches() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("legacy.exe");
        fs::write(&file, b"old sample").unwrap();

        let report = walker_for(signatures_of(&[b"old sample"], HashAlgorithm::Md5), 1)
            .scan(&file)
            .unwrap();
        assert_eq!(report.detections.len(), 1);
        assert_eq!(report.detections[0].algorithm, HashAlgorithm::Md5);
        assert_eq!(report.detections[0].path, file);
    }

    #[test]
    fn clean_tree_reports_nothing() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.txt"), b"a").unwrap();
        fs::write(tmp.path().join("b.txt"), b"b").unwrap();

        let report = walker_for(signatures_of(&[b"zzz"], HashAlgorithm::Sha1), 2)
            .scan(tmp.path())
            .unwrap();
        assert!(report.detections.is_empty());
        assert_eq!(report.files_clean, 2);
        assert!(report.is_clean());
    }

    #[test]
    fn empty_signature_set_reports_zero_infections() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.txt"), b"anything").unwrap();
        let report = walker_for(SignatureSet::empty(), 2).scan(tmp.path()).unwrap();
        assert!(report.detections.is_empty());
        assert_eq!(report.signatures_loaded, 0);
        assert_eq!(report.files_clean, 1);
    }

    #[test]
    fn missing_target_is_target_not_found() {
        let err = walker_for(SignatureSet::empty(), 1)
            .scan(Path::new("/definitely/does/not/exist"))
            .unwrap_err();
        assert!(matches!(err, HwdError::TargetNotFound { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn never_follows_symlinks() {
        let tmp = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();
        fs::write(outside.path().join("bad.bin"), b"malicious").unwrap();
        std::os::unix::fs::symlink(outside.path(), tmp.path().join("dir_link")).unwrap();
        std::os::unix::fs::symlink(
            outside.path().join("bad.bin"),
            tmp.path().join("file_link"),
        )
        .unwrap();

        let report = walker_for(signatures_of(&[b"malicious"], HashAlgorithm::Sha256), 2)
            .scan(tmp.path())
            .unwrap();
        assert!(report.detections.is_empty());
        assert_eq!(report.symlinks_skipped, 2);
    }

    #[cfg(unix)]
    #[test]
    fn special_files_are_reported_unreadable() {
        let tmp = TempDir::new().unwrap();
        nix::unistd::mkfifo(&tmp.path().join("pipe"), nix::sys::stat::Mode::S_IRWXU).unwrap();
        fs::write(tmp.path().join("ok.txt"), b"ok").unwrap();

        let report = walker_for(SignatureSet::empty(), 1).scan(tmp.path()).unwrap();
        assert_eq!(report.unreadable.len(), 1);
        assert_eq!(report.unreadable[0].path, tmp.path().join("pipe"));
        assert_eq!(report.unreadable[0].error_code, "HWD-2002");
        // Unreadable files are in neither tally.
        assert_eq!(report.files_clean, 1);
        assert!(report.detections.is_empty());
    }

    #[test]
    fn excluded_subtree_is_not_entered() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("vault")).unwrap();
        fs::write(tmp.path().join("vault/bad.bin"), b"malicious").unwrap();
        fs::write(tmp.path().join("bad.bin"), b"malicious").unwrap();

        let mut excluded = HashSet::new();
        excluded.insert(tmp.path().join("vault"));
        let walker = ScanWalker::new(
            WalkerConfig {
                parallelism: 2,
                excluded_paths: excluded,
            },
            DigestEngine::default(),
            Arc::new(signatures_of(&[b"malicious"], HashAlgorithm::Sha256)),
        );
        let report = walker.scan(tmp.path()).unwrap();
        assert_eq!(report.detections.len(), 1);
        assert_eq!(report.detections[0].path, tmp.path().join("bad.bin"));
    }

    #[test]
    fn report_is_deterministic_across_parallelism() {
        let tmp = TempDir::new().unwrap();
        for i in 0..40 {
            let dir = tmp.path().join(format!("d{}", i % 7));
            fs::create_dir_all(&dir).unwrap();
            let body: &[u8] = if i % 3 == 0 { b"malicious" } else { b"benign" };
            fs::write(dir.join(format!("f{i}")), body).unwrap();
        }
        let sigs = signatures_of(&[b"malicious"], HashAlgorithm::Sha256);

        let serial = walker_for(sigs.clone(), 1).scan(tmp.path()).unwrap();
        let parallel = walker_for(sigs, 8).scan(tmp.path()).unwrap();
        assert_eq!(serial.detections, parallel.detections);
        assert_eq!(serial.files_clean, parallel.files_clean);
        assert_eq!(serial.detections.len(), 14);
    }

    #[test]
    fn pre_triggered_interrupt_stops_before_any_file() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("bad.bin"), b"malicious").unwrap();
        let interrupt = ScanInterrupt::new();
        interrupt.trigger();

        let report = walker_for(signatures_of(&[b"malicious"], HashAlgorithm::Sha256), 2)
            .with_interrupt(interrupt)
            .scan(tmp.path())
            .unwrap();
        assert!(report.interrupted);
        assert!(report.detections.is_empty());
        assert_eq!(report.files_scanned(), 0);
    }

    #[test]
    fn scanning_leaves_files_untouched() {
        let tmp = TempDir::new().unwrap();
        let bad = tmp.path().join("bad.bin");
        fs::write(&bad, b"malicious").unwrap();
        let before = fs::metadata(&bad).unwrap().modified().unwrap();

        let report = walker_for(signatures_of(&[b"malicious"], HashAlgorithm::Sha256), 2)
            .scan(tmp.path())
            .unwrap();
        assert_eq!(report.detections.len(), 1);
        assert_eq!(fs::read(&bad).unwrap(), b"malicious");
        assert_eq!(fs::metadata(&bad).unwrap().modified().unwrap(), before);
    }

    #[test]
    fn inspect_file_returns_all_digests() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("abc");
        fs::write(&file, b"abc").unwrap();
        let inspection = walker_for(SignatureSet::empty(), 1)
            .inspect_file(&file)
            .unwrap();
        assert_eq!(inspection.digests.len(), 4);
        assert!(inspection.detection.is_none());
    }
}
