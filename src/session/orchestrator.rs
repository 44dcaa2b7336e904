//! Session orchestrator: composes walker, quarantine store, and shredder per
//! user action, and records every outcome in the session and activity logs.
//!
//! Ordering rule: nothing is destroyed from its original location. Files reach
//! the shredder only as quarantine entries, so every destructive action is
//! preceded by a reviewable quarantine step.

#![allow(missing_docs)]

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;

use crate::core::config::Config;
use crate::core::errors::{HwdError, Result};
use crate::core::interrupt::ScanInterrupt;
use crate::logger::activity::{ActivityEvent, ActivityLoggerHandle};
use crate::logger::session_log::{LineTag, SessionBlock, SessionLog};
use crate::quarantine::store::{QuarantineEntry, QuarantineListing, QuarantineStore};
use crate::scanner::digest::{DigestEngine, HashAlgorithm};
use crate::scanner::signatures::SignatureSet;
use crate::scanner::walker::{FileInspection, ScanReport, ScanWalker, WalkerConfig};
use crate::shredder::{DestructionReceipt, Shredder};

// ──────────────────── outcomes ────────────────────

/// One entry that a batch or scan-and-quarantine could not process.
#[derive(Debug, Clone, Serialize)]
pub struct EntryFailure {
    pub name: String,
    pub error_code: String,
    pub message: String,
}

impl EntryFailure {
    fn new(name: impl Into<String>, err: &HwdError) -> Self {
        Self {
            name: name.into(),
            error_code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

/// Per-entry results of a batch restore or destroy, with a final tally.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport<T> {
    pub succeeded: Vec<(String, T)>,
    pub failed: Vec<EntryFailure>,
    /// Entries not attempted because the session was interrupted.
    pub skipped: Vec<String>,
}

impl<T> Default for BatchReport<T> {
    fn default() -> Self {
        Self {
            succeeded: Vec::new(),
            failed: Vec::new(),
            skipped: Vec::new(),
        }
    }
}

impl<T> BatchReport<T> {
    #[must_use]
    pub fn succeeded_count(&self) -> usize {
        self.succeeded.len()
    }

    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.failed.len()
    }

    /// Every requested entry succeeded.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty() && self.skipped.is_empty()
    }
}

/// Scan followed by quarantine of every detection.
#[derive(Debug, Clone, Serialize)]
pub struct ScanOutcome {
    pub report: ScanReport,
    pub quarantined: Vec<QuarantineEntry>,
    pub failures: Vec<EntryFailure>,
}

// ──────────────────── session ────────────────────

/// Everything one invocation needs, built from a [`Config`] at construction.
pub struct Session {
    config: Config,
    config_hash: Option<String>,
    signatures: Arc<SignatureSet>,
    engine: DigestEngine,
    store: QuarantineStore,
    shredder: Shredder,
    session_log: Option<SessionLog>,
    activity: ActivityLoggerHandle,
    interrupt: ScanInterrupt,
}

impl Session {
    /// Load signatures from `config.paths.signature_file` and open the store.
    pub fn open(config: Config, activity: ActivityLoggerHandle) -> Result<Self> {
        let signatures = SignatureSet::load(&config.paths.signature_file)?;
        Self::with_signatures(config, signatures, activity)
    }

    /// Build a session around an already-loaded signature set.
    pub fn with_signatures(
        config: Config,
        signatures: SignatureSet,
        activity: ActivityLoggerHandle,
    ) -> Result<Self> {
        config.validate()?;
        let store = QuarantineStore::open(&config.paths.quarantine_dir)?;
        let engine = DigestEngine::new(&config.scanner.algorithms, config.scanner.chunk_size_bytes);
        let shredder = Shredder::new(&config.shredder);
        let config_hash = config.stable_hash().ok();

        activity.send(ActivityEvent::SessionStarted {
            version: env!("CARGO_PKG_VERSION").to_string(),
            config_hash: config_hash.clone().unwrap_or_default(),
            signatures: signatures.len(),
        });

        Ok(Self {
            session_log: Some(SessionLog::new(&config.paths.session_log)),
            config,
            config_hash,
            signatures: Arc::new(signatures),
            engine,
            store,
            shredder,
            activity,
            interrupt: ScanInterrupt::new(),
        })
    }

    /// Share an externally-owned interrupt flag (e.g. one wired to signals).
    #[must_use]
    pub fn with_interrupt(mut self, interrupt: ScanInterrupt) -> Self {
        self.interrupt = interrupt;
        self
    }

    /// Skip the human session log.
    #[must_use]
    pub fn without_session_log(mut self) -> Self {
        self.session_log = None;
        self
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub fn signatures(&self) -> &SignatureSet {
        &self.signatures
    }

    #[must_use]
    pub fn store(&self) -> &QuarantineStore {
        &self.store
    }

    #[must_use]
    pub fn interrupt(&self) -> &ScanInterrupt {
        &self.interrupt
    }

    fn walker(&self) -> ScanWalker {
        let walker_config = WalkerConfig {
            parallelism: self.config.scanner.parallelism,
            excluded_paths: self.config.effective_exclusions().into_iter().collect(),
        };
        ScanWalker::new(walker_config, self.engine.clone(), Arc::clone(&self.signatures))
            .with_interrupt(self.interrupt.clone())
    }

    fn block(&self) -> SessionBlock {
        let mut block = SessionBlock::new(self.config_hash.as_deref());
        if let Some(warning) = self.signatures.source_warning() {
            block.push(LineTag::Warning, warning.to_string());
        }
        block
    }

    fn commit(&self, block: &SessionBlock) {
        if let Some(log) = &self.session_log
            && let Err(err) = log.append(block)
        {
            eprintln!("[HWD-SESSION] WARNING: could not write session log: {err}");
        }
    }

    // ──────────────────── scanning ────────────────────

    /// Scan without touching any file.
    pub fn scan(&self, target: &Path) -> Result<ScanReport> {
        let mut block = self.block();
        let report = match self.walker().scan(target) {
            Ok(report) => report,
            Err(err) => {
                block.error(&err);
                self.commit(&block);
                self.activity
                    .send(ActivityEvent::failed(Some(target.to_path_buf()), &err));
                return Err(err);
            }
        };
        block.scan_report(&report);
        self.commit(&block);
        self.log_scan(&report);
        Ok(report)
    }

    /// Scan, then quarantine every detection. An interrupted scan quarantines nothing.
    pub fn scan_and_quarantine(&self, target: &Path) -> Result<ScanOutcome> {
        let mut block = self.block();
        let report = match self.walker().scan(target) {
            Ok(report) => report,
            Err(err) => {
                block.error(&err);
                self.commit(&block);
                self.activity
                    .send(ActivityEvent::failed(Some(target.to_path_buf()), &err));
                return Err(err);
            }
        };
        block.scan_report(&report);
        self.log_scan(&report);

        let mut outcome = ScanOutcome {
            report,
            quarantined: Vec::new(),
            failures: Vec::new(),
        };
        if outcome.report.interrupted {
            self.commit(&block);
            return Ok(outcome);
        }

        let mut fatal: Option<HwdError> = None;
        for detection in &outcome.report.detections {
            if let Some(err) = &fatal {
                outcome
                    .failures
                    .push(EntryFailure::new(detection.path.to_string_lossy(), err));
                continue;
            }
            match self.store.quarantine_detection(detection) {
                Ok(entry) => {
                    block.quarantined(&detection.path, &entry.quarantined_path);
                    self.activity.send(ActivityEvent::Quarantined {
                        path: detection.path.clone(),
                        occupant: entry.quarantined_path.clone(),
                        size_bytes: entry.size_bytes,
                    });
                    outcome.quarantined.push(entry);
                }
                Err(err) => {
                    block.error(&err);
                    self.activity
                        .send(ActivityEvent::failed(Some(detection.path.clone()), &err));
                    outcome
                        .failures
                        .push(EntryFailure::new(detection.path.to_string_lossy(), &err));
                    if err.is_fatal() {
                        fatal = Some(err);
                    }
                }
            }
        }
        self.commit(&block);
        Ok(outcome)
    }

    /// Every supported digest of a file, read once, with the verdict under
    /// the configured algorithms.
    pub fn hash(&self, path: &Path) -> Result<FileInspection> {
        let digests =
            DigestEngine::new(&HashAlgorithm::PRIORITY, self.config.scanner.chunk_size_bytes)
                .digest_file(path)?;
        let inspection = self.walker().inspect_digests(path, digests);
        if let Some(detection) = &inspection.detection {
            self.activity.send(ActivityEvent::FileInfected {
                path: detection.path.clone(),
                algorithm: detection.algorithm,
                digest: detection.digest.clone(),
            });
        }
        Ok(inspection)
    }

    fn log_scan(&self, report: &ScanReport) {
        for detection in &report.detections {
            self.activity.send(ActivityEvent::FileInfected {
                path: detection.path.clone(),
                algorithm: detection.algorithm,
                digest: detection.digest.clone(),
            });
        }
        for unreadable in &report.unreadable {
            self.activity.send(ActivityEvent::FileUnreadable {
                path: unreadable.path.clone(),
                error_code: unreadable.error_code.clone(),
                details: unreadable.details.clone(),
            });
        }
        #[allow(clippy::cast_possible_truncation)]
        self.activity.send(ActivityEvent::ScanCompleted {
            target: report.target.clone(),
            files_scanned: report.files_scanned(),
            infected: report.detections.len(),
            unreadable: report.unreadable.len(),
            symlinks_skipped: report.symlinks_skipped,
            interrupted: report.interrupted,
            duration_ms: report.duration.as_millis() as u64,
        });
    }

    // ──────────────────── single-entry operations ────────────────────

    /// Quarantine a file directly, without a scan.
    pub fn quarantine(&self, path: &Path) -> Result<QuarantineEntry> {
        let mut block = self.block();
        let result = self.store.quarantine(path);
        match &result {
            Ok(entry) => {
                block.quarantined(path, &entry.quarantined_path);
                self.activity.send(ActivityEvent::Quarantined {
                    path: entry
                        .original_path()
                        .map_or_else(|| path.to_path_buf(), Path::to_path_buf),
                    occupant: entry.quarantined_path.clone(),
                    size_bytes: entry.size_bytes,
                });
            }
            Err(err) => {
                block.error(err);
                self.activity
                    .send(ActivityEvent::failed(Some(path.to_path_buf()), err));
            }
        }
        self.commit(&block);
        result
    }

    /// Current occupants plus any inconsistencies, which are also logged.
    pub fn list(&self) -> Result<QuarantineListing> {
        let listing = self.store.list_entries()?;
        if listing.inconsistencies.is_empty() {
            return Ok(listing);
        }
        let mut block = self.block();
        for problem in &listing.inconsistencies {
            block.inconsistency(problem);
            self.activity.send(ActivityEvent::Inconsistency {
                path: problem.path.clone(),
                details: problem.details.clone(),
            });
        }
        self.commit(&block);
        Ok(listing)
    }

    pub fn find(&self, name: &str) -> Result<QuarantineEntry> {
        self.store.find(name)
    }

    pub fn restore(&self, entry: &QuarantineEntry) -> Result<PathBuf> {
        let mut block = self.block();
        let result = self.restore_logged(entry, &mut block);
        self.commit(&block);
        result
    }

    pub fn destroy(&self, entry: &QuarantineEntry) -> Result<DestructionReceipt> {
        let mut block = self.block();
        let result = self.destroy_logged(entry, &mut block);
        self.commit(&block);
        result
    }

    fn restore_logged(&self, entry: &QuarantineEntry, block: &mut SessionBlock) -> Result<PathBuf> {
        match self.store.restore(entry) {
            Ok(destination) => {
                block.restored(&entry.quarantined_path, &destination);
                self.activity.send(ActivityEvent::Restored {
                    occupant: entry.quarantined_path.clone(),
                    destination: destination.clone(),
                });
                Ok(destination)
            }
            Err(err) => {
                block.error(&err);
                self.activity
                    .send(ActivityEvent::failed(Some(entry.quarantined_path.clone()), &err));
                Err(err)
            }
        }
    }

    fn destroy_logged(
        &self,
        entry: &QuarantineEntry,
        block: &mut SessionBlock,
    ) -> Result<DestructionReceipt> {
        match self.store.destroy(entry, &self.shredder) {
            Ok(receipt) => {
                block.deleted(&entry.quarantined_path, receipt.passes);
                #[allow(clippy::cast_possible_truncation)]
                self.activity.send(ActivityEvent::Shredded {
                    path: entry.quarantined_path.clone(),
                    passes: receipt.passes,
                    size_bytes: receipt.size_bytes,
                    duration_ms: receipt.duration.as_millis() as u64,
                });
                Ok(receipt)
            }
            Err(err) => {
                block.error(&err);
                self.activity
                    .send(ActivityEvent::failed(Some(entry.quarantined_path.clone()), &err));
                Err(err)
            }
        }
    }

    // ──────────────────── batch operations ────────────────────

    /// Restore every listed entry; failures do not stop the batch.
    pub fn restore_all(&self) -> Result<BatchReport<PathBuf>> {
        let entries = self.list()?.entries;
        Ok(self.run_batch(entries.into_iter().map(Ok).collect(), Self::restore_logged))
    }

    /// Restore the named entries (occupant or original file names).
    pub fn restore_selected(&self, names: &[String]) -> BatchReport<PathBuf> {
        self.run_batch(self.resolve_names(names), Self::restore_logged)
    }

    /// Shred every listed entry; failures do not stop the batch.
    pub fn destroy_all(&self) -> Result<BatchReport<DestructionReceipt>> {
        let entries = self.list()?.entries;
        Ok(self.run_batch(entries.into_iter().map(Ok).collect(), Self::destroy_logged))
    }

    /// Shred the named entries (occupant or original file names).
    pub fn destroy_selected(&self, names: &[String]) -> BatchReport<DestructionReceipt> {
        self.run_batch(self.resolve_names(names), Self::destroy_logged)
    }

    /// Look names up in order, dropping repeats. Unknown names become failures.
    fn resolve_names(&self, names: &[String]) -> Vec<std::result::Result<QuarantineEntry, EntryFailure>> {
        let mut seen = HashSet::new();
        names
            .iter()
            .filter_map(|name| {
                let resolved = self
                    .store
                    .find(name)
                    .map_err(|err| EntryFailure::new(name.clone(), &err));
                let key = match &resolved {
                    Ok(entry) => entry.name.clone(),
                    Err(failure) => failure.name.clone(),
                };
                seen.insert(key).then_some(resolved)
            })
            .collect()
    }

    fn run_batch<T, F>(
        &self,
        items: Vec<std::result::Result<QuarantineEntry, EntryFailure>>,
        mut op: F,
    ) -> BatchReport<T>
    where
        F: FnMut(&Self, &QuarantineEntry, &mut SessionBlock) -> Result<T>,
    {
        let mut block = self.block();
        let mut batch = BatchReport::default();
        let mut aborted = false;

        for item in items {
            let entry = match item {
                Ok(entry) => entry,
                Err(failure) => {
                    block.push(
                        LineTag::Error,
                        format!("{}: {}", failure.name, failure.message),
                    );
                    batch.failed.push(failure);
                    continue;
                }
            };
            if aborted || self.interrupt.is_triggered() {
                batch.skipped.push(entry.name);
                continue;
            }
            match op(self, &entry, &mut block) {
                Ok(value) => batch.succeeded.push((entry.name, value)),
                Err(err) => {
                    aborted = err.is_fatal();
                    batch.failed.push(EntryFailure::new(entry.name, &err));
                }
            }
        }

        if !batch.skipped.is_empty() {
            let reason = if aborted { "stopped" } else { "interrupted" };
            block.push(
                LineTag::Warning,
                format!("{reason}; {} entries not processed", batch.skipped.len()),
            );
        }
        block.note(format!(
            "Batch finished: {} succeeded, {} failed.",
            batch.succeeded_count(),
            batch.failed_count()
        ));
        self.commit(&block);
        batch
    }
}
