//! Background activity logger: one thread owns the `JsonlWriter`, everyone
//! else sends `ActivityEvent`s over a bounded crossbeam channel.
//!
//! `send()` uses `try_send()`, so a slow disk never stalls a scan worker or a
//! quarantine transaction. Events dropped under back-pressure are counted and
//! reported in the log once the queue drains.

#![allow(missing_docs)]

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};

use crate::core::errors::{HwdError, Result};
use crate::logger::jsonl::{EventType, JsonlConfig, JsonlWriter, LogEntry, Severity};
use crate::scanner::digest::HashAlgorithm;

const CHANNEL_CAPACITY: usize = 1024;

// ──────────────────── public event type ────────────────────

/// Events recorded in the activity log.
#[derive(Debug, Clone)]
pub enum ActivityEvent {
    SessionStarted {
        version: String,
        config_hash: String,
        signatures: usize,
    },
    ScanCompleted {
        target: PathBuf,
        files_scanned: usize,
        infected: usize,
        unreadable: usize,
        symlinks_skipped: usize,
        interrupted: bool,
        duration_ms: u64,
    },
    FileInfected {
        path: PathBuf,
        algorithm: HashAlgorithm,
        digest: String,
    },
    FileUnreadable {
        path: PathBuf,
        error_code: String,
        details: String,
    },
    Quarantined {
        path: PathBuf,
        occupant: PathBuf,
        size_bytes: u64,
    },
    Restored {
        occupant: PathBuf,
        destination: PathBuf,
    },
    Shredded {
        path: PathBuf,
        passes: u32,
        size_bytes: u64,
        duration_ms: u64,
    },
    Inconsistency {
        path: PathBuf,
        details: String,
    },
    Failed {
        path: Option<PathBuf>,
        code: String,
        message: String,
    },
    /// Sentinel asking the logger thread to flush and exit.
    Shutdown,
}

impl ActivityEvent {
    /// A failure event built from an error.
    #[must_use]
    pub fn failed(path: Option<PathBuf>, err: &HwdError) -> Self {
        Self::Failed {
            path,
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

// ──────────────────── public handle ────────────────────

/// Thread-safe, cheaply-cloneable handle for sending log events.
#[derive(Clone)]
pub struct ActivityLoggerHandle {
    tx: Sender<ActivityEvent>,
    dropped_events: Arc<AtomicU64>,
}

impl ActivityLoggerHandle {
    /// A handle whose events go nowhere. For library callers without a log.
    #[must_use]
    pub fn disabled() -> Self {
        let (tx, _rx) = bounded(1);
        Self {
            tx,
            dropped_events: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Send an event to the logger thread. Never blocks.
    pub fn send(&self, event: ActivityEvent) {
        if let Err(TrySendError::Full(_)) = self.tx.try_send(event) {
            self.dropped_events.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Events dropped because the channel was full.
    pub fn dropped_events(&self) -> u64 {
        self.dropped_events.load(Ordering::Relaxed)
    }

    /// Ask the logger thread to flush and exit. Join its handle to wait.
    pub fn shutdown(&self) {
        let _ = self.tx.send(ActivityEvent::Shutdown);
    }
}

/// Options for the activity logger.
pub struct ActivityLoggerConfig {
    pub jsonl_config: JsonlConfig,
    pub channel_capacity: usize,
}

impl ActivityLoggerConfig {
    #[must_use]
    pub fn for_path(path: &std::path::Path) -> Self {
        Self {
            jsonl_config: JsonlConfig::for_path(path),
            channel_capacity: CHANNEL_CAPACITY,
        }
    }
}

// ──────────────────── spawn ────────────────────

/// Spawn the logger thread and return a handle plus its join handle.
pub fn spawn_logger(
    config: ActivityLoggerConfig,
) -> Result<(ActivityLoggerHandle, thread::JoinHandle<()>)> {
    let (tx, rx) = bounded::<ActivityEvent>(config.channel_capacity.max(1));
    let dropped = Arc::new(AtomicU64::new(0));
    let dropped_clone = Arc::clone(&dropped);

    let handle = ActivityLoggerHandle {
        tx,
        dropped_events: dropped,
    };

    let join = thread::Builder::new()
        .name("hwd-logger".to_string())
        .spawn(move || {
            logger_thread_main(&rx, config.jsonl_config, &dropped_clone);
        })
        .map_err(|e| HwdError::Runtime {
            details: format!("failed to spawn logger thread: {e}"),
        })?;

    Ok((handle, join))
}

fn logger_thread_main(rx: &Receiver<ActivityEvent>, jsonl_config: JsonlConfig, dropped: &AtomicU64) {
    let mut jsonl = JsonlWriter::open(jsonl_config);

    while let Ok(event) = rx.recv() {
        let d = dropped.swap(0, Ordering::Relaxed);
        if d > 0 {
            let mut warn = LogEntry::new(EventType::Error, Severity::Warning);
            warn.details = Some(format!("{d} log events dropped due to back-pressure"));
            jsonl.write_entry(&warn);
        }

        if matches!(event, ActivityEvent::Shutdown) {
            break;
        }
        jsonl.write_entry(&event_to_log_entry(&event));
    }

    jsonl.sync();
}

// ──────────────────── event conversion ────────────────────

fn event_to_log_entry(event: &ActivityEvent) -> LogEntry {
    match event {
        ActivityEvent::SessionStarted {
            version,
            config_hash,
            signatures,
        } => {
            let mut e = LogEntry::new(EventType::SessionStart, Severity::Info);
            e.count = Some(*signatures as u64);
            e.details = Some(format!("version={version} config_hash={config_hash}"));
            e
        }
        ActivityEvent::ScanCompleted {
            target,
            files_scanned,
            infected,
            unreadable,
            symlinks_skipped,
            interrupted,
            duration_ms,
        } => {
            let severity = if *infected > 0 {
                Severity::Critical
            } else if *unreadable > 0 || *interrupted {
                Severity::Warning
            } else {
                Severity::Info
            };
            let mut e = LogEntry::new(EventType::ScanComplete, severity).with_path(target);
            e.count = Some(*files_scanned as u64);
            e.duration_ms = Some(*duration_ms);
            e.ok = Some(!*interrupted);
            e.details = Some(format!(
                "infected={infected} unreadable={unreadable} symlinks_skipped={symlinks_skipped} interrupted={interrupted}"
            ));
            e
        }
        ActivityEvent::FileInfected {
            path,
            algorithm,
            digest,
        } => {
            let mut e = LogEntry::new(EventType::FileInfected, Severity::Critical).with_path(path);
            e.algorithm = Some(*algorithm);
            e.digest = Some(digest.clone());
            e
        }
        ActivityEvent::FileUnreadable {
            path,
            error_code,
            details,
        } => {
            let mut e = LogEntry::new(EventType::FileUnreadable, Severity::Warning).with_path(path);
            e.error_code = Some(error_code.clone());
            e.details = Some(details.clone());
            e
        }
        ActivityEvent::Quarantined {
            path,
            occupant,
            size_bytes,
        } => {
            let mut e = LogEntry::new(EventType::Quarantined, Severity::Info)
                .with_path(path)
                .with_target(occupant);
            e.size = Some(*size_bytes);
            e.ok = Some(true);
            e
        }
        ActivityEvent::Restored {
            occupant,
            destination,
        } => {
            let mut e = LogEntry::new(EventType::Restored, Severity::Info)
                .with_path(occupant)
                .with_target(destination);
            e.ok = Some(true);
            e
        }
        ActivityEvent::Shredded {
            path,
            passes,
            size_bytes,
            duration_ms,
        } => {
            let mut e = LogEntry::new(EventType::Shredded, Severity::Info).with_path(path);
            e.passes = Some(*passes);
            e.size = Some(*size_bytes);
            e.duration_ms = Some(*duration_ms);
            e.ok = Some(true);
            e
        }
        ActivityEvent::Inconsistency { path, details } => {
            let mut e = LogEntry::new(EventType::Inconsistency, Severity::Warning).with_path(path);
            e.details = Some(details.clone());
            e
        }
        ActivityEvent::Failed {
            path,
            code,
            message,
        } => {
            let mut e = LogEntry::new(EventType::Error, Severity::Warning);
            if let Some(path) = path {
                e = e.with_path(path);
            }
            e.ok = Some(false);
            e.error_code = Some(code.clone());
            e.error_message = Some(message.clone());
            e
        }
        // Filtered out by the logger loop before conversion.
        ActivityEvent::Shutdown => LogEntry::new(EventType::SessionStart, Severity::Info),
    }
}
