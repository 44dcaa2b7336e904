//! Convenience re-exports for library consumers.
//!
//! ```rust,no_run
//! use hashward::prelude::*;
//! ```

// Core
pub use crate::core::config::Config;
pub use crate::core::errors::{HwdError, Result};
pub use crate::core::interrupt::ScanInterrupt;

// Scanner
pub use crate::scanner::digest::{DigestEngine, DigestSet, HashAlgorithm};
pub use crate::scanner::signatures::SignatureSet;
pub use crate::scanner::walker::{Detection, ScanReport, ScanWalker, WalkerConfig};

// Quarantine
pub use crate::quarantine::provenance::ProvenanceRecord;
pub use crate::quarantine::store::{QuarantineEntry, QuarantineListing, QuarantineStore};

// Shredder
pub use crate::shredder::{DestructionReceipt, Shredder};

// Logging
pub use crate::logger::activity::{ActivityEvent, ActivityLoggerHandle, spawn_logger};

// Session
pub use crate::session::orchestrator::{BatchReport, ScanOutcome, Session};
