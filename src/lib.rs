#![forbid(unsafe_code)]

//! hashward: local malware-signature scanner with a quarantine, restore, and
//! shred lifecycle.
//!
//! 1. **Scanner**: streams files under a target through MD5/SHA-1/SHA-256/SHA-512
//!    and matches the digests against a signature set, strongest algorithm first
//! 2. **Quarantine**: moves matches into a flat holding directory with a
//!    provenance record per occupant, so every entry can be restored
//! 3. **Shredder**: overwrites a quarantined file with random passes before unlinking
//!
//! Nothing is destroyed from its original location: files reach the shredder
//! only through the quarantine.
//!
//! # Library usage
//!
//! ```rust,no_run
//! use hashward::prelude::*;
//!
//! # fn main() -> hashward::core::errors::Result<()> {
//! let config = Config::load(None)?;
//! let session = Session::open(config, ActivityLoggerHandle::disabled())?;
//! let outcome = session.scan_and_quarantine(std::path::Path::new("/home/me/Downloads"))?;
//! println!("{} quarantined", outcome.quarantined.len());
//! # Ok(())
//! # }
//! ```

pub mod prelude;

pub mod core;
pub mod logger;
pub mod quarantine;
pub mod scanner;
pub mod session;
pub mod shredder;
