//! Signature set: immutable known-bad digest strings with O(1) membership.

#![allow(missing_docs)]

use std::collections::HashSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::core::errors::{HwdError, Result};

/// Where a signature set came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureOrigin {
    /// Loaded from a file that existed.
    File(PathBuf),
    /// The source file did not exist; the set is empty by construction.
    Missing(PathBuf),
    /// Built in memory by the caller.
    Inline,
}

/// Immutable set of lowercase hex digests.
///
/// Shared read-only between scan workers after load.
#[derive(Debug, Clone)]
pub struct SignatureSet {
    digests: HashSet<String>,
    origin: SignatureOrigin,
    rejected_lines: usize,
}

impl SignatureSet {
    /// An empty set.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            digests: HashSet::new(),
            origin: SignatureOrigin::Inline,
            rejected_lines: 0,
        }
    }

    /// Build a set from digest strings.
    ///
    /// Each entry is trimmed and case-folded. Blank entries and `#` comments
    /// are skipped; entries that are not hex are counted in
    /// [`rejected_lines`](Self::rejected_lines) because they can never match
    /// a computed digest.
    pub fn from_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut digests = HashSet::new();
        let mut rejected_lines = 0;
        for entry in entries {
            let trimmed = entry.as_ref().trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            if !trimmed.bytes().all(|b| b.is_ascii_hexdigit()) {
                rejected_lines += 1;
                continue;
            }
            digests.insert(trimmed.to_ascii_lowercase());
        }
        Self {
            digests,
            origin: SignatureOrigin::Inline,
            rejected_lines,
        }
    }

    /// Load a plain-text signature list, one digest per line.
    ///
    /// A missing file yields an empty set (origin [`SignatureOrigin::Missing`])
    /// and a warning on stderr; it is not an error. A file that exists but
    /// cannot be read is. Lines are decoded one at a time, so a line with
    /// invalid UTF-8 is rejected on its own without failing the load.
    pub fn load(path: &Path) -> Result<Self> {
        match fs::read(path) {
            Ok(raw) => {
                let mut set =
                    Self::from_entries(raw.split(|&b| b == b'\n').map(String::from_utf8_lossy));
                set.origin = SignatureOrigin::File(path.to_path_buf());
                if set.rejected_lines > 0 {
                    eprintln!(
                        "[HWD-SIGNATURES] WARNING: ignored {} non-hex line(s) in {}",
                        set.rejected_lines,
                        path.display()
                    );
                }
                Ok(set)
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {
                eprintln!(
                    "[HWD-SIGNATURES] WARNING: {}",
                    HwdError::SignatureSourceMissing {
                        path: path.to_path_buf()
                    }
                );
                Ok(Self {
                    digests: HashSet::new(),
                    origin: SignatureOrigin::Missing(path.to_path_buf()),
                    rejected_lines: 0,
                })
            }
            Err(err) => Err(HwdError::io(path, err)),
        }
    }

    /// Exact membership test against a computed (lowercase) digest.
    #[must_use]
    pub fn contains(&self, digest: &str) -> bool {
        self.digests.contains(digest)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.digests.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.digests.is_empty()
    }

    #[must_use]
    pub fn origin(&self) -> &SignatureOrigin {
        &self.origin
    }

    /// Non-hex lines skipped while building the set.
    #[must_use]
    pub fn rejected_lines(&self) -> usize {
        self.rejected_lines
    }

    /// The load-time warning for a missing source, if any.
    #[must_use]
    pub fn source_warning(&self) -> Option<HwdError> {
        match &self.origin {
            SignatureOrigin::Missing(path) => {
                Some(HwdError::SignatureSourceMissing { path: path.clone() })
            }
            _ => None,
        }
    }
}
