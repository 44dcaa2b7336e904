//! HWD-prefixed error types with structured error codes.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Shared `Result` alias for the project.
pub type Result<T> = std::result::Result<T, HwdError>;

/// Top-level error type for hashward.
#[derive(Debug, Error)]
pub enum HwdError {
    #[error("[HWD-1001] invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("[HWD-1002] missing configuration file: {path}")]
    MissingConfig { path: PathBuf },

    #[error("[HWD-1003] configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    #[error("[HWD-2001] scan target not found: {path}")]
    TargetNotFound { path: PathBuf },

    #[error("[HWD-2002] unreadable file {path}: {details}")]
    Unreadable { path: PathBuf, details: String },

    #[error("[HWD-2003] signature source missing: {path}")]
    SignatureSourceMissing { path: PathBuf },

    #[error("[HWD-3001] quarantine move failed for {path}: {details}")]
    QuarantineMoveFailed { path: PathBuf, details: String },

    #[error("[HWD-3002] provenance record missing for {path}")]
    ProvenanceMissing { path: PathBuf },

    #[error("[HWD-3003] restore destination already occupied: {path}")]
    RestoreConflict { path: PathBuf },

    #[error("[HWD-3004] restore failed for {path}: {details}")]
    RestoreFailed { path: PathBuf, details: String },

    #[error("[HWD-3005] inconsistent quarantine entry {path}: {details}")]
    InconsistentQuarantineEntry { path: PathBuf, details: String },

    #[error("[HWD-3006] no quarantine entry named {name}")]
    EntryNotFound { name: String },

    #[error("[HWD-3007] failed to lock quarantine directory {path}: {details}")]
    LockFailed { path: PathBuf, details: String },

    #[error("[HWD-4001] overwrite failed for {path} at pass {pass}: {details}")]
    OverwriteFailed {
        path: PathBuf,
        pass: u32,
        details: String,
    },

    #[error("[HWD-4002] not a regular file: {path}")]
    NotARegularFile { path: PathBuf },

    #[error("[HWD-5001] serialization failure in {context}: {details}")]
    Serialization {
        context: &'static str,
        details: String,
    },

    #[error("[HWD-5002] IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[HWD-5900] runtime failure: {details}")]
    Runtime { details: String },
}

impl HwdError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "HWD-1001",
            Self::MissingConfig { .. } => "HWD-1002",
            Self::ConfigParse { .. } => "HWD-1003",
            Self::TargetNotFound { .. } => "HWD-2001",
            Self::Unreadable { .. } => "HWD-2002",
            Self::SignatureSourceMissing { .. } => "HWD-2003",
            Self::QuarantineMoveFailed { .. } => "HWD-3001",
            Self::ProvenanceMissing { .. } => "HWD-3002",
            Self::RestoreConflict { .. } => "HWD-3003",
            Self::RestoreFailed { .. } => "HWD-3004",
            Self::InconsistentQuarantineEntry { .. } => "HWD-3005",
            Self::EntryNotFound { .. } => "HWD-3006",
            Self::LockFailed { .. } => "HWD-3007",
            Self::OverwriteFailed { .. } => "HWD-4001",
            Self::NotARegularFile { .. } => "HWD-4002",
            Self::Serialization { .. } => "HWD-5001",
            Self::Io { .. } => "HWD-5002",
            Self::Runtime { .. } => "HWD-5900",
        }
    }

    /// Whether the failure should stop the surrounding session rather than
    /// being recorded against a single file or entry and skipped.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::InvalidConfig { .. }
                | Self::MissingConfig { .. }
                | Self::ConfigParse { .. }
                | Self::TargetNotFound { .. }
                | Self::LockFailed { .. }
                | Self::Runtime { .. }
        )
    }

    /// Convenience constructor for IO errors with a known path.
    #[must_use]
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Convenience constructor for per-file digest failures.
    #[must_use]
    pub fn unreadable(path: impl AsRef<Path>, details: impl Into<String>) -> Self {
        Self::Unreadable {
            path: path.as_ref().to_path_buf(),
            details: details.into(),
        }
    }
}

impl From<serde_json::Error> for HwdError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization {
            context: "serde_json",
            details: value.to_string(),
        }
    }
}

impl From<toml::de::Error> for HwdError {
    fn from(value: toml::de::Error) -> Self {
        Self::ConfigParse {
            context: "toml",
            details: value.to_string(),
        }
    }
}
