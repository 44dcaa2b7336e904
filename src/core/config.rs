//! Configuration system: TOML file + env var overrides + smart defaults.

#![allow(missing_docs)]

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::errors::{HwdError, Result};
use crate::scanner::digest::{DEFAULT_CHUNK_SIZE, HashAlgorithm};

const MIN_CHUNK_SIZE: usize = 4 * 1024;
const MAX_CHUNK_SIZE: usize = 64 * 1024 * 1024;

/// Full hashward configuration model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct Config {
    pub scanner: ScannerConfig,
    pub shredder: ShredderConfig,
    pub paths: PathsConfig,
}

/// Digesting and traversal knobs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ScannerConfig {
    /// Algorithms computed per file. Matching always walks them strongest first,
    /// whatever order they are listed in.
    pub algorithms: Vec<HashAlgorithm>,
    pub parallelism: usize,
    pub chunk_size_bytes: usize,
    /// Subtrees never entered. The quarantine directory is always added.
    pub excluded_paths: Vec<PathBuf>,
}

/// Overwrite-then-delete settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ShredderConfig {
    pub passes: u32,
    /// Rename to a random name before unlinking so the directory entry
    /// no longer carries the original file name.
    pub rename_before_unlink: bool,
}

/// Filesystem paths used by hashward.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PathsConfig {
    pub config_file: PathBuf,
    pub signature_file: PathBuf,
    pub quarantine_dir: PathBuf,
    pub session_log: PathBuf,
    pub activity_log: PathBuf,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            algorithms: HashAlgorithm::PRIORITY.to_vec(),
            parallelism: std::thread::available_parallelism()
                .map_or(2, |n| n.get().saturating_div(2).max(1)),
            chunk_size_bytes: DEFAULT_CHUNK_SIZE,
            excluded_paths: Vec::new(),
        }
    }
}

impl Default for ShredderConfig {
    fn default() -> Self {
        Self {
            passes: 3,
            rename_before_unlink: true,
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        let home_dir = env::var_os("HOME").map_or_else(
            || {
                eprintln!(
                    "[HWD-CONFIG] WARNING: HOME not set, falling back to /tmp for data paths"
                );
                PathBuf::from("/tmp")
            },
            PathBuf::from,
        );
        let cfg = home_dir.join(".config").join("hashward");
        let data = home_dir.join(".local").join("share").join("hashward");
        Self {
            config_file: cfg.join("config.toml"),
            signature_file: cfg.join("signatures.txt"),
            quarantine_dir: data.join("quarantine"),
            session_log: data.join("scan.log"),
            activity_log: data.join("activity.jsonl"),
        }
    }
}

impl ScannerConfig {
    /// Configured algorithms in match-priority order, deduplicated.
    #[must_use]
    pub fn algorithms_in_priority_order(&self) -> Vec<HashAlgorithm> {
        HashAlgorithm::in_priority_order(&self.algorithms)
    }
}

impl Config {
    /// Default configuration path.
    #[must_use]
    pub fn default_path() -> PathBuf {
        PathsConfig::default().config_file
    }

    /// Load config from default or explicit path, then apply env overrides.
    ///
    /// Missing config file is not an error when loading from default path; defaults are used.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path_buf = path.map_or_else(Self::default_path, Path::to_path_buf);
        let is_explicit_path = path.is_some();

        let mut cfg = if path_buf.exists() {
            let raw = fs::read_to_string(&path_buf).map_err(|source| HwdError::Io {
                path: path_buf.clone(),
                source,
            })?;
            let parsed: Self = toml::from_str(&raw)?;
            parsed
        } else if is_explicit_path {
            return Err(HwdError::MissingConfig { path: path_buf });
        } else {
            Self::default()
        };

        cfg.paths.config_file = path_buf;
        cfg.apply_env_overrides_from(env_var)?;
        cfg.normalize_paths();
        cfg.validate()?;
        Ok(cfg)
    }

    /// Deterministic hash of the effective config for the session log header.
    ///
    /// FNV-1a over canonical JSON, stable across processes and toolchains.
    pub fn stable_hash(&self) -> Result<String> {
        let canonical = serde_json::to_string(self)?;
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in canonical.as_bytes() {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
        Ok(format!("{hash:016x}"))
    }

    /// Scan exclusions with the quarantine directory always included.
    #[must_use]
    pub fn effective_exclusions(&self) -> Vec<PathBuf> {
        let mut excluded = self.scanner.excluded_paths.clone();
        if !excluded.contains(&self.paths.quarantine_dir) {
            excluded.push(self.paths.quarantine_dir.clone());
        }
        excluded
    }

    fn apply_env_overrides_from<F>(&mut self, mut lookup: F) -> Result<()>
    where
        F: FnMut(&str) -> Option<String>,
    {
        // scanner
        if let Some(raw) = lookup("HWD_SCANNER_ALGORITHMS") {
            self.scanner.algorithms = parse_env_algorithms("HWD_SCANNER_ALGORITHMS", &raw)?;
        }
        if let Some(raw) = lookup("HWD_SCANNER_PARALLELISM") {
            self.scanner.parallelism = parse_env_usize("HWD_SCANNER_PARALLELISM", &raw)?;
        }
        if let Some(raw) = lookup("HWD_SCANNER_CHUNK_SIZE_BYTES") {
            self.scanner.chunk_size_bytes =
                parse_env_usize("HWD_SCANNER_CHUNK_SIZE_BYTES", &raw)?;
        }

        // shredder
        if let Some(raw) = lookup("HWD_SHREDDER_PASSES") {
            self.shredder.passes = parse_env_u32("HWD_SHREDDER_PASSES", &raw)?;
        }
        if let Some(raw) = lookup("HWD_SHREDDER_RENAME_BEFORE_UNLINK") {
            self.shredder.rename_before_unlink =
                parse_env_bool("HWD_SHREDDER_RENAME_BEFORE_UNLINK", &raw)?;
        }

        // paths
        if let Some(raw) = lookup("HWD_SIGNATURE_FILE") {
            self.paths.signature_file = PathBuf::from(raw);
        }
        if let Some(raw) = lookup("HWD_QUARANTINE_DIR") {
            self.paths.quarantine_dir = PathBuf::from(raw);
        }
        if let Some(raw) = lookup("HWD_SESSION_LOG") {
            self.paths.session_log = PathBuf::from(raw);
        }
        if let Some(raw) = lookup("HWD_ACTIVITY_LOG") {
            self.paths.activity_log = PathBuf::from(raw);
        }
        Ok(())
    }

    /// Strip trailing slashes so exclusion and quarantine comparisons line up.
    fn normalize_paths(&mut self) {
        for path in self
            .scanner
            .excluded_paths
            .iter_mut()
            .chain(std::iter::once(&mut self.paths.quarantine_dir))
        {
            let s = path.to_string_lossy();
            if s.len() > 1
                && let Some(stripped) = s.strip_suffix('/')
            {
                *path = PathBuf::from(stripped);
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.scanner.parallelism == 0 {
            return Err(HwdError::InvalidConfig {
                details: "scanner.parallelism must be >= 1".to_string(),
            });
        }
        if !(MIN_CHUNK_SIZE..=MAX_CHUNK_SIZE).contains(&self.scanner.chunk_size_bytes) {
            return Err(HwdError::InvalidConfig {
                details: format!(
                    "scanner.chunk_size_bytes must be in [{MIN_CHUNK_SIZE}, {MAX_CHUNK_SIZE}], got {}",
                    self.scanner.chunk_size_bytes
                ),
            });
        }
        if self.scanner.algorithms.is_empty() {
            return Err(HwdError::InvalidConfig {
                details: "scanner.algorithms must list at least one algorithm".to_string(),
            });
        }
        if self.scanner.algorithms_in_priority_order().len() != self.scanner.algorithms.len() {
            return Err(HwdError::InvalidConfig {
                details: "scanner.algorithms must not contain duplicates".to_string(),
            });
        }
        if self.shredder.passes == 0 {
            return Err(HwdError::InvalidConfig {
                details: "shredder.passes must be >= 1".to_string(),
            });
        }
        if self.paths.quarantine_dir.as_os_str().is_empty() {
            return Err(HwdError::InvalidConfig {
                details: "paths.quarantine_dir must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|raw| !raw.trim().is_empty())
}

fn parse_env_usize(name: &str, raw: &str) -> Result<usize> {
    raw.trim()
        .parse::<usize>()
        .map_err(|error| HwdError::ConfigParse {
            context: "env",
            details: format!("{name}={raw:?}: {error}"),
        })
}

fn parse_env_u32(name: &str, raw: &str) -> Result<u32> {
    raw.trim()
        .parse::<u32>()
        .map_err(|error| HwdError::ConfigParse {
            context: "env",
            details: format!("{name}={raw:?}: {error}"),
        })
}

fn parse_env_bool(name: &str, raw: &str) -> Result<bool> {
    raw.trim()
        .parse::<bool>()
        .map_err(|error| HwdError::ConfigParse {
            context: "env",
            details: format!("{name}={raw:?}: {error}"),
        })
}

fn parse_env_algorithms(name: &str, raw: &str) -> Result<Vec<HashAlgorithm>> {
    raw.split(',')
        .filter(|part| !part.trim().is_empty())
        .map(|part| {
            part.parse::<HashAlgorithm>()
                .map_err(|error| HwdError::ConfigParse {
                    context: "env",
                    details: format!("{name}={raw:?}: {error}"),
                })
        })
        .collect()
}
