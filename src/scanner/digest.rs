//! Digest engine: streamed multi-algorithm content hashing.
//!
//! A file is read once in bounded chunks and every requested hasher is fed
//! from the same buffer, so memory use is independent of file size and the
//! cost of asking for all algorithms is one pass over the bytes.

#![allow(missing_docs)]

use std::fmt;
use std::fs::{self, File};
use std::io::{ErrorKind, Read};
use std::path::Path;
use std::str::FromStr;

use md5::Md5;
use serde::{Deserialize, Serialize};
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha512};

use crate::core::errors::{HwdError, Result};

/// Default read buffer for streamed hashing.
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

// ──────────────────── algorithms ────────────────────

/// Supported digest algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    Md5,
    Sha1,
    Sha256,
    Sha512,
}

impl HashAlgorithm {
    /// Match priority: strongest collision resistance first.
    pub const PRIORITY: [Self; 4] = [Self::Sha512, Self::Sha256, Self::Sha1, Self::Md5];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Md5 => "md5",
            Self::Sha1 => "sha1",
            Self::Sha256 => "sha256",
            Self::Sha512 => "sha512",
        }
    }

    /// Length of the lowercase hex rendering of this algorithm's output.
    #[must_use]
    pub const fn hex_len(self) -> usize {
        match self {
            Self::Md5 => 32,
            Self::Sha1 => 40,
            Self::Sha256 => 64,
            Self::Sha512 => 128,
        }
    }

    /// MD5 and SHA-1 have practical collision attacks.
    #[must_use]
    pub const fn is_collision_resistant(self) -> bool {
        matches!(self, Self::Sha256 | Self::Sha512)
    }

    const fn rank(self) -> usize {
        match self {
            Self::Sha512 => 0,
            Self::Sha256 => 1,
            Self::Sha1 => 2,
            Self::Md5 => 3,
        }
    }

    /// Sort and dedup an algorithm list into priority order.
    #[must_use]
    pub fn in_priority_order(algorithms: &[Self]) -> Vec<Self> {
        let mut ordered = algorithms.to_vec();
        ordered.sort_by_key(|a| a.rank());
        ordered.dedup();
        ordered
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for HashAlgorithm {
    type Err = HwdError;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().replace('-', "").as_str() {
            "md5" => Ok(Self::Md5),
            "sha1" => Ok(Self::Sha1),
            "sha256" => Ok(Self::Sha256),
            "sha512" => Ok(Self::Sha512),
            other => Err(HwdError::InvalidConfig {
                details: format!("unsupported hash algorithm: {other:?}"),
            }),
        }
    }
}

// ──────────────────── digest set ────────────────────

/// Digests of one file, in algorithm priority order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DigestSet {
    digests: Vec<(HashAlgorithm, String)>,
}

impl DigestSet {
    /// Hex digest for `algorithm`, if it was computed.
    #[must_use]
    pub fn get(&self, algorithm: HashAlgorithm) -> Option<&str> {
        self.digests
            .iter()
            .find(|(a, _)| *a == algorithm)
            .map(|(_, d)| d.as_str())
    }

    /// Iterate `(algorithm, hex)` pairs, strongest first.
    pub fn iter(&self) -> impl Iterator<Item = (HashAlgorithm, &str)> {
        self.digests.iter().map(|(a, d)| (*a, d.as_str()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.digests.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.digests.is_empty()
    }
}

// ──────────────────── hashers ────────────────────

enum Hasher {
    Md5(Md5),
    Sha1(Sha1),
    Sha256(Sha256),
    Sha512(Sha512),
}

impl Hasher {
    fn new(algorithm: HashAlgorithm) -> Self {
        match algorithm {
            HashAlgorithm::Md5 => Self::Md5(Md5::new()),
            HashAlgorithm::Sha1 => Self::Sha1(Sha1::new()),
            HashAlgorithm::Sha256 => Self::Sha256(Sha256::new()),
            HashAlgorithm::Sha512 => Self::Sha512(Sha512::new()),
        }
    }

    fn update(&mut self, bytes: &[u8]) {
        match self {
            Self::Md5(h) => h.update(bytes),
            Self::Sha1(h) => h.update(bytes),
            Self::Sha256(h) => h.update(bytes),
            Self::Sha512(h) => h.update(bytes),
        }
    }

    fn finalize_hex(self) -> String {
        match self {
            Self::Md5(h) => hex::encode(h.finalize()),
            Self::Sha1(h) => hex::encode(h.finalize()),
            Self::Sha256(h) => hex::encode(h.finalize()),
            Self::Sha512(h) => hex::encode(h.finalize()),
        }
    }
}

// ──────────────────── engine ────────────────────

/// Computes digests of file contents under a fixed set of algorithms.
#[derive(Debug, Clone)]
pub struct DigestEngine {
    algorithms: Vec<HashAlgorithm>,
    chunk_size: usize,
}

impl Default for DigestEngine {
    fn default() -> Self {
        Self::new(&HashAlgorithm::PRIORITY, DEFAULT_CHUNK_SIZE)
    }
}

impl DigestEngine {
    /// Build an engine for `algorithms` (order irrelevant, duplicates ignored).
    pub fn new(algorithms: &[HashAlgorithm], chunk_size: usize) -> Self {
        Self {
            algorithms: HashAlgorithm::in_priority_order(algorithms),
            chunk_size: chunk_size.max(1),
        }
    }

    /// Algorithms this engine computes, strongest first.
    pub fn algorithms(&self) -> &[HashAlgorithm] {
        &self.algorithms
    }

    /// Digest a file's full content.
    ///
    /// Anything that prevents reading the bytes (missing file, permissions,
    /// special files, a read error mid-stream) is reported as
    /// [`HwdError::Unreadable`]; the caller decides whether to skip or abort.
    pub fn digest_file(&self, path: &Path) -> Result<DigestSet> {
        let meta = fs::metadata(path).map_err(|e| HwdError::unreadable(path, e.to_string()))?;
        // Opening a FIFO for reading blocks until a writer appears.
        if !meta.is_file() {
            return Err(HwdError::unreadable(path, "not a regular file"));
        }
        let file = File::open(path).map_err(|e| HwdError::unreadable(path, e.to_string()))?;
        self.digest_reader(file)
            .map_err(|e| HwdError::unreadable(path, e.to_string()))
    }

    /// Digest everything `reader` yields.
    pub fn digest_reader<R: Read>(&self, mut reader: R) -> std::io::Result<DigestSet> {
        let mut hashers: Vec<(HashAlgorithm, Hasher)> = self
            .algorithms
            .iter()
            .map(|a| (*a, Hasher::new(*a)))
            .collect();
        let mut buf = vec![0u8; self.chunk_size];

        loop {
            let n = match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            for (_, hasher) in &mut hashers {
                hasher.update(&buf[..n]);
            }
        }

        Ok(DigestSet {
            digests: hashers
                .into_iter()
                .map(|(a, h)| (a, h.finalize_hex()))
                .collect(),
        })
    }

    /// Digest an in-memory buffer.
    #[must_use]
    pub fn digest_bytes(&self, bytes: &[u8]) -> DigestSet {
        let mut hashers: Vec<(HashAlgorithm, Hasher)> = self
            .algorithms
            .iter()
            .map(|a| (*a, Hasher::new(*a)))
            .collect();
        for (_, hasher) in &mut hashers {
            hasher.update(bytes);
        }
        DigestSet {
            digests: hashers
                .into_iter()
                .map(|(a, h)| (a, h.finalize_hex()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const ABC_MD5: &str = "900150983cd24fb0d6963f7d28e17f72";
    const ABC_SHA1: &str = "a9993e364706816aba3e25717850c26c9cd0d89d";
    const ABC_SHA256: &str = "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad";
    const ABC_SHA512: &str = "ddaf35a193617abacc417349ae20413112e6fa4e89a97ea20a9eeee64b55d39a\
                              2192992a274fc1a836ba3c23a3feebbd454d4423643ce80e2a9ac94fa54ca49f";

    #[test]
    fn known_vectors_for_abc() {
        let set = DigestEngine::default().digest_bytes(b"abc");
        assert_eq!(set.get(HashAlgorithm::Md5), Some(ABC_MD5));
        assert_eq!(set.get(HashAlgorithm::Sha1), Some(ABC_SHA1));
        assert_eq!(set.get(HashAlgorithm::Sha256), Some(ABC_SHA256));
        assert_eq!(set.get(HashAlgorithm::Sha512), Some(ABC_SHA512));
    }

    #[test]
    fn file_digest_matches_known_vector() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("abc.txt");
        fs::write(&path, b"abc").unwrap();
        let set = DigestEngine::new(&[HashAlgorithm::Sha256, HashAlgorithm::Md5], 2)
            .digest_file(&path)
            .unwrap();
        assert_eq!(set.get(HashAlgorithm::Sha256), Some(ABC_SHA256));
        assert_eq!(set.get(HashAlgorithm::Md5), Some(ABC_MD5));
        assert_eq!(set.get(HashAlgorithm::Sha1), None);
    }

    #[test]
    fn results_come_back_strongest_first() {
        let engine = DigestEngine::new(
            &[HashAlgorithm::Md5, HashAlgorithm::Sha256, HashAlgorithm::Md5],
            DEFAULT_CHUNK_SIZE,
        );
        assert_eq!(
            engine.algorithms(),
            &[HashAlgorithm::Sha256, HashAlgorithm::Md5]
        );
        let order: Vec<_> = engine.digest_bytes(b"x").iter().map(|(a, _)| a).collect();
        assert_eq!(order, vec![HashAlgorithm::Sha256, HashAlgorithm::Md5]);
    }

    #[test]
    fn missing_file_is_unreadable() {
        let err = DigestEngine::default()
            .digest_file(Path::new("/definitely/not/here.bin"))
            .unwrap_err();
        assert_eq!(err.code(), "HWD-2002");
    }

    #[test]
    fn directory_is_unreadable() {
        let dir = tempfile::tempdir().unwrap();
        let err = DigestEngine::default().digest_file(dir.path()).unwrap_err();
        assert!(matches!(err, HwdError::Unreadable { .. }));
        assert!(err.to_string().contains("not a regular file"));
    }

    #[cfg(unix)]
    #[test]
    fn fifo_is_unreadable_without_blocking() {
        let dir = tempfile::tempdir().unwrap();
        let fifo = dir.path().join("pipe");
        nix::unistd::mkfifo(&fifo, nix::sys::stat::Mode::S_IRWXU).unwrap();
        let err = DigestEngine::default().digest_file(&fifo).unwrap_err();
        assert!(matches!(err, HwdError::Unreadable { .. }));
    }

    #[test]
    fn algorithm_names_parse_leniently() {
        assert_eq!("SHA-256".parse::<HashAlgorithm>().unwrap(), HashAlgorithm::Sha256);
        assert_eq!(" md5 ".parse::<HashAlgorithm>().unwrap(), HashAlgorithm::Md5);
        assert!("crc32".parse::<HashAlgorithm>().is_err());
    }

    proptest! {
        #[test]
        fn streamed_digest_matches_one_shot(
            data in proptest::collection::vec(any::<u8>(), 0..20_000),
            chunk in 1usize..5_000,
        ) {
            let streamed = DigestEngine::new(&HashAlgorithm::PRIORITY, chunk)
                .digest_reader(std::io::Cursor::new(&data))
                .unwrap();
            let one_shot = DigestEngine::default().digest_bytes(&data);
            prop_assert_eq!(&streamed, &one_shot);
            for (algorithm, hex) in streamed.iter() {
                prop_assert_eq!(hex.len(), algorithm.hex_len());
                prop_assert!(hex.chars().all(|c| matches!(c, '0'..='9' | 'a'..='f')));
            }
        }
    }
}
