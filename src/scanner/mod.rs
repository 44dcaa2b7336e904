//! Signature scanner: streaming digests, the signature set, and the parallel walker.

pub mod digest;
pub mod signatures;
pub mod walker;
