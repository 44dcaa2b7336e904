//! Core types: errors, configuration, interruption, shared path helpers.

pub mod config;
pub mod errors;
pub mod interrupt;
pub mod paths;
