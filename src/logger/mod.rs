//! Logging: the human session log and the JSONL activity log with its writer thread.

pub mod activity;
pub mod jsonl;
pub mod session_log;
