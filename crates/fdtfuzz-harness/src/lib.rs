//! Replay and triage tooling for the fdtfuzz driver.
//!
//! This crate provides:
//! - Replay: feed corpus files or crash reproducers through the same driver
//!   the fuzz target uses, outside of libFuzzer
//! - Check: run structural validation alone to see why an input is skipped
//! - Structured logs: one JSONL record per replayed input

#![forbid(unsafe_code)]

pub mod runner;
pub mod structured_log;

pub use runner::{DEFAULT_MAX_LEN, ReplayError, ReplayRecord, ReplayRunner};
pub use structured_log::{LogEmitter, LogEntry, LogLevel, Outcome};
