//! Replay engine.
//!
//! Feeds files through [`fdtfuzz_core::run_input`] exactly as the fuzz target
//! would, one bounded buffer per file. A defect panics inside the driver and
//! takes the process down, the same signal libFuzzer would report.

use std::io::Read;
use std::path::{Path, PathBuf};

use fdtfuzz_core::{Fdt, FdtResult, RunReport, run_input};
use fdtfuzz_membrane::VerifierKind;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::structured_log::{LogEntry, LogLevel, Outcome};

/// Largest input read from one file, matching the standalone fuzz buffer.
pub const DEFAULT_MAX_LEN: usize = 1024 * 1024;

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("no input files found")]
    NoInputs,
}

impl ReplayError {
    fn io(path: &Path) -> impl FnOnce(std::io::Error) -> Self + '_ {
        move |source| Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Result of replaying one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayRecord {
    pub path: PathBuf,
    /// Bytes handed to the driver
    pub len: usize,
    /// Whether the file was longer than the read bound
    pub truncated: bool,
    /// Lowercase hex SHA-256 of the bytes handed to the driver
    pub sha256: String,
    /// Header version, when the magic number was right
    pub version: Option<u32>,
    pub report: RunReport,
}

impl ReplayRecord {
    #[must_use]
    pub fn outcome(&self) -> Outcome {
        match self.report {
            RunReport::Walked(_) => Outcome::Pass,
            RunReport::Skipped(_) => Outcome::Skip,
        }
    }

    /// Structured log line for this record.
    #[must_use]
    pub fn to_log_entry(&self, trace_id: impl Into<String>, verifier: VerifierKind) -> LogEntry {
        let details = match &self.report {
            RunReport::Walked(stats) => serde_json::json!({
                "nodes": stats.nodes,
                "names": stats.names,
                "properties": stats.properties,
                "skipped_properties": stats.skipped_properties,
                "phandles": stats.phandles,
                "bytes_verified": stats.bytes,
                "version": self.version,
                "truncated": self.truncated,
            }),
            RunReport::Skipped(reason) => serde_json::json!({
                "skip_reason": reason.to_string(),
                "version": self.version,
                "truncated": self.truncated,
            }),
        };
        LogEntry::new(trace_id, LogLevel::Info, "input_replayed")
            .with_verifier(verifier.as_str())
            .with_input(self.path.display().to_string(), &self.sha256, self.len as u64)
            .with_outcome(self.outcome())
            .with_status(self.report.status_code())
            .with_details(details)
    }
}

/// Replays files through the driver with a fixed verifier backend.
#[derive(Debug, Clone)]
pub struct ReplayRunner {
    pub verifier: VerifierKind,
    pub max_len: usize,
}

impl ReplayRunner {
    #[must_use]
    pub fn new(verifier: VerifierKind) -> Self {
        Self {
            verifier,
            max_len: DEFAULT_MAX_LEN,
        }
    }

    #[must_use]
    pub fn with_max_len(mut self, max_len: usize) -> Self {
        self.max_len = max_len;
        self
    }

    /// Replay every file under `paths`, in the order [`collect_inputs`] gives.
    ///
    /// # Errors
    ///
    /// I/O failures, or [`ReplayError::NoInputs`] when nothing was found.
    pub fn replay(&self, paths: &[PathBuf]) -> Result<Vec<ReplayRecord>, ReplayError> {
        collect_inputs(paths)?
            .iter()
            .map(|path| self.replay_file(path))
            .collect()
    }

    /// Replay a single file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    pub fn replay_file(&self, path: &Path) -> Result<ReplayRecord, ReplayError> {
        let (data, truncated) = read_bounded(path, self.max_len)?;
        let version = Fdt::new(&data).header().map(|h| h.version);
        let report = run_input(&data, self.verifier);
        Ok(ReplayRecord {
            path: path.to_path_buf(),
            len: data.len(),
            truncated,
            sha256: sha256_hex(&data),
            version,
            report,
        })
    }

    /// Structural validation only, for triaging skipped inputs.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    pub fn check_file(&self, path: &Path) -> Result<FdtResult<()>, ReplayError> {
        let (data, _) = read_bounded(path, self.max_len)?;
        Ok(Fdt::new(&data).check_full())
    }
}

/// Expand `paths` into a flat file list.
///
/// Files are kept in argument order; directories contribute their files
/// (recursively) in sorted path order.
///
/// # Errors
///
/// I/O failures, or [`ReplayError::NoInputs`] when the list comes out empty.
pub fn collect_inputs(paths: &[PathBuf]) -> Result<Vec<PathBuf>, ReplayError> {
    let mut inputs = Vec::new();
    for path in paths {
        let meta = std::fs::metadata(path).map_err(ReplayError::io(path))?;
        if meta.is_dir() {
            let mut found = Vec::new();
            collect_dir(path, &mut found)?;
            found.sort();
            inputs.extend(found);
        } else {
            inputs.push(path.clone());
        }
    }
    if inputs.is_empty() {
        return Err(ReplayError::NoInputs);
    }
    Ok(inputs)
}

fn collect_dir(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), ReplayError> {
    for entry in std::fs::read_dir(dir).map_err(ReplayError::io(dir))? {
        let path = entry.map_err(ReplayError::io(dir))?.path();
        if path.is_dir() {
            collect_dir(&path, out)?;
        } else {
            out.push(path);
        }
    }
    Ok(())
}

/// Read at most `max_len` bytes of `path`; the flag reports whether more
/// bytes were left behind.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or read.
pub fn read_bounded(path: &Path, max_len: usize) -> Result<(Vec<u8>, bool), ReplayError> {
    let file = std::fs::File::open(path).map_err(ReplayError::io(path))?;
    let mut data = Vec::new();
    // One extra byte tells a file of exactly `max_len` apart from a longer one.
    file.take((max_len as u64).saturating_add(1))
        .read_to_end(&mut data)
        .map_err(ReplayError::io(path))?;
    let truncated = data.len() > max_len;
    data.truncate(max_len);
    Ok((data, truncated))
}

fn sha256_hex(bytes: &[u8]) -> String {
    Sha256::digest(bytes).iter().map(|b| format!("{b:02x}")).collect()
}
