//! Top-level entry points.

use core::fmt;

use fdtfuzz_membrane::{ConfiguredVerifier, RegionVerifier, VerifierKind, verifier_kind};

use super::{DeviceTree, WalkStats, Walker};
use crate::fdt::{FDT_V17_SIZE, Fdt, FdtError};

/// Inputs shorter than a v17 header are not worth validating.
pub const MIN_BLOB_SIZE: usize = FDT_V17_SIZE;

/// Why an input was not walked. None of these are defects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    TooSmall { size: usize },
    Rejected(FdtError),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooSmall { size } => {
                write!(f, "input too small: {size} < {MIN_BLOB_SIZE} bytes")
            }
            Self::Rejected(err) => write!(f, "rejected: {err}"),
        }
    }
}

/// What [`run_with_report`] did with one input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunReport {
    Skipped(SkipReason),
    Walked(WalkStats),
}

impl RunReport {
    /// Status handed back to the fuzzing engine. Always 0: non-zero values
    /// are reserved, and defects never return.
    #[must_use]
    pub const fn status_code(&self) -> i32 {
        0
    }

    #[must_use]
    pub fn stats(&self) -> Option<WalkStats> {
        match self {
            Self::Walked(stats) => Some(*stats),
            Self::Skipped(_) => None,
        }
    }

    #[must_use]
    pub fn skip_reason(&self) -> Option<&SkipReason> {
        match self {
            Self::Skipped(reason) => Some(reason),
            Self::Walked(_) => None,
        }
    }
}

/// Validate `tree` and, if it passes, walk it from the root.
pub fn run_with_report<T, V>(tree: &T, verifier: &V) -> RunReport
where
    T: DeviceTree + ?Sized,
    V: RegionVerifier + ?Sized,
{
    let size = tree.blob_len();
    if size < MIN_BLOB_SIZE {
        return RunReport::Skipped(SkipReason::TooSmall { size });
    }
    if let Err(err) = tree.structural_validate() {
        return RunReport::Skipped(SkipReason::Rejected(err));
    }

    let mut walker = Walker::new(tree, verifier);
    walker.walk(tree.root());
    RunReport::Walked(walker.stats())
}

/// [`run_with_report`], reduced to the engine status.
pub fn run<T, V>(tree: &T, verifier: &V) -> i32
where
    T: DeviceTree + ?Sized,
    V: RegionVerifier + ?Sized,
{
    run_with_report(tree, verifier).status_code()
}

/// Run raw bytes through the FDT reader with the given verifier backend.
pub fn run_input(data: &[u8], kind: VerifierKind) -> RunReport {
    let verifier = ConfiguredVerifier::for_blob(kind, data);
    run_with_report(&Fdt::new(data), &verifier)
}

/// libFuzzer entry point body. The backend comes from `FDTFUZZ_VERIFIER`.
pub fn fuzz_one_input(data: &[u8]) -> i32 {
    run_input(data, verifier_kind()).status_code()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fdt::BlobBuilder;

    #[test]
    fn short_input_is_skipped() {
        let report = run_input(&[0u8; MIN_BLOB_SIZE - 1], VerifierKind::Plain);
        assert_eq!(
            report,
            RunReport::Skipped(SkipReason::TooSmall {
                size: MIN_BLOB_SIZE - 1
            })
        );
        assert_eq!(report.status_code(), 0);
    }

    #[test]
    fn bad_magic_is_rejected() {
        let report = run_input(&[0u8; 64], VerifierKind::Shadow);
        assert_eq!(
            report.skip_reason(),
            Some(&SkipReason::Rejected(FdtError::BadMagic(0)))
        );
    }

    #[test]
    fn valid_blob_is_walked_with_every_backend() {
        let mut b = BlobBuilder::new();
        b.begin_node("")
            .prop("model", b"acme\0")
            .end_node()
            .end();
        let blob = b.finish();
        for kind in [VerifierKind::Plain, VerifierKind::Sanitizer, VerifierKind::Shadow] {
            let stats = run_input(&blob, kind).stats().unwrap();
            assert_eq!(stats.nodes, 1);
            assert_eq!(stats.properties, 1);
        }
    }

    #[test]
    fn skip_reason_display() {
        let reason = SkipReason::TooSmall { size: 3 };
        assert_eq!(reason.to_string(), "input too small: 3 < 40 bytes");
        let reason = SkipReason::Rejected(FdtError::BadMagic(1));
        assert_eq!(reason.to_string(), "rejected: bad FDT magic: 0x00000001");
    }
}
