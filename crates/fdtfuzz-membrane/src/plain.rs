//! Fallback backend: null check and a plain read of every byte.

use crate::region::{MemRegion, RegionVerifier, precheck, touch_bytes};

/// Verifier used when no instrumentation capability is compiled in.
///
/// It cannot tell initialized bytes from uninitialized ones, and it can only
/// "detect" an unaddressable byte by faulting on it. Run it under a
/// sanitizer-instrumented build, or use [`crate::ShadowVerifier`] when the
/// addressable ranges are known up front.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainReadVerifier;

impl PlainReadVerifier {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl RegionVerifier for PlainReadVerifier {
    fn verify(&self, region: MemRegion) {
        if !precheck(self.name(), region) {
            return;
        }
        // SAFETY: the region comes from the parser under test. A bad region
        // faults here (or trips the sanitizer), which is the reported defect.
        unsafe { touch_bytes(region) };
    }

    fn name(&self) -> &'static str {
        "plain"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::global_metrics;

    #[test]
    fn reads_valid_slice() {
        let bytes = vec![0xAAu8; 64];
        let before = global_metrics().snapshot();
        PlainReadVerifier::new().verify(MemRegion::from_slice(&bytes));
        let delta = global_metrics().snapshot().since(&before);
        assert!(delta.bytes_touched >= 64);
        assert!(delta.regions_verified >= 1);
    }

    #[test]
    fn empty_null_region_passes() {
        PlainReadVerifier::new().verify(MemRegion::null());
    }

    #[test]
    #[should_panic(expected = "plain verifier: null pointer")]
    fn null_with_length_panics() {
        PlainReadVerifier::new().verify(MemRegion::from_raw_parts(std::ptr::null(), 1));
    }
}
