//! Sanitizer-backed verification.
//!
//! With the `msan` feature every region is passed to
//! `__msan_check_mem_is_initialized`, which reports and dies on the first
//! uninitialized byte. With the `asan` feature the region must not contain
//! any poisoned byte. Without `asan` the bytes are read one by one so that
//! whatever instrumentation is present sees the access.
//!
//! The features only link against the sanitizer runtimes; the crate must be
//! built with the matching `-Zsanitizer=` flag (cargo fuzz `-s address` /
//! `-s memory`) or the symbols will be unresolved.

use crate::region::{MemRegion, RegionVerifier, precheck};
#[cfg(feature = "asan")]
use crate::region::violation;
#[cfg(not(feature = "asan"))]
use crate::region::touch_bytes;

#[cfg(feature = "asan")]
unsafe extern "C" {
    fn __asan_region_is_poisoned(beg: *mut libc::c_void, size: libc::size_t)
    -> *mut libc::c_void;
}

#[cfg(feature = "msan")]
unsafe extern "C" {
    fn __msan_check_mem_is_initialized(x: *const libc::c_void, size: libc::size_t);
}

/// Verifier backed by whichever sanitizer interface was compiled in.
#[derive(Debug, Default, Clone, Copy)]
pub struct SanitizerVerifier;

impl SanitizerVerifier {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// True when at least one sanitizer interface is linked.
    #[must_use]
    pub const fn instrumented() -> bool {
        cfg!(any(feature = "asan", feature = "msan"))
    }

    #[cfg(feature = "msan")]
    fn check_initialized(region: MemRegion) {
        // SAFETY: MSan only inspects its shadow for the range; it reports and
        // aborts on failure.
        unsafe {
            __msan_check_mem_is_initialized(region.ptr().cast(), region.len());
        }
    }

    #[cfg(not(feature = "msan"))]
    fn check_initialized(_region: MemRegion) {}

    #[cfg(feature = "asan")]
    fn check_addressable(&self, region: MemRegion) {
        // SAFETY: ASan only inspects shadow memory for the range.
        let poisoned =
            unsafe { __asan_region_is_poisoned(region.ptr().cast_mut().cast(), region.len()) };
        if !poisoned.is_null() {
            let offset = (poisoned as usize).wrapping_sub(region.addr());
            violation(
                self.name(),
                format_args!(
                    "region {:#x}+{} poisoned at offset {offset}",
                    region.addr(),
                    region.len()
                ),
            );
        }
    }

    #[cfg(not(feature = "asan"))]
    fn check_addressable(&self, region: MemRegion) {
        // SAFETY: see `PlainReadVerifier`; the read is the instrumented event.
        unsafe { touch_bytes(region) };
    }
}

impl RegionVerifier for SanitizerVerifier {
    fn verify(&self, region: MemRegion) {
        if !precheck(self.name(), region) {
            return;
        }
        Self::check_initialized(region);
        self.check_addressable(region);
    }

    fn name(&self) -> &'static str {
        if cfg!(feature = "asan") {
            "asan"
        } else if cfg!(feature = "msan") {
            "msan"
        } else {
            "sanitizer-fallback"
        }
    }
}

#[cfg(all(test, not(any(feature = "asan", feature = "msan"))))]
mod tests {
    use super::*;

    #[test]
    fn uninstrumented_build_falls_back_to_reads() {
        assert!(!SanitizerVerifier::instrumented());
        assert_eq!(SanitizerVerifier::new().name(), "sanitizer-fallback");
        let bytes = [7u8; 16];
        SanitizerVerifier::new().verify(MemRegion::from_slice(&bytes));
    }

    #[test]
    #[should_panic(expected = "null pointer")]
    fn null_with_length_panics() {
        SanitizerVerifier::new().verify(MemRegion::from_raw_parts(std::ptr::null(), 3));
    }
}
