//! Pointer/length pairs and the verifier capability.

use std::hint::black_box;

use crate::metrics::{VerifierMetrics, global_metrics};

/// A (pointer, length) pair as reported by the parser under test.
///
/// The length is attacker-influenced. Nothing about a `MemRegion` is
/// trusted until a [`RegionVerifier`] has looked at it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemRegion {
    ptr: *const u8,
    len: usize,
}

impl MemRegion {
    /// Build a region from a raw pointer and a declared length.
    ///
    /// No bounds are checked here; that is the verifier's job.
    #[must_use]
    pub const fn from_raw_parts(ptr: *const u8, len: usize) -> Self {
        Self { ptr, len }
    }

    /// Region covering exactly `bytes`.
    #[must_use]
    pub fn from_slice(bytes: &[u8]) -> Self {
        Self {
            ptr: bytes.as_ptr(),
            len: bytes.len(),
        }
    }

    /// An empty region with a null pointer.
    #[must_use]
    pub const fn null() -> Self {
        Self {
            ptr: std::ptr::null(),
            len: 0,
        }
    }

    #[must_use]
    pub const fn ptr(self) -> *const u8 {
        self.ptr
    }

    #[must_use]
    pub const fn len(self) -> usize {
        self.len
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.len == 0
    }

    #[must_use]
    pub fn is_null(self) -> bool {
        self.ptr.is_null()
    }

    /// Start address.
    #[must_use]
    pub fn addr(self) -> usize {
        self.ptr as usize
    }

    /// One-past-the-end address, or `None` if the declared length wraps.
    #[must_use]
    pub fn end_addr(self) -> Option<usize> {
        self.addr().checked_add(self.len)
    }
}

/// Capability: confirm a region is addressable and initialized.
///
/// Implementations panic when they detect a violation. They never return an
/// error value, since a defect must not be downgraded into something the
/// caller could ignore.
pub trait RegionVerifier {
    /// Check and read every byte of `region`.
    fn verify(&self, region: MemRegion);

    /// Short backend name for logs.
    fn name(&self) -> &'static str;
}

impl<V: RegionVerifier + ?Sized> RegionVerifier for &V {
    fn verify(&self, region: MemRegion) {
        (**self).verify(region);
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

/// Record a detected violation and abort the current fuzz iteration.
#[track_caller]
pub(crate) fn violation(backend: &str, message: std::fmt::Arguments<'_>) -> ! {
    VerifierMetrics::inc(&global_metrics().violations);
    panic!("{backend} verifier: {message}");
}

/// Shared entry bookkeeping. Returns `false` when there is nothing to read.
///
/// Null with a non-zero length is fatal for every backend.
#[track_caller]
pub(crate) fn precheck(backend: &str, region: MemRegion) -> bool {
    let metrics = global_metrics();
    VerifierMetrics::inc(&metrics.regions_verified);
    if region.is_empty() {
        VerifierMetrics::inc(&metrics.zero_length_regions);
        return false;
    }
    if region.is_null() {
        violation(
            backend,
            format_args!("null pointer with length {}", region.len()),
        );
    }
    true
}

/// Read every byte of `region` through a volatile load.
///
/// # Safety
///
/// The region must be readable for `region.len()` bytes, or the process must
/// be running under instrumentation that traps the first bad access (which
/// is the point of calling this on parser output).
pub(crate) unsafe fn touch_bytes(region: MemRegion) {
    let base = region.ptr();
    let mut acc = 0u8;
    for i in 0..region.len() {
        // SAFETY: forwarded to the caller.
        acc ^= unsafe { std::ptr::read_volatile(base.add(i)) };
    }
    black_box(acc);
    VerifierMetrics::add(&global_metrics().bytes_touched, region.len() as u64);
}
