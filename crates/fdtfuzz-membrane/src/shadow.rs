//! In-process shadow verifier.
//!
//! Keeps an ordered map of registered regions, each with a bitmap of bytes
//! that have been written. A region under verification must fall entirely
//! inside one registered region and every byte must be marked initialized.
//! Only then are the bytes read.
//!
//! Registrations borrow the backing memory for `'a`, so a registered range
//! can never dangle while the verifier is alive.

use std::collections::BTreeMap;
use std::marker::PhantomData;

use parking_lot::RwLock;

use crate::region::{MemRegion, RegionVerifier, precheck, touch_bytes, violation};

/// One registered allocation.
struct ShadowRegion {
    size: usize,
    /// One bit per byte; set = initialized.
    init: Vec<u64>,
}

impl ShadowRegion {
    fn new(size: usize, initialized: bool) -> Self {
        let words = size.div_ceil(64);
        let fill = if initialized { u64::MAX } else { 0 };
        Self {
            size,
            init: vec![fill; words],
        }
    }

    fn mark(&mut self, offset: usize, len: usize) {
        for bit in offset..offset + len {
            self.init[bit / 64] |= 1 << (bit % 64);
        }
    }

    fn first_uninit(&self, offset: usize, len: usize) -> Option<usize> {
        (offset..offset + len).find(|&bit| self.init[bit / 64] & (1 << (bit % 64)) == 0)
    }
}

/// Verifier that knows exactly which bytes are addressable and initialized.
pub struct ShadowVerifier<'a> {
    /// Registered regions keyed by base address.
    regions: RwLock<BTreeMap<usize, ShadowRegion>>,
    _borrow: PhantomData<&'a [u8]>,
}

impl<'a> ShadowVerifier<'a> {
    /// Create a verifier with nothing registered.
    #[must_use]
    pub fn new() -> Self {
        Self {
            regions: RwLock::new(BTreeMap::new()),
            _borrow: PhantomData,
        }
    }

    /// Verifier with `bytes` registered as fully initialized.
    #[must_use]
    pub fn for_blob(bytes: &'a [u8]) -> Self {
        let verifier = Self::new();
        verifier.register(bytes);
        verifier
    }

    /// Register `bytes` as addressable and initialized.
    ///
    /// Returns `false` (and registers nothing) for an empty slice or one
    /// overlapping an existing registration.
    pub fn register(&self, bytes: &'a [u8]) -> bool {
        self.insert(bytes, true)
    }

    /// Register `bytes` as addressable but never written.
    pub fn register_uninit(&self, bytes: &'a [u8]) -> bool {
        self.insert(bytes, false)
    }

    fn insert(&self, bytes: &'a [u8], initialized: bool) -> bool {
        if bytes.is_empty() {
            return false;
        }
        let base = bytes.as_ptr() as usize;
        let end = base + bytes.len();
        let mut regions = self.regions.write();
        let overlaps_prev = regions
            .range(..end)
            .next_back()
            .is_some_and(|(&b, r)| b + r.size > base);
        if overlaps_prev {
            return false;
        }
        regions.insert(base, ShadowRegion::new(bytes.len(), initialized));
        true
    }

    /// Mark `region` as written. Returns `false` if it is not fully inside a
    /// registered region.
    pub fn mark_initialized(&self, region: MemRegion) -> bool {
        let Some(end) = region.end_addr() else {
            return false;
        };
        let mut regions = self.regions.write();
        let Some((&base, shadow)) = regions.range_mut(..=region.addr()).next_back() else {
            return false;
        };
        if end > base + shadow.size {
            return false;
        }
        shadow.mark(region.addr() - base, region.len());
        true
    }

    /// Number of registered regions.
    #[must_use]
    pub fn registered(&self) -> usize {
        self.regions.read().len()
    }

    /// Registration base and offset of `region`, if addressable.
    fn locate(&self, region: MemRegion) -> Option<(usize, usize)> {
        let end = region.end_addr()?;
        let regions = self.regions.read();
        let (&base, shadow) = regions.range(..=region.addr()).next_back()?;
        (end <= base + shadow.size).then(|| (base, region.addr() - base))
    }
}

impl Default for ShadowVerifier<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl RegionVerifier for ShadowVerifier<'_> {
    fn verify(&self, region: MemRegion) {
        if !precheck(self.name(), region) {
            return;
        }
        let Some((base, offset)) = self.locate(region) else {
            violation(
                self.name(),
                format_args!(
                    "region {:#x}+{} is not addressable",
                    region.addr(),
                    region.len()
                ),
            );
        };
        let uninit = {
            let regions = self.regions.read();
            regions
                .get(&base)
                .and_then(|shadow| shadow.first_uninit(offset, region.len()))
        };
        if let Some(bit) = uninit {
            violation(
                self.name(),
                format_args!(
                    "region {:#x}+{} reads uninitialized byte at offset {}",
                    region.addr(),
                    region.len(),
                    bit - offset
                ),
            );
        }
        // SAFETY: the range lies inside a slice borrowed for 'a.
        unsafe { touch_bytes(region) };
    }

    fn name(&self) -> &'static str {
        "shadow"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registered_blob_verifies() {
        let blob = vec![0u8; 128];
        let v = ShadowVerifier::for_blob(&blob);
        assert_eq!(v.registered(), 1);
        v.verify(MemRegion::from_slice(&blob));
        v.verify(MemRegion::from_slice(&blob[10..20]));
    }

    #[test]
    fn overlapping_registration_rejected() {
        let blob = vec![0u8; 64];
        let v = ShadowVerifier::new();
        assert!(v.register(&blob[..32]));
        assert!(!v.register(&blob[16..48]));
        assert!(v.register(&blob[32..]));
        assert_eq!(v.registered(), 2);
    }

    #[test]
    fn empty_registration_rejected() {
        let v = ShadowVerifier::new();
        assert!(!v.register(&[]));
    }

    #[test]
    fn mark_initialized_clears_uninit() {
        let blob = vec![0u8; 32];
        let v = ShadowVerifier::new();
        assert!(v.register_uninit(&blob));
        assert!(v.mark_initialized(MemRegion::from_slice(&blob[..8])));
        v.verify(MemRegion::from_slice(&blob[..8]));
        assert!(!v.mark_initialized(MemRegion::from_raw_parts(blob.as_ptr(), 33)));
    }

    #[test]
    #[should_panic(expected = "is not addressable")]
    fn unregistered_region_panics() {
        let blob = vec![0u8; 8];
        ShadowVerifier::new().verify(MemRegion::from_slice(&blob));
    }

    #[test]
    fn locate_respects_bounds() {
        let blob = vec![0u8; 16];
        let v = ShadowVerifier::for_blob(&blob);
        assert_eq!(
            v.locate(MemRegion::from_slice(&blob[4..])),
            Some((blob.as_ptr() as usize, 4))
        );
        assert_eq!(v.locate(MemRegion::from_raw_parts(blob.as_ptr(), 17)), None);
    }

    #[test]
    #[should_panic(expected = "is not addressable")]
    fn straddling_end_panics() {
        let blob = vec![0u8; 16];
        let v = ShadowVerifier::for_blob(&blob[..8]);
        v.verify(MemRegion::from_slice(&blob[4..12]));
    }

    #[test]
    #[should_panic(expected = "uninitialized byte at offset 3")]
    fn uninit_byte_panics() {
        let blob = vec![0u8; 16];
        let v = ShadowVerifier::new();
        v.register_uninit(&blob);
        v.mark_initialized(MemRegion::from_slice(&blob[..3]));
        v.verify(MemRegion::from_slice(&blob[..6]));
    }
}
