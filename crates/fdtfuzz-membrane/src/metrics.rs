//! Atomic counters for verifier observability.
//!
//! All counters use relaxed ordering. They are advisory/diagnostic and
//! never feed back into a verification decision.

use std::sync::atomic::{AtomicU64, Ordering};

/// Global verifier operation counters.
pub struct VerifierMetrics {
    /// Regions handed to any backend.
    pub regions_verified: AtomicU64,
    /// Bytes read through the volatile touch loop.
    pub bytes_touched: AtomicU64,
    /// Regions with a declared length of zero.
    pub zero_length_regions: AtomicU64,
    /// Violations detected (each one is followed by a panic).
    pub violations: AtomicU64,
}

impl VerifierMetrics {
    /// Create a new zeroed metrics instance.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            regions_verified: AtomicU64::new(0),
            bytes_touched: AtomicU64::new(0),
            zero_length_regions: AtomicU64::new(0),
            violations: AtomicU64::new(0),
        }
    }

    /// Increment a counter by 1.
    pub fn inc(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment a counter by `n`.
    pub fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    /// Read a counter value.
    pub fn get(counter: &AtomicU64) -> u64 {
        counter.load(Ordering::Relaxed)
    }

    /// Snapshot all counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            regions_verified: Self::get(&self.regions_verified),
            bytes_touched: Self::get(&self.bytes_touched),
            zero_length_regions: Self::get(&self.zero_length_regions),
            violations: Self::get(&self.violations),
        }
    }
}

impl Default for VerifierMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time snapshot of all verifier counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub regions_verified: u64,
    pub bytes_touched: u64,
    pub zero_length_regions: u64,
    pub violations: u64,
}

impl MetricsSnapshot {
    /// Counter deltas since `earlier`.
    #[must_use]
    pub fn since(&self, earlier: &MetricsSnapshot) -> MetricsSnapshot {
        MetricsSnapshot {
            regions_verified: self.regions_verified.saturating_sub(earlier.regions_verified),
            bytes_touched: self.bytes_touched.saturating_sub(earlier.bytes_touched),
            zero_length_regions: self
                .zero_length_regions
                .saturating_sub(earlier.zero_length_regions),
            violations: self.violations.saturating_sub(earlier.violations),
        }
    }
}

static GLOBAL_METRICS: VerifierMetrics = VerifierMetrics::new();

/// Access the global metrics singleton.
#[must_use]
pub fn global_metrics() -> &'static VerifierMetrics {
    &GLOBAL_METRICS
}
