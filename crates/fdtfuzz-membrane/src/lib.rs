//! Memory region verification for the fdtfuzz walker.
//!
//! Every buffer the device-tree parser under test hands back (node names,
//! property values) is pushed through a [`RegionVerifier`]. A verifier
//! reads every byte of the region so that runtime instrumentation gets a
//! chance to flag it, and asserts on anything it can prove is wrong.
//! There is no recovery path: a failed check panics, and under libFuzzer a
//! panic aborts the process, which is the signal the fuzzing engine records.
//!
//! # Backends
//!
//! - **Plain read** (`plain`): null check plus a volatile read of each byte.
//! - **Sanitizer** (`sanitizer`): ASan/MSan interface calls, selected with the
//!   `asan` / `msan` cargo features; plain read otherwise.
//! - **Shadow** (`shadow`): in-process registry of addressable regions with an
//!   initialized-byte bitmap. Needs no sanitizer toolchain.
//! - **Configuration** (`config`): `FDTFUZZ_VERIFIER` backend selection.
//! - **Metrics** (`metrics`): advisory atomic counters.

pub mod config;
pub mod metrics;
pub mod plain;
pub mod region;
pub mod sanitizer;
pub mod shadow;

pub use config::{ConfiguredVerifier, VerifierKind, verifier_kind};
pub use metrics::{VerifierMetrics, global_metrics};
pub use plain::PlainReadVerifier;
pub use region::{MemRegion, RegionVerifier};
pub use sanitizer::SanitizerVerifier;
pub use shadow::ShadowVerifier;
