//! # fdtfuzz-core
//!
//! Fuzz driver for a flattened device tree (FDT) parser.
//!
//! - [`fdt`]: offset-based, read-only FDT reader. This is the parser under
//!   test: it validates a blob once and then hands out raw value/name regions
//!   the way libfdt does, trusting its own validation.
//! - [`walk`]: the [`DeviceTree`] interface the driver consumes, the
//!   recursive walker that pushes every name and property value through a
//!   [`fdtfuzz_membrane::RegionVerifier`], the phandle round-trip check, and
//!   the top-level [`run`] entry point.
//!
//! No `unsafe` code is permitted at the crate level.

#![deny(unsafe_code)]

pub mod fdt;
pub mod walk;

pub use fdt::{Fdt, FdtError, FdtHeader, FdtResult, NodeOffset, PropOffset};
pub use walk::{
    DeviceTree, MIN_BLOB_SIZE, RunReport, SkipReason, WalkStats, Walker, fuzz_one_input, run,
    run_input, run_with_report,
};
