//! Memory-checked traversal of a parsed device tree.
//!
//! The driver asks the parser to validate a blob, then walks every node
//! depth-first from the root. Per node, in this order:
//!
//! 1. the name buffer goes through the [`RegionVerifier`],
//! 2. a non-zero phandle must resolve back to the node,
//! 3. every property value goes through the verifier,
//! 4. each child is walked the same way.
//!
//! Inputs the parser rejects are skipped with status 0. Defects panic.
//!
//! [`RegionVerifier`]: fdtfuzz_membrane::RegionVerifier

mod driver;
mod tree;
mod walker;

pub use driver::{
    MIN_BLOB_SIZE, RunReport, SkipReason, fuzz_one_input, run, run_input, run_with_report,
};
pub use tree::DeviceTree;
pub use walker::{WalkStats, Walker};
