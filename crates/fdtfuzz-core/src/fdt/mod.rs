//! Flattened Device Tree (FDT / DTB) reading.
//!
//! A read-only, offset-based reader for devicetree blobs, shaped after the
//! libfdt read API: nodes and properties are addressed by their byte offset
//! inside the structure block, and every accessor returns `None` instead of
//! failing when the blob does not cooperate.
//!
//! # Design Principles
//!
//! 1. **Validate once**: [`Fdt::check_full`] walks the whole structure block.
//!    Accessors that hand out value regions trust that walk, exactly like
//!    libfdt's fast paths; a hole in validation shows up as a bad region.
//! 2. **Never panic on input**: every other read is bounds-checked.
//! 3. **Borrow, never copy**: an [`Fdt`] is a view over the caller's bytes.
//!
//! # Supported Versions
//!
//! Blob versions 16 and 17 (`last_comp_version <= 17`). Version 16 blobs
//! have no `size_dt_struct`; the structure block is assumed to run to the
//! end of the blob.

pub mod builder;
pub mod check;
pub mod header;
pub mod reader;
pub mod token;

pub use builder::BlobBuilder;
pub use header::FdtHeader;
pub use reader::{Fdt, RawProperty};
pub use token::Tag;

/// Blob magic, big-endian at offset 0.
pub const FDT_MAGIC: u32 = 0xd00d_feed;

/// Header size of a version 16 blob.
pub const FDT_V16_SIZE: usize = 36;

/// Header size of a version 17 blob. Nothing shorter is worth fuzzing.
pub const FDT_V17_SIZE: usize = 40;

/// Oldest version this reader accepts.
pub const FDT_FIRST_SUPPORTED_VERSION: u32 = 16;

/// Newest version this reader understands.
pub const FDT_LAST_SUPPORTED_VERSION: u32 = 17;

/// Structure block tokens are aligned to this many bytes.
pub const FDT_TAGSIZE: usize = 4;

/// Nesting limit enforced by [`Fdt::check_full`].
pub const MAX_TREE_DEPTH: usize = 64;

/// Value of a phandle property that never resolves.
pub const PHANDLE_INVALID: u32 = u32::MAX;

/// Property names carrying a node's phandle, in lookup order.
pub const PHANDLE_PROPERTY_NAMES: [&[u8]; 2] = [b"phandle", b"linux,phandle"];

/// Offset of a node's BEGIN_NODE token inside the structure block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeOffset(pub usize);

impl NodeOffset {
    /// The root node always sits at structure offset 0.
    pub const ROOT: Self = Self(0);
}

/// Offset of a PROP token inside the structure block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PropOffset(pub usize);

/// Error type for FDT validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FdtError {
    /// Blob does not start with `FDT_MAGIC`
    BadMagic(u32),
    /// Version outside the supported window
    BadVersion { version: u32, last_comp_version: u32 },
    /// Buffer shorter than the header or `totalsize` claims
    Truncated { needed: usize, available: usize },
    /// A header block offset/size is misaligned or outside `totalsize`
    BadLayout { block: &'static str, offset: u32 },
    /// Malformed token stream in the structure block
    BadStructure { offset: usize },
    /// Property name offset not resolving inside the strings block
    BadString { offset: u32 },
    /// Node nesting exceeds `MAX_TREE_DEPTH`
    TooDeep { offset: usize },
    /// A phandle property carries the reserved `0xffffffff` value
    BadPhandle { node: usize },
    /// Two nodes declare the same phandle
    DuplicatePhandle { phandle: u32, first: usize, second: usize },
}

impl core::fmt::Display for FdtError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::BadMagic(m) => write!(f, "bad FDT magic: {m:#010x}"),
            Self::BadVersion {
                version,
                last_comp_version,
            } => write!(
                f,
                "unsupported FDT version {version} (last compatible {last_comp_version})"
            ),
            Self::Truncated { needed, available } => {
                write!(f, "blob truncated: need {needed}, have {available}")
            }
            Self::BadLayout { block, offset } => {
                write!(f, "bad {block} block at offset {offset:#x}")
            }
            Self::BadStructure { offset } => {
                write!(f, "malformed structure block at offset {offset:#x}")
            }
            Self::BadString { offset } => write!(f, "bad string offset: {offset:#x}"),
            Self::TooDeep { offset } => {
                write!(f, "tree deeper than {MAX_TREE_DEPTH} at offset {offset:#x}")
            }
            Self::BadPhandle { node } => write!(f, "invalid phandle on node {node:#x}"),
            Self::DuplicatePhandle {
                phandle,
                first,
                second,
            } => write!(
                f,
                "phandle {phandle:#x} declared by nodes {first:#x} and {second:#x}"
            ),
        }
    }
}

impl std::error::Error for FdtError {}

/// Result type for FDT operations.
pub type FdtResult<T> = Result<T, FdtError>;

/// Read a big-endian u32 at `offset`, if the bytes are there.
pub(crate) fn be32_at(bytes: &[u8], offset: usize) -> Option<u32> {
    let end = offset.checked_add(4)?;
    let raw: [u8; 4] = bytes.get(offset..end)?.try_into().ok()?;
    Some(u32::from_be_bytes(raw))
}

/// Bytes of the NUL-terminated string at `offset`, without the terminator.
pub(crate) fn cstr_at(bytes: &[u8], offset: usize) -> Option<&[u8]> {
    let tail = bytes.get(offset..)?;
    let nul = tail.iter().position(|&b| b == 0)?;
    Some(&tail[..nul])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fdt_magic() {
        assert_eq!(FDT_MAGIC.to_be_bytes(), [0xd0, 0x0d, 0xfe, 0xed]);
    }

    #[test]
    fn test_error_display() {
        let err = FdtError::BadMagic(0x7f45_4c46);
        assert_eq!(format!("{err}"), "bad FDT magic: 0x7f454c46");

        let err = FdtError::DuplicatePhandle {
            phandle: 5,
            first: 0,
            second: 0x40,
        };
        assert_eq!(
            format!("{err}"),
            "phandle 0x5 declared by nodes 0x0 and 0x40"
        );
    }

    #[test]
    fn be32_reads_are_bounds_checked() {
        let bytes = [0, 0, 0, 9, 1];
        assert_eq!(be32_at(&bytes, 0), Some(9));
        assert_eq!(be32_at(&bytes, 2), None);
        assert_eq!(be32_at(&bytes, usize::MAX), None);
    }

    #[test]
    fn cstr_requires_terminator() {
        assert_eq!(cstr_at(b"abc\0def", 0), Some(&b"abc"[..]));
        assert_eq!(cstr_at(b"abc\0def", 4), None);
        assert_eq!(cstr_at(b"\0", 0), Some(&b""[..]));
        assert_eq!(cstr_at(b"abc", 10), None);
    }
}
