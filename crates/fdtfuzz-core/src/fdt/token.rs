//! Structure block token stream.
//!
//! Offsets here are relative to the start of the structure block, the same
//! convention libfdt uses for node and property offsets.

use super::{FDT_TAGSIZE, be32_at};

const FDT_BEGIN_NODE: u32 = 0x1;
const FDT_END_NODE: u32 = 0x2;
const FDT_PROP: u32 = 0x3;
const FDT_NOP: u32 = 0x4;
const FDT_END: u32 = 0x9;

/// Size of the fixed part of a PROP record: token, len, nameoff.
pub(crate) const PROP_HEADER_SIZE: usize = 12;

/// Structure block token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    /// Start of a node; followed by its NUL-terminated name
    BeginNode,
    /// End of the innermost open node
    EndNode,
    /// Property record: len, nameoff, value bytes
    Prop,
    /// Ignored filler
    Nop,
    /// End of the structure block
    End,
}

impl Tag {
    /// Raw token value as stored in the blob.
    #[must_use]
    pub const fn to_u32(self) -> u32 {
        match self {
            Self::BeginNode => FDT_BEGIN_NODE,
            Self::EndNode => FDT_END_NODE,
            Self::Prop => FDT_PROP,
            Self::Nop => FDT_NOP,
            Self::End => FDT_END,
        }
    }
}

impl TryFrom<u32> for Tag {
    type Error = u32;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            FDT_BEGIN_NODE => Ok(Self::BeginNode),
            FDT_END_NODE => Ok(Self::EndNode),
            FDT_PROP => Ok(Self::Prop),
            FDT_NOP => Ok(Self::Nop),
            FDT_END => Ok(Self::End),
            other => Err(other),
        }
    }
}

/// Round `offset` up to the next tag boundary.
pub(crate) fn tag_align(offset: usize) -> Option<usize> {
    offset
        .checked_add(FDT_TAGSIZE - 1)
        .map(|v| v & !(FDT_TAGSIZE - 1))
}

/// Decode the token at `offset` and return it with the offset of the next one.
///
/// Returns `None` for misaligned offsets, unknown tokens, node names without
/// a terminator, and records that run past the end of `block`.
pub(crate) fn next_tag(block: &[u8], offset: usize) -> Option<(Tag, usize)> {
    if offset % FDT_TAGSIZE != 0 {
        return None;
    }
    let tag = Tag::try_from(be32_at(block, offset)?).ok()?;
    let mut next = offset + FDT_TAGSIZE;

    match tag {
        Tag::BeginNode => {
            let name = block.get(next..)?;
            let nul = name.iter().position(|&b| b == 0)?;
            next += nul + 1;
        }
        Tag::Prop => {
            let len = be32_at(block, next)? as usize;
            next = next.checked_add(PROP_HEADER_SIZE - FDT_TAGSIZE)?.checked_add(len)?;
        }
        Tag::EndNode | Tag::Nop | Tag::End => {}
    }

    let next = tag_align(next)?;
    (next <= block.len()).then_some((tag, next))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(ws: &[u32]) -> Vec<u8> {
        ws.iter().flat_map(|w| w.to_be_bytes()).collect()
    }

    #[test]
    fn test_tag_conversion() {
        for tag in [Tag::BeginNode, Tag::EndNode, Tag::Prop, Tag::Nop, Tag::End] {
            assert_eq!(Tag::try_from(tag.to_u32()), Ok(tag));
        }
        assert_eq!(Tag::try_from(0x5), Err(0x5));
    }

    #[test]
    fn test_tag_align() {
        assert_eq!(tag_align(0), Some(0));
        assert_eq!(tag_align(5), Some(8));
        assert_eq!(tag_align(8), Some(8));
        assert_eq!(tag_align(usize::MAX), None);
    }

    #[test]
    fn begin_node_skips_padded_name() {
        let mut block = words(&[1]);
        block.extend_from_slice(b"cpus\0\0\0\0");
        block.extend_from_slice(&words(&[2]));
        assert_eq!(next_tag(&block, 0), Some((Tag::BeginNode, 12)));
        assert_eq!(next_tag(&block, 12), Some((Tag::EndNode, 16)));
    }

    #[test]
    fn prop_skips_value() {
        let mut block = words(&[3, 5, 0]);
        block.extend_from_slice(b"hello\0\0\0");
        assert_eq!(next_tag(&block, 0), Some((Tag::Prop, 20)));
    }

    #[test]
    fn prop_value_past_block_is_rejected() {
        let block = words(&[3, 64, 0]);
        assert_eq!(next_tag(&block, 0), None);
    }

    #[test]
    fn huge_prop_length_does_not_overflow() {
        let block = words(&[3, u32::MAX, 0]);
        assert_eq!(next_tag(&block, 0), None);
    }

    #[test]
    fn unterminated_name_is_rejected() {
        let mut block = words(&[1]);
        block.extend_from_slice(b"abcd");
        assert_eq!(next_tag(&block, 0), None);
    }

    #[test]
    fn unknown_and_misaligned_tokens_rejected() {
        let block = words(&[7, 9]);
        assert_eq!(next_tag(&block, 0), None);
        assert_eq!(next_tag(&block, 2), None);
        assert_eq!(next_tag(&block, 4), Some((Tag::End, 8)));
        assert_eq!(next_tag(&block, 8), None);
    }
}
