//! Offset-based read accessors.

use fdtfuzz_membrane::MemRegion;

use super::check::check_full;
use super::token::{PROP_HEADER_SIZE, next_tag};
use super::{
    FDT_TAGSIZE, FdtHeader, FdtResult, NodeOffset, PHANDLE_INVALID, PHANDLE_PROPERTY_NAMES,
    PropOffset, Tag, be32_at, cstr_at,
};

/// A property record as stored in the structure block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawProperty {
    /// Offset of the name inside the strings block
    pub name_offset: u32,
    /// Value bytes at the declared length
    pub value: MemRegion,
}

/// Read-only view over a devicetree blob.
///
/// Construction only decodes the header (leniently); nothing is validated
/// until [`Fdt::check_full`] runs. Accessors never panic, valid blob or not.
#[derive(Debug, Clone, Copy)]
pub struct Fdt<'a> {
    blob: &'a [u8],
    header: Option<FdtHeader>,
    structure: &'a [u8],
    strings: &'a [u8],
}

fn span(blob: &[u8], (offset, size): (usize, usize)) -> &[u8] {
    offset
        .checked_add(size)
        .and_then(|end| blob.get(offset..end))
        .unwrap_or(&[])
}

impl<'a> Fdt<'a> {
    /// Wrap `blob` without copying it.
    #[must_use]
    pub fn new(blob: &'a [u8]) -> Self {
        let header = FdtHeader::parse(blob).ok();
        let (structure, strings) = match &header {
            Some(h) => (span(blob, h.struct_span()), span(blob, h.strings_span())),
            None => (&[][..], &[][..]),
        };
        Self {
            blob,
            header,
            structure,
            strings,
        }
    }

    /// The underlying bytes.
    #[must_use]
    pub fn blob(&self) -> &'a [u8] {
        self.blob
    }

    /// Decoded header, if the magic number was right.
    #[must_use]
    pub fn header(&self) -> Option<&FdtHeader> {
        self.header.as_ref()
    }

    /// Full structural validation: header, token stream, strings, phandles.
    ///
    /// # Errors
    ///
    /// Returns the first structural defect found.
    pub fn check_full(&self) -> FdtResult<()> {
        check_full(self.blob)
    }

    fn node_body(&self, node: NodeOffset) -> Option<usize> {
        match next_tag(self.structure, node.0)? {
            (Tag::BeginNode, next) => Some(next),
            _ => None,
        }
    }

    /// Root node, if the structure block starts with one.
    #[must_use]
    pub fn root(&self) -> Option<NodeOffset> {
        self.node_body(NodeOffset::ROOT).map(|_| NodeOffset::ROOT)
    }

    /// Node name bytes, without the terminator. Empty for the root.
    #[must_use]
    pub fn name_bytes(&self, node: NodeOffset) -> Option<&'a [u8]> {
        self.node_body(node)?;
        cstr_at(self.structure, node.0 + FDT_TAGSIZE)
    }

    /// Node name as a region.
    #[must_use]
    pub fn get_name(&self, node: NodeOffset) -> Option<MemRegion> {
        self.name_bytes(node).map(MemRegion::from_slice)
    }

    fn scan_property(&self, mut offset: usize) -> Option<PropOffset> {
        loop {
            let (tag, next) = next_tag(self.structure, offset)?;
            match tag {
                Tag::Prop => return Some(PropOffset(offset)),
                Tag::Nop => offset = next,
                _ => return None,
            }
        }
    }

    /// First property of `node`.
    #[must_use]
    pub fn first_property_offset(&self, node: NodeOffset) -> Option<PropOffset> {
        let body = self.node_body(node)?;
        self.scan_property(body)
    }

    /// Property following `prop` on the same node.
    #[must_use]
    pub fn next_property_offset(&self, prop: PropOffset) -> Option<PropOffset> {
        match next_tag(self.structure, prop.0)? {
            (Tag::Prop, next) => self.scan_property(next),
            _ => None,
        }
    }

    /// All properties of `node`, in blob order.
    pub fn properties(&self, node: NodeOffset) -> impl Iterator<Item = PropOffset> + '_ {
        std::iter::successors(self.first_property_offset(node), move |&prop| {
            self.next_property_offset(prop)
        })
    }

    /// Decode the PROP record at `prop`.
    ///
    /// The value region is built from the declared length without checking
    /// it against the structure block: after [`Self::check_full`] it is in
    /// range by construction, the same trust libfdt places in a validated
    /// blob. A validation gap therefore shows up as an out-of-range region.
    #[must_use]
    pub fn property_by_offset(&self, prop: PropOffset) -> Option<RawProperty> {
        if prop.0 % FDT_TAGSIZE != 0 || be32_at(self.structure, prop.0)? != Tag::Prop.to_u32() {
            return None;
        }
        let len = be32_at(self.structure, prop.0 + 4)?;
        let name_offset = be32_at(self.structure, prop.0 + 8)?;
        let value = self
            .structure
            .as_ptr()
            .wrapping_add(prop.0 + PROP_HEADER_SIZE);
        Some(RawProperty {
            name_offset,
            value: MemRegion::from_raw_parts(value, len as usize),
        })
    }

    /// String at `offset` in the strings block.
    #[must_use]
    pub fn string(&self, offset: u32) -> Option<&'a [u8]> {
        cstr_at(self.strings, offset as usize)
    }

    /// Name of the property at `prop`.
    #[must_use]
    pub fn property_name(&self, prop: PropOffset) -> Option<&'a [u8]> {
        self.string(self.property_by_offset(prop)?.name_offset)
    }

    /// Bounds-checked value bytes of the property at `prop`.
    #[must_use]
    pub fn property_value(&self, prop: PropOffset) -> Option<&'a [u8]> {
        let len = be32_at(self.structure, prop.0.checked_add(4)?)? as usize;
        let start = prop.0.checked_add(PROP_HEADER_SIZE)?;
        self.structure.get(start..start.checked_add(len)?)
    }

    /// Value of the first property of `node` called `name`.
    #[must_use]
    pub fn get_property(&self, node: NodeOffset, name: &[u8]) -> Option<&'a [u8]> {
        self.properties(node)
            .find(|&prop| self.property_name(prop) == Some(name))
            .and_then(|prop| self.property_value(prop))
    }

    /// Phandle of `node`, or 0 when it has none.
    ///
    /// `phandle` wins over `linux,phandle`; only a 4-byte value counts.
    #[must_use]
    pub fn get_phandle(&self, node: NodeOffset) -> u32 {
        PHANDLE_PROPERTY_NAMES
            .iter()
            .filter_map(|name| self.get_property(node, name))
            .find_map(|value| <[u8; 4]>::try_from(value).ok())
            .map_or(0, u32::from_be_bytes)
    }

    /// Next node in document order after `node`.
    ///
    /// With `depth`, the counter is adjusted for every node entered and left,
    /// and iteration stops once it would go negative (the end of the subtree
    /// `node` was reached from).
    pub fn next_node(&self, node: NodeOffset, mut depth: Option<&mut isize>) -> Option<NodeOffset> {
        let mut offset = self.node_body(node)?;
        loop {
            let (tag, next) = next_tag(self.structure, offset)?;
            match tag {
                Tag::Prop | Tag::Nop => {}
                Tag::BeginNode => {
                    if let Some(d) = depth.as_deref_mut() {
                        *d += 1;
                    }
                    return Some(NodeOffset(offset));
                }
                Tag::EndNode => {
                    if let Some(d) = depth.as_deref_mut() {
                        *d -= 1;
                        if *d < 0 {
                            return None;
                        }
                    }
                }
                Tag::End => return None,
            }
            offset = next;
        }
    }

    /// First direct child of `node`.
    #[must_use]
    pub fn first_subnode(&self, node: NodeOffset) -> Option<NodeOffset> {
        let mut depth = 0;
        let child = self.next_node(node, Some(&mut depth))?;
        (depth == 1).then_some(child)
    }

    /// Next sibling of `node`.
    #[must_use]
    pub fn next_subnode(&self, node: NodeOffset) -> Option<NodeOffset> {
        let mut depth = 1;
        let mut current = node;
        loop {
            current = self.next_node(current, Some(&mut depth))?;
            if depth < 1 {
                return None;
            }
            if depth == 1 {
                return Some(current);
            }
        }
    }

    /// Every node in document order, starting at the root.
    pub fn nodes(&self) -> impl Iterator<Item = NodeOffset> + '_ {
        std::iter::successors(self.root(), move |&node| self.next_node(node, None))
    }

    /// First node in document order whose phandle is `phandle`.
    ///
    /// 0 and `0xffffffff` never resolve.
    #[must_use]
    pub fn node_offset_by_phandle(&self, phandle: u32) -> Option<NodeOffset> {
        if phandle == 0 || phandle == PHANDLE_INVALID {
            return None;
        }
        self.nodes().find(|&node| self.get_phandle(node) == phandle)
    }

    /// Nesting depth of `node` (root = 0), found by walking from the root.
    #[must_use]
    pub fn node_depth(&self, node: NodeOffset) -> Option<usize> {
        let mut depth: isize = 0;
        let mut current = self.root()?;
        loop {
            if current == node {
                return usize::try_from(depth).ok();
            }
            if current > node {
                return None;
            }
            current = self.next_node(current, Some(&mut depth))?;
        }
    }
}
