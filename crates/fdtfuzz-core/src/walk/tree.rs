//! The parser surface the walker consumes.

use core::fmt::Debug;

use fdtfuzz_membrane::MemRegion;

use crate::fdt::{Fdt, FdtResult, NodeOffset, PropOffset};

/// Read-only view of a parsed device tree.
///
/// Handles are opaque to the walker; it only compares nodes for identity
/// and passes them back. Enumeration methods return `None` at the end of
/// a list.
pub trait DeviceTree {
    type Node: Copy + Eq + Debug;
    type Property: Copy + Debug;

    /// Size of the input blob in bytes.
    fn blob_len(&self) -> usize;

    /// Full structural validation of the blob.
    ///
    /// # Errors
    ///
    /// The reason the blob is not a well-formed tree.
    fn structural_validate(&self) -> FdtResult<()>;

    /// Where the walk starts.
    fn root(&self) -> Self::Node;

    fn first_child(&self, node: Self::Node) -> Option<Self::Node>;
    fn next_sibling(&self, node: Self::Node) -> Option<Self::Node>;

    fn first_property(&self, node: Self::Node) -> Option<Self::Property>;
    fn next_property(&self, prop: Self::Property) -> Option<Self::Property>;

    /// Value buffer at its declared length. The length is untrusted.
    fn property_value(&self, prop: Self::Property) -> Option<MemRegion>;

    fn node_name(&self, node: Self::Node) -> Option<MemRegion>;

    /// 0 when the node has no phandle.
    fn node_phandle(&self, node: Self::Node) -> u32;

    fn node_by_phandle(&self, phandle: u32) -> Option<Self::Node>;
}

impl DeviceTree for Fdt<'_> {
    type Node = NodeOffset;
    type Property = PropOffset;

    fn blob_len(&self) -> usize {
        self.blob().len()
    }

    fn structural_validate(&self) -> FdtResult<()> {
        self.check_full()
    }

    fn root(&self) -> NodeOffset {
        NodeOffset::ROOT
    }

    fn first_child(&self, node: NodeOffset) -> Option<NodeOffset> {
        self.first_subnode(node)
    }

    fn next_sibling(&self, node: NodeOffset) -> Option<NodeOffset> {
        self.next_subnode(node)
    }

    fn first_property(&self, node: NodeOffset) -> Option<PropOffset> {
        self.first_property_offset(node)
    }

    fn next_property(&self, prop: PropOffset) -> Option<PropOffset> {
        self.next_property_offset(prop)
    }

    fn property_value(&self, prop: PropOffset) -> Option<MemRegion> {
        self.property_by_offset(prop).map(|p| p.value)
    }

    fn node_name(&self, node: NodeOffset) -> Option<MemRegion> {
        self.get_name(node)
    }

    fn node_phandle(&self, node: NodeOffset) -> u32 {
        self.get_phandle(node)
    }

    fn node_by_phandle(&self, phandle: u32) -> Option<NodeOffset> {
        self.node_offset_by_phandle(phandle)
    }
}
