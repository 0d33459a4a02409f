//! Recursive node/property walk.

use fdtfuzz_membrane::{MemRegion, RegionVerifier};

use super::DeviceTree;

/// Counters for one walk.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WalkStats {
    /// Nodes entered
    pub nodes: u64,
    /// Node names verified
    pub names: u64,
    /// Property values verified
    pub properties: u64,
    /// Properties the parser listed but returned no value for
    pub skipped_properties: u64,
    /// Phandle round-trips checked
    pub phandles: u64,
    /// Total bytes handed to the verifier
    pub bytes: u64,
}

/// Depth-first walker over a [`DeviceTree`].
///
/// Holds no state besides its counters; walking the same tree twice issues
/// the same verifier calls in the same order.
pub struct Walker<'a, T: DeviceTree + ?Sized, V: RegionVerifier + ?Sized> {
    tree: &'a T,
    verifier: &'a V,
    stats: WalkStats,
}

impl<'a, T: DeviceTree + ?Sized, V: RegionVerifier + ?Sized> Walker<'a, T, V> {
    pub fn new(tree: &'a T, verifier: &'a V) -> Self {
        Self {
            tree,
            verifier,
            stats: WalkStats::default(),
        }
    }

    #[must_use]
    pub fn stats(&self) -> WalkStats {
        self.stats
    }

    fn verify(&mut self, region: MemRegion) {
        self.verifier.verify(region);
        self.stats.bytes += region.len() as u64;
    }

    /// Verify `node`'s name, its phandle, its properties, then every child.
    ///
    /// Recursion depth is the tree depth; the parser's validation is what
    /// bounds it.
    pub fn walk(&mut self, node: T::Node) {
        self.stats.nodes += 1;

        if let Some(name) = self.tree.node_name(node) {
            self.verify(name);
            self.stats.names += 1;
        }

        let phandle = self.tree.node_phandle(node);
        if phandle != 0 {
            self.check_phandle(node, phandle);
        }

        self.walk_properties(node);

        let mut child = self.tree.first_child(node);
        while let Some(c) = child {
            self.walk(c);
            child = self.tree.next_sibling(c);
        }
    }

    /// Verify the value of every property on `node`, in parser order.
    ///
    /// A property without a value is skipped and the list continues.
    pub fn walk_properties(&mut self, node: T::Node) {
        let mut prop = self.tree.first_property(node);
        while let Some(p) = prop {
            match self.tree.property_value(p) {
                Some(value) => {
                    self.verify(value);
                    self.stats.properties += 1;
                }
                None => self.stats.skipped_properties += 1,
            }
            prop = self.tree.next_property(p);
        }
    }

    /// Assert that `phandle` resolves to `node` through the reverse index.
    pub fn check_phandle(&mut self, node: T::Node, phandle: u32) {
        let resolved = self.tree.node_by_phandle(phandle);
        assert_eq!(
            resolved,
            Some(node),
            "phandle {phandle:#x} resolves to {resolved:?}, declared by {node:?}"
        );
        self.stats.phandles += 1;
    }
}
