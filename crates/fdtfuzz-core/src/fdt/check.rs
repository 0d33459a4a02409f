//! Whole-blob structural validation.
//!
//! One forward pass over the structure block. Everything the read accessors
//! later trust is established here: a single root at offset 0, balanced
//! nodes no deeper than [`MAX_TREE_DEPTH`], properties only inside nodes,
//! resolvable property names, and unique, valid phandles.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use super::token::{PROP_HEADER_SIZE, next_tag};
use super::{
    FdtError, FdtHeader, FdtResult, MAX_TREE_DEPTH, PHANDLE_INVALID, PHANDLE_PROPERTY_NAMES,
    Tag, be32_at, cstr_at,
};

/// Validate the header and the full structure block of `blob`.
///
/// Bytes after the END token but inside the structure block are ignored.
///
/// # Errors
///
/// Returns the first defect found, in blob order.
pub fn check_full(blob: &[u8]) -> FdtResult<()> {
    let header = FdtHeader::parse_validated(blob)?;
    let structure = block(blob, header.struct_span(), "structure", header.off_dt_struct)?;
    let strings = block(blob, header.strings_span(), "strings", header.off_dt_strings)?;
    StructureCheck::new(structure, strings).run()
}

fn block<'a>(
    blob: &'a [u8],
    (offset, size): (usize, usize),
    name: &'static str,
    raw_offset: u32,
) -> FdtResult<&'a [u8]> {
    offset
        .checked_add(size)
        .and_then(|end| blob.get(offset..end))
        .ok_or(FdtError::BadLayout {
            block: name,
            offset: raw_offset,
        })
}

struct StructureCheck<'a> {
    structure: &'a [u8],
    strings: &'a [u8],
    /// BEGIN_NODE offsets of the currently open nodes
    open: Vec<usize>,
    root_closed: bool,
    /// phandle -> declaring node
    phandles: BTreeMap<u32, usize>,
}

impl<'a> StructureCheck<'a> {
    fn new(structure: &'a [u8], strings: &'a [u8]) -> Self {
        Self {
            structure,
            strings,
            open: Vec::new(),
            root_closed: false,
            phandles: BTreeMap::new(),
        }
    }

    fn run(mut self) -> FdtResult<()> {
        let mut offset = 0;
        loop {
            let (tag, next) =
                next_tag(self.structure, offset).ok_or(FdtError::BadStructure { offset })?;
            if offset == 0 && tag != Tag::BeginNode {
                return Err(FdtError::BadStructure { offset });
            }
            match tag {
                Tag::BeginNode => {
                    if self.root_closed {
                        return Err(FdtError::BadStructure { offset });
                    }
                    self.open.push(offset);
                    if self.open.len() > MAX_TREE_DEPTH {
                        return Err(FdtError::TooDeep { offset });
                    }
                }
                Tag::EndNode => {
                    self.open.pop().ok_or(FdtError::BadStructure { offset })?;
                    self.root_closed = self.open.is_empty();
                }
                Tag::Prop => self.check_prop(offset)?,
                Tag::Nop => {}
                Tag::End => {
                    return if self.root_closed {
                        Ok(())
                    } else {
                        Err(FdtError::BadStructure { offset })
                    };
                }
            }
            offset = next;
        }
    }

    fn check_prop(&mut self, offset: usize) -> FdtResult<()> {
        let bad = FdtError::BadStructure { offset };
        let Some(&owner) = self.open.last() else {
            return Err(bad);
        };
        let len = be32_at(self.structure, offset + 4).ok_or(bad.clone())?;
        let nameoff = be32_at(self.structure, offset + 8).ok_or(bad.clone())?;
        let name = cstr_at(self.strings, nameoff as usize)
            .ok_or(FdtError::BadString { offset: nameoff })?;

        if len == 4 && PHANDLE_PROPERTY_NAMES.iter().any(|n| *n == name) {
            let value = be32_at(self.structure, offset + PROP_HEADER_SIZE).ok_or(bad)?;
            self.record_phandle(value, owner)?;
        }
        Ok(())
    }

    fn record_phandle(&mut self, phandle: u32, node: usize) -> FdtResult<()> {
        if phandle == PHANDLE_INVALID {
            return Err(FdtError::BadPhandle { node });
        }
        if phandle == 0 {
            return Ok(());
        }
        match self.phandles.entry(phandle) {
            Entry::Vacant(slot) => {
                slot.insert(node);
                Ok(())
            }
            Entry::Occupied(slot) if *slot.get() != node => Err(FdtError::DuplicatePhandle {
                phandle,
                first: *slot.get(),
                second: node,
            }),
            Entry::Occupied(_) => Ok(()),
        }
    }
}
