//! Raw blob writer.
//!
//! Emits tokens exactly as told, with no nesting or naming rules, so it can
//! produce malformed blobs as easily as well-formed ones. Header fields can
//! be overridden after layout via [`BlobBuilder::finish_with`].

use super::{FDT_MAGIC, FDT_V17_SIZE, FdtHeader, Tag};

/// Token-level FDT writer.
#[derive(Debug, Default, Clone)]
pub struct BlobBuilder {
    structure: Vec<u8>,
    strings: Vec<u8>,
}

impl BlobBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn word(&mut self, w: u32) -> &mut Self {
        self.structure.extend_from_slice(&w.to_be_bytes());
        self
    }

    fn pad(&mut self) {
        while self.structure.len() % 4 != 0 {
            self.structure.push(0);
        }
    }

    /// Append a raw token word.
    pub fn token(&mut self, tag: Tag) -> &mut Self {
        self.word(tag.to_u32())
    }

    /// BEGIN_NODE followed by the NUL-terminated, padded name.
    pub fn begin_node(&mut self, name: &str) -> &mut Self {
        self.token(Tag::BeginNode);
        self.structure.extend_from_slice(name.as_bytes());
        self.structure.push(0);
        self.pad();
        self
    }

    pub fn end_node(&mut self) -> &mut Self {
        self.token(Tag::EndNode)
    }

    pub fn nop(&mut self) -> &mut Self {
        self.token(Tag::Nop)
    }

    pub fn end(&mut self) -> &mut Self {
        self.token(Tag::End)
    }

    /// Intern `name` in the strings block and return its offset.
    pub fn string(&mut self, name: &str) -> u32 {
        let needle: Vec<u8> = name.bytes().chain([0]).collect();
        if let Some(pos) = self
            .strings
            .windows(needle.len())
            .position(|w| w == needle.as_slice())
        {
            return pos as u32;
        }
        let offset = self.strings.len() as u32;
        self.strings.extend_from_slice(&needle);
        offset
    }

    /// PROP with an interned name.
    pub fn prop(&mut self, name: &str, value: &[u8]) -> &mut Self {
        let nameoff = self.string(name);
        self.prop_raw(value.len() as u32, nameoff, value)
    }

    /// PROP with caller-chosen `len` and `nameoff`; `value` is written as-is.
    pub fn prop_raw(&mut self, len: u32, nameoff: u32, value: &[u8]) -> &mut Self {
        self.token(Tag::Prop);
        self.word(len).word(nameoff);
        self.structure.extend_from_slice(value);
        self.pad();
        self
    }

    /// `phandle` property.
    pub fn phandle(&mut self, value: u32) -> &mut Self {
        self.prop("phandle", &value.to_be_bytes())
    }

    /// Lay out header, empty reservation map, structure and strings.
    #[must_use]
    pub fn finish(&self) -> Vec<u8> {
        self.finish_with(|_| {})
    }

    /// As [`Self::finish`], letting `tweak` edit the header before encoding.
    #[must_use]
    pub fn finish_with(&self, tweak: impl FnOnce(&mut FdtHeader)) -> Vec<u8> {
        let off_mem_rsvmap = FDT_V17_SIZE;
        let off_dt_struct = off_mem_rsvmap + 16;
        let off_dt_strings = off_dt_struct + self.structure.len();
        let totalsize = off_dt_strings + self.strings.len();

        let mut header = FdtHeader {
            magic: FDT_MAGIC,
            totalsize: totalsize as u32,
            off_dt_struct: off_dt_struct as u32,
            off_dt_strings: off_dt_strings as u32,
            off_mem_rsvmap: off_mem_rsvmap as u32,
            version: 17,
            last_comp_version: 16,
            boot_cpuid_phys: 0,
            size_dt_strings: self.strings.len() as u32,
            size_dt_struct: self.structure.len() as u32,
        };
        tweak(&mut header);

        let mut blob = Vec::with_capacity(totalsize);
        for w in [
            header.magic,
            header.totalsize,
            header.off_dt_struct,
            header.off_dt_strings,
            header.off_mem_rsvmap,
            header.version,
            header.last_comp_version,
            header.boot_cpuid_phys,
            header.size_dt_strings,
            header.size_dt_struct,
        ] {
            blob.extend_from_slice(&w.to_be_bytes());
        }
        blob.extend_from_slice(&[0u8; 16]);
        blob.extend_from_slice(&self.structure);
        blob.extend_from_slice(&self.strings);
        blob
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strings_are_interned() {
        let mut b = BlobBuilder::new();
        assert_eq!(b.string("compatible"), 0);
        assert_eq!(b.string("reg"), 11);
        assert_eq!(b.string("compatible"), 0);
    }

    #[test]
    fn minimal_blob_layout() {
        let blob = BlobBuilder::new()
            .begin_node("")
            .end_node()
            .end()
            .finish();
        assert_eq!(blob.len(), 72);
        let header = FdtHeader::parse_validated(&blob).unwrap();
        assert_eq!(header.struct_span(), (56, 16));
    }

    #[test]
    fn header_tweak_applies() {
        let blob = BlobBuilder::new()
            .begin_node("")
            .end_node()
            .end()
            .finish_with(|h| h.magic = 0);
        assert_eq!(&blob[..4], &[0, 0, 0, 0]);
    }
}
