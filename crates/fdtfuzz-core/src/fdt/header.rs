//! FDT header parsing.
//!
//! The header is the first structure in any devicetree blob. Every field is
//! a big-endian u32; version 17 adds `size_dt_struct` at offset 36.

use super::{
    FDT_FIRST_SUPPORTED_VERSION, FDT_LAST_SUPPORTED_VERSION, FDT_MAGIC, FDT_TAGSIZE,
    FDT_V16_SIZE, FDT_V17_SIZE, FdtError, FdtResult, be32_at,
};

/// Byte offsets of the header fields.
mod field {
    pub const MAGIC: usize = 0;
    pub const TOTALSIZE: usize = 4;
    pub const OFF_DT_STRUCT: usize = 8;
    pub const OFF_DT_STRINGS: usize = 12;
    pub const OFF_MEM_RSVMAP: usize = 16;
    pub const VERSION: usize = 20;
    pub const LAST_COMP_VERSION: usize = 24;
    pub const BOOT_CPUID_PHYS: usize = 28;
    pub const SIZE_DT_STRINGS: usize = 32;
    pub const SIZE_DT_STRUCT: usize = 36;
}

/// Size of one memory reservation entry (address + size, both u64).
const RSVMAP_ENTRY_SIZE: usize = 16;

/// Decoded FDT header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FdtHeader {
    pub magic: u32,
    /// Total blob size including all blocks and padding
    pub totalsize: u32,
    /// Structure block offset
    pub off_dt_struct: u32,
    /// Strings block offset
    pub off_dt_strings: u32,
    /// Memory reservation map offset
    pub off_mem_rsvmap: u32,
    pub version: u32,
    pub last_comp_version: u32,
    pub boot_cpuid_phys: u32,
    /// Strings block size
    pub size_dt_strings: u32,
    /// Structure block size (version 17+ only; 0 otherwise)
    pub size_dt_struct: u32,
}

impl FdtHeader {
    /// Decode the header fields.
    ///
    /// Only the magic number is checked here; use [`Self::validate`] for the
    /// layout checks.
    ///
    /// # Errors
    ///
    /// Returns an error if the buffer is shorter than a v17 header or the
    /// magic number is wrong.
    pub fn parse(data: &[u8]) -> FdtResult<Self> {
        if data.len() < FDT_V17_SIZE {
            return Err(FdtError::Truncated {
                needed: FDT_V17_SIZE,
                available: data.len(),
            });
        }
        let read = |offset| be32_at(data, offset).unwrap_or(0);

        let magic = read(field::MAGIC);
        if magic != FDT_MAGIC {
            return Err(FdtError::BadMagic(magic));
        }
        let version = read(field::VERSION);

        Ok(Self {
            magic,
            totalsize: read(field::TOTALSIZE),
            off_dt_struct: read(field::OFF_DT_STRUCT),
            off_dt_strings: read(field::OFF_DT_STRINGS),
            off_mem_rsvmap: read(field::OFF_MEM_RSVMAP),
            version,
            last_comp_version: read(field::LAST_COMP_VERSION),
            boot_cpuid_phys: read(field::BOOT_CPUID_PHYS),
            size_dt_strings: read(field::SIZE_DT_STRINGS),
            size_dt_struct: if version >= 17 {
                read(field::SIZE_DT_STRUCT)
            } else {
                0
            },
        })
    }

    /// Parse and fully validate the header against `data`.
    ///
    /// # Errors
    ///
    /// Any error from [`Self::parse`] or [`Self::validate`].
    pub fn parse_validated(data: &[u8]) -> FdtResult<Self> {
        let header = Self::parse(data)?;
        header.validate(data)?;
        Ok(header)
    }

    /// Header size for this blob's version.
    #[must_use]
    pub fn header_size(&self) -> usize {
        if self.version >= 17 {
            FDT_V17_SIZE
        } else {
            FDT_V16_SIZE
        }
    }

    /// Structure block as an (offset, size) pair, unchecked.
    #[must_use]
    pub fn struct_span(&self) -> (usize, usize) {
        let offset = self.off_dt_struct as usize;
        let size = if self.version >= 17 {
            self.size_dt_struct as usize
        } else {
            (self.totalsize as usize).saturating_sub(offset)
        };
        (offset, size)
    }

    /// Strings block as an (offset, size) pair, unchecked.
    #[must_use]
    pub fn strings_span(&self) -> (usize, usize) {
        (self.off_dt_strings as usize, self.size_dt_strings as usize)
    }

    /// Check version window, sizes, block placement and the reservation map.
    ///
    /// # Errors
    ///
    /// Returns the first violated constraint.
    pub fn validate(&self, data: &[u8]) -> FdtResult<()> {
        if self.version < FDT_FIRST_SUPPORTED_VERSION
            || self.last_comp_version > FDT_LAST_SUPPORTED_VERSION
            || self.last_comp_version > self.version
        {
            return Err(FdtError::BadVersion {
                version: self.version,
                last_comp_version: self.last_comp_version,
            });
        }

        let totalsize = self.totalsize as usize;
        let hdrsize = self.header_size();
        if totalsize < hdrsize {
            return Err(FdtError::Truncated {
                needed: hdrsize,
                available: totalsize,
            });
        }
        if totalsize > data.len() {
            return Err(FdtError::Truncated {
                needed: totalsize,
                available: data.len(),
            });
        }

        let rsv = self.off_mem_rsvmap as usize;
        if rsv < hdrsize || rsv % 8 != 0 || rsv > totalsize {
            return Err(FdtError::BadLayout {
                block: "memory reservation",
                offset: self.off_mem_rsvmap,
            });
        }

        let (struct_off, struct_size) = self.struct_span();
        if !block_fits(struct_off, struct_size, hdrsize, totalsize)
            || struct_off % FDT_TAGSIZE != 0
        {
            return Err(FdtError::BadLayout {
                block: "structure",
                offset: self.off_dt_struct,
            });
        }

        let (strings_off, strings_size) = self.strings_span();
        if !block_fits(strings_off, strings_size, hdrsize, totalsize) {
            return Err(FdtError::BadLayout {
                block: "strings",
                offset: self.off_dt_strings,
            });
        }

        self.check_rsvmap(&data[..totalsize])
    }

    /// Walk the reservation map until its terminating all-zero entry.
    fn check_rsvmap(&self, blob: &[u8]) -> FdtResult<()> {
        let mut offset = self.off_mem_rsvmap as usize;
        loop {
            let Some(entry) = blob.get(offset..offset + RSVMAP_ENTRY_SIZE) else {
                return Err(FdtError::BadLayout {
                    block: "memory reservation",
                    offset: self.off_mem_rsvmap,
                });
            };
            if entry.iter().all(|&b| b == 0) {
                return Ok(());
            }
            offset += RSVMAP_ENTRY_SIZE;
        }
    }
}

fn block_fits(offset: usize, size: usize, hdrsize: usize, totalsize: usize) -> bool {
    offset >= hdrsize && offset.checked_add(size).is_some_and(|end| end <= totalsize)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Minimal v17 blob: header, empty rsvmap, root node, END, no strings.
    fn make_minimal_blob() -> Vec<u8> {
        let mut blob = Vec::new();
        let words: [u32; 10] = [
            FDT_MAGIC, 72, // magic, totalsize
            56, 72, // off_dt_struct, off_dt_strings
            40, 17, // off_mem_rsvmap, version
            16, 0, // last_comp_version, boot_cpuid_phys
            0, 16, // size_dt_strings, size_dt_struct
        ];
        for w in words {
            blob.extend_from_slice(&w.to_be_bytes());
        }
        blob.extend_from_slice(&[0u8; 16]); // rsvmap terminator
        for w in [1u32, 0, 2, 9] {
            blob.extend_from_slice(&w.to_be_bytes()); // BEGIN_NODE "" END_NODE END
        }
        blob
    }

    #[test]
    fn test_parse_valid_header() {
        let data = make_minimal_blob();
        let header = FdtHeader::parse(&data).unwrap();
        assert_eq!(header.totalsize, 72);
        assert_eq!(header.version, 17);
        assert_eq!(header.struct_span(), (56, 16));
        assert_eq!(header.strings_span(), (72, 0));
        assert_eq!(header.header_size(), FDT_V17_SIZE);
        header.validate(&data).unwrap();
    }

    #[test]
    fn test_invalid_magic() {
        let mut data = make_minimal_blob();
        data[0] = 0x00;
        assert!(matches!(
            FdtHeader::parse(&data),
            Err(FdtError::BadMagic(0x000d_feed))
        ));
    }

    #[test]
    fn test_buffer_too_small() {
        let data = [0u8; 32];
        assert!(matches!(
            FdtHeader::parse(&data),
            Err(FdtError::Truncated {
                needed: 40,
                available: 32
            })
        ));
    }

    #[test]
    fn test_totalsize_beyond_buffer() {
        let data = make_minimal_blob();
        assert!(matches!(
            FdtHeader::parse_validated(&data[..64]),
            Err(FdtError::Truncated {
                needed: 72,
                available: 64
            })
        ));
    }

    #[test]
    fn test_version_window() {
        let mut data = make_minimal_blob();
        data[20..24].copy_from_slice(&3u32.to_be_bytes());
        data[24..28].copy_from_slice(&2u32.to_be_bytes());
        assert!(matches!(
            FdtHeader::parse_validated(&data),
            Err(FdtError::BadVersion { version: 3, .. })
        ));

        let mut data = make_minimal_blob();
        data[24..28].copy_from_slice(&18u32.to_be_bytes());
        assert!(matches!(
            FdtHeader::parse_validated(&data),
            Err(FdtError::BadVersion {
                last_comp_version: 18,
                ..
            })
        ));
    }

    #[test]
    fn test_misaligned_struct_block() {
        let mut data = make_minimal_blob();
        data[8..12].copy_from_slice(&57u32.to_be_bytes());
        data[36..40].copy_from_slice(&15u32.to_be_bytes());
        assert!(matches!(
            FdtHeader::parse_validated(&data),
            Err(FdtError::BadLayout {
                block: "structure",
                ..
            })
        ));
    }

    #[test]
    fn test_strings_block_overflow() {
        let mut data = make_minimal_blob();
        data[32..36].copy_from_slice(&u32::MAX.to_be_bytes());
        assert!(matches!(
            FdtHeader::parse_validated(&data),
            Err(FdtError::BadLayout {
                block: "strings",
                ..
            })
        ));
    }

    #[test]
    fn test_unterminated_rsvmap() {
        let mut data = make_minimal_blob();
        // Point the rsvmap at the structure block: its first entry is non-zero
        // and the scan runs off the end of the blob.
        data[16..20].copy_from_slice(&56u32.to_be_bytes());
        assert!(matches!(
            FdtHeader::parse_validated(&data),
            Err(FdtError::BadLayout {
                block: "memory reservation",
                ..
            })
        ));
    }

    #[test]
    fn test_v16_struct_runs_to_end() {
        let mut data = make_minimal_blob();
        data[20..24].copy_from_slice(&16u32.to_be_bytes());
        let header = FdtHeader::parse_validated(&data).unwrap();
        assert_eq!(header.size_dt_struct, 0);
        assert_eq!(header.struct_span(), (56, 16));
        assert_eq!(header.header_size(), FDT_V16_SIZE);
    }
}
