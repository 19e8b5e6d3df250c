//! Archive header (§3.2).
//!
//! Deriving the field widths the same way `obj::header` does: magic4 +
//! version2 + flags2 + member_count4 + symbol_index_offset4 +
//! symbol_index_size4 + member_table_offset4 + string_table_offset4 +
//! string_table_size4 + creation_timestamp4 + header_checksum4 +
//! reserved24 = 64, matching the header's stated size exactly once
//! `creation_timestamp` is a `u32` rather than a `u64`.

use bitflags::bitflags;

use crate::error::{Error, ErrorContext, Result};
use crate::io::{crc32, ByteReader, ByteWriter};

/// "STAR" as a little-endian magic number.
pub const MAGIC: u32 = 0x5354_4152;
pub const VERSION: u16 = 1;
/// On-disk size of [`ArchiveHeader`].
pub const HEADER_SIZE: u64 = 64;
pub const MAX_MEMBER_COUNT: u32 = 65535;
pub const MAX_MEMBER_NAME_LEN: usize = 256;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ArchiveFlags: u16 {
        const COMPRESSED    = 0x0001;
        const INDEXED       = 0x0002;
        const SORTED        = 0x0004;
        const LITTLE_ENDIAN = 0x0008;
        const BIG_ENDIAN    = 0x0010;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, typed_builder::TypedBuilder)]
pub struct ArchiveHeader {
    #[builder(default = ArchiveFlags::LITTLE_ENDIAN)]
    pub flags: ArchiveFlags,
    pub member_count: u32,
    #[builder(default = 0)]
    pub symbol_index_offset: u32,
    #[builder(default = 0)]
    pub symbol_index_size: u32,
    #[builder(default = 0)]
    pub member_table_offset: u32,
    #[builder(default = 0)]
    pub string_table_offset: u32,
    #[builder(default = 0)]
    pub string_table_size: u32,
    #[builder(default = 0)]
    pub creation_timestamp: u32,
}

impl ArchiveHeader {
    /// Computes the CRC-32 checksum over the 60 non-checksum bytes of a
    /// serialized header (the checksum field itself held at 0).
    pub fn compute_checksum(serialized: &[u8; HEADER_SIZE as usize]) -> u32 {
        let mut zeroed = *serialized;
        zeroed[44..48].copy_from_slice(&0u32.to_le_bytes());
        crc32(&zeroed)
    }

    pub fn from_reader(r: &ByteReader) -> Result<Self> {
        let magic = r.u32_at(0)?;
        if magic != MAGIC {
            return Err(Error::InvalidMagic {
                found: magic,
                expected: MAGIC,
            });
        }
        let version = r.u16_at(4)?;
        if version != VERSION {
            return Err(Error::UnsupportedVersion {
                found: version,
                expected: VERSION,
            });
        }
        let raw_flags = r.u16_at(6)?;
        let flags = ArchiveFlags::from_bits(raw_flags).ok_or_else(|| Error::CorruptHeader {
            reason: format!("unknown archive flag bits {raw_flags:#06x}"),
            context: ErrorContext::at(6),
        })?;
        if flags.contains(ArchiveFlags::BIG_ENDIAN) {
            return Err(Error::CorruptHeader {
                reason: "big-endian archives are not supported".to_string(),
                context: ErrorContext::at(6),
            });
        }
        let member_count = r.u32_at(8)?;
        if member_count > MAX_MEMBER_COUNT {
            return Err(Error::CorruptHeader {
                reason: format!("member_count {member_count} exceeds {MAX_MEMBER_COUNT}"),
                context: ErrorContext::at(8),
            });
        }
        let symbol_index_offset = r.u32_at(12)?;
        let symbol_index_size = r.u32_at(16)?;
        let member_table_offset = r.u32_at(20)?;
        let string_table_offset = r.u32_at(24)?;
        let string_table_size = r.u32_at(28)?;
        let creation_timestamp = r.u32_at(32)?;
        let header_checksum = r.u32_at(36)?;

        for (name, offset, field_offset) in [
            ("member_table_offset", member_table_offset, 20),
            ("string_table_offset", string_table_offset, 24),
            ("symbol_index_offset", symbol_index_offset, 12),
        ] {
            if offset != 0 && (offset as u64) < HEADER_SIZE {
                return Err(Error::CorruptHeader {
                    reason: format!("{name} {offset} falls inside the header"),
                    context: ErrorContext::at(field_offset),
                });
            }
        }

        let header = Self {
            flags,
            member_count,
            symbol_index_offset,
            symbol_index_size,
            member_table_offset,
            string_table_offset,
            string_table_size,
            creation_timestamp,
        };

        let mut bytes = [0u8; HEADER_SIZE as usize];
        let mut w = ByteWriter::new();
        header.to_writer(&mut w, 0);
        bytes.copy_from_slice(w.as_slice());
        let expected = Self::compute_checksum(&bytes);
        if expected != header_checksum {
            return Err(Error::ChecksumMismatch {
                context: ErrorContext::at(36),
            });
        }

        Ok(header)
    }

    /// Serializes the header with `checksum` written into its field
    /// (pass 0 to compute the checksum over the result first).
    pub fn to_writer(&self, w: &mut ByteWriter, checksum: u32) {
        w.write_u32(MAGIC);
        w.write_u16(VERSION);
        w.write_u16(self.flags.bits());
        w.write_u32(self.member_count);
        w.write_u32(self.symbol_index_offset);
        w.write_u32(self.symbol_index_size);
        w.write_u32(self.member_table_offset);
        w.write_u32(self.string_table_offset);
        w.write_u32(self.string_table_size);
        w.write_u32(self.creation_timestamp);
        w.write_u32(checksum);
        w.write_bytes(&[0u8; 24]);
    }

    /// Serializes the header with its checksum correctly computed.
    pub fn to_writer_checksummed(&self, w: &mut ByteWriter) {
        let mut draft = ByteWriter::new();
        self.to_writer(&mut draft, 0);
        let mut bytes = [0u8; HEADER_SIZE as usize];
        bytes.copy_from_slice(draft.as_slice());
        let checksum = Self::compute_checksum(&bytes);
        self.to_writer(w, checksum);
    }
}
