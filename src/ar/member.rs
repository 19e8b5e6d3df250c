//! Archive member headers (§3.2).
//!
//! Field widths derived the same way as the archive header: name_offset4
//! + uncompressed_size8 + compressed_size8 + data_offset8 + crc32_4 +
//! mtime4 + flags2 + compression_tag1 = 39 bytes, padded with 89
//! reserved bytes to reach the stated 128.

use bitflags::bitflags;

use crate::compress;
use crate::error::{Error, Result};
use crate::io::{ByteReader, ByteWriter};

pub const MEMBER_HEADER_SIZE: u64 = 128;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MemberFlags: u16 {
        const COMPRESSED = 0x0001;
        const EXECUTABLE = 0x0002;
        const READONLY   = 0x0004;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, typed_builder::TypedBuilder)]
pub struct MemberHeader {
    pub name_offset: u32,
    pub uncompressed_size: u64,
    pub compressed_size: u64,
    pub data_offset: u64,
    pub crc32: u32,
    #[builder(default = 0)]
    pub mtime: u32,
    #[builder(default = MemberFlags::empty())]
    pub flags: MemberFlags,
    #[builder(default = compress::TAG_NONE)]
    pub compression_tag: u8,
}

impl MemberHeader {
    pub fn from_reader(r: &ByteReader, offset: u64) -> Result<Self> {
        let name_offset = r.u32_at(offset)?;
        let uncompressed_size = r.u64_at(offset + 4)?;
        let compressed_size = r.u64_at(offset + 12)?;
        let data_offset = r.u64_at(offset + 20)?;
        let crc32 = r.u32_at(offset + 28)?;
        let mtime = r.u32_at(offset + 32)?;
        let raw_flags = r.u16_at(offset + 36)?;
        let flags = MemberFlags::from_bits(raw_flags).ok_or_else(|| Error::InvalidArgument(
            format!("unknown member flag bits {raw_flags:#06x}"),
        ))?;
        let compression_tag = r.u8_at(offset + 38)?;
        Ok(Self::builder()
            .name_offset(name_offset)
            .uncompressed_size(uncompressed_size)
            .compressed_size(compressed_size)
            .data_offset(data_offset)
            .crc32(crc32)
            .mtime(mtime)
            .flags(flags)
            .compression_tag(compression_tag)
            .build())
    }

    pub fn to_writer(&self, w: &mut ByteWriter) {
        w.write_u32(self.name_offset);
        w.write_u64(self.uncompressed_size);
        w.write_u64(self.compressed_size);
        w.write_u64(self.data_offset);
        w.write_u32(self.crc32);
        w.write_u32(self.mtime);
        w.write_u16(self.flags.bits());
        w.write_u8(self.compression_tag);
        w.write_bytes(&[0u8; 89]);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn round_trips() {
        let header = MemberHeader::builder()
            .name_offset(4)
            .uncompressed_size(1024)
            .compressed_size(512)
            .data_offset(256)
            .crc32(0xDEAD_BEEF)
            .mtime(1_700_000_000)
            .flags(MemberFlags::COMPRESSED)
            .compression_tag(compress::TAG_ZLIB)
            .build();
        let mut w = ByteWriter::new();
        header.to_writer(&mut w);
        let bytes = w.into_bytes();
        assert_eq!(bytes.len(), MEMBER_HEADER_SIZE as usize);
        let r = ByteReader::new(&bytes);
        assert_eq!(MemberHeader::from_reader(&r, 0).unwrap(), header);
    }
}
