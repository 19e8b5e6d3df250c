//! Import table entries (§3.1).

use crate::error::Result;
use crate::io::{ByteReader, ByteWriter};

/// On-disk size of one [`ImportEntry`].
pub const IMPORT_ENTRY_SIZE: u64 = 8;

/// One import table entry: names a symbol expected from an external
/// library, resolved by the linker from another input's export set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, typed_builder::TypedBuilder)]
pub struct ImportEntry {
    pub library_name_offset: u32,
    pub symbol_name_offset: u32,
}

impl ImportEntry {
    pub fn from_reader(r: &ByteReader, offset: u64) -> Result<Self> {
        let library_name_offset = r.u32_at(offset)?;
        let symbol_name_offset = r.u32_at(offset + 4)?;
        Ok(Self::builder()
            .library_name_offset(library_name_offset)
            .symbol_name_offset(symbol_name_offset)
            .build())
    }

    pub fn to_writer(&self, w: &mut ByteWriter) {
        w.write_u32(self.library_name_offset);
        w.write_u32(self.symbol_name_offset);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn round_trips() {
        let entry = ImportEntry::builder()
            .library_name_offset(4)
            .symbol_name_offset(20)
            .build();
        let mut w = ByteWriter::new();
        entry.to_writer(&mut w);
        let bytes = w.into_bytes();
        assert_eq!(bytes.len(), IMPORT_ENTRY_SIZE as usize);
        let r = ByteReader::new(&bytes);
        assert_eq!(ImportEntry::from_reader(&r, 0).unwrap(), entry);
    }
}
