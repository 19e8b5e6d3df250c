//! String table: a flat buffer of NUL-terminated strings addressed by
//! byte offset (§3.1). Offset 0 always denotes the empty string.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::io::ByteReader;

/// An immutable, already-parsed string table.
pub struct StringTable<'a> {
    bytes: &'a [u8],
}

impl<'a> StringTable<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }

    /// Looks up the NUL-terminated string starting at `offset`.
    pub fn get(&self, offset: u32) -> Result<&'a str> {
        let r = ByteReader::new(self.bytes);
        r.c_str_at(offset as u64)
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// A string table under construction for emission. Deduplicates repeated
/// strings so identical symbol/section names share one offset.
#[derive(Default)]
pub struct StringTableBuilder {
    bytes: Vec<u8>,
    offsets: HashMap<String, u32>,
}

impl StringTableBuilder {
    pub fn new() -> Self {
        // Offset 0 is reserved for the empty string.
        let mut bytes = Vec::new();
        bytes.push(0u8);
        let mut offsets = HashMap::new();
        offsets.insert(String::new(), 0u32);
        Self { bytes, offsets }
    }

    /// Interns `s`, returning its byte offset. Repeated calls with the
    /// same string return the same offset.
    pub fn intern(&mut self, s: &str) -> Result<u32> {
        if let Some(&offset) = self.offsets.get(s) {
            return Ok(offset);
        }
        let offset = u32::try_from(self.bytes.len()).map_err(|_| Error::InvalidArgument(
            "string table exceeds 4 GiB".to_string(),
        ))?;
        self.bytes.extend_from_slice(s.as_bytes());
        self.bytes.push(0u8);
        self.offsets.insert(s.to_string(), offset);
        Ok(offset)
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.len() <= 1
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn empty_offset_is_empty_string() {
        let mut builder = StringTableBuilder::new();
        let offset = builder.intern("").unwrap();
        assert_eq!(offset, 0);
        let bytes = builder.into_bytes();
        let table = StringTable::new(&bytes);
        assert_eq!(table.get(0).unwrap(), "");
    }

    #[test]
    fn repeated_strings_share_offset() {
        let mut builder = StringTableBuilder::new();
        let a = builder.intern("main").unwrap();
        let b = builder.intern("main").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn distinct_strings_round_trip() {
        let mut builder = StringTableBuilder::new();
        let a = builder.intern("foo").unwrap();
        let b = builder.intern("barbaz").unwrap();
        let bytes = builder.into_bytes();
        let table = StringTable::new(&bytes);
        assert_eq!(table.get(a).unwrap(), "foo");
        assert_eq!(table.get(b).unwrap(), "barbaz");
    }
}
