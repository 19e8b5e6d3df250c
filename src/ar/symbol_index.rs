//! Archive symbol index: exported-symbol name → member index, for fast
//! linker lookup without parsing every member (§3.2, §4.9).

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::io::{ByteReader, ByteWriter};
use crate::obj::{SymbolBinding, SymbolType};

pub const SYMBOL_INDEX_ENTRY_SIZE: u64 = 16;

/// One on-disk symbol-index entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, typed_builder::TypedBuilder)]
pub struct SymbolIndexEntry {
    pub symbol_name_offset: u32,
    pub member_index: u32,
    pub symbol_value: u32,
    pub symbol_type: SymbolType,
    pub symbol_binding: SymbolBinding,
}

impl SymbolIndexEntry {
    pub fn from_reader(r: &ByteReader, offset: u64) -> Result<Self> {
        use num_traits::FromPrimitive;
        let symbol_name_offset = r.u32_at(offset)?;
        let member_index = r.u32_at(offset + 4)?;
        let symbol_value = r.u32_at(offset + 8)?;
        let raw_type = r.u8_at(offset + 12)?;
        let raw_binding = r.u8_at(offset + 13)?;
        let symbol_type = SymbolType::from_u8(raw_type).ok_or_else(|| {
            Error::InvalidArgument(format!("unknown symbol type {raw_type} in symbol index"))
        })?;
        let symbol_binding = SymbolBinding::from_u8(raw_binding).ok_or_else(|| {
            Error::InvalidArgument(format!(
                "unknown symbol binding {raw_binding} in symbol index"
            ))
        })?;
        Ok(Self::builder()
            .symbol_name_offset(symbol_name_offset)
            .member_index(member_index)
            .symbol_value(symbol_value)
            .symbol_type(symbol_type)
            .symbol_binding(symbol_binding)
            .build())
    }

    pub fn to_writer(&self, w: &mut ByteWriter) {
        w.write_u32(self.symbol_name_offset);
        w.write_u32(self.member_index);
        w.write_u32(self.symbol_value);
        w.write_u8(self.symbol_type as u8);
        w.write_u8(self.symbol_binding as u8);
        w.write_bytes(&[0u8; 2]);
    }
}

/// An in-memory symbol index, preserving insertion order for
/// deterministic iteration (§4.9) while offering constant-average
/// lookup by name.
#[derive(Default)]
pub struct SymbolIndex {
    entries: Vec<(String, SymbolIndexEntry)>,
    by_name: HashMap<String, usize>,
}

impl SymbolIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: String, entry: SymbolIndexEntry) {
        let slot = self.entries.len();
        self.by_name.insert(name.clone(), slot);
        self.entries.push((name, entry));
    }

    /// Sorts entries by symbol name (§4.8 step 4, `SORTED` flag).
    pub fn sort_by_name(&mut self) {
        self.entries.sort_by(|a, b| a.0.cmp(&b.0));
        self.by_name.clear();
        for (i, (name, _)) in self.entries.iter().enumerate() {
            self.by_name.insert(name.clone(), i);
        }
    }

    pub fn find(&self, name: &str) -> Option<u32> {
        self.by_name
            .get(name)
            .map(|&i| self.entries[i].1.member_index)
    }

    /// Linear scan returning every name matching a simple `*` glob.
    pub fn find_by_pattern(&self, pattern: &str) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(name, _)| glob_match(pattern, name))
            .map(|(name, _)| name.as_str())
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SymbolIndexEntry)> {
        self.entries.iter().map(|(name, entry)| (name.as_str(), entry))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Minimal `*`-only glob matcher, sufficient for `find_by_pattern`.
fn glob_match(pattern: &str, candidate: &str) -> bool {
    let mut parts = pattern.split('*').peekable();
    let mut rest = candidate;
    let anchored_start = !pattern.starts_with('*');
    let anchored_end = !pattern.ends_with('*');

    if let Some(first) = parts.peek() {
        if anchored_start {
            if !rest.starts_with(first.as_str()) {
                return false;
            }
            rest = &rest[first.len()..];
            parts.next();
        }
    }

    let mut last_matched_end = 0usize;
    while let Some(part) = parts.next() {
        if part.is_empty() {
            continue;
        }
        if parts.peek().is_none() && anchored_end {
            return rest.ends_with(part);
        }
        match rest.find(part) {
            Some(idx) => {
                rest = &rest[idx + part.len()..];
                last_matched_end = idx + part.len();
            }
            None => return false,
        }
    }
    let _ = last_matched_end;
    true
}

#[cfg(test)]
mod test {
    use super::*;

    fn entry(member_index: u32) -> SymbolIndexEntry {
        SymbolIndexEntry::builder()
            .symbol_name_offset(0)
            .member_index(member_index)
            .symbol_value(0)
            .symbol_type(SymbolType::Func)
            .symbol_binding(SymbolBinding::Export)
            .build()
    }

    #[test]
    fn round_trips_entry() {
        let e = entry(3);
        let mut w = ByteWriter::new();
        e.to_writer(&mut w);
        let bytes = w.into_bytes();
        assert_eq!(bytes.len(), SYMBOL_INDEX_ENTRY_SIZE as usize);
        let r = ByteReader::new(&bytes);
        assert_eq!(SymbolIndexEntry::from_reader(&r, 0).unwrap(), e);
    }

    #[test]
    fn find_returns_member_index() {
        let mut index = SymbolIndex::new();
        index.insert("main".to_string(), entry(0));
        index.insert("helper".to_string(), entry(1));
        assert_eq!(index.find("helper"), Some(1));
        assert_eq!(index.find("missing"), None);
    }

    #[test]
    fn sort_by_name_preserves_lookup() {
        let mut index = SymbolIndex::new();
        index.insert("zeta".to_string(), entry(0));
        index.insert("alpha".to_string(), entry(1));
        index.sort_by_name();
        let names: Vec<&str> = index.iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
        assert_eq!(index.find("alpha"), Some(1));
    }

    #[test]
    fn find_by_pattern_matches_glob() {
        let mut index = SymbolIndex::new();
        index.insert("obj_init".to_string(), entry(0));
        index.insert("obj_fini".to_string(), entry(1));
        index.insert("main".to_string(), entry(2));
        let mut matches = index.find_by_pattern("obj_*");
        matches.sort_unstable();
        assert_eq!(matches, vec!["obj_fini", "obj_init"]);
    }
}
