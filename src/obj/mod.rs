//! OBJ file codec: header, section/symbol/relocation/import tables, and
//! the string table, wired together into a single parsed/emitted view
//! (§3.1, §4.3).
//!
//! The symbol table has no dedicated offset field in the header (the
//! field list in §3.1 enumerates none), so its location is always
//! derived as `section_table_offset + section_count * SECTION_ENTRY_SIZE`
//! on both parse and emit; this keeps the format self-describing without
//! inventing a header field the spec doesn't list.

pub mod header;
pub mod import;
pub mod relocation;
pub mod section;
pub mod strtab;
pub mod symbol;

use crate::arena::{Arena, Slice};
use crate::error::{Error, ErrorContext, Result};
use crate::io::{ByteReader, ByteWriter};

pub use header::{HeaderFlags, ObjHeader, HEADER_SIZE, MAGIC, VERSION};
pub use import::{ImportEntry, IMPORT_ENTRY_SIZE};
pub use relocation::{RelocationEntry, RelocationType, RELOCATION_ENTRY_SIZE};
pub use section::{SectionEntry, SectionFlags, SECTION_ENTRY_SIZE};
pub use strtab::{StringTable, StringTableBuilder};
pub use symbol::{SymbolBinding, SymbolEntry, SymbolType, SECTION_UNDEF, SYMBOL_ENTRY_SIZE};

/// A fully parsed OBJ file. Bulk byte regions (the string table and each
/// section's data) live in the caller's [`Arena`]; everything else is a
/// small fixed-size struct held directly.
#[derive(Debug, Clone)]
pub struct ObjectFile {
    pub header: ObjHeader,
    pub sections: Vec<SectionEntry>,
    pub symbols: Vec<SymbolEntry>,
    pub relocations: Vec<RelocationEntry>,
    pub imports: Vec<ImportEntry>,
    string_table: Slice,
    /// One entry per section; empty slice for a zero-fill section.
    section_data: Vec<Slice>,
}

fn overlaps(a: (u64, u64), b: (u64, u64)) -> bool {
    a.0 < b.1 && b.0 < a.1
}

impl ObjectFile {
    /// Parses `bytes` per the §4.3 algorithm, copying the string table
    /// and every section's data into `arena`.
    pub fn parse(bytes: &[u8], arena: &mut Arena) -> Result<Self> {
        let r = ByteReader::new(bytes);
        let header = ObjHeader::from_reader(&r)?;

        let section_table_region = (
            header.section_table_offset as u64,
            header.section_table_offset as u64
                + header.section_count as u64 * SECTION_ENTRY_SIZE,
        );
        let string_table_region = (
            header.string_table_offset as u64,
            header.string_table_offset as u64 + header.string_table_size as u64,
        );
        let relocation_table_region = (
            header.relocation_table_offset as u64,
            header.relocation_table_offset as u64
                + header.relocation_count as u64 * RELOCATION_ENTRY_SIZE,
        );
        let symbol_table_offset =
            header.section_table_offset as u64 + header.section_count as u64 * SECTION_ENTRY_SIZE;
        let symbol_table_region = (
            symbol_table_offset,
            symbol_table_offset + header.symbol_count as u64 * SYMBOL_ENTRY_SIZE,
        );

        let named_regions: [(&str, (u64, u64)); 4] = [
            ("section table", section_table_region),
            ("string table", string_table_region),
            ("relocation table", relocation_table_region),
            ("symbol table", symbol_table_region),
        ];
        let header_region = (0u64, HEADER_SIZE);
        for (name, region) in named_regions {
            if region.1 > region.0 && overlaps(region, header_region) {
                return Err(Error::CorruptHeader {
                    reason: format!("{name} overlaps the header"),
                    context: ErrorContext::at(region.0),
                });
            }
        }
        for i in 0..named_regions.len() {
            for j in (i + 1)..named_regions.len() {
                let (name_a, region_a) = named_regions[i];
                let (name_b, region_b) = named_regions[j];
                if region_a.1 > region_a.0 && region_b.1 > region_b.0 && overlaps(region_a, region_b)
                {
                    return Err(Error::CorruptHeader {
                        reason: format!("{name_a} overlaps {name_b}"),
                        context: ErrorContext::at(region_a.0.max(region_b.0)),
                    });
                }
            }
        }

        let string_table_bytes = if header.string_table_size > 0 {
            r.bytes_at(
                header.string_table_offset as u64,
                header.string_table_size as usize,
            )?
        } else {
            &[]
        };
        let string_table_slice = arena.alloc_copy(string_table_bytes)?;
        let string_table = StringTable::new(arena.get(string_table_slice));

        let mut sections = Vec::with_capacity(header.section_count as usize);
        for i in 0..header.section_count as u32 {
            let offset = header.section_table_offset as u64 + i as u64 * SECTION_ENTRY_SIZE;
            let entry = SectionEntry::from_reader(&r, offset, i)?;
            if entry.name_offset >= header.string_table_size {
                return Err(Error::InvalidSection {
                    reason: format!(
                        "name_offset {} is not inside the string table ({} bytes)",
                        entry.name_offset, header.string_table_size
                    ),
                    context: ErrorContext::at_index(offset, i),
                });
            }
            string_table.get(entry.name_offset).map_err(|_| Error::InvalidSection {
                reason: "name_offset does not point at a NUL-terminated string".to_string(),
                context: ErrorContext::at_index(offset, i),
            })?;
            sections.push(entry);
        }

        let mut section_data = Vec::with_capacity(sections.len());
        for section in &sections {
            if section.file_offset == 0 || section.flags.contains(SectionFlags::ZERO_FILL) {
                section_data.push(arena.alloc_copy(&[])?);
                continue;
            }
            let bytes = r.bytes_at(section.file_offset as u64, section.size as usize)?;
            section_data.push(arena.alloc_copy(bytes)?);
        }

        let mut symbols = Vec::with_capacity(header.symbol_count as usize);
        for i in 0..header.symbol_count as u32 {
            let offset = symbol_table_offset + i as u64 * SYMBOL_ENTRY_SIZE;
            let entry = SymbolEntry::from_reader(&r, offset, i)?;
            if !entry.is_undefined() && entry.section_index as usize >= sections.len() {
                return Err(Error::InvalidSymbol {
                    reason: format!(
                        "section_index {} is not < section_count {}",
                        entry.section_index,
                        sections.len()
                    ),
                    context: ErrorContext::at_index(offset, i),
                });
            }
            symbols.push(entry);
        }

        let mut relocations = Vec::with_capacity(header.relocation_count as usize);
        for i in 0..header.relocation_count as u32 {
            let offset = header.relocation_table_offset as u64 + i as u64 * RELOCATION_ENTRY_SIZE;
            let entry = RelocationEntry::from_reader(&r, offset, i)?;
            if entry.section_index as usize >= sections.len() {
                return Err(Error::InvalidRelocation {
                    reason: format!(
                        "section_index {} is not < section_count {}",
                        entry.section_index,
                        sections.len()
                    ),
                    context: ErrorContext::at_index(offset, i),
                });
            }
            let target = &sections[entry.section_index as usize];
            let width = entry.relocation_type.width() as u64;
            if entry.offset as u64 + width > target.size as u64 {
                return Err(Error::InvalidRelocation {
                    reason: format!(
                        "offset {} + width {} exceeds section size {}",
                        entry.offset, width, target.size
                    ),
                    context: ErrorContext::at_index(offset, i),
                });
            }
            relocations.push(entry);
        }

        let import_table_offset =
            header.relocation_table_offset as u64 + header.relocation_count as u64 * RELOCATION_ENTRY_SIZE;
        let mut imports = Vec::with_capacity(header.import_count as usize);
        for i in 0..header.import_count as u64 {
            let offset = import_table_offset + i * IMPORT_ENTRY_SIZE;
            imports.push(ImportEntry::from_reader(&r, offset)?);
        }

        Ok(Self {
            header,
            sections,
            symbols,
            relocations,
            imports,
            string_table: string_table_slice,
            section_data,
        })
    }

    pub fn string_table<'a>(&self, arena: &'a Arena) -> StringTable<'a> {
        StringTable::new(arena.get(self.string_table))
    }

    pub fn section_bytes<'a>(&self, arena: &'a Arena, index: usize) -> &'a [u8] {
        arena.get(self.section_data[index])
    }

    /// Emits this object in the deterministic layout from §4.3: header,
    /// section table, symbol table, string table, section data (each
    /// padded to its section's alignment), relocation table, import
    /// table.
    pub fn emit(&self, arena: &Arena) -> Result<Vec<u8>> {
        let section_table_offset = HEADER_SIZE;
        let section_table_size = self.sections.len() as u64 * SECTION_ENTRY_SIZE;
        let symbol_table_offset = section_table_offset + section_table_size;
        let symbol_table_size = self.symbols.len() as u64 * SYMBOL_ENTRY_SIZE;
        let string_table_offset = symbol_table_offset + symbol_table_size;
        let string_table_bytes = arena.get(self.string_table);
        let string_table_size = string_table_bytes.len() as u64;

        let mut w = ByteWriter::new();
        // Reserve space for the header, patched in at the end once every
        // offset below is known.
        w.write_bytes(&[0u8; HEADER_SIZE as usize]);

        for section in &self.sections {
            section.to_writer(&mut w);
        }
        for symbol in &self.symbols {
            symbol.to_writer(&mut w);
        }
        w.write_bytes(string_table_bytes);

        let mut section_file_offsets = Vec::with_capacity(self.sections.len());
        for (section, data) in self.sections.iter().zip(&self.section_data) {
            w.pad_to(section.alignment_bytes(), 0);
            let bytes = arena.get(*data);
            if bytes.is_empty() {
                section_file_offsets.push(0u32);
            } else {
                section_file_offsets.push(w.position() as u32);
                w.write_bytes(bytes);
            }
        }

        let relocation_table_offset = w.position();
        for relocation in &self.relocations {
            relocation.to_writer(&mut w);
        }
        for import in &self.imports {
            import.to_writer(&mut w);
        }

        let header = ObjHeader::builder()
            .flags(self.header.flags)
            .entry_point(self.header.entry_point)
            .section_count(self.sections.len() as u16)
            .symbol_count(self.symbols.len() as u16)
            .string_table_offset(string_table_offset as u32)
            .string_table_size(string_table_size as u32)
            .section_table_offset(section_table_offset as u32)
            .relocation_table_offset(relocation_table_offset as u32)
            .relocation_count(self.relocations.len() as u16)
            .import_count(self.imports.len() as u16)
            .build();
        let mut header_bytes = ByteWriter::new();
        header.to_writer(&mut header_bytes);

        let mut out = w.into_bytes();
        out[0..HEADER_SIZE as usize].copy_from_slice(header_bytes.as_slice());

        // Patch each section's file_offset, since it was only known once
        // the table and string-table sizes were written.
        for (i, offset) in section_file_offsets.into_iter().enumerate() {
            let field_offset = (section_table_offset + i as u64 * SECTION_ENTRY_SIZE + 12) as usize;
            out[field_offset..field_offset + 4].copy_from_slice(&offset.to_le_bytes());
        }

        Ok(out)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn build_sample(arena: &mut Arena) -> ObjectFile {
        let mut strings = StringTableBuilder::new();
        let name_offset = strings.intern("text").unwrap();
        let symbol_name = strings.intern("main").unwrap();
        let string_bytes = strings.into_bytes();
        let string_table = arena.alloc_copy(&string_bytes).unwrap();

        let section = SectionEntry::builder()
            .name_offset(name_offset)
            .virtual_address(0)
            .size(4)
            .flags(SectionFlags::READABLE | SectionFlags::EXECUTABLE | SectionFlags::LOADABLE)
            .alignment(2)
            .build();
        let section_data = arena.alloc_copy(&[0x90, 0x90, 0x90, 0x90]).unwrap();

        let symbol = SymbolEntry::builder()
            .name_offset(symbol_name)
            .value(0)
            .size(4)
            .section_index(0)
            .symbol_type(SymbolType::Func)
            .binding(SymbolBinding::Export)
            .build();

        ObjectFile {
            header: ObjHeader::builder()
                .section_count(1)
                .symbol_count(1)
                .string_table_offset(0)
                .string_table_size(string_bytes_len(&string_table, arena))
                .section_table_offset(HEADER_SIZE as u32)
                .relocation_table_offset(0)
                .relocation_count(0)
                .import_count(0)
                .build(),
            sections: vec![section],
            symbols: vec![symbol],
            relocations: vec![],
            imports: vec![],
            string_table,
            section_data: vec![section_data],
        }
    }

    fn string_bytes_len(slice: &Slice, arena: &Arena) -> u32 {
        arena.get(*slice).len() as u32
    }

    #[test]
    fn emits_and_reparses() {
        let mut arena = Arena::new();
        let obj = build_sample(&mut arena);
        let bytes = obj.emit(&arena).unwrap();

        let mut parse_arena = Arena::new();
        let reparsed = ObjectFile::parse(&bytes, &mut parse_arena).unwrap();
        assert_eq!(reparsed.sections.len(), 1);
        assert_eq!(reparsed.symbols.len(), 1);
        assert_eq!(
            reparsed.section_bytes(&parse_arena, 0),
            &[0x90, 0x90, 0x90, 0x90]
        );
        assert_eq!(
            reparsed
                .string_table(&parse_arena)
                .get(reparsed.sections[0].name_offset)
                .unwrap(),
            "text"
        );
    }

    #[test]
    fn rejects_section_table_overlapping_header() {
        let mut arena = Arena::new();
        let mut obj = build_sample(&mut arena);
        obj.header.section_table_offset = 4;
        let bytes = obj.emit(&arena);
        // Even if emit() didn't reject it, re-parsing the corrupted
        // layout must.
        if let Ok(bytes) = bytes {
            let mut parse_arena = Arena::new();
            assert!(ObjectFile::parse(&bytes, &mut parse_arena).is_err());
        }
    }

    #[test]
    fn rejects_relocation_with_out_of_range_section_index() {
        let mut arena = Arena::new();
        let mut obj = build_sample(&mut arena);
        obj.relocations.push(
            RelocationEntry::builder()
                .offset(0)
                .symbol_index(0)
                .relocation_type(RelocationType::Abs32)
                .section_index(5)
                .build(),
        );
        obj.header.relocation_count = 1;
        let bytes = obj.emit(&arena).unwrap();
        let mut parse_arena = Arena::new();
        assert!(ObjectFile::parse(&bytes, &mut parse_arena).is_err());
    }
}
