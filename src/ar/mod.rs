//! AR codec: archive header, member table, string table, member data
//! region, and optional symbol index (§3.2, §4.8).

pub mod header;
pub mod member;
pub mod symbol_index;

use crate::arena::{Arena, Slice};
use crate::compress;
use crate::error::{Error, ErrorContext, Result};
use crate::io::{crc32, ByteReader, ByteWriter};
use crate::obj::{ObjectFile, StringTable, StringTableBuilder, SymbolBinding};

pub use header::{ArchiveFlags, ArchiveHeader, HEADER_SIZE, MAGIC, MAX_MEMBER_COUNT, MAX_MEMBER_NAME_LEN, VERSION};
pub use member::{MemberFlags, MemberHeader, MEMBER_HEADER_SIZE};
pub use symbol_index::{SymbolIndex, SymbolIndexEntry, SYMBOL_INDEX_ENTRY_SIZE};

/// One parsed archive member: its header, resolved name, and the
/// arena-owned bytes exactly as stored on disk (still compressed, if
/// the archive carries compression).
#[derive(Debug, Clone)]
pub struct ArchiveMember {
    pub header: MemberHeader,
    pub name: String,
    stored_data: Slice,
}

/// A fully parsed archive.
#[derive(Debug, Clone)]
pub struct Archive {
    pub header: ArchiveHeader,
    pub members: Vec<ArchiveMember>,
    string_table: Slice,
}

fn region_overlaps(a: (u64, u64), b: (u64, u64)) -> bool {
    a.1 > a.0 && b.1 > b.0 && a.0 < b.1 && b.0 < a.1
}

impl Archive {
    /// Parses an archive per §4.8's extraction algorithm, copying the
    /// string table and every member's stored bytes into `arena`.
    pub fn parse(bytes: &[u8], arena: &mut Arena) -> Result<Self> {
        let r = ByteReader::new(bytes);
        let header = ArchiveHeader::from_reader(&r)?;

        let member_table_region = (
            header.member_table_offset as u64,
            header.member_table_offset as u64
                + header.member_count as u64 * MEMBER_HEADER_SIZE,
        );
        let string_table_region = (
            header.string_table_offset as u64,
            header.string_table_offset as u64 + header.string_table_size as u64,
        );
        let symbol_index_region = (
            header.symbol_index_offset as u64,
            header.symbol_index_offset as u64 + header.symbol_index_size as u64,
        );
        let named = [
            ("member table", member_table_region),
            ("string table", string_table_region),
            ("symbol index", symbol_index_region),
        ];
        for (name, region) in named {
            if region.1 > region.0 && region.0 < HEADER_SIZE {
                return Err(Error::CorruptHeader {
                    reason: format!("{name} overlaps the header"),
                    context: ErrorContext::at(region.0),
                });
            }
        }
        for i in 0..named.len() {
            for j in (i + 1)..named.len() {
                if region_overlaps(named[i].1, named[j].1) {
                    return Err(Error::CorruptHeader {
                        reason: format!("{} overlaps {}", named[i].0, named[j].0),
                        context: ErrorContext::at(named[i].1 .0.max(named[j].1 .0)),
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

        let archive_len = r.len();
        let mut members = Vec::with_capacity(header.member_count as usize);
        let mut data_regions = Vec::with_capacity(header.member_count as usize);
        for i in 0..header.member_count as u32 {
            let offset = header.member_table_offset as u64 + i as u64 * MEMBER_HEADER_SIZE;
            let member_header = MemberHeader::from_reader(&r, offset)?;
            if member_header.name_offset >= header.string_table_size {
                return Err(Error::InvalidArgument(format!(
                    "member {i} name_offset out of range"
                )));
            }
            let name = string_table
                .get(member_header.name_offset)
                .map_err(|_| Error::InvalidArgument(format!("member {i} has a malformed name")))?
                .to_string();
            if name.len() > MAX_MEMBER_NAME_LEN {
                return Err(Error::InvalidArgument(format!(
                    "member {i} name exceeds {MAX_MEMBER_NAME_LEN} bytes"
                )));
            }
            let end = member_header
                .data_offset
                .checked_add(member_header.compressed_size)
                .ok_or_else(|| Error::MemberNotFound(name.clone()))?;
            if end > archive_len {
                return Err(Error::InvalidArgument(format!(
                    "member `{name}` data extends past end of archive"
                )));
            }
            data_regions.push((member_header.data_offset, end));
            let stored = r.bytes_at(member_header.data_offset, member_header.compressed_size as usize)?;
            let stored_data = arena.alloc_copy(stored)?;
            members.push(ArchiveMember {
                header: member_header,
                name,
                stored_data,
            });
        }
        for i in 0..data_regions.len() {
            for j in (i + 1)..data_regions.len() {
                if region_overlaps(data_regions[i], data_regions[j]) {
                    return Err(Error::InvalidArgument(format!(
                        "member data regions {i} and {j} overlap"
                    )));
                }
            }
        }

        if header.flags.contains(ArchiveFlags::INDEXED) && header.symbol_index_size > 0 {
            let count = header.symbol_index_size / SYMBOL_INDEX_ENTRY_SIZE as u32;
            for i in 0..count {
                let offset = header.symbol_index_offset as u64 + i as u64 * SYMBOL_INDEX_ENTRY_SIZE;
                let entry = SymbolIndexEntry::from_reader(&r, offset)?;
                if entry.member_index as usize >= members.len() {
                    return Err(Error::InvalidArgument(format!(
                        "symbol index entry {i} points at nonexistent member {}",
                        entry.member_index
                    )));
                }
            }
        }

        Ok(Self {
            header,
            members,
            string_table: string_table_slice,
        })
    }

    pub fn string_table<'a>(&self, arena: &'a Arena) -> StringTable<'a> {
        StringTable::new(arena.get(self.string_table))
    }

    /// Reads, decompresses, and CRC-verifies one member's bytes.
    pub fn extract_member(&self, arena: &Arena, index: usize) -> Result<Vec<u8>> {
        let member = self
            .members
            .get(index)
            .ok_or_else(|| Error::MemberNotFound(format!("index {index}")))?;
        let codec = compress::lookup(member.header.compression_tag)?;
        let stored = arena.get(member.stored_data);
        let data = codec.decompress(stored, member.header.uncompressed_size as usize)?;
        if crc32(&data) != member.header.crc32 {
            return Err(Error::ChecksumMismatch {
                context: ErrorContext::at(member.header.data_offset),
            });
        }
        Ok(data)
    }

    pub fn find_by_name(&self, name: &str) -> Option<usize> {
        self.members.iter().position(|m| m.name == name)
    }

    /// Loads the on-disk symbol index, if any, resolving names from the
    /// archive string table.
    pub fn load_symbol_index(&self, bytes: &[u8], arena: &Arena) -> Result<Option<SymbolIndex>> {
        if !self.header.flags.contains(ArchiveFlags::INDEXED) || self.header.symbol_index_size == 0
        {
            return Ok(None);
        }
        let r = ByteReader::new(bytes);
        let table = self.string_table(arena);
        let count = self.header.symbol_index_size / SYMBOL_INDEX_ENTRY_SIZE as u32;
        let mut index = SymbolIndex::new();
        for i in 0..count {
            let offset =
                self.header.symbol_index_offset as u64 + i as u64 * SYMBOL_INDEX_ENTRY_SIZE;
            let entry = SymbolIndexEntry::from_reader(&r, offset)?;
            let name = table.get(entry.symbol_name_offset)?.to_string();
            index.insert(name, entry);
        }
        Ok(Some(index))
    }
}

/// One member to be written by [`create`].
pub struct MemberInput<'a> {
    pub name: String,
    pub data: &'a [u8],
    pub flags: MemberFlags,
    pub mtime: u32,
}

/// Archive-creation knobs (§4.8).
#[derive(Clone, Copy, typed_builder::TypedBuilder)]
pub struct CreateConfig {
    #[builder(default = compress::TAG_NONE)]
    pub compression_tag: u8,
    #[builder(default = 0)]
    pub level: u8,
    #[builder(default = false)]
    pub indexed: bool,
    #[builder(default = false)]
    pub sorted: bool,
    #[builder(default = 0)]
    pub creation_timestamp: u32,
}

/// Builds a complete archive image from `inputs` per §4.8's creation
/// algorithm: header placeholder, member data region, member table,
/// string table, optional symbol index, then the backpatched header.
pub fn create(inputs: &[MemberInput], config: &CreateConfig) -> Result<Vec<u8>> {
    for input in inputs {
        if input.name.len() > MAX_MEMBER_NAME_LEN {
            return Err(Error::InvalidArgument(format!(
                "member name `{}` exceeds {MAX_MEMBER_NAME_LEN} bytes",
                input.name
            )));
        }
    }
    if inputs.len() > MAX_MEMBER_COUNT as usize {
        return Err(Error::InvalidArgument(format!(
            "{} members exceeds the maximum of {MAX_MEMBER_COUNT}",
            inputs.len()
        )));
    }
    compress::validate_level(config.level)?;
    let codec = compress::lookup(config.compression_tag)?;

    let mut strings = StringTableBuilder::new();
    let mut name_offsets = Vec::with_capacity(inputs.len());
    for input in inputs {
        name_offsets.push(strings.intern(&input.name)?);
    }

    // Collect exported symbols for the index while each member's raw
    // (uncompressed) bytes are still directly at hand.
    let mut index_entries: Vec<(String, u32, u32, SymbolIndexEntry)> = Vec::new();
    if config.indexed {
        for (member_index, input) in inputs.iter().enumerate() {
            let mut scratch = Arena::new();
            let Ok(object) = ObjectFile::parse(input.data, &mut scratch) else {
                continue;
            };
            let table = object.string_table(&scratch);
            for symbol in &object.symbols {
                if !matches!(symbol.binding, SymbolBinding::Global | SymbolBinding::Export) {
                    continue;
                }
                let Ok(name) = table.get(symbol.name_offset) else {
                    continue;
                };
                let name_offset = strings.intern(name)?;
                index_entries.push((
                    name.to_string(),
                    name_offset,
                    member_index as u32,
                    SymbolIndexEntry::builder()
                        .symbol_name_offset(name_offset)
                        .member_index(member_index as u32)
                        .symbol_value(symbol.value)
                        .symbol_type(symbol.symbol_type)
                        .symbol_binding(symbol.binding)
                        .build(),
                ));
            }
        }
        if config.sorted {
            index_entries.sort_by(|a, b| a.0.cmp(&b.0));
        }
    }

    let mut w = ByteWriter::new();
    w.write_bytes(&[0u8; HEADER_SIZE as usize]);

    let mut member_headers = Vec::with_capacity(inputs.len());
    for (input, &name_offset) in inputs.iter().zip(&name_offsets) {
        let crc = crc32(input.data);
        let compressed = codec.compress(config.level, input.data)?;
        let data_offset = w.position();
        w.write_bytes(&compressed);
        let flags = if config.compression_tag != compress::TAG_NONE {
            input.flags | MemberFlags::COMPRESSED
        } else {
            input.flags
        };
        member_headers.push(
            MemberHeader::builder()
                .name_offset(name_offset)
                .uncompressed_size(input.data.len() as u64)
                .compressed_size(compressed.len() as u64)
                .data_offset(data_offset)
                .crc32(crc)
                .mtime(input.mtime)
                .flags(flags)
                .compression_tag(config.compression_tag)
                .build(),
        );
    }

    w.pad_to(8, 0);
    let member_table_offset = w.position();
    for header in &member_headers {
        header.to_writer(&mut w);
    }

    w.pad_to(8, 0);
    let string_table_offset = w.position();
    let string_bytes = strings.into_bytes();
    w.write_bytes(&string_bytes);

    let mut symbol_index_offset = 0u32;
    let mut symbol_index_size = 0u32;
    if config.indexed {
        w.pad_to(8, 0);
        symbol_index_offset = w.position() as u32;
        for (_, _, _, entry) in &index_entries {
            entry.to_writer(&mut w);
        }
        symbol_index_size = (index_entries.len() * SYMBOL_INDEX_ENTRY_SIZE as usize) as u32;
    }

    let mut flags = ArchiveFlags::LITTLE_ENDIAN;
    if config.compression_tag != compress::TAG_NONE {
        flags |= ArchiveFlags::COMPRESSED;
    }
    if config.indexed {
        flags |= ArchiveFlags::INDEXED;
    }
    if config.sorted {
        flags |= ArchiveFlags::SORTED;
    }

    let header = ArchiveHeader::builder()
        .flags(flags)
        .member_count(inputs.len() as u32)
        .symbol_index_offset(symbol_index_offset)
        .symbol_index_size(symbol_index_size)
        .member_table_offset(member_table_offset as u32)
        .string_table_offset(string_table_offset as u32)
        .string_table_size(string_bytes.len() as u32)
        .creation_timestamp(config.creation_timestamp)
        .build();
    let mut header_bytes = ByteWriter::new();
    header.to_writer_checksummed(&mut header_bytes);

    let mut out = w.into_bytes();
    out[0..HEADER_SIZE as usize].copy_from_slice(header_bytes.as_slice());
    Ok(out)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn creates_and_parses_round_trip() {
        let inputs = vec![
            MemberInput {
                name: "a.o".to_string(),
                data: b"hello",
                flags: MemberFlags::empty(),
                mtime: 0,
            },
            MemberInput {
                name: "b.o".to_string(),
                data: b"world!!",
                flags: MemberFlags::empty(),
                mtime: 0,
            },
        ];
        let config = CreateConfig::builder().build();
        let bytes = create(&inputs, &config).unwrap();

        let mut arena = Arena::new();
        let archive = Archive::parse(&bytes, &mut arena).unwrap();
        assert_eq!(archive.members.len(), 2);
        assert_eq!(archive.members[0].name, "a.o");
        assert_eq!(archive.extract_member(&arena, 0).unwrap(), b"hello");
        assert_eq!(archive.extract_member(&arena, 1).unwrap(), b"world!!");
    }

    #[test]
    fn compressed_members_round_trip() {
        let data = b"aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa".to_vec();
        let inputs = vec![MemberInput {
            name: "big.bin".to_string(),
            data: &data,
            flags: MemberFlags::empty(),
            mtime: 0,
        }];
        let config = CreateConfig::builder()
            .compression_tag(compress::TAG_ZLIB)
            .level(6)
            .build();
        let bytes = create(&inputs, &config).unwrap();
        let mut arena = Arena::new();
        let archive = Archive::parse(&bytes, &mut arena).unwrap();
        assert!(archive.header.flags.contains(ArchiveFlags::COMPRESSED));
        assert_eq!(archive.extract_member(&arena, 0).unwrap(), data);
    }

    #[test]
    fn find_by_name_locates_member() {
        let inputs = vec![MemberInput {
            name: "only.o".to_string(),
            data: b"x",
            flags: MemberFlags::empty(),
            mtime: 0,
        }];
        let config = CreateConfig::builder().build();
        let bytes = create(&inputs, &config).unwrap();
        let mut arena = Arena::new();
        let archive = Archive::parse(&bytes, &mut arena).unwrap();
        assert_eq!(archive.find_by_name("only.o"), Some(0));
        assert_eq!(archive.find_by_name("missing"), None);
    }
}
