//! End-to-end scenarios from the specification's testable-properties
//! section: a minimal link with an explicit in-place addend, weak/global
//! override across objects, multiply-defined detection, an archive
//! create/list/extract round trip (with compression and an index),
//! corruption detection via CRC, and relocation overflow.
//!
//! These build OBJ/AR byte images directly with the on-disk builders
//! rather than through any higher-level assembler, since none exists in
//! this crate; that keeps each scenario's inputs traceable to exact
//! bytes instead of hiding them behind another layer.

use smof::ar::{self, MemberFlags, MemberInput};
use smof::arena::Arena;
use smof::compress;
use smof::driver::archive::ArchiveDriver;
use smof::driver::link::{LinkConfig, LinkDriver, LinkInput};
use smof::error::Error;
use smof::layout::OutputKind;
use smof::obj::{
    HEADER_SIZE, ObjHeader, ObjectFile, RelocationEntry, RelocationType, SectionEntry,
    SectionFlags, SymbolBinding, SymbolEntry, SymbolType, StringTableBuilder,
};

/// One symbol to place in a test object: its name, value, binding, and
/// whether it is a definition or an undefined reference.
struct SymSpec {
    name: &'static str,
    value: u32,
    binding: SymbolBinding,
    undefined: bool,
}

fn sym(name: &'static str, value: u32, binding: SymbolBinding) -> SymSpec {
    SymSpec { name, value, binding, undefined: false }
}

fn undef(name: &'static str) -> SymSpec {
    SymSpec { name, value: 0, binding: SymbolBinding::Global, undefined: true }
}

/// Builds a minimal one-section OBJ carrying `code` as that section's
/// bytes, the given symbols, and the given relocations (each referencing
/// a symbol by name, resolved to that object's own symbol-table index).
fn build_object(
    code: &[u8],
    section_flags: SectionFlags,
    symbols: &[SymSpec],
    relocs: &[(u32, RelocationType, &str)],
) -> Vec<u8> {
    let mut strings = StringTableBuilder::new();
    let section_name = strings.intern(".sect").unwrap();
    let name_offsets: Vec<u32> = symbols.iter().map(|s| strings.intern(s.name).unwrap()).collect();
    let string_bytes = strings.into_bytes();

    let mut arena = Arena::new();
    let string_table = arena.alloc_copy(&string_bytes).unwrap();
    let code_slice = arena.alloc_copy(code).unwrap();

    let section = SectionEntry::builder()
        .name_offset(section_name)
        .size(code.len() as u32)
        .flags(section_flags)
        .alignment(0)
        .build();

    let symbol_entries: Vec<SymbolEntry> = symbols
        .iter()
        .zip(&name_offsets)
        .map(|(s, &name_offset)| {
            SymbolEntry::builder()
                .name_offset(name_offset)
                .value(s.value)
                .size(0)
                .section_index(if s.undefined { smof::obj::SECTION_UNDEF } else { 0 })
                .symbol_type(SymbolType::Func)
                .binding(s.binding)
                .build()
        })
        .collect();

    let reloc_entries: Vec<RelocationEntry> = relocs
        .iter()
        .map(|&(offset, ty, name)| {
            let index = symbols.iter().position(|s| s.name == name).unwrap() as u16;
            RelocationEntry::builder()
                .offset(offset)
                .symbol_index(index)
                .relocation_type(ty)
                .section_index(0)
                .build()
        })
        .collect();

    let obj = ObjectFile {
        header: ObjHeader::builder()
            .section_count(1)
            .symbol_count(symbol_entries.len() as u16)
            .string_table_offset(0)
            .string_table_size(string_bytes.len() as u32)
            .section_table_offset(HEADER_SIZE as u32)
            .relocation_table_offset(0)
            .relocation_count(reloc_entries.len() as u16)
            .import_count(0)
            .build(),
        sections: vec![section],
        symbols: symbol_entries,
        relocations: reloc_entries,
        imports: Vec::new(),
        string_table,
        section_data: vec![code_slice],
    };
    obj.emit(&arena).unwrap()
}

fn exec_loadable() -> SectionFlags {
    SectionFlags::READABLE | SectionFlags::EXECUTABLE | SectionFlags::LOADABLE
}

fn data_loadable() -> SectionFlags {
    SectionFlags::READABLE | SectionFlags::WRITABLE | SectionFlags::LOADABLE
}

/// S1 — minimal link: one REL32 fix-up with an in-place addend of -4.
///
/// `S + A - P = 0x1000 + (-4) - 0x1004 = -8`, i.e. little-endian
/// `F8 FF FF FF` at bytes 4..8; the surrounding bytes are untouched.
#[test]
fn s1_minimal_link_patches_rel32_in_place() {
    let code: [u8; 12] = [0x55, 0x89, 0xE5, 0xE8, 0xFC, 0xFF, 0xFF, 0xFF, 0x5D, 0xC3, 0x90, 0x90];
    let bytes = build_object(
        &code,
        exec_loadable(),
        &[sym("_start", 0, SymbolBinding::Global)],
        &[(4, RelocationType::Rel32, "_start")],
    );

    let config = LinkConfig::builder()
        .output_kind(OutputKind::BinaryFlat)
        .base_address(0x1000)
        .build();
    let out = LinkDriver::new()
        .link(&[LinkInput { name: "a.o".to_string(), bytes: &bytes }], &config, None, None)
        .unwrap();

    assert_eq!(&out[0..4], &[0x55, 0x89, 0xE5, 0xE8]);
    assert_eq!(&out[4..8], &[0xF8, 0xFF, 0xFF, 0xFF]);
    assert_eq!(&out[8..12], &[0x5D, 0xC3, 0x90, 0x90]);
}

/// S2 — multi-object WEAK -> GLOBAL override: `a.o` defines `foo` WEAK,
/// `b.o` defines `foo` GLOBAL, `c.o` has an ABS32 relocation to `foo`.
/// The GLOBAL definition must win.
#[test]
fn s2_global_binding_overrides_weak_across_objects() {
    let a = build_object(
        &vec![0u8; 0x1000],
        data_loadable(),
        &[sym("foo", 0, SymbolBinding::Weak)],
        &[],
    );
    let b = build_object(&vec![0u8; 4], data_loadable(), &[sym("foo", 0, SymbolBinding::Global)], &[]);
    let c = build_object(
        &vec![0u8; 4],
        data_loadable(),
        &[undef("foo")],
        &[(0, RelocationType::Abs32, "foo")],
    );

    let config = LinkConfig::builder()
        .output_kind(OutputKind::Relocatable)
        .base_address(0x2000)
        .build();
    let out = LinkDriver::new()
        .link(
            &[
                LinkInput { name: "a.o".to_string(), bytes: &a },
                LinkInput { name: "b.o".to_string(), bytes: &b },
                LinkInput { name: "c.o".to_string(), bytes: &c },
            ],
            &config,
            None,
            None,
        )
        .unwrap();

    let mut arena = Arena::new();
    let linked = ObjectFile::parse(&out, &mut arena).unwrap();
    // a.o's 4096-byte section lands at 0x2000, b.o's 4-byte section right
    // after it at 0x3000, c.o's right after that at 0x3004; sections are
    // re-ordered by final VA, so c.o's is last.
    assert_eq!(linked.sections.len(), 3);
    let c_section = linked.sections.last().unwrap();
    assert_eq!(c_section.virtual_address, 0x3004);
    let patched = linked.section_bytes(&arena, 2);
    assert_eq!(u32::from_le_bytes(patched[0..4].try_into().unwrap()), 0x3000);
}

/// S3 — two objects both defining `main` GLOBAL must fail with
/// `MultiplyDefined`, naming both objects, and emit nothing.
#[test]
fn s3_duplicate_global_symbol_is_rejected() {
    let a = build_object(&[0x90; 4], exec_loadable(), &[sym("main", 0, SymbolBinding::Global)], &[]);
    let b = build_object(&[0x90; 4], exec_loadable(), &[sym("main", 0, SymbolBinding::Global)], &[]);

    let config = LinkConfig::builder().output_kind(OutputKind::Relocatable).build();
    let err = LinkDriver::new()
        .link(
            &[
                LinkInput { name: "a.o".to_string(), bytes: &a },
                LinkInput { name: "b.o".to_string(), bytes: &b },
            ],
            &config,
            None,
            None,
        )
        .unwrap_err();

    match err {
        Error::MultiplyDefined { name, first, second } => {
            assert_eq!(name, "main");
            assert_eq!((first, second), (0, 1));
        }
        other => panic!("expected MultiplyDefined, got {other:?}"),
    }
}

fn lcg_bytes(len: usize, mut seed: u32) -> Vec<u8> {
    let mut out = Vec::with_capacity(len);
    for _ in 0..len {
        seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12_345);
        out.push((seed >> 16) as u8);
    }
    out
}

/// S4 — archive create/list/extract round trip with zlib compression and
/// a symbol index across three members of distinct sizes.
#[test]
fn s4_archive_round_trip_with_compression_and_index() {
    let small = b"small".to_vec();
    let repeated = vec![0xAAu8; 1024];
    let varied = lcg_bytes(8192, 0xC0FF_EE42);

    let inputs = vec![
        MemberInput { name: "small.bin".to_string(), data: &small, flags: MemberFlags::empty(), mtime: 0 },
        MemberInput { name: "repeated.bin".to_string(), data: &repeated, flags: MemberFlags::empty(), mtime: 0 },
        MemberInput { name: "varied.bin".to_string(), data: &varied, flags: MemberFlags::empty(), mtime: 0 },
    ];
    let config = ar::CreateConfig::builder()
        .compression_tag(compress::TAG_ZLIB)
        .level(6)
        .indexed(true)
        .build();

    let mut driver = ArchiveDriver::new();
    let archive_bytes = driver.create(&inputs, &config, None, None).unwrap();

    let summaries = driver.list(&archive_bytes).unwrap();
    assert_eq!(summaries.len(), 3);
    assert_eq!(summaries[0].name, "small.bin");
    assert_eq!(summaries[0].uncompressed_size, small.len() as u64);
    assert_eq!(summaries[1].name, "repeated.bin");
    assert_eq!(summaries[1].uncompressed_size, repeated.len() as u64);
    assert_eq!(summaries[2].name, "varied.bin");
    assert_eq!(summaries[2].uncompressed_size, varied.len() as u64);

    let extracted = driver.extract(&archive_bytes, None, None, None).unwrap();
    assert_eq!(extracted.len(), 3);
    assert_eq!(extracted[0], ("small.bin".to_string(), small.clone()));
    assert_eq!(extracted[1], ("repeated.bin".to_string(), repeated.clone()));
    assert_eq!(extracted[2], ("varied.bin".to_string(), varied.clone()));
}

/// S5 — corrupting one member's stored data is caught by the CRC check
/// on extraction, without disturbing the other members.
#[test]
fn s5_corrupted_member_fails_checksum_others_survive() {
    let a = b"aaaa".to_vec();
    let b = b"bbbbbbbb".to_vec();
    let c = b"cccccccccccc".to_vec();
    let inputs = vec![
        MemberInput { name: "a.bin".to_string(), data: &a, flags: MemberFlags::empty(), mtime: 0 },
        MemberInput { name: "b.bin".to_string(), data: &b, flags: MemberFlags::empty(), mtime: 0 },
        MemberInput { name: "c.bin".to_string(), data: &c, flags: MemberFlags::empty(), mtime: 0 },
    ];
    let config = ar::CreateConfig::builder().build();
    let mut bytes = ar::create(&inputs, &config).unwrap();

    let mut arena = Arena::new();
    let parsed = ar::Archive::parse(&bytes, &mut arena).unwrap();
    let b_index = parsed.find_by_name("b.bin").unwrap();
    let data_offset = parsed.members[b_index].header.data_offset as usize;
    bytes[data_offset] ^= 0xFF;

    let mut arena = Arena::new();
    let reparsed = ar::Archive::parse(&bytes, &mut arena).unwrap();
    assert_eq!(reparsed.extract_member(&arena, reparsed.find_by_name("a.bin").unwrap()).unwrap(), a);
    assert!(matches!(
        reparsed.extract_member(&arena, reparsed.find_by_name("b.bin").unwrap()),
        Err(Error::ChecksumMismatch { .. })
    ));
    assert_eq!(reparsed.extract_member(&arena, reparsed.find_by_name("c.bin").unwrap()).unwrap(), c);
}

/// S6 — an ABS16 relocation whose resolved address doesn't fit 16 bits
/// must be rejected as `RelocationOverflow`.
#[test]
fn s6_relocation_overflow_is_detected() {
    let code = [0u8; 2];
    let bytes = build_object(
        &code,
        data_loadable(),
        &[sym("big", 0, SymbolBinding::Global)],
        &[(0, RelocationType::Abs16, "big")],
    );

    let config = LinkConfig::builder()
        .output_kind(OutputKind::BinaryFlat)
        .base_address(0x0012_3456)
        .build();
    let err = LinkDriver::new()
        .link(&[LinkInput { name: "a.o".to_string(), bytes: &bytes }], &config, None, None)
        .unwrap_err();

    match err {
        Error::RelocationOverflow { symbol, width, .. } => {
            assert_eq!(symbol, "big");
            assert_eq!(width, 2);
        }
        other => panic!("expected RelocationOverflow, got {other:?}"),
    }
}
