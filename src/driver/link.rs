//! Link driver: orchestrates parsing, symbol resolution, section
//! layout, relocation, and emission into one operation (§4.3–§4.6).

use std::collections::HashMap;
use std::sync::atomic::AtomicBool;

use crate::arena::Arena;
use crate::error::{Error, Result};
use crate::layout::{self, LayoutConfig, OutputKind, SectionInput};
use crate::obj::{
    HeaderFlags, ObjHeader, ObjectFile, SectionEntry, StringTableBuilder, SymbolBinding,
    SymbolEntry,
};
use crate::reloc::{self, RelocationTarget, SectionImage};
use crate::resolver::{ResolvedSymbol, Resolver};
use crate::script::Script;

use super::{check_cancelled, report, ProgressCallback};

/// One input OBJ file fed to a link.
pub struct LinkInput<'a> {
    pub name: String,
    pub bytes: &'a [u8],
}

/// Link-wide knobs, layered over [`LayoutConfig`] (§4.6) with an
/// optional directive script (§9 supplemented feature) that can
/// override the base address, entry symbol, and individual section
/// addresses.
#[derive(typed_builder::TypedBuilder)]
pub struct LinkConfig {
    pub output_kind: OutputKind,
    #[builder(default = 0)]
    pub base_address: u64,
    #[builder(default = 0x1000)]
    pub page_size: u64,
    #[builder(default = 0)]
    pub entry_point: u32,
    #[builder(default = false)]
    pub fill_gaps: bool,
    #[builder(default = 0)]
    pub fill_value: u8,
    #[builder(default)]
    pub script: Option<Script>,
}

/// Identifies one section by the object that defines it and that
/// object's own section-table index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct SectionKey {
    object_id: u32,
    local_index: u16,
}

/// Owns the arena for the duration of one link; a fresh link resets it
/// rather than allocating a new one (§5).
pub struct LinkDriver {
    arena: Arena,
}

impl Default for LinkDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl LinkDriver {
    pub fn new() -> Self {
        Self { arena: Arena::new() }
    }

    fn resolve_symbol(
        object: &ObjectFile,
        object_id: u32,
        arena: &Arena,
        resolver: &Resolver,
        va_lookup: &HashMap<SectionKey, u64>,
        symbol_index: u16,
    ) -> Result<(RelocationTarget, String)> {
        let symbol = object.symbols.get(symbol_index as usize).ok_or_else(|| {
            Error::InvalidArgument(format!(
                "relocation references out-of-range symbol index {symbol_index}"
            ))
        })?;
        let name = object.string_table(arena).get(symbol.name_offset)?.to_string();
        let resolved = if symbol.binding == SymbolBinding::Local {
            resolver.lookup_local(object_id, &name).copied()
        } else {
            resolver.lookup(&name).copied()
        }
        .ok_or_else(|| Error::UnresolvedSymbol { names: vec![name.clone()] })?;
        let base = va_lookup
            .get(&SectionKey {
                object_id: resolved.defining_object_id,
                local_index: resolved.section_index,
            })
            .copied()
            .unwrap_or(0);
        let address = base + resolved.value as u64;
        let target = RelocationTarget {
            address,
            syscall_number: resolved.value,
            got_address: address,
            plt_address: address,
        };
        Ok((target, name))
    }

    /// Runs the full link pipeline: parse → resolve → layout →
    /// relocate → emit, per §4.3–§4.6.
    pub fn link(
        &mut self,
        inputs: &[LinkInput],
        config: &LinkConfig,
        mut progress: Option<&mut ProgressCallback>,
        cancel: Option<&AtomicBool>,
    ) -> Result<Vec<u8>> {
        self.arena.reset();
        report(&mut progress, "loading", 0);
        check_cancelled(cancel)?;

        let mut objects = Vec::with_capacity(inputs.len());
        for input in inputs {
            objects.push(ObjectFile::parse(input.bytes, &mut self.arena)?);
        }

        report(&mut progress, "resolving", 20);
        check_cancelled(cancel)?;
        let mut resolver = Resolver::new();
        for (object_id, object) in objects.iter().enumerate() {
            let object_id = object_id as u32;
            let table = object.string_table(&self.arena);
            for symbol in &object.symbols {
                let name = table.get(symbol.name_offset)?;
                if symbol.is_undefined() {
                    resolver.reference_undefined(name);
                    continue;
                }
                resolver.define(
                    name,
                    object_id,
                    ResolvedSymbol {
                        defining_object_id: object_id,
                        section_index: symbol.section_index,
                        value: symbol.value,
                        size: symbol.size,
                        binding: symbol.binding,
                        symbol_type: symbol.symbol_type,
                    },
                )?;
            }
        }
        resolver.finalize()?;

        report(&mut progress, "laying out", 40);
        check_cancelled(cancel)?;

        let mut keys: Vec<SectionKey> = Vec::new();
        let mut layout_inputs: Vec<SectionInput> = Vec::new();
        let mut object_offsets = Vec::with_capacity(objects.len());
        for (object_id, object) in objects.iter().enumerate() {
            object_offsets.push(keys.len());
            for (local_index, section) in object.sections.iter().enumerate() {
                keys.push(SectionKey {
                    object_id: object_id as u32,
                    local_index: local_index as u16,
                });
                layout_inputs.push(SectionInput {
                    size: section.size,
                    alignment: section.alignment,
                    flags: section.flags,
                });
            }
        }

        let base_address = config
            .script
            .as_ref()
            .and_then(Script::base_address)
            .unwrap_or(config.base_address);
        let layout_config = LayoutConfig::builder()
            .base_address(base_address)
            .page_size(config.page_size)
            .output_kind(config.output_kind)
            .fill_gaps(config.fill_gaps)
            .fill_value(config.fill_value)
            .build();
        let mut vas = layout::layout(&layout_inputs, &layout_config);

        if let Some(script) = &config.script {
            for (i, key) in keys.iter().enumerate() {
                let object = &objects[key.object_id as usize];
                let section = &object.sections[key.local_index as usize];
                let name = object.string_table(&self.arena).get(section.name_offset)?;
                if let Some(address) = script.section_address(name) {
                    vas[i] = Some(address);
                }
            }
        }

        let mut va_lookup = HashMap::new();
        for (i, key) in keys.iter().enumerate() {
            if let Some(va) = vas[i] {
                va_lookup.insert(*key, va);
            }
        }

        report(&mut progress, "relocating", 60);
        check_cancelled(cancel)?;

        let mut images: Vec<SectionImage> = keys
            .iter()
            .enumerate()
            .map(|(i, key)| {
                let object = &objects[key.object_id as usize];
                let section = &object.sections[key.local_index as usize];
                let mut bytes = object.section_bytes(&self.arena, key.local_index as usize).to_vec();
                // ZERO_FILL sections (e.g. .bss) carry no file data; the
                // image still needs `size` addressable bytes for relocations
                // to patch.
                bytes.resize(bytes.len().max(section.size as usize), 0);
                SectionImage {
                    virtual_address: vas[i].unwrap_or(0),
                    bytes,
                }
            })
            .collect();

        for (object_id, object) in objects.iter().enumerate() {
            let object_id = object_id as u32;
            let start = object_offsets[object_id as usize];
            let slice = &mut images[start..start + object.sections.len()];
            reloc::apply_all(slice, &object.relocations, |symbol_index| {
                Self::resolve_symbol(object, object_id, &self.arena, &resolver, &va_lookup, symbol_index)
            })?;
        }

        report(&mut progress, "writing", 80);
        check_cancelled(cancel)?;

        let output = match config.output_kind {
            OutputKind::BinaryFlat => {
                let mut present: Vec<(u64, &[u8])> = keys
                    .iter()
                    .enumerate()
                    .filter_map(|(i, _)| vas[i].map(|va| (va, images[i].bytes.as_slice())))
                    .collect();
                present.sort_by_key(|(va, _)| *va);
                layout::assemble_flat(&present, config.fill_gaps, config.fill_value)
            }
            _ => self.emit_linked_object(&objects, &keys, &vas, &images, &resolver, &va_lookup, config)?,
        };

        report(&mut progress, "done", 100);
        Ok(output)
    }

    /// Builds a single merged OBJ carrying every laid-out section (in
    /// final VA order, non-loadable sections last) and the resolver's
    /// global symbol table, then emits it via [`ObjectFile::emit`].
    #[allow(clippy::too_many_arguments)]
    fn emit_linked_object(
        &self,
        objects: &[ObjectFile],
        keys: &[SectionKey],
        vas: &[Option<u64>],
        images: &[SectionImage],
        resolver: &Resolver,
        va_lookup: &HashMap<SectionKey, u64>,
        config: &LinkConfig,
    ) -> Result<Vec<u8>> {
        let mut order: Vec<usize> = (0..keys.len()).collect();
        order.sort_by_key(|&i| match vas[i] {
            Some(va) => (0u8, va),
            None => (1u8, i as u64),
        });

        let mut new_index_of = HashMap::new();
        for (new_index, &old_index) in order.iter().enumerate() {
            new_index_of.insert(keys[old_index], new_index as u16);
        }

        let mut out_arena = Arena::new();
        let mut strings = StringTableBuilder::new();
        let mut new_sections = Vec::with_capacity(order.len());
        let mut section_data = Vec::with_capacity(order.len());
        let mut first_executable_address = None;
        for &old_index in &order {
            let key = keys[old_index];
            let object = &objects[key.object_id as usize];
            let section = &object.sections[key.local_index as usize];
            let name = object.string_table(&self.arena).get(section.name_offset)?;
            let name_offset = strings.intern(name)?;
            if let Some(va) = vas[old_index] {
                if section.flags.contains(crate::obj::SectionFlags::EXECUTABLE)
                    && first_executable_address.is_none()
                {
                    first_executable_address = Some(va);
                }
            }
            new_sections.push(
                SectionEntry::builder()
                    .name_offset(name_offset)
                    .virtual_address(vas[old_index].unwrap_or(0) as u32)
                    .size(images[old_index].bytes.len() as u32)
                    .flags(section.flags)
                    .alignment(section.alignment)
                    .build(),
            );
            section_data.push(out_arena.alloc_copy(&images[old_index].bytes)?);
        }

        let mut new_symbols = Vec::new();
        for name in resolver.iter_order() {
            let resolved = resolver.lookup(name).expect("name came from iter_order");
            let section_index = new_index_of
                .get(&SectionKey {
                    object_id: resolved.defining_object_id,
                    local_index: resolved.section_index,
                })
                .copied()
                .unwrap_or(crate::obj::SECTION_UNDEF);
            let name_offset = strings.intern(name)?;
            new_symbols.push(
                SymbolEntry::builder()
                    .name_offset(name_offset)
                    .value(resolved.value)
                    .size(resolved.size)
                    .section_index(section_index)
                    .symbol_type(resolved.symbol_type)
                    .binding(resolved.binding)
                    .build(),
            );
        }

        let entry_candidate = if let Some(symbol) = config.script.as_ref().and_then(Script::entry_symbol) {
            let resolved = resolver
                .lookup(symbol)
                .ok_or_else(|| Error::UnresolvedSymbol { names: vec![symbol.to_string()] })?;
            let base = va_lookup
                .get(&SectionKey {
                    object_id: resolved.defining_object_id,
                    local_index: resolved.section_index,
                })
                .copied()
                .unwrap_or(0);
            (base + resolved.value as u64) as u32
        } else {
            config.entry_point
        };
        let start_symbol_address = resolver.lookup("_start").map(|resolved| {
            let base = va_lookup
                .get(&SectionKey {
                    object_id: resolved.defining_object_id,
                    local_index: resolved.section_index,
                })
                .copied()
                .unwrap_or(0);
            base + resolved.value as u64
        });
        let entry_point = layout::resolve_entry_point(
            entry_candidate,
            start_symbol_address,
            first_executable_address,
        ) as u32;

        let flags = match config.output_kind {
            OutputKind::Executable => HeaderFlags::EXECUTABLE,
            OutputKind::SharedLib => HeaderFlags::SHARED_LIB | HeaderFlags::POSITION_INDEP,
            OutputKind::Relocatable | OutputKind::BinaryFlat => HeaderFlags::empty(),
        };

        let string_bytes = strings.into_bytes();
        let string_table = out_arena.alloc_copy(&string_bytes)?;

        let object = ObjectFile {
            header: ObjHeader::builder()
                .flags(flags)
                .entry_point(entry_point)
                .section_count(new_sections.len() as u16)
                .symbol_count(new_symbols.len() as u16)
                .string_table_offset(0)
                .string_table_size(string_bytes.len() as u32)
                .section_table_offset(0)
                .relocation_table_offset(0)
                .relocation_count(0)
                .import_count(0)
                .build(),
            sections: new_sections,
            symbols: new_symbols,
            relocations: Vec::new(),
            imports: Vec::new(),
            string_table,
            section_data,
        };
        object.emit(&out_arena)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::obj::{SectionFlags, StringTableBuilder as Strtab, SymbolType};

    fn sample_object(exported: &str, value: u32) -> Vec<u8> {
        let mut strings = Strtab::new();
        let section_name = strings.intern(".text").unwrap();
        let symbol_name = strings.intern(exported).unwrap();
        let string_bytes = strings.into_bytes();

        let mut arena = Arena::new();
        let string_table = arena.alloc_copy(&string_bytes).unwrap();
        let code = arena.alloc_copy(&[0x90, 0x90, 0x90, 0x90]).unwrap();

        let section = SectionEntry::builder()
            .name_offset(section_name)
            .size(4)
            .flags(SectionFlags::READABLE | SectionFlags::EXECUTABLE | SectionFlags::LOADABLE)
            .build();
        let symbol = SymbolEntry::builder()
            .name_offset(symbol_name)
            .value(value)
            .size(4)
            .section_index(0)
            .symbol_type(SymbolType::Func)
            .binding(SymbolBinding::Export)
            .build();

        let obj = ObjectFile {
            header: ObjHeader::builder()
                .section_count(1)
                .symbol_count(1)
                .string_table_offset(0)
                .string_table_size(string_bytes.len() as u32)
                .section_table_offset(crate::obj::HEADER_SIZE as u32)
                .relocation_table_offset(0)
                .relocation_count(0)
                .import_count(0)
                .build(),
            sections: vec![section],
            symbols: vec![symbol],
            relocations: Vec::new(),
            imports: Vec::new(),
            string_table,
            section_data: vec![code],
        };
        obj.emit(&arena).unwrap()
    }

    #[test]
    fn links_single_object_to_flat_binary() {
        let bytes = sample_object("_start", 0);
        let mut driver = LinkDriver::new();
        let config = LinkConfig::builder().output_kind(OutputKind::BinaryFlat).build();
        let out = driver
            .link(&[LinkInput { name: "a.o".to_string(), bytes: &bytes }], &config, None, None)
            .unwrap();
        assert_eq!(out, vec![0x90, 0x90, 0x90, 0x90]);
    }

    #[test]
    fn links_single_object_to_executable() {
        let bytes = sample_object("_start", 0);
        let mut driver = LinkDriver::new();
        let config = LinkConfig::builder()
            .output_kind(OutputKind::Executable)
            .base_address(0x1000)
            .build();
        let out = driver
            .link(&[LinkInput { name: "a.o".to_string(), bytes: &bytes }], &config, None, None)
            .unwrap();
        let mut arena = Arena::new();
        let linked = ObjectFile::parse(&out, &mut arena).unwrap();
        assert_eq!(linked.sections.len(), 1);
        assert_eq!(linked.header.entry_point, 0x1000);
    }
}
