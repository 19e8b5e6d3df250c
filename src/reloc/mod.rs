//! Relocation engine: applies typed fix-ups to section bytes using
//! resolved symbol addresses (§4.5).
//!
//! Processing order is significant and observable in diagnostics:
//! relocations are grouped by target section, sections in file order,
//! and within a section by offset.

use crate::error::{Error, ErrorContext, Result};
use crate::obj::{RelocationEntry, RelocationType};

/// Everything the engine might need about a relocation's symbol,
/// resolved ahead of time by the caller (the driver, after symbol
/// resolution and layout have both run).
#[derive(Debug, Clone, Copy, Default)]
pub struct RelocationTarget {
    /// `S`: the resolved virtual address, used by ABS32/REL32/ABS16/REL16.
    pub address: u64,
    /// Syscall number carried in the symbol's value, used by SYSCALL.
    pub syscall_number: u32,
    /// GOT slot address allocated for this symbol, used by GOT.
    pub got_address: u64,
    /// PLT entry address allocated for this symbol, used by PLT.
    pub plt_address: u64,
}

/// One section's mutable byte buffer plus its assigned virtual address,
/// the owning unit the engine patches in place.
pub struct SectionImage {
    pub virtual_address: u64,
    pub bytes: Vec<u8>,
}

fn read_addend(bytes: &[u8], offset: usize, width: u8) -> i64 {
    match width {
        2 => i16::from_le_bytes([bytes[offset], bytes[offset + 1]]) as i64,
        4 => i32::from_le_bytes([
            bytes[offset],
            bytes[offset + 1],
            bytes[offset + 2],
            bytes[offset + 3],
        ]) as i64,
        _ => 0,
    }
}

fn write_patch(bytes: &mut [u8], offset: usize, width: u8, value: i64) {
    match width {
        2 => bytes[offset..offset + 2].copy_from_slice(&(value as i16).to_le_bytes()),
        4 => bytes[offset..offset + 4].copy_from_slice(&(value as i32).to_le_bytes()),
        _ => {}
    }
}

/// §4.5 scopes the overflow check to `W < 4`: a 4-byte patch always fits
/// its own width and is written modularly, no error.
fn fits_width(value: i64, width: u8, signed: bool) -> bool {
    match (width, signed) {
        (2, true) => (i16::MIN as i64..=i16::MAX as i64).contains(&value),
        (2, false) => (0..=u16::MAX as i64).contains(&value),
        _ => true,
    }
}

/// Applies one relocation against the section bytes it targets,
/// returning the patched value for diagnostics/tests.
fn apply_one(
    section: &mut SectionImage,
    reloc: &RelocationEntry,
    target: &RelocationTarget,
    symbol_name: &str,
) -> Result<()> {
    let width = reloc.relocation_type.width();
    if width == 0 {
        return Ok(());
    }
    let offset = reloc.offset as usize;
    if offset + width as usize > section.bytes.len() {
        return Err(Error::InvalidRelocation {
            reason: format!(
                "relocation at offset {offset} (width {width}) extends past the \
                 section's {} addressable bytes",
                section.bytes.len()
            ),
            context: ErrorContext::at(reloc.offset as u64),
        });
    }
    let a = read_addend(&section.bytes, offset, width);
    let p = section.virtual_address + reloc.offset as u64;
    let value: i64 = match reloc.relocation_type {
        RelocationType::None => return Ok(()),
        RelocationType::Abs32 | RelocationType::Abs16 => target.address as i64 + a,
        RelocationType::Rel32 | RelocationType::Rel16 => target.address as i64 + a - p as i64,
        RelocationType::Syscall => target.syscall_number as i64,
        RelocationType::Got => target.got_address as i64,
        RelocationType::Plt => target.plt_address as i64,
    };
    if !fits_width(value, width, reloc.relocation_type.is_pc_relative()) {
        return Err(Error::RelocationOverflow {
            offset: p,
            symbol: symbol_name.to_string(),
            width,
        });
    }
    write_patch(&mut section.bytes, offset, width, value);
    Ok(())
}

/// Applies every relocation in `relocations` against `sections`
/// (indexed by `RelocationEntry::section_index`), resolving each
/// target via `resolve`. Processing order follows §4.5: grouped by
/// section in file order, then by offset within a section.
pub fn apply_all<F>(
    sections: &mut [SectionImage],
    relocations: &[RelocationEntry],
    mut resolve: F,
) -> Result<()>
where
    F: FnMut(u16) -> Result<(RelocationTarget, String)>,
{
    let mut order: Vec<usize> = (0..relocations.len()).collect();
    order.sort_by_key(|&i| (relocations[i].section_index, relocations[i].offset));

    for i in order {
        let reloc = &relocations[i];
        let (target, symbol_name) = resolve(reloc.symbol_index)?;
        let section = &mut sections[reloc.section_index as usize];
        apply_one(section, reloc, &target, &symbol_name)?;
    }
    Ok(())
}
