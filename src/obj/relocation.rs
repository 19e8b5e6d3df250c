//! Relocation table entries (§3.1, §4.5).
//!
//! Unlike the symbol table's `section_index` (a `u16`, since a symbol may
//! sit in any of the format's up to 256 sections but also carries the
//! `SECTION_UNDEF` sentinel), a relocation's `section_index` only ever
//! names one of the object's own sections, so a single byte suffices and
//! is what the 8-byte entry size requires: offset4 + symbol_index2 +
//! type1 + section_index1 = 8.

use num_derive::FromPrimitive;
use num_traits::FromPrimitive;

use crate::error::{Error, ErrorContext, Result};
use crate::io::{ByteReader, ByteWriter};

/// On-disk size of one [`RelocationEntry`].
pub const RELOCATION_ENTRY_SIZE: u64 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive)]
#[repr(u8)]
pub enum RelocationType {
    None = 0,
    Abs32 = 1,
    Rel32 = 2,
    Abs16 = 3,
    Rel16 = 4,
    Syscall = 5,
    Got = 6,
    Plt = 7,
}

impl RelocationType {
    /// Width in bytes of the field this relocation patches (§4.5).
    pub fn width(&self) -> u8 {
        match self {
            RelocationType::None => 0,
            RelocationType::Abs32
            | RelocationType::Rel32
            | RelocationType::Syscall
            | RelocationType::Got
            | RelocationType::Plt => 4,
            RelocationType::Abs16 | RelocationType::Rel16 => 2,
        }
    }

    /// True for position-dependent (PC-relative) relocations, which use
    /// a signed overflow range; everything else is absolute/unsigned.
    pub fn is_pc_relative(&self) -> bool {
        matches!(self, RelocationType::Rel32 | RelocationType::Rel16)
    }
}

/// One relocation table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, typed_builder::TypedBuilder)]
pub struct RelocationEntry {
    /// Offset within `section_index` where the fix-up is applied.
    pub offset: u32,
    pub symbol_index: u16,
    pub relocation_type: RelocationType,
    pub section_index: u8,
}

impl RelocationEntry {
    pub fn from_reader(r: &ByteReader, at: u64, index: u32) -> Result<Self> {
        let offset = r.u32_at(at)?;
        let symbol_index = r.u16_at(at + 4)?;
        let raw_type = r.u8_at(at + 6)?;
        let section_index = r.u8_at(at + 7)?;
        let relocation_type =
            RelocationType::from_u8(raw_type).ok_or_else(|| Error::InvalidRelocation {
                reason: format!("unknown relocation type {raw_type}"),
                context: ErrorContext::at_index(at, index),
            })?;
        Ok(Self::builder()
            .offset(offset)
            .symbol_index(symbol_index)
            .relocation_type(relocation_type)
            .section_index(section_index)
            .build())
    }

    pub fn to_writer(&self, w: &mut ByteWriter) {
        w.write_u32(self.offset);
        w.write_u16(self.symbol_index);
        w.write_u8(self.relocation_type as u8);
        w.write_u8(self.section_index);
    }
}
