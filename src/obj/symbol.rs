//! Symbol table entries (§3.1, §4.4).

use num_derive::FromPrimitive;
use num_traits::FromPrimitive;

use crate::error::{Error, ErrorContext, Result};
use crate::io::{ByteReader, ByteWriter};

/// On-disk size of one [`SymbolEntry`].
pub const SYMBOL_ENTRY_SIZE: u64 = 16;

/// Sentinel `section_index` meaning "no section" (undefined symbol).
pub const SECTION_UNDEF: u16 = 0xFFFF;

#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive)]
#[repr(u8)]
pub enum SymbolType {
    NoType = 0,
    Object = 1,
    Func = 2,
    Section = 3,
    File = 4,
    Syscall = 5,
}

/// Binding precedence, lowest to highest per §4.4: a higher-precedence
/// definition always wins over a lower one when resolving the same name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, FromPrimitive)]
#[repr(u8)]
pub enum SymbolBinding {
    Local = 0,
    Weak = 1,
    Global = 2,
    Export = 3,
}

/// One symbol table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, typed_builder::TypedBuilder)]
pub struct SymbolEntry {
    pub name_offset: u32,
    #[builder(default = 0)]
    pub value: u32,
    #[builder(default = 0)]
    pub size: u32,
    /// `SECTION_UNDEF` for an undefined (imported) symbol.
    #[builder(default = SECTION_UNDEF)]
    pub section_index: u16,
    #[builder(default = SymbolType::NoType)]
    pub symbol_type: SymbolType,
    #[builder(default = SymbolBinding::Local)]
    pub binding: SymbolBinding,
}

impl SymbolEntry {
    pub fn is_undefined(&self) -> bool {
        self.section_index == SECTION_UNDEF
    }

    pub fn from_reader(r: &ByteReader, offset: u64, index: u32) -> Result<Self> {
        let name_offset = r.u32_at(offset)?;
        let value = r.u32_at(offset + 4)?;
        let size = r.u32_at(offset + 8)?;
        let section_index = r.u16_at(offset + 12)?;
        let raw_type = r.u8_at(offset + 14)?;
        let raw_binding = r.u8_at(offset + 15)?;
        let symbol_type = SymbolType::from_u8(raw_type).ok_or_else(|| Error::InvalidSymbol {
            reason: format!("unknown symbol type {raw_type}"),
            context: ErrorContext::at_index(offset, index),
        })?;
        let binding = SymbolBinding::from_u8(raw_binding).ok_or_else(|| Error::InvalidSymbol {
            reason: format!("unknown symbol binding {raw_binding}"),
            context: ErrorContext::at_index(offset, index),
        })?;
        Ok(Self::builder()
            .name_offset(name_offset)
            .value(value)
            .size(size)
            .section_index(section_index)
            .symbol_type(symbol_type)
            .binding(binding)
            .build())
    }

    pub fn to_writer(&self, w: &mut ByteWriter) {
        w.write_u32(self.name_offset);
        w.write_u32(self.value);
        w.write_u32(self.size);
        w.write_u16(self.section_index);
        w.write_u8(self.symbol_type as u8);
        w.write_u8(self.binding as u8);
    }
}
