//! Error taxonomy shared by every codec, the resolver, the relocation
//! engine, and both driver façades.

use std::io;

/// Byte offset plus an optional entry index, attached to errors that
/// name where in a structural table something went wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, typed_builder::TypedBuilder)]
pub struct ErrorContext {
    /// Byte offset into the file where the failing entry starts.
    pub offset: u64,
    /// Index of the failing entry within its table, if applicable.
    #[builder(default, setter(strip_option))]
    pub index: Option<u32>,
}

impl ErrorContext {
    /// Shorthand for a context with no table index.
    pub fn at(offset: u64) -> Self {
        Self::builder().offset(offset).build()
    }

    /// Shorthand for a context naming both an offset and a table index.
    pub fn at_index(offset: u64, index: u32) -> Self {
        Self::builder().offset(offset).index(index).build()
    }
}

/// The complete error taxonomy from §7 of the specification.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("arena exhausted: requested {requested} bytes, {available} available")]
    OutOfMemory { requested: usize, available: usize },

    #[error("truncated input at offset {0:#x}: need {1} more bytes")]
    Truncated(u64, usize),

    #[error("invalid magic {found:#010x}, expected {expected:#010x}")]
    InvalidMagic { found: u32, expected: u32 },

    #[error("unsupported format version {found}, expected {expected}")]
    UnsupportedVersion { found: u16, expected: u16 },

    #[error("corrupt header: {reason} at {context:?}")]
    CorruptHeader { reason: String, context: ErrorContext },

    #[error("invalid section entry {context:?}: {reason}")]
    InvalidSection { reason: String, context: ErrorContext },

    #[error("invalid symbol entry {context:?}: {reason}")]
    InvalidSymbol { reason: String, context: ErrorContext },

    #[error("invalid relocation entry {context:?}: {reason}")]
    InvalidRelocation { reason: String, context: ErrorContext },

    #[error("unresolved symbol(s): {names:?}")]
    UnresolvedSymbol { names: Vec<String> },

    #[error("symbol `{name}` multiply defined (in object {first} and object {second})")]
    MultiplyDefined {
        name: String,
        first: u32,
        second: u32,
    },

    #[error("relocation at offset {offset:#x} for symbol `{symbol}` overflows its {width}-byte width")]
    RelocationOverflow {
        offset: u64,
        symbol: String,
        width: u8,
    },

    #[error("unsupported compression algorithm tag {0}")]
    UnsupportedCompression(u8),

    #[error("checksum mismatch at {context:?}")]
    ChecksumMismatch { context: ErrorContext },

    #[error("archive member not found: {0}")]
    MemberNotFound(String),

    #[error("I/O error: {0}")]
    FileIo(#[from] io::Error),

    #[error("operation cancelled")]
    Cancelled,
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Process exit code this error should map to (§6.3, §6.4: success /
    /// validation-or-resolution failure / I/O error).
    pub fn exit_code(&self) -> u8 {
        match self {
            Error::FileIo(_) => 2,
            _ => 1,
        }
    }
}
