//! Endian-aware bounded byte I/O and checksums (§4.1).

mod crc;
mod reader;
mod writer;

pub use crc::{crc32, Crc32};
pub use reader::ByteReader;
pub use writer::ByteWriter;
