//! Pluggable compression codecs (§4.7).
//!
//! Every algorithm is registered under a one-byte tag carried in the
//! AR member header. `NONE` is mandatory and always registered; an
//! archive referencing an unregistered tag is rejected with
//! `UNSUPPORTED_COMPRESSION`.

mod none;
mod zlib;

use crate::error::{Error, Result};

pub use none::NoneCodec;
pub use zlib::ZlibCodec;

pub const TAG_NONE: u8 = 0;
pub const TAG_LZ4: u8 = 1;
pub const TAG_ZLIB: u8 = 2;
pub const TAG_LZMA: u8 = 3;

/// A pluggable compression algorithm (§4.7).
pub trait Codec {
    fn tag(&self) -> u8;
    fn default_level(&self) -> u8;
    fn compress(&self, level: u8, input: &[u8]) -> Result<Vec<u8>>;
    /// Decompresses `input`, verifying the output is exactly
    /// `expected_size` bytes.
    fn decompress(&self, input: &[u8], expected_size: usize) -> Result<Vec<u8>>;
    fn max_compressed_size(&self, input_size: usize) -> usize;
}

/// Looks up the codec registered for `tag`, or `UNSUPPORTED_COMPRESSION`.
pub fn lookup(tag: u8) -> Result<Box<dyn Codec>> {
    match tag {
        TAG_NONE => Ok(Box::new(NoneCodec)),
        TAG_ZLIB => Ok(Box::new(ZlibCodec)),
        _ => Err(Error::UnsupportedCompression(tag)),
    }
}

/// Validates `level` is within the mandated 0..=9 range (§4.7).
pub fn validate_level(level: u8) -> Result<()> {
    if level > 9 {
        return Err(Error::InvalidArgument(format!(
            "compression level {level} exceeds the maximum of 9"
        )));
    }
    Ok(())
}
