//! Deflate-compatible block compression via `flate2`'s zlib bindings
//! (§4.7).

use std::io::{Read, Write};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;

use super::{Codec, TAG_ZLIB};
use crate::error::{Error, Result};

pub struct ZlibCodec;

impl Codec for ZlibCodec {
    fn tag(&self) -> u8 {
        TAG_ZLIB
    }

    fn default_level(&self) -> u8 {
        6
    }

    fn compress(&self, level: u8, input: &[u8]) -> Result<Vec<u8>> {
        super::validate_level(level)?;
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::new(level as u32));
        encoder.write_all(input)?;
        Ok(encoder.finish()?)
    }

    fn decompress(&self, input: &[u8], expected_size: usize) -> Result<Vec<u8>> {
        let mut decoder = ZlibDecoder::new(input);
        let mut out = Vec::with_capacity(expected_size);
        decoder.read_to_end(&mut out)?;
        if out.len() != expected_size {
            return Err(Error::InvalidArgument(format!(
                "ZLIB-decompressed member is {} bytes, expected {expected_size}",
                out.len()
            )));
        }
        Ok(out)
    }

    fn max_compressed_size(&self, input_size: usize) -> usize {
        // zlib's documented worst-case expansion.
        input_size + (input_size / 1000) + 128
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn round_trips() {
        let codec = ZlibCodec;
        let data = b"the quick brown fox jumps over the lazy dog".repeat(4);
        let compressed = codec.compress(6, &data).unwrap();
        let decompressed = codec.decompress(&compressed, data.len()).unwrap();
        assert_eq!(decompressed, data);
    }

    #[test]
    fn rejects_level_above_nine() {
        let codec = ZlibCodec;
        assert!(codec.compress(10, b"data").is_err());
    }
}
