//! Identity compression algorithm: produces a byte-identical copy
//! (§4.7, mandatory).

use super::{Codec, TAG_NONE};
use crate::error::{Error, Result};

pub struct NoneCodec;

impl Codec for NoneCodec {
    fn tag(&self) -> u8 {
        TAG_NONE
    }

    fn default_level(&self) -> u8 {
        0
    }

    fn compress(&self, _level: u8, input: &[u8]) -> Result<Vec<u8>> {
        Ok(input.to_vec())
    }

    fn decompress(&self, input: &[u8], expected_size: usize) -> Result<Vec<u8>> {
        if input.len() != expected_size {
            return Err(Error::InvalidArgument(format!(
                "NONE-compressed member is {} bytes, expected {expected_size}",
                input.len()
            )));
        }
        Ok(input.to_vec())
    }

    fn max_compressed_size(&self, input_size: usize) -> usize {
        input_size
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn round_trips_byte_identical() {
        let codec = NoneCodec;
        let data = b"hello world";
        let compressed = codec.compress(0, data).unwrap();
        assert_eq!(compressed, data);
        let decompressed = codec.decompress(&compressed, data.len()).unwrap();
        assert_eq!(decompressed, data);
    }

    #[test]
    fn rejects_length_mismatch() {
        let codec = NoneCodec;
        assert!(codec.decompress(b"abc", 4).is_err());
    }
}
