//! CRC-32 (IEEE polynomial `0xEDB88320`, init `0xFFFFFFFF`, final XOR
//! `0xFFFFFFFF`) per §4.1. `crc32fast` implements exactly this variant;
//! this module just gives it the names the rest of the crate expects.

/// Computes the CRC-32 of `bytes`.
pub fn crc32(bytes: &[u8]) -> u32 {
    crc32fast::hash(bytes)
}

/// Incremental CRC-32 accumulator, for checksumming a header with its
/// own checksum field held at zero (§3.2 archive header checksum).
#[derive(Default)]
pub struct Crc32 {
    hasher: crc32fast::Hasher,
}

impl Crc32 {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, bytes: &[u8]) {
        self.hasher.update(bytes);
    }

    pub fn finalize(self) -> u32 {
        self.hasher.finalize()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn matches_known_vector() {
        // CRC-32/ISO-HDLC of ASCII "123456789" is the standard check value.
        assert_eq!(crc32(b"123456789"), 0xCBF4_3926);
    }

    #[test]
    fn incremental_matches_one_shot() {
        let mut acc = Crc32::new();
        acc.update(b"123456789");
        assert_eq!(acc.finalize(), crc32(b"123456789"));
    }
}
