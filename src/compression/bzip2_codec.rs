//! bzip2 codec, backed by the `bzip2` crate.
//!
//! Named `bzip2_codec` rather than `bzip2` to avoid shadowing the crate of
//! the same name from within `compression::bzip2_codec`.

use bzip2::read::BzDecoder;
use std::io::Read;

use super::CompressionError;

/// Decompress a bzip2 stream.
pub fn decompress(data: &[u8], expected_size: usize) -> Result<Vec<u8>, CompressionError> {
    let mut decoder = BzDecoder::new(data);
    let mut out = Vec::with_capacity(expected_size);
    decoder
        .read_to_end(&mut out)
        .map_err(|e| CompressionError::Codec("bzip2", e.to_string()))?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bzip2::write::BzEncoder;
    use bzip2::Compression;
    use std::io::Write;

    #[test]
    fn roundtrip() {
        let original = b"the quick brown fox jumps over the lazy dog, repeatedly, for padding";
        let mut encoder = BzEncoder::new(Vec::new(), Compression::best());
        encoder.write_all(original).unwrap();
        let compressed = encoder.finish().unwrap();

        let decompressed = decompress(&compressed, original.len()).unwrap();
        assert_eq!(decompressed, original);
    }
}
