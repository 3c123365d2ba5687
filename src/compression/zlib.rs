//! DEFLATE/zlib codec, backed by `flate2`.

use flate2::read::ZlibDecoder;
use std::io::Read;

use super::CompressionError;

/// Inflate a zlib-wrapped DEFLATE stream.
pub fn decompress(data: &[u8], expected_size: usize) -> Result<Vec<u8>, CompressionError> {
    let mut decoder = ZlibDecoder::new(data);
    let mut out = Vec::with_capacity(expected_size);
    decoder
        .read_to_end(&mut out)
        .map_err(|e| CompressionError::Codec("zlib", e.to_string()))?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    use std::io::Write;

    #[test]
    fn roundtrip() {
        let original = b"the quick brown fox jumps over the lazy dog, repeatedly, for padding";
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::best());
        encoder.write_all(original).unwrap();
        let compressed = encoder.finish().unwrap();

        let decompressed = decompress(&compressed, original.len()).unwrap();
        assert_eq!(decompressed, original);
    }
}
