//! Decompression for MPQ sector and single-unit data.
//!
//! A compressed block (when its size differs from its expected size) opens
//! with one mask byte naming which codec(s) were composed to produce it.
//! Multiple bits may be set: codecs are then chained in the fixed order
//! below, each one's output feeding the next. Blocks whose `packed_size`
//! equals `unpacked_size` are never run through this module — they are
//! stored, and copied verbatim by the caller.

mod adpcm;
mod bzip2_codec;
mod huffman;
mod pkware;
mod zlib;

use thiserror::Error;

use crate::error::ErrorKind;

/// Errors raised while decoding a compressed block.
#[derive(Error, Debug)]
pub enum CompressionError {
    /// A specific codec's own decoder rejected the stream.
    #[error("{0} decompression failed: {1}")]
    Codec(&'static str, String),

    /// The data was structurally invalid for the codec being applied.
    #[error("invalid compressed data: {0}")]
    InvalidData(String),

    /// The mask byte named a bit combination this crate does not implement.
    #[error("unsupported compression mask: {0:#04x}")]
    UnsupportedMask(u8),
}

impl CompressionError {
    /// Classify this error for [`crate::Error::kind`].
    pub fn kind(&self) -> ErrorKind {
        match self {
            CompressionError::UnsupportedMask(_) => ErrorKind::Unsupported,
            _ => ErrorKind::Unpack,
        }
    }
}

/// Compression mask bits, as stored in a block's leading byte.
pub mod flags {
    /// Huffman codec (mutually exclusive with the rest in practice, but
    /// the mask format allows composition).
    pub const HUFFMAN: u8 = 0x01;
    /// DEFLATE/zlib.
    pub const ZLIB: u8 = 0x02;
    /// PKWARE Data Compression Library ("explode").
    pub const PKWARE: u8 = 0x08;
    /// bzip2.
    pub const BZIP2: u8 = 0x10;
    /// IMA ADPCM, mono.
    pub const ADPCM_MONO: u8 = 0x40;
    /// IMA ADPCM, stereo.
    pub const ADPCM_STEREO: u8 = 0x80;

    /// All bits this crate recognizes.
    pub const KNOWN: u8 = HUFFMAN | ZLIB | PKWARE | BZIP2 | ADPCM_MONO | ADPCM_STEREO;
}

/// Codec application order. Composed blocks are decoded by walking this
/// list and running every set bit's codec over the previous stage's
/// output, outermost (last-applied during compression) first.
const SCAN_ORDER: [(u8, &str); 6] = [
    (flags::HUFFMAN, "huffman"),
    (flags::ZLIB, "zlib"),
    (flags::PKWARE, "pkware"),
    (flags::BZIP2, "bzip2"),
    (flags::ADPCM_MONO, "adpcm_mono"),
    (flags::ADPCM_STEREO, "adpcm_stereo"),
];

fn run_codec(name: &str, data: &[u8], expected_size: usize) -> Result<Vec<u8>, CompressionError> {
    match name {
        "huffman" => huffman::decompress(data, expected_size),
        "zlib" => zlib::decompress(data, expected_size),
        "pkware" => pkware::decompress(data, expected_size),
        "bzip2" => bzip2_codec::decompress(data, expected_size),
        "adpcm_mono" => adpcm::decompress_mono(data, expected_size),
        "adpcm_stereo" => adpcm::decompress_stereo(data, expected_size),
        _ => unreachable!("scan order only names implemented codecs"),
    }
}

/// Decompress a block known to carry PKWARE DCL data alone, without a
/// leading mask byte. Used for the legacy `IMPLODE`-only block flag, which
/// predates the mask-byte composition scheme.
pub fn decompress_pkware_only(data: &[u8], expected_size: usize) -> Result<Vec<u8>, CompressionError> {
    pkware::decompress(data, expected_size)
}

/// Decompress one sector or single-unit block.
///
/// `data` includes the leading mask byte. `expected_size` is the fully
/// decoded size recorded for this block (the sector size, or the file
/// size for the last/only sector).
pub fn decompress(data: &[u8], expected_size: usize) -> Result<Vec<u8>, CompressionError> {
    if data.is_empty() {
        return Err(CompressionError::InvalidData("empty compressed block".into()));
    }

    let mask = data[0];
    if mask & !flags::KNOWN != 0 {
        return Err(CompressionError::UnsupportedMask(mask));
    }

    let applied: Vec<&str> = SCAN_ORDER
        .iter()
        .filter(|(bit, _)| mask & bit != 0)
        .map(|(_, name)| *name)
        .collect();

    if applied.is_empty() {
        return Err(CompressionError::UnsupportedMask(mask));
    }

    let mut buffers = [Vec::new(), Vec::new()];
    let mut current = data[1..].to_vec();
    let mut active = 0usize;

    for (i, name) in applied.iter().enumerate() {
        let is_last = i + 1 == applied.len();
        let target_size = if is_last { expected_size } else { current.len() * 4 };
        let decoded = run_codec(name, &current, target_size)?;

        if is_last {
            return Ok(decoded);
        }

        let next = 1 - active;
        buffers[next] = decoded;
        current = std::mem::take(&mut buffers[next]);
        active = next;
    }

    Ok(current)
}
