//! Integration tests for the compression composer.

use std::io::Write;

use bzip2::write::BzEncoder;
use bzip2::Compression as BzCompression;
use flate2::write::ZlibEncoder;
use flate2::Compression as ZlibCompression;

use mpqdeck::compression::{decompress, decompress_pkware_only, flags, CompressionError};

fn zlib_compress(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), ZlibCompression::best());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

fn bzip2_compress(data: &[u8]) -> Vec<u8> {
    let mut encoder = BzEncoder::new(Vec::new(), BzCompression::best());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

#[test]
fn single_codec_zlib_block_round_trips() {
    let original = include_bytes!("../Cargo.toml");
    let compressed = zlib_compress(original);

    let mut block = vec![flags::ZLIB];
    block.extend_from_slice(&compressed);

    let decoded = decompress(&block, original.len()).unwrap();
    assert_eq!(decoded, original);
}

#[test]
fn single_codec_bzip2_block_round_trips() {
    let original = b"This is a test string that should compress well because it has repeated patterns. \
                      This is a test string that should compress well because it has repeated patterns. \
                      This is a test string that should compress well because it has repeated patterns.";

    let compressed = bzip2_compress(original);
    let mut block = vec![flags::BZIP2];
    block.extend_from_slice(&compressed);

    let decoded = decompress(&block, original.len()).unwrap();
    assert_eq!(decoded, original);
}

#[test]
fn composed_bzip2_then_zlib_round_trips() {
    // The mask scans zlib before bzip2, so a block compressed as
    // bzip2(zlib(original)) decodes by undoing zlib first, then bzip2.
    let original = b"alternating compression pipeline test data, repeated repeated repeated";
    let zlib_stage = zlib_compress(original);
    let outer = bzip2_compress(&zlib_stage);

    let mut block = vec![flags::ZLIB | flags::BZIP2];
    block.extend_from_slice(&outer);

    let decoded = decompress(&block, original.len()).unwrap();
    assert_eq!(decoded, original);
}

#[test]
fn pkware_only_block_has_no_mask_byte() {
    // Binary mode, 1 KiB dictionary, all-literal stream.
    let literals = b"IMPLODEONLY";
    let mut bits: Vec<bool> = Vec::new();
    for &byte in literals {
        bits.push(false);
        for i in 0..8 {
            bits.push((byte >> i) & 1 == 1);
        }
    }
    let mut bytes = Vec::new();
    let mut cur = 0u8;
    let mut n = 0u8;
    for bit in bits {
        if bit {
            cur |= 1 << n;
        }
        n += 1;
        if n == 8 {
            bytes.push(cur);
            cur = 0;
            n = 0;
        }
    }
    if n > 0 {
        bytes.push(cur);
    }

    let mut stream = vec![0x00, 0x04];
    stream.extend_from_slice(&bytes);

    let decoded = decompress_pkware_only(&stream, literals.len()).unwrap();
    assert_eq!(decoded, literals);
}

#[test]
fn unknown_mask_bit_is_rejected() {
    let block = vec![0x20, 0, 0, 0];
    let err = decompress(&block, 4).unwrap_err();
    assert!(matches!(err, CompressionError::UnsupportedMask(0x20)));
}

#[test]
fn empty_block_is_rejected() {
    assert!(decompress(&[], 10).is_err());
}

#[test]
fn truncated_zlib_stream_fails_rather_than_panics() {
    let block = vec![flags::ZLIB, 0xFF, 0xDE, 0xAD];
    assert!(decompress(&block, 100).is_err());
}

#[test]
fn large_repeated_payload_round_trips_through_zlib() {
    let pattern = b"The quick brown fox jumps over the lazy dog. ";
    let mut large_data = Vec::new();
    for _ in 0..(1024 * 1024 / pattern.len()) {
        large_data.extend_from_slice(pattern);
    }

    let compressed = zlib_compress(&large_data);
    let mut block = vec![flags::ZLIB];
    block.extend_from_slice(&compressed);

    let decoded = decompress(&block, large_data.len()).unwrap();
    assert_eq!(decoded, large_data);
}
