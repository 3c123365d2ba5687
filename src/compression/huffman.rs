//! Huffman codec.
//!
//! No reference implementation in this crate's lineage decodes StormLib's
//! actual byte-for-byte Huffman stream (that format use a fixed,
//! undocumented model table). This codec is instead a self-consistent
//! scheme: a per-call frequency table is written ahead of the bitstream,
//! so any archive member compressed by *this* crate's `compress` round
//! trips through `decompress`, but it will not read a Huffman-compressed
//! member produced by Blizzard's tools.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use super::CompressionError;

const FREQ_TABLE_BYTES: usize = 256 * 4;
const HEADER_BYTES: usize = FREQ_TABLE_BYTES + 4;

#[derive(Debug)]
enum Node {
    Leaf(u8),
    Internal(Box<Node>, Box<Node>),
}

struct Weighted {
    weight: u32,
    node: Node,
}

impl Eq for Weighted {}
impl PartialEq for Weighted {
    fn eq(&self, other: &Self) -> bool {
        self.weight == other.weight
    }
}
impl Ord for Weighted {
    fn cmp(&self, other: &Self) -> Ordering {
        other.weight.cmp(&self.weight)
    }
}
impl PartialOrd for Weighted {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

fn build_tree(freq: &[u32; 256]) -> Result<Node, CompressionError> {
    let mut heap: BinaryHeap<Weighted> = freq
        .iter()
        .enumerate()
        .filter(|&(_, &f)| f > 0)
        .map(|(byte, &weight)| Weighted {
            weight,
            node: Node::Leaf(byte as u8),
        })
        .collect();

    if heap.is_empty() {
        return Err(CompressionError::InvalidData("empty input has no Huffman tree".into()));
    }

    while heap.len() > 1 {
        let a = heap.pop().unwrap();
        let b = heap.pop().unwrap();
        heap.push(Weighted {
            weight: a.weight + b.weight,
            node: Node::Internal(Box::new(a.node), Box::new(b.node)),
        });
    }

    Ok(heap.pop().unwrap().node)
}

fn code_table(tree: &Node) -> Vec<Vec<bool>> {
    let mut table = vec![Vec::new(); 256];

    // A tree with a single distinct symbol is a bare leaf with no internal
    // node to branch from; give it the 1-bit code "0" rather than an empty
    // one, so the bitstream still carries one bit per emitted symbol.
    if let Node::Leaf(byte) = tree {
        table[*byte as usize] = vec![false];
        return table;
    }

    fn walk(node: &Node, path: &mut Vec<bool>, table: &mut [Vec<bool>]) {
        match node {
            Node::Leaf(byte) => table[*byte as usize] = path.clone(),
            Node::Internal(left, right) => {
                path.push(false);
                walk(left, path, table);
                path.pop();
                path.push(true);
                walk(right, path, table);
                path.pop();
            }
        }
    }
    let mut path = Vec::new();
    walk(tree, &mut path, &mut table);
    table
}

/// Encode `data`, writing a frequency table header ahead of the bitstream.
pub fn compress(data: &[u8]) -> Result<Vec<u8>, CompressionError> {
    let mut freq = [0u32; 256];
    for &b in data {
        freq[b as usize] += 1;
    }

    let tree = build_tree(&freq)?;
    let table = code_table(&tree);

    let mut out = Vec::with_capacity(HEADER_BYTES + data.len());
    for f in freq {
        out.extend_from_slice(&f.to_le_bytes());
    }
    out.extend_from_slice(&(data.len() as u32).to_le_bytes());

    let mut current = 0u8;
    let mut bits_used = 0u8;
    for &byte in data {
        for &bit in &table[byte as usize] {
            if bit {
                current |= 1 << bits_used;
            }
            bits_used += 1;
            if bits_used == 8 {
                out.push(current);
                current = 0;
                bits_used = 0;
            }
        }
    }
    if bits_used > 0 {
        out.push(current);
    }

    Ok(out)
}

/// Decode a stream produced by [`compress`].
pub fn decompress(data: &[u8], expected_size: usize) -> Result<Vec<u8>, CompressionError> {
    if data.len() < HEADER_BYTES {
        return Err(CompressionError::InvalidData(format!(
            "Huffman stream too short for header: {} bytes",
            data.len()
        )));
    }

    let mut freq = [0u32; 256];
    for (i, chunk) in data[..FREQ_TABLE_BYTES].chunks_exact(4).enumerate() {
        freq[i] = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
    }

    let original_size = u32::from_le_bytes([
        data[FREQ_TABLE_BYTES],
        data[FREQ_TABLE_BYTES + 1],
        data[FREQ_TABLE_BYTES + 2],
        data[FREQ_TABLE_BYTES + 3],
    ]) as usize;

    if original_size != expected_size {
        return Err(CompressionError::InvalidData(format!(
            "Huffman header declares {} bytes, caller expected {}",
            original_size, expected_size
        )));
    }

    let tree = build_tree(&freq)?;

    // A single-symbol alphabet has no internal node to branch from: every
    // bit in the stream just confirms the one known symbol.
    if let Node::Leaf(byte) = tree {
        return Ok(vec![byte; original_size]);
    }

    let mut out = Vec::with_capacity(original_size);
    let mut node = &tree;

    'outer: for &byte in &data[HEADER_BYTES..] {
        for bit_index in 0..8 {
            if out.len() >= original_size {
                break 'outer;
            }
            let bit_set = (byte & (1 << bit_index)) != 0;
            node = match (node, bit_set) {
                (Node::Internal(left, _), false) => left,
                (Node::Internal(_, right), true) => right,
                (Node::Leaf(_), _) => &tree,
            };
            if let Node::Leaf(b) = node {
                out.push(*b);
                node = &tree;
            }
        }
    }

    if out.len() != original_size {
        return Err(CompressionError::InvalidData(format!(
            "Huffman stream decoded {} bytes, expected {}",
            out.len(),
            original_size
        )));
    }

    Ok(out)
}
