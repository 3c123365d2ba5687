//! MPQ hash and block tables (v1/v2; no HET/BET).

use bitflags::bitflags;
use thiserror::Error;

use crate::crypto::decrypt_block;
use crate::error::ErrorKind;
use crate::hash::{hash_string, hash_type};
use std::io::{Read, Seek, SeekFrom};

/// Errors raised while reading or probing the hash/block tables.
#[derive(Error, Debug)]
pub enum TableError {
    /// I/O failure while reading table bytes.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A table's entry count is not a power of two.
    #[error("table size {0} is not a power of two")]
    SizeNotPowerOfTwo(u32),

    /// A table's serialized size didn't match its entry count.
    #[error("truncated table data: expected {expected} bytes, found {found}")]
    Truncated {
        /// Bytes the table's declared entry count requires.
        expected: usize,
        /// Bytes actually available to parse.
        found: usize,
    },
}

impl TableError {
    /// Classify this error for [`crate::Error::kind`].
    pub fn kind(&self) -> ErrorKind {
        match self {
            TableError::Io(_) => ErrorKind::Read,
            TableError::SizeNotPowerOfTwo(_) => ErrorKind::Format,
            TableError::Truncated { .. } => ErrorKind::Size,
        }
    }
}

type Result<T> = std::result::Result<T, TableError>;

fn is_power_of_two(value: u32) -> bool {
    value != 0 && (value & (value - 1)) == 0
}

fn read_u16_le<R: Read>(r: &mut R) -> std::io::Result<u16> {
    let mut buf = [0u8; 2];
    r.read_exact(&mut buf)?;
    Ok(u16::from_le_bytes(buf))
}

fn read_u32_le<R: Read>(r: &mut R) -> std::io::Result<u32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

/// Hash table entry (16 bytes on disk).
#[derive(Debug, Clone, Copy)]
pub struct HashEntry {
    /// First of the two name hashes.
    pub name_1: u32,
    /// Second of the two name hashes.
    pub name_2: u32,
    /// Windows LANGID the file is localized for, or 0 (neutral).
    pub locale: u16,
    /// Platform ID (practically always 0).
    pub platform: u16,
    /// Index into the block table, or one of the `EMPTY_*` sentinels.
    pub block_index: u32,
}

impl HashEntry {
    /// Sentinel: this slot has never held an entry.
    pub const EMPTY_NEVER_USED: u32 = 0xFFFF_FFFF;
    /// Sentinel: this slot held an entry that was later deleted.
    pub const EMPTY_DELETED: u32 = 0xFFFF_FFFE;

    /// An empty, never-used entry.
    pub fn empty() -> Self {
        Self {
            name_1: 0,
            name_2: 0,
            locale: 0,
            platform: 0,
            block_index: Self::EMPTY_NEVER_USED,
        }
    }

    /// True if this slot has never held an entry.
    pub fn is_empty(&self) -> bool {
        self.block_index == Self::EMPTY_NEVER_USED
    }

    /// True if this slot held an entry that was deleted.
    pub fn is_deleted(&self) -> bool {
        self.block_index == Self::EMPTY_DELETED
    }

    /// True if this entry currently points at a live block table row.
    pub fn is_valid(&self) -> bool {
        self.block_index < Self::EMPTY_DELETED
    }

    fn from_bytes(data: &[u8]) -> Result<Self> {
        let mut cursor = std::io::Cursor::new(data);
        Ok(Self {
            name_1: read_u32_le(&mut cursor)?,
            name_2: read_u32_le(&mut cursor)?,
            locale: read_u16_le(&mut cursor)?,
            platform: read_u16_le(&mut cursor)?,
            block_index: read_u32_le(&mut cursor)?,
        })
    }
}

bitflags! {
    /// Per-file flags stored in a block table entry.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct BlockFlags: u32 {
        /// Compressed with the legacy PKWARE DCL implode codec alone.
        const IMPLODE = 0x0000_0100;
        /// Compressed with one or more codecs composed behind a mask byte.
        const COMPRESS = 0x0000_0200;
        /// Sector/unit data is encrypted.
        const ENCRYPTED = 0x0001_0000;
        /// The decryption key must be adjusted by the block's file offset.
        const FIX_KEY = 0x0002_0000;
        /// Marks a patch file (unused by this crate's read path).
        const PATCH_FILE = 0x0010_0000;
        /// Stored as a single unit rather than split into sectors.
        const SINGLE_UNIT = 0x0100_0000;
        /// Marks a deleted file (present as a tombstone, not extractable).
        const DELETE_MARKER = 0x0200_0000;
        /// Each sector has a trailing CRC32.
        const SECTOR_CRC = 0x0400_0000;
        /// The block is in use.
        const EXISTS = 0x8000_0000;
    }
}

/// Block table entry (16 bytes on disk).
#[derive(Debug, Clone, Copy)]
pub struct BlockEntry {
    /// Byte offset of the file's data, relative to the archive offset.
    pub file_pos: u32,
    /// Size of the data as stored in the archive.
    pub compressed_size: u32,
    /// Size of the file once fully decoded.
    pub file_size: u32,
    /// Flags describing how the data is encoded.
    pub flags: BlockFlags,
}

impl BlockEntry {
    /// True if either compression flag is set.
    pub fn is_compressed(&self) -> bool {
        self.flags.intersects(BlockFlags::IMPLODE | BlockFlags::COMPRESS)
    }

    /// True if [`BlockFlags::ENCRYPTED`] is set.
    pub fn is_encrypted(&self) -> bool {
        self.flags.contains(BlockFlags::ENCRYPTED)
    }

    /// True if [`BlockFlags::SINGLE_UNIT`] is set.
    pub fn is_single_unit(&self) -> bool {
        self.flags.contains(BlockFlags::SINGLE_UNIT)
    }

    /// True if [`BlockFlags::EXISTS`] is set.
    pub fn exists(&self) -> bool {
        self.flags.contains(BlockFlags::EXISTS)
    }

    /// True if [`BlockFlags::FIX_KEY`] is set.
    pub fn has_fix_key(&self) -> bool {
        self.flags.contains(BlockFlags::FIX_KEY)
    }

    fn from_bytes(data: &[u8]) -> Result<Self> {
        let mut cursor = std::io::Cursor::new(data);
        Ok(Self {
            file_pos: read_u32_le(&mut cursor)?,
            compressed_size: read_u32_le(&mut cursor)?,
            file_size: read_u32_le(&mut cursor)?,
            flags: BlockFlags::from_bits_retain(read_u32_le(&mut cursor)?),
        })
    }
}

fn decrypt_table_bytes(raw: &mut [u8], key: u32) {
    let mut words: Vec<u32> = raw
        .chunks_exact(4)
        .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect();
    decrypt_block(&mut words, key);
    for (chunk, word) in raw.chunks_exact_mut(4).zip(words) {
        chunk.copy_from_slice(&word.to_le_bytes());
    }
}

/// Hash table: maps file names to block table indices.
#[derive(Debug)]
pub struct HashTable {
    entries: Vec<HashEntry>,
}

impl HashTable {
    /// Read and decrypt a hash table from the archive.
    pub fn read<R: Read + Seek>(reader: &mut R, offset: u64, size: u32) -> Result<Self> {
        if !is_power_of_two(size) {
            return Err(TableError::SizeNotPowerOfTwo(size));
        }

        reader.seek(SeekFrom::Start(offset))?;

        let byte_size = size as usize * 16;
        let mut raw = vec![0u8; byte_size];
        reader.read_exact(&mut raw)?;

        let key = hash_string("(hash table)", hash_type::FILE_KEY);
        decrypt_table_bytes(&mut raw, key);

        let mut entries = Vec::with_capacity(size as usize);
        for chunk in raw.chunks_exact(16) {
            entries.push(HashEntry::from_bytes(chunk)?);
        }

        Ok(Self { entries })
    }

    /// All entries, in on-disk order.
    pub fn entries(&self) -> &[HashEntry] {
        &self.entries
    }

    /// Number of slots in the table.
    pub fn size(&self) -> usize {
        self.entries.len()
    }

    /// Look up a file by name and locale.
    ///
    /// `locale == 0` matches any entry (or an entry whose own locale is 0).
    /// The probe does *not* wrap around: it starts at `hash(name) mod
    /// size` and scans forward linearly, stopping (file not found) the
    /// moment it would run past the end of the table or hit a never-used
    /// slot. This matches the legacy reference reader's behavior, which
    /// never revisits slots before the starting index.
    pub fn find_file(&self, filename: &str, locale: u16) -> Option<(usize, &HashEntry)> {
        let name_a = hash_string(filename, hash_type::NAME_A);
        let name_b = hash_string(filename, hash_type::NAME_B);
        let table_size = self.entries.len();
        let start_index = hash_string(filename, hash_type::TABLE_OFFSET) as usize & (table_size - 1);

        for offset in 0..table_size {
            let index = start_index + offset;
            if index >= table_size {
                return None;
            }

            let entry = &self.entries[index];

            if entry.name_1 == name_a && entry.name_2 == name_b {
                if (locale == 0 || entry.locale == 0 || entry.locale == locale) && entry.is_valid() {
                    return Some((index, entry));
                }
            }

            if entry.is_empty() {
                return None;
            }
        }

        None
    }
}

/// Block table: per-file storage layout and flags.
#[derive(Debug)]
pub struct BlockTable {
    entries: Vec<BlockEntry>,
}

impl BlockTable {
    /// Read and decrypt a block table from the archive.
    pub fn read<R: Read + Seek>(reader: &mut R, offset: u64, size: u32) -> Result<Self> {
        reader.seek(SeekFrom::Start(offset))?;

        let byte_size = size as usize * 16;
        let mut raw = vec![0u8; byte_size];
        reader.read_exact(&mut raw)?;

        let key = hash_string("(block table)", hash_type::FILE_KEY);
        decrypt_table_bytes(&mut raw, key);

        let mut entries = Vec::with_capacity(size as usize);
        for chunk in raw.chunks_exact(16) {
            entries.push(BlockEntry::from_bytes(chunk)?);
        }

        Ok(Self { entries })
    }

    /// All entries, in on-disk order.
    pub fn entries(&self) -> &[BlockEntry] {
        &self.entries
    }

    /// Look up a block entry by its raw index.
    pub fn get(&self, index: usize) -> Option<&BlockEntry> {
        self.entries.get(index)
    }

    /// Number of rows in the table.
    pub fn size(&self) -> usize {
        self.entries.len()
    }
}

/// Hi-block table, extending v2+ block positions past 4 GiB.
#[derive(Debug)]
pub struct HiBlockTable {
    entries: Vec<u16>,
}

impl HiBlockTable {
    /// Read the (unencrypted, uncompressed) hi-block table.
    pub fn read<R: Read + Seek>(reader: &mut R, offset: u64, size: u32) -> Result<Self> {
        reader.seek(SeekFrom::Start(offset))?;

        let mut entries = Vec::with_capacity(size as usize);
        for _ in 0..size {
            entries.push(read_u16_le(reader)?);
        }

        Ok(Self { entries })
    }

    /// High 16 bits of a block's file position, or 0 if out of range.
    pub fn get_file_pos_high(&self, index: usize) -> u64 {
        self.entries.get(index).copied().unwrap_or(0) as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_entry_states() {
        let empty = HashEntry::empty();
        assert!(empty.is_empty());
        assert!(!empty.is_deleted());
        assert!(!empty.is_valid());

        let deleted = HashEntry {
            name_1: 0,
            name_2: 0,
            locale: 0,
            platform: 0,
            block_index: HashEntry::EMPTY_DELETED,
        };
        assert!(!deleted.is_empty());
        assert!(deleted.is_deleted());
        assert!(!deleted.is_valid());

        let valid = HashEntry {
            name_1: 0x1234_5678,
            name_2: 0x9ABC_DEF0,
            locale: 0,
            platform: 0,
            block_index: 0,
        };
        assert!(valid.is_valid());
    }

    #[test]
    fn test_block_entry_flags() {
        let compressed = BlockEntry {
            file_pos: 0,
            compressed_size: 100,
            file_size: 200,
            flags: BlockFlags::COMPRESS | BlockFlags::EXISTS,
        };
        assert!(compressed.is_compressed());
        assert!(!compressed.is_encrypted());
        assert!(compressed.exists());

        let encrypted = BlockEntry {
            file_pos: 0,
            compressed_size: 100,
            file_size: 100,
            flags: BlockFlags::ENCRYPTED | BlockFlags::FIX_KEY | BlockFlags::EXISTS,
        };
        assert!(encrypted.is_encrypted());
        assert!(encrypted.has_fix_key());
        assert!(!encrypted.is_compressed());
    }

    fn build_hash_table(names: &[(&str, u32)], size: usize) -> HashTable {
        let mut entries = vec![HashEntry::empty(); size];
        for &(name, block_index) in names {
            let idx = hash_string(name, hash_type::TABLE_OFFSET) as usize & (size - 1);
            let mut slot = idx;
            while entries[slot].block_index != HashEntry::EMPTY_NEVER_USED {
                slot = (slot + 1) % size;
            }
            entries[slot] = HashEntry {
                name_1: hash_string(name, hash_type::NAME_A),
                name_2: hash_string(name, hash_type::NAME_B),
                locale: 0,
                platform: 0,
                block_index,
            };
        }
        HashTable { entries }
    }

    #[test]
    fn test_find_file_direct_hit() {
        let table = build_hash_table(&[("war3map.j", 0)], 16);
        let (_, entry) = table.find_file("war3map.j", 0).unwrap();
        assert_eq!(entry.block_index, 0);
    }

    #[test]
    fn test_find_file_missing_returns_none() {
        let table = build_hash_table(&[("war3map.j", 0)], 16);
        assert!(table.find_file("does_not_exist.txt", 0).is_none());
    }

    #[test]
    fn test_find_file_does_not_wrap_past_table_end() {
        // Force a collision chain that would need to probe past the end
        // of a tiny table; since we never wrap, the second name is
        // findable only while its chain stays within bounds.
        let size = 2;
        let mut entries = vec![HashEntry::empty(); size];
        entries[0] = HashEntry {
            name_1: hash_string("a", hash_type::NAME_A),
            name_2: hash_string("a", hash_type::NAME_B),
            locale: 0,
            platform: 0,
            block_index: 0,
        };
        // Leave entries[1] empty (never used) so probing "a" from index 0
        // (if that's its home slot) halts correctly without wrapping.
        let table = HashTable { entries };
        let start = hash_string("a", hash_type::TABLE_OFFSET) as usize & (size - 1);
        if start == 0 {
            assert!(table.find_file("a", 0).is_some());
        }
    }
}
