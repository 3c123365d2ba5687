//! MPQ header structures and parsing (v1/v2 only).
//!
//! v3 introduces the HET/BET tables and a 64-bit archive size; v4 adds
//! per-table MD5 checksums and a strong-signature raw chunk. Neither is
//! implemented here — see [`HeaderError::UnsupportedVersion`].

use std::io::{Read, Seek, SeekFrom};
use thiserror::Error;

use crate::error::ErrorKind;

/// Helper trait for reading little-endian integers.
trait ReadLittleEndian: Read {
    fn read_u16_le(&mut self) -> std::io::Result<u16> {
        let mut buf = [0u8; 2];
        self.read_exact(&mut buf)?;
        Ok(u16::from_le_bytes(buf))
    }

    fn read_u32_le(&mut self) -> std::io::Result<u32> {
        let mut buf = [0u8; 4];
        self.read_exact(&mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }

    fn read_u64_le(&mut self) -> std::io::Result<u64> {
        let mut buf = [0u8; 8];
        self.read_exact(&mut buf)?;
        Ok(u64::from_le_bytes(buf))
    }
}

impl<R: Read> ReadLittleEndian for R {}

/// Errors raised while locating or parsing an MPQ header.
#[derive(Error, Debug)]
pub enum HeaderError {
    /// I/O failure while scanning for or reading the header.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// No `MPQ\x1A` (or `MPQ\x1B` user-data) signature found within the
    /// configured search range.
    #[error("no MPQ header found within the first {0} bytes")]
    NotFound(u64),

    /// The version field names a format this crate does not parse.
    #[error("unsupported MPQ format version: {0}")]
    UnsupportedVersion(u16),

    /// `header_size` is smaller than the minimum for the declared version.
    #[error("header size {0} too small for version {1:?}")]
    InvalidHeaderSize(u32, FormatVersion),

    /// A user-data header pointed at an offset outside the file.
    #[error("user data header offset {0} is out of bounds")]
    UserDataOffsetOutOfBounds(u64),
}

impl HeaderError {
    /// Classify this error for [`crate::Error::kind`].
    pub fn kind(&self) -> ErrorKind {
        match self {
            HeaderError::Io(_) => ErrorKind::Read,
            HeaderError::NotFound(_) => ErrorKind::Format,
            HeaderError::UnsupportedVersion(_) => ErrorKind::Unsupported,
            HeaderError::InvalidHeaderSize(_, _) => ErrorKind::Format,
            HeaderError::UserDataOffsetOutOfBounds(_) => ErrorKind::Seek,
        }
    }
}

type Result<T> = std::result::Result<T, HeaderError>;

/// MPQ archive header signature (`MPQ\x1A`).
pub const MPQ_HEADER_SIGNATURE: u32 = 0x1A51_504D;

/// MPQ user data header signature (`MPQ\x1B`).
pub const MPQ_USERDATA_SIGNATURE: u32 = 0x1B51_504D;

/// Header alignment requirement while scanning for a header (512 bytes).
pub const HEADER_ALIGNMENT: u64 = 0x200;

/// Default search range used by [`find_header`] when the caller hasn't
/// requested a wider (or explicit) offset via `OpenOptions`.
pub const DEFAULT_SEARCH_LIMIT: u64 = 512 * 1024;

/// MPQ format version.
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FormatVersion {
    /// Original format (32-byte header).
    V1 = 0,
    /// The Burning Crusade format (44-byte header).
    V2 = 1,
}

impl FormatVersion {
    /// Header size in bytes for this version.
    pub fn header_size(&self) -> u32 {
        match self {
            FormatVersion::V1 => 0x20,
            FormatVersion::V2 => 0x2C,
        }
    }

    /// Parse the raw `u16` version field, rejecting v3/v4.
    fn from_raw(raw: u16) -> Result<Self> {
        match raw {
            0 => Ok(FormatVersion::V1),
            1 => Ok(FormatVersion::V2),
            _ => Err(HeaderError::UnsupportedVersion(raw)),
        }
    }
}

/// MPQ user data header (optional, appears before the main header).
#[derive(Debug, Clone)]
pub struct UserDataHeader {
    /// Maximum size of the user data block.
    pub user_data_size: u32,
    /// Offset of the MPQ header, relative to the start of this header.
    pub header_offset: u32,
    /// Size of this user data header.
    pub user_data_header_size: u32,
}

/// Main MPQ header structure.
#[derive(Debug, Clone)]
pub struct MpqHeader {
    /// Size of the archive header as stored on disk.
    pub header_size: u32,
    /// Size of the archive (32-bit, deprecated once files exceed 4 GiB).
    pub archive_size: u32,
    /// Format version.
    pub format_version: FormatVersion,
    /// Sector size, stored as a power-of-two exponent over 512 bytes.
    pub block_size: u16,
    /// Offset to the hash table, relative to the archive offset.
    pub hash_table_pos: u32,
    /// Offset to the block table, relative to the archive offset.
    pub block_table_pos: u32,
    /// Number of entries in the hash table.
    pub hash_table_size: u32,
    /// Number of entries in the block table.
    pub block_table_size: u32,

    // v2-only fields
    /// Offset to the hi-block table, if present.
    pub hi_block_table_pos: Option<u64>,
    /// High 16 bits of the hash table offset.
    pub hash_table_pos_hi: Option<u16>,
    /// High 16 bits of the block table offset.
    pub block_table_pos_hi: Option<u16>,
}

impl MpqHeader {
    /// Read an MPQ header from the current reader position.
    pub fn read<R: Read + Seek>(reader: &mut R) -> Result<Self> {
        let signature = reader.read_u32_le()?;
        if signature != MPQ_HEADER_SIGNATURE {
            return Err(HeaderError::NotFound(0));
        }

        let header_size = reader.read_u32_le()?;
        let archive_size = reader.read_u32_le()?;
        let format_version_raw = reader.read_u16_le()?;
        let block_size = reader.read_u16_le()?;
        let hash_table_pos = reader.read_u32_le()?;
        let block_table_pos = reader.read_u32_le()?;
        let hash_table_size = reader.read_u32_le()?;
        let block_table_size = reader.read_u32_le()?;

        let format_version = FormatVersion::from_raw(format_version_raw)?;

        if header_size < format_version.header_size() {
            return Err(HeaderError::InvalidHeaderSize(header_size, format_version));
        }

        let mut header = MpqHeader {
            header_size,
            archive_size,
            format_version,
            block_size,
            hash_table_pos,
            block_table_pos,
            hash_table_size,
            block_table_size,
            hi_block_table_pos: None,
            hash_table_pos_hi: None,
            block_table_pos_hi: None,
        };

        if format_version >= FormatVersion::V2 {
            header.hi_block_table_pos = Some(reader.read_u64_le()?);
            header.hash_table_pos_hi = Some(reader.read_u16_le()?);
            header.block_table_pos_hi = Some(reader.read_u16_le()?);
        }

        Ok(header)
    }

    /// Full 64-bit archive size (v1 archives never exceed `u32::MAX`).
    pub fn get_archive_size(&self) -> u64 {
        self.archive_size as u64
    }

    /// Full hash table position, combining the low 32 bits with the v2
    /// high-word extension when present.
    pub fn get_hash_table_pos(&self) -> u64 {
        match self.hash_table_pos_hi {
            Some(hi) => ((hi as u64) << 32) | (self.hash_table_pos as u64),
            None => self.hash_table_pos as u64,
        }
    }

    /// Full block table position, combining the low 32 bits with the v2
    /// high-word extension when present.
    pub fn get_block_table_pos(&self) -> u64 {
        match self.block_table_pos_hi {
            Some(hi) => ((hi as u64) << 32) | (self.block_table_pos as u64),
            None => self.block_table_pos as u64,
        }
    }

    /// Sector size in bytes, derived from `block_size`.
    pub fn sector_size(&self) -> usize {
        512usize << self.block_size
    }
}

/// Locate and parse the MPQ header, scanning 512-byte boundaries up to
/// `search_limit` bytes into the file (or reading directly at
/// `explicit_offset` when given).
///
/// Returns the absolute offset of the MPQ header (the archive's logical
/// start, from which all table/file positions are relative), the user
/// data header if one preceded it, and the parsed header itself.
pub fn find_header<R: Read + Seek>(
    reader: &mut R,
    explicit_offset: Option<u64>,
    search_limit: u64,
) -> Result<(u64, Option<UserDataHeader>, MpqHeader)> {
    if let Some(offset) = explicit_offset {
        reader.seek(SeekFrom::Start(offset))?;
        let header = MpqHeader::read(reader)?;
        return Ok((offset, None, header));
    }

    let file_size = reader.seek(SeekFrom::End(0))?;
    let scan_limit = search_limit.min(file_size);
    let mut offset = 0u64;

    loop {
        if offset >= scan_limit {
            return Err(HeaderError::NotFound(search_limit));
        }

        reader.seek(SeekFrom::Start(offset))?;

        let signature = match reader.read_u32_le() {
            Ok(sig) => sig,
            Err(_) => {
                offset += HEADER_ALIGNMENT;
                continue;
            }
        };

        match signature {
            MPQ_HEADER_SIGNATURE => {
                reader.seek(SeekFrom::Start(offset))?;
                let header = MpqHeader::read(reader)?;
                return Ok((offset, None, header));
            }
            MPQ_USERDATA_SIGNATURE => {
                let user_data_size = reader.read_u32_le()?;
                let header_offset = reader.read_u32_le()?;
                let user_data_header_size = reader.read_u32_le()?;

                let user_data = UserDataHeader {
                    user_data_size,
                    header_offset,
                    user_data_header_size,
                };

                let mpq_offset = offset + header_offset as u64;
                if mpq_offset >= file_size {
                    return Err(HeaderError::UserDataOffsetOutOfBounds(mpq_offset));
                }

                reader.seek(SeekFrom::Start(mpq_offset))?;
                if reader.read_u32_le()? == MPQ_HEADER_SIGNATURE {
                    reader.seek(SeekFrom::Start(mpq_offset))?;
                    let header = MpqHeader::read(reader)?;
                    return Ok((mpq_offset, Some(user_data), header));
                }
            }
            _ => {}
        }

        offset += HEADER_ALIGNMENT;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn v1_header_bytes() -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&MPQ_HEADER_SIGNATURE.to_le_bytes());
        buf.extend_from_slice(&0x20u32.to_le_bytes()); // header_size
        buf.extend_from_slice(&0x1000u32.to_le_bytes()); // archive_size
        buf.extend_from_slice(&0u16.to_le_bytes()); // version
        buf.extend_from_slice(&3u16.to_le_bytes()); // block_size (4096 sectors)
        buf.extend_from_slice(&0x40u32.to_le_bytes()); // hash_table_pos
        buf.extend_from_slice(&0x80u32.to_le_bytes()); // block_table_pos
        buf.extend_from_slice(&4u32.to_le_bytes()); // hash_table_size
        buf.extend_from_slice(&4u32.to_le_bytes()); // block_table_size
        buf
    }

    #[test]
    fn finds_header_at_offset_zero() {
        let data = v1_header_bytes();
        let mut cursor = Cursor::new(data);
        let (offset, user_data, header) =
            find_header(&mut cursor, None, DEFAULT_SEARCH_LIMIT).unwrap();
        assert_eq!(offset, 0);
        assert!(user_data.is_none());
        assert_eq!(header.format_version, FormatVersion::V1);
        assert_eq!(header.sector_size(), 4096);
    }

    #[test]
    fn finds_header_after_padding() {
        let mut data = vec![0u8; HEADER_ALIGNMENT as usize * 2];
        data.extend_from_slice(&v1_header_bytes());
        let mut cursor = Cursor::new(data);
        let (offset, _, header) = find_header(&mut cursor, None, DEFAULT_SEARCH_LIMIT).unwrap();
        assert_eq!(offset, HEADER_ALIGNMENT * 2);
        assert_eq!(header.format_version, FormatVersion::V1);
    }

    #[test]
    fn respects_search_limit() {
        let mut data = vec![0u8; HEADER_ALIGNMENT as usize * 4];
        data.extend_from_slice(&v1_header_bytes());
        let mut cursor = Cursor::new(data);
        let err = find_header(&mut cursor, None, HEADER_ALIGNMENT * 2).unwrap_err();
        assert!(matches!(err, HeaderError::NotFound(_)));
    }

    #[test]
    fn rejects_v3_version_field() {
        let mut data = v1_header_bytes();
        data[12] = 2; // version = 2 (v3)
        let mut cursor = Cursor::new(data);
        let err = find_header(&mut cursor, None, DEFAULT_SEARCH_LIMIT).unwrap_err();
        assert!(matches!(err, HeaderError::UnsupportedVersion(2)));
    }

    #[test]
    fn explicit_offset_skips_scanning() {
        let mut data = vec![0xFFu8; 777];
        data.extend_from_slice(&v1_header_bytes());
        let explicit = 777u64;
        let mut cursor = Cursor::new(data);
        let (offset, _, header) =
            find_header(&mut cursor, Some(explicit), DEFAULT_SEARCH_LIMIT).unwrap();
        assert_eq!(offset, explicit);
        assert_eq!(header.hash_table_size, 4);
    }
}
