//! Opening MPQ archives and resolving member files by name or index.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::{Path, PathBuf};

use crate::file::FileHandle;
use crate::header::{self, FormatVersion, MpqHeader, UserDataHeader, DEFAULT_SEARCH_LIMIT};
use crate::listfile;
use crate::tables::{BlockTable, HashTable, HiBlockTable};
use crate::{Error, Result};

/// Builder for [`Archive::open_with`].
///
/// `Default` matches the legacy behavior a reader implementing this format
/// has always had: scan for the header within the first 512 KiB, and load
/// the internal `(listfile)` member automatically when present.
#[derive(Debug, Clone)]
pub struct OpenOptions {
    header_search_limit: u64,
    explicit_offset: Option<u64>,
    load_listfile: bool,
}

impl OpenOptions {
    /// Start from the default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Maximum number of bytes scanned for the header signature before
    /// giving up, when `explicit_offset` is not set.
    pub fn header_search_limit(mut self, limit: u64) -> Self {
        self.header_search_limit = limit;
        self
    }

    /// Skip scanning and read the header at this exact byte offset.
    pub fn explicit_offset(mut self, offset: u64) -> Self {
        self.explicit_offset = Some(offset);
        self
    }

    /// Whether to attempt loading the internal `(listfile)` member on open.
    pub fn load_listfile(mut self, enabled: bool) -> Self {
        self.load_listfile = enabled;
        self
    }

    /// Open an archive with these options.
    pub fn open<P: AsRef<Path>>(self, path: P) -> Result<Archive> {
        Archive::open_with(path, self)
    }
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            header_search_limit: DEFAULT_SEARCH_LIMIT,
            explicit_offset: None,
            load_listfile: true,
        }
    }
}

/// Information about one member file, as returned by [`Archive::list`].
#[derive(Debug, Clone)]
pub struct FileEntry {
    /// The file's name, if known (from the listfile or a prior lookup by
    /// name); `None` for members only reachable by dense index.
    pub name: Option<String>,
    /// Dense index: position among only the existing (non-deleted) blocks.
    pub dense_index: usize,
    /// Fully decoded size.
    pub size: u64,
    /// Size as stored in the archive.
    pub compressed_size: u64,
}

/// An open MPQ archive.
#[derive(Debug)]
pub struct Archive {
    path: PathBuf,
    reader: BufReader<File>,
    archive_offset: u64,
    user_data: Option<UserDataHeader>,
    header: MpqHeader,
    hash_table: HashTable,
    block_table: BlockTable,
    hi_block_table: Option<HiBlockTable>,
    /// Maps raw block-table indices to dense indices, for EXISTS blocks only.
    dense_index_of: HashMap<usize, usize>,
    /// Inverse of `dense_index_of`: dense index -> raw block-table index.
    raw_index_by_dense: Vec<usize>,
    sector_size: u32,
    /// Cache built from the `(listfile)` member, if loaded: name -> raw
    /// block-table index.
    name_cache: HashMap<String, usize>,
}

impl Archive {
    /// Open an existing archive with the default [`OpenOptions`].
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        OpenOptions::default().open(path)
    }

    /// Open an existing archive with explicit options.
    pub fn open_with<P: AsRef<Path>>(path: P, options: OpenOptions) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).map_err(|_| Error::ArchiveOpen(path.clone()))?;
        let mut reader = BufReader::new(file);

        let (archive_offset, user_data, header) =
            header::find_header(&mut reader, options.explicit_offset, options.header_search_limit)?;

        let sector_size = header.sector_size() as u32;

        let hash_table = HashTable::read(
            &mut reader,
            archive_offset + header.get_hash_table_pos(),
            header.hash_table_size,
        )?;
        let block_table = BlockTable::read(
            &mut reader,
            archive_offset + header.get_block_table_pos(),
            header.block_table_size,
        )?;

        let hi_block_table = match header.hi_block_table_pos {
            Some(pos) if pos > 0 => Some(HiBlockTable::read(
                &mut reader,
                archive_offset + pos,
                header.block_table_size,
            )?),
            _ => None,
        };

        let mut dense_index_of = HashMap::new();
        let mut raw_index_by_dense = Vec::new();
        for (raw_index, entry) in block_table.entries().iter().enumerate() {
            if entry.exists() {
                dense_index_of.insert(raw_index, raw_index_by_dense.len());
                raw_index_by_dense.push(raw_index);
            }
        }

        let mut archive = Archive {
            path,
            reader,
            archive_offset,
            user_data,
            header,
            hash_table,
            block_table,
            hi_block_table,
            dense_index_of,
            raw_index_by_dense,
            sector_size,
            name_cache: HashMap::new(),
        };

        if options.load_listfile {
            archive.load_listfile_cache();
        }

        Ok(archive)
    }

    /// The parsed archive header.
    pub fn header(&self) -> &MpqHeader {
        &self.header
    }

    /// The archive's format version.
    pub fn format_version(&self) -> FormatVersion {
        self.header.format_version
    }

    /// The optional user data header preceding the archive header.
    pub fn user_data(&self) -> Option<&UserDataHeader> {
        self.user_data.as_ref()
    }

    /// Absolute byte offset of the archive's logical start within the host
    /// file (all table and block positions are relative to this).
    pub fn archive_offset(&self) -> u64 {
        self.archive_offset
    }

    /// Path this archive was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of existing (non-deleted) member files.
    pub fn file_count(&self) -> usize {
        self.dense_index_of.len()
    }

    /// High 32 bits to add atop a block's 32-bit `file_pos`, from the
    /// hi-block table extension (v2+ archives larger than 4 GiB).
    fn file_pos_high(&self, raw_index: usize) -> u64 {
        self.hi_block_table
            .as_ref()
            .map(|t| t.get_file_pos_high(raw_index) << 32)
            .unwrap_or(0)
    }

    /// Resolve a file's raw block-table index by name.
    ///
    /// Tries the `(listfile)` name cache first, then falls back to a hash
    /// table probe (see [`HashTable::find_file`]).
    fn resolve_raw_index(&self, name: &str, locale: u16) -> Result<usize> {
        if let Some(&raw_index) = self.name_cache.get(&normalize_name(name)) {
            return Ok(raw_index);
        }

        let (_, entry) = self
            .hash_table
            .find_file(name, locale)
            .ok_or_else(|| Error::FileNotFound(name.to_string()))?;

        Ok(entry.block_index as usize)
    }

    /// Open a member file by name for reading.
    pub fn open_file(&mut self, name: &str) -> Result<FileHandle> {
        self.open_file_locale(name, 0)
    }

    /// Open a member file by name and locale (0 matches any locale).
    pub fn open_file_locale(&mut self, name: &str, locale: u16) -> Result<FileHandle> {
        let raw_index = self.resolve_raw_index(name, locale)?;
        self.open_file_by_raw_index(raw_index, Some(name.to_string()))
    }

    fn open_file_by_raw_index(&mut self, raw_index: usize, name: Option<String>) -> Result<FileHandle> {
        let block = *self
            .block_table
            .get(raw_index)
            .ok_or_else(|| Error::InvalidArchive(format!("block index {raw_index} out of range")))?;

        if !block.exists() {
            return Err(Error::FileNotFound(name.unwrap_or_else(|| format!("#{raw_index}"))));
        }

        let base_offset = self.archive_offset + self.file_pos_high(raw_index);
        FileHandle::open(&mut self.reader, name, &block, base_offset, self.sector_size)
    }

    /// Open a member file by dense index (0..file_count()).
    pub fn open_file_by_index(&mut self, dense_index: usize) -> Result<FileHandle> {
        let raw_index = *self
            .raw_index_by_dense
            .get(dense_index)
            .ok_or_else(|| Error::FileNotFound(self.synthetic_name(dense_index)))?;
        let name = self
            .name_cache
            .iter()
            .find(|&(_, &idx)| idx == raw_index)
            .map(|(name, _)| name.clone());
        self.open_file_by_raw_index(raw_index, name)
    }

    /// Read a member file's fully decoded contents by name.
    pub fn read_file(&mut self, name: &str) -> Result<Vec<u8>> {
        let handle = self.open_file(name)?;
        handle.read_all(&mut self.reader)
    }

    /// The name this archive would report for a member when no real name
    /// is known: `file######.xxx`, matching the legacy synthetic scheme.
    pub fn synthetic_name(&self, dense_index: usize) -> String {
        format!("file{dense_index:06}.xxx")
    }

    /// Resolve a member's display name: its real name if known via the
    /// listfile cache, otherwise the synthetic fallback.
    pub fn file_name(&self, dense_index: usize) -> String {
        self.raw_index_by_dense
            .get(dense_index)
            .and_then(|&raw_index| {
                self.name_cache
                    .iter()
                    .find(|&(_, &idx)| idx == raw_index)
                    .map(|(name, _)| name.clone())
            })
            .unwrap_or_else(|| self.synthetic_name(dense_index))
    }

    /// List every existing member file.
    ///
    /// Entries whose name was never resolved (no listfile entry, never
    /// looked up) report `name: None` and are only reachable by dense
    /// index.
    pub fn list(&self) -> Vec<FileEntry> {
        let reverse_names: HashMap<usize, &str> =
            self.name_cache.iter().map(|(name, &idx)| (idx, name.as_str())).collect();

        let mut entries: Vec<FileEntry> = self
            .block_table
            .entries()
            .iter()
            .enumerate()
            .filter_map(|(raw_index, block)| {
                let dense_index = *self.dense_index_of.get(&raw_index)?;
                Some(FileEntry {
                    name: reverse_names.get(&raw_index).map(|s| s.to_string()),
                    dense_index,
                    size: block.file_size as u64,
                    compressed_size: block.compressed_size as u64,
                })
            })
            .collect();

        entries.sort_by_key(|e| e.dense_index);
        entries
    }

    /// Load and parse the internal `(listfile)` member, populating the
    /// name -> raw-block-index cache. Failure here never fails archive
    /// open: a missing or corrupt listfile just means names stay
    /// unresolved until looked up directly.
    fn load_listfile_cache(&mut self) {
        let raw_index = match self.hash_table.find_file("(listfile)", 0) {
            Some((_, entry)) => entry.block_index as usize,
            None => return,
        };

        let data = match self.open_file_by_raw_index(raw_index, Some("(listfile)".to_string())) {
            Ok(handle) => match handle.read_all(&mut self.reader) {
                Ok(data) => data,
                Err(e) => {
                    log::warn!("failed to read (listfile): {e}");
                    return;
                }
            },
            Err(e) => {
                log::warn!("failed to open (listfile): {e}");
                return;
            }
        };

        let names = match listfile::parse_listfile(&data) {
            Ok(names) => names,
            Err(e) => {
                log::warn!("failed to parse (listfile): {e}");
                return;
            }
        };

        for name in names {
            if let Some((_, entry)) = self.hash_table.find_file(&name, 0) {
                self.name_cache.insert(normalize_name(&name), entry.block_index as usize);
            }
        }

        log::debug!("loaded {} names from (listfile)", self.name_cache.len());
    }
}

fn normalize_name(name: &str) -> String {
    name.replace('/', "\\").to_ascii_uppercase()
}
