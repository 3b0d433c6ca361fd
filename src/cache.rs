//! Cache blob parsing and the read-only query surface

use std::fs::File;
use std::path::Path;
use std::str;
use std::sync::Arc;

use ahash::AHashMap;
use byteorder::{BigEndian, ByteOrder};
use memmap2::Mmap;

use crate::error::{CacheError, CacheResult, SecurityLimits};
use crate::types::{CacheStatistics, IconEntry, IconFlags};

/// Only 1.0 blobs are accepted; anything else is a different schema.
const MAJOR_VERSION: u16 = 1;
const MINOR_VERSION: u16 = 0;

/// Sentinel chain offset marking an empty bucket or the end of a chain
const OFFSET_NONE: u32 = 0xFFFF_FFFF;

/// Payload type tag for encoded raster data (PNG and friends)
const PAYLOAD_TYPE_RASTER: u32 = 0;

const HEADER_LEN: usize = 12;
const ICON_NODE_LEN: usize = 12;
const IMAGE_ENTRY_LEN: usize = 8;

/// Read-only view of a precomputed icon theme cache
///
/// Parsing and validation happen once at construction; every query after
/// that is a total, in-memory lookup that reports absence instead of
/// failing. The handle is cheap to clone: clones share the parsed tables
/// and the underlying blob, which is released when the last clone is
/// dropped. Because nothing is mutated after construction, a cache can be
/// queried from multiple threads without locking.
#[derive(Clone)]
pub struct IconCache {
    inner: Arc<CacheInner>,
}

struct CacheInner {
    buffer: CacheBuffer,
    directories: Vec<String>,
    dir_lookup: AHashMap<String, u16>,
    icons: AHashMap<String, Vec<ImageRecord>>,
    dir_icon_counts: Vec<usize>,
    stats: CacheStatistics,
}

/// Backing storage for the blob: owned bytes or a mapped file
enum CacheBuffer {
    Owned(Vec<u8>),
    Mapped(Mmap),
}

impl CacheBuffer {
    fn bytes(&self) -> &[u8] {
        match self {
            CacheBuffer::Owned(data) => data,
            CacheBuffer::Mapped(mmap) => mmap,
        }
    }
}

/// One parsed image-list entry for an icon name
#[derive(Debug, Clone, Copy)]
struct ImageRecord {
    directory: u16,
    flags: IconFlags,
    payload: Option<Payload>,
}

/// Bounds-checked location of an embedded pixel payload
#[derive(Debug, Clone, Copy)]
struct Payload {
    block_offset: u32,
    start: usize,
    len: usize,
}

impl IconCache {
    /// Parse a cache from an in-memory blob with default limits
    pub fn from_bytes(data: Vec<u8>) -> CacheResult<Self> {
        Self::from_bytes_with_limits(data, SecurityLimits::default())
    }

    /// Parse a cache from an in-memory blob with custom limits
    pub fn from_bytes_with_limits(data: Vec<u8>, limits: SecurityLimits) -> CacheResult<Self> {
        limits.validate_file_size(data.len())?;
        let parsed = parse_blob(&data, &limits)?;
        Ok(Self::assemble(CacheBuffer::Owned(data), parsed))
    }

    /// Load and parse a cache file with default limits
    ///
    /// The file is memory-mapped; the mapping lives as long as any clone of
    /// the returned cache.
    pub fn from_path<P: AsRef<Path>>(path: P) -> CacheResult<Self> {
        Self::from_path_with_limits(path, SecurityLimits::default())
    }

    /// Load and parse a cache file with custom limits
    pub fn from_path_with_limits<P: AsRef<Path>>(
        path: P,
        limits: SecurityLimits,
    ) -> CacheResult<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let file_size = file.metadata()?.len() as usize;
        limits.validate_file_size(file_size)?;

        // Memory map instead of reading: lookups slice payloads straight
        // out of the mapping.
        let mmap = unsafe { Mmap::map(&file)? };
        let parsed = parse_blob(&mmap, &limits)?;
        log::debug!(
            "Loaded icon cache from {:?}: {} directories, {} icons",
            path,
            parsed.directories.len(),
            parsed.icons.len()
        );
        Ok(Self::assemble(CacheBuffer::Mapped(mmap), parsed))
    }

    fn assemble(buffer: CacheBuffer, parsed: ParsedTables) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                buffer,
                directories: parsed.directories,
                dir_lookup: parsed.dir_lookup,
                icons: parsed.icons,
                dir_icon_counts: parsed.dir_icon_counts,
                stats: parsed.stats,
            }),
        }
    }

    /// Look up the index of a directory, `None` if absent
    ///
    /// The index is only meaningful for the cache instance that produced it.
    pub fn directory_index(&self, directory: &str) -> Option<u16> {
        self.inner.dir_lookup.get(directory).copied()
    }

    /// All directory names, in index order
    pub fn directories(&self) -> &[String] {
        &self.inner.directories
    }

    /// True if the icon name exists in any directory
    pub fn has_icon(&self, icon_name: &str) -> bool {
        self.inner.icons.contains_key(icon_name)
    }

    /// True only if the icon exists under the named directory
    pub fn has_icon_in_directory(&self, icon_name: &str, directory: &str) -> bool {
        let Some(index) = self.directory_index(directory) else {
            return false;
        };
        self.inner
            .icons
            .get(icon_name)
            .is_some_and(|records| records.iter().any(|r| r.directory == index))
    }

    /// True if the directory exists and holds at least one icon
    pub fn has_icons(&self, directory: &str) -> bool {
        self.directory_index(directory)
            .is_some_and(|index| self.inner.dir_icon_counts[index as usize] > 0)
    }

    /// Collect every icon entry under the named directory
    ///
    /// Returns an owned map the caller is free to merge into its own
    /// bookkeeping; an unknown directory yields an empty map. The cache
    /// itself is never mutated.
    pub fn icons_in_directory(&self, directory: &str) -> AHashMap<String, IconEntry> {
        let mut found = AHashMap::new();
        let Some(index) = self.directory_index(directory) else {
            return found;
        };
        for (name, records) in &self.inner.icons {
            if let Some(record) = records.iter().find(|r| r.directory == index) {
                found.insert(name.clone(), record.to_entry());
            }
        }
        found
    }

    /// Variant flags for an icon under a directory index
    ///
    /// Absent (name, index) pairs report empty flags.
    pub fn icon_flags(&self, icon_name: &str, directory_index: u16) -> IconFlags {
        self.record(icon_name, directory_index)
            .map_or(IconFlags::NONE, |r| r.flags)
    }

    /// Raw encoded pixel payload for an icon under a directory index
    ///
    /// Returns the embedded bytes as stored, leaving decoding to the
    /// caller; `None` when the pair is absent or carries no payload.
    /// Payload bounds were validated at construction, so the slice is
    /// always in range.
    pub fn icon_data(&self, icon_name: &str, directory_index: u16) -> Option<&[u8]> {
        let payload = self.record(icon_name, directory_index)?.payload?;
        Some(&self.inner.buffer.bytes()[payload.start..payload.start + payload.len])
    }

    /// Decode the embedded pixel payload for an icon under a directory index
    ///
    /// `None` when the pair is absent, has no payload, or the payload fails
    /// to decode; decode failures are logged, never fatal.
    pub fn icon(&self, icon_name: &str, directory_index: u16) -> Option<image::DynamicImage> {
        let data = self.icon_data(icon_name, directory_index)?;
        match image::load_from_memory(data) {
            Ok(decoded) => Some(decoded),
            Err(e) => {
                log::warn!(
                    "Failed to decode embedded payload for icon '{}' (directory {}): {}",
                    icon_name,
                    directory_index,
                    e
                );
                None
            }
        }
    }

    /// Summary counters for this cache
    pub fn statistics(&self) -> CacheStatistics {
        self.inner.stats.clone()
    }

    fn record(&self, icon_name: &str, directory_index: u16) -> Option<&ImageRecord> {
        self.inner
            .icons
            .get(icon_name)?
            .iter()
            .find(|r| r.directory == directory_index)
    }
}

impl std::fmt::Debug for IconCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IconCache")
            .field("directories", &self.inner.directories.len())
            .field("icons", &self.inner.icons.len())
            .field("blob_size", &self.inner.buffer.bytes().len())
            .finish()
    }
}

impl ImageRecord {
    fn to_entry(self) -> IconEntry {
        IconEntry {
            directory_index: self.directory,
            flags: self.flags,
            data_offset: self.payload.map(|p| p.block_offset),
        }
    }
}

/// Hash used to place icon names into buckets on disk
///
/// Multiplicative 31 hash over the raw bytes, matching what cache writers
/// use; parsing verifies each chain node against it to catch corrupted or
/// misassembled tables.
pub(crate) fn icon_name_hash(name: &str) -> u32 {
    let bytes = name.as_bytes();
    let Some(&first) = bytes.first() else {
        return 0;
    };
    let mut h = u32::from(first);
    for &b in &bytes[1..] {
        h = h.wrapping_mul(31).wrapping_add(u32::from(b));
    }
    h
}

struct ParsedTables {
    directories: Vec<String>,
    dir_lookup: AHashMap<String, u16>,
    icons: AHashMap<String, Vec<ImageRecord>>,
    dir_icon_counts: Vec<usize>,
    stats: CacheStatistics,
}

/// Bounds-checked reads over the raw blob
struct Blob<'a> {
    bytes: &'a [u8],
}

impl<'a> Blob<'a> {
    fn range(&self, offset: u32, len: usize, section: &'static str) -> CacheResult<usize> {
        let start = offset as usize;
        let end = start
            .checked_add(len)
            .ok_or(CacheError::SectionOutOfBounds {
                section,
                offset,
                len: self.bytes.len(),
            })?;
        if end > self.bytes.len() {
            return Err(CacheError::SectionOutOfBounds {
                section,
                offset,
                len: self.bytes.len(),
            });
        }
        Ok(start)
    }

    fn read_u16(&self, offset: u32, section: &'static str) -> CacheResult<u16> {
        let start = self.range(offset, 2, section)?;
        Ok(BigEndian::read_u16(&self.bytes[start..start + 2]))
    }

    fn read_u32(&self, offset: u32, section: &'static str) -> CacheResult<u32> {
        let start = self.range(offset, 4, section)?;
        Ok(BigEndian::read_u32(&self.bytes[start..start + 4]))
    }

    fn read_cstr(&self, offset: u32, section: &'static str) -> CacheResult<&'a str> {
        let start = self.range(offset, 1, section)?;
        let terminator = self.bytes[start..]
            .iter()
            .position(|&b| b == 0)
            .ok_or(CacheError::UnterminatedString { offset })?;
        str::from_utf8(&self.bytes[start..start + terminator])
            .map_err(|_| CacheError::InvalidUtf8 { offset })
    }
}

/// Parse and validate an entire blob into lookup tables
///
/// Every offset the tables reference is checked here, including embedded
/// payload extents, so queries can slice the buffer without re-validating.
fn parse_blob(data: &[u8], limits: &SecurityLimits) -> CacheResult<ParsedTables> {
    if data.len() < HEADER_LEN {
        return Err(CacheError::FileTooShort {
            expected: HEADER_LEN,
            actual: data.len(),
        });
    }

    let blob = Blob { bytes: data };

    let major = blob.read_u16(0, "header")?;
    let minor = blob.read_u16(2, "header")?;
    if major != MAJOR_VERSION || minor != MINOR_VERSION {
        return Err(CacheError::UnsupportedVersion { major, minor });
    }
    let hash_offset = blob.read_u32(4, "header")?;
    let dir_list_offset = blob.read_u32(8, "header")?;

    let (directories, dir_lookup) = parse_directories(&blob, dir_list_offset, limits)?;
    let mut dir_icon_counts = vec![0usize; directories.len()];

    let mut icons: AHashMap<String, Vec<ImageRecord>> = AHashMap::new();
    let mut total_images = 0usize;
    let mut embedded_payloads = 0usize;

    let n_buckets = blob.read_u32(hash_offset, "hash table")?;
    if n_buckets == 0 {
        return Err(CacheError::EmptyHashTable);
    }
    blob.range(
        hash_offset + 4,
        n_buckets as usize * 4,
        "hash bucket table",
    )?;

    let mut visited_nodes = 0usize;
    for bucket in 0..n_buckets {
        let mut node_offset = blob.read_u32(hash_offset + 4 + bucket * 4, "hash bucket table")?;
        while node_offset != OFFSET_NONE {
            // The count limit doubles as a cycle guard for corrupted chains.
            visited_nodes += 1;
            limits.validate_icon_count(visited_nodes)?;

            blob.range(node_offset, ICON_NODE_LEN, "icon node")?;
            let next = blob.read_u32(node_offset, "icon node")?;
            let name_offset = blob.read_u32(node_offset + 4, "icon node")?;
            let image_list_offset = blob.read_u32(node_offset + 8, "icon node")?;

            let name = blob.read_cstr(name_offset, "icon name")?;
            if icon_name_hash(name) % n_buckets != bucket {
                return Err(CacheError::MisplacedHashChainNode {
                    bucket,
                    offset: node_offset,
                });
            }

            let records = parse_image_list(&blob, image_list_offset, &directories, limits)?;
            for record in &records {
                dir_icon_counts[record.directory as usize] += 1;
                if record.payload.is_some() {
                    embedded_payloads += 1;
                }
            }
            total_images += records.len();
            icons.entry(name.to_string()).or_default().extend(records);

            node_offset = next;
        }
    }

    let stats = CacheStatistics {
        total_directories: directories.len(),
        total_icons: icons.len(),
        total_images,
        embedded_payloads,
        blob_size: data.len(),
    };
    log::debug!(
        "Parsed icon cache blob: {} directories, {} icons, {} image records",
        stats.total_directories,
        stats.total_icons,
        stats.total_images
    );

    Ok(ParsedTables {
        directories,
        dir_lookup,
        icons,
        dir_icon_counts,
        stats,
    })
}

fn parse_directories(
    blob: &Blob<'_>,
    dir_list_offset: u32,
    limits: &SecurityLimits,
) -> CacheResult<(Vec<String>, AHashMap<String, u16>)> {
    let count = blob.read_u32(dir_list_offset, "directory list")? as usize;
    limits.validate_directory_count(count)?;
    // Image entries index directories with a u16, so more than 65,536
    // directories cannot be addressed at all.
    if count > u16::MAX as usize + 1 {
        return Err(CacheError::SecurityViolation {
            message: format!("Directory count {} exceeds the u16 index space", count),
        });
    }
    blob.range(dir_list_offset + 4, count * 4, "directory offset table")?;

    let mut directories = Vec::with_capacity(count);
    let mut dir_lookup = AHashMap::with_capacity(count);
    for i in 0..count {
        let name_offset =
            blob.read_u32(dir_list_offset + 4 + i as u32 * 4, "directory offset table")?;
        let name = blob.read_cstr(name_offset, "directory name")?;
        directories.push(name.to_string());
        dir_lookup.insert(name.to_string(), i as u16);
    }
    Ok((directories, dir_lookup))
}

fn parse_image_list(
    blob: &Blob<'_>,
    image_list_offset: u32,
    directories: &[String],
    limits: &SecurityLimits,
) -> CacheResult<Vec<ImageRecord>> {
    let count = blob.read_u32(image_list_offset, "image list")? as usize;
    let entries_start = image_list_offset + 4;
    blob.range(entries_start, count * IMAGE_ENTRY_LEN, "image list")?;

    let mut records = Vec::with_capacity(count);
    for i in 0..count {
        let entry_offset = entries_start + (i * IMAGE_ENTRY_LEN) as u32;
        let directory = blob.read_u16(entry_offset, "image entry")?;
        let flags = blob.read_u16(entry_offset + 2, "image entry")?;
        let data_offset = blob.read_u32(entry_offset + 4, "image entry")?;

        if directory as usize >= directories.len() {
            return Err(CacheError::InvalidDirectoryIndex {
                index: directory,
                count: directories.len(),
            });
        }

        // Offset 0 means no embedded payload; anything else must be a
        // fully in-bounds tagged payload block.
        let payload = if data_offset == 0 {
            None
        } else {
            Some(parse_payload(blob, data_offset, limits)?)
        };

        records.push(ImageRecord {
            directory,
            flags: IconFlags::from_bits(flags),
            payload,
        });
    }
    Ok(records)
}

fn parse_payload(blob: &Blob<'_>, data_offset: u32, limits: &SecurityLimits) -> CacheResult<Payload> {
    let payload_type = blob.read_u32(data_offset, "pixel payload")?;
    if payload_type != PAYLOAD_TYPE_RASTER {
        return Err(CacheError::InvalidPayloadType {
            found: payload_type,
            offset: data_offset,
        });
    }
    let len = blob.read_u32(data_offset + 4, "pixel payload")? as usize;
    limits.validate_payload_size(len)?;
    let start = blob.range(data_offset + 8, len, "pixel payload")?;
    Ok(Payload {
        block_offset: data_offset,
        start,
        len,
    })
}
