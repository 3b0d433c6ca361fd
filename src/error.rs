use thiserror::Error;
use std::io;

/// Result type for cache operations
pub type CacheResult<T> = Result<T, CacheError>;

/// Errors that can occur while loading or validating a cache blob
///
/// Construction is the only fallible surface: once a cache has been built,
/// every query reports absence through `Option`/`bool` returns instead of
/// an error.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("File too short: expected at least {expected} bytes, found {actual}")]
    FileTooShort { expected: usize, actual: usize },

    #[error("Unsupported cache version {major}.{minor} (expected 1.0)")]
    UnsupportedVersion { major: u16, minor: u16 },

    #[error("{section} at offset {offset} exceeds blob bounds ({len} bytes)")]
    SectionOutOfBounds {
        section: &'static str,
        offset: u32,
        len: usize,
    },

    #[error("Unterminated string at offset {offset}")]
    UnterminatedString { offset: u32 },

    #[error("Invalid UTF-8 in string at offset {offset}")]
    InvalidUtf8 { offset: u32 },

    #[error("Hash table has zero buckets")]
    EmptyHashTable,

    #[error("Hash chain node at offset {offset} does not belong in bucket {bucket}")]
    MisplacedHashChainNode { bucket: u32, offset: u32 },

    #[error("Image entry references directory index {index}, but only {count} directories exist")]
    InvalidDirectoryIndex { index: u16, count: usize },

    #[error("Unknown pixel payload type {found} at offset {offset}")]
    InvalidPayloadType { found: u32, offset: u32 },

    #[error("File size exceeded: {actual} bytes > {limit} bytes")]
    FileSizeExceeded { actual: usize, limit: usize },

    #[error("Security violation: {message}")]
    SecurityViolation { message: String },
}

/// Limits applied while parsing untrusted cache blobs
#[derive(Debug, Clone)]
pub struct SecurityLimits {
    /// Maximum blob size to process (default: 64MB)
    pub max_file_size: usize,
    /// Maximum number of directories (default: 65,536, the u16 index space)
    pub max_directories: usize,
    /// Maximum number of icon entries across all hash chains (default: 1,000,000)
    pub max_icons: usize,
    /// Maximum embedded payload size (default: 16MB)
    pub max_payload_size: usize,
}

impl Default for SecurityLimits {
    fn default() -> Self {
        Self {
            max_file_size: 64 * 1024 * 1024,
            max_directories: u16::MAX as usize + 1,
            max_icons: 1_000_000,
            max_payload_size: 16 * 1024 * 1024,
        }
    }
}

impl SecurityLimits {
    /// Create new limits with custom values
    pub fn new(
        max_file_size: usize,
        max_directories: usize,
        max_icons: usize,
        max_payload_size: usize,
    ) -> Self {
        Self {
            max_file_size,
            max_directories,
            max_icons,
            max_payload_size,
        }
    }

    /// Validate blob size against limits
    pub fn validate_file_size(&self, size: usize) -> CacheResult<()> {
        if size > self.max_file_size {
            return Err(CacheError::FileSizeExceeded {
                actual: size,
                limit: self.max_file_size,
            });
        }
        Ok(())
    }

    /// Validate directory count against limits
    pub fn validate_directory_count(&self, count: usize) -> CacheResult<()> {
        if count > self.max_directories {
            return Err(CacheError::SecurityViolation {
                message: format!(
                    "Directory count {} exceeds limit {}",
                    count, self.max_directories
                ),
            });
        }
        Ok(())
    }

    /// Validate total icon count against limits
    pub fn validate_icon_count(&self, count: usize) -> CacheResult<()> {
        if count > self.max_icons {
            return Err(CacheError::SecurityViolation {
                message: format!("Icon count {} exceeds limit {}", count, self.max_icons),
            });
        }
        Ok(())
    }

    /// Validate an embedded payload size against limits
    pub fn validate_payload_size(&self, size: usize) -> CacheResult<()> {
        if size > self.max_payload_size {
            return Err(CacheError::SecurityViolation {
                message: format!(
                    "Payload size {} exceeds limit {}",
                    size, self.max_payload_size
                ),
            });
        }
        Ok(())
    }
}
