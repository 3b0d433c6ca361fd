//! Core types for the icon theme cache

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// Per-icon variant flags stored in the cache
///
/// Each bit records which form of the icon a directory provides. A single
/// icon name can appear in several directories with different flags, which
/// is how fixed-size and scalable variants coexist under one name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct IconFlags(u16);

impl IconFlags {
    /// No variant information
    pub const NONE: IconFlags = IconFlags(0);
    /// An XPM file backs this entry
    pub const XPM_SUFFIX: IconFlags = IconFlags(1);
    /// A scalable SVG file backs this entry
    pub const SVG_SUFFIX: IconFlags = IconFlags(2);
    /// A PNG file backs this entry
    pub const PNG_SUFFIX: IconFlags = IconFlags(4);
    /// A standalone `.icon` metadata file accompanies this entry
    pub const HAS_ICON_FILE: IconFlags = IconFlags(8);

    /// Build flags from the raw wire value
    pub const fn from_bits(bits: u16) -> Self {
        IconFlags(bits)
    }

    /// Raw wire value
    pub const fn bits(self) -> u16 {
        self.0
    }

    /// True when no bits are set
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// True when every bit of `other` is set in `self`
    pub const fn contains(self, other: IconFlags) -> bool {
        self.0 & other.0 == other.0
    }

    /// True when this entry is backed by a scalable (SVG) source
    pub const fn is_scalable(self) -> bool {
        self.contains(IconFlags::SVG_SUFFIX)
    }
}

impl BitOr for IconFlags {
    type Output = IconFlags;

    fn bitor(self, rhs: IconFlags) -> IconFlags {
        IconFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for IconFlags {
    fn bitor_assign(&mut self, rhs: IconFlags) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for IconFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "none");
        }
        let mut first = true;
        let mut emit = |name: &str, f: &mut fmt::Formatter<'_>| -> fmt::Result {
            if !first {
                write!(f, "|")?;
            }
            first = false;
            write!(f, "{name}")
        };
        if self.contains(IconFlags::XPM_SUFFIX) {
            emit("xpm", f)?;
        }
        if self.contains(IconFlags::SVG_SUFFIX) {
            emit("svg", f)?;
        }
        if self.contains(IconFlags::PNG_SUFFIX) {
            emit("png", f)?;
        }
        if self.contains(IconFlags::HAS_ICON_FILE) {
            emit("icon-file", f)?;
        }
        Ok(())
    }
}

/// One icon record under one directory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IconEntry {
    /// Index of the directory this record lives under, valid only for the
    /// cache that produced it
    pub directory_index: u16,
    /// Variant flags for this (name, directory) pair
    pub flags: IconFlags,
    /// Absolute blob offset of the embedded pixel payload, if any
    pub data_offset: Option<u32>,
}

/// Summary counters for a loaded cache
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStatistics {
    /// Number of directories in the cache
    pub total_directories: usize,
    /// Number of distinct icon names
    pub total_icons: usize,
    /// Number of (name, directory) image records
    pub total_images: usize,
    /// Number of records carrying an embedded pixel payload
    pub embedded_payloads: usize,
    /// Size of the underlying blob in bytes
    pub blob_size: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_bits_round_trip() {
        let flags = IconFlags::PNG_SUFFIX | IconFlags::HAS_ICON_FILE;
        assert_eq!(flags.bits(), 12);
        assert_eq!(IconFlags::from_bits(12), flags);
        assert!(flags.contains(IconFlags::PNG_SUFFIX));
        assert!(!flags.contains(IconFlags::SVG_SUFFIX));
        assert!(!flags.is_scalable());
        assert!(IconFlags::SVG_SUFFIX.is_scalable());
    }

    #[test]
    fn test_flag_display() {
        assert_eq!(IconFlags::NONE.to_string(), "none");
        assert_eq!(
            (IconFlags::XPM_SUFFIX | IconFlags::PNG_SUFFIX).to_string(),
            "xpm|png"
        );
    }
}
