//! Read-only reader for precomputed icon theme cache files
//!
//! Icon themes can hold thousands of icons spread across size/context
//! directories; scanning those directories at runtime is what the cache
//! file exists to avoid. This crate parses such a cache blob once, validates
//! every table and offset defensively, and then answers lookups (directory
//! indices, presence checks, variant flags, embedded pixel payloads) as
//! total, non-failing, in-memory queries.
//!
//! # Features
//!
//! - **Parse once, query forever** - construction is the only fallible or
//!   blocking operation; every lookup afterwards is O(1) average
//! - **Shared ownership** - the cache handle is cheap to clone and safe to
//!   query from multiple threads; the blob is freed with the last clone
//! - **Memory-mapped loads** - path-based construction maps the file and
//!   slices payloads straight out of the mapping
//! - **Defensive validation** - versions, table bounds, hash chain
//!   placement, and payload extents are all checked up front with
//!   configurable security limits
//! - **Delegated decoding** - embedded payloads are handed to the `image`
//!   crate on demand; malformed pixel data is reported as absence, never
//!   as a failure
//!
//! # Example Usage
//!
//! ```no_run
//! use icon_theme_cache::IconCache;
//!
//! let cache = IconCache::from_path("/usr/share/icons/hicolor/icon-theme.cache")?;
//!
//! if cache.has_icon("firefox") {
//!     if let Some(index) = cache.directory_index("48x48/apps") {
//!         println!("flags: {}", cache.icon_flags("firefox", index));
//!         if let Some(pixels) = cache.icon("firefox", index) {
//!             let pixels = pixels.to_rgba8();
//!             println!("decoded {}x{} icon", pixels.width(), pixels.height());
//!         }
//!     }
//! }
//! # Ok::<(), icon_theme_cache::CacheError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod cache;
pub mod error;
pub mod types;

// Re-export main types for convenience
pub use cache::IconCache;
pub use error::{CacheError, CacheResult, SecurityLimits};
pub use types::{CacheStatistics, IconEntry, IconFlags};

// Re-export the map type returned by `IconCache::icons_in_directory`
pub use ahash::AHashMap;
