//! Utilities for the finished archive.
//!
//! ## Components
//!
//! - **Compression**: zip packing of the archive directory
//! - **Hashing**: SHA-256 of written files
//! - **Summary**: the `collection_summary.json` report
//!
//! ```no_run
//! use diag_collector::utils::compress::compress_archive;
//! use std::path::Path;
//!
//! # fn example() -> anyhow::Result<()> {
//! let zip_path = compress_archive(Path::new("/var/tmp/diag-collector-web-01-20260115143052"))?;
//! println!("Created archive: {}", zip_path.display());
//! # Ok(())
//! # }
//! ```

/// Collection summary generation
pub mod summary;

/// Zip packing of archive directories
pub mod compress;

/// SHA-256 helpers
pub mod hash;
