//! Collection runs.
//!
//! A run ties the engine to the outside world:
//!
//! ```text
//! config ──► registry + filters ──► Evaluator ──► Broker ──► ArchiveWriter ──► zip
//!                                      │
//!                              HostContext | ReplayContext
//! ```
//!
//! ## Usage Example
//!
//! ```no_run
//! use diag_collector::collectors::collector::{collect, open_context, Source};
//! use diag_collector::config::CollectionConfig;
//! use diag_collector::core::{filters, AbortHandle};
//!
//! # fn example() -> anyhow::Result<()> {
//! let config = CollectionConfig::default();
//! let context = open_context(&Source::default(), &config)?;
//! let report = collect(&config, context.as_ref(), filters::global(), AbortHandle::new())?;
//!
//! println!("Archive written to {}", report.archive_dir.display());
//! # Ok(())
//! # }
//! ```

/// Collection runner and catalog listing
pub mod collector;

pub use collector::{build_registry, collect, list_specs, open_context, CollectionReport, Source};
