//! # diag-collector
//!
//! A host diagnostic data collector built around a dependency-resolution and
//! execution engine.
//!
//! ## Overview
//!
//! Data sources (shell commands, files, glob expansions and computed
//! sources) are declared as components with required and optional
//! dependencies. Parsers and combiners build on them. The [`core::Evaluator`]
//! orders the graph, runs each component once against an execution context,
//! and records every outcome in a [`core::Broker`]: a component that cannot
//! run is skipped or failed, never fatal to the run.
//!
//! ## Features
//!
//! - **Declarative specs**: commands, files and globs built from one factory
//! - **Filtering**: filterable sources keep only records matching registered
//!   patterns, and refuse to run without any
//! - **Live or replay**: the same catalog runs against the host or against a
//!   previously written archive
//! - **Archive output**: per-component JSON-lines metadata, a summary and an
//!   optional zip
//!
//! ## Usage
//!
//! ```no_run
//! use diag_collector::context::HostContext;
//! use diag_collector::core::{ComponentRegistry, Evaluator, FilterRegistry, Targets};
//! use diag_collector::parsers::ps::PsAuxww;
//! use diag_collector::specs::register_defaults;
//!
//! # fn main() -> anyhow::Result<()> {
//! let filters = FilterRegistry::new();
//! let mut registry = ComponentRegistry::new();
//! register_defaults(&mut registry, &filters)?;
//!
//! let broker = Evaluator::new(&registry, &filters)
//!     .run(&Targets::named(["PsAuxww"]), &HostContext::new())?;
//!
//! if let Some(ps) = broker.get_as::<PsAuxww>("PsAuxww") {
//!     println!("{} processes", ps.0.len());
//! }
//! for (id, reason) in broker.all_skips() {
//!     println!("{} skipped: {}", id, reason);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Organization
//!
//! - [`core`]: components, registry, filters, broker and evaluator
//! - [`context`]: live host and archive replay execution contexts
//! - [`specs`]: datasource factory and the default catalog
//! - [`parsers`] / [`combiners`]: representative consumers of datasources
//! - [`archive`]: the archive writer
//! - [`collectors`]: full collection runs
//! - [`config`]: YAML configuration
//! - [`cli`]: command-line interface definitions
//! - [`utils`]: compression, hashing and the run summary
//! - [`security`]: credential scrubbing for recorded messages
//! - [`constants`]: application-wide constants

/// Command-line interface definitions and argument parsing
pub mod cli;

/// Data models written to archive metadata
pub mod models;

/// The dependency-resolution and execution engine
pub mod core;

/// Execution contexts: live host and archive replay
pub mod context;

/// Datasource specs and the default catalog
pub mod specs;

/// Parsers over datasource content
pub mod parsers;

/// Combiners over parsers
pub mod combiners;

/// Archive writer
pub mod archive;

/// Collection runs
pub mod collectors;

/// Utility functions for compression, hashing and summaries
pub mod utils;

/// Configuration loading
pub mod config;

/// Application constants and configuration values
pub mod constants;

/// Credential scrubbing
pub mod security;

/// Test utilities and helpers
#[cfg(test)]
pub mod test_utils;
