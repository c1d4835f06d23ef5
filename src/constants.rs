//! Global constants for diag-collector.
//!
//! This module centralizes hardcoded values: timeouts, archive layout and
//! process exit codes.

// Timeout constants
/// Timeout applied to a command when none is configured (seconds)
pub const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 120;

/// Upper bound for any single command; a requested timeout of 0 maps here
pub const COMMAND_TIMEOUT_CEILING_SECS: u64 = 600;

/// How long output readers get to finish once a command's process group is killed (milliseconds)
pub const OUTPUT_DRAIN_GRACE_MS: u64 = 500;

// Archive layout
/// Directory holding captured command output
pub const COMMANDS_DIR: &str = "insights_commands";

/// Directory holding computed datasource output
pub const DATASOURCES_DIR: &str = "insights_datasources";

/// Directory holding per-run metadata
pub const META_DATA_DIR: &str = "meta_data";

/// One JSON record per evaluated component
pub const COLLECTION_METADATA_FILE: &str = "meta_data/collection.jsonl";

/// Run summary written at the archive root
pub const COLLECTION_SUMMARY_FILE: &str = "collection_summary.json";

pub const DISPLAY_NAME_FILE: &str = "display_name";
pub const ANSIBLE_HOST_FILE: &str = "ansible_host";

/// Longest mangled command name used as an archive file name, in bytes
pub const MANGLED_NAME_MAX: usize = 255;

/// Mode for files written into the archive
pub const ARCHIVE_FILE_MODE: u32 = 0o600;

/// Mode for directories created inside the archive
pub const ARCHIVE_DIR_MODE: u32 = 0o700;

/// Prefix for archive directories created under the output root
pub const ARCHIVE_NAME_PREFIX: &str = "diag-collector";

// Process exit codes
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_RUNTIME_ERROR: i32 = 1;
pub const EXIT_PRECONDITION_FAILED: i32 = 5;

// Outcome reasons
pub const REASON_INTERRUPTED: &str = "collection interrupted";
pub const REASON_BLACKLISTED: &str = "blacklisted by configuration";

// Default file names
pub const DEFAULT_CONFIG_NAME: &str = "diag-collector.yaml";
