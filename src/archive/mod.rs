//! The archive sink.
//!
//! Collected content is written into a fresh directory under the output
//! root, named `diag-collector-<host>-<timestamp>`:
//!
//! ```text
//! diag-collector-web-01-20260115143052/
//! ├── insights_commands/ps_auxww
//! ├── insights_datasources/package_provides_command
//! ├── etc/redhat-release
//! ├── meta_data/collection.jsonl
//! ├── display_name
//! └── collection_summary.json
//! ```
//!
//! Entries are append-only during a run. [`ArchiveWriter::finish`] flushes
//! the per-component metadata and the summary. The finished directory can be
//! fed straight back into [`ReplayContext`](crate::context::ReplayContext).

use std::collections::HashSet;
use std::fs;
use std::io::Write;
use std::path::{Component as PathComponent, Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use log::{debug, info, warn};

use crate::constants::{
    ANSIBLE_HOST_FILE, ARCHIVE_DIR_MODE, ARCHIVE_FILE_MODE, ARCHIVE_NAME_PREFIX, COLLECTION_METADATA_FILE,
    COLLECTION_SUMMARY_FILE, DISPLAY_NAME_FILE,
};
use crate::core::Broker;
use crate::models::{ArchiveEntry, ComponentRecord, OutcomeCounts};
use crate::specs::{providers_of, DatasourceProvider};
use crate::utils::hash::sha256_bytes;
use crate::utils::summary::create_collection_summary;

/// Writes one collection run into an archive directory.
#[derive(Debug)]
pub struct ArchiveWriter {
    root: PathBuf,
    hostname: String,
    started: DateTime<Utc>,
    entries: Vec<ArchiveEntry>,
    written: HashSet<PathBuf>,
}

impl ArchiveWriter {
    /// Create a new archive directory under `output_dir`.
    ///
    /// Fails if a directory of the same name already exists.
    pub fn create(output_dir: &Path, hostname: &str) -> Result<Self> {
        let started = Utc::now();
        let name = format!(
            "{}-{}-{}",
            ARCHIVE_NAME_PREFIX,
            sanitize_hostname(hostname),
            started.format("%Y%m%d%H%M%S")
        );

        fs::create_dir_all(output_dir)
            .with_context(|| format!("Failed to create output directory {}", output_dir.display()))?;
        let root = output_dir.join(name);
        create_private_dir(&root, false)
            .with_context(|| format!("Failed to create archive directory {}", root.display()))?;
        info!("Writing archive to {}", root.display());

        Ok(Self {
            root,
            hostname: hostname.to_string(),
            started,
            entries: Vec::new(),
            written: HashSet::new(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn started(&self) -> DateTime<Utc> {
        self.started
    }

    pub fn entries(&self) -> &[ArchiveEntry] {
        &self.entries
    }

    /// Write `bytes` at `relative` inside the archive.
    ///
    /// The path must stay inside the archive and may only be written once.
    pub fn add_artifact(&mut self, relative: &Path, bytes: &[u8]) -> Result<&ArchiveEntry> {
        validate_relative(relative)?;
        if !self.written.insert(relative.to_path_buf()) {
            bail!("{} was already written to the archive", relative.display());
        }

        let target = self.root.join(relative);
        if let Some(parent) = target.parent() {
            create_private_dir(parent, true)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        write_private_file(&target, bytes).with_context(|| format!("Failed to write {}", target.display()))?;

        let path = relative.to_string_lossy().into_owned();
        debug!("Archived {} ({} bytes)", path, bytes.len());
        self.entries.push(ArchiveEntry {
            path,
            size: bytes.len() as u64,
            sha256: sha256_bytes(bytes),
            mode: ARCHIVE_FILE_MODE,
            written_at: Utc::now(),
        });

        Ok(&self.entries[self.entries.len() - 1])
    }

    pub fn add_provider(&mut self, provider: &DatasourceProvider) -> Result<()> {
        self.add_artifact(provider.relative_path(), &provider.to_bytes())?;
        Ok(())
    }

    /// Write the providers of every successful datasource in the broker.
    ///
    /// Returns the number of files written. A provider whose path was
    /// already written by another datasource, or whose file cannot be
    /// written, is logged and left out.
    pub fn add_broker(&mut self, broker: &Broker) -> Result<usize> {
        let mut count = 0;
        for (id, value) in broker.successes() {
            for provider in providers_of(value) {
                if self.written.contains(provider.relative_path()) {
                    warn!(
                        "{}: {} already archived, skipping",
                        id,
                        provider.relative_path().display()
                    );
                    continue;
                }
                match self.add_provider(provider) {
                    Ok(()) => count += 1,
                    Err(e) => warn!("{}: not archived: {:#}", id, e),
                }
            }
        }
        Ok(count)
    }

    /// Write a top-level metadata file such as `display_name`.
    pub fn add_metadata(&mut self, name: &str, value: &str) -> Result<()> {
        let mut content = value.trim().to_string();
        content.push('\n');
        self.add_artifact(Path::new(name), content.as_bytes())?;
        Ok(())
    }

    pub fn set_display_name(&mut self, display_name: &str) -> Result<()> {
        self.add_metadata(DISPLAY_NAME_FILE, display_name)
    }

    pub fn set_ansible_host(&mut self, ansible_host: &str) -> Result<()> {
        self.add_metadata(ANSIBLE_HOST_FILE, ansible_host)
    }

    /// Flush the per-component metadata and the collection summary.
    pub fn finish(mut self, records: &[ComponentRecord], context: &str) -> Result<PathBuf> {
        let mut jsonl = Vec::new();
        for record in records {
            serde_json::to_writer(&mut jsonl, record).context("Failed to serialize component record")?;
            jsonl.push(b'\n');
        }
        self.add_artifact(Path::new(COLLECTION_METADATA_FILE), &jsonl)?;

        let counts = OutcomeCounts::from_records(records);
        let summary = create_collection_summary(
            &self.hostname,
            &self.started.to_rfc3339(),
            context,
            &counts,
            &self.entries,
            records,
        )?;
        self.add_artifact(Path::new(COLLECTION_SUMMARY_FILE), summary.as_bytes())?;

        info!(
            "Archive complete: {} files, {} succeeded, {} skipped, {} failed",
            self.entries.len(),
            counts.success,
            counts.skipped,
            counts.failed
        );
        Ok(self.root)
    }
}

fn sanitize_hostname(hostname: &str) -> String {
    let cleaned: String = hostname
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' { c } else { '_' })
        .collect();
    if cleaned.is_empty() {
        "localhost".to_string()
    } else {
        cleaned
    }
}

fn validate_relative(relative: &Path) -> Result<()> {
    if relative.as_os_str().is_empty() {
        bail!("empty archive path");
    }
    for part in relative.components() {
        match part {
            PathComponent::Normal(_) | PathComponent::CurDir => {}
            _ => bail!("archive path {} escapes the archive root", relative.display()),
        }
    }
    Ok(())
}

#[cfg(unix)]
fn create_private_dir(path: &Path, recursive: bool) -> std::io::Result<()> {
    use std::os::unix::fs::DirBuilderExt;
    fs::DirBuilder::new()
        .recursive(recursive)
        .mode(ARCHIVE_DIR_MODE)
        .create(path)
}

#[cfg(not(unix))]
fn create_private_dir(path: &Path, recursive: bool) -> std::io::Result<()> {
    fs::DirBuilder::new().recursive(recursive).create(path)
}

#[cfg(unix)]
fn write_private_file(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    use std::os::unix::fs::OpenOptionsExt;
    let mut file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(ARCHIVE_FILE_MODE)
        .open(path)?;
    file.write_all(bytes)
}

#[cfg(not(unix))]
fn write_private_file(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = fs::OpenOptions::new().write(true).create_new(true).open(path)?;
    file.write_all(bytes)
}
