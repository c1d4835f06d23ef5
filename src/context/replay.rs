//! Replay context over an extracted archive.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use log::debug;

use super::{glob_under, mangle_command, rooted, CommandOutput, ExecutionContext};
use crate::constants::{COLLECTION_METADATA_FILE, COMMANDS_DIR, META_DATA_DIR};
use crate::core::error::{ComponentError, ComponentResult};
use crate::models::ComponentRecord;

/// Answers datasource requests from content captured by an earlier collection.
///
/// Commands are never executed. Their stored output is looked up under
/// `insights_commands/<mangled command>`. The exit code is the one recorded
/// in the archive metadata, or 0 when none was recorded.
#[derive(Debug, Clone)]
pub struct ReplayContext {
    root: PathBuf,
    exit_codes: HashMap<PathBuf, i32>,
}

impl ReplayContext {
    /// Use `root` as the archive root, reading recorded exit codes if present.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let exit_codes = recorded_exit_codes(&root);
        Self { root, exit_codes }
    }

    /// Locate the archive root inside an extraction directory.
    ///
    /// Accepts either the archive root itself or a directory holding exactly
    /// one archive directory, which is how a packed archive extracts.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            bail!("archive directory {} does not exist", dir.display());
        }
        if looks_like_archive(dir) {
            return Ok(Self::new(dir));
        }

        let children: Vec<PathBuf> = fs::read_dir(dir)
            .with_context(|| format!("Failed to list {}", dir.display()))?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_dir())
            .collect();

        match children.as_slice() {
            [only] if looks_like_archive(only) => Ok(Self::new(only)),
            _ => bail!("{} does not contain a collection archive", dir.display()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Exit codes of archived command output, keyed by archive path.
fn recorded_exit_codes(root: &Path) -> HashMap<PathBuf, i32> {
    let mut codes = HashMap::new();
    let metadata = match fs::read_to_string(root.join(COLLECTION_METADATA_FILE)) {
        Ok(metadata) => metadata,
        Err(e) => {
            debug!("No collection metadata in {}: {}", root.display(), e);
            return codes;
        }
    };

    for line in metadata.lines().filter(|l| !l.trim().is_empty()) {
        match serde_json::from_str::<ComponentRecord>(line) {
            Ok(record) => {
                if let Some(code) = record.exit_status.filter(|_| record.outcome == "success") {
                    for path in record.paths {
                        codes.insert(PathBuf::from(path), code);
                    }
                }
            }
            Err(e) => debug!("Skipping unreadable metadata line: {}", e),
        }
    }
    codes
}

fn looks_like_archive(dir: &Path) -> bool {
    dir.join(COMMANDS_DIR).is_dir() || dir.join(META_DATA_DIR).is_dir()
}

fn absent(what: impl Into<String>) -> impl FnOnce(io::Error) -> ComponentError {
    let what = what.into();
    move |e| match e.kind() {
        io::ErrorKind::NotFound => ComponentError::ContentNotFound { what },
        _ => ComponentError::Io(e),
    }
}

impl ExecutionContext for ReplayContext {
    fn run_command(&self, command: &str, _timeout: Option<Duration>) -> ComponentResult<CommandOutput> {
        let relative = Path::new(COMMANDS_DIR).join(mangle_command(command));
        let stored = self.root.join(&relative);
        debug!("Replaying '{}' from {}", command, stored.display());

        let bytes = fs::read(&stored).map_err(absent(command))?;
        let lines = String::from_utf8_lossy(&bytes)
            .lines()
            .map(str::to_string)
            .collect();
        let exit_code = self.exit_codes.get(&relative).copied().unwrap_or(0);
        Ok(CommandOutput::new(exit_code, lines))
    }

    fn read_file(&self, path: &Path) -> ComponentResult<Vec<u8>> {
        fs::read(rooted(&self.root, path)).map_err(absent(path.display().to_string()))
    }

    fn glob(&self, pattern: &str) -> ComponentResult<Vec<PathBuf>> {
        glob_under(&self.root, pattern)
    }

    fn name(&self) -> &'static str {
        "replay"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn archive() -> tempfile::TempDir {
        let temp = tempfile::tempdir().unwrap();
        let commands = temp.path().join(COMMANDS_DIR);
        fs::create_dir_all(&commands).unwrap();
        fs::write(commands.join("ps_auxww"), "USER PID\nroot 1\n").unwrap();
        fs::create_dir_all(temp.path().join("etc")).unwrap();
        fs::write(temp.path().join("etc/hostname"), "db01\n").unwrap();
        temp
    }

    #[test]
    fn test_replays_stored_command_output() {
        let temp = archive();
        let ctx = ReplayContext::new(temp.path());
        let out = ctx.run_command("ps auxww", Some(Duration::from_secs(1))).unwrap();
        assert_eq!(out.exit_code, 0);
        assert_eq!(out.lines, vec!["USER PID", "root 1"]);
    }

    #[test]
    fn test_replays_recorded_exit_code() {
        let temp = archive();
        let commands = temp.path().join(COMMANDS_DIR);
        fs::write(commands.join("rpm_-Va"), "missing   /etc/foo.conf\n").unwrap();
        fs::create_dir_all(temp.path().join(META_DATA_DIR)).unwrap();
        fs::write(
            temp.path().join(COLLECTION_METADATA_FILE),
            concat!(
                r#"{"name":"rpm_va","kind":"datasource","outcome":"success","duration_secs":0.4,"exit_status":1,"paths":["insights_commands/rpm_-Va"]}"#,
                "\n",
                r#"{"name":"ps_auxww","kind":"datasource","outcome":"success","duration_secs":0.1,"exit_status":0,"paths":["insights_commands/ps_auxww"]}"#,
                "\n",
            ),
        )
        .unwrap();

        let ctx = ReplayContext::new(temp.path());
        assert_eq!(ctx.run_command("rpm -Va", None).unwrap().exit_code, 1);
        assert_eq!(ctx.run_command("ps auxww", None).unwrap().exit_code, 0);
    }

    #[test]
    fn test_absent_content_is_skip() {
        let temp = archive();
        let ctx = ReplayContext::new(temp.path());

        let err = ctx.run_command("uptime", None).unwrap_err();
        assert!(matches!(err, ComponentError::ContentNotFound { .. }));
        assert!(err.is_skip());

        let err = ctx.read_file(Path::new("/etc/redhat-release")).unwrap_err();
        assert!(err.is_skip());
    }

    #[test]
    fn test_reads_files_by_host_path() {
        let temp = archive();
        let ctx = ReplayContext::new(temp.path());
        assert_eq!(ctx.read_file(Path::new("/etc/hostname")).unwrap(), b"db01\n");
    }

    #[test]
    fn test_open_descends_into_single_archive_dir() {
        let outer = tempfile::tempdir().unwrap();
        let inner = outer.path().join("diag-collector-db01-20260101");
        fs::create_dir_all(inner.join(COMMANDS_DIR)).unwrap();

        let ctx = ReplayContext::open(outer.path()).unwrap();
        assert_eq!(ctx.root(), inner.as_path());

        let empty = tempfile::tempdir().unwrap();
        assert!(ReplayContext::open(empty.path()).is_err());
    }
}
