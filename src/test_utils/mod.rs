//! Test utilities for diag-collector
//!
//! Shared fixtures for unit tests: an in-memory execution context and
//! scratch configuration files.

#![cfg(test)]

use anyhow::Result;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;
use tempfile::{NamedTempFile, TempDir};

use crate::context::{CommandOutput, ExecutionContext};
use crate::core::error::{ComponentError, ComponentResult};

/// Creates a temporary directory that is automatically cleaned up
pub fn create_temp_dir() -> Result<TempDir> {
    Ok(TempDir::new()?)
}

/// Creates a test YAML configuration file
pub fn create_test_config() -> Result<NamedTempFile> {
    let config_content = r#"
command_timeout_secs: 30
targets: []
skip_specs:
  - ps_auxww
filters:
  package_provides_command:
    - httpd
parallel: true
compress: false
scrub: true
"#;

    let mut file = NamedTempFile::new()?;
    use std::io::Write;
    file.write_all(config_content.as_bytes())?;
    file.flush()?;
    Ok(file)
}

/// Execution context answering from fixed tables.
///
/// Commands are matched on the exact command line. Unknown commands behave
/// like a missing executable and unknown files like a missing file.
#[derive(Default)]
pub struct StaticContext {
    commands: HashMap<String, CommandOutput>,
    files: HashMap<PathBuf, Vec<u8>>,
    calls: Mutex<Vec<String>>,
}

impl StaticContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_command(mut self, command: &str, exit_code: i32, output: &str) -> Self {
        let lines = output.lines().map(str::to_string).collect();
        self.commands
            .insert(command.to_string(), CommandOutput::new(exit_code, lines));
        self
    }

    pub fn with_file(mut self, path: &str, content: &str) -> Self {
        self.files.insert(PathBuf::from(path), content.as_bytes().to_vec());
        self
    }

    /// Every command line requested so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

impl ExecutionContext for StaticContext {
    fn run_command(&self, command: &str, _timeout: Option<Duration>) -> ComponentResult<CommandOutput> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(command.to_string());
        }
        self.commands
            .get(command)
            .cloned()
            .ok_or_else(|| ComponentError::CommandNotFound {
                command: command.to_string(),
            })
    }

    fn read_file(&self, path: &Path) -> ComponentResult<Vec<u8>> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| ComponentError::FileNotFound {
                path: path.to_path_buf(),
            })
    }

    fn glob(&self, pattern: &str) -> ComponentResult<Vec<PathBuf>> {
        let matcher = glob::Pattern::new(pattern)
            .map_err(|e| ComponentError::Other(anyhow::anyhow!("invalid glob: {}", e)))?;
        let mut found: Vec<PathBuf> = self
            .files
            .keys()
            .filter(|p| matcher.matches_path(p))
            .cloned()
            .collect();
        found.sort();
        Ok(found)
    }

    fn name(&self) -> &'static str {
        "static"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_context() {
        let ctx = StaticContext::new()
            .with_command("hostname -f", 0, "db01.example.com\n")
            .with_file("/etc/ld.so.conf.d/a.conf", "/opt/a")
            .with_file("/etc/ld.so.conf.d/b.conf", "/opt/b")
            .with_file("/etc/hosts", "127.0.0.1 localhost");

        assert_eq!(
            ctx.run_command("hostname -f", None).unwrap().lines,
            vec!["db01.example.com"]
        );
        assert!(ctx.run_command("uptime", None).unwrap_err().is_skip());
        assert_eq!(ctx.glob("/etc/ld.so.conf.d/*.conf").unwrap().len(), 2);
        assert!(ctx.read_file(Path::new("/nope")).unwrap_err().is_skip());
        assert_eq!(ctx.calls(), vec!["hostname -f", "uptime"]);
    }
}
