//! Execution contexts: where datasources get their data from.
//!
//! A datasource never touches the host directly. It asks the bound context to
//! run a command, read a file or expand a glob, and the same datasource works
//! unchanged against a live host or an extracted archive.

pub mod host;
pub mod replay;

use std::path::{Path, PathBuf};
use std::time::Duration;

use lazy_static::lazy_static;
use regex::Regex;

use crate::constants::{COMMAND_TIMEOUT_CEILING_SECS, MANGLED_NAME_MAX};
use crate::core::error::{ComponentError, ComponentResult};

pub use host::HostContext;
pub use replay::ReplayContext;

/// Captured result of a command.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub lines: Vec<String>,
}

impl CommandOutput {
    pub fn new(exit_code: i32, lines: Vec<String>) -> Self {
        Self { exit_code, lines }
    }

    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// First line of output, if any.
    pub fn first_line(&self) -> Option<&str> {
        self.lines.first().map(String::as_str)
    }
}

/// Source of host data bound to an evaluation run.
#[cfg_attr(test, mockall::automock)]
pub trait ExecutionContext: Send + Sync {
    /// Run `command` and capture its output.
    ///
    /// `timeout` of `None` uses the context default; zero means the ceiling.
    fn run_command(&self, command: &str, timeout: Option<Duration>) -> ComponentResult<CommandOutput>;

    /// Read a file given by its path on the host.
    fn read_file(&self, path: &Path) -> ComponentResult<Vec<u8>>;

    /// Expand a glob given in host paths. Results are host paths, sorted.
    fn glob(&self, pattern: &str) -> ComponentResult<Vec<PathBuf>>;

    /// Short label for metadata: "host" or "replay".
    fn name(&self) -> &'static str;
}

/// Timeout actually applied to a command: unset and zero both map to the ceiling.
pub fn effective_timeout(requested: Option<Duration>) -> Duration {
    let ceiling = Duration::from_secs(COMMAND_TIMEOUT_CEILING_SECS);
    match requested {
        Some(t) if !t.is_zero() => t.min(ceiling),
        _ => ceiling,
    }
}

lazy_static! {
    static ref BIN_PREFIX: Regex = Regex::new(r"^/(usr/|)(bin|sbin)/").unwrap();
    static ref UNSAFE_CHARS: Regex = Regex::new(r"[^\w\-./]+").unwrap();
}

/// File name used for a command's output inside an archive.
///
/// Live collection and replay must agree on this exactly, otherwise replay
/// cannot find what collection stored.
pub fn mangle_command(command: &str) -> String {
    let stripped = BIN_PREFIX.replace(command.trim(), "");
    let safe = UNSAFE_CHARS.replace_all(&stripped, "_");
    let dotted = safe.replace('/', ".");
    let trimmed = dotted.trim_matches(|c| matches!(c, ' ' | '.' | '_' | '-'));
    let mut end = trimmed.len().min(MANGLED_NAME_MAX);
    while !trimmed.is_char_boundary(end) {
        end -= 1;
    }
    trimmed[..end].to_string()
}

/// Split a command line into program and arguments, honoring quotes.
///
/// No shell is involved: pipes, redirects and variables are passed through
/// as literal arguments.
pub fn split_command(command: &str) -> ComponentResult<Vec<String>> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut quote: Option<char> = None;
    let mut chars = command.chars();

    while let Some(c) = chars.next() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some('"'), '\\') => match chars.next() {
                Some(next) => current.push(next),
                None => current.push('\\'),
            },
            (Some(_), c) => current.push(c),
            (None, '\'') | (None, '"') => {
                quote = Some(c);
                in_token = true;
            }
            (None, '\\') => {
                if let Some(next) = chars.next() {
                    current.push(next);
                }
                in_token = true;
            }
            (None, c) if c.is_whitespace() => {
                if in_token {
                    args.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            (None, c) => {
                current.push(c);
                in_token = true;
            }
        }
    }

    if quote.is_some() {
        return Err(ComponentError::Other(anyhow::anyhow!(
            "unterminated quote in command: {}",
            command
        )));
    }
    if in_token {
        args.push(current);
    }
    if args.is_empty() {
        return Err(ComponentError::Other(anyhow::anyhow!("empty command")));
    }
    Ok(args)
}

/// Map a host path onto `root`.
pub fn rooted(root: &Path, host_path: &Path) -> PathBuf {
    let relative = host_path.strip_prefix("/").unwrap_or(host_path);
    root.join(relative)
}

/// Expand `pattern` (in host paths) beneath `root`, returning host paths.
pub fn glob_under(root: &Path, pattern: &str) -> ComponentResult<Vec<PathBuf>> {
    let rooted_pattern = rooted(root, Path::new(pattern));
    let rooted_pattern = rooted_pattern.to_string_lossy();

    let entries = glob::glob(&rooted_pattern)
        .map_err(|e| ComponentError::Other(anyhow::anyhow!("invalid glob '{}': {}", pattern, e)))?;

    let mut paths: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .filter(|p| p.is_file())
        .filter_map(|p| {
            p.strip_prefix(root)
                .ok()
                .map(|rel| Path::new("/").join(rel))
        })
        .collect();
    paths.sort();
    Ok(paths)
}
