use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::core::component::ComponentId;

/// Problems with the shape of the component graph.
///
/// These are raised before any component executes. A run that hits one of
/// these never starts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("component '{0}' is already registered")]
    DuplicateComponent(ComponentId),

    #[error("dependency cycle detected: {}", format_cycle(.cycle))]
    Cycle { cycle: Vec<ComponentId> },

    #[error("unknown component: {0}")]
    UnknownComponent(ComponentId),

    #[error("component '{component}' depends on unregistered component '{dependency}'")]
    UnknownDependency {
        component: ComponentId,
        dependency: ComponentId,
    },
}

fn format_cycle(cycle: &[ComponentId]) -> String {
    cycle
        .iter()
        .map(ComponentId::as_str)
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Errors raised while a single component executes.
///
/// The evaluator never propagates these. Skip-kind errors become a
/// `Skipped` outcome; everything else becomes `Failed`.
#[derive(Debug, Error)]
pub enum ComponentError {
    #[error("{0}")]
    Skip(String),

    #[error("command not found: {command}")]
    CommandNotFound { command: String },

    #[error("file not found: {}", .path.display())]
    FileNotFound { path: PathBuf },

    #[error("content not found in archive: {what}")]
    ContentNotFound { what: String },

    #[error("no filters defined for {0}")]
    NoFilters(ComponentId),

    #[error(
        "command '{command}' timed out after {:.2}s (limit {}s)",
        .elapsed.as_secs_f64(),
        .timeout.as_secs()
    )]
    CommandTimeout {
        command: String,
        timeout: Duration,
        elapsed: Duration,
    },

    #[error("command '{command}' exited with status {exit_code}")]
    CommandFailed { command: String, exit_code: i32 },

    #[error("required input '{0}' is not available")]
    MissingInput(ComponentId),

    #[error("component panicked: {0}")]
    Panicked(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ComponentError {
    pub fn skip(reason: impl Into<String>) -> Self {
        ComponentError::Skip(reason.into())
    }

    /// Expected absences: the component had nothing to collect.
    pub fn is_skip(&self) -> bool {
        matches!(
            self,
            ComponentError::Skip(_)
                | ComponentError::CommandNotFound { .. }
                | ComponentError::FileNotFound { .. }
                | ComponentError::ContentNotFound { .. }
        )
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ComponentError::CommandTimeout { .. })
    }

    /// Short machine-readable label written to the collection metadata.
    pub fn kind(&self) -> &'static str {
        match self {
            ComponentError::Skip(_) => "skip",
            ComponentError::CommandNotFound { .. } => "command_not_found",
            ComponentError::FileNotFound { .. } => "file_not_found",
            ComponentError::ContentNotFound { .. } => "content_not_found",
            ComponentError::NoFilters(_) => "no_filters",
            ComponentError::CommandTimeout { .. } => "timeout",
            ComponentError::CommandFailed { .. } => "command_failed",
            ComponentError::MissingInput(_) => "missing_input",
            ComponentError::Panicked(_) => "panic",
            ComponentError::Io(_) => "io",
            ComponentError::Other(_) => "error",
        }
    }

    pub fn elapsed(&self) -> Option<Duration> {
        match self {
            ComponentError::CommandTimeout { elapsed, .. } => Some(*elapsed),
            _ => None,
        }
    }
}

pub type ComponentResult<T> = Result<T, ComponentError>;
