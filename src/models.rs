use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::core::{Broker, ComponentKind, ComponentRegistry, Outcome};
use crate::security::credential_scrubber::{contains_credentials, scrub_credentials};
use crate::specs::providers_of;

/// A file written into the archive.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Path relative to the archive root
    pub path: String,
    pub size: u64,
    pub sha256: String,
    pub mode: u32,
    pub written_at: DateTime<Utc>,
}

/// One line of `meta_data/collection.jsonl`: what happened to one component.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ComponentRecord {
    pub name: String,
    pub kind: ComponentKind,
    /// "success", "skipped" or "failed"
    pub outcome: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
    pub duration_secs: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_status: Option<i32>,
    #[serde(default)]
    pub paths: Vec<String>,
}

impl ComponentRecord {
    /// Build one record per broker entry, in evaluation order.
    ///
    /// Failure and skip messages are scrubbed of credentials when `scrub` is
    /// set, since failing commands tend to echo their arguments.
    pub fn from_broker(registry: &ComponentRegistry, broker: &Broker, scrub: bool) -> Vec<Self> {
        let clean = |s: String| {
            if scrub && contains_credentials(&s) {
                debug!("Scrubbing credentials from a recorded message");
                scrub_credentials(&s)
            } else {
                s
            }
        };

        broker
            .iter()
            .map(|(id, outcome)| {
                let kind = registry
                    .get(id.as_str())
                    .map(|c| c.kind())
                    .unwrap_or(ComponentKind::Datasource);
                let timing = broker.timing(id.as_str());

                let (reason, error_kind, exit_status, paths) = match outcome {
                    Outcome::Success(value) => {
                        let providers = providers_of(value);
                        let exit = providers.iter().find_map(|p| p.exit_code());
                        let paths = providers
                            .iter()
                            .map(|p| p.relative_path().to_string_lossy().into_owned())
                            .collect();
                        (None, None, exit, paths)
                    }
                    Outcome::Skipped(reason) => (Some(clean(reason.clone())), None, None, Vec::new()),
                    Outcome::Failed(err) => {
                        let exit = match err {
                            crate::core::ComponentError::CommandFailed { exit_code, .. } => Some(*exit_code),
                            _ => None,
                        };
                        (Some(clean(err.to_string())), Some(err.kind().to_string()), exit, Vec::new())
                    }
                };

                ComponentRecord {
                    name: id.to_string(),
                    kind,
                    outcome: outcome.status().to_string(),
                    reason,
                    error_kind,
                    duration_secs: timing.map(|t| t.duration().as_secs_f64()).unwrap_or(0.0),
                    timestamp: timing.map(|t| t.timestamp),
                    exit_status,
                    paths,
                }
            })
            .collect()
    }
}

/// Counts reported at the end of a run.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct OutcomeCounts {
    pub success: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl OutcomeCounts {
    pub fn from_records(records: &[ComponentRecord]) -> Self {
        let mut counts = Self::default();
        for record in records {
            match record.outcome.as_str() {
                "success" => counts.success += 1,
                "skipped" => counts.skipped += 1,
                _ => counts.failed += 1,
            }
        }
        counts
    }

    pub fn total(&self) -> usize {
        self.success + self.skipped + self.failed
    }
}
