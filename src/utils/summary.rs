use anyhow::{Context, Result};
use serde_json::json;
use uuid::Uuid;

use crate::models::{ArchiveEntry, ComponentRecord, OutcomeCounts};

/// Create the JSON summary written at the archive root.
///
/// The summary ties the run together: host, start time, outcome counts,
/// every file written, and the components that did not succeed.
///
/// # Example Output
///
/// ```json
/// {
///   "collection_id": "550e8400-e29b-41d4-a716-446655440000",
///   "hostname": "web-01",
///   "collection_time": "2026-01-15T14:30:52Z",
///   "counts": {"success": 9, "skipped": 2, "failed": 0},
///   "files": [...],
///   "not_collected": [...]
/// }
/// ```
pub fn create_collection_summary(
    hostname: &str,
    timestamp: &str,
    context: &str,
    counts: &OutcomeCounts,
    entries: &[ArchiveEntry],
    records: &[ComponentRecord],
) -> Result<String> {
    let files: Vec<_> = entries
        .iter()
        .map(|entry| {
            json!({
                "path": entry.path,
                "size": entry.size,
                "sha256": entry.sha256,
            })
        })
        .collect();

    let not_collected: Vec<_> = records
        .iter()
        .filter(|r| r.outcome != "success")
        .map(|r| {
            json!({
                "name": r.name,
                "outcome": r.outcome,
                "reason": r.reason,
            })
        })
        .collect();

    let summary = json!({
        "collection_id": Uuid::new_v4().to_string(),
        "hostname": hostname,
        "collection_time": timestamp,
        "context": context,
        "os": std::env::consts::OS,
        "collector_version": env!("CARGO_PKG_VERSION"),
        "counts": counts,
        "component_count": counts.total(),
        "files": files,
        "not_collected": not_collected,
    });

    serde_json::to_string_pretty(&summary).context("Failed to serialize collection summary")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ComponentKind;
    use chrono::Utc;

    #[test]
    fn test_summary_fields() {
        let entries = vec![ArchiveEntry {
            path: "insights_commands/ps_auxww".into(),
            size: 10,
            sha256: "abc".into(),
            mode: 0o600,
            written_at: Utc::now(),
        }];
        let records = vec![ComponentRecord {
            name: "lvs".into(),
            kind: ComponentKind::Datasource,
            outcome: "skipped".into(),
            reason: Some("blacklisted by configuration".into()),
            error_kind: None,
            duration_secs: 0.0,
            timestamp: None,
            exit_status: None,
            paths: vec![],
        }];
        let counts = OutcomeCounts {
            success: 1,
            skipped: 1,
            failed: 0,
        };

        let summary = create_collection_summary("web-01", "2026-01-15T14:30:52Z", "host", &counts, &entries, &records)
            .unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&summary).unwrap();

        assert_eq!(parsed["hostname"], "web-01");
        assert_eq!(parsed["context"], "host");
        assert_eq!(parsed["component_count"], 2);
        assert_eq!(parsed["counts"]["skipped"], 1);
        assert_eq!(parsed["files"][0]["path"], "insights_commands/ps_auxww");
        assert_eq!(parsed["not_collected"][0]["name"], "lvs");
        assert!(Uuid::parse_str(parsed["collection_id"].as_str().unwrap()).is_ok());
    }
}
