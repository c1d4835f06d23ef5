//! Filter registry: the patterns a datasource is allowed to keep.
//!
//! Any component may declare, at registration time, the substrings it needs
//! from a datasource. The datasource then keeps only the records containing
//! one of them. A filterable datasource nobody declared filters for does not
//! run at all.

use std::collections::{BTreeSet, HashMap};
use std::sync::{PoisonError, RwLock};

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};

use crate::core::component::ComponentId;

lazy_static! {
    static ref GLOBAL_FILTERS: FilterRegistry = FilterRegistry::new();
}

/// Process-wide filter registry used by the default spec catalog.
pub fn global() -> &'static FilterRegistry {
    &GLOBAL_FILTERS
}

/// Add patterns for `id` to the process-wide registry.
pub fn add_filter<I, S>(id: impl Into<ComponentId>, patterns: I)
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    global().add_filter(id, patterns);
}

/// Mapping from datasource to the patterns it must retain.
///
/// Filters can only be added. The registry is internally synchronized so it
/// can be shared read-only between concurrent evaluations.
#[derive(Debug, Default)]
pub struct FilterRegistry {
    filters: RwLock<HashMap<ComponentId, BTreeSet<String>>>,
}

impl FilterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Union `patterns` into the set stored for `id`. Empty patterns are ignored.
    pub fn add_filter<I, S>(&self, id: impl Into<ComponentId>, patterns: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut filters = self.filters.write().unwrap_or_else(PoisonError::into_inner);
        let set = filters.entry(id.into()).or_default();
        for pattern in patterns {
            let pattern = pattern.into();
            if !pattern.is_empty() {
                set.insert(pattern);
            }
        }
    }

    pub fn get_filters(&self, id: &str) -> BTreeSet<String> {
        let filters = self.filters.read().unwrap_or_else(PoisonError::into_inner);
        filters.get(id).cloned().unwrap_or_default()
    }

    pub fn has_filters(&self, id: &str) -> bool {
        let filters = self.filters.read().unwrap_or_else(PoisonError::into_inner);
        filters.get(id).map_or(false, |set| !set.is_empty())
    }

    /// Snapshot of every registered filter set.
    pub fn snapshot(&self) -> HashMap<ComponentId, BTreeSet<String>> {
        self.filters.read().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

/// How a datasource's output divides into logical records for filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordBoundary {
    /// Every line is its own record
    #[default]
    Line,
    /// Records are separated by blank lines
    BlankLine,
    /// A record starts at an unindented line; indented lines continue it
    Indented,
}

/// Keep the records that contain at least one of `patterns`.
///
/// With no patterns nothing is kept.
pub fn apply_filters<S: AsRef<str>>(
    lines: &[S],
    patterns: &BTreeSet<String>,
    boundary: RecordBoundary,
) -> Vec<String> {
    if patterns.is_empty() {
        return Vec::new();
    }

    let matches = |line: &str| patterns.iter().any(|p| line.contains(p.as_str()));

    let mut kept = Vec::new();
    for record in split_records(lines, boundary) {
        if record.iter().any(|line| matches(line)) {
            if boundary == RecordBoundary::BlankLine && !kept.is_empty() {
                kept.push(String::new());
            }
            kept.extend(record.into_iter().map(str::to_string));
        }
    }
    kept
}

fn split_records<S: AsRef<str>>(lines: &[S], boundary: RecordBoundary) -> Vec<Vec<&str>> {
    let mut records: Vec<Vec<&str>> = Vec::new();

    match boundary {
        RecordBoundary::Line => {
            records.extend(lines.iter().map(|l| vec![l.as_ref()]));
        }
        RecordBoundary::BlankLine => {
            let mut current = Vec::new();
            for line in lines.iter().map(AsRef::<str>::as_ref) {
                if line.trim().is_empty() {
                    if !current.is_empty() {
                        records.push(std::mem::take(&mut current));
                    }
                } else {
                    current.push(line);
                }
            }
            if !current.is_empty() {
                records.push(current);
            }
        }
        RecordBoundary::Indented => {
            for line in lines.iter().map(AsRef::<str>::as_ref) {
                let continuation = line.starts_with(' ') || line.starts_with('\t');
                match records.last_mut() {
                    Some(record) if continuation => record.push(line),
                    _ => records.push(vec![line]),
                }
            }
        }
    }

    records
}
