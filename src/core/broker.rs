//! Per-run store of component outcomes.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

use crate::core::component::{ComponentId, Value};
use crate::core::error::ComponentError;

/// Result of evaluating one component in one run.
pub enum Outcome {
    Success(Value),
    Skipped(String),
    Failed(ComponentError),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Outcome::Skipped(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Outcome::Failed(_))
    }

    pub fn status(&self) -> &'static str {
        match self {
            Outcome::Success(_) => "success",
            Outcome::Skipped(_) => "skipped",
            Outcome::Failed(_) => "failed",
        }
    }
}

impl fmt::Debug for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Success(_) => write!(f, "Success(..)"),
            Outcome::Skipped(reason) => f.debug_tuple("Skipped").field(reason).finish(),
            Outcome::Failed(err) => f.debug_tuple("Failed").field(err).finish(),
        }
    }
}

/// When a component ran and for how long.
#[derive(Debug, Clone, Copy)]
pub struct Timing {
    pub timestamp: DateTime<Utc>,
    pub start: Instant,
    pub end: Instant,
}

impl Timing {
    pub fn duration(&self) -> Duration {
        self.end.saturating_duration_since(self.start)
    }
}

/// Outcomes computed so far in a single evaluation run.
///
/// Each component gets at most one entry per run. Writing a second entry
/// for the same component is a bug in the caller and panics.
#[derive(Debug, Default)]
pub struct Broker {
    entries: HashMap<ComponentId, Outcome>,
    order: Vec<ComponentId>,
    timings: HashMap<ComponentId, Timing>,
}

impl Broker {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when `id` ran successfully in this run.
    pub fn contains(&self, id: &str) -> bool {
        matches!(self.entries.get(id), Some(Outcome::Success(_)))
    }

    /// True when `id` has any outcome, successful or not.
    pub fn has_outcome(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&Value> {
        match self.entries.get(id) {
            Some(Outcome::Success(value)) => Some(value),
            _ => None,
        }
    }

    /// Successful value of `id`, if it has type `T`.
    pub fn get_as<T: Any>(&self, id: &str) -> Option<&T> {
        self.get(id).and_then(|v| v.downcast_ref::<T>())
    }

    pub fn outcome(&self, id: &str) -> Option<&Outcome> {
        self.entries.get(id)
    }

    pub fn timing(&self, id: &str) -> Option<&Timing> {
        self.timings.get(id)
    }

    pub fn set(&mut self, id: impl Into<ComponentId>, value: Value) {
        self.insert(id.into(), Outcome::Success(value));
    }

    pub fn mark_failed(&mut self, id: impl Into<ComponentId>, error: ComponentError) {
        self.insert(id.into(), Outcome::Failed(error));
    }

    pub fn mark_skipped(&mut self, id: impl Into<ComponentId>, reason: impl Into<String>) {
        self.insert(id.into(), Outcome::Skipped(reason.into()));
    }

    pub(crate) fn record(&mut self, id: ComponentId, outcome: Outcome, timing: Option<Timing>) {
        if let Some(timing) = timing {
            self.timings.insert(id.clone(), timing);
        }
        self.insert(id, outcome);
    }

    fn insert(&mut self, id: ComponentId, outcome: Outcome) {
        if self.entries.contains_key(&id) {
            panic!("broker entry for '{}' was already set in this run", id);
        }
        self.order.push(id.clone());
        self.entries.insert(id, outcome);
    }

    /// All outcomes in the order they were recorded.
    pub fn iter(&self) -> impl Iterator<Item = (&ComponentId, &Outcome)> {
        self.order
            .iter()
            .filter_map(move |id| self.entries.get(id).map(|o| (id, o)))
    }

    pub fn successes(&self) -> Vec<(&ComponentId, &Value)> {
        self.iter()
            .filter_map(|(id, o)| match o {
                Outcome::Success(v) => Some((id, v)),
                _ => None,
            })
            .collect()
    }

    pub fn all_failures(&self) -> Vec<(&ComponentId, &ComponentError)> {
        self.iter()
            .filter_map(|(id, o)| match o {
                Outcome::Failed(e) => Some((id, e)),
                _ => None,
            })
            .collect()
    }

    pub fn all_skips(&self) -> Vec<(&ComponentId, &str)> {
        self.iter()
            .filter_map(|(id, o)| match o {
                Outcome::Skipped(reason) => Some((id, reason.as_str())),
                _ => None,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
