//! Evaluator: runs the dependency graph against a context.

use std::any::Any;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use log::{debug, info, warn};
use rayon::prelude::*;

use crate::constants::REASON_INTERRUPTED;
use crate::context::ExecutionContext;
use crate::core::broker::{Broker, Outcome, Timing};
use crate::core::component::{Component, ComponentId, ComponentKind, Inputs};
use crate::core::error::{ComponentError, ConfigError};
use crate::core::filters::FilterRegistry;
use crate::core::registry::ComponentRegistry;

/// Which components a run should produce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Targets {
    /// Every registered datasource
    AllDatasources,
    /// Every registered component
    Everything,
    /// The named components, plus whatever they depend on
    Named(Vec<ComponentId>),
}

impl Targets {
    pub fn named<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<ComponentId>,
    {
        Targets::Named(ids.into_iter().map(Into::into).collect())
    }
}

/// Cooperative stop signal shared between an evaluator and whoever wants to stop it.
///
/// Aborting stops new components from starting. Work already running
/// finishes or runs into its timeout.
#[derive(Debug, Clone, Default)]
pub struct AbortHandle(Arc<AtomicBool>);

impl AbortHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn abort(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_aborted(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Executes components in dependency order and records their outcomes.
pub struct Evaluator<'a> {
    registry: &'a ComponentRegistry,
    filters: &'a FilterRegistry,
    parallel: bool,
    abort: AbortHandle,
}

impl<'a> Evaluator<'a> {
    pub fn new(registry: &'a ComponentRegistry, filters: &'a FilterRegistry) -> Self {
        Self {
            registry,
            filters,
            parallel: false,
            abort: AbortHandle::new(),
        }
    }

    /// Run independent components of the same depth concurrently.
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_abort(mut self, abort: AbortHandle) -> Self {
        self.abort = abort;
        self
    }

    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }

    /// Evaluate `targets` into a fresh broker.
    pub fn run(&self, targets: &Targets, context: &dyn ExecutionContext) -> Result<Broker, ConfigError> {
        self.run_with(Broker::new(), targets, context)
    }

    /// Evaluate `targets` into `broker`. Entries already present are left alone.
    ///
    /// Only configuration errors are returned; every component-level problem
    /// ends up in the broker.
    pub fn run_with(
        &self,
        mut broker: Broker,
        targets: &Targets,
        context: &dyn ExecutionContext,
    ) -> Result<Broker, ConfigError> {
        let ids = match targets {
            Targets::AllDatasources => self.registry.ids_of_kind(ComponentKind::Datasource),
            Targets::Everything => self.registry.ids(),
            Targets::Named(ids) => ids.clone(),
        };
        let order = self.registry.topo_order(&ids)?;

        info!(
            "Evaluating {} components against {} context{}",
            order.len(),
            context.name(),
            if self.parallel { " (parallel)" } else { "" }
        );
        let started = Instant::now();

        if self.parallel {
            for wave in self.waves(&order) {
                let pending: Vec<&Component> = wave
                    .iter()
                    .filter(|id| !broker.has_outcome(id.as_str()))
                    .filter_map(|id| self.registry.get(id.as_str()))
                    .collect();

                let shared = &broker;
                let results: Vec<(Outcome, Timing)> = pending
                    .par_iter()
                    .map(|component| self.execute(component, shared, context))
                    .collect();

                for (component, (outcome, timing)) in pending.iter().zip(results) {
                    log_outcome(component.id(), &outcome, &timing);
                    broker.record(component.id().clone(), outcome, Some(timing));
                }
            }
        } else {
            for id in &order {
                if broker.has_outcome(id.as_str()) {
                    continue;
                }
                let Some(component) = self.registry.get(id.as_str()) else {
                    continue;
                };
                let (outcome, timing) = self.execute(component, &broker, context);
                log_outcome(id, &outcome, &timing);
                broker.record(id.clone(), outcome, Some(timing));
            }
        }

        info!(
            "Evaluation finished in {:.2}s: {} succeeded, {} skipped, {} failed",
            started.elapsed().as_secs_f64(),
            broker.successes().len(),
            broker.all_skips().len(),
            broker.all_failures().len()
        );
        Ok(broker)
    }

    /// Group `order` by dependency depth. Components within a wave never
    /// depend on each other.
    fn waves(&self, order: &[ComponentId]) -> Vec<Vec<ComponentId>> {
        let mut depth: HashMap<&str, usize> = HashMap::new();
        let mut waves: Vec<Vec<ComponentId>> = Vec::new();

        for id in order {
            let level = self
                .registry
                .dependencies_of(id.as_str())
                .iter()
                .filter_map(|dep| depth.get(dep.as_str()))
                .map(|d| d + 1)
                .max()
                .unwrap_or(0);
            depth.insert(id.as_str(), level);
            if waves.len() <= level {
                waves.resize_with(level + 1, Vec::new);
            }
            waves[level].push(id.clone());
        }
        waves
    }

    fn execute(&self, component: &Component, broker: &Broker, context: &dyn ExecutionContext) -> (Outcome, Timing) {
        let timestamp = Utc::now();
        let start = Instant::now();
        let outcome = self.evaluate(component, broker, context);
        let timing = Timing {
            timestamp,
            start,
            end: Instant::now(),
        };
        (outcome, timing)
    }

    fn evaluate(&self, component: &Component, broker: &Broker, context: &dyn ExecutionContext) -> Outcome {
        if self.abort.is_aborted() {
            return Outcome::Skipped(REASON_INTERRUPTED.to_string());
        }

        let id = component.id();
        if let Some(missing) = component.required_deps().iter().find(|d| !broker.contains(d.as_str())) {
            return Outcome::Skipped(format!("missing required dependency: {}", missing));
        }

        if component.is_filterable() && !self.filters.has_filters(id.as_str()) {
            return Outcome::Failed(ComponentError::NoFilters(id.clone()));
        }

        let mut inputs = Inputs::new(id, self.filters.get_filters(id.as_str()));
        for dep in component.dependencies() {
            if let Some(value) = broker.get(dep.as_str()) {
                inputs.insert(dep, value);
            }
        }

        match panic::catch_unwind(AssertUnwindSafe(|| component.invoke(&inputs, context))) {
            Ok(Ok(value)) => Outcome::Success(value),
            Ok(Err(err)) if err.is_skip() => Outcome::Skipped(err.to_string()),
            Ok(Err(err)) => Outcome::Failed(err),
            Err(payload) => Outcome::Failed(ComponentError::Panicked(panic_message(payload.as_ref()))),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

fn log_outcome(id: &ComponentId, outcome: &Outcome, timing: &Timing) {
    let secs = timing.duration().as_secs_f64();
    match outcome {
        Outcome::Success(_) => debug!("{} succeeded in {:.3}s", id, secs),
        Outcome::Skipped(reason) => debug!("{} skipped: {}", id, reason),
        Outcome::Failed(err) => warn!("{} failed after {:.3}s: {}", id, secs, err),
    }
}
