//! The dependency-resolution and execution engine.

pub mod broker;
pub mod component;
pub mod error;
pub mod evaluator;
pub mod filters;
pub mod registry;

pub use broker::{Broker, Outcome, Timing};
pub use component::{value, Component, ComponentId, ComponentKind, Inputs, Value};
pub use error::{ComponentError, ComponentResult, ConfigError};
pub use evaluator::{AbortHandle, Evaluator, Targets};
pub use filters::{add_filter, apply_filters, FilterRegistry, RecordBoundary};
pub use registry::ComponentRegistry;
