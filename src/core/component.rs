//! Component definitions: the nodes of the dependency graph.

use std::any::Any;
use std::borrow::Borrow;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::context::ExecutionContext;
use crate::core::error::{ComponentError, ComponentResult};

/// Unique name of a registered component.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ComponentId(String);

impl ComponentId {
    pub fn new(name: impl Into<String>) -> Self {
        ComponentId(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ComponentId {
    fn from(name: &str) -> Self {
        ComponentId(name.to_string())
    }
}

impl From<String> for ComponentId {
    fn from(name: String) -> Self {
        ComponentId(name)
    }
}

impl From<&ComponentId> for ComponentId {
    fn from(id: &ComponentId) -> Self {
        id.clone()
    }
}

impl AsRef<str> for ComponentId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for ComponentId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// What role a component plays in a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentKind {
    /// Gathers raw data from the host or a replayed archive
    Datasource,
    /// Turns one datasource's content into a typed object
    Parser,
    /// Merges several parsers or datasources
    Combiner,
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComponentKind::Datasource => write!(f, "datasource"),
            ComponentKind::Parser => write!(f, "parser"),
            ComponentKind::Combiner => write!(f, "combiner"),
        }
    }
}

/// Type-erased value produced by a component and stored in the broker.
pub type Value = Arc<dyn Any + Send + Sync>;

/// Wrap a concrete value for storage in the broker.
pub fn value<T: Any + Send + Sync>(v: T) -> Value {
    Arc::new(v)
}

/// The callable body of a component.
pub type Action = Arc<dyn Fn(&Inputs<'_>, &dyn ExecutionContext) -> ComponentResult<Value> + Send + Sync>;

/// Resolved inputs handed to a component's action.
///
/// Holds every required dependency plus whichever optional dependencies
/// produced a value in this run, and the filters registered for the
/// component itself.
pub struct Inputs<'a> {
    component: &'a ComponentId,
    values: HashMap<&'a str, &'a Value>,
    filters: BTreeSet<String>,
}

impl<'a> Inputs<'a> {
    pub fn new(component: &'a ComponentId, filters: BTreeSet<String>) -> Self {
        Self {
            component,
            values: HashMap::new(),
            filters,
        }
    }

    pub fn with_value(mut self, id: &'a ComponentId, value: &'a Value) -> Self {
        self.values.insert(id.as_str(), value);
        self
    }

    pub(crate) fn insert(&mut self, id: &'a ComponentId, value: &'a Value) {
        self.values.insert(id.as_str(), value);
    }

    /// The component these inputs belong to.
    pub fn component(&self) -> &ComponentId {
        self.component
    }

    pub fn contains(&self, id: &str) -> bool {
        self.values.contains_key(id)
    }

    /// Fetch a dependency's value if present and of type `T`.
    pub fn get<T: Any>(&self, id: &str) -> Option<&T> {
        self.values.get(id).and_then(|v| v.downcast_ref::<T>())
    }

    /// Fetch a dependency the action cannot do without.
    pub fn require<T: Any>(&self, id: &str) -> ComponentResult<&T> {
        self.get(id)
            .ok_or_else(|| ComponentError::MissingInput(ComponentId::from(id)))
    }

    /// Filters registered for this component; empty when none are.
    pub fn filters(&self) -> &BTreeSet<String> {
        &self.filters
    }
}

/// A named unit of collection or derivation logic.
///
/// Immutable once handed to the registry.
#[derive(Clone)]
pub struct Component {
    id: ComponentId,
    kind: ComponentKind,
    requires: Vec<ComponentId>,
    optional: Vec<ComponentId>,
    filterable: bool,
    description: Option<String>,
    action: Action,
}

impl Component {
    pub fn new<F>(id: impl Into<ComponentId>, kind: ComponentKind, action: F) -> Self
    where
        F: Fn(&Inputs<'_>, &dyn ExecutionContext) -> ComponentResult<Value> + Send + Sync + 'static,
    {
        Self {
            id: id.into(),
            kind,
            requires: Vec::new(),
            optional: Vec::new(),
            filterable: false,
            description: None,
            action: Arc::new(action),
        }
    }

    pub fn datasource<F>(id: impl Into<ComponentId>, action: F) -> Self
    where
        F: Fn(&Inputs<'_>, &dyn ExecutionContext) -> ComponentResult<Value> + Send + Sync + 'static,
    {
        Self::new(id, ComponentKind::Datasource, action)
    }

    pub fn parser<F>(id: impl Into<ComponentId>, action: F) -> Self
    where
        F: Fn(&Inputs<'_>, &dyn ExecutionContext) -> ComponentResult<Value> + Send + Sync + 'static,
    {
        Self::new(id, ComponentKind::Parser, action)
    }

    pub fn combiner<F>(id: impl Into<ComponentId>, action: F) -> Self
    where
        F: Fn(&Inputs<'_>, &dyn ExecutionContext) -> ComponentResult<Value> + Send + Sync + 'static,
    {
        Self::new(id, ComponentKind::Combiner, action)
    }

    /// Declare required dependencies, appended in the given order.
    pub fn requires<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<ComponentId>,
    {
        self.requires.extend(deps.into_iter().map(Into::into));
        self
    }

    /// Declare optional dependencies, appended in the given order.
    pub fn optional<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<ComponentId>,
    {
        self.optional.extend(deps.into_iter().map(Into::into));
        self
    }

    /// Mark the component's output as subject to the filter registry.
    pub fn filterable(mut self) -> Self {
        self.filterable = true;
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn id(&self) -> &ComponentId {
        &self.id
    }

    pub fn kind(&self) -> ComponentKind {
        self.kind
    }

    pub fn required_deps(&self) -> &[ComponentId] {
        &self.requires
    }

    pub fn optional_deps(&self) -> &[ComponentId] {
        &self.optional
    }

    /// Required dependencies followed by optional ones, in declaration order.
    pub fn dependencies(&self) -> impl Iterator<Item = &ComponentId> {
        self.requires.iter().chain(self.optional.iter())
    }

    pub fn depends_on(&self, id: &str) -> bool {
        self.dependencies().any(|d| d.as_str() == id)
    }

    pub fn is_filterable(&self) -> bool {
        self.filterable
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub(crate) fn invoke(&self, inputs: &Inputs<'_>, context: &dyn ExecutionContext) -> ComponentResult<Value> {
        (self.action)(inputs, context)
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Component")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("requires", &self.requires)
            .field("optional", &self.optional)
            .field("filterable", &self.filterable)
            .finish()
    }
}
