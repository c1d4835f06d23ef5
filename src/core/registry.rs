//! Component registry and dependency graph queries.

use std::collections::HashMap;

use log::debug;

use crate::core::component::{Component, ComponentId, ComponentKind};
use crate::core::error::ConfigError;

/// All components known to a collection, in registration order.
///
/// Registration order is the tie-breaker everywhere an order has to be
/// chosen, so that two runs over the same registry behave identically.
#[derive(Debug, Default)]
pub struct ComponentRegistry {
    components: Vec<Component>,
    index: HashMap<ComponentId, usize>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Done,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a component. Names are unique for the lifetime of the registry.
    pub fn register(&mut self, component: Component) -> Result<(), ConfigError> {
        if self.index.contains_key(component.id()) {
            return Err(ConfigError::DuplicateComponent(component.id().clone()));
        }

        debug!(
            "Registered {} {} (requires: {:?}, optional: {:?})",
            component.kind(),
            component.id(),
            component.required_deps(),
            component.optional_deps()
        );

        self.index.insert(component.id().clone(), self.components.len());
        self.components.push(component);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&Component> {
        self.index.get(id).map(|&i| &self.components[i])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Components in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Component> {
        self.components.iter()
    }

    pub fn ids(&self) -> Vec<ComponentId> {
        self.components.iter().map(|c| c.id().clone()).collect()
    }

    pub fn ids_of_kind(&self, kind: ComponentKind) -> Vec<ComponentId> {
        self.components
            .iter()
            .filter(|c| c.kind() == kind)
            .map(|c| c.id().clone())
            .collect()
    }

    /// Declared dependencies of `id`: required first, then optional.
    pub fn dependencies_of(&self, id: &str) -> Vec<&ComponentId> {
        self.get(id)
            .map(|c| c.dependencies().collect())
            .unwrap_or_default()
    }

    /// Components that declare a dependency on `id`, in registration order.
    pub fn dependents_of(&self, id: &str) -> Vec<&ComponentId> {
        self.components
            .iter()
            .filter(|c| c.depends_on(id))
            .map(|c| c.id())
            .collect()
    }

    /// Evaluation order for `targets` and everything they depend on.
    ///
    /// Every dependency precedes its dependents. Targets are walked in the
    /// order given and dependencies in declaration order, so the result is
    /// deterministic. Repeated targets are visited once.
    pub fn topo_order(&self, targets: &[ComponentId]) -> Result<Vec<ComponentId>, ConfigError> {
        for target in targets {
            if !self.contains(target.as_str()) {
                return Err(ConfigError::UnknownComponent(target.clone()));
            }
        }

        let mut marks: HashMap<&str, Mark> = HashMap::new();
        let mut stack: Vec<&ComponentId> = Vec::new();
        let mut order = Vec::new();

        for target in targets {
            self.visit(target.as_str(), &mut marks, &mut stack, &mut order)?;
        }

        Ok(order)
    }

    fn visit<'a>(
        &'a self,
        id: &str,
        marks: &mut HashMap<&'a str, Mark>,
        stack: &mut Vec<&'a ComponentId>,
        order: &mut Vec<ComponentId>,
    ) -> Result<(), ConfigError> {
        let component = self
            .get(id)
            .ok_or_else(|| ConfigError::UnknownComponent(ComponentId::from(id)))?;

        match marks.get(id) {
            Some(Mark::Done) => return Ok(()),
            Some(Mark::Visiting) => {
                let start = stack.iter().position(|c| c.as_str() == id).unwrap_or(0);
                let mut cycle: Vec<ComponentId> = stack[start..].iter().map(|c| (*c).clone()).collect();
                cycle.push(component.id().clone());
                return Err(ConfigError::Cycle { cycle });
            }
            None => {}
        }

        marks.insert(component.id().as_str(), Mark::Visiting);
        stack.push(component.id());

        for dependency in component.dependencies() {
            if !self.contains(dependency.as_str()) {
                return Err(ConfigError::UnknownDependency {
                    component: component.id().clone(),
                    dependency: dependency.clone(),
                });
            }
            self.visit(dependency.as_str(), marks, stack, order)?;
        }

        stack.pop();
        marks.insert(component.id().as_str(), Mark::Done);
        order.push(component.id().clone());
        Ok(())
    }

    /// Check the whole registry for dangling references and cycles.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.topo_order(&self.ids()).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::component::value;

    fn node(name: &str) -> Component {
        Component::datasource(name, |_, _| Ok(value(())))
    }

    fn ids(names: &[&str]) -> Vec<ComponentId> {
        names.iter().map(|n| ComponentId::from(*n)).collect()
    }

    #[test]
    fn test_duplicate_registration() {
        let mut registry = ComponentRegistry::new();
        registry.register(node("hostname")).unwrap();

        let err = registry.register(node("hostname")).unwrap_err();
        assert_eq!(err, ConfigError::DuplicateComponent("hostname".into()));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_dependency_queries_follow_declaration_order() {
        let mut registry = ComponentRegistry::new();
        registry.register(node("a")).unwrap();
        registry.register(node("b")).unwrap();
        registry.register(node("c").requires(["b", "a"])).unwrap();
        registry.register(node("d").optional(["a"])).unwrap();

        let deps: Vec<&str> = registry.dependencies_of("c").iter().map(|d| d.as_str()).collect();
        assert_eq!(deps, vec!["b", "a"]);

        let dependents: Vec<&str> = registry.dependents_of("a").iter().map(|d| d.as_str()).collect();
        assert_eq!(dependents, vec!["c", "d"]);

        assert!(registry.dependencies_of("missing").is_empty());
    }

    #[test]
    fn test_topo_order_closure_only() {
        let mut registry = ComponentRegistry::new();
        registry.register(node("A")).unwrap();
        registry.register(node("B").requires(["A"])).unwrap();
        registry.register(node("C").optional(["B"])).unwrap();
        registry.register(node("unrelated")).unwrap();

        let order = registry.topo_order(&ids(&["C"])).unwrap();
        assert_eq!(order, ids(&["A", "B", "C"]));
    }

    #[test]
    fn test_topo_order_dedupes_targets() {
        let mut registry = ComponentRegistry::new();
        registry.register(node("A")).unwrap();
        registry.register(node("B").requires(["A"])).unwrap();

        let order = registry.topo_order(&ids(&["B", "A", "B"])).unwrap();
        assert_eq!(order, ids(&["A", "B"]));
    }

    #[test]
    fn test_unknown_target() {
        let registry = ComponentRegistry::new();
        let err = registry.topo_order(&ids(&["nope"])).unwrap_err();
        assert_eq!(err, ConfigError::UnknownComponent("nope".into()));
    }

    #[test]
    fn test_unknown_dependency() {
        let mut registry = ComponentRegistry::new();
        registry.register(node("parser").requires(["ghost"])).unwrap();

        let err = registry.topo_order(&ids(&["parser"])).unwrap_err();
        assert_eq!(
            err,
            ConfigError::UnknownDependency {
                component: "parser".into(),
                dependency: "ghost".into(),
            }
        );
    }

    #[test]
    fn test_cycle_detected_with_path() {
        let mut registry = ComponentRegistry::new();
        registry.register(node("x").requires(["y"])).unwrap();
        registry.register(node("y").optional(["z"])).unwrap();
        registry.register(node("z").requires(["x"])).unwrap();

        match registry.topo_order(&ids(&["x"])) {
            Err(ConfigError::Cycle { cycle }) => {
                assert_eq!(cycle, ids(&["x", "y", "z", "x"]));
            }
            other => panic!("expected cycle, got {:?}", other),
        }
        assert!(registry.validate().is_err());
    }

    #[test]
    fn test_cycle_outside_closure_is_ignored() {
        let mut registry = ComponentRegistry::new();
        registry.register(node("ok")).unwrap();
        registry.register(node("p").requires(["q"])).unwrap();
        registry.register(node("q").requires(["p"])).unwrap();

        assert_eq!(registry.topo_order(&ids(&["ok"])).unwrap(), ids(&["ok"]));
    }

    #[test]
    fn test_self_dependency_is_a_cycle() {
        let mut registry = ComponentRegistry::new();
        registry.register(node("loop").requires(["loop"])).unwrap();
        assert!(matches!(
            registry.topo_order(&ids(&["loop"])),
            Err(ConfigError::Cycle { .. })
        ));
    }
}
