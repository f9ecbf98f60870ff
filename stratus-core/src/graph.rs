//! Graph - Insertion-ordered resource graph with depends-on edges
//!
//! Builders insert nodes under a binding name and wire explicit
//! depends-on edges; references between attributes add implicit edges.
//! `finalize` checks acyclicity, computes a deterministic topological
//! order, and materializes every reference into the concrete upstream
//! value. The result is an immutable snapshot ready for the external
//! provisioning engine.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::resource::{Resource, Value};

/// Errors raised during graph construction and finalization
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GraphError {
    #[error("Duplicate binding '{0}'")]
    DuplicateBinding(String),

    #[error("Unknown binding '{0}'")]
    UnknownBinding(String),

    #[error("Dependency cycle involving '{0}'")]
    Cycle(String),

    #[error("Dangling reference to '{binding}.{attribute}'")]
    DanglingReference { binding: String, attribute: String },

    #[error("Reference cycle through '{binding}.{attribute}'")]
    ReferenceCycle { binding: String, attribute: String },
}

/// A bound node in the graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Binding name, unique within the graph (e.g., "vpc", "public-1")
    pub binding: String,
    pub resource: Resource,
}

/// Mutable resource graph under construction
#[derive(Debug, Clone, Default)]
pub struct ResourceGraph {
    nodes: Vec<Node>,
    index: HashMap<String, usize>,
    /// binding -> set of bindings it depends on
    edges: BTreeMap<String, BTreeSet<String>>,
}

impl ResourceGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a node under a binding name. Insertion order is the
    /// builder's declared order and is preserved through finalization
    /// wherever dependencies allow.
    pub fn add(&mut self, binding: impl Into<String>, resource: Resource) -> Result<(), GraphError> {
        let binding = binding.into();
        if self.index.contains_key(&binding) {
            return Err(GraphError::DuplicateBinding(binding));
        }
        self.index.insert(binding.clone(), self.nodes.len());
        self.nodes.push(Node { binding, resource });
        Ok(())
    }

    /// Declare that `from` depends on `to`
    pub fn depends_on(&mut self, from: &str, to: &str) -> Result<(), GraphError> {
        if !self.index.contains_key(from) {
            return Err(GraphError::UnknownBinding(from.to_string()));
        }
        if !self.index.contains_key(to) {
            return Err(GraphError::UnknownBinding(to.to_string()));
        }
        self.edges
            .entry(from.to_string())
            .or_default()
            .insert(to.to_string());
        Ok(())
    }

    pub fn get(&self, binding: &str) -> Option<&Resource> {
        self.index.get(binding).map(|&i| &self.nodes[i].resource)
    }

    pub fn contains(&self, binding: &str) -> bool {
        self.index.contains_key(binding)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Bindings in insertion order
    pub fn bindings(&self) -> impl Iterator<Item = &str> {
        self.nodes.iter().map(|n| n.binding.as_str())
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Direct dependencies of a binding
    pub fn dependencies_of(&self, binding: &str) -> Vec<&str> {
        self.edges
            .get(binding)
            .map(|deps| deps.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Resolve a single value, following reference chains
    pub fn resolve(&self, value: &Value) -> Result<Value, GraphError> {
        let mut visited = HashSet::new();
        self.resolve_inner(value, &mut visited)
    }

    /// Resolve the attribute of a bound node to its concrete value
    pub fn resolve_attribute(&self, binding: &str, attribute: &str) -> Result<Value, GraphError> {
        self.resolve(&Value::reference(binding, attribute))
    }

    fn resolve_inner(
        &self,
        value: &Value,
        visited: &mut HashSet<(String, String)>,
    ) -> Result<Value, GraphError> {
        match value {
            Value::Ref { binding, attribute } => {
                let key = (binding.clone(), attribute.clone());
                if !visited.insert(key) {
                    return Err(GraphError::ReferenceCycle {
                        binding: binding.clone(),
                        attribute: attribute.clone(),
                    });
                }
                let target = self
                    .get(binding)
                    .and_then(|r| r.attribute(attribute))
                    .ok_or_else(|| GraphError::DanglingReference {
                        binding: binding.clone(),
                        attribute: attribute.clone(),
                    })?;
                let resolved = self.resolve_inner(target, visited);
                visited.remove(&(binding.clone(), attribute.clone()));
                resolved
            }
            Value::List(items) => items
                .iter()
                .map(|v| self.resolve_inner(v, visited))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::List),
            Value::Map(map) => map
                .iter()
                .map(|(k, v)| Ok((k.clone(), self.resolve_inner(v, visited)?)))
                .collect::<Result<BTreeMap<_, _>, _>>()
                .map(Value::Map),
            other => Ok(other.clone()),
        }
    }

    /// Collect implicit depends-on edges induced by references
    fn reference_edges(&self) -> Result<Vec<(String, String)>, GraphError> {
        let mut found = Vec::new();
        for node in &self.nodes {
            for value in node.resource.attributes.values() {
                collect_refs(value, &mut |binding| {
                    found.push((node.binding.clone(), binding.to_string()));
                });
            }
        }
        for (_, target) in &found {
            if !self.index.contains_key(target) {
                return Err(GraphError::UnknownBinding(target.clone()));
            }
        }
        Ok(found)
    }

    /// Deterministic topological order: ready nodes are taken in
    /// insertion order, so identical inputs always produce the same
    /// serialized graph.
    fn topological_order(&self) -> Result<Vec<usize>, GraphError> {
        let mut deps: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); self.nodes.len()];
        for (from, targets) in &self.edges {
            let fi = self.index[from];
            for to in targets {
                deps[fi].insert(self.index[to]);
            }
        }
        for (from, to) in self.reference_edges()? {
            let fi = self.index[&from];
            deps[fi].insert(self.index[&to]);
        }

        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); self.nodes.len()];
        let mut indegree: Vec<usize> = vec![0; self.nodes.len()];
        for (from, targets) in deps.iter().enumerate() {
            indegree[from] = targets.len();
            for &to in targets {
                dependents[to].push(from);
            }
        }

        let mut ready: BTreeSet<usize> = indegree
            .iter()
            .enumerate()
            .filter(|&(_, &d)| d == 0)
            .map(|(i, _)| i)
            .collect();
        let mut order = Vec::with_capacity(self.nodes.len());

        while let Some(&next) = ready.iter().next() {
            ready.remove(&next);
            order.push(next);
            for &dep in &dependents[next] {
                indegree[dep] -= 1;
                if indegree[dep] == 0 {
                    ready.insert(dep);
                }
            }
        }

        if order.len() != self.nodes.len() {
            let stuck = indegree
                .iter()
                .position(|&d| d > 0)
                .map(|i| self.nodes[i].binding.clone())
                .unwrap_or_default();
            return Err(GraphError::Cycle(stuck));
        }
        Ok(order)
    }

    /// Finalize the graph: verify acyclicity, order nodes
    /// topologically, and materialize every reference. A graph that
    /// fails here is never handed to the provisioning engine.
    pub fn finalize(self) -> Result<SynthesizedGraph, GraphError> {
        let order = self.topological_order()?;

        let mut nodes = Vec::with_capacity(self.nodes.len());
        for idx in order {
            let source = &self.nodes[idx];
            let mut resource = source.resource.clone();
            let mut resolved = BTreeMap::new();
            for (key, value) in &source.resource.attributes {
                resolved.insert(key.clone(), self.resolve(value)?);
            }
            resource.attributes = resolved;
            nodes.push(Node {
                binding: source.binding.clone(),
                resource,
            });
        }

        Ok(SynthesizedGraph {
            nodes,
            edges: self.edges,
        })
    }
}

fn collect_refs(value: &Value, on_ref: &mut impl FnMut(&str)) {
    match value {
        Value::Ref { binding, .. } => on_ref(binding),
        Value::List(items) => {
            for v in items {
                collect_refs(v, on_ref);
            }
        }
        Value::Map(map) => {
            for v in map.values() {
                collect_refs(v, on_ref);
            }
        }
        _ => {}
    }
}

/// Immutable, fully resolved graph in provisioning order
///
/// This is the serialized artifact consumed by the external engine;
/// nodes appear in dependency order and contain no references.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynthesizedGraph {
    pub nodes: Vec<Node>,
    pub edges: BTreeMap<String, BTreeSet<String>>,
}

impl SynthesizedGraph {
    pub fn get(&self, binding: &str) -> Option<&Resource> {
        self.nodes
            .iter()
            .find(|n| n.binding == binding)
            .map(|n| &n.resource)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Binding names in provisioning order
    pub fn order(&self) -> Vec<&str> {
        self.nodes.iter().map(|n| n.binding.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vpc() -> Resource {
        Resource::new("vpc", "main").with_attribute("cidr_block", "10.0.0.0/16")
    }

    #[test]
    fn duplicate_binding_rejected() {
        let mut graph = ResourceGraph::new();
        graph.add("vpc", vpc()).unwrap();
        let err = graph.add("vpc", vpc()).unwrap_err();
        assert_eq!(err, GraphError::DuplicateBinding("vpc".to_string()));
    }

    #[test]
    fn depends_on_unknown_binding_rejected() {
        let mut graph = ResourceGraph::new();
        graph.add("vpc", vpc()).unwrap();
        assert_eq!(
            graph.depends_on("vpc", "missing").unwrap_err(),
            GraphError::UnknownBinding("missing".to_string())
        );
    }

    #[test]
    fn resolve_follows_reference_chain() {
        let mut graph = ResourceGraph::new();
        graph
            .add(
                "container",
                Resource::new("container", "app").with_attribute("container_port", 5000i64),
            )
            .unwrap();
        graph
            .add(
                "target-group",
                Resource::new("target_group", "tg")
                    .with_attribute("health_check_port", Value::reference("container", "container_port")),
            )
            .unwrap();

        let port = graph.resolve_attribute("target-group", "health_check_port").unwrap();
        assert_eq!(port, Value::Int(5000));
    }

    #[test]
    fn dangling_reference_detected() {
        let mut graph = ResourceGraph::new();
        graph
            .add(
                "svc",
                Resource::new("service", "svc")
                    .with_attribute("cluster", Value::reference("cluster", "name")),
            )
            .unwrap();
        let err = graph.clone().finalize().unwrap_err();
        assert_eq!(err, GraphError::UnknownBinding("cluster".to_string()));

        // Existing binding, missing attribute
        graph.add("cluster", Resource::new("cluster", "c")).unwrap();
        let err = graph.finalize().unwrap_err();
        assert_eq!(
            err,
            GraphError::DanglingReference {
                binding: "cluster".to_string(),
                attribute: "name".to_string()
            }
        );
    }

    #[test]
    fn cycle_detected() {
        let mut graph = ResourceGraph::new();
        graph.add("a", Resource::new("t", "a")).unwrap();
        graph.add("b", Resource::new("t", "b")).unwrap();
        graph.depends_on("a", "b").unwrap();
        graph.depends_on("b", "a").unwrap();
        assert!(matches!(graph.finalize(), Err(GraphError::Cycle(_))));
    }

    #[test]
    fn finalize_orders_dependencies_first() {
        let mut graph = ResourceGraph::new();
        graph
            .add(
                "service",
                Resource::new("service", "svc")
                    .with_attribute("cluster", Value::reference("cluster", "name")),
            )
            .unwrap();
        graph
            .add(
                "cluster",
                Resource::new("cluster", "c").with_attribute("name", "demo"),
            )
            .unwrap();

        let synthesized = graph.finalize().unwrap();
        assert_eq!(synthesized.order(), vec!["cluster", "service"]);
        assert_eq!(
            synthesized.get("service").unwrap().attribute("cluster"),
            Some(&Value::String("demo".to_string()))
        );
    }

    #[test]
    fn finalize_is_deterministic() {
        let build = || {
            let mut graph = ResourceGraph::new();
            graph.add("vpc", vpc()).unwrap();
            for i in 1..=3 {
                graph
                    .add(
                        format!("public-{i}"),
                        Resource::new("subnet", format!("public-{i}"))
                            .with_attribute("vpc", Value::reference("vpc", "cidr_block")),
                    )
                    .unwrap();
            }
            graph.finalize().unwrap()
        };

        let first = build();
        let second = build();
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn reference_cycle_detected() {
        let mut graph = ResourceGraph::new();
        graph
            .add(
                "a",
                Resource::new("t", "a").with_attribute("x", Value::reference("b", "y")),
            )
            .unwrap();
        graph
            .add(
                "b",
                Resource::new("t", "b").with_attribute("y", Value::reference("a", "x")),
            )
            .unwrap();
        // The implicit edges already form a cycle
        assert!(graph.finalize().is_err());
    }
}
