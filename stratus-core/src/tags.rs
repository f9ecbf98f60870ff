//! Tags - Process-wide tagging as a post-build traversal
//!
//! Tagging is a pure function over the finished graph, not mutable
//! global state: `apply_tags` consumes a graph and returns one where
//! every node carries the tag set. Keys already present on a node win,
//! so per-node tags (e.g., subnet `Name`) survive the traversal.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::graph::ResourceGraph;
use crate::resource::Value;

/// Ordered set of tag key/value pairs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TagSet {
    tags: BTreeMap<String, String>,
}

impl TagSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.tags.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Apply a tag set to every node of the graph
pub fn apply_tags(graph: ResourceGraph, tags: &TagSet) -> ResourceGraph {
    if tags.is_empty() {
        return graph;
    }

    let mut tagged = ResourceGraph::new();
    for node in graph.nodes() {
        let mut resource = node.resource.clone();
        let mut merged = match resource.attributes.remove("tags") {
            Some(Value::Map(existing)) => existing,
            _ => BTreeMap::new(),
        };
        for (key, value) in tags.iter() {
            merged
                .entry(key.to_string())
                .or_insert_with(|| Value::String(value.to_string()));
        }
        resource.attributes.insert("tags".to_string(), Value::Map(merged));
        // Bindings are unique in the source graph
        let _ = tagged.add(node.binding.clone(), resource);
    }
    for node in graph.nodes() {
        for dep in graph.dependencies_of(&node.binding) {
            let _ = tagged.depends_on(&node.binding, dep);
        }
    }
    tagged
}
