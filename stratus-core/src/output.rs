//! Output - Named values surfaced after synthesis
//!
//! An `OutputSet` is a read-only view computed once both builders have
//! completed; partial output sets are never constructed.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A single named output value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Output {
    pub value: String,
    pub description: Option<String>,
}

/// Ordered set of named outputs for downstream consumption
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutputSet {
    outputs: BTreeMap<String, Output>,
}

impl OutputSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(
        mut self,
        key: impl Into<String>,
        value: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        self.outputs.insert(
            key.into(),
            Output {
                value: value.into(),
                description: Some(description.into()),
            },
        );
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.outputs.get(key).map(|o| o.value.as_str())
    }

    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Output)> {
        self.outputs.iter().map(|(k, o)| (k.as_str(), o))
    }
}

impl std::fmt::Display for OutputSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (key, output) in &self.outputs {
            writeln!(f, "{} = {}", key, output.value)?;
        }
        Ok(())
    }
}
