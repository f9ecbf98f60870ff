//! Engine - Boundary to the external provisioning engine
//!
//! This layer only builds graphs; materialization (API calls, ordering,
//! retries, rollback) belongs entirely to the engine behind this trait.

use std::future::Future;
use std::pin::Pin;

use crate::graph::SynthesizedGraph;

/// Error type for engine operations
#[derive(Debug)]
pub struct EngineError {
    pub message: String,
    pub binding: Option<String>,
    pub cause: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(ref binding) = self.binding {
            write!(f, "[{}] {}", binding, self.message)
        } else {
            write!(f, "{}", self.message)
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_ref()
            .map(|e| e.as_ref() as &dyn std::error::Error)
    }
}

impl EngineError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            binding: None,
            cause: None,
        }
    }

    pub fn for_binding(mut self, binding: impl Into<String>) -> Self {
        self.binding = Some(binding.into());
        self
    }

    pub fn with_cause(mut self, cause: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

/// Return type for async engine operations
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Result of materializing a synthesized graph
#[derive(Debug, Clone, Default)]
pub struct ProvisionResult {
    /// Bindings provisioned, in apply order
    pub provisioned: Vec<String>,
}

/// External provisioning engine
///
/// Implementations receive a finalized, reference-free graph and own
/// all execution semantics, including the OR-combination of scaling
/// triggers and any retry policy.
pub trait ProvisioningEngine: Send + Sync {
    /// Name of this engine (e.g., "cloudformation")
    fn name(&self) -> &'static str;

    /// Materialize the graph into live resources
    fn materialize<'a>(
        &'a self,
        graph: &'a SynthesizedGraph,
    ) -> BoxFuture<'a, EngineResult<ProvisionResult>>;
}

impl ProvisioningEngine for Box<dyn ProvisioningEngine> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn materialize<'a>(
        &'a self,
        graph: &'a SynthesizedGraph,
    ) -> BoxFuture<'a, EngineResult<ProvisionResult>> {
        (**self).materialize(graph)
    }
}
