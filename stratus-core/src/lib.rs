//! Stratus Core
//!
//! Resource-graph engine for declarative infrastructure synthesis.
//! Synthesis is a pure, single-pass construction: builders add resource
//! nodes and depends-on edges, derived values are carried as references
//! between nodes, and `finalize` materializes everything into an
//! immutable graph handed to an external provisioning engine.

pub mod engine;
pub mod error;
pub mod graph;
pub mod output;
pub mod resource;
pub mod tags;
