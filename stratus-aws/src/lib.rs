//! Stratus AWS
//!
//! AWS-flavoured building blocks for stack synthesis: CIDR arithmetic
//! and subnet tiers, task sizing and listener constants, and the
//! resolver seam through which existing resources (network, image
//! repository, certificate, secret) are looked up.

pub mod net;
pub mod resolver;
pub mod service;
