//! Resolver - Lookup seam for externally managed resources
//!
//! Synthesis never talks to a cloud API directly; existing resources
//! are resolved through this trait, and the flow-log destination is
//! created through it. Lookups are synchronous: synthesis is a single
//! pass and implementations are expected to answer from cached context.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use stratus_core::error::SynthError;

use crate::net::RemovalPolicy;

/// Errors surfaced by a resolver
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResolveError {
    #[error("{kind} not found: '{identifier}'")]
    NotFound { kind: String, identifier: String },

    #[error("Failed to create {kind}: {message}")]
    CreateFailed { kind: String, message: String },
}

impl ResolveError {
    pub fn not_found(kind: impl Into<String>, identifier: impl Into<String>) -> Self {
        Self::NotFound {
            kind: kind.into(),
            identifier: identifier.into(),
        }
    }
}

impl From<ResolveError> for SynthError {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::NotFound { kind, identifier } => {
                SynthError::ReferenceResolution { kind, identifier }
            }
            ResolveError::CreateFailed { kind, message } => SynthError::Configuration {
                field: kind,
                message,
            },
        }
    }
}

pub type ResolveResult<T> = Result<T, ResolveError>;

/// Reference to an existing virtual network
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkRef {
    pub vpc_id: String,
}

/// Reference to an existing image repository
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepositoryRef {
    pub name: String,
    /// Registry URI without a tag (e.g., "…amazonaws.com/demo-service")
    pub uri: String,
}

impl RepositoryRef {
    /// Fully qualified image reference for a tag
    pub fn image(&self, tag: &str) -> String {
        format!("{}:{}", self.uri, tag)
    }
}

/// Reference to an existing TLS certificate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CertificateRef {
    pub arn: String,
}

/// Reference to an existing secret
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecretRef {
    pub arn: String,
}

impl SecretRef {
    /// Locator of a single JSON key inside the secret
    pub fn key(&self, json_key: &str) -> String {
        format!("{}:{}", self.arn, json_key)
    }
}

/// Reference to a created log sink
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogSinkRef {
    pub name: String,
    pub arn: String,
}

/// Collaborator interface for resolving external references
pub trait Resolver: Send + Sync {
    fn lookup_network(&self, vpc_id: &str) -> ResolveResult<NetworkRef>;

    fn lookup_image_repository(&self, name: &str) -> ResolveResult<RepositoryRef>;

    fn lookup_certificate(&self, arn: &str) -> ResolveResult<CertificateRef>;

    fn lookup_secret(&self, arn: &str) -> ResolveResult<SecretRef>;

    fn create_log_sink(&self, name: &str, removal: RemovalPolicy) -> ResolveResult<LogSinkRef>;
}

/// ARN shape check for input validation. Accepts the generic
/// `arn:partition:service:region:account:resource` form; the region
/// segment may be empty (global services).
pub fn validate_arn(value: &str) -> Result<(), String> {
    static ARN_RE: OnceLock<Regex> = OnceLock::new();
    let re = ARN_RE.get_or_init(|| {
        Regex::new(r"^arn:aws[a-z-]*:[a-z0-9-]+:[a-z0-9-]*:[0-9]{12}:.+$")
            .expect("valid ARN pattern")
    });
    if re.is_match(value) {
        Ok(())
    } else {
        Err(format!("'{value}' is not a valid ARN"))
    }
}

/// In-memory resolver, the reference implementation and test double
///
/// Registered identifiers resolve; everything else is not-found.
#[derive(Debug, Clone, Default)]
pub struct StaticResolver {
    account: String,
    region: String,
    networks: BTreeSet<String>,
    repositories: BTreeMap<String, String>,
    certificates: BTreeSet<String>,
    secrets: BTreeSet<String>,
}

impl StaticResolver {
    pub fn new(account: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            region: region.into(),
            ..Default::default()
        }
    }

    pub fn with_network(mut self, vpc_id: impl Into<String>) -> Self {
        self.networks.insert(vpc_id.into());
        self
    }

    pub fn with_repository(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        let uri = format!("{}.dkr.ecr.{}.amazonaws.com/{}", self.account, self.region, name);
        self.repositories.insert(name, uri);
        self
    }

    pub fn with_certificate(mut self, arn: impl Into<String>) -> Self {
        self.certificates.insert(arn.into());
        self
    }

    pub fn with_secret(mut self, arn: impl Into<String>) -> Self {
        self.secrets.insert(arn.into());
        self
    }
}

impl Resolver for StaticResolver {
    fn lookup_network(&self, vpc_id: &str) -> ResolveResult<NetworkRef> {
        if self.networks.contains(vpc_id) {
            Ok(NetworkRef {
                vpc_id: vpc_id.to_string(),
            })
        } else {
            Err(ResolveError::not_found("network", vpc_id))
        }
    }

    fn lookup_image_repository(&self, name: &str) -> ResolveResult<RepositoryRef> {
        self.repositories
            .get(name)
            .map(|uri| RepositoryRef {
                name: name.to_string(),
                uri: uri.clone(),
            })
            .ok_or_else(|| ResolveError::not_found("image repository", name))
    }

    fn lookup_certificate(&self, arn: &str) -> ResolveResult<CertificateRef> {
        if self.certificates.contains(arn) {
            Ok(CertificateRef {
                arn: arn.to_string(),
            })
        } else {
            Err(ResolveError::not_found("certificate", arn))
        }
    }

    fn lookup_secret(&self, arn: &str) -> ResolveResult<SecretRef> {
        if self.secrets.contains(arn) {
            Ok(SecretRef {
                arn: arn.to_string(),
            })
        } else {
            Err(ResolveError::not_found("secret", arn))
        }
    }

    fn create_log_sink(&self, name: &str, _removal: RemovalPolicy) -> ResolveResult<LogSinkRef> {
        Ok(LogSinkRef {
            name: name.to_string(),
            arn: format!(
                "arn:aws:logs:{}:{}:log-group:{}",
                self.region, self.account, name
            ),
        })
    }
}
