//! Stratus Stacks
//!
//! Declarative synthesis of a small cloud deployment: a virtual
//! network with public/private subnets and flow logging, and a
//! load-balanced, auto-scaling container service on top of it.
//!
//! Synthesis is one synchronous pass in strict dependency order:
//! network, then service (consuming the network identifier by
//! reference), then outputs. A failed validation aborts before any
//! graph reaches the provisioning engine; there is no partial result.

pub mod network;
pub mod outputs;
pub mod params;
pub mod service;

use tracing::info;

use stratus_aws::resolver::Resolver;
use stratus_core::error::SynthResult;
use stratus_core::graph::SynthesizedGraph;
use stratus_core::output::OutputSet;

use crate::network::{NetworkProvisioning, NetworkStack};
use crate::params::ServiceParams;
use crate::service::ServiceStack;

/// Fully synthesized deployment: two independent graphs plus the
/// outputs downstream automation consumes
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Synthesis {
    pub network: SynthesizedGraph,
    pub service: SynthesizedGraph,
    pub outputs: OutputSet,
}

/// Run the whole synthesis pass: network, service, outputs
pub fn synthesize(
    network: NetworkProvisioning,
    service: ServiceParams,
    resolver: &dyn Resolver,
) -> SynthResult<Synthesis> {
    let network_stack = NetworkStack::build(network, resolver)?;
    let service_stack = ServiceStack::build_on(service, &network_stack, resolver)?;
    let outputs = outputs::emit(&network_stack, &service_stack);

    let synthesis = Synthesis {
        network: network_stack.finalize()?,
        service: service_stack.finalize()?,
        outputs,
    };
    info!(
        network_nodes = synthesis.network.len(),
        service_nodes = synthesis.service.len(),
        "synthesis complete"
    );
    Ok(synthesis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::NetworkParams;
    use stratus_aws::resolver::StaticResolver;
    use stratus_core::error::SynthError;

    fn resolver() -> StaticResolver {
        StaticResolver::new("123456789012", "us-east-1")
            .with_network("vpc-0123456789abcdef0")
            .with_repository("demo-service")
            .with_certificate("arn:aws:acm:us-east-1:123456789012:certificate/abc")
            .with_secret("arn:aws:secretsmanager:us-east-1:123456789012:secret:demo")
    }

    fn service_params() -> ServiceParams {
        ServiceParams {
            repository_name: "demo-service".to_string(),
            certificate_arn: "arn:aws:acm:us-east-1:123456789012:certificate/abc".to_string(),
            secret_arn: "arn:aws:secretsmanager:us-east-1:123456789012:secret:demo".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn end_to_end_synthesis() {
        let synthesis = synthesize(
            NetworkProvisioning::New(NetworkParams::default()),
            service_params(),
            &resolver(),
        )
        .unwrap();

        // 1 log group + 1 vpc + 6 subnets + igw + public rt + 1 nat
        // + 3 private rts + flow log
        assert_eq!(synthesis.network.len(), 15);
        assert_eq!(synthesis.outputs.get("NetworkId"), Some("demo-network"));
        assert!(synthesis.service.get("service").is_some());
    }

    #[test]
    fn synthesis_serializes_deterministically() {
        let run = || {
            serde_json::to_string(
                &synthesize(
                    NetworkProvisioning::New(NetworkParams::default()),
                    service_params(),
                    &resolver(),
                )
                .unwrap(),
            )
            .unwrap()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn failed_service_build_yields_no_outputs() {
        let err = synthesize(
            NetworkProvisioning::New(NetworkParams::default()),
            ServiceParams {
                secret_arn: "arn:aws:secretsmanager:us-east-1:123456789012:secret:missing"
                    .to_string(),
                ..service_params()
            },
            &resolver(),
        )
        .unwrap_err();
        assert!(matches!(err, SynthError::ReferenceResolution { .. }));
    }

    #[test]
    fn existing_network_flows_through_to_service() {
        let synthesis = synthesize(
            NetworkProvisioning::Existing {
                vpc_id: "vpc-0123456789abcdef0".to_string(),
            },
            service_params(),
            &resolver(),
        )
        .unwrap();
        assert_eq!(
            synthesis.outputs.get("NetworkId"),
            Some("vpc-0123456789abcdef0")
        );
        assert_eq!(
            synthesis
                .service
                .get("cluster")
                .unwrap()
                .attribute("vpc")
                .unwrap()
                .as_str(),
            Some("vpc-0123456789abcdef0")
        );
    }
}
