//! Output Emitter
//!
//! Surfaces the named values downstream automation consumes. Taking
//! both stacks by reference makes partial output sets unrepresentable:
//! a failed builder never produces a stack value to pass here.

use stratus_core::output::OutputSet;

use crate::network::NetworkStack;
use crate::service::ServiceStack;

pub const NETWORK_ID: &str = "NetworkId";
pub const CLUSTER_NAME: &str = "ClusterName";
pub const SERVICE_NAME: &str = "ServiceName";

/// Read back the identifiers of both finished stacks
pub fn emit(network: &NetworkStack, service: &ServiceStack) -> OutputSet {
    OutputSet::new()
        .add(NETWORK_ID, network.network_id(), "Network identifier")
        .add(CLUSTER_NAME, service.cluster_name(), "ECS Cluster Name")
        .add(SERVICE_NAME, service.service_name(), "ECS Service Name")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{NetworkProvisioning, NetworkStack};
    use crate::params::{NetworkParams, ServiceParams};
    use crate::service::ServiceStack;
    use stratus_aws::resolver::StaticResolver;

    #[test]
    fn emits_all_three_outputs() {
        let resolver = StaticResolver::new("123456789012", "us-east-1")
            .with_network("vpc-0123456789abcdef0")
            .with_repository("demo-service")
            .with_certificate("arn:aws:acm:us-east-1:123456789012:certificate/abc")
            .with_secret("arn:aws:secretsmanager:us-east-1:123456789012:secret:demo");

        let network = NetworkStack::build(
            NetworkProvisioning::New(NetworkParams::default()),
            &resolver,
        )
        .unwrap();
        let service = ServiceStack::build_on(
            ServiceParams {
                repository_name: "demo-service".to_string(),
                certificate_arn: "arn:aws:acm:us-east-1:123456789012:certificate/abc".to_string(),
                secret_arn: "arn:aws:secretsmanager:us-east-1:123456789012:secret:demo"
                    .to_string(),
                ..Default::default()
            },
            &network,
            &resolver,
        )
        .unwrap();

        let outputs = emit(&network, &service);
        assert_eq!(outputs.len(), 3);
        assert_eq!(outputs.get(NETWORK_ID), Some("demo-network"));
        assert_eq!(outputs.get(CLUSTER_NAME), Some("demo-service-EcsFargateCluster"));
        assert_eq!(outputs.get(SERVICE_NAME), Some("demo-service-EcsFargateService"));
    }
}
