//! Stack parameters
//!
//! All validation is fail-fast: a parameter set that cannot produce a
//! consistent graph is rejected before a single node is built.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use stratus_aws::net::{
    CidrAllocator, CidrBlock, FlowLogTraffic, MAX_AZS, RemovalPolicy, SubnetGroupDef, SubnetTier,
};
use stratus_aws::resolver::validate_arn;
use stratus_aws::service::{TaskSize, validate_port, validate_utilization};
use stratus_core::error::{SynthError, SynthResult};
use stratus_core::tags::TagSet;

fn require(field: &str, value: &str) -> SynthResult<()> {
    if value.is_empty() {
        Err(SynthError::configuration(field, "required parameter is missing"))
    } else {
        Ok(())
    }
}

/// Inputs of the Network Topology Builder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkParams {
    /// Stack name; also the stable logical identifier of the network
    pub name: String,
    pub region: String,
    pub cidr_block: String,
    /// Number of availability zones to span, in [1, 6]
    pub max_azs: u8,
    pub nat_gateways: u8,
    pub subnet_groups: Vec<SubnetGroupDef>,
    pub flow_log_group: String,
    pub flow_log_traffic: FlowLogTraffic,
    pub flow_log_removal: RemovalPolicy,
    /// Applied to every node in a post-build traversal
    pub tags: TagSet,
}

impl Default for NetworkParams {
    fn default() -> Self {
        Self {
            name: "demo-network".to_string(),
            region: "us-east-1".to_string(),
            cidr_block: "10.0.0.0/16".to_string(),
            max_azs: 3,
            nat_gateways: 1,
            subnet_groups: vec![
                SubnetGroupDef::public("public", 24),
                SubnetGroupDef::private_with_egress("private", 24),
            ],
            flow_log_group: "/demo/flowlogs/".to_string(),
            flow_log_traffic: FlowLogTraffic::All,
            flow_log_removal: RemovalPolicy::Destroy,
            tags: TagSet::new()
                .with("Environment", "Production")
                .with("Project", "Demo"),
        }
    }
}

impl NetworkParams {
    /// Validate the parameter set and return the parsed network block
    pub fn validate(&self) -> SynthResult<CidrBlock> {
        require("name", &self.name)?;
        require("region", &self.region)?;
        require("flow_log_group", &self.flow_log_group)?;

        let cidr = CidrBlock::parse(&self.cidr_block)
            .map_err(|e| SynthError::configuration("cidr_block", e.to_string()))?;

        if self.max_azs == 0 || self.max_azs > MAX_AZS {
            return Err(SynthError::configuration(
                "max_azs",
                format!("must be between 1 and {}, got {}", MAX_AZS, self.max_azs),
            ));
        }

        if self.subnet_groups.is_empty() {
            return Err(SynthError::configuration(
                "subnet_groups",
                "at least one subnet group is required",
            ));
        }
        let mut seen = std::collections::BTreeSet::new();
        for group in &self.subnet_groups {
            require("subnet_groups", &group.name)?;
            if !seen.insert(group.name.as_str()) {
                return Err(SynthError::configuration(
                    "subnet_groups",
                    format!("duplicate subnet group name '{}'", group.name),
                ));
            }
        }

        let has_public = self
            .subnet_groups
            .iter()
            .any(|g| g.tier == SubnetTier::Public);
        let has_private = self
            .subnet_groups
            .iter()
            .any(|g| g.tier == SubnetTier::PrivateWithEgress);
        if has_private && self.nat_gateways == 0 {
            return Err(SynthError::configuration(
                "nat_gateways",
                "private-with-egress subnets require at least one NAT gateway",
            ));
        }
        if self.nat_gateways > 0 && !has_public {
            return Err(SynthError::configuration(
                "nat_gateways",
                "NAT gateways require a public subnet group to be placed in",
            ));
        }
        if self.nat_gateways > self.max_azs {
            return Err(SynthError::configuration(
                "nat_gateways",
                format!(
                    "at most one NAT gateway per availability zone ({} > {})",
                    self.nat_gateways, self.max_azs
                ),
            ));
        }

        // Dry-run the allocation: every group needs max_azs
        // non-overlapping blocks inside the network
        let mut allocator = CidrAllocator::new(cidr);
        for group in &self.subnet_groups {
            for _ in 0..self.max_azs {
                allocator
                    .allocate(group.cidr_mask)
                    .map_err(|e| SynthError::configuration("subnet_groups", e.to_string()))?;
            }
        }

        Ok(cidr)
    }
}

/// Inputs of the Service Topology Builder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceParams {
    pub name: String,
    /// Identifier of the existing network to deploy into
    pub vpc_id: String,
    pub repository_name: String,
    pub image_tag: String,
    pub certificate_arn: String,
    pub secret_arn: String,
    /// Single source of truth for the port mapping, health check, and
    /// target group; never duplicated downstream
    pub container_port: u16,
    pub task_size: TaskSize,
    pub env: BTreeMap<String, String>,
    /// Environment variable name -> JSON key inside the secret
    pub secret_env: BTreeMap<String, String>,
    /// Defaults to "/" when empty
    pub health_check_path: String,
    pub min_capacity: u32,
    pub max_capacity: u32,
    pub cpu_target_pct: u32,
    pub memory_target_pct: u32,
    pub enable_execute_command: bool,
    pub log_stream_prefix: String,
    pub cluster_name: String,
    pub service_name: String,
    pub load_balancer_name: String,
}

impl Default for ServiceParams {
    fn default() -> Self {
        let mut env = BTreeMap::new();
        env.insert("DEBUG".to_string(), "true".to_string());
        let mut secret_env = BTreeMap::new();
        secret_env.insert("SECRET_KEY".to_string(), "SECRET_KEY".to_string());

        Self {
            name: "demo-service".to_string(),
            vpc_id: String::new(),
            repository_name: String::new(),
            image_tag: "latest".to_string(),
            certificate_arn: String::new(),
            secret_arn: String::new(),
            container_port: 5000,
            task_size: TaskSize::new(256, 512),
            env,
            secret_env,
            health_check_path: "/".to_string(),
            min_capacity: 1,
            max_capacity: 3,
            cpu_target_pct: 80,
            memory_target_pct: 80,
            enable_execute_command: true,
            log_stream_prefix: "ecs-app".to_string(),
            cluster_name: "demo-service-EcsFargateCluster".to_string(),
            service_name: "demo-service-EcsFargateService".to_string(),
            load_balancer_name: "demo-service-alb".to_string(),
        }
    }
}

impl ServiceParams {
    pub fn validate(&self) -> SynthResult<()> {
        require("name", &self.name)?;
        require("vpc_id", &self.vpc_id)?;
        require("repository_name", &self.repository_name)?;
        require("certificate_arn", &self.certificate_arn)?;
        require("secret_arn", &self.secret_arn)?;
        require("image_tag", &self.image_tag)?;
        require("cluster_name", &self.cluster_name)?;
        require("service_name", &self.service_name)?;
        require("load_balancer_name", &self.load_balancer_name)?;

        validate_arn(&self.certificate_arn)
            .map_err(|e| SynthError::configuration("certificate_arn", e))?;
        validate_arn(&self.secret_arn).map_err(|e| SynthError::configuration("secret_arn", e))?;
        validate_port(self.container_port)
            .map_err(|e| SynthError::configuration("container_port", e))?;
        self.task_size
            .validate()
            .map_err(|e| SynthError::configuration("task_size", e))?;

        if !self.health_check_path.is_empty() && !self.health_check_path.starts_with('/') {
            return Err(SynthError::configuration(
                "health_check_path",
                "must start with '/'",
            ));
        }

        if self.min_capacity < 1 {
            return Err(SynthError::invariant(
                "min_capacity >= 1",
                format!("got {}", self.min_capacity),
            ));
        }
        if self.min_capacity > self.max_capacity {
            return Err(SynthError::invariant(
                "min_capacity <= max_capacity",
                format!("{} > {}", self.min_capacity, self.max_capacity),
            ));
        }

        validate_utilization(self.cpu_target_pct)
            .map_err(|e| SynthError::configuration("cpu_target_pct", e))?;
        validate_utilization(self.memory_target_pct)
            .map_err(|e| SynthError::configuration("memory_target_pct", e))?;

        Ok(())
    }

    /// Health-check path with the defaulting policy applied
    pub fn health_check_path_or_default(&self) -> &str {
        if self.health_check_path.is_empty() {
            "/"
        } else {
            &self.health_check_path
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service_params() -> ServiceParams {
        ServiceParams {
            vpc_id: "vpc-0123456789abcdef0".to_string(),
            repository_name: "demo-service".to_string(),
            certificate_arn: "arn:aws:acm:us-east-1:123456789012:certificate/abc".to_string(),
            secret_arn: "arn:aws:secretsmanager:us-east-1:123456789012:secret:demo".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn default_network_params_validate() {
        let cidr = NetworkParams::default().validate().unwrap();
        assert_eq!(cidr.to_string(), "10.0.0.0/16");
    }

    #[test]
    fn max_azs_out_of_range_rejected() {
        for max_azs in [0u8, 7] {
            let params = NetworkParams {
                max_azs,
                nat_gateways: 0,
                subnet_groups: vec![SubnetGroupDef::public("public", 24)],
                ..Default::default()
            };
            assert!(matches!(
                params.validate(),
                Err(SynthError::Configuration { ref field, .. }) if field == "max_azs"
            ));
        }
    }

    #[test]
    fn insufficient_address_space_rejected() {
        let params = NetworkParams {
            cidr_block: "10.0.0.0/16".to_string(),
            subnet_groups: vec![
                SubnetGroupDef::public("public", 17),
                SubnetGroupDef::private_with_egress("private", 17),
            ],
            ..Default::default()
        };
        let err = params.validate().unwrap_err();
        assert!(matches!(
            err,
            SynthError::Configuration { ref field, .. } if field == "subnet_groups"
        ));
    }

    #[test]
    fn private_subnets_without_nat_rejected() {
        let params = NetworkParams {
            nat_gateways: 0,
            ..Default::default()
        };
        assert!(matches!(
            params.validate(),
            Err(SynthError::Configuration { ref field, .. }) if field == "nat_gateways"
        ));
    }

    #[test]
    fn duplicate_group_names_rejected() {
        let params = NetworkParams {
            subnet_groups: vec![
                SubnetGroupDef::public("app", 24),
                SubnetGroupDef::private_with_egress("app", 24),
            ],
            ..Default::default()
        };
        assert!(params.validate().is_err());
    }

    #[test]
    fn missing_required_service_param_rejected() {
        let params = ServiceParams {
            secret_arn: String::new(),
            ..service_params()
        };
        assert_eq!(
            params.validate().unwrap_err(),
            SynthError::configuration("secret_arn", "required parameter is missing")
        );
    }

    #[test]
    fn capacity_bounds_are_invariants() {
        let params = ServiceParams {
            min_capacity: 5,
            max_capacity: 3,
            ..service_params()
        };
        assert!(matches!(
            params.validate(),
            Err(SynthError::InvariantViolation { .. })
        ));

        let params = ServiceParams {
            min_capacity: 0,
            ..service_params()
        };
        assert!(matches!(
            params.validate(),
            Err(SynthError::InvariantViolation { .. })
        ));
    }

    #[test]
    fn utilization_targets_outside_range_rejected() {
        for (cpu, memory) in [(0, 80), (101, 80), (80, 0), (80, 200)] {
            let params = ServiceParams {
                cpu_target_pct: cpu,
                memory_target_pct: memory,
                ..service_params()
            };
            assert!(matches!(
                params.validate(),
                Err(SynthError::Configuration { .. })
            ));
        }
    }

    #[test]
    fn malformed_arn_rejected() {
        let params = ServiceParams {
            certificate_arn: "not-an-arn".to_string(),
            ..service_params()
        };
        assert!(matches!(
            params.validate(),
            Err(SynthError::Configuration { ref field, .. }) if field == "certificate_arn"
        ));
    }

    #[test]
    fn empty_health_check_path_defaults_to_root() {
        let params = ServiceParams {
            health_check_path: String::new(),
            ..service_params()
        };
        params.validate().unwrap();
        assert_eq!(params.health_check_path_or_default(), "/");
    }
}
