//! Network Topology Builder
//!
//! Builds a virtual network graph: log sink first, then the network,
//! gateways, one subnet instance per availability zone per group,
//! route tables wired by visibility tier, and the flow-log attachment.
//! Finishes with the pure tagging traversal.

use std::collections::BTreeMap;

use tracing::debug;

use stratus_aws::net::{CidrAllocator, SubnetTier, availability_zones};
use stratus_aws::resolver::Resolver;
use stratus_core::error::{SynthError, SynthResult};
use stratus_core::graph::{ResourceGraph, SynthesizedGraph};
use stratus_core::resource::{Resource, Value};
use stratus_core::tags::apply_tags;

use crate::params::NetworkParams;

/// Reference-vs-create duality for the network: deploy into an
/// existing network by identifier, or synthesize a new one
#[derive(Debug, Clone, PartialEq)]
pub enum NetworkProvisioning {
    Existing { vpc_id: String },
    New(NetworkParams),
}

/// Result of the network build: the graph plus the identifiers
/// downstream builders consume by reference
#[derive(Debug, Clone)]
pub struct NetworkStack {
    graph: ResourceGraph,
    network_id: String,
    public_subnets: Vec<String>,
    private_subnets: Vec<String>,
}

impl NetworkStack {
    /// Single factory resolving both provisioning variants
    pub fn build(provisioning: NetworkProvisioning, resolver: &dyn Resolver) -> SynthResult<Self> {
        match provisioning {
            NetworkProvisioning::Existing { vpc_id } => Self::from_existing(&vpc_id, resolver),
            NetworkProvisioning::New(params) => Self::synthesize(params, resolver),
        }
    }

    /// Resolve an existing network. A failed lookup is fatal and
    /// reported, never retried.
    fn from_existing(vpc_id: &str, resolver: &dyn Resolver) -> SynthResult<Self> {
        let network = resolver.lookup_network(vpc_id)?;
        debug!(vpc_id = %network.vpc_id, "resolved existing network");

        let mut graph = ResourceGraph::new();
        graph.add(
            "vpc",
            Resource::new("vpc", network.vpc_id.clone())
                .with_attribute("name", network.vpc_id.clone())
                .with_attribute("vpc_id", network.vpc_id.clone())
                .with_read_only(true),
        )?;

        Ok(Self {
            graph,
            network_id: network.vpc_id,
            public_subnets: Vec::new(),
            private_subnets: Vec::new(),
        })
    }

    fn synthesize(params: NetworkParams, resolver: &dyn Resolver) -> SynthResult<Self> {
        let cidr = params.validate()?;
        debug!(name = %params.name, %cidr, max_azs = params.max_azs, "building network topology");

        // The flow-log destination must exist before the attachment
        let sink = resolver.create_log_sink(&params.flow_log_group, params.flow_log_removal)?;

        let mut graph = ResourceGraph::new();
        graph.add(
            "flow-logs",
            Resource::new("log_group", sink.name.clone())
                .with_attribute("name", sink.name.clone())
                .with_attribute("arn", sink.arn.clone())
                .with_attribute("removal_policy", params.flow_log_removal.as_str()),
        )?;

        graph.add(
            "vpc",
            Resource::new("vpc", params.name.clone())
                .with_attribute("name", params.name.clone())
                .with_attribute("region", params.region.clone())
                .with_attribute("cidr_block", cidr.to_string())
                .with_attribute("enable_dns_support", true)
                .with_attribute("enable_dns_hostnames", true),
        )?;

        let azs = availability_zones(&params.region, params.max_azs);
        let mut allocator = CidrAllocator::new(cidr);
        let mut public_subnets = Vec::new();
        let mut private_subnets: Vec<(String, usize)> = Vec::new();

        for group in &params.subnet_groups {
            for (az_index, az) in azs.iter().enumerate() {
                // 1-based ordinal in the fixed AZ ordering
                let ordinal = az_index + 1;
                let binding = format!("{}-{}", group.name, ordinal);
                let block = allocator
                    .allocate(group.cidr_mask)
                    .map_err(|e| SynthError::configuration("subnet_groups", e.to_string()))?;

                let mut tags = BTreeMap::new();
                tags.insert(
                    "Name".to_string(),
                    Value::String(format!("{}-Subnet-{}", group.tier.title(), ordinal)),
                );

                graph.add(
                    binding.clone(),
                    Resource::new("subnet", binding.clone())
                        .with_attribute("name", binding.clone())
                        .with_attribute("vpc", Value::reference("vpc", "name"))
                        .with_attribute("cidr_block", block.to_string())
                        .with_attribute("availability_zone", az.clone())
                        .with_attribute("tier", group.tier.as_str())
                        .with_attribute(
                            "map_public_ip_on_launch",
                            group.tier == SubnetTier::Public,
                        )
                        .with_attribute("tags", Value::Map(tags)),
                )?;
                graph.depends_on(&binding, "vpc")?;

                match group.tier {
                    SubnetTier::Public => public_subnets.push(binding),
                    SubnetTier::PrivateWithEgress => private_subnets.push((binding, az_index)),
                }
            }
        }

        if !public_subnets.is_empty() {
            graph.add(
                "igw",
                Resource::new("internet_gateway", format!("{}-igw", params.name))
                    .with_attribute("name", format!("{}-igw", params.name))
                    .with_attribute("vpc", Value::reference("vpc", "name")),
            )?;

            let mut route = BTreeMap::new();
            route.insert("destination".to_string(), Value::String("0.0.0.0/0".to_string()));
            route.insert("target".to_string(), Value::reference("igw", "name"));
            graph.add(
                "public-rt",
                Resource::new("route_table", format!("{}-public-rt", params.name))
                    .with_attribute("name", format!("{}-public-rt", params.name))
                    .with_attribute("vpc", Value::reference("vpc", "name"))
                    .with_attribute("routes", Value::List(vec![Value::Map(route)]))
                    .with_attribute(
                        "subnets",
                        Value::List(
                            public_subnets
                                .iter()
                                .map(|b| Value::reference(b, "name"))
                                .collect(),
                        ),
                    ),
            )?;
        }

        for n in 1..=params.nat_gateways {
            let binding = format!("nat-{n}");
            // Placement in the n-th public subnet; validation guarantees
            // nat_gateways <= max_azs and a public group exists
            let placement = &public_subnets[(n - 1) as usize];
            graph.add(
                binding.clone(),
                Resource::new("nat_gateway", binding.clone())
                    .with_attribute("name", binding.clone())
                    .with_attribute("subnet", Value::reference(placement, "name")),
            )?;
        }

        // One route table per private subnet, NAT route spread across
        // the available gateways by AZ ordinal
        for (subnet, az_index) in &private_subnets {
            let nat = format!("nat-{}", (az_index % usize::from(params.nat_gateways)) + 1);
            let rt_binding = format!("{subnet}-rt");

            let mut route = BTreeMap::new();
            route.insert("destination".to_string(), Value::String("0.0.0.0/0".to_string()));
            route.insert("target".to_string(), Value::reference(&nat, "name"));
            graph.add(
                rt_binding.clone(),
                Resource::new("route_table", rt_binding.clone())
                    .with_attribute("name", rt_binding.clone())
                    .with_attribute("vpc", Value::reference("vpc", "name"))
                    .with_attribute("routes", Value::List(vec![Value::Map(route)]))
                    .with_attribute(
                        "subnets",
                        Value::List(vec![Value::reference(subnet, "name")]),
                    ),
            )?;
        }

        graph.add(
            "flow-log",
            Resource::new("flow_log", format!("{}-flow-log", params.name))
                .with_attribute("name", format!("{}-flow-log", params.name))
                .with_attribute("resource", Value::reference("vpc", "name"))
                .with_attribute("traffic_type", params.flow_log_traffic.as_str())
                .with_attribute("destination", Value::reference("flow-logs", "arn")),
        )?;
        graph.depends_on("flow-log", "flow-logs")?;

        // Post-build tagging traversal over the finished graph
        let graph = apply_tags(graph, &params.tags);
        debug!(nodes = graph.len(), "network topology complete");

        Ok(Self {
            graph,
            network_id: params.name,
            public_subnets,
            private_subnets: private_subnets.into_iter().map(|(b, _)| b).collect(),
        })
    }

    /// Stable logical identifier of the network. For a synthesized
    /// network this is the logical name the provisioning engine maps to
    /// a physical id; for an existing network it is the physical id.
    pub fn network_id(&self) -> &str {
        &self.network_id
    }

    /// Ordered public subnet identifiers, `{group}-1` first
    pub fn public_subnet_ids(&self) -> &[String] {
        &self.public_subnets
    }

    /// Ordered private subnet identifiers
    pub fn private_subnet_ids(&self) -> &[String] {
        &self.private_subnets
    }

    pub fn graph(&self) -> &ResourceGraph {
        &self.graph
    }

    pub fn finalize(self) -> SynthResult<SynthesizedGraph> {
        Ok(self.graph.finalize()?)
    }
}
