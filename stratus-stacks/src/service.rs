//! Service Topology Builder
//!
//! Resolves the network, image repository, certificate, and secret,
//! then derives one consistent graph: cluster, task definition,
//! container, HTTPS-terminating load balancer with HTTP redirect,
//! health-checked target group, service, and scaling policies.
//!
//! The container port is the single source of truth: the port mapping,
//! target group, and health check all read it by reference, so the
//! health-check port cannot diverge from the container port.

use std::collections::BTreeMap;

use tracing::debug;

use stratus_aws::resolver::Resolver;
use stratus_aws::service::{ApplicationProtocol, SSL_POLICY_RECOMMENDED};
use stratus_core::error::{SynthError, SynthResult};
use stratus_core::graph::{ResourceGraph, SynthesizedGraph};
use stratus_core::resource::{Resource, Value};

use crate::network::NetworkStack;
use crate::params::ServiceParams;

/// Result of the service build
#[derive(Debug, Clone)]
pub struct ServiceStack {
    graph: ResourceGraph,
    network_id: String,
    cluster_name: String,
    service_name: String,
}

impl ServiceStack {
    /// Standalone entry point: the network reference is resolved
    /// through the resolver from the configured identifier.
    pub fn build(params: ServiceParams, resolver: &dyn Resolver) -> SynthResult<Self> {
        // Fail fast: nothing is resolved and no node is built from an
        // invalid parameter set
        params.validate()?;
        let network = resolver.lookup_network(&params.vpc_id)?;
        let network_id = network.vpc_id.clone();
        Self::assemble(params, network_id, Vec::new(), resolver)
    }

    /// Composed entry point: consumes the network stack's identifier
    /// by reference instead of looking it up. The reference is treated
    /// as immutable once read.
    pub fn build_on(
        mut params: ServiceParams,
        network: &NetworkStack,
        resolver: &dyn Resolver,
    ) -> SynthResult<Self> {
        params.vpc_id = network.network_id().to_string();
        params.validate()?;
        Self::assemble(
            params,
            network.network_id().to_string(),
            network.private_subnet_ids().to_vec(),
            resolver,
        )
    }

    fn assemble(
        params: ServiceParams,
        network_id: String,
        placement_subnets: Vec<String>,
        resolver: &dyn Resolver,
    ) -> SynthResult<Self> {
        debug!(name = %params.name, vpc = %network_id, "building service topology");

        let repository = resolver.lookup_image_repository(&params.repository_name)?;

        let mut graph = ResourceGraph::new();

        graph.add(
            "cluster",
            Resource::new("cluster", params.cluster_name.clone())
                .with_attribute("name", params.cluster_name.clone())
                .with_attribute("vpc", network_id.clone()),
        )?;

        let family = format!("{}-task", params.name);
        graph.add(
            "task-definition",
            Resource::new("task_definition", family.clone())
                .with_attribute("family", family)
                .with_attribute("cpu", i64::from(params.task_size.cpu))
                .with_attribute("memory_mib", i64::from(params.task_size.memory_mib))
                .with_attribute("network_mode", "awsvpc")
                .with_attribute("requires_compatibilities", Value::List(vec!["FARGATE".into()])),
        )?;

        // Secret resolution happens before the task's secret-env
        // mapping is finalized
        let secret = resolver.lookup_secret(&params.secret_arn)?;
        let environment: BTreeMap<String, Value> = params
            .env
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect();
        let secrets: BTreeMap<String, Value> = params
            .secret_env
            .iter()
            .map(|(k, json_key)| (k.clone(), Value::String(secret.key(json_key))))
            .collect();
        let mut logging = BTreeMap::new();
        logging.insert("driver".to_string(), Value::String("awslogs".to_string()));
        logging.insert(
            "stream_prefix".to_string(),
            Value::String(params.log_stream_prefix.clone()),
        );

        graph.add(
            "container",
            Resource::new("container", format!("{}-container", params.name))
                .with_attribute("name", format!("{}-container", params.name))
                .with_attribute("task_definition", Value::reference("task-definition", "family"))
                .with_attribute("image", repository.image(&params.image_tag))
                .with_attribute("environment", Value::Map(environment))
                .with_attribute("secrets", Value::Map(secrets))
                .with_attribute("logging", Value::Map(logging))
                .with_attribute("container_port", i64::from(params.container_port)),
        )?;

        let certificate = resolver.lookup_certificate(&params.certificate_arn)?;

        graph.add(
            "alb",
            Resource::new("load_balancer", params.load_balancer_name.clone())
                .with_attribute("name", params.load_balancer_name.clone())
                .with_attribute("scheme", "internet-facing")
                .with_attribute("vpc", network_id.clone()),
        )?;

        let mut redirect = BTreeMap::new();
        redirect.insert("type".to_string(), Value::String("redirect".to_string()));
        redirect.insert(
            "protocol".to_string(),
            Value::String(ApplicationProtocol::Https.as_str().to_string()),
        );
        redirect.insert("port".to_string(), Value::Int(443));
        redirect.insert(
            "status_code".to_string(),
            Value::String("HTTP_301".to_string()),
        );
        graph.add(
            "http-listener",
            Resource::new("listener", format!("{}-http", params.load_balancer_name))
                .with_attribute("name", format!("{}-http", params.load_balancer_name))
                .with_attribute("load_balancer", Value::reference("alb", "name"))
                .with_attribute("port", i64::from(ApplicationProtocol::Http.default_port()))
                .with_attribute("protocol", ApplicationProtocol::Http.as_str())
                .with_attribute("default_action", Value::Map(redirect)),
        )?;

        // Health check port and target port both read the container
        // port by reference; `finalize` materializes them to the same
        // value by construction
        let mut health_check = BTreeMap::new();
        health_check.insert(
            "path".to_string(),
            Value::String(params.health_check_path_or_default().to_string()),
        );
        health_check.insert(
            "port".to_string(),
            Value::reference("container", "container_port"),
        );
        graph.add(
            "target-group",
            Resource::new("target_group", format!("{}-tg", params.name))
                .with_attribute("name", format!("{}-tg", params.name))
                .with_attribute("vpc", network_id.clone())
                .with_attribute("protocol", ApplicationProtocol::Http.as_str())
                .with_attribute("port", Value::reference("container", "container_port"))
                .with_attribute("health_check", Value::Map(health_check)),
        )?;

        let mut forward = BTreeMap::new();
        forward.insert("type".to_string(), Value::String("forward".to_string()));
        forward.insert(
            "target_group".to_string(),
            Value::reference("target-group", "name"),
        );
        graph.add(
            "https-listener",
            Resource::new("listener", format!("{}-https", params.load_balancer_name))
                .with_attribute("name", format!("{}-https", params.load_balancer_name))
                .with_attribute("load_balancer", Value::reference("alb", "name"))
                .with_attribute("port", i64::from(ApplicationProtocol::Https.default_port()))
                .with_attribute("protocol", ApplicationProtocol::Https.as_str())
                .with_attribute("ssl_policy", SSL_POLICY_RECOMMENDED)
                .with_attribute("certificate", certificate.arn.clone())
                .with_attribute("default_action", Value::Map(forward)),
        )?;

        let mut service = Resource::new("service", params.service_name.clone())
            .with_attribute("name", params.service_name.clone())
            .with_attribute("cluster", Value::reference("cluster", "name"))
            .with_attribute("task_definition", Value::reference("task-definition", "family"))
            .with_attribute("target_group", Value::reference("target-group", "name"))
            .with_attribute("launch_type", "FARGATE")
            .with_attribute("desired_count", i64::from(params.min_capacity))
            .with_attribute("enable_execute_command", params.enable_execute_command);
        if !placement_subnets.is_empty() {
            service = service.with_attribute(
                "subnets",
                Value::List(placement_subnets.iter().map(|s| s.as_str().into()).collect()),
            );
        }
        graph.add("service", service)?;

        // Reconcile step: the derived health-check port must equal the
        // container port. With references this holds by construction;
        // the check guards against future regressions in the wiring.
        let resolved = graph.resolve_attribute("target-group", "health_check")?;
        let health_port = match &resolved {
            Value::Map(map) => map.get("port").and_then(Value::as_int),
            _ => None,
        };
        if health_port != Some(i64::from(params.container_port)) {
            return Err(SynthError::invariant(
                "health_check.port == container_port",
                format!(
                    "health check resolves to {:?}, container port is {}",
                    health_port, params.container_port
                ),
            ));
        }

        // Scaling: two utilization policies over one capacity range.
        // Trigger OR-combination (either threshold scales out) is the
        // external engine's documented behavior, not re-implemented
        // here.
        graph.add(
            "scaling-target",
            Resource::new("scaling_target", format!("{}-scaling", params.name))
                .with_attribute("name", format!("{}-scaling", params.name))
                .with_attribute("service", Value::reference("service", "name"))
                .with_attribute("min_capacity", i64::from(params.min_capacity))
                .with_attribute("max_capacity", i64::from(params.max_capacity)),
        )?;
        for (binding, metric, target) in [
            ("cpu-scaling", "cpu", params.cpu_target_pct),
            ("memory-scaling", "memory", params.memory_target_pct),
        ] {
            graph.add(
                binding,
                Resource::new("scaling_policy", format!("{}-{}", params.name, binding))
                    .with_attribute("name", format!("{}-{}", params.name, binding))
                    .with_attribute("scaling_target", Value::reference("scaling-target", "name"))
                    .with_attribute("metric", metric)
                    .with_attribute("target_percent", i64::from(target)),
            )?;
        }

        debug!(nodes = graph.len(), "service topology complete");
        Ok(Self {
            graph,
            network_id,
            cluster_name: params.cluster_name,
            service_name: params.service_name,
        })
    }

    pub fn network_id(&self) -> &str {
        &self.network_id
    }

    pub fn cluster_name(&self) -> &str {
        &self.cluster_name
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    pub fn graph(&self) -> &ResourceGraph {
        &self.graph
    }

    /// The materialized health-check port (always the container port)
    pub fn health_check_port(&self) -> SynthResult<u16> {
        let resolved = self.graph.resolve_attribute("target-group", "health_check")?;
        let port = match &resolved {
            Value::Map(map) => map.get("port").and_then(Value::as_int),
            _ => None,
        };
        port.and_then(|p| u16::try_from(p).ok()).ok_or_else(|| {
            SynthError::invariant("health_check.port == container_port", "port is unresolved")
        })
    }

    pub fn finalize(self) -> SynthResult<SynthesizedGraph> {
        Ok(self.graph.finalize()?)
    }
}
