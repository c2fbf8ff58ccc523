//! The container application stack.
//!
//! Resources are declared in this order, each after everything it needs:
//!
//! ```text
//! vpc ─┬─ subnet-N ── rta-N ──────────────────────────┐
//!      ├─ igw ── route-table ── rta-N                 │
//!      ├─ sg ─────────────────────────── alb ── listener ── service
//!      └─ tg ────────────────────────────────┘         │
//! cluster ─────────────────────────────────────────────┤
//! repo ── image ─┐                                     │
//! role ── policy ┴─ task ──────────────────────────────┘
//! ```

use serde_json::json;
use strata_config::Config;

use crate::binding::{EndpointBinding, HealthCheck};
use crate::error::TopologyError;
use crate::input::Input;
use crate::resource::{Resource, ResourceId, ResourceKind};
use crate::topology::Topology;

const VPC_CIDR: &str = "10.0.0.0/16";
const ANYWHERE: &str = "0.0.0.0/0";
const CONTAINER_NAME: &str = "app";
const IMAGE_TAG: &str = "latest";
const EXECUTION_POLICY_ARN: &str =
  "arn:aws:iam::aws:policy/service-role/AmazonECSTaskExecutionRolePolicy";
const TASK_PRINCIPAL: &str = "ecs-tasks.amazonaws.com";

/// Ids of the network resources other parts of the stack attach to.
struct Network {
  vpc: ResourceId,
  subnets: Vec<ResourceId>,
  security_group: ResourceId,
}

/// Derives the application topology from a resolved config.
pub struct TopologyBuilder<'a> {
  config: &'a Config,
  health_check: HealthCheck,
}

impl<'a> TopologyBuilder<'a> {
  /// Create a builder with the canonical health check.
  pub fn new(config: &'a Config) -> Self {
    Self {
      config,
      health_check: HealthCheck::canonical(),
    }
  }

  /// Replace the target group health check.
  pub fn with_health_check(mut self, health_check: HealthCheck) -> Self {
    self.health_check = health_check;
    self
  }

  /// `<prefix>-<role>`.
  pub fn name(&self, role: &str) -> ResourceId {
    format!("{}-{}", self.config.name, role)
  }

  /// How the container port is exposed through the load balancer.
  pub fn binding(&self) -> EndpointBinding {
    EndpointBinding::new(self.config.container_port, self.health_check.clone())
  }

  /// Declare every resource of the stack and its dependencies.
  pub fn build(&self) -> Result<Topology, TopologyError> {
    let mut topology = Topology::new(&self.config.name);
    let binding = self.binding();

    let network = self.declare_network(&mut topology)?;
    let cluster = self.declare_cluster(&mut topology)?;
    let image = self.declare_image(&mut topology)?;
    let task = self.declare_task(&mut topology, &image, &binding)?;
    let (target_group, listener) = self.declare_load_balancer(&mut topology, &network, &binding)?;
    self.declare_service(
      &mut topology,
      &network,
      &cluster,
      &task,
      &target_group,
      &listener,
      &binding,
    )?;

    Ok(topology)
  }

  fn tags(&self, name: &str) -> Input {
    Input::value(json!({ "Name": name }))
  }

  fn declare_network(&self, topology: &mut Topology) -> Result<Network, TopologyError> {
    let vpc = self.name("vpc");
    topology.add(
      Resource::new(&vpc, ResourceKind::Vpc)
        .input("cidrBlock", VPC_CIDR)
        .input("enableDnsSupport", true)
        .input("enableDnsHostnames", true)
        .input("tags", self.tags(&vpc)),
    )?;

    let mut subnets = Vec::with_capacity(self.config.availability_zones.len());
    for (i, zone) in self.config.availability_zones.iter().enumerate() {
      let subnet = self.name(&format!("subnet-{}", i + 1));
      topology.add(
        Resource::new(&subnet, ResourceKind::Subnet)
          .input("vpcId", Input::attr(&vpc, "id"))
          .input("cidrBlock", format!("10.0.{}.0/24", i + 1))
          .input("availabilityZone", zone.as_str())
          .input("tags", self.tags(&subnet)),
      )?;
      subnets.push(subnet);
    }

    let igw = self.name("igw");
    topology.add(
      Resource::new(&igw, ResourceKind::InternetGateway)
        .input("vpcId", Input::attr(&vpc, "id"))
        .input("tags", self.tags(&igw)),
    )?;

    let route_table = self.name("route-table");
    topology.add(
      Resource::new(&route_table, ResourceKind::RouteTable)
        .input("vpcId", Input::attr(&vpc, "id"))
        .input(
          "routes",
          Input::list([Input::map([
            ("cidrBlock", Input::from(ANYWHERE)),
            ("gatewayId", Input::attr(&igw, "id")),
          ])]),
        )
        .input("tags", self.tags(&route_table)),
    )?;

    for (i, subnet) in subnets.iter().enumerate() {
      topology.add(
        Resource::new(self.name(&format!("rta-{}", i + 1)), ResourceKind::RouteTableAssociation)
          .input("subnetId", Input::attr(subnet, "id"))
          .input("routeTableId", Input::attr(&route_table, "id")),
      )?;
    }

    let security_group = self.name("sg");
    let ingress = |port: u16| {
      Input::value(json!({
        "protocol": "tcp",
        "fromPort": port,
        "toPort": port,
        "cidrBlocks": [ANYWHERE],
      }))
    };
    topology.add(
      Resource::new(&security_group, ResourceKind::SecurityGroup)
        .input("vpcId", Input::attr(&vpc, "id"))
        .input("description", "Allow HTTP/HTTPS")
        .input("ingress", Input::list([ingress(80), ingress(443)]))
        .input(
          "egress",
          Input::value(json!([{
            "protocol": "-1",
            "fromPort": 0,
            "toPort": 0,
            "cidrBlocks": [ANYWHERE],
          }])),
        ),
    )?;

    Ok(Network {
      vpc,
      subnets,
      security_group,
    })
  }

  fn declare_cluster(&self, topology: &mut Topology) -> Result<ResourceId, TopologyError> {
    let cluster = self.name("cluster");
    topology.add(Resource::new(&cluster, ResourceKind::Cluster))?;
    Ok(cluster)
  }

  /// Registry plus the image pushed into it. The push credential is fetched
  /// by the provisioner right before the image is submitted.
  fn declare_image(&self, topology: &mut Topology) -> Result<ResourceId, TopologyError> {
    let repo = self.name("repo");
    topology.add(Resource::new(&repo, ResourceKind::Repository).input("forceDelete", true))?;

    let image = self.name("image");
    topology.add(
      Resource::new(&image, ResourceKind::Image)
        .input(
          "build",
          Input::value(json!({ "context": "./app", "platform": "linux/amd64" })),
        )
        .input(
          "imageName",
          Input::template(
            format!("{{{{ repository_url }}}}:{}", IMAGE_TAG),
            [("repository_url", repo.as_str(), "repositoryUrl")],
          ),
        )
        .input("registryId", Input::attr(&repo, "registryId")),
    )?;
    Ok(image)
  }

  fn declare_task(
    &self,
    topology: &mut Topology,
    image: &str,
    binding: &EndpointBinding,
  ) -> Result<ResourceId, TopologyError> {
    let role = self.name("task-execution-role");
    topology.add(
      Resource::new(&role, ResourceKind::Role).input(
        "assumeRolePolicy",
        Input::value(json!({
          "Version": "2012-10-17",
          "Statement": [{
            "Action": "sts:AssumeRole",
            "Effect": "Allow",
            "Principal": { "Service": TASK_PRINCIPAL },
          }],
        })),
      ),
    )?;

    let policy = self.name("task-execution-role-policy");
    topology.add(
      Resource::new(&policy, ResourceKind::RolePolicyAttachment)
        .input("role", Input::attr(&role, "name"))
        .input("policyArn", EXECUTION_POLICY_ARN),
    )?;

    let container = Input::map([
      ("name", Input::from(CONTAINER_NAME)),
      ("image", Input::attr(image, "imageName")),
      ("cpu", Input::from(self.config.cpu)),
      ("memory", Input::from(self.config.memory)),
      ("essential", Input::from(true)),
      (
        "portMappings",
        Input::value(json!([{ "containerPort": binding.container_port, "protocol": "tcp" }])),
      ),
      (
        "environment",
        Input::value(json!([{ "name": "MOTD", "value": self.config.motd }])),
      ),
    ]);

    let task = self.name("task");
    topology.add(
      Resource::new(&task, ResourceKind::TaskDefinition)
        .input("family", task.as_str())
        .input("networkMode", "awsvpc")
        .input("requiresCompatibilities", Input::value(json!(["FARGATE"])))
        .input("cpu", self.config.cpu.to_string())
        .input("memory", self.config.memory.to_string())
        .input("executionRoleArn", Input::attr(&role, "arn"))
        .input("containerDefinitions", Input::list([container]))
        .depends_on(&policy),
    )?;
    Ok(task)
  }

  fn declare_load_balancer(
    &self,
    topology: &mut Topology,
    network: &Network,
    binding: &EndpointBinding,
  ) -> Result<(ResourceId, ResourceId), TopologyError> {
    let alb = self.name("alb");
    topology.add(
      Resource::new(&alb, ResourceKind::LoadBalancer)
        .input("internal", false)
        .input("loadBalancerType", "application")
        .input(
          "securityGroups",
          Input::list([Input::attr(&network.security_group, "id")]),
        )
        .input("subnets", subnet_ids(&network.subnets)),
    )?;

    let target_group = self.name("tg");
    topology.add(
      Resource::new(&target_group, ResourceKind::TargetGroup)
        .input("port", binding.target_port())
        .input("protocol", "HTTP")
        .input("targetType", "ip")
        .input("vpcId", Input::attr(&network.vpc, "id"))
        .input("healthCheck", binding.health_check.to_input()),
    )?;

    let listener = self.name("listener");
    topology.add(
      Resource::new(&listener, ResourceKind::Listener)
        .input("loadBalancerArn", Input::attr(&alb, "arn"))
        .input("port", binding.listener_port)
        .input(
          "defaultActions",
          Input::list([Input::map([
            ("type", Input::from("forward")),
            ("targetGroupArn", Input::attr(&target_group, "arn")),
          ])]),
        ),
    )?;

    Ok((target_group, listener))
  }

  #[allow(clippy::too_many_arguments)]
  fn declare_service(
    &self,
    topology: &mut Topology,
    network: &Network,
    cluster: &str,
    task: &str,
    target_group: &str,
    listener: &str,
    binding: &EndpointBinding,
  ) -> Result<ResourceId, TopologyError> {
    let service = self.name("service");
    topology.add(
      Resource::new(&service, ResourceKind::Service)
        .input("cluster", Input::attr(cluster, "arn"))
        .input("taskDefinition", Input::attr(task, "arn"))
        .input("desiredCount", 1u32)
        .input("launchType", "FARGATE")
        .input(
          "networkConfiguration",
          Input::map([
            ("assignPublicIp", Input::from(true)),
            ("subnets", subnet_ids(&network.subnets)),
            (
              "securityGroups",
              Input::list([Input::attr(&network.security_group, "id")]),
            ),
          ]),
        )
        .input(
          "loadBalancers",
          Input::list([Input::map([
            ("targetGroupArn", Input::attr(target_group, "arn")),
            ("containerName", Input::from(CONTAINER_NAME)),
            ("containerPort", Input::from(binding.container_port)),
          ])]),
        )
        .depends_on(listener),
    )?;
    Ok(service)
  }
}

fn subnet_ids(subnets: &[ResourceId]) -> Input {
  Input::list(subnets.iter().map(|s| Input::attr(s, "id")))
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::Value;
  use strata_config::Variant;

  fn config() -> Config {
    Config {
      name: "demo".to_string(),
      container_port: 8080,
      cpu: 256,
      memory: 512,
      motd: "Hello, Pulumi!".to_string(),
      region: "us-west-2".to_string(),
      availability_zones: vec!["us-west-2a".to_string(), "us-west-2b".to_string()],
      variant: Variant::Component,
    }
  }

  fn inputs(topology: &Topology, id: &str) -> serde_json::Map<String, Value> {
    let resource = topology.get(id).unwrap();
    resource
      .inputs
      .iter()
      .map(|(k, v)| (k.clone(), v.preview()))
      .collect()
  }

  #[test]
  fn test_resource_counts() {
    let topology = TopologyBuilder::new(&config()).build().unwrap();

    assert_eq!(topology.count(ResourceKind::Vpc), 1);
    assert_eq!(topology.count(ResourceKind::Subnet), 2);
    assert_eq!(topology.count(ResourceKind::RouteTableAssociation), 2);
    for kind in [
      ResourceKind::InternetGateway,
      ResourceKind::RouteTable,
      ResourceKind::SecurityGroup,
      ResourceKind::Cluster,
      ResourceKind::Repository,
      ResourceKind::Image,
      ResourceKind::Role,
      ResourceKind::RolePolicyAttachment,
      ResourceKind::TaskDefinition,
      ResourceKind::LoadBalancer,
      ResourceKind::TargetGroup,
      ResourceKind::Listener,
      ResourceKind::Service,
    ] {
      assert_eq!(topology.count(kind), 1, "expected exactly one {}", kind);
    }
    assert_eq!(topology.len(), 18);
  }

  #[test]
  fn test_subnets_in_distinct_zones() {
    let mut cfg = config();
    cfg.availability_zones = vec!["z1".into(), "z2".into(), "z3".into()];
    let topology = TopologyBuilder::new(&cfg).build().unwrap();

    let zones: std::collections::HashSet<String> = topology
      .of_kind(ResourceKind::Subnet)
      .filter_map(|s| s.inputs["availabilityZone"].preview().as_str().map(str::to_string))
      .collect();
    assert_eq!(zones.len(), 3);
    assert_eq!(topology.count(ResourceKind::RouteTableAssociation), 3);
  }

  #[test]
  fn test_names_use_prefix() {
    let cfg = config();
    let builder = TopologyBuilder::new(&cfg);
    let topology = builder.build().unwrap();
    for id in ["demo-vpc", "demo-subnet-1", "demo-subnet-2", "demo-igw", "demo-alb", "demo-service"] {
      assert!(topology.contains(id), "missing {}", id);
    }
    assert_eq!(builder.name("tg"), "demo-tg");
  }

  #[test]
  fn test_order_respects_every_edge() {
    let topology = TopologyBuilder::new(&config()).build().unwrap();
    let order = topology.order().unwrap();
    let position: std::collections::HashMap<&str, usize> = order
      .iter()
      .enumerate()
      .map(|(i, id)| (id.as_str(), i))
      .collect();

    for resource in topology.resources() {
      for dep in &resource.dependencies {
        assert!(
          position[dep.as_str()] < position[resource.id.as_str()],
          "{} must come before {}",
          dep,
          resource.id
        );
      }
    }
  }

  #[test]
  fn test_container_port_is_consistent() {
    let topology = TopologyBuilder::new(&config()).build().unwrap();

    let task = inputs(&topology, "demo-task");
    assert_eq!(
      task["containerDefinitions"][0]["portMappings"][0]["containerPort"],
      8080
    );
    assert_eq!(inputs(&topology, "demo-tg")["port"], 8080);
    assert_eq!(
      inputs(&topology, "demo-service")["loadBalancers"][0]["containerPort"],
      8080
    );
    assert_eq!(inputs(&topology, "demo-listener")["port"], 80);
  }

  #[test]
  fn test_task_embeds_config() {
    let topology = TopologyBuilder::new(&config()).build().unwrap();
    let task = inputs(&topology, "demo-task");

    assert_eq!(task["cpu"], "256");
    assert_eq!(task["memory"], "512");
    let container = &task["containerDefinitions"][0];
    assert_eq!(container["image"], "${demo-image.imageName}");
    assert_eq!(
      container["environment"],
      serde_json::json!([{ "name": "MOTD", "value": "Hello, Pulumi!" }])
    );

    let deps = &topology.get("demo-task").unwrap().dependencies;
    assert!(deps.contains("demo-image"));
    assert!(deps.contains("demo-task-execution-role"));
    assert!(deps.contains("demo-task-execution-role-policy"));
  }

  #[test]
  fn test_health_check_policy() {
    let topology = TopologyBuilder::new(&config()).build().unwrap();
    let hc = &inputs(&topology, "demo-tg")["healthCheck"];
    assert_eq!(hc["path"], "/");
    assert!(hc["interval"].as_u64().unwrap() > hc["timeout"].as_u64().unwrap());
    assert!(hc["healthyThreshold"].as_u64().unwrap() >= 1);
    assert!(hc["unhealthyThreshold"].as_u64().unwrap() >= 1);
  }

  #[test]
  fn test_service_depends_on_everything_it_binds() {
    let topology = TopologyBuilder::new(&config()).build().unwrap();
    let deps = &topology.get("demo-service").unwrap().dependencies;
    for dep in [
      "demo-cluster",
      "demo-task",
      "demo-tg",
      "demo-listener",
      "demo-subnet-1",
      "demo-subnet-2",
      "demo-sg",
    ] {
      assert!(deps.contains(dep), "service should depend on {}", dep);
    }
  }

  #[test]
  fn test_image_name_template() {
    let topology = TopologyBuilder::new(&config()).build().unwrap();
    let image = inputs(&topology, "demo-image");
    assert_eq!(image["imageName"], "${demo-repo.repositoryUrl}:latest");
    assert_eq!(image["registryId"], "${demo-repo.registryId}");
  }
}
