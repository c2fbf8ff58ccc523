use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::input::Input;

/// Resource ids are the deterministic `<prefix>-<role>` names.
pub type ResourceId = String;

/// The kinds of resource an application stack is made of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
  Vpc,
  Subnet,
  InternetGateway,
  RouteTable,
  RouteTableAssociation,
  SecurityGroup,
  Cluster,
  Repository,
  /// A container image built locally and pushed to a [`ResourceKind::Repository`].
  Image,
  Role,
  RolePolicyAttachment,
  TaskDefinition,
  LoadBalancer,
  TargetGroup,
  Listener,
  Service,
}

impl ResourceKind {
  /// Provider type name.
  pub fn as_str(&self) -> &'static str {
    match self {
      ResourceKind::Vpc => "vpc",
      ResourceKind::Subnet => "subnet",
      ResourceKind::InternetGateway => "internet_gateway",
      ResourceKind::RouteTable => "route_table",
      ResourceKind::RouteTableAssociation => "route_table_association",
      ResourceKind::SecurityGroup => "security_group",
      ResourceKind::Cluster => "cluster",
      ResourceKind::Repository => "repository",
      ResourceKind::Image => "image",
      ResourceKind::Role => "role",
      ResourceKind::RolePolicyAttachment => "role_policy_attachment",
      ResourceKind::TaskDefinition => "task_definition",
      ResourceKind::LoadBalancer => "load_balancer",
      ResourceKind::TargetGroup => "target_group",
      ResourceKind::Listener => "listener",
      ResourceKind::Service => "service",
    }
  }

  /// Whether submitting this kind needs a registry push credential first.
  pub fn needs_registry_credential(&self) -> bool {
    matches!(self, ResourceKind::Image)
  }
}

impl fmt::Display for ResourceKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// A named, typed desired-state record.
///
/// `dependencies` always contains every resource referenced from `inputs`,
/// plus anything added with [`depends_on`](Resource::depends_on).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resource {
  pub id: ResourceId,
  pub kind: ResourceKind,
  pub inputs: BTreeMap<String, Input>,
  pub dependencies: BTreeSet<ResourceId>,
}

impl Resource {
  /// Create a resource with no inputs and no extra dependencies.
  pub fn new(id: impl Into<ResourceId>, kind: ResourceKind) -> Self {
    Self {
      id: id.into(),
      kind,
      inputs: BTreeMap::new(),
      dependencies: BTreeSet::new(),
    }
  }

  /// Set a desired attribute. References inside it become dependencies.
  pub fn input(mut self, key: impl Into<String>, value: impl Into<Input>) -> Self {
    let value = value.into();
    value.collect_references(&mut self.dependencies);
    self.inputs.insert(key.into(), value);
    self
  }

  /// Add an ordering dependency that no input expresses.
  pub fn depends_on(mut self, id: impl Into<ResourceId>) -> Self {
    self.dependencies.insert(id.into());
    self
  }

  /// Desired attributes as a single map input.
  pub fn inputs_as_map(&self) -> Input {
    Input::Map(self.inputs.clone())
  }
}
