use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::Serialize;
use serde_json::Value;
use strata_output::{Attributes, Output, OutputTable, Producer};

use crate::error::TopologyError;
use crate::graph::Graph;
use crate::input::Input;
use crate::resource::{Resource, ResourceId, ResourceKind};

/// The declared resources of one deployment, in declaration order.
///
/// Each resource owns one deferred output cell. Consumers can be handed out
/// while building; the producers are taken by whoever provisions the
/// topology.
#[derive(Debug)]
pub struct Topology {
  owner: String,
  resources: Vec<Resource>,
  index: HashMap<ResourceId, usize>,
  outputs: OutputTable,
}

impl Topology {
  /// Create an empty topology owned by the stack `owner`.
  pub fn new(owner: impl Into<String>) -> Self {
    Self {
      owner: owner.into(),
      resources: Vec::new(),
      index: HashMap::new(),
      outputs: OutputTable::new(),
    }
  }

  /// Declare a resource.
  ///
  /// Every dependency must already be declared, which also keeps the graph
  /// acyclic. Returns the resource's deferred outputs.
  pub fn add(&mut self, resource: Resource) -> Result<Output<Attributes>, TopologyError> {
    if self.index.contains_key(&resource.id) {
      return Err(TopologyError::DuplicateResource(resource.id));
    }
    if let Some(missing) = resource
      .dependencies
      .iter()
      .find(|dep| !self.index.contains_key(*dep))
    {
      return Err(TopologyError::MissingDependency {
        resource: resource.id.clone(),
        dependency: missing.clone(),
      });
    }

    self.outputs.register(&resource.id);
    let output = self
      .outputs
      .output(&resource.id)
      .ok_or_else(|| TopologyError::ResourceNotFound(resource.id.clone()))?;

    self.index.insert(resource.id.clone(), self.resources.len());
    self.resources.push(resource);
    Ok(output)
  }

  /// Name of the stack that owns every resource.
  pub fn owner(&self) -> &str {
    &self.owner
  }

  /// Resources in the order they were added.
  pub fn resources(&self) -> &[Resource] {
    &self.resources
  }

  /// Look up a resource by id.
  pub fn get(&self, id: &str) -> Option<&Resource> {
    self.index.get(id).map(|&i| &self.resources[i])
  }

  /// Check if a resource with this id exists.
  pub fn contains(&self, id: &str) -> bool {
    self.index.contains_key(id)
  }

  /// Number of resources.
  pub fn len(&self) -> usize {
    self.resources.len()
  }

  /// Check if the topology has no resources.
  pub fn is_empty(&self) -> bool {
    self.resources.is_empty()
  }

  /// Resources of one kind, in insertion order.
  pub fn of_kind(&self, kind: ResourceKind) -> impl Iterator<Item = &Resource> {
    self.resources.iter().filter(move |r| r.kind == kind)
  }

  /// Number of resources of one kind.
  pub fn count(&self, kind: ResourceKind) -> usize {
    self.of_kind(kind).count()
  }

  /// Build the graph structure for traversal.
  pub fn graph(&self) -> Graph {
    Graph::new(&self.resources)
  }

  /// A submission order consistent with every dependency edge.
  pub fn order(&self) -> Result<Vec<ResourceId>, TopologyError> {
    self.graph().topological_order()
  }

  /// All outputs of a resource.
  pub fn output(&self, id: &str) -> Option<Output<Attributes>> {
    self.outputs.output(id)
  }

  /// One attribute of a resource.
  pub fn attribute(&self, id: &str, attribute: &str) -> Option<Output<Value>> {
    self.outputs.attribute(id, attribute)
  }

  /// A resource's desired attributes, deferred until its dependencies resolve.
  pub fn resolve_inputs(&self, id: &str) -> Option<Output<Value>> {
    let resource = self.get(id)?;
    Some(resource.inputs_as_map().resolve(id, &self.outputs))
  }

  /// Hand over every producer that has not been taken yet.
  pub fn take_producers(&mut self) -> HashMap<ResourceId, Producer<Attributes>> {
    self.outputs.take_producers()
  }

  /// A serializable view of the topology for previews.
  pub fn plan(&self) -> Result<Plan, TopologyError> {
    let order = self.order()?;
    let resources = order
      .iter()
      .filter_map(|id| self.get(id))
      .map(|r| PlannedResource {
        id: r.id.clone(),
        kind: r.kind,
        dependencies: r.dependencies.clone(),
        inputs: r.inputs.iter().map(|(k, v)| (k.clone(), v.preview())).collect(),
      })
      .collect();

    Ok(Plan {
      owner: self.owner.clone(),
      resources,
    })
  }
}

/// Resources in submission order, with unknown inputs as placeholders.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Plan {
  pub owner: String,
  pub resources: Vec<PlannedResource>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlannedResource {
  pub id: ResourceId,
  pub kind: ResourceKind,
  pub dependencies: BTreeSet<ResourceId>,
  pub inputs: BTreeMap<String, Value>,
}

impl Plan {
  /// Resource ids in creation order.
  pub fn order(&self) -> Vec<&str> {
    self.resources.iter().map(|r| r.id.as_str()).collect()
  }
}
