use std::collections::{HashMap, VecDeque};

use crate::error::TopologyError;
use crate::resource::{Resource, ResourceId};

/// Graph structure for traversal and ordering.
///
/// Edges point from a dependency to its dependents.
#[derive(Debug, Clone)]
pub struct Graph {
  /// Declaration order, used as the tie-break when ordering.
  nodes: Vec<ResourceId>,
  /// Adjacency list: resource_id -> list of dependent resource_ids.
  adjacency: HashMap<ResourceId, Vec<ResourceId>>,
  /// Reverse adjacency: resource_id -> list of dependency resource_ids.
  reverse_adjacency: HashMap<ResourceId, Vec<ResourceId>>,
  /// Resources with no dependencies.
  entry_points: Vec<ResourceId>,
}

impl Graph {
  /// Build a graph from resources in declaration order.
  ///
  /// Dependencies on unknown resources are kept as edges; use
  /// [`missing_dependencies`](Graph::missing_dependencies) to find them.
  pub fn new(resources: &[Resource]) -> Self {
    let mut adjacency: HashMap<ResourceId, Vec<ResourceId>> = HashMap::new();
    let mut reverse_adjacency: HashMap<ResourceId, Vec<ResourceId>> = HashMap::new();

    for resource in resources {
      adjacency.entry(resource.id.clone()).or_default();
      reverse_adjacency.entry(resource.id.clone()).or_default();
    }

    for resource in resources {
      for dep in &resource.dependencies {
        adjacency
          .entry(dep.clone())
          .or_default()
          .push(resource.id.clone());
        reverse_adjacency
          .entry(resource.id.clone())
          .or_default()
          .push(dep.clone());
      }
    }

    let nodes: Vec<ResourceId> = resources.iter().map(|r| r.id.clone()).collect();
    let entry_points = nodes
      .iter()
      .filter(|id| reverse_adjacency.get(*id).is_none_or(|v| v.is_empty()))
      .cloned()
      .collect();

    Self {
      nodes,
      adjacency,
      reverse_adjacency,
      entry_points,
    }
  }

  /// Resources with no dependencies, in declaration order.
  pub fn entry_points(&self) -> &[ResourceId] {
    &self.entry_points
  }

  /// Resources that depend on the given one.
  pub fn downstream(&self, id: &str) -> &[ResourceId] {
    self.adjacency.get(id).map(|v| v.as_slice()).unwrap_or(&[])
  }

  /// Resources the given one depends on.
  pub fn upstream(&self, id: &str) -> &[ResourceId] {
    self
      .reverse_adjacency
      .get(id)
      .map(|v| v.as_slice())
      .unwrap_or(&[])
  }

  /// `(resource, dependency)` pairs whose dependency is not a node.
  pub fn missing_dependencies(&self) -> Vec<(ResourceId, ResourceId)> {
    let mut missing = Vec::new();
    for id in &self.nodes {
      for dep in self.upstream(id) {
        if !self.reverse_adjacency.contains_key(dep) {
          missing.push((id.clone(), dep.clone()));
        }
      }
    }
    missing
  }

  /// A linearization where every dependency precedes its dependents.
  ///
  /// Kahn's algorithm; among ready resources, declaration order wins.
  pub fn topological_order(&self) -> Result<Vec<ResourceId>, TopologyError> {
    if let Some((resource, dependency)) = self.missing_dependencies().into_iter().next() {
      return Err(TopologyError::MissingDependency {
        resource,
        dependency,
      });
    }

    let position: HashMap<&str, usize> = self
      .nodes
      .iter()
      .enumerate()
      .map(|(i, id)| (id.as_str(), i))
      .collect();
    let mut in_degree: HashMap<&str, usize> = self
      .nodes
      .iter()
      .map(|id| (id.as_str(), self.upstream(id).len()))
      .collect();

    let mut ready: VecDeque<&str> = self
      .nodes
      .iter()
      .filter(|id| in_degree[id.as_str()] == 0)
      .map(String::as_str)
      .collect();
    let mut order = Vec::with_capacity(self.nodes.len());

    while let Some(id) = ready.pop_front() {
      order.push(id.to_string());

      let mut released: Vec<&str> = Vec::new();
      for next in self.downstream(id) {
        if let Some(degree) = in_degree.get_mut(next.as_str()) {
          *degree -= 1;
          if *degree == 0 {
            released.push(next.as_str());
          }
        }
      }
      ready.extend(released);
      ready.make_contiguous().sort_by_key(|id| position[id]);
    }

    if order.len() != self.nodes.len() {
      let remaining = self
        .nodes
        .iter()
        .filter(|id| !order.contains(id))
        .cloned()
        .collect();
      return Err(TopologyError::CycleDetected { remaining });
    }

    Ok(order)
  }
}
