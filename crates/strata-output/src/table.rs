use std::collections::HashMap;

use serde_json::Value;

use crate::error::OutputError;
use crate::output::{Output, Producer};

/// Attributes reported by the backend for one resource.
pub type Attributes = serde_json::Map<String, Value>;

/// One output cell per resource, keyed by resource id.
///
/// The table hands out consumers at any time. Producers are taken out exactly
/// once by whoever provisions the resource; a producer still in the table
/// when it is dropped fails its consumers.
#[derive(Debug, Default)]
pub struct OutputTable {
  producers: HashMap<String, Producer<Attributes>>,
  outputs: HashMap<String, Output<Attributes>>,
}

impl OutputTable {
  /// Create an empty table.
  pub fn new() -> Self {
    Self::default()
  }

  /// Create the cell for a resource. Returns `false` if it already exists.
  pub fn register(&mut self, resource_id: &str) -> bool {
    if self.outputs.contains_key(resource_id) {
      return false;
    }
    let (producer, output) = Output::pending(resource_id);
    self.producers.insert(resource_id.to_string(), producer);
    self.outputs.insert(resource_id.to_string(), output);
    true
  }

  /// All attributes of a resource, once it has been created.
  pub fn output(&self, resource_id: &str) -> Option<Output<Attributes>> {
    self.outputs.get(resource_id).cloned()
  }

  /// A single attribute of a resource.
  ///
  /// Fails with [`OutputError::MissingAttribute`] if the resource resolves
  /// without it.
  pub fn attribute(&self, resource_id: &str, attribute: &str) -> Option<Output<Value>> {
    let output = self.outputs.get(resource_id)?;
    let label = format!("{}.{}", resource_id, attribute);
    let attribute = attribute.to_string();
    let resource = resource_id.to_string();
    let derived = output.try_apply(move |attrs| {
      attrs
        .get(&attribute)
        .cloned()
        .ok_or(OutputError::MissingAttribute {
          label: resource,
          attribute,
        })
    });
    Some(derived.with_label(label))
  }

  /// Hand over the producer for a resource. Only succeeds once.
  pub fn take_producer(&mut self, resource_id: &str) -> Option<Producer<Attributes>> {
    self.producers.remove(resource_id)
  }

  /// Hand over every remaining producer.
  pub fn take_producers(&mut self) -> HashMap<String, Producer<Attributes>> {
    std::mem::take(&mut self.producers)
  }

  /// Number of registered outputs.
  pub fn len(&self) -> usize {
    self.outputs.len()
  }

  /// Check if no outputs are registered.
  pub fn is_empty(&self) -> bool {
    self.outputs.is_empty()
  }
}
