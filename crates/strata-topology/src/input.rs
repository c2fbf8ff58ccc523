//! Desired attribute values.
//!
//! An input is either known at declaration time (a literal) or refers to an
//! attribute another resource only reports once it exists. References are
//! resolved through the topology's [`OutputTable`], so an input that mentions
//! `demo-vpc.id` cannot be computed before `demo-vpc` has been created.
//!
//! # Examples
//!
//! ```text
//! Input::attr("demo-vpc", "id")                      -> "vpc-..."
//! Input::template("{{ url }}:latest", [("url", "demo-repo", "repositoryUrl")])
//! Input::list([Input::attr("demo-subnet-1", "id"), Input::attr("demo-subnet-2", "id")])
//! ```

use std::collections::{BTreeMap, BTreeSet};

use serde::{Serialize, Serializer};
use serde_json::Value;
use strata_output::{Output, OutputError, OutputTable, interpolate};

use crate::resource::ResourceId;

/// Reference to one attribute of another resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeRef {
  pub resource: ResourceId,
  pub attribute: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Input {
  Literal(Value),
  Ref(AttributeRef),
  List(Vec<Input>),
  Map(BTreeMap<String, Input>),
  /// A string rendered once every named reference has resolved.
  Template {
    template: String,
    vars: BTreeMap<String, AttributeRef>,
  },
}

impl Input {
  /// A literal value.
  pub fn value(value: impl Into<Value>) -> Self {
    Input::Literal(value.into())
  }

  /// An attribute of another resource, known once that resource exists.
  pub fn attr(resource: impl Into<ResourceId>, attribute: impl Into<String>) -> Self {
    Input::Ref(AttributeRef {
      resource: resource.into(),
      attribute: attribute.into(),
    })
  }

  /// A list of inputs.
  pub fn list<I: IntoIterator<Item = Input>>(items: I) -> Self {
    Input::List(items.into_iter().collect())
  }

  /// A map of named inputs.
  pub fn map<K: Into<String>, I: IntoIterator<Item = (K, Input)>>(entries: I) -> Self {
    Input::Map(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
  }

  /// A template whose variables are `(name, resource, attribute)` triples.
  pub fn template<'a, I>(template: impl Into<String>, vars: I) -> Self
  where
    I: IntoIterator<Item = (&'a str, &'a str, &'a str)>,
  {
    Input::Template {
      template: template.into(),
      vars: vars
        .into_iter()
        .map(|(name, resource, attribute)| {
          (
            name.to_string(),
            AttributeRef {
              resource: resource.to_string(),
              attribute: attribute.to_string(),
            },
          )
        })
        .collect(),
    }
  }

  /// Every resource this input reads from.
  pub fn collect_references(&self, out: &mut BTreeSet<ResourceId>) {
    match self {
      Input::Literal(_) => {}
      Input::Ref(r) => {
        out.insert(r.resource.clone());
      }
      Input::List(items) => items.iter().for_each(|i| i.collect_references(out)),
      Input::Map(entries) => entries.values().for_each(|i| i.collect_references(out)),
      Input::Template { vars, .. } => {
        out.extend(vars.values().map(|r| r.resource.clone()));
      }
    }
  }

  /// Resolve to a deferred JSON value through the output table.
  ///
  /// A reference to a resource the table does not know fails the output
  /// rather than yielding a placeholder.
  pub fn resolve(&self, label: &str, outputs: &OutputTable) -> Output<Value> {
    match self {
      Input::Literal(v) => Output::ready(label, v.clone()),
      Input::Ref(r) => attribute(outputs, r),
      Input::List(items) => {
        let resolved = items
          .iter()
          .enumerate()
          .map(|(i, item)| item.resolve(&format!("{}[{}]", label, i), outputs))
          .collect();
        Output::combine(label, resolved, Value::Array)
      }
      Input::Map(entries) => {
        let keys: Vec<String> = entries.keys().cloned().collect();
        let resolved = entries
          .iter()
          .map(|(key, item)| item.resolve(&format!("{}.{}", label, key), outputs))
          .collect();
        Output::combine(label, resolved, move |values| {
          Value::Object(keys.into_iter().zip(values).collect())
        })
      }
      Input::Template { template, vars } => {
        let vars = vars
          .iter()
          .map(|(name, r)| (name.clone(), attribute(outputs, r)))
          .collect();
        interpolate(label, template.clone(), vars).apply(Value::String)
      }
    }
  }

  /// Render for display, with unknown values shown as `${resource.attribute}`.
  pub fn preview(&self) -> Value {
    match self {
      Input::Literal(v) => v.clone(),
      Input::Ref(r) => Value::String(format!("${{{}.{}}}", r.resource, r.attribute)),
      Input::List(items) => Value::Array(items.iter().map(Input::preview).collect()),
      Input::Map(entries) => Value::Object(
        entries
          .iter()
          .map(|(k, v)| (k.clone(), v.preview()))
          .collect(),
      ),
      Input::Template { template, vars } => {
        let mut rendered = template.clone();
        for (name, r) in vars {
          let placeholder = format!("${{{}.{}}}", r.resource, r.attribute);
          rendered = rendered
            .replace(&format!("{{{{ {} }}}}", name), &placeholder)
            .replace(&format!("{{{{{}}}}}", name), &placeholder);
        }
        Value::String(rendered)
      }
    }
  }
}

fn attribute(outputs: &OutputTable, r: &AttributeRef) -> Output<Value> {
  outputs
    .attribute(&r.resource, &r.attribute)
    .unwrap_or_else(|| {
      let label = format!("{}.{}", r.resource, r.attribute);
      Output::failed(label.clone(), OutputError::Unresolved { label })
    })
}

impl Serialize for Input {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    self.preview().serialize(serializer)
  }
}

impl From<&str> for Input {
  fn from(s: &str) -> Self {
    Input::Literal(Value::String(s.to_string()))
  }
}

impl From<String> for Input {
  fn from(s: String) -> Self {
    Input::Literal(Value::String(s))
  }
}

impl From<bool> for Input {
  fn from(b: bool) -> Self {
    Input::Literal(Value::Bool(b))
  }
}

impl From<u16> for Input {
  fn from(n: u16) -> Self {
    Input::Literal(Value::from(n))
  }
}

impl From<u32> for Input {
  fn from(n: u32) -> Self {
    Input::Literal(Value::from(n))
  }
}

impl From<Value> for Input {
  fn from(v: Value) -> Self {
    Input::Literal(v)
  }
}
