use serde_json::Value;
use strata_config::Config;
use strata_output::{Output, OutputError, interpolate};

use crate::builder::TopologyBuilder;
use crate::error::TopologyError;
use crate::topology::Topology;

/// The application composite.
///
/// Owns every child resource in a private topology and re-exports a single
/// derived value: the public `url` of the load balancer. The children are
/// never shared with another composite.
#[derive(Debug)]
pub struct AppInfra {
  name: String,
  topology: Topology,
  url: Output<String>,
  image_ref: Output<String>,
}

impl AppInfra {
  pub const TYPE: &'static str = "strata:infra:AppInfra";

  /// Build the stack for a resolved config.
  pub fn new(config: &Config) -> Result<Self, TopologyError> {
    Self::from_builder(TopologyBuilder::new(config))
  }

  /// Build the stack from a customized builder.
  pub fn from_builder(builder: TopologyBuilder<'_>) -> Result<Self, TopologyError> {
    let topology = builder.build()?;

    let dns_name = attribute(&topology, &builder.name("alb"), "dnsName")?;
    let url = interpolate("url", "http://{{ dns_name }}", vec![("dns_name".to_string(), dns_name)]);

    let image_ref = attribute(&topology, &builder.name("image"), "imageName")?
      .try_apply(|value| match value {
        Value::String(s) => Ok(s),
        other => Err(OutputError::Derive {
          label: "image_ref".to_string(),
          message: format!("expected a string image name, got {}", other),
        }),
      })
      .with_label("image_ref");

    Ok(Self {
      name: topology.owner().to_string(),
      topology,
      url,
      image_ref,
    })
  }

  /// Name of the stack, the prefix shared by its resources.
  pub fn name(&self) -> &str {
    &self.name
  }

  /// `http://<load balancer dns name>`, once the load balancer exists.
  pub fn url(&self) -> Output<String> {
    self.url.clone()
  }

  /// Fully qualified reference of the pushed image.
  pub fn image_ref(&self) -> Output<String> {
    self.image_ref.clone()
  }

  /// Read-only view of the children, for previews.
  pub fn topology(&self) -> &Topology {
    &self.topology
  }

  /// Hand the children over for provisioning. Outputs already handed out
  /// stay connected to the topology's cells.
  pub fn into_topology(self) -> Topology {
    self.topology
  }
}

fn attribute(topology: &Topology, id: &str, attribute: &str) -> Result<Output<Value>, TopologyError> {
  topology
    .attribute(id, attribute)
    .ok_or_else(|| TopologyError::ResourceNotFound(id.to_string()))
}
