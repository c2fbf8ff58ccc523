//! Computed attributes of simulated resources.
//!
//! Everything here is a pure function of the resource id, kind, inputs and
//! region, so two runs with the same topology report the same values.

use serde_json::{Value, json};
use strata_output::Attributes;
use strata_topology::ResourceKind;

use crate::backend::SubmitRequest;
use crate::error::ProviderError;

pub(crate) fn compute(
  request: &SubmitRequest,
  region: &str,
  account_id: &str,
) -> Result<Attributes, ProviderError> {
  let id = request.id.as_str();
  let mut attrs = Attributes::new();
  attrs.insert("id".to_string(), json!(format!("{}-id", id)));
  attrs.insert("name".to_string(), json!(id));
  attrs.insert("arn".to_string(), json!(arn(request.kind, id, region, account_id)));

  match request.kind {
    ResourceKind::Repository => {
      attrs.insert("registryId".to_string(), json!(account_id));
      attrs.insert(
        "repositoryUrl".to_string(),
        json!(format!("{}/{}", registry_host(account_id, region), id)),
      );
    }
    ResourceKind::Image => {
      let image_name = string_input(request, "imageName")?;
      let repository = image_name
        .rsplit_once(':')
        .map(|(repo, _tag)| repo)
        .unwrap_or(image_name);
      attrs.insert("imageName".to_string(), json!(image_name));
      attrs.insert(
        "repoDigest".to_string(),
        json!(format!("{}@sha256:{}", repository, digest(&request.inputs))),
      );
    }
    ResourceKind::LoadBalancer => {
      attrs.insert(
        "dnsName".to_string(),
        json!(format!("{}-{}.{}.elb.amazonaws.com", id, short_hash(id), region)),
      );
    }
    ResourceKind::TaskDefinition => {
      let family = string_input(request, "family").unwrap_or(id);
      attrs.insert("family".to_string(), json!(family));
      attrs.insert("revision".to_string(), json!(1));
    }
    _ => {}
  }

  Ok(attrs)
}

pub(crate) fn registry_host(account_id: &str, region: &str) -> String {
  format!("{}.dkr.ecr.{}.amazonaws.com", account_id, region)
}

fn arn(kind: ResourceKind, id: &str, region: &str, account_id: &str) -> String {
  match kind {
    ResourceKind::Role => format!("arn:aws:iam::{}:role/{}", account_id, id),
    ResourceKind::TaskDefinition => {
      format!("arn:aws:ecs:{}:{}:task-definition/{}:1", region, account_id, id)
    }
    ResourceKind::Cluster | ResourceKind::Service => {
      format!("arn:aws:ecs:{}:{}:{}/{}", region, account_id, kind, id)
    }
    ResourceKind::LoadBalancer | ResourceKind::TargetGroup | ResourceKind::Listener => format!(
      "arn:aws:elasticloadbalancing:{}:{}:{}/{}/{}",
      region,
      account_id,
      kind,
      id,
      short_hash(id)
    ),
    ResourceKind::Repository | ResourceKind::Image => {
      format!("arn:aws:ecr:{}:{}:repository/{}", region, account_id, id)
    }
    _ => format!("arn:aws:ec2:{}:{}:{}/{}", region, account_id, kind, id),
  }
}

fn string_input<'a>(request: &'a SubmitRequest, key: &str) -> Result<&'a str, ProviderError> {
  request
    .inputs
    .get(key)
    .and_then(Value::as_str)
    .ok_or_else(|| ProviderError::InvalidRequest {
      resource: request.id.clone(),
      message: format!("input '{}' must be a string", key),
    })
}

/// 64-bit FNV-1a.
fn fnv1a(bytes: &[u8], seed: u64) -> u64 {
  bytes.iter().fold(0xcbf2_9ce4_8422_2325 ^ seed, |hash, b| {
    (hash ^ u64::from(*b)).wrapping_mul(0x0000_0100_0000_01b3)
  })
}

fn short_hash(id: &str) -> String {
  format!("{:010}", fnv1a(id.as_bytes(), 0) % 10_000_000_000)
}

fn digest(inputs: &Value) -> String {
  let bytes = inputs.to_string().into_bytes();
  (0..4).map(|seed| format!("{:016x}", fnv1a(&bytes, seed))).collect()
}
