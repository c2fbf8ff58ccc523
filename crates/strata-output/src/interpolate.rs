//! String templates over deferred values.
//!
//! Templates are rendered with minijinja once every referenced output has
//! resolved. Undefined variables are an error rather than an empty string, so
//! a missing input can never leak into a derived value.
//!
//! ```text
//! interpolate("url", "http://{{ dns_name }}", vec![("dns_name", lb_dns)])
//! interpolate("image", "{{ repository_url }}:latest", vec![("repository_url", repo_url)])
//! ```

use minijinja::{Environment, UndefinedBehavior};
use serde_json::Value;

use crate::error::OutputError;
use crate::output::Output;

/// Render `template` against named outputs once all of them have resolved.
pub fn interpolate(
  label: impl Into<String>,
  template: impl Into<String>,
  vars: Vec<(String, Output<Value>)>,
) -> Output<String> {
  let label = label.into();
  let template = template.into();
  let (names, outputs): (Vec<String>, Vec<Output<Value>>) = vars.into_iter().unzip();

  let error_label = label.clone();
  Output::try_combine(label, outputs, move |values| {
    let context: serde_json::Map<String, Value> = names.into_iter().zip(values).collect();
    render(&template, &Value::Object(context)).map_err(|message| OutputError::Derive {
      label: error_label,
      message,
    })
  })
}

/// Render a template against a fully known JSON context.
fn render(template: &str, context: &Value) -> Result<String, String> {
  let mut env = Environment::new();
  env.set_undefined_behavior(UndefinedBehavior::Strict);
  env
    .render_str(template, minijinja::Value::from_serialize(context))
    .map_err(|e| format!("failed to render '{}': {}", template, e))
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[tokio::test]
  async fn test_url_template() {
    let (producer, dns) = Output::<Value>::pending("alb.dns_name");
    let url = interpolate("url", "http://{{ dns_name }}", vec![("dns_name".to_string(), dns)]);

    assert!(url.try_get().is_none());
    producer.resolve(json!("demo-alb-1234.elb.local"));
    assert_eq!(url.get().await.unwrap(), "http://demo-alb-1234.elb.local");
  }

  #[tokio::test]
  async fn test_multiple_inputs() {
    let repo = Output::ready("repo", json!("123.dkr.ecr.local/demo-repo"));
    let tag = Output::ready("tag", json!("latest"));
    let image = interpolate(
      "image",
      "{{ repo }}:{{ tag }}",
      vec![("repo".to_string(), repo), ("tag".to_string(), tag)],
    );
    assert_eq!(image.get().await.unwrap(), "123.dkr.ecr.local/demo-repo:latest");
  }

  #[tokio::test]
  async fn test_undefined_variable_is_an_error() {
    let out = interpolate("broken", "http://{{ missing }}", vec![]);
    assert!(matches!(out.get().await, Err(OutputError::Derive { .. })));
  }

  #[tokio::test]
  async fn test_failed_input_propagates() {
    let (producer, dns) = Output::<Value>::pending("alb.dns_name");
    let url = interpolate("url", "http://{{ dns_name }}", vec![("dns_name".to_string(), dns)]);
    drop(producer);
    assert!(matches!(url.get().await, Err(OutputError::Unresolved { .. })));
  }
}
