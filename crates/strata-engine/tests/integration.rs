//! End-to-end provisioning of the application stack against the in-memory
//! backend.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use strata_backend::{MemoryBackend, ProviderError, SubmissionStatus};
use strata_config::{Config, ConfigResolver, ConfigSource, Variant};
use strata_engine::{
  ApplyError, ChannelNotifier, ProvisionEvent, Provisioner, ResourceError, TracingNotifier,
};
use strata_output::OutputError;
use strata_registry::CredentialError;
use strata_topology::{AppInfra, ResourceKind};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

fn config() -> Config {
  let source = ConfigSource::new()
    .with("name", "demo")
    .with("motd", "Hello, Pulumi!")
    .with("containerPort", 8080)
    .with("cpu", 256)
    .with("memory", 512);
  ConfigResolver::new(&source, Variant::Component)
    .resolve()
    .unwrap()
}

fn provisioner(backend: &Arc<MemoryBackend>) -> Provisioner<Arc<MemoryBackend>, Arc<MemoryBackend>> {
  Provisioner::new(backend.clone(), backend.clone())
}

#[tokio::test]
async fn test_up_exposes_url() {
  let backend = Arc::new(MemoryBackend::new());
  let app = AppInfra::new(&config()).unwrap();
  let url = app.url();

  let report = provisioner(&backend)
    .apply(app.into_topology(), CancellationToken::new())
    .await
    .unwrap();
  assert_eq!(report.created.len(), 18);
  assert!(report.unchanged.is_empty());

  let url = url.get().await.unwrap();
  let dns = report.outputs["demo-alb"]["dnsName"].as_str().unwrap();
  assert!(url.starts_with("http://") && url.len() > "http://".len());
  assert_eq!(url, format!("http://{}", dns));
}

#[tokio::test]
async fn test_task_definition_carries_config() {
  let backend = Arc::new(MemoryBackend::new());
  let app = AppInfra::new(&config()).unwrap();
  provisioner(&backend)
    .apply(app.into_topology(), CancellationToken::new())
    .await
    .unwrap();

  let task = backend.resource("demo-task").await.unwrap();
  assert_eq!(task.kind, ResourceKind::TaskDefinition);
  assert_eq!(task.inputs["cpu"], json!("256"));
  assert_eq!(task.inputs["memory"], json!("512"));

  let container = &task.inputs["containerDefinitions"][0];
  assert_eq!(
    container["environment"],
    json!([{"name": "MOTD", "value": "Hello, Pulumi!"}])
  );
  assert_eq!(
    container["portMappings"],
    json!([{"containerPort": 8080, "protocol": "tcp"}])
  );
  assert_eq!(
    container["image"],
    json!("123456789012.dkr.ecr.us-west-2.amazonaws.com/demo-repo:latest")
  );

  let target_group = backend.resource("demo-tg").await.unwrap();
  assert_eq!(target_group.inputs["port"], json!(8080));
  let service = backend.resource("demo-service").await.unwrap();
  assert_eq!(service.inputs["loadBalancers"][0]["containerPort"], json!(8080));
  let listener = backend.resource("demo-listener").await.unwrap();
  assert_eq!(listener.inputs["port"], json!(80));
}

#[tokio::test]
async fn test_submissions_follow_dependencies() {
  let backend = Arc::new(MemoryBackend::new().with_latency(Duration::from_millis(5)));
  let app = AppInfra::new(&config()).unwrap();
  let dependencies: HashMap<String, Vec<String>> = app
    .topology()
    .resources()
    .iter()
    .map(|r| (r.id.clone(), r.dependencies.iter().cloned().collect()))
    .collect();

  provisioner(&backend)
    .apply(app.into_topology(), CancellationToken::new())
    .await
    .unwrap();

  let log = backend.submissions().await;
  assert_eq!(log.len(), 18);
  let position: HashMap<&str, usize> = log
    .iter()
    .enumerate()
    .map(|(i, record)| (record.id.as_str(), i))
    .collect();
  for (id, deps) in &dependencies {
    for dep in deps {
      assert!(
        position[dep.as_str()] < position[id.as_str()],
        "{} submitted before its dependency {}",
        id,
        dep
      );
    }
  }

  let image = log.iter().find(|r| r.id == "demo-image").unwrap();
  assert_eq!(image.registry_user.as_deref(), Some("AWS"));
  assert!(log.iter().filter(|r| r.id != "demo-image").all(|r| r.registry_user.is_none()));
}

#[tokio::test]
async fn test_provider_failure_leaves_url_unresolved() {
  let backend = Arc::new(MemoryBackend::new().fail_on("demo-alb"));
  let app = AppInfra::new(&config()).unwrap();
  let url = app.url();

  let err = provisioner(&backend)
    .apply(app.into_topology(), CancellationToken::new())
    .await
    .unwrap_err();

  match &err {
    ApplyError::Failed {
      resource,
      source: ResourceError::Provider(ProviderError::Rejected { .. }),
      created,
    } => {
      assert_eq!(resource, "demo-alb");
      assert!(created.contains(&"demo-vpc".to_string()));
      assert!(!created.contains(&"demo-listener".to_string()));
    }
    other => panic!("unexpected error: {:?}", other),
  }

  assert!(matches!(url.get().await, Err(OutputError::Unresolved { .. })));

  // Created resources stay
  assert!(backend.resource("demo-vpc").await.is_some());
  let log = backend.submissions().await;
  assert!(log.iter().all(|r| r.id != "demo-listener" && r.id != "demo-service"));
}

#[tokio::test]
async fn test_expired_credential_halts_image_and_task() {
  let backend = Arc::new(MemoryBackend::new().with_token_ttl(chrono::Duration::minutes(-5)));
  let app = AppInfra::new(&config()).unwrap();

  let err = provisioner(&backend)
    .apply(app.into_topology(), CancellationToken::new())
    .await
    .unwrap_err();

  assert!(matches!(
    err,
    ApplyError::Failed {
      ref resource,
      source: ResourceError::Credential(CredentialError::Expired { .. }),
      ..
    } if resource == "demo-image"
  ));
  assert!(backend.resource("demo-repo").await.is_some());
  assert!(backend.resource("demo-image").await.is_none());
  assert!(backend.resource("demo-task").await.is_none());
}

#[tokio::test]
async fn test_reapply_against_restored_state_is_unchanged() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("state.json");

  let backend = Arc::new(MemoryBackend::new());
  let first_app = AppInfra::new(&config()).unwrap();
  let first_url = first_app.url();
  provisioner(&backend)
    .apply(first_app.into_topology(), CancellationToken::new())
    .await
    .unwrap();
  backend.save(&path).await.unwrap();

  let restored = Arc::new(MemoryBackend::load(&path).await.unwrap());
  let app = AppInfra::new(&config()).unwrap();
  let url = app.url();
  let report = provisioner(&restored)
    .apply(app.into_topology(), CancellationToken::new())
    .await
    .unwrap();

  assert!(report.created.is_empty());
  assert_eq!(report.unchanged.len(), 18);
  assert_eq!(url.get().await.unwrap(), first_url.get().await.unwrap());
  assert!(
    restored
      .submissions()
      .await
      .iter()
      .all(|r| r.status == Some(SubmissionStatus::Unchanged))
  );
}

#[tokio::test]
async fn test_changed_config_conflicts_with_existing_stack() {
  let backend = Arc::new(MemoryBackend::new());
  let app = AppInfra::new(&config()).unwrap();
  provisioner(&backend)
    .apply(app.into_topology(), CancellationToken::new())
    .await
    .unwrap();

  let mut changed = config();
  changed.motd = "Goodbye".to_string();
  let app = AppInfra::new(&changed).unwrap();
  let err = provisioner(&backend)
    .apply(app.into_topology(), CancellationToken::new())
    .await
    .unwrap_err();

  assert!(matches!(
    err,
    ApplyError::Failed {
      ref resource,
      source: ResourceError::Provider(ProviderError::Conflict { .. }),
      ..
    } if resource == "demo-task"
  ));
}

#[tokio::test]
async fn test_cancelled_before_start() {
  let backend = Arc::new(MemoryBackend::new());
  let app = AppInfra::new(&config()).unwrap();
  let url = app.url();

  let cancel = CancellationToken::new();
  cancel.cancel();
  let err = provisioner(&backend)
    .apply(app.into_topology(), cancel)
    .await
    .unwrap_err();

  assert!(matches!(err, ApplyError::Cancelled { ref created } if created.is_empty()));
  assert!(backend.submissions().await.is_empty());
  assert!(matches!(url.get().await, Err(OutputError::Unresolved { .. })));
}

#[tokio::test]
async fn test_cancelled_mid_run_keeps_created() {
  let backend = Arc::new(MemoryBackend::new().with_latency(Duration::from_millis(20)));
  let app = AppInfra::new(&config()).unwrap();

  let (tx, mut rx) = mpsc::unbounded_channel();
  let provisioner = provisioner(&backend).with_notifier(ChannelNotifier::new(tx));
  let cancel = CancellationToken::new();

  let canceller = cancel.clone();
  tokio::spawn(async move {
    while let Some(event) = rx.recv().await {
      if matches!(event, ProvisionEvent::ResourceCompleted { .. }) {
        canceller.cancel();
        break;
      }
    }
  });

  let err = provisioner
    .apply(app.into_topology(), cancel)
    .await
    .unwrap_err();

  match err {
    ApplyError::Cancelled { created } => {
      assert!(!created.is_empty());
      assert!(created.len() < 18);
      for id in &created {
        assert!(backend.resource(id).await.is_some());
      }
    }
    other => panic!("unexpected error: {:?}", other),
  }
  assert!(backend.resource("demo-service").await.is_none());
}

#[tokio::test]
async fn test_events() {
  let backend = Arc::new(MemoryBackend::new());
  let app = AppInfra::new(&config()).unwrap();
  let (tx, mut rx) = mpsc::unbounded_channel();

  let report = provisioner(&backend)
    .with_notifier(ChannelNotifier::new(tx))
    .apply(app.into_topology(), CancellationToken::new())
    .await
    .unwrap();

  let mut events = Vec::new();
  while let Ok(event) = rx.try_recv() {
    events.push(event);
  }

  assert!(matches!(
    events.first(),
    Some(ProvisionEvent::RunStarted { resources: 18, .. })
  ));
  assert!(matches!(
    events.last(),
    Some(ProvisionEvent::RunCompleted { run_id }) if *run_id == report.run_id
  ));
  let completed = events
    .iter()
    .filter(|e| matches!(e, ProvisionEvent::ResourceCompleted { .. }))
    .count();
  assert_eq!(completed, 18);
  assert!(events.iter().any(|e| matches!(
    e,
    ProvisionEvent::CredentialFetched { resource, registry_id, .. }
      if resource == "demo-image" && registry_id == "123456789012"
  )));
}

#[tokio::test]
async fn test_credential_fetch_reported_when_image_push_is_rejected() {
  let backend = Arc::new(MemoryBackend::new().fail_on("demo-image"));
  let app = AppInfra::new(&config()).unwrap();
  let (tx, mut rx) = mpsc::unbounded_channel();

  let err = provisioner(&backend)
    .with_notifier(ChannelNotifier::new(tx))
    .apply(app.into_topology(), CancellationToken::new())
    .await
    .unwrap_err();
  assert!(matches!(err, ApplyError::Failed { ref resource, .. } if resource == "demo-image"));

  let mut events = Vec::new();
  while let Ok(event) = rx.try_recv() {
    events.push(event);
  }

  let fetched = events.iter().position(|e| {
    matches!(e, ProvisionEvent::CredentialFetched { resource, .. } if resource == "demo-image")
  });
  let failed = events.iter().position(|e| {
    matches!(e, ProvisionEvent::ResourceFailed { resource, .. } if resource == "demo-image")
  });
  assert!(fetched.is_some(), "no credential event in {:?}", events);
  assert!(fetched < failed);

  let image = backend
    .submissions()
    .await
    .into_iter()
    .find(|r| r.id == "demo-image")
    .unwrap();
  assert_eq!(image.registry_user.as_deref(), Some("AWS"));
  assert!(image.status.is_none());
}

#[tokio::test]
async fn test_standalone_variant() {
  let source = ConfigSource::new().with("motd", "hi");
  let config = ConfigResolver::new(&source, Variant::Standalone)
    .resolve()
    .unwrap();
  assert_eq!(config.memory, 128);

  let backend = Arc::new(MemoryBackend::new());
  let app = AppInfra::new(&config).unwrap();
  let url = app.url();
  provisioner(&backend)
    .with_notifier(TracingNotifier)
    .apply(app.into_topology(), CancellationToken::new())
    .await
    .unwrap();

  assert!(url.get().await.unwrap().starts_with("http://app-alb-"));
  let task = backend.resource("app-task").await.unwrap();
  assert_eq!(task.inputs["memory"], json!("128"));
}
