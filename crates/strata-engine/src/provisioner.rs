//! Dependency-ordered provisioning.
//!
//! The `Provisioner` submits resources in waves: every resource whose
//! dependencies have all completed is spawned onto the runtime, the wave is
//! joined, and each successful resource's output cell is resolved before the
//! next wave is selected. Independent resources therefore run concurrently,
//! and nothing is submitted before the resources it reads from exist.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use strata_backend::{ProvisioningBackend, SubmitRequest, Submission, SubmissionStatus};
use strata_output::{Attributes, Output, OutputError, Producer};
use strata_registry::{RegistryCredentialBridge, TokenSource};
use strata_topology::{ResourceId, ResourceKind, Topology};
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{ApplyError, ResourceError};
use crate::events::{NoopNotifier, ProvisionEvent, ProvisionNotifier};

/// Input carrying the registry a pushed image belongs to.
const REGISTRY_ID_INPUT: &str = "registryId";

/// Outcome of a successful run.
#[derive(Debug, Clone, Serialize)]
pub struct ApplyReport {
  pub run_id: String,
  pub owner: String,
  pub created: Vec<ResourceId>,
  pub unchanged: Vec<ResourceId>,
  /// Completion order.
  pub order: Vec<ResourceId>,
  pub outputs: BTreeMap<ResourceId, Attributes>,
}

/// Provisions topologies against a backend.
///
/// Generic over `N: ProvisionNotifier` like the event consumers it feeds.
/// Use [`with_notifier`](Provisioner::with_notifier) to observe a run.
pub struct Provisioner<B, S, N: ProvisionNotifier = NoopNotifier> {
  backend: Arc<B>,
  bridge: Arc<RegistryCredentialBridge<S>>,
  notifier: N,
}

impl<B, S> Provisioner<B, S, NoopNotifier>
where
  B: ProvisioningBackend + 'static,
  S: TokenSource + 'static,
{
  /// Create a provisioner that reports nothing.
  pub fn new(backend: B, token_source: S) -> Self {
    Self {
      backend: Arc::new(backend),
      bridge: Arc::new(RegistryCredentialBridge::new(token_source)),
      notifier: NoopNotifier,
    }
  }
}

/// A resource ready to be submitted, with everything its task needs.
struct Job {
  id: ResourceId,
  kind: ResourceKind,
  inputs: Output<Value>,
}

/// What a finished submission task reports back.
struct Outcome {
  /// Set once a push credential was fetched, whatever the submission did.
  registry_id: Option<String>,
  result: Result<Submission, ResourceError>,
}

/// Bookkeeping for one run.
struct Run {
  run_id: String,
  producers: HashMap<ResourceId, Producer<Attributes>>,
  done: HashSet<ResourceId>,
  created: Vec<ResourceId>,
  unchanged: Vec<ResourceId>,
  order: Vec<ResourceId>,
  outputs: BTreeMap<ResourceId, Attributes>,
}

impl<B, S, N> Provisioner<B, S, N>
where
  B: ProvisioningBackend + 'static,
  S: TokenSource + 'static,
  N: ProvisionNotifier,
{
  /// Report run and resource events to `notifier`.
  pub fn with_notifier<M: ProvisionNotifier>(self, notifier: M) -> Provisioner<B, S, M> {
    Provisioner {
      backend: self.backend,
      bridge: self.bridge,
      notifier,
    }
  }

  /// The backend resources are submitted to.
  pub fn backend(&self) -> &B {
    &self.backend
  }

  /// Provision every resource of the topology.
  ///
  /// The first failing resource ends the run once its wave has joined. Its
  /// dependents are never submitted and their output cells fail with
  /// `Unresolved`. Created resources are reported, never rolled back.
  pub async fn apply(
    &self,
    mut topology: Topology,
    cancel: CancellationToken,
  ) -> Result<ApplyReport, ApplyError> {
    let run_id = uuid::Uuid::new_v4().to_string();

    // Reject an unorderable topology before anything is submitted
    topology.order()?;

    self.notifier.notify(ProvisionEvent::RunStarted {
      run_id: run_id.clone(),
      owner: topology.owner().to_string(),
      resources: topology.len(),
    });
    info!(run_id = %run_id, owner = %topology.owner(), resources = topology.len(), "starting provisioning run");

    let mut run = Run {
      run_id: run_id.clone(),
      producers: topology.take_producers(),
      done: HashSet::new(),
      created: Vec::new(),
      unchanged: Vec::new(),
      order: Vec::new(),
      outputs: BTreeMap::new(),
    };

    let result = self.run_waves(&topology, &mut run, &cancel).await;

    // Whatever was not provisioned can never resolve
    run.producers.clear();

    match result {
      Ok(()) => {
        self.notifier.notify(ProvisionEvent::RunCompleted {
          run_id: run_id.clone(),
        });
        info!(
          run_id = %run_id,
          created = run.created.len(),
          unchanged = run.unchanged.len(),
          "provisioning run completed"
        );
        Ok(ApplyReport {
          run_id,
          owner: topology.owner().to_string(),
          created: run.created,
          unchanged: run.unchanged,
          order: run.order,
          outputs: run.outputs,
        })
      }
      Err(e) => {
        self.notifier.notify(ProvisionEvent::RunFailed {
          run_id: run_id.clone(),
          error: e.to_string(),
        });
        warn!(run_id = %run_id, error = %e, created = e.created().len(), "provisioning run aborted");
        Err(e)
      }
    }
  }

  async fn run_waves(
    &self,
    topology: &Topology,
    run: &mut Run,
    cancel: &CancellationToken,
  ) -> Result<(), ApplyError> {
    let graph = topology.graph();

    loop {
      if cancel.is_cancelled() {
        return Err(ApplyError::Cancelled {
          created: run.created.clone(),
        });
      }

      let ready: Vec<&ResourceId> = topology
        .resources()
        .iter()
        .map(|r| &r.id)
        .filter(|id| !run.done.contains(*id))
        .filter(|id| graph.upstream(id).iter().all(|up| run.done.contains(up)))
        .collect();
      if ready.is_empty() {
        break;
      }
      debug!(run_id = %run.run_id, wave = ?ready, "submitting wave");

      let mut ids = Vec::with_capacity(ready.len());
      let mut handles = Vec::with_capacity(ready.len());
      for id in ready {
        let resource = topology
          .get(id)
          .ok_or_else(|| strata_topology::TopologyError::ResourceNotFound(id.clone()))?;
        let inputs = topology
          .resolve_inputs(id)
          .ok_or_else(|| strata_topology::TopologyError::ResourceNotFound(id.clone()))?;

        self.notifier.notify(ProvisionEvent::ResourceStarted {
          run_id: run.run_id.clone(),
          resource: id.clone(),
          kind: resource.kind,
        });

        let job = Job {
          id: id.clone(),
          kind: resource.kind,
          inputs,
        };
        ids.push(id.clone());
        handles.push(self.spawn(job));
      }

      let aborts: Vec<_> = handles.iter().map(JoinHandle::abort_handle).collect();
      let joined = futures::future::join_all(handles);
      tokio::pin!(joined);
      let results = tokio::select! {
        results = &mut joined => results,
        _ = cancel.cancelled() => {
          aborts.iter().for_each(|a| a.abort());
          // Submissions that finished before the abort still exist
          let results = joined.await;
          self.settle(run, ids, results);
          return Err(ApplyError::Cancelled { created: run.created.clone() });
        }
      };

      if let Some((resource, source)) = self.settle(run, ids, results) {
        return Err(ApplyError::Failed {
          resource,
          source,
          created: run.created.clone(),
        });
      }
    }

    Ok(())
  }

  fn spawn(&self, job: Job) -> JoinHandle<Outcome> {
    let backend = self.backend.clone();
    let bridge = self.bridge.clone();
    tokio::spawn(async move { submit(job, backend, bridge).await })
  }

  /// Record every finished task of a wave.
  ///
  /// Returns the first failure in declaration order. Tasks aborted before
  /// they finished are skipped.
  fn settle(
    &self,
    run: &mut Run,
    ids: Vec<ResourceId>,
    results: Vec<Result<Outcome, JoinError>>,
  ) -> Option<(ResourceId, ResourceError)> {
    let mut first_failure = None;
    for (id, joined) in ids.into_iter().zip(results) {
      let outcome = match joined {
        Ok(outcome) => outcome,
        Err(e) if e.is_cancelled() => continue,
        Err(e) => Outcome {
          registry_id: None,
          result: Err(ResourceError::Task(e.to_string())),
        },
      };

      if let Some(registry_id) = outcome.registry_id {
        self.notifier.notify(ProvisionEvent::CredentialFetched {
          run_id: run.run_id.clone(),
          resource: id.clone(),
          registry_id,
        });
      }

      match outcome.result {
        Ok(submission) => self.complete(run, id, submission),
        Err(e) => {
          self.notifier.notify(ProvisionEvent::ResourceFailed {
            run_id: run.run_id.clone(),
            resource: id.clone(),
            error: e.to_string(),
          });
          if first_failure.is_none() {
            first_failure = Some((id, e));
          }
        }
      }
    }
    first_failure
  }

  /// Record a successful submission and resolve the resource's output cell.
  fn complete(&self, run: &mut Run, id: ResourceId, submission: Submission) {
    self.notifier.notify(ProvisionEvent::ResourceCompleted {
      run_id: run.run_id.clone(),
      resource: id.clone(),
      status: submission.status,
      attributes: Value::Object(submission.attributes.clone()),
    });

    if let Some(producer) = run.producers.remove(&id) {
      producer.resolve(submission.attributes.clone());
    }
    match submission.status {
      SubmissionStatus::Created => run.created.push(id.clone()),
      SubmissionStatus::Unchanged => run.unchanged.push(id.clone()),
    }
    run.done.insert(id.clone());
    run.order.push(id.clone());
    run.outputs.insert(id, submission.attributes);
  }
}

/// Run one resource's submission, keeping track of the registry it fetched
/// a credential for even when the push itself fails.
async fn submit<B, S>(
  job: Job,
  backend: Arc<B>,
  bridge: Arc<RegistryCredentialBridge<S>>,
) -> Outcome
where
  B: ProvisioningBackend,
  S: TokenSource,
{
  let mut registry_id = None;
  let result = push(job, &*backend, &bridge, &mut registry_id).await;
  Outcome {
    registry_id,
    result,
  }
}

/// Resolve a resource's inputs, fetch a push credential if it needs one,
/// and submit it.
async fn push<B, S>(
  job: Job,
  backend: &B,
  bridge: &RegistryCredentialBridge<S>,
  registry_id: &mut Option<String>,
) -> Result<Submission, ResourceError>
where
  B: ProvisioningBackend,
  S: TokenSource,
{
  let inputs = job.inputs.get().await?;
  let mut request = SubmitRequest::new(job.id.clone(), job.kind, inputs);

  if job.kind.needs_registry_credential() {
    let id = request
      .inputs
      .get(REGISTRY_ID_INPUT)
      .and_then(Value::as_str)
      .map(str::to_string)
      .ok_or_else(|| OutputError::MissingAttribute {
        label: job.id.clone(),
        attribute: REGISTRY_ID_INPUT.to_string(),
      })?;
    let credential = bridge.fetch(&id).await?;
    request = request.with_credential(credential);
    *registry_id = Some(id);
  }

  Ok(backend.submit(request).await?)
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::Mutex;
  use std::sync::atomic::{AtomicUsize, Ordering};
  use std::time::Duration;

  use async_trait::async_trait;
  use serde_json::json;
  use strata_backend::ProviderError;
  use strata_registry::StaticTokenSource;
  use strata_topology::{Input, Resource};

  /// Records submissions and the highest number seen in flight at once.
  #[derive(Default)]
  struct MockBackend {
    submitted: Mutex<Vec<(ResourceId, Value)>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    delays: HashMap<ResourceId, Duration>,
  }

  impl MockBackend {
    fn with_delay(mut self, id: &str, delay: Duration) -> Self {
      self.delays.insert(id.to_string(), delay);
      self
    }

    fn submitted_ids(&self) -> Vec<ResourceId> {
      self
        .submitted
        .lock()
        .unwrap()
        .iter()
        .map(|(id, _)| id.clone())
        .collect()
    }
  }

  #[async_trait]
  impl ProvisioningBackend for MockBackend {
    async fn submit(&self, request: SubmitRequest) -> Result<Submission, ProviderError> {
      let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
      self.max_in_flight.fetch_max(now, Ordering::SeqCst);
      let delay = self
        .delays
        .get(&request.id)
        .copied()
        .unwrap_or(Duration::from_millis(10));
      tokio::time::sleep(delay).await;
      self.in_flight.fetch_sub(1, Ordering::SeqCst);

      self
        .submitted
        .lock()
        .unwrap()
        .push((request.id.clone(), request.inputs.clone()));
      let mut attributes = Attributes::new();
      attributes.insert("id".to_string(), json!(format!("{}-id", request.id)));
      Ok(Submission {
        attributes,
        status: SubmissionStatus::Created,
      })
    }
  }

  fn topology() -> Topology {
    let mut topology = Topology::new("demo");
    topology
      .add(Resource::new("demo-vpc", ResourceKind::Vpc))
      .unwrap();
    for i in 1..=3 {
      topology
        .add(
          Resource::new(format!("demo-subnet-{}", i), ResourceKind::Subnet)
            .input("vpcId", Input::attr("demo-vpc", "id")),
        )
        .unwrap();
    }
    topology
  }

  #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
  async fn test_independent_resources_run_concurrently() {
    let backend = Arc::new(MockBackend::default());
    let provisioner = Provisioner::new(backend.clone(), StaticTokenSource::new());

    let report = provisioner
      .apply(topology(), CancellationToken::new())
      .await
      .unwrap();

    assert_eq!(report.order[0], "demo-vpc");
    assert_eq!(report.created.len(), 4);
    assert_eq!(backend.max_in_flight.load(Ordering::SeqCst), 3);

    let submitted = backend.submitted.lock().unwrap();
    assert_eq!(submitted[0].0, "demo-vpc");
    assert!(
      submitted[1..]
        .iter()
        .all(|(_, inputs)| inputs == &json!({"vpcId": "demo-vpc-id"}))
    );
  }

  #[tokio::test]
  async fn test_image_without_registry_fails_inputs() {
    let backend = Arc::new(MockBackend::default());
    let provisioner = Provisioner::new(backend.clone(), StaticTokenSource::new());

    let mut topology = Topology::new("demo");
    topology
      .add(Resource::new("demo-image", ResourceKind::Image).input("imageName", "repo:latest"))
      .unwrap();

    let err = provisioner
      .apply(topology, CancellationToken::new())
      .await
      .unwrap_err();
    assert!(matches!(
      err,
      ApplyError::Failed {
        source: ResourceError::Inputs(OutputError::MissingAttribute { .. }),
        ..
      }
    ));
    assert!(backend.submitted.lock().unwrap().is_empty());
  }

  #[tokio::test]
  async fn test_unknown_registry_fails_lookup() {
    let backend = Arc::new(MockBackend::default());
    let provisioner = Provisioner::new(backend.clone(), StaticTokenSource::new());

    let mut topology = Topology::new("demo");
    topology
      .add(
        Resource::new("demo-image", ResourceKind::Image)
          .input("imageName", "repo:latest")
          .input("registryId", "000000000000"),
      )
      .unwrap();

    let err = provisioner
      .apply(topology, CancellationToken::new())
      .await
      .unwrap_err();
    assert!(matches!(
      err,
      ApplyError::Failed {
        source: ResourceError::Credential(strata_registry::CredentialError::Lookup { .. }),
        ..
      }
    ));
    assert!(err.created().is_empty());
  }

  #[tokio::test]
  async fn test_cancel_reports_resources_finished_in_the_same_wave() {
    let backend = Arc::new(
      MockBackend::default()
        .with_delay("demo-fast", Duration::ZERO)
        .with_delay("demo-slow", Duration::from_millis(500)),
    );
    let provisioner = Provisioner::new(backend.clone(), StaticTokenSource::new());

    let mut topology = Topology::new("demo");
    topology
      .add(Resource::new("demo-fast", ResourceKind::Vpc))
      .unwrap();
    topology
      .add(Resource::new("demo-slow", ResourceKind::Cluster))
      .unwrap();

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
      tokio::time::sleep(Duration::from_millis(100)).await;
      trigger.cancel();
    });

    let err = provisioner.apply(topology, cancel).await.unwrap_err();
    assert_eq!(backend.submitted_ids(), vec!["demo-fast".to_string()]);
    match err {
      ApplyError::Cancelled { created } => assert_eq!(created, vec!["demo-fast".to_string()]),
      other => panic!("unexpected error: {:?}", other),
    }
  }
}
