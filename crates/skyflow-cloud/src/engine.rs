//! The convergence engine
//!
//! One generic state machine drives every resource kind:
//!
//! ```text
//!  Unobserved ──observe──▶ Missing ──create──▶ Unobserved
//!       │                                          ▲
//!       ├────observe──▶ Outdated ──update──────────┘
//!       │
//!       └────observe──▶ Converged
//!
//!  any state but Gone ──delete──▶ Deleting ──▶ Gone
//! ```
//!
//! Every remote call is bounded by the configured timeout and the caller's
//! cancellation token. Nothing is retried here; the caller's next tick is the
//! retry.

use crate::action::{ActionType, ReconcileOutcome, ReconcileSummary};
use crate::admission::{ImmutableField, validate_recorded_zone, validate_update};
use crate::deletion::DeletionPolicyResolver;
use crate::drift::{DriftOptions, is_up_to_date};
use crate::error::{CloudError, Result};
use crate::model::{
    Annotations, DesiredSpec, EXTERNAL_ID_ANNOTATION, Identity, ObservedState, ZONE_ANNOTATION,
};
use crate::provider::{RemoteClient, ResourceAdapter, SchemaSource};
use crate::settings::set_defaults;
use crate::state::{ConvergenceState, Verdict};
use crate::zones;
use futures_util::StreamExt;
use serde_json::Value;
use skyflow_config::EngineConfig;
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Run one remote call under the cancellation token and the operation timeout
pub(crate) async fn guarded<T, F>(
    operation: &str,
    cancel: &CancellationToken,
    timeout: Duration,
    call: F,
) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tracing::debug!("Remote call: {}", operation);
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(CloudError::Cancelled(operation.to_string())),
        outcome = tokio::time::timeout(timeout, call) => match outcome {
            Ok(result) => result.map_err(|e| e.during(operation)),
            Err(_) => Err(CloudError::Timeout(format!(
                "{} did not finish within {:?}",
                operation, timeout
            ))),
        },
    }
}

/// Converges declared resources of one kind against the remote API
pub struct ConvergenceEngine<A: ResourceAdapter, C: RemoteClient<A>> {
    adapter: A,
    client: Arc<C>,
    schemas: Arc<dyn SchemaSource>,
    config: EngineConfig,
}

impl<A: ResourceAdapter, C: RemoteClient<A>> ConvergenceEngine<A, C> {
    pub fn new(adapter: A, client: Arc<C>, schemas: Arc<dyn SchemaSource>) -> Self {
        Self {
            adapter,
            client,
            schemas,
            config: EngineConfig::default(),
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Start a pass over one declared resource. Fails without touching the
    /// remote side when the declaration cannot be converted, names an
    /// unknown zone, or moves an existing resource to another zone.
    pub fn instance<'e, 'r>(
        &'e self,
        resource: &'r A::Resource,
    ) -> Result<ResourceInstance<'e, 'r, A, C>> {
        let desired = self.adapter.to_desired_spec(resource)?;
        zones::resolve(&desired.zone, &self.config)?;

        let meta = self.adapter.meta(resource);
        let zone_fixed = !self.config.ignore_zone_drift
            && self.adapter.immutable_fields().contains(&ImmutableField::Zone);

        // a deletion goes to wherever the resource was recorded
        let zone = match meta.recorded_zone() {
            Some(recorded) if zone_fixed && meta.deletion_requested => recorded.to_string(),
            recorded => {
                if zone_fixed {
                    validate_recorded_zone(recorded, &desired.zone)?;
                }
                desired.zone.clone()
            }
        };

        let mut identity = Identity::new(self.adapter.kind(), &desired.name, zone);
        if let Some(id) = meta.external_id() {
            identity.external_id = Some(id.to_string());
        }

        Ok(ResourceInstance {
            engine: self,
            resource,
            desired,
            identity,
            state: ConvergenceState::Unobserved,
            observed: None,
            verdict: None,
            annotations: Annotations::new(),
        })
    }

    /// One reconciliation tick: observe, then drive exactly one corrective action
    pub async fn reconcile(
        &self,
        resource: &A::Resource,
        cancel: &CancellationToken,
    ) -> Result<ReconcileOutcome> {
        let start = Instant::now();
        let mut instance = self.instance(resource)?;

        let action = if self.adapter.meta(resource).deletion_requested {
            instance.delete(cancel).await?;
            ActionType::Delete
        } else {
            match instance.observe(cancel).await? {
                ConvergenceState::Missing => {
                    instance.create(cancel).await?;
                    ActionType::Create
                }
                ConvergenceState::Outdated => {
                    instance.update(cancel).await?;
                    ActionType::Update
                }
                _ => ActionType::NoOp,
            }
        };

        Ok(instance.into_outcome(action, start.elapsed()))
    }

    /// Reconcile many resources, up to `concurrency` at a time. Two resources
    /// resolving to the same identity are never converged in the same batch.
    pub async fn reconcile_all(
        &self,
        resources: &[A::Resource],
        concurrency: usize,
        cancel: &CancellationToken,
    ) -> ReconcileSummary {
        let start = Instant::now();
        let mut summary = ReconcileSummary::new();
        let mut seen = HashSet::new();
        let mut batch = Vec::new();

        for resource in resources {
            let key = match self.adapter.to_desired_spec(resource) {
                Ok(spec) => Identity::new(self.adapter.kind(), spec.name, spec.zone).key(),
                Err(e) => {
                    summary.add_failure(self.adapter.meta(resource).name.clone(), e.to_string());
                    continue;
                }
            };
            if !seen.insert(key.clone()) {
                summary.add_failure(
                    self.adapter.meta(resource).name.clone(),
                    format!("duplicate identity {} in batch", key),
                );
                continue;
            }
            batch.push(resource);
        }

        let mut results = futures_util::stream::iter(batch)
            .map(|resource| async move {
                let name = self.adapter.meta(resource).name.clone();
                (name, self.reconcile(resource, cancel).await)
            })
            .buffer_unordered(concurrency.max(1));

        while let Some((name, result)) = results.next().await {
            match result {
                Ok(outcome) => summary.add_outcome(outcome),
                Err(e) => {
                    tracing::warn!("Reconciliation of {} failed: {}", name, e);
                    summary.add_failure(name, e.to_string());
                }
            }
        }

        summary.duration_ms = start.elapsed().as_millis() as u64;
        summary
    }
}

/// State of one resource instance during a single pass
pub struct ResourceInstance<'e, 'r, A: ResourceAdapter, C: RemoteClient<A>> {
    engine: &'e ConvergenceEngine<A, C>,
    resource: &'r A::Resource,
    desired: DesiredSpec,
    identity: Identity,
    state: ConvergenceState,
    observed: Option<ObservedState>,
    verdict: Option<Verdict>,
    annotations: Annotations,
}

impl<'e, 'r, A: ResourceAdapter, C: RemoteClient<A>> ResourceInstance<'e, 'r, A, C> {
    pub fn state(&self) -> ConvergenceState {
        self.state
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn desired(&self) -> &DesiredSpec {
        &self.desired
    }

    pub fn observed(&self) -> Option<&ObservedState> {
        self.observed.as_ref()
    }

    pub fn verdict(&self) -> Option<&Verdict> {
        self.verdict.as_ref()
    }

    /// Values the caller must persist on the declared resource
    pub fn annotations(&self) -> &Annotations {
        &self.annotations
    }

    async fn call<T>(
        &self,
        operation: &str,
        cancel: &CancellationToken,
        call: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        guarded(operation, cancel, self.engine.config.operation_timeout(), call).await
    }

    /// Ask the caller to persist the zone unless it already holds that value
    fn record_zone(&mut self, zone: &str) {
        let resource = self.resource;
        let meta = self.engine.adapter.meta(resource);
        if !zone.is_empty() && meta.recorded_zone() != Some(zone) {
            self.annotations
                .insert(ZONE_ANNOTATION.to_string(), zone.to_string());
        }
    }

    fn transition(&mut self, next: ConvergenceState) {
        if self.state != next {
            tracing::debug!("{}: {} -> {}", self.identity, self.state, next);
        }
        self.state = next;
    }

    /// Fetch the remote counterpart and decide Missing, Outdated or Converged.
    /// Transport errors leave the state untouched.
    pub async fn observe(&mut self, cancel: &CancellationToken) -> Result<ConvergenceState> {
        if matches!(self.state, ConvergenceState::Deleting | ConvergenceState::Gone) {
            return Err(CloudError::InvalidTransition {
                operation: "observe",
                state: self.state,
            });
        }

        let engine = self.engine;
        let fetched = self
            .call("observe", cancel, engine.client.get(&self.identity))
            .await;
        let remote = match fetched {
            Ok(remote) => remote,
            Err(e) if e.is_not_found() => {
                tracing::info!("{} does not exist", self.identity);
                self.observed = None;
                self.verdict = Some(Verdict::missing());
                self.transition(ConvergenceState::Missing);
                return Ok(self.state);
            }
            Err(e) => return Err(e),
        };

        let observed = engine.adapter.to_observed_state(&remote)?;
        if self.identity.external_id.is_none() {
            self.identity.external_id = observed.id.clone();
        }
        self.record_zone(&observed.spec.zone);

        let (desired, actual) = self.normalize_settings(&observed.spec, cancel).await?;
        let options = DriftOptions {
            ignore_zone: engine.config.ignore_zone_drift,
        };
        let verdict = is_up_to_date(&desired, &actual, options);

        if verdict.up_to_date {
            tracing::debug!("{} is up to date", self.identity);
        } else {
            tracing::info!("{} drifted:\n{}", self.identity, verdict.diff);
        }

        let next = verdict.state();
        self.observed = Some(observed);
        self.verdict = Some(verdict);
        self.transition(next);
        Ok(next)
    }

    /// Fill schema defaults into the desired settings and into the observed
    /// settings they are compared with
    async fn normalize_settings(
        &self,
        observed: &DesiredSpec,
        cancel: &CancellationToken,
    ) -> Result<(DesiredSpec, DesiredSpec)> {
        let mut desired = self.desired.clone();
        let mut actual = observed.clone();
        if desired.settings.is_empty() {
            return Ok((desired, actual));
        }

        let kind = self.engine.adapter.schema_kind().ok_or_else(|| {
            CloudError::InvalidConfig(format!(
                "{} resources do not accept settings",
                self.engine.adapter.kind()
            ))
        })?;
        let schemas = self
            .call("fetch-schema", cancel, self.engine.schemas.fetch_schema(kind))
            .await?;

        let empty = Value::Object(Default::default());
        for (name, document) in desired.settings.iter_mut() {
            *document = set_defaults(&schemas, name, document)?;
            let remote = observed.settings.get(name).unwrap_or(&empty);
            actual
                .settings
                .insert(name.clone(), set_defaults(&schemas, name, remote)?);
        }

        Ok((desired, actual))
    }

    /// Create the remote counterpart. A concurrent or repeated create that
    /// finds the resource already there counts as success.
    pub async fn create(&mut self, cancel: &CancellationToken) -> Result<ConvergenceState> {
        if !self.state.can_create() {
            return Err(CloudError::InvalidTransition {
                operation: "create",
                state: self.state,
            });
        }

        let engine = self.engine;
        let request = engine.adapter.build_create_request(&self.desired)?;

        let created = self
            .call("create", cancel, engine.client.create(&request))
            .await;
        match created {
            Ok(id) => {
                tracing::info!("Created {} (id: {})", self.identity, id);
                self.annotations
                    .insert(EXTERNAL_ID_ANNOTATION.to_string(), id.to_string());
                self.identity.external_id = Some(id.0);
                let zone = self.desired.zone.clone();
                self.record_zone(&zone);
            }
            Err(e) if e.is_already_exists() => {
                tracing::info!("{} already exists, treating create as done", self.identity);
            }
            Err(e) => return Err(e),
        }

        self.transition(ConvergenceState::Unobserved);
        Ok(self.state)
    }

    /// Push the full desired configuration. Immutable-field changes are
    /// rejected before anything is sent.
    pub async fn update(&mut self, cancel: &CancellationToken) -> Result<ConvergenceState> {
        if !self.state.can_update() {
            return Err(CloudError::InvalidTransition {
                operation: "update",
                state: self.state,
            });
        }

        let engine = self.engine;
        let current = self
            .observed
            .as_ref()
            .map(|observed| &observed.spec)
            .ok_or(CloudError::InvalidTransition {
                operation: "update",
                state: self.state,
            })?;
        validate_update(current, &self.desired, engine.adapter.immutable_fields())?;

        let request = engine.adapter.build_update_request(&self.desired)?;
        self.call("update", cancel, engine.client.update(&self.identity, &request))
            .await?;

        tracing::info!("Updated {}", self.identity);
        self.transition(ConvergenceState::Unobserved);
        Ok(self.state)
    }

    /// Remove the remote counterpart. Already-absent counts as success.
    pub async fn delete(&mut self, cancel: &CancellationToken) -> Result<ConvergenceState> {
        if !self.state.can_delete() {
            return Err(CloudError::InvalidTransition {
                operation: "delete",
                state: self.state,
            });
        }

        let engine = self.engine;
        self.transition(ConvergenceState::Deleting);

        if let Some(policy) = engine.adapter.deletion_policy(self.resource) {
            let resolver =
                DeletionPolicyResolver::<A, C>::new(engine.client.as_ref(), &engine.config, cancel);
            let prepared = resolver.prepare(policy, &self.identity).await;
            match prepared {
                Ok(_) => {}
                Err(e) if e.is_not_found() => {
                    tracing::info!("{} is already gone", self.identity);
                    self.transition(ConvergenceState::Gone);
                    return Ok(self.state);
                }
                Err(e) => return Err(e),
            }
        }

        let deleted = self
            .call("delete", cancel, engine.client.delete(&self.identity))
            .await;
        match deleted {
            Ok(()) => tracing::info!("Deleted {}", self.identity),
            Err(e) if e.is_not_found() => {
                tracing::info!("{} is already gone", self.identity);
            }
            Err(e) => return Err(e),
        }

        self.transition(ConvergenceState::Gone);
        Ok(self.state)
    }

    fn into_outcome(self, action: ActionType, elapsed: Duration) -> ReconcileOutcome {
        ReconcileOutcome {
            identity: self.identity,
            action,
            state: self.state,
            diff: self
                .verdict
                .map(|verdict| verdict.diff)
                .unwrap_or_default(),
            annotations: self.annotations,
            observed: self.observed,
            duration_ms: elapsed.as_millis() as u64,
        }
    }
}
