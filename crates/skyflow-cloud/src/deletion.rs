//! Deletion policies for container resources (e.g. object-storage buckets)
//!
//! `EmptyOnly` refuses to delete a container that still holds objects.
//! `Recursive` empties it first: a producer pages through the listing and
//! feeds a bounded channel while a consumer removes objects with bounded
//! concurrency, so listing and removal overlap and the full listing is never
//! held in memory.

use crate::engine::guarded;
use crate::error::{CloudError, Result};
use crate::model::Identity;
use crate::provider::{ObjectRef, RemoteClient, ResourceAdapter};
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use skyflow_config::EngineConfig;
use std::marker::PhantomData;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeletionPolicy {
    /// Delete only when the container holds nothing
    #[default]
    #[serde(alias = "DeleteIfEmpty")]
    EmptyOnly,
    /// Remove every contained object, then the container
    #[serde(alias = "DeleteAll")]
    Recursive,
}

impl std::fmt::Display for DeletionPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeletionPolicy::EmptyOnly => write!(f, "empty-only"),
            DeletionPolicy::Recursive => write!(f, "recursive"),
        }
    }
}

/// Counters from one recursive sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub removed: usize,
    pub failed: usize,
    /// Listing entries that could not be read
    pub skipped: usize,
}

/// Prepares a container for deletion according to its policy
pub struct DeletionPolicyResolver<'a, A: ResourceAdapter, C: RemoteClient<A>> {
    client: &'a C,
    config: &'a EngineConfig,
    cancel: &'a CancellationToken,
    _adapter: PhantomData<fn() -> A>,
}

impl<'a, A: ResourceAdapter, C: RemoteClient<A>> DeletionPolicyResolver<'a, A, C> {
    pub fn new(client: &'a C, config: &'a EngineConfig, cancel: &'a CancellationToken) -> Self {
        Self {
            client,
            config,
            cancel,
            _adapter: PhantomData,
        }
    }

    /// Make the container deletable; the container itself is left in place
    pub async fn prepare(&self, policy: DeletionPolicy, identity: &Identity) -> Result<SweepReport> {
        tracing::debug!("Preparing {} for deletion ({})", identity, policy);
        match policy {
            DeletionPolicy::EmptyOnly => {
                self.ensure_empty(identity).await?;
                Ok(SweepReport::default())
            }
            DeletionPolicy::Recursive => {
                let locked = self.probe_lock(identity).await?;
                self.sweep(identity, locked).await
            }
        }
    }

    async fn ensure_empty(&self, identity: &Identity) -> Result<()> {
        let page = guarded(
            "list-objects",
            self.cancel,
            self.config.operation_timeout(),
            self.client.list_contained_objects(identity, None),
        )
        .await?;

        // an empty page that points at a next one still means objects may follow
        if !page.is_empty() || page.next.is_some() {
            return Err(CloudError::NotEmpty(format!(
                "{} still holds {} or more object(s)",
                identity,
                page.entries.len().max(1)
            )));
        }
        Ok(())
    }

    /// Whether a protective lock is active; "no lock configured" counts as unlocked
    pub async fn probe_lock(&self, identity: &Identity) -> Result<bool> {
        match guarded(
            "lock-state",
            self.cancel,
            self.config.operation_timeout(),
            self.client.get_lock_state(identity),
        )
        .await
        {
            Ok(locked) => Ok(locked),
            Err(CloudError::NoLockConfigured(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Remove every contained object. Individual failures do not stop the
    /// sweep; the first one is returned once every object was attempted.
    pub async fn sweep(&self, identity: &Identity, bypass_lock: bool) -> Result<SweepReport> {
        let timeout = self.config.operation_timeout();
        let capacity = self.config.deletion.channel_capacity.max(1);
        let concurrency = self.config.deletion.concurrency.max(1);
        let client = self.client;
        let cancel = self.cancel;

        if bypass_lock {
            tracing::info!("{} has an active lock, removing objects with lock bypass", identity);
        }

        let (tx, rx) = mpsc::channel::<ObjectRef>(capacity);

        let producer = async move {
            let mut continuation = None;
            let mut skipped = 0usize;

            let listing = 'pages: loop {
                let page = match guarded(
                    "list-objects",
                    cancel,
                    timeout,
                    client.list_contained_objects(identity, continuation.take()),
                )
                .await
                {
                    Ok(page) => page,
                    Err(e) => break 'pages Err(e),
                };

                for entry in page.entries {
                    match entry {
                        Ok(object) => {
                            if tx.send(object).await.is_err() {
                                break 'pages Ok(());
                            }
                        }
                        Err(e) => {
                            skipped += 1;
                            tracing::warn!("Skipping unreadable entry in {}: {}", identity, e);
                        }
                    }
                }

                match page.next {
                    Some(token) => continuation = Some(token),
                    None => break 'pages Ok(()),
                }
            };

            // closing the channel lets the consumer finish
            drop(tx);
            (listing, skipped)
        };

        let consumer = async move {
            let objects = futures_util::stream::unfold(rx, |mut rx| async move {
                rx.recv().await.map(|object| (object, rx))
            });

            let removals = objects
                .map(|object| async move {
                    let result = guarded(
                        "remove-object",
                        cancel,
                        timeout,
                        client.remove_contained_object(identity, &object, bypass_lock),
                    )
                    .await;
                    (object, result)
                })
                .buffered(concurrency);
            futures_util::pin_mut!(removals);

            let mut removed = 0usize;
            let mut failed = 0usize;
            let mut first_error = None;

            while let Some((object, result)) = removals.next().await {
                match result {
                    Ok(()) => removed += 1,
                    Err(e) => {
                        failed += 1;
                        tracing::warn!("Failed to remove {} from {}: {}", object.key, identity, e);
                        if first_error.is_none() {
                            first_error = Some(e);
                        }
                    }
                }
            }

            (removed, failed, first_error)
        };

        let ((listing, skipped), (removed, failed, first_error)) = tokio::join!(producer, consumer);

        let report = SweepReport {
            removed,
            failed,
            skipped,
        };
        tracing::info!(
            "Swept {}: {} removed, {} failed, {} skipped",
            identity,
            report.removed,
            report.failed,
            report.skipped
        );

        if let Some(e) = first_error {
            if let Err(listing_error) = &listing {
                tracing::warn!("Listing of {} also failed: {}", identity, listing_error);
            }
            return Err(e);
        }
        listing?;
        Ok(report)
    }
}
