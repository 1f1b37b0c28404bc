//! Distributed mutual-exclusion leases with watchdog renewal.
//!
//! A lease is a fast-store key holding an owner token unique to the
//! acquisition attempt. Release and renewal are compare-and-delete /
//! compare-and-extend against that token, so a caller whose lease expired
//! and was re-acquired by someone else can neither delete nor extend it.
//!
//! Each successful acquisition starts a watchdog task that re-extends the
//! lease at a third of its duration. The watchdog stops itself the first
//! time a renewal reports a mismatch or errors: it must never re-extend a
//! lease it no longer owns. Release aborts the watchdog before touching
//! the store, so a renewal cannot race a completed release.
//!
//! Retained alongside the lock-free scripted-decrement purchase path as
//! the conservative `StockGate::Locked` strategy; the lock path can report
//! `LeaseContention`, which the scripted path cannot.

use flashsale_core::counter_store::CounterStore;
use flashsale_core::error::Result;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Minimum watchdog renewal interval.
const MIN_RENEW_INTERVAL: Duration = Duration::from_secs(1);

/// Lease manager over a counter store.
///
/// `Clone` shares the renewal-task registry, so any clone can release a
/// lease acquired through another.
#[derive(Clone)]
pub struct LockManager<C> {
    counter: C,
    renewals: Arc<Mutex<HashMap<String, JoinHandle<()>>>>,
}

impl<C> LockManager<C>
where
    C: CounterStore + Clone + Send + Sync + 'static,
{
    /// Create a lock manager.
    #[must_use]
    pub fn new(counter: C) -> Self {
        Self {
            counter,
            renewals: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Attempt to acquire the lease on `resource` for `lease` long.
    ///
    /// Returns the owner token on success, `None` on contention. On
    /// success a watchdog renewal task is scheduled for the lease's
    /// lifetime.
    ///
    /// # Errors
    ///
    /// Returns `TransientStore` if the conditional set itself fails.
    pub async fn try_acquire(&self, resource: &str, lease: Duration) -> Result<Option<String>> {
        let token = Uuid::new_v4().to_string();

        if !self.counter.set_if_absent(resource, &token, lease).await? {
            tracing::debug!(resource = %resource, "Lease contended");
            return Ok(None);
        }

        tracing::debug!(resource = %resource, token = %token, "Lease acquired");
        self.schedule_renewal(resource, &token, lease).await;
        Ok(Some(token))
    }

    /// Release the lease on `resource` if `token` still owns it.
    ///
    /// The watchdog is cancelled regardless of the delete's outcome.
    /// Releasing with a stale or non-owning token returns `Ok(false)`,
    /// never an error.
    ///
    /// # Errors
    ///
    /// Returns `TransientStore` if the compare-and-delete fails.
    pub async fn release(&self, resource: &str, token: &str) -> Result<bool> {
        // Cancel first: once the delete lands, a still-running watchdog
        // could otherwise extend a lease someone else just acquired.
        if let Some(task) = self
            .renewals
            .lock()
            .await
            .remove(&Self::task_id(resource, token))
        {
            task.abort();
        }

        let released = self.counter.delete_if_match(resource, token).await?;
        if released {
            tracing::debug!(resource = %resource, "Lease released");
        } else {
            tracing::warn!(resource = %resource, "Release with non-owning token ignored");
        }
        Ok(released)
    }

    /// Abort every outstanding watchdog. Called at process shutdown.
    pub async fn shutdown(&self) {
        let mut renewals = self.renewals.lock().await;
        for (_, task) in renewals.drain() {
            task.abort();
        }
    }

    /// Number of registered watchdog tasks. Diagnostic.
    pub async fn active_renewals(&self) -> usize {
        self.renewals.lock().await.len()
    }

    fn task_id(resource: &str, token: &str) -> String {
        format!("{resource}:{token}")
    }

    async fn schedule_renewal(&self, resource: &str, token: &str, lease: Duration) {
        let renew_every = (lease / 3).max(MIN_RENEW_INTERVAL);
        let counter = self.counter.clone();
        let renewals = Arc::clone(&self.renewals);
        let resource_owned = resource.to_string();
        let token_owned = token.to_string();
        let task_id = Self::task_id(resource, token);
        let registry_key = task_id.clone();

        // The first renewal is at least MIN_RENEW_INTERVAL away, so the
        // insert below lands before the task can reach its cleanup.
        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(renew_every);
            // The first tick of a tokio interval fires immediately.
            interval.tick().await;
            loop {
                interval.tick().await;
                match counter
                    .expire_if_match(&resource_owned, &token_owned, lease)
                    .await
                {
                    Ok(true) => {
                        tracing::trace!(resource = %resource_owned, "Lease renewed");
                    }
                    Ok(false) => {
                        tracing::warn!(
                            resource = %resource_owned,
                            "Lease lost or released, stopping watchdog"
                        );
                        break;
                    }
                    Err(e) => {
                        tracing::warn!(
                            resource = %resource_owned,
                            error = %e,
                            "Lease renewal failed, stopping watchdog"
                        );
                        break;
                    }
                }
            }
            // A watchdog that stops on its own must not leave a finished
            // handle in the registry.
            renewals.lock().await.remove(&task_id);
        });

        self.renewals.lock().await.insert(registry_key, task);
    }
}
