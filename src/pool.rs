//! Per-key connection pool with outstanding-count admission control

use crate::config::PoolConfiguration;
use crate::errors::{PoolError, PoolResult};
use crate::health::HealthStatus;
use crate::metrics::{MetricsTracker, PoolMetrics};
use crate::resource::{Resource, ResourceFactory};

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// What a waiting caller is handed when capacity frees up
enum Grant<R> {
    /// A released resource, passed over without touching the idle queue
    Resource(R),
    /// A reserved outstanding slot; the waiter creates its own resource
    Slot,
}

struct PoolState<R> {
    idle: VecDeque<R>,
    outstanding: usize,
    waiters: VecDeque<oneshot::Sender<Grant<R>>>,
}

impl<R> PoolState<R> {
    /// Pass `grant` to the oldest waiter still listening, or give it back.
    fn dispatch(&mut self, mut grant: Grant<R>) -> Option<Grant<R>> {
        while let Some(waiter) = self.waiters.pop_front() {
            match waiter.send(grant) {
                Ok(()) => return None,
                Err(returned) => grant = returned,
            }
        }
        Some(grant)
    }

    fn live_waiters(&self) -> usize {
        self.waiters.iter().filter(|waiter| !waiter.is_closed()).count()
    }
}

/// A resource handed out by [`Pool::checkout`], tagged with where it came from
pub(crate) struct Acquired<R> {
    pub resource: R,
    pub reused: bool,
}

/// Bounded pool of resources for a single key
///
/// Idle resources are reused oldest first. With an outstanding ceiling set,
/// callers beyond it wait in arrival order until a resource is released or
/// the configured timeout elapses.
pub struct Pool<F: ResourceFactory> {
    key: F::Key,
    factory: Arc<F>,
    config: PoolConfiguration,
    state: Mutex<PoolState<F::Resource>>,
    metrics: MetricsTracker,
}

impl<F: ResourceFactory> Pool<F> {
    /// Create a pool for `key`, validating `config` first
    pub fn new(key: F::Key, factory: Arc<F>, config: PoolConfiguration) -> PoolResult<Self> {
        Ok(Self::with_validated(key, factory, config.validate()?))
    }

    pub(crate) fn with_validated(key: F::Key, factory: Arc<F>, config: PoolConfiguration) -> Self {
        debug!(
            key = ?key,
            capacity = config.capacity,
            max_outstanding = ?config.max_outstanding,
            timeout = ?config.timeout,
            "creating pool"
        );
        Self {
            key,
            factory,
            state: Mutex::new(PoolState {
                idle: VecDeque::with_capacity(config.capacity),
                outstanding: 0,
                waiters: VecDeque::new(),
            }),
            config,
            metrics: MetricsTracker::new(),
        }
    }

    /// Check out a resource, waiting if the outstanding ceiling is reached.
    pub async fn acquire(&self) -> PoolResult<F::Resource> {
        self.checkout().await.map(|acquired| acquired.resource)
    }

    pub(crate) async fn checkout(&self) -> PoolResult<Acquired<F::Resource>> {
        let receiver = {
            let mut state = self.state.lock();
            if let Some(resource) = state.idle.pop_front() {
                state.outstanding += 1;
                MetricsTracker::bump(&self.metrics.reused);
                return Ok(Acquired {
                    resource,
                    reused: true,
                });
            }

            match self.config.max_outstanding {
                Some(max) if state.outstanding >= max => {
                    state.waiters.retain(|waiter| !waiter.is_closed());
                    let (sender, receiver) = oneshot::channel();
                    state.waiters.push_back(sender);
                    Some(receiver)
                }
                _ => {
                    state.outstanding += 1;
                    None
                }
            }
        };

        match receiver {
            None => self.create(ReservedSlot::new(self)).await,
            Some(receiver) => self.wait(receiver).await,
        }
    }

    async fn wait(
        &self,
        receiver: oneshot::Receiver<Grant<F::Resource>>,
    ) -> PoolResult<Acquired<F::Resource>> {
        MetricsTracker::bump(&self.metrics.waits);
        debug!(key = ?self.key, "waiting for a resource");

        let mut pending = PendingGrant {
            pool: self,
            receiver,
            settled: false,
        };

        let outcome = tokio::time::timeout(self.config.timeout, &mut pending.receiver).await;
        let grant = match outcome {
            Ok(Ok(grant)) => Some(grant),
            // Close first so a release racing with the deadline is either
            // observed here or skipped by `dispatch`.
            _ => {
                pending.receiver.close();
                pending.receiver.try_recv().ok()
            }
        };
        pending.settled = true;

        match grant {
            Some(Grant::Resource(resource)) => {
                MetricsTracker::bump(&self.metrics.reused);
                Ok(Acquired {
                    resource,
                    reused: true,
                })
            }
            Some(Grant::Slot) => self.create(ReservedSlot::new(self)).await,
            None => {
                MetricsTracker::bump(&self.metrics.timeouts);
                warn!(key = ?self.key, timeout = ?self.config.timeout, "timed out waiting for a resource");
                Err(PoolError::Timeout(self.config.timeout))
            }
        }
    }

    async fn create(&self, slot: ReservedSlot<'_, F>) -> PoolResult<Acquired<F::Resource>> {
        match self.factory.create(&self.key).await {
            Ok(mut resource) => {
                resource.mark_transferable();
                slot.keep();
                MetricsTracker::bump(&self.metrics.created);
                debug!(key = ?self.key, "created resource");
                Ok(Acquired {
                    resource,
                    reused: false,
                })
            }
            Err(error) => {
                MetricsTracker::bump(&self.metrics.creation_failures);
                warn!(key = ?self.key, error = %error, "failed to create resource");
                Err(PoolError::CreationFailed(error.to_string()))
            }
        }
    }

    /// Return a checked-out resource.
    ///
    /// The oldest waiter receives it directly. Otherwise it is kept idle
    /// while there is room and closed when the idle queue is full.
    pub fn release(&self, resource: F::Resource) {
        MetricsTracker::bump(&self.metrics.released);

        let surplus = {
            let mut state = self.state.lock();
            let Some(Grant::Resource(resource)) = state.dispatch(Grant::Resource(resource)) else {
                MetricsTracker::bump(&self.metrics.handed_off);
                debug!(key = ?self.key, "handed resource to waiter");
                return;
            };

            debug_assert!(state.outstanding > 0, "released a resource this pool never handed out");
            state.outstanding = state.outstanding.saturating_sub(1);
            if state.idle.len() < self.config.capacity {
                state.idle.push_back(resource);
                None
            } else {
                Some(resource)
            }
        };

        if let Some(resource) = surplus {
            debug!(key = ?self.key, "idle queue full, closing resource");
            self.close(resource);
        }
    }

    /// Close a checked-out resource instead of returning it, freeing its slot.
    pub fn discard(&self, resource: F::Resource) {
        self.close(resource);
        self.free_slot();
    }

    /// Close a checked-out resource and create a fresh one in its slot.
    /// The slot never goes back through the waiter queue.
    pub(crate) async fn replace(&self, resource: F::Resource) -> PoolResult<Acquired<F::Resource>> {
        self.close(resource);
        self.create(ReservedSlot::new(self)).await
    }

    pub(crate) fn record_validation_failure(&self) {
        MetricsTracker::bump(&self.metrics.validation_failures);
    }

    fn free_slot(&self) {
        let mut state = self.state.lock();
        if state.dispatch(Grant::Slot).is_some() {
            debug_assert!(state.outstanding > 0, "freed a slot that was never reserved");
            state.outstanding = state.outstanding.saturating_sub(1);
        }
    }

    fn restore(&self, grant: Grant<F::Resource>) {
        match grant {
            Grant::Resource(resource) => self.release(resource),
            Grant::Slot => self.free_slot(),
        }
    }

    fn close(&self, resource: F::Resource) {
        MetricsTracker::bump(&self.metrics.closed);
        if let Err(error) = resource.close() {
            MetricsTracker::bump(&self.metrics.close_failures);
            warn!(key = ?self.key, error = %error, "failed to close resource");
        }
    }

    pub fn key(&self) -> &F::Key {
        &self.key
    }

    pub fn config(&self) -> &PoolConfiguration {
        &self.config
    }

    /// Get idle count
    pub fn idle_count(&self) -> usize {
        self.state.lock().idle.len()
    }

    /// Get checked-out count
    pub fn outstanding(&self) -> usize {
        self.state.lock().outstanding
    }

    /// Get the number of callers currently waiting
    pub fn waiting(&self) -> usize {
        self.state.lock().live_waiters()
    }

    /// Get pool metrics
    pub fn metrics(&self) -> PoolMetrics {
        let (idle, outstanding, waiting) = {
            let state = self.state.lock();
            (state.idle.len(), state.outstanding, state.live_waiters())
        };
        self.metrics.snapshot(
            idle,
            outstanding,
            waiting,
            self.config.capacity,
            self.config.max_outstanding,
        )
    }

    /// Get health status
    pub fn health(&self) -> HealthStatus {
        HealthStatus::from_metrics(&self.metrics())
    }
}

/// An outstanding slot reserved ahead of a factory call; returned on drop
/// unless the call succeeded.
struct ReservedSlot<'a, F: ResourceFactory> {
    pool: &'a Pool<F>,
    kept: bool,
}

impl<'a, F: ResourceFactory> ReservedSlot<'a, F> {
    fn new(pool: &'a Pool<F>) -> Self {
        Self { pool, kept: false }
    }

    fn keep(mut self) {
        self.kept = true;
    }
}

impl<F: ResourceFactory> Drop for ReservedSlot<'_, F> {
    fn drop(&mut self) {
        if !self.kept {
            self.pool.free_slot();
        }
    }
}

/// A queued waiter. If the wait is abandoned, any grant that raced in is
/// given back to the pool.
struct PendingGrant<'a, F: ResourceFactory> {
    pool: &'a Pool<F>,
    receiver: oneshot::Receiver<Grant<F::Resource>>,
    settled: bool,
}

impl<F: ResourceFactory> Drop for PendingGrant<'_, F> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        self.receiver.close();
        if let Ok(grant) = self.receiver.try_recv() {
            self.pool.restore(grant);
        }
    }
}
