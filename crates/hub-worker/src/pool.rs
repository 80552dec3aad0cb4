//! Fixed-size worker pool draining the Event Store.
//!
//! No global lock serializes processing: the store hands out exclusive claims
//! per event, and a pool-level semaphore bounds in-flight work. Delivery
//! failures are absorbed into store/endpoint bookkeeping and never propagate
//! past the worker boundary; illegal state transitions are logged loudly.

use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use hub_common::{EventDirection, IntegrationEvent};
use hub_store::EventStore;
use hub_webhook::WebhookDispatcher;
use tokio::sync::{watch, Semaphore};
use tracing::{debug, error, info, warn};

use crate::adapter::{AdapterOutcome, ConnectorAdapter, InboundHandler};
use crate::retry::RetryPolicy;

#[derive(Debug, Clone)]
pub struct WorkerPoolConfig {
    /// Maximum number of events processed concurrently.
    pub workers: usize,
    /// Maximum events claimed per poll cycle.
    pub batch_size: usize,
    /// Sleep between poll cycles when the store is drained.
    pub poll_interval: Duration,
    pub retry_policy: RetryPolicy,
    /// Optional cap on dispatches per minute across the pool.
    pub rate_limit_per_minute: Option<u32>,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            batch_size: 10,
            poll_interval: Duration::from_millis(500),
            retry_policy: RetryPolicy::default(),
            rate_limit_per_minute: None,
        }
    }
}

/// Point-in-time pool counters.
#[derive(Debug, Clone, Copy, Default)]
pub struct PoolStats {
    pub workers: usize,
    pub active_workers: u32,
    pub batches_claimed: u64,
    pub events_processed: u64,
    pub events_failed: u64,
}

pub struct DeliveryWorkerPool {
    store: Arc<dyn EventStore>,
    dispatcher: Arc<WebhookDispatcher>,
    adapter: Arc<dyn ConnectorAdapter>,
    inbound: Arc<dyn InboundHandler>,
    config: WorkerPoolConfig,
    semaphore: Arc<Semaphore>,
    rate_limiter: Option<Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>>,
    active_workers: AtomicU32,
    batches_claimed: AtomicU64,
    events_processed: AtomicU64,
    events_failed: AtomicU64,
}

impl DeliveryWorkerPool {
    pub fn new(
        store: Arc<dyn EventStore>,
        dispatcher: Arc<WebhookDispatcher>,
        adapter: Arc<dyn ConnectorAdapter>,
        inbound: Arc<dyn InboundHandler>,
        config: WorkerPoolConfig,
    ) -> Arc<Self> {
        let rate_limiter = config.rate_limit_per_minute.and_then(|rpm| {
            NonZeroU32::new(rpm).map(|nz| Arc::new(RateLimiter::direct(Quota::per_minute(nz))))
        });

        Arc::new(Self {
            semaphore: Arc::new(Semaphore::new(config.workers)),
            store,
            dispatcher,
            adapter,
            inbound,
            rate_limiter,
            config,
            active_workers: AtomicU32::new(0),
            batches_claimed: AtomicU64::new(0),
            events_processed: AtomicU64::new(0),
            events_failed: AtomicU64::new(0),
        })
    }

    /// Run the poll/claim/dispatch loop until the shutdown signal flips, then
    /// drain in-flight work.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        info!(
            workers = self.config.workers,
            batch_size = self.config.batch_size,
            poll_interval_ms = self.config.poll_interval.as_millis() as u64,
            rate_limit = ?self.config.rate_limit_per_minute,
            "Starting delivery worker pool"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            let batch = match self.store.claim_next_batch(self.config.batch_size).await {
                Ok(batch) => batch,
                Err(e) => {
                    error!(error = %e, "Failed to claim batch from event store");
                    Vec::new()
                }
            };

            if batch.is_empty() {
                // Drained; wait for the next poll cycle or shutdown.
                tokio::select! {
                    _ = shutdown.changed() => {}
                    _ = tokio::time::sleep(self.config.poll_interval) => {}
                }
                continue;
            }

            self.batches_claimed.fetch_add(1, Ordering::SeqCst);
            debug!(claimed = batch.len(), "Claimed event batch");

            for event in batch {
                let permit = match self.semaphore.clone().acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        error!("Worker semaphore closed");
                        return;
                    }
                };

                let pool = self.clone();
                tokio::spawn(async move {
                    pool.active_workers.fetch_add(1, Ordering::SeqCst);
                    pool.process_event(event).await;
                    pool.active_workers.fetch_sub(1, Ordering::SeqCst);
                    drop(permit);
                });
            }
        }

        // Drain: wait for every in-flight worker to release its permit.
        info!("Draining delivery worker pool");
        let _ = self
            .semaphore
            .acquire_many(self.config.workers as u32)
            .await;
        info!("Delivery worker pool stopped");
    }

    async fn process_event(&self, event: IntegrationEvent) {
        // The event is exclusively claimed, so waiting out the backoff here
        // keeps its attempts strictly sequential while other events proceed.
        if event.is_retry() {
            let delay = self.config.retry_policy.delay_for_attempt(event.attempt_count);
            if !delay.is_zero() {
                debug!(
                    event_id = %event.id,
                    attempt = event.attempt_count,
                    delay_ms = delay.as_millis() as u64,
                    "Backing off before retry"
                );
                tokio::time::sleep(delay).await;
            }
        }

        if let Some(ref limiter) = self.rate_limiter {
            limiter.until_ready().await;
        }

        let outcome = match event.direction {
            EventDirection::Outbound => {
                // Webhook fan-out happens once, on the first attempt; endpoint
                // failures are bookkept on the endpoints and never escalate
                // into the event's own status, and an adapter-driven retry
                // must not re-send to endpoints that already accepted.
                if !event.is_retry() {
                    match self.dispatcher.deliver(&event).await {
                        Ok(report) if report.attempted > 0 => {
                            debug!(
                                event_id = %event.id,
                                succeeded = report.succeeded,
                                failed = report.failed,
                                "Webhook fan-out done"
                            );
                        }
                        Ok(_) => {}
                        Err(e) => {
                            warn!(event_id = %event.id, error = %e, "Webhook fan-out error");
                        }
                    }
                }

                self.adapter.deliver_outbound(&event).await
            }
            EventDirection::Inbound => self.inbound.handle_inbound(&event).await,
        };

        let recorded = match outcome {
            AdapterOutcome::Success => {
                self.events_processed.fetch_add(1, Ordering::SeqCst);
                self.store.record_success(&event.id).await
            }
            AdapterOutcome::Failure { error, retryable } => {
                self.events_failed.fetch_add(1, Ordering::SeqCst);
                if retryable {
                    warn!(
                        event_id = %event.id,
                        attempt = event.attempt_count,
                        error = %error,
                        "Event delivery failed"
                    );
                } else {
                    error!(
                        event_id = %event.id,
                        attempt = event.attempt_count,
                        error = %error,
                        "Event delivery rejected by remote configuration"
                    );
                }
                self.store.record_failure(&event.id, &error).await
            }
        };

        if let Err(e) = recorded {
            // A failed outcome write means claim/outcome sequencing is broken
            // somewhere; this is a bug, not a delivery problem.
            error!(event_id = %event.id, error = %e, "Failed to record event outcome");
        }
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            workers: self.config.workers,
            active_workers: self.active_workers.load(Ordering::SeqCst),
            batches_claimed: self.batches_claimed.load(Ordering::SeqCst),
            events_processed: self.events_processed.load(Ordering::SeqCst),
            events_failed: self.events_failed.load(Ordering::SeqCst),
        }
    }
}
