//! Delivery Worker Pool
//!
//! The concurrency substrate that drains the Event Store and invokes the
//! Webhook Dispatcher and connector adapters:
//! - DeliveryWorkerPool: fixed-size, semaphore-gated worker pool with a
//!   poll/claim/dispatch loop and graceful drain on shutdown
//! - ConnectorAdapter / InboundHandler: seams to the per-connector API clients
//!   and the internal domain handlers
//! - RetryPolicy: exponential backoff with jitter, applied by the pool so the
//!   Event Store stays delay-agnostic

pub mod adapter;
pub mod pool;
pub mod retry;

pub use adapter::{AdapterOutcome, ConnectorAdapter, InboundHandler};
pub use pool::{DeliveryWorkerPool, PoolStats, WorkerPoolConfig};
pub use retry::RetryPolicy;
