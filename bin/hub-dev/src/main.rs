//! Integration Hub Development Monolith
//!
//! All-in-one binary for local development containing:
//! - In-memory connector catalog and connection registry
//! - Event Store & Retry Engine
//! - Webhook Dispatcher (deliveries logged; register real endpoints as needed)
//! - Sync Job Orchestrator
//! - Delivery Worker Pool
//!
//! Seeds a demo tenant with a CRM connection, enqueues a few events, runs a
//! demo sync job, and processes everything until ctrl-c.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use clap::Parser;
use tokio::signal;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::EnvFilter;

use hub_common::{
    Connection, ConnectorSpec, EventDirection, InMemoryConnectionRegistry, IntegrationEvent,
    StaticCatalog, SystemClock,
};
use hub_store::{EventStore, InMemoryEventStore};
use hub_sync::SyncJobOrchestrator;
use hub_webhook::{InMemoryEndpointRepository, WebhookDispatcher, WebhookDispatcherConfig};
use hub_worker::{
    AdapterOutcome, ConnectorAdapter, DeliveryWorkerPool, InboundHandler, RetryPolicy,
    WorkerPoolConfig,
};

/// Integration Hub Development Server
#[derive(Parser, Debug)]
#[command(name = "hub-dev")]
#[command(about = "Integration hub development monolith - all components in one binary")]
struct Args {
    /// Worker pool concurrency
    #[arg(long, env = "HUB_WORKERS", default_value = "4")]
    workers: usize,

    /// Events claimed per poll cycle
    #[arg(long, env = "HUB_BATCH_SIZE", default_value = "10")]
    batch_size: usize,

    /// Poll interval in milliseconds
    #[arg(long, env = "HUB_POLL_INTERVAL_MS", default_value = "500")]
    poll_interval_ms: u64,

    /// Optional dispatch rate limit per minute
    #[arg(long, env = "HUB_RATE_LIMIT_PER_MINUTE")]
    rate_limit_per_minute: Option<u32>,

    /// Number of demo events to enqueue at startup
    #[arg(long, env = "HUB_DEMO_EVENTS", default_value = "5")]
    demo_events: u32,
}

/// Logs outbound deliveries instead of calling a real external API.
struct LoggingAdapter;

#[async_trait]
impl ConnectorAdapter for LoggingAdapter {
    async fn deliver_outbound(&self, event: &IntegrationEvent) -> AdapterOutcome {
        info!(
            event_id = %event.id,
            event_type = %event.event_type,
            connection_id = %event.connection_id,
            "Adapter delivered outbound event"
        );
        AdapterOutcome::success()
    }
}

struct LoggingInbound;

#[async_trait]
impl InboundHandler for LoggingInbound {
    async fn handle_inbound(&self, event: &IntegrationEvent) -> AdapterOutcome {
        info!(
            event_id = %event.id,
            event_type = %event.event_type,
            "Inbound event applied to domain"
        );
        AdapterOutcome::success()
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    info!(?args, "Starting hub-dev");

    let clock = Arc::new(SystemClock);

    // Catalog and registry seeded with a demo tenant and CRM connection.
    let catalog = Arc::new(StaticCatalog::new(vec![ConnectorSpec {
        connector_type: "crm".to_string(),
        supported_events: vec![
            "order.paid".to_string(),
            "order.refunded".to_string(),
            "customer.created".to_string(),
        ],
        supported_actions: vec!["upsert_contact".to_string()],
        config_schema: serde_json::json!({
            "type": "object",
            "properties": { "api_key": { "type": "string" } },
            "required": ["api_key"]
        }),
    }]));
    let registry = Arc::new(InMemoryConnectionRegistry::new());
    registry.insert(Connection {
        id: "demo-conn".into(),
        tenant_id: "demo-tenant".into(),
        connector_type: "crm".to_string(),
        active: true,
    });

    let store = Arc::new(InMemoryEventStore::new(
        registry,
        catalog,
        clock.clone(),
    ));
    let endpoints = Arc::new(InMemoryEndpointRepository::new());
    let dispatcher = Arc::new(WebhookDispatcher::new(
        endpoints,
        clock.clone(),
        WebhookDispatcherConfig::default(),
    )?);

    let pool = DeliveryWorkerPool::new(
        store.clone(),
        dispatcher,
        Arc::new(LoggingAdapter),
        Arc::new(LoggingInbound),
        WorkerPoolConfig {
            workers: args.workers,
            batch_size: args.batch_size,
            poll_interval: Duration::from_millis(args.poll_interval_ms),
            retry_policy: RetryPolicy::default(),
            rate_limit_per_minute: args.rate_limit_per_minute,
        },
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let runner = tokio::spawn(pool.clone().run(shutdown_rx));

    // Demo events through the full enqueue -> claim -> dispatch path.
    for i in 0..args.demo_events {
        let event_id = store
            .enqueue(
                EventDirection::Outbound,
                &"demo-tenant".into(),
                &"demo-conn".into(),
                "order.paid",
                serde_json::json!({"order_id": i, "total": "129.90"}),
            )
            .await?;
        info!(event_id = %event_id, "Enqueued demo event");
    }

    // Demo sync job lifecycle.
    let orchestrator = SyncJobOrchestrator::new(clock);
    let job_id = orchestrator.create("demo-tenant".into(), "demo-conn".into(), "pull_customers");
    orchestrator.start(&job_id)?;
    orchestrator.record_progress(&job_id, 120, 3)?;
    orchestrator.complete(&job_id, 120, 3)?;
    if let Some(job) = orchestrator.find(&"demo-tenant".into(), &job_id) {
        info!(
            job_id = %job.id,
            processed = job.records_processed,
            failed = job.records_failed,
            "Demo sync job completed"
        );
    }

    info!("hub-dev running; press ctrl-c to stop");
    signal::ctrl_c().await?;
    info!("Shutting down");

    shutdown_tx.send(true)?;
    runner.await?;

    let stats = pool.stats();
    info!(
        processed = stats.events_processed,
        failed = stats.events_failed,
        batches = stats.batches_claimed,
        "Final pool stats"
    );

    Ok(())
}
