//! Sync Job Orchestrator
//!
//! Manages the lifecycle of long-running bulk synchronization jobs per
//! connection. State machine: `pending -> running -> { completed | failed }`.
//! The orchestrator is a progress/outcome ledger only - the connector adapter
//! performs the actual synchronization and reports progress against the job.
//!
//! At most one job may be running per connection at a time: a second `start`
//! against a connection with a running job fails with a conflict, so duplicate
//! bulk pulls can never race and double-emit events into the Event Store.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use hub_common::{Clock, ConnectionId, HubError, JobId, Result, SyncJob, SyncJobStatus, TenantId};
use parking_lot::Mutex;
use tracing::{error, info, warn};

struct JobTable {
    jobs: HashMap<JobId, SyncJob>,
    /// Connections with a currently running job.
    running_connections: HashSet<ConnectionId>,
}

pub struct SyncJobOrchestrator {
    table: Mutex<JobTable>,
    clock: Arc<dyn Clock>,
}

impl SyncJobOrchestrator {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            table: Mutex::new(JobTable {
                jobs: HashMap::new(),
                running_connections: HashSet::new(),
            }),
            clock,
        }
    }

    /// Create a new job in `Pending`, returning its id.
    pub fn create(
        &self,
        tenant_id: TenantId,
        connection_id: ConnectionId,
        job_type: impl Into<String>,
    ) -> JobId {
        let job = SyncJob::new(tenant_id, connection_id, job_type, self.clock.now());
        let job_id = job.id.clone();
        info!(
            job_id = %job_id,
            tenant_id = %job.tenant_id,
            connection_id = %job.connection_id,
            job_type = %job.job_type,
            "Sync job created"
        );
        self.table.lock().jobs.insert(job_id.clone(), job);
        job_id
    }

    /// `Pending -> Running`, stamping the start time exactly once.
    ///
    /// Fails with `Conflict` when the job's connection already has a running
    /// job (the first job is left untouched), and with `InvalidState` when the
    /// job is not pending.
    pub fn start(&self, job_id: &JobId) -> Result<()> {
        let now = self.clock.now();
        let mut table = self.table.lock();

        let job = table
            .jobs
            .get(job_id)
            .ok_or_else(|| HubError::not_found("SyncJob", job_id.as_str()))?;

        if job.status != SyncJobStatus::Pending {
            let err = HubError::invalid_state(format!(
                "cannot start sync job {} in status {:?}",
                job_id, job.status
            ));
            error!(job_id = %job_id, status = ?job.status, "Illegal sync job start");
            return Err(err);
        }

        let connection_id = job.connection_id.clone();
        if table.running_connections.contains(&connection_id) {
            warn!(
                job_id = %job_id,
                connection_id = %connection_id,
                "Sync job start rejected: connection already has a running job"
            );
            return Err(HubError::conflict(format!(
                "connection {} already has a running sync job",
                connection_id
            )));
        }

        table.running_connections.insert(connection_id.clone());
        let job = table.jobs.get_mut(job_id).expect("checked above");
        job.status = SyncJobStatus::Running;
        job.started_at = Some(now);
        info!(job_id = %job_id, connection_id = %connection_id, "Sync job started");
        Ok(())
    }

    /// Add streamed-batch progress to a running job. Counts only ever grow.
    pub fn record_progress(
        &self,
        job_id: &JobId,
        processed_delta: u64,
        failed_delta: u64,
    ) -> Result<()> {
        let mut table = self.table.lock();
        let job = table
            .jobs
            .get_mut(job_id)
            .ok_or_else(|| HubError::not_found("SyncJob", job_id.as_str()))?;

        if job.status != SyncJobStatus::Running {
            return Err(HubError::invalid_state(format!(
                "cannot record progress for sync job {} in status {:?}",
                job_id, job.status
            )));
        }

        job.records_processed += processed_delta;
        job.records_failed += failed_delta;
        Ok(())
    }

    /// `Running -> Completed`, stamping the completion time and final counts.
    pub fn complete(&self, job_id: &JobId, processed: u64, failed: u64) -> Result<()> {
        self.finish(job_id, SyncJobStatus::Completed, |job| {
            job.records_processed = job.records_processed.max(processed);
            job.records_failed = job.records_failed.max(failed);
        })
    }

    /// `Running -> Failed`, stamping the completion time and the error log.
    /// Signals the adapter to stop producing batches; already-emitted events
    /// are not rolled back.
    pub fn fail(&self, job_id: &JobId, error_log: impl Into<String>) -> Result<()> {
        let error_log = error_log.into();
        self.finish(job_id, SyncJobStatus::Failed, |job| {
            job.error_log = Some(error_log);
        })
    }

    /// Tenant-scoped lookup.
    pub fn find(&self, tenant_id: &TenantId, job_id: &JobId) -> Option<SyncJob> {
        self.table
            .lock()
            .jobs
            .get(job_id)
            .filter(|j| j.tenant_id == *tenant_id)
            .cloned()
    }

    /// Tenant-scoped per-connection job history.
    pub fn list_for_connection(
        &self,
        tenant_id: &TenantId,
        connection_id: &ConnectionId,
    ) -> Vec<SyncJob> {
        let table = self.table.lock();
        let mut jobs: Vec<SyncJob> = table
            .jobs
            .values()
            .filter(|j| j.tenant_id == *tenant_id && j.connection_id == *connection_id)
            .cloned()
            .collect();
        jobs.sort_by_key(|j| j.created_at);
        jobs
    }

    fn finish(
        &self,
        job_id: &JobId,
        terminal: SyncJobStatus,
        apply: impl FnOnce(&mut SyncJob),
    ) -> Result<()> {
        let now = self.clock.now();
        let mut table = self.table.lock();

        let job = table
            .jobs
            .get_mut(job_id)
            .ok_or_else(|| HubError::not_found("SyncJob", job_id.as_str()))?;

        if job.status != SyncJobStatus::Running {
            let err = HubError::invalid_state(format!(
                "cannot transition sync job {} from {:?} to {:?}",
                job_id, job.status, terminal
            ));
            error!(
                job_id = %job_id, status = ?job.status, target = ?terminal,
                "Illegal sync job transition"
            );
            return Err(err);
        }

        job.status = terminal;
        job.completed_at = Some(now);
        apply(job);
        let connection_id = job.connection_id.clone();
        info!(
            job_id = %job_id,
            connection_id = %connection_id,
            status = ?terminal,
            processed = job.records_processed,
            failed = job.records_failed,
            "Sync job finished"
        );
        table.running_connections.remove(&connection_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use hub_common::ManualClock;

    fn orchestrator() -> (SyncJobOrchestrator, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        (SyncJobOrchestrator::new(clock.clone()), clock)
    }

    #[test]
    fn test_lifecycle_completed() {
        let (orch, clock) = orchestrator();
        let id = orch.create("tenant-a".into(), "conn-1".into(), "pull_customers");

        clock.advance(chrono::Duration::seconds(1));
        orch.start(&id).unwrap();
        let job = orch.find(&"tenant-a".into(), &id).unwrap();
        assert_eq!(job.status, SyncJobStatus::Running);
        assert_eq!(job.started_at, Some(clock.now()));

        orch.record_progress(&id, 100, 2).unwrap();
        orch.record_progress(&id, 50, 0).unwrap();

        clock.advance(chrono::Duration::seconds(10));
        orch.complete(&id, 150, 2).unwrap();
        let job = orch.find(&"tenant-a".into(), &id).unwrap();
        assert_eq!(job.status, SyncJobStatus::Completed);
        assert_eq!(job.completed_at, Some(clock.now()));
        assert_eq!(job.records_processed, 150);
        assert_eq!(job.records_failed, 2);
    }

    #[test]
    fn test_lifecycle_failed() {
        let (orch, _) = orchestrator();
        let id = orch.create("tenant-a".into(), "conn-1".into(), "pull_customers");
        orch.start(&id).unwrap();
        orch.fail(&id, "remote API revoked credentials").unwrap();

        let job = orch.find(&"tenant-a".into(), &id).unwrap();
        assert_eq!(job.status, SyncJobStatus::Failed);
        assert!(job.completed_at.is_some());
        assert_eq!(job.error_log.as_deref(), Some("remote API revoked credentials"));
    }

    #[test]
    fn test_second_start_on_same_connection_conflicts() {
        let (orch, _) = orchestrator();
        let first = orch.create("tenant-a".into(), "conn-1".into(), "pull_customers");
        let second = orch.create("tenant-a".into(), "conn-1".into(), "pull_orders");

        orch.start(&first).unwrap();
        let err = orch.start(&second).unwrap_err();
        assert!(matches!(err, HubError::Conflict { .. }));

        // First job unaffected, second still pending.
        assert_eq!(orch.find(&"tenant-a".into(), &first).unwrap().status, SyncJobStatus::Running);
        assert_eq!(orch.find(&"tenant-a".into(), &second).unwrap().status, SyncJobStatus::Pending);

        // Finishing the first releases the connection.
        orch.complete(&first, 10, 0).unwrap();
        orch.start(&second).unwrap();
    }

    #[test]
    fn test_parallel_jobs_on_different_connections_allowed() {
        let (orch, _) = orchestrator();
        let a = orch.create("tenant-a".into(), "conn-1".into(), "pull_customers");
        let b = orch.create("tenant-a".into(), "conn-2".into(), "pull_customers");
        orch.start(&a).unwrap();
        orch.start(&b).unwrap();
    }

    #[test]
    fn test_terminal_jobs_are_immutable() {
        let (orch, _) = orchestrator();
        let id = orch.create("tenant-a".into(), "conn-1".into(), "pull_customers");
        orch.start(&id).unwrap();
        orch.complete(&id, 1, 0).unwrap();

        assert!(matches!(
            orch.start(&id).unwrap_err(),
            HubError::InvalidState { .. }
        ));
        assert!(matches!(
            orch.complete(&id, 2, 0).unwrap_err(),
            HubError::InvalidState { .. }
        ));
        assert!(matches!(
            orch.fail(&id, "late").unwrap_err(),
            HubError::InvalidState { .. }
        ));
        assert!(matches!(
            orch.record_progress(&id, 1, 0).unwrap_err(),
            HubError::InvalidState { .. }
        ));
    }

    #[test]
    fn test_progress_requires_running() {
        let (orch, _) = orchestrator();
        let id = orch.create("tenant-a".into(), "conn-1".into(), "pull_customers");
        assert!(matches!(
            orch.record_progress(&id, 1, 0).unwrap_err(),
            HubError::InvalidState { .. }
        ));
    }

    #[test]
    fn test_reads_are_tenant_scoped() {
        let (orch, _) = orchestrator();
        let id = orch.create("tenant-a".into(), "conn-1".into(), "pull_customers");
        assert!(orch.find(&"tenant-b".into(), &id).is_none());
        assert!(orch.list_for_connection(&"tenant-b".into(), &"conn-1".into()).is_empty());
        assert_eq!(orch.list_for_connection(&"tenant-a".into(), &"conn-1".into()).len(), 1);
    }
}
