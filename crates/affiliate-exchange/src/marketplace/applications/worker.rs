//! Background processing of persisted approval jobs.
//!
//! Jobs live in the store next to their applications, so a restart only delays
//! approvals: the first pass after startup picks up everything already due.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::domain::{ApplicationId, ApprovalJob};
use super::repository::{ApplicationRepository, RepositoryError};
use super::service::{ApplicationService, ApplicationServiceError, ApprovalOutcome};
use crate::config::ApprovalConfig;

/// Backoff used when `poll_interval * attempts` does not fit a calendar offset.
const FALLBACK_BACKOFF_SECS: i64 = 60;

/// Counts from one worker pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerReport {
    pub approved: usize,
    pub skipped: usize,
    pub rescheduled: usize,
    /// Failed jobs that could not be rescheduled either; retried next pass.
    pub failed: usize,
    pub abandoned: usize,
}

impl WorkerReport {
    pub fn processed(&self) -> usize {
        self.approved + self.skipped + self.rescheduled + self.failed + self.abandoned
    }
}

enum RetryOutcome {
    Rescheduled,
    Failed,
    Abandoned,
}

/// Polls the store for due approval jobs and runs them.
pub struct ApprovalWorker<R> {
    service: Arc<ApplicationService<R>>,
    poll_interval: Duration,
    batch_size: usize,
    max_job_attempts: u32,
    /// Attempts the store has not recorded because rescheduling failed.
    unsaved_attempts: Arc<Mutex<HashMap<ApplicationId, u32>>>,
}

impl<R> Clone for ApprovalWorker<R> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            poll_interval: self.poll_interval,
            batch_size: self.batch_size,
            max_job_attempts: self.max_job_attempts,
            unsaved_attempts: Arc::clone(&self.unsaved_attempts),
        }
    }
}

impl<R> ApprovalWorker<R>
where
    R: ApplicationRepository + 'static,
{
    pub fn new(service: Arc<ApplicationService<R>>, config: &ApprovalConfig) -> Self {
        Self {
            service,
            poll_interval: config.poll_interval,
            batch_size: config.batch_size.max(1),
            max_job_attempts: config.max_job_attempts.max(1),
            unsaved_attempts: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Process every job due at `now`. Failures are logged, never returned.
    pub fn run_once(&self, now: DateTime<Utc>) -> WorkerReport {
        let mut report = WorkerReport::default();

        let jobs = match self.service.due_jobs(now, self.batch_size) {
            Ok(jobs) => jobs,
            Err(err) => {
                error!(error = %err, "unable to read due approval jobs");
                return report;
            }
        };

        for job in jobs {
            match self.service.run_auto_approval(&job.application_id) {
                Ok(ApprovalOutcome::Approved(_)) => {
                    self.forget_attempts(&job.application_id);
                    report.approved += 1;
                }
                Ok(ApprovalOutcome::Skipped { .. }) => {
                    self.forget_attempts(&job.application_id);
                    report.skipped += 1;
                }
                Err(ApplicationServiceError::Repository(RepositoryError::NotFound)) => {
                    warn!(
                        application_id = %job.application_id,
                        "approval job references a missing application, dropping it"
                    );
                    self.forget_attempts(&job.application_id);
                    self.drop_job(&job);
                    report.abandoned += 1;
                }
                Err(err) => match self.retry_later(&job, now, &err) {
                    RetryOutcome::Rescheduled => report.rescheduled += 1,
                    RetryOutcome::Failed => report.failed += 1,
                    RetryOutcome::Abandoned => report.abandoned += 1,
                },
            }
        }

        if report.processed() > 0 {
            debug!(?report, "approval worker pass finished");
        }
        report
    }

    fn retry_later(
        &self,
        job: &ApprovalJob,
        now: DateTime<Utc>,
        err: &ApplicationServiceError,
    ) -> RetryOutcome {
        let recorded = job.attempts.max(self.unsaved_attempts_for(&job.application_id));
        let attempts = recorded.saturating_add(1);
        if attempts >= self.max_job_attempts {
            error!(
                application_id = %job.application_id,
                attempts,
                error = %err,
                "auto-approval abandoned, application stays pending"
            );
            self.forget_attempts(&job.application_id);
            self.drop_job(job);
            return RetryOutcome::Abandoned;
        }

        let due_at = now
            .checked_add_signed(self.backoff(attempts))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        match self
            .service
            .repository()
            .reschedule_approval(&job.application_id, due_at)
        {
            Ok(()) => {
                // The store now holds `job.attempts + 1`.
                if attempts > job.attempts.saturating_add(1) {
                    self.unsaved().insert(job.application_id.clone(), attempts);
                } else {
                    self.forget_attempts(&job.application_id);
                }
                warn!(
                    application_id = %job.application_id,
                    attempts,
                    error = %err,
                    "auto-approval failed, retrying later"
                );
                RetryOutcome::Rescheduled
            }
            Err(reschedule_err) => {
                self.unsaved().insert(job.application_id.clone(), attempts);
                error!(
                    application_id = %job.application_id,
                    attempts,
                    error = %err,
                    reschedule_error = %reschedule_err,
                    "auto-approval failed and could not be rescheduled"
                );
                RetryOutcome::Failed
            }
        }
    }

    fn backoff(&self, attempts: u32) -> chrono::Duration {
        self.poll_interval
            .checked_mul(attempts)
            .and_then(|delay| chrono::Duration::from_std(delay).ok())
            .unwrap_or_else(|| chrono::Duration::seconds(FALLBACK_BACKOFF_SECS))
    }

    fn unsaved(&self) -> MutexGuard<'_, HashMap<ApplicationId, u32>> {
        self.unsaved_attempts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn unsaved_attempts_for(&self, application_id: &ApplicationId) -> u32 {
        self.unsaved().get(application_id).copied().unwrap_or(0)
    }

    fn forget_attempts(&self, application_id: &ApplicationId) {
        self.unsaved().remove(application_id);
    }

    fn drop_job(&self, job: &ApprovalJob) {
        if let Err(err) = self.service.repository().complete_approval(&job.application_id) {
            error!(
                application_id = %job.application_id,
                error = %err,
                "unable to clear approval job"
            );
        }
    }

    /// Run forever on the tokio runtime. The first pass happens immediately.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(
                poll_interval_secs = self.poll_interval.as_secs(),
                batch_size = self.batch_size,
                "approval worker started"
            );
            let mut ticker = tokio::time::interval(self.poll_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                let worker = self.clone();
                let pass = tokio::task::spawn_blocking(move || worker.run_once(Utc::now()));
                if let Err(err) = pass.await {
                    error!(error = %err, "approval worker pass panicked");
                }
            }
        })
    }
}
