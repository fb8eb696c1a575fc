use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use super::domain::{
    Application, ApplicationId, ApplicationStatus, ApplicationSubmission, ApprovalJob,
    TrackingAssignment,
};
use super::intake::{IntakeGuard, ValidationError};
use super::repository::{ApplicationRepository, ApplicationUpdate, RepositoryError};
use crate::config::{ApprovalConfig, ConfigError, TrackingConfig};
use crate::marketplace::offers::CreatorId;
use crate::marketplace::tracking::{RandomShortCodes, ShortCodeSource};

/// Knobs for submission scheduling and tracking-link issuance.
#[derive(Debug, Clone)]
pub struct ApprovalPolicy {
    pub delay: chrono::Duration,
    pub base_url: String,
    pub max_code_attempts: u32,
}

impl ApprovalPolicy {
    pub fn from_config(
        approvals: &ApprovalConfig,
        tracking: &TrackingConfig,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            delay: approvals.approval_delay()?,
            base_url: tracking.base_url().to_string(),
            max_code_attempts: approvals.max_code_attempts.max(1),
        })
    }

    /// Approval fires on the next worker pass; used by tests and the demo.
    pub fn immediate() -> Self {
        Self {
            delay: chrono::Duration::zero(),
            ..Self::default()
        }
    }
}

impl Default for ApprovalPolicy {
    fn default() -> Self {
        Self {
            delay: chrono::Duration::minutes(7),
            base_url: TrackingConfig::default().base_url().to_string(),
            max_code_attempts: ApprovalConfig::default().max_code_attempts,
        }
    }
}

/// Result of one auto-approval attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApprovalOutcome {
    Approved(Application),
    /// The application had already left `pending`; nothing changed.
    Skipped { status: ApplicationStatus },
}

/// Owns creation, state transitions, and tracking-link issuance for applications.
pub struct ApplicationService<R> {
    guard: IntakeGuard,
    repository: Arc<R>,
    codes: Arc<dyn ShortCodeSource>,
    policy: ApprovalPolicy,
}

impl<R> ApplicationService<R>
where
    R: ApplicationRepository + 'static,
{
    pub fn new(repository: Arc<R>, policy: ApprovalPolicy) -> Self {
        Self::with_codes(repository, Arc::new(RandomShortCodes), policy)
    }

    pub fn with_codes(
        repository: Arc<R>,
        codes: Arc<dyn ShortCodeSource>,
        policy: ApprovalPolicy,
    ) -> Self {
        Self {
            guard: IntakeGuard,
            repository,
            codes,
            policy,
        }
    }

    pub fn policy(&self) -> &ApprovalPolicy {
        &self.policy
    }

    pub(crate) fn repository(&self) -> &Arc<R> {
        &self.repository
    }

    /// Validate and store a new pending application together with its approval job.
    pub fn submit(
        &self,
        submission: ApplicationSubmission,
    ) -> Result<Application, ApplicationServiceError> {
        let validated = self.guard.validate(submission)?;
        let applied_at = Utc::now();
        let due_at = applied_at
            .checked_add_signed(self.policy.delay)
            .ok_or(ApplicationServiceError::ApprovalDelayOutOfRange)?;
        let application = Application::pending(validated, applied_at);
        let job = ApprovalJob::new(application.id.clone(), due_at);

        let stored = self.repository.create_application(application, job)?;
        info!(
            application_id = %stored.id,
            creator_id = %stored.creator_id,
            offer_id = %stored.offer_id,
            %due_at,
            "application submitted"
        );
        Ok(stored)
    }

    /// Issue a tracking code and move a pending application to approved.
    ///
    /// Applications that are no longer pending are left untouched and reported
    /// as [`ApprovalOutcome::Skipped`]; either way the approval job is cleared.
    pub fn run_auto_approval(
        &self,
        application_id: &ApplicationId,
    ) -> Result<ApprovalOutcome, ApplicationServiceError> {
        let application = self
            .repository
            .get_application(application_id)?
            .ok_or(RepositoryError::NotFound)?;

        if application.status != ApplicationStatus::Pending {
            return self.skip(application_id, application.status);
        }

        for attempt in 1..=self.policy.max_code_attempts {
            let code = self.codes.next_code();
            let tracking = TrackingAssignment {
                link: code.link(&self.policy.base_url),
                code,
            };
            let update = ApplicationUpdate::approval(Utc::now(), tracking);

            match self.repository.update_application(application_id, update) {
                Ok(approved) => {
                    self.repository.complete_approval(application_id)?;
                    let short_code = approved
                        .tracking_code()
                        .map(|code| code.as_str())
                        .unwrap_or_default();
                    info!(
                        application_id = %approved.id,
                        short_code,
                        "application auto-approved"
                    );
                    return Ok(ApprovalOutcome::Approved(approved));
                }
                Err(RepositoryError::DuplicateTrackingCode) => {
                    warn!(
                        application_id = %application_id,
                        attempt,
                        "tracking code collision, drawing a new code"
                    );
                }
                Err(RepositoryError::StatusMismatch { current }) => {
                    return self.skip(application_id, current);
                }
                Err(other) => return Err(other.into()),
            }
        }

        Err(ApplicationServiceError::TrackingCodeExhausted {
            attempts: self.policy.max_code_attempts,
        })
    }

    fn skip(
        &self,
        application_id: &ApplicationId,
        status: ApplicationStatus,
    ) -> Result<ApprovalOutcome, ApplicationServiceError> {
        self.repository.complete_approval(application_id)?;
        debug!(
            application_id = %application_id,
            %status,
            "auto-approval skipped, application no longer pending"
        );
        Ok(ApprovalOutcome::Skipped { status })
    }

    /// Manual rejection of a pending application. Cancels its approval job.
    pub fn reject(
        &self,
        application_id: &ApplicationId,
    ) -> Result<Application, ApplicationServiceError> {
        let rejected = self.transition(application_id, ApplicationStatus::Rejected)?;
        self.repository.complete_approval(application_id)?;
        Ok(rejected)
    }

    pub fn activate(
        &self,
        application_id: &ApplicationId,
    ) -> Result<Application, ApplicationServiceError> {
        self.transition(application_id, ApplicationStatus::Active)
    }

    pub fn complete(
        &self,
        application_id: &ApplicationId,
    ) -> Result<Application, ApplicationServiceError> {
        self.transition(application_id, ApplicationStatus::Completed)
    }

    fn transition(
        &self,
        application_id: &ApplicationId,
        to: ApplicationStatus,
    ) -> Result<Application, ApplicationServiceError> {
        let current = self
            .repository
            .get_application(application_id)?
            .ok_or(RepositoryError::NotFound)?;

        if !current.status.can_transition_to(to) {
            return Err(ApplicationServiceError::InvalidTransition {
                from: current.status,
                to,
            });
        }

        let update = ApplicationUpdate::transition(current.status, to);
        match self.repository.update_application(application_id, update) {
            Ok(updated) => {
                info!(
                    application_id = %application_id,
                    from = %current.status,
                    to = %to,
                    "application status changed"
                );
                Ok(updated)
            }
            Err(RepositoryError::StatusMismatch { current }) => {
                Err(ApplicationServiceError::InvalidTransition { from: current, to })
            }
            Err(other) => Err(other.into()),
        }
    }

    /// Fetch an application for API responses.
    pub fn get(
        &self,
        application_id: &ApplicationId,
    ) -> Result<Application, ApplicationServiceError> {
        let application = self
            .repository
            .get_application(application_id)?
            .ok_or(RepositoryError::NotFound)?;
        Ok(application)
    }

    /// A creator's applications, newest first.
    pub fn list_for_creator(
        &self,
        creator_id: &CreatorId,
    ) -> Result<Vec<Application>, ApplicationServiceError> {
        Ok(self.repository.applications_for_creator(creator_id)?)
    }

    /// Approval jobs due at `now`, for the worker.
    pub fn due_jobs(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<ApprovalJob>, ApplicationServiceError> {
        Ok(self.repository.due_approvals(now, limit)?)
    }
}

/// Error raised by the application service.
#[derive(Debug, thiserror::Error)]
pub enum ApplicationServiceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error("cannot move application from {from} to {to}")]
    InvalidTransition {
        from: ApplicationStatus,
        to: ApplicationStatus,
    },
    #[error("no unique tracking code found after {attempts} attempts")]
    TrackingCodeExhausted { attempts: u32 },
    #[error("approval delay pushes the due time out of range")]
    ApprovalDelayOutOfRange,
}
