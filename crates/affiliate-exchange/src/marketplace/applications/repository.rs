use chrono::{DateTime, Utc};

use super::domain::{
    Application, ApplicationId, ApplicationStatus, ApprovalJob, TrackingAssignment,
};
use crate::marketplace::offers::CreatorId;

/// Partial update applied atomically by [`ApplicationRepository::update_application`].
///
/// `None` leaves a field untouched. When `expected_status` is set the update
/// only lands if the stored status still matches it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplicationUpdate {
    pub expected_status: Option<ApplicationStatus>,
    pub status: Option<ApplicationStatus>,
    pub approved_at: Option<DateTime<Utc>>,
    pub tracking: Option<TrackingAssignment>,
}

impl ApplicationUpdate {
    /// Pending -> approved with the issued tracking pair.
    pub fn approval(approved_at: DateTime<Utc>, tracking: TrackingAssignment) -> Self {
        Self {
            expected_status: Some(ApplicationStatus::Pending),
            status: Some(ApplicationStatus::Approved),
            approved_at: Some(approved_at),
            tracking: Some(tracking),
        }
    }

    pub fn transition(from: ApplicationStatus, to: ApplicationStatus) -> Self {
        Self {
            expected_status: Some(from),
            status: Some(to),
            ..Self::default()
        }
    }
}

/// Storage abstraction for applications and their approval jobs.
pub trait ApplicationRepository: Send + Sync {
    /// Inserts the application together with its approval job in one transaction.
    fn create_application(
        &self,
        application: Application,
        job: ApprovalJob,
    ) -> Result<Application, RepositoryError>;
    fn update_application(
        &self,
        id: &ApplicationId,
        update: ApplicationUpdate,
    ) -> Result<Application, RepositoryError>;
    fn get_application(&self, id: &ApplicationId) -> Result<Option<Application>, RepositoryError>;
    /// Newest first.
    fn applications_for_creator(
        &self,
        creator_id: &CreatorId,
    ) -> Result<Vec<Application>, RepositoryError>;
    fn find_by_tracking_code(&self, code: &str) -> Result<Option<Application>, RepositoryError>;
    /// Jobs due at or before `now`, oldest first.
    fn due_approvals(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<ApprovalJob>, RepositoryError>;
    /// Bumps the attempt counter and moves the due time.
    fn reschedule_approval(
        &self,
        id: &ApplicationId,
        due_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError>;
    /// Removes the job; a missing job is not an error.
    fn complete_approval(&self, id: &ApplicationId) -> Result<(), RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record not found")]
    NotFound,
    #[error("referenced {entity} '{id}' does not exist")]
    MissingReference { entity: &'static str, id: String },
    #[error("record already exists")]
    Conflict,
    #[error("tracking code already assigned to another application")]
    DuplicateTrackingCode,
    #[error("application is {current}, update expected a different status")]
    StatusMismatch { current: ApplicationStatus },
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}
