//! Creator applications to offers: intake, the pending/approved/active lifecycle,
//! and delayed auto-approval that issues each application its tracking link.

pub mod domain;
pub mod intake;
pub mod repository;
pub mod router;
pub mod service;
pub mod worker;

#[cfg(test)]
mod tests;

pub use domain::{
    Application, ApplicationId, ApplicationStatus, ApplicationSubmission, ApplicationView,
    ApprovalJob, TrackingAssignment, ValidatedSubmission,
};
pub use intake::{FieldError, IntakeGuard, ValidationError, MAX_ID_LEN, MAX_MESSAGE_LEN};
pub use repository::{ApplicationRepository, ApplicationUpdate, RepositoryError};
pub use router::application_router;
pub use service::{
    ApplicationService, ApplicationServiceError, ApprovalOutcome, ApprovalPolicy,
};
pub use worker::{ApprovalWorker, WorkerReport};
