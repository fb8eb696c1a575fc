use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::marketplace::offers::{CommissionType, CreatorId, OfferId};
use crate::marketplace::tracking::ShortCode;

/// Identifier wrapper for creator applications.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApplicationId(pub String);

impl ApplicationId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Raw request body for `POST /api/applications`.
///
/// Every field is optional at the serde layer so that missing ids surface as
/// field-level validation errors instead of opaque deserialization failures.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationSubmission {
    #[serde(default)]
    pub creator_id: Option<String>,
    #[serde(default)]
    pub offer_id: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub preferred_commission_type: Option<String>,
}

impl ApplicationSubmission {
    pub fn new(creator_id: impl Into<String>, offer_id: impl Into<String>) -> Self {
        Self {
            creator_id: Some(creator_id.into()),
            offer_id: Some(offer_id.into()),
            message: None,
            preferred_commission_type: None,
        }
    }
}

/// Submission after intake validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedSubmission {
    pub creator_id: CreatorId,
    pub offer_id: OfferId,
    pub message: Option<String>,
    pub preferred_commission_type: Option<CommissionType>,
}

/// Lifecycle of an application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Pending,
    Approved,
    Rejected,
    Active,
    Completed,
}

impl ApplicationStatus {
    pub const fn label(self) -> &'static str {
        match self {
            ApplicationStatus::Pending => "pending",
            ApplicationStatus::Approved => "approved",
            ApplicationStatus::Rejected => "rejected",
            ApplicationStatus::Active => "active",
            ApplicationStatus::Completed => "completed",
        }
    }

    /// Edges of the lifecycle graph; records are never removed.
    pub const fn can_transition_to(self, next: ApplicationStatus) -> bool {
        matches!(
            (self, next),
            (ApplicationStatus::Pending, ApplicationStatus::Approved)
                | (ApplicationStatus::Pending, ApplicationStatus::Rejected)
                | (ApplicationStatus::Approved, ApplicationStatus::Active)
                | (ApplicationStatus::Active, ApplicationStatus::Completed)
        )
    }

    /// Whether a tracking link for an application in this state should redirect.
    pub const fn link_is_live(self) -> bool {
        matches!(self, ApplicationStatus::Approved | ApplicationStatus::Active)
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The code/link pair issued on approval. Held as one value so neither half
/// can exist without the other.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingAssignment {
    pub code: ShortCode,
    pub link: String,
}

/// Stored application record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    pub id: ApplicationId,
    pub creator_id: CreatorId,
    pub offer_id: OfferId,
    pub message: Option<String>,
    pub preferred_commission_type: Option<CommissionType>,
    pub status: ApplicationStatus,
    pub applied_at: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
    pub tracking: Option<TrackingAssignment>,
}

impl Application {
    pub fn pending(submission: ValidatedSubmission, applied_at: DateTime<Utc>) -> Self {
        Self {
            id: ApplicationId::generate(),
            creator_id: submission.creator_id,
            offer_id: submission.offer_id,
            message: submission.message,
            preferred_commission_type: submission.preferred_commission_type,
            status: ApplicationStatus::Pending,
            applied_at,
            approved_at: None,
            tracking: None,
        }
    }

    pub fn tracking_code(&self) -> Option<&ShortCode> {
        self.tracking.as_ref().map(|assignment| &assignment.code)
    }

    pub fn view(&self) -> ApplicationView {
        ApplicationView {
            id: self.id.clone(),
            creator_id: self.creator_id.clone(),
            offer_id: self.offer_id.clone(),
            message: self.message.clone(),
            preferred_commission_type: self.preferred_commission_type,
            status: self.status,
            applied_at: self.applied_at,
            approved_at: self.approved_at,
            unique_tracking_code: self
                .tracking
                .as_ref()
                .map(|assignment| assignment.code.as_str().to_string()),
            tracking_link: self
                .tracking
                .as_ref()
                .map(|assignment| assignment.link.clone()),
        }
    }
}

/// JSON shape returned by the HTTP layer. Absent values are emitted as `null`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationView {
    pub id: ApplicationId,
    pub creator_id: CreatorId,
    pub offer_id: OfferId,
    pub message: Option<String>,
    pub preferred_commission_type: Option<CommissionType>,
    pub status: ApplicationStatus,
    pub applied_at: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
    pub unique_tracking_code: Option<String>,
    pub tracking_link: Option<String>,
}

/// Persisted marker that a pending application is due for automatic approval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalJob {
    pub application_id: ApplicationId,
    pub due_at: DateTime<Utc>,
    #[serde(default)]
    pub attempts: u32,
}

impl ApprovalJob {
    pub fn new(application_id: ApplicationId, due_at: DateTime<Utc>) -> Self {
        Self {
            application_id,
            due_at,
            attempts: 0,
        }
    }
}
