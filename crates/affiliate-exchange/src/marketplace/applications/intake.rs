use serde::Serialize;

use super::domain::{ApplicationSubmission, ValidatedSubmission};
use crate::marketplace::offers::{CommissionType, CreatorId, OfferId};

pub const MAX_ID_LEN: usize = 64;
pub const MAX_MESSAGE_LEN: usize = 2000;

/// One rejected field of a submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

/// Validation failure carrying every offending field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("invalid application submission: {}", self.summary())]
pub struct ValidationError {
    pub details: Vec<FieldError>,
}

impl ValidationError {
    pub fn single(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            details: vec![FieldError {
                field,
                message: message.into(),
            }],
        }
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.details.iter().any(|detail| detail.field == field)
    }

    fn summary(&self) -> String {
        self.details
            .iter()
            .map(|detail| format!("{} {}", detail.field, detail.message))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Checks raw submissions before they reach the store.
#[derive(Debug, Clone, Default)]
pub struct IntakeGuard;

impl IntakeGuard {
    pub fn validate(
        &self,
        submission: ApplicationSubmission,
    ) -> Result<ValidatedSubmission, ValidationError> {
        let mut details = Vec::new();

        let creator_id = required_id("creatorId", submission.creator_id, &mut details);
        let offer_id = required_id("offerId", submission.offer_id, &mut details);

        let message = submission
            .message
            .map(|raw| raw.trim().to_string())
            .filter(|message| !message.is_empty());
        if let Some(message) = &message {
            if message.chars().count() > MAX_MESSAGE_LEN {
                details.push(FieldError {
                    field: "message",
                    message: format!("must be at most {MAX_MESSAGE_LEN} characters"),
                });
            }
        }

        let preferred_commission_type = match submission.preferred_commission_type {
            None => None,
            Some(raw) if raw.trim().is_empty() => None,
            Some(raw) => match CommissionType::parse(&raw) {
                Some(kind) => Some(kind),
                None => {
                    let allowed: Vec<&str> =
                        CommissionType::ALL.iter().map(|kind| kind.label()).collect();
                    details.push(FieldError {
                        field: "preferredCommissionType",
                        message: format!("must be one of {}", allowed.join(", ")),
                    });
                    None
                }
            },
        };

        match (creator_id, offer_id) {
            (Some(creator_id), Some(offer_id)) if details.is_empty() => Ok(ValidatedSubmission {
                creator_id: CreatorId(creator_id),
                offer_id: OfferId(offer_id),
                message,
                preferred_commission_type,
            }),
            _ => Err(ValidationError { details }),
        }
    }
}

fn required_id(
    field: &'static str,
    raw: Option<String>,
    details: &mut Vec<FieldError>,
) -> Option<String> {
    let value = raw.map(|value| value.trim().to_string()).unwrap_or_default();

    let problem = if value.is_empty() {
        Some("is required".to_string())
    } else if value.len() > MAX_ID_LEN {
        Some(format!("must be at most {MAX_ID_LEN} characters"))
    } else if !value
        .chars()
        .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_')
    {
        Some("may only contain letters, digits, '-' and '_'".to_string())
    } else {
        None
    };

    match problem {
        Some(message) => {
            details.push(FieldError { field, message });
            None
        }
        None => Some(value),
    }
}
