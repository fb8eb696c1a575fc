use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::codes::ShortCode;
use crate::marketplace::applications::domain::ApplicationId;
use crate::marketplace::applications::repository::RepositoryError;

/// Request metadata captured for a redirect. Addresses are hashed before storage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClickMetadata {
    pub client_address: Option<String>,
    pub user_agent: Option<String>,
    pub referrer: Option<String>,
}

/// One resolved tracking-link visit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClickEvent {
    pub application_id: ApplicationId,
    pub short_code: ShortCode,
    pub clicked_at: DateTime<Utc>,
    pub address_hash: Option<String>,
    pub user_agent: Option<String>,
    pub referrer: Option<String>,
}

impl ClickEvent {
    pub fn new(
        application_id: ApplicationId,
        short_code: ShortCode,
        clicked_at: DateTime<Utc>,
        metadata: ClickMetadata,
    ) -> Self {
        Self {
            application_id,
            short_code,
            clicked_at,
            address_hash: metadata.client_address.as_deref().map(hash_address),
            user_agent: metadata.user_agent,
            referrer: metadata.referrer,
        }
    }
}

/// Per-link counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkStats {
    pub application_id: ApplicationId,
    pub short_code: ShortCode,
    pub click_count: u64,
    pub unique_click_count: u64,
    pub last_clicked_at: Option<DateTime<Utc>>,
}

impl LinkStats {
    pub fn empty(application_id: ApplicationId, short_code: ShortCode) -> Self {
        Self {
            application_id,
            short_code,
            click_count: 0,
            unique_click_count: 0,
            last_clicked_at: None,
        }
    }
}

/// Append-only click storage with running counters.
pub trait ClickLedger: Send + Sync {
    /// Stores the event and returns the updated counters for its link.
    fn record_click(&self, event: ClickEvent) -> Result<LinkStats, RepositoryError>;
    fn link_stats(&self, application_id: &ApplicationId)
        -> Result<Option<LinkStats>, RepositoryError>;
}

pub fn hash_address(address: &str) -> String {
    let digest = Sha256::digest(address.trim().as_bytes());
    hex::encode(digest)
}
