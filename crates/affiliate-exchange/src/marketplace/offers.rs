//! Read-only catalog of creators and offers referenced by applications.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::applications::repository::RepositoryError;

/// Identifier wrapper for creator profiles.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CreatorId(pub String);

/// Identifier wrapper for company offers.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OfferId(pub String);

impl fmt::Display for CreatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for OfferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How a company pays creators for an offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommissionType {
    PerSale,
    PerLead,
    PerClick,
    Retainer,
    Hybrid,
}

impl CommissionType {
    pub const ALL: [CommissionType; 5] = [
        CommissionType::PerSale,
        CommissionType::PerLead,
        CommissionType::PerClick,
        CommissionType::Retainer,
        CommissionType::Hybrid,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            CommissionType::PerSale => "per_sale",
            CommissionType::PerLead => "per_lead",
            CommissionType::PerClick => "per_click",
            CommissionType::Retainer => "retainer",
            CommissionType::Hybrid => "hybrid",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|kind| kind.label() == normalized)
    }
}

/// Publication state of an offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfferStatus {
    Draft,
    UnderReview,
    Live,
    Paused,
    Archived,
}

/// Minimal creator profile; the core only needs to know it exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Creator {
    pub id: CreatorId,
    pub display_name: String,
}

/// Company campaign a creator can apply to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Offer {
    pub id: OfferId,
    pub company_id: String,
    pub title: String,
    pub commission_type: CommissionType,
    pub status: OfferStatus,
    /// Where tracking-link clicks are ultimately redirected.
    pub destination_url: String,
}

/// Lookup surface for creators and offers.
pub trait OfferCatalog: Send + Sync {
    fn get_offer(&self, id: &OfferId) -> Result<Option<Offer>, RepositoryError>;
    fn get_creator(&self, id: &CreatorId) -> Result<Option<Creator>, RepositoryError>;
}
