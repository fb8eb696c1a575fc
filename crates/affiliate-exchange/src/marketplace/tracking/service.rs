use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, warn};

use super::codes::ShortCode;
use super::ledger::{ClickEvent, ClickLedger, ClickMetadata, LinkStats};
use crate::marketplace::applications::domain::{ApplicationId, ApplicationStatus};
use crate::marketplace::applications::repository::{ApplicationRepository, RepositoryError};
use crate::marketplace::offers::OfferCatalog;

/// Outcome of resolving a short code for a redirect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedLink {
    pub application_id: ApplicationId,
    pub destination_url: String,
    pub stats: LinkStats,
}

/// Resolves tracking codes back to offers and keeps click counters.
pub struct TrackingService<S> {
    store: Arc<S>,
}

impl<S> TrackingService<S>
where
    S: ApplicationRepository + OfferCatalog + ClickLedger + 'static,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Resolve a code, record the click, and return where to send the visitor.
    pub fn resolve(
        &self,
        raw_code: &str,
        metadata: ClickMetadata,
    ) -> Result<ResolvedLink, TrackingError> {
        let code = ShortCode::parse(raw_code).ok_or(TrackingError::UnknownCode)?;
        let application = self
            .store
            .find_by_tracking_code(code.as_str())?
            .ok_or(TrackingError::UnknownCode)?;

        if !application.status.link_is_live() {
            debug!(
                application_id = %application.id,
                status = %application.status,
                "tracking link requested for inactive application"
            );
            return Err(TrackingError::LinkInactive {
                status: application.status,
            });
        }

        let offer = self
            .store
            .get_offer(&application.offer_id)?
            .ok_or_else(|| {
                warn!(
                    application_id = %application.id,
                    offer_id = %application.offer_id,
                    "tracking link points at a missing offer"
                );
                TrackingError::OfferMissing
            })?;

        let event = ClickEvent::new(application.id.clone(), code, Utc::now(), metadata);
        let stats = self.store.record_click(event)?;

        Ok(ResolvedLink {
            application_id: application.id,
            destination_url: offer.destination_url,
            stats,
        })
    }

    /// Counters for an application's tracking link; zeroed until the first click.
    pub fn stats(&self, application_id: &ApplicationId) -> Result<LinkStats, TrackingError> {
        let application = self
            .store
            .get_application(application_id)?
            .ok_or(TrackingError::Repository(RepositoryError::NotFound))?;
        let code = application
            .tracking_code()
            .cloned()
            .ok_or(TrackingError::NotIssued {
                status: application.status,
            })?;

        let stats = self
            .store
            .link_stats(application_id)?
            .unwrap_or_else(|| LinkStats::empty(application.id.clone(), code));
        Ok(stats)
    }
}

/// Error raised while resolving tracking links.
#[derive(Debug, thiserror::Error)]
pub enum TrackingError {
    #[error("unknown tracking code")]
    UnknownCode,
    #[error("tracking link is not live while the application is {status}")]
    LinkInactive { status: ApplicationStatus },
    #[error("no tracking link has been issued while the application is {status}")]
    NotIssued { status: ApplicationStatus },
    #[error("offer behind this tracking link no longer exists")]
    OfferMissing,
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}
