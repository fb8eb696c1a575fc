use affiliate_exchange::config::StorageConfig;
use affiliate_exchange::marketplace::applications::RepositoryError;
use affiliate_exchange::marketplace::offers::{
    CommissionType, Creator, CreatorId, Offer, OfferId, OfferStatus,
};
use affiliate_exchange::marketplace::MarketplaceStore;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

pub(crate) const DEMO_CREATOR: &str = "creator-demo";
pub(crate) const DEMO_OFFER: &str = "offer-demo";

/// Opens the configured data file, or an in-memory store when none is set.
pub(crate) fn open_store(storage: &StorageConfig) -> Result<MarketplaceStore, RepositoryError> {
    match &storage.data_file {
        Some(path) => {
            let store = MarketplaceStore::open(path)?;
            info!(
                path = %path.display(),
                pending_approvals = store.pending_job_count()?,
                "marketplace state loaded"
            );
            Ok(store)
        }
        None => {
            info!("no data file configured, marketplace state is in memory only");
            Ok(MarketplaceStore::in_memory())
        }
    }
}

/// Registers a creator and a live offer so the API can be exercised immediately.
pub(crate) fn seed_demo_catalog(store: &MarketplaceStore) -> Result<(), RepositoryError> {
    store.upsert_creator(Creator {
        id: CreatorId(DEMO_CREATOR.to_string()),
        display_name: "Demo Creator".to_string(),
    })?;
    store.upsert_offer(Offer {
        id: OfferId(DEMO_OFFER.to_string()),
        company_id: "demo-brand".to_string(),
        title: "Demo brand launch".to_string(),
        commission_type: CommissionType::PerSale,
        status: OfferStatus::Live,
        destination_url: "https://example.com/launch".to_string(),
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use affiliate_exchange::marketplace::offers::OfferCatalog;

    #[test]
    fn in_memory_store_without_data_file() {
        let store = open_store(&StorageConfig::default()).expect("store opens");
        assert!(store.data_file().is_none());
    }

    #[test]
    fn demo_catalog_is_seeded() {
        let store = MarketplaceStore::in_memory();
        seed_demo_catalog(&store).expect("seeded");

        let offer = store
            .get_offer(&OfferId(DEMO_OFFER.to_string()))
            .expect("readable")
            .expect("offer present");
        assert_eq!(offer.status, OfferStatus::Live);
        assert!(store
            .get_creator(&CreatorId(DEMO_CREATOR.to_string()))
            .expect("readable")
            .is_some());
    }
}
