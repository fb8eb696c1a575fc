use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::config::ApprovalConfig;
use crate::marketplace::applications::domain::{
    Application, ApplicationId, ApplicationSubmission, ApprovalJob,
};
use crate::marketplace::applications::repository::{
    ApplicationRepository, ApplicationUpdate, RepositoryError,
};
use crate::marketplace::applications::{ApplicationService, ApprovalPolicy};
use crate::marketplace::offers::{
    CommissionType, Creator, CreatorId, Offer, OfferId, OfferStatus,
};
use crate::marketplace::store::MarketplaceStore;
use crate::marketplace::tracking::{RandomShortCodes, ShortCode, ShortCodeSource};

pub(super) const TRACKING_PREFIX: &str = "https://track.affiliatexchange.com/go/";

pub(super) fn seeded_store() -> Arc<MarketplaceStore> {
    let store = MarketplaceStore::in_memory();
    seed(&store);
    Arc::new(store)
}

pub(super) fn seed(store: &MarketplaceStore) {
    for (id, name) in [("C1", "Creator One"), ("C2", "Creator Two")] {
        store
            .upsert_creator(Creator {
                id: CreatorId(id.to_string()),
                display_name: name.to_string(),
            })
            .expect("creator stored");
    }
    store
        .upsert_offer(Offer {
            id: OfferId("O1".to_string()),
            company_id: "acme".to_string(),
            title: "Acme headphones".to_string(),
            commission_type: CommissionType::PerSale,
            status: OfferStatus::Live,
            destination_url: "https://acme.example/headphones".to_string(),
        })
        .expect("offer stored");
    store
        .upsert_offer(Offer {
            id: OfferId("O2".to_string()),
            company_id: "globex".to_string(),
            title: "Globex trial".to_string(),
            commission_type: CommissionType::PerLead,
            status: OfferStatus::Live,
            destination_url: "https://globex.example/trial".to_string(),
        })
        .expect("offer stored");
}

pub(super) fn submission() -> ApplicationSubmission {
    let mut submission = ApplicationSubmission::new("C1", "O1");
    submission.message = Some("  I review audio gear weekly.  ".to_string());
    submission.preferred_commission_type = Some("per_sale".to_string());
    submission
}

pub(super) fn immediate_service(
    store: Arc<MarketplaceStore>,
) -> ApplicationService<MarketplaceStore> {
    ApplicationService::new(store, ApprovalPolicy::immediate())
}

pub(super) fn fixed_code_service<R>(
    repository: Arc<R>,
    codes: &[&str],
) -> ApplicationService<R>
where
    R: ApplicationRepository + 'static,
{
    ApplicationService::with_codes(
        repository,
        Arc::new(FixedCodes::new(codes)),
        ApprovalPolicy::immediate(),
    )
}

pub(super) fn worker_config() -> ApprovalConfig {
    ApprovalConfig {
        delay: std::time::Duration::ZERO,
        poll_interval: std::time::Duration::from_secs(5),
        batch_size: 50,
        max_job_attempts: 3,
        max_code_attempts: 5,
    }
}

pub(super) fn code(raw: &str) -> ShortCode {
    ShortCode::parse(raw).expect("valid code")
}

/// Hands out the queued codes in order, then falls back to random ones.
pub(super) struct FixedCodes {
    queue: Mutex<VecDeque<ShortCode>>,
}

impl FixedCodes {
    pub(super) fn new(codes: &[&str]) -> Self {
        Self {
            queue: Mutex::new(codes.iter().map(|raw| code(raw)).collect()),
        }
    }
}

impl ShortCodeSource for FixedCodes {
    fn next_code(&self) -> ShortCode {
        self.queue
            .lock()
            .expect("code queue lock")
            .pop_front()
            .unwrap_or_else(|| RandomShortCodes.next_code())
    }
}

/// Always returns the same code.
pub(super) struct StuckCodes(pub(super) ShortCode);

impl ShortCodeSource for StuckCodes {
    fn next_code(&self) -> ShortCode {
        self.0.clone()
    }
}

/// Repository whose every call fails.
pub(super) struct UnavailableRepository;

fn unavailable<T>() -> Result<T, RepositoryError> {
    Err(RepositoryError::Unavailable("store offline".to_string()))
}

impl ApplicationRepository for UnavailableRepository {
    fn create_application(
        &self,
        _application: Application,
        _job: ApprovalJob,
    ) -> Result<Application, RepositoryError> {
        unavailable()
    }

    fn update_application(
        &self,
        _id: &ApplicationId,
        _update: ApplicationUpdate,
    ) -> Result<Application, RepositoryError> {
        unavailable()
    }

    fn get_application(&self, _id: &ApplicationId) -> Result<Option<Application>, RepositoryError> {
        unavailable()
    }

    fn applications_for_creator(
        &self,
        _creator_id: &CreatorId,
    ) -> Result<Vec<Application>, RepositoryError> {
        unavailable()
    }

    fn find_by_tracking_code(&self, _code: &str) -> Result<Option<Application>, RepositoryError> {
        unavailable()
    }

    fn due_approvals(
        &self,
        _now: DateTime<Utc>,
        _limit: usize,
    ) -> Result<Vec<ApprovalJob>, RepositoryError> {
        unavailable()
    }

    fn reschedule_approval(
        &self,
        _id: &ApplicationId,
        _due_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        unavailable()
    }

    fn complete_approval(&self, _id: &ApplicationId) -> Result<(), RepositoryError> {
        unavailable()
    }
}

/// Delegates to a real store but fails the next `failures` guarded updates.
pub(super) struct FlakyUpdates {
    pub(super) inner: Arc<MarketplaceStore>,
    failures: Mutex<u32>,
    reschedules_fail: bool,
}

impl FlakyUpdates {
    pub(super) fn new(inner: Arc<MarketplaceStore>, failures: u32) -> Self {
        Self {
            inner,
            failures: Mutex::new(failures),
            reschedules_fail: false,
        }
    }

    /// Like [`FlakyUpdates::new`], and every reschedule fails as well.
    pub(super) fn without_reschedules(inner: Arc<MarketplaceStore>, failures: u32) -> Self {
        Self {
            reschedules_fail: true,
            ..Self::new(inner, failures)
        }
    }
}

impl ApplicationRepository for FlakyUpdates {
    fn create_application(
        &self,
        application: Application,
        job: ApprovalJob,
    ) -> Result<Application, RepositoryError> {
        self.inner.create_application(application, job)
    }

    fn update_application(
        &self,
        id: &ApplicationId,
        update: ApplicationUpdate,
    ) -> Result<Application, RepositoryError> {
        let mut failures = self.failures.lock().expect("failure counter lock");
        if *failures > 0 {
            *failures -= 1;
            return unavailable();
        }
        drop(failures);
        self.inner.update_application(id, update)
    }

    fn get_application(&self, id: &ApplicationId) -> Result<Option<Application>, RepositoryError> {
        self.inner.get_application(id)
    }

    fn applications_for_creator(
        &self,
        creator_id: &CreatorId,
    ) -> Result<Vec<Application>, RepositoryError> {
        self.inner.applications_for_creator(creator_id)
    }

    fn find_by_tracking_code(&self, code: &str) -> Result<Option<Application>, RepositoryError> {
        self.inner.find_by_tracking_code(code)
    }

    fn due_approvals(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<ApprovalJob>, RepositoryError> {
        self.inner.due_approvals(now, limit)
    }

    fn reschedule_approval(
        &self,
        id: &ApplicationId,
        due_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        if self.reschedules_fail {
            return unavailable();
        }
        self.inner.reschedule_approval(id, due_at)
    }

    fn complete_approval(&self, id: &ApplicationId) -> Result<(), RepositoryError> {
        self.inner.complete_approval(id)
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body readable");
    serde_json::from_slice(&bytes).expect("valid json")
}
