//! Bundled Persistence Gateway: in-memory state with optional JSON snapshots.
//!
//! Every mutation is applied to a draft copy of the state. The draft is written
//! to the data file (temp file + rename) before it replaces the live state, so a
//! failed write leaves both memory and disk untouched.
//!
//! Clicks stay out of the snapshot. Each one is appended as a JSON line to a
//! click log next to the data file, and the per-link counters are replayed
//! from that log on open.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs::{self, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::applications::domain::{Application, ApplicationId, ApprovalJob};
use super::applications::repository::{
    ApplicationRepository, ApplicationUpdate, RepositoryError,
};
use super::offers::{Creator, CreatorId, Offer, OfferCatalog, OfferId};
use super::tracking::ledger::{ClickEvent, ClickLedger, LinkStats};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoreState {
    #[serde(default)]
    creators: BTreeMap<CreatorId, Creator>,
    #[serde(default)]
    offers: BTreeMap<OfferId, Offer>,
    #[serde(default)]
    applications: BTreeMap<ApplicationId, Application>,
    #[serde(default)]
    approval_jobs: BTreeMap<ApplicationId, ApprovalJob>,
    /// Derived on load; not persisted.
    #[serde(skip)]
    tracking_codes: HashMap<String, ApplicationId>,
}

impl StoreState {
    fn rebuild_indexes(&mut self) {
        self.tracking_codes = self
            .applications
            .values()
            .filter_map(|application| {
                application
                    .tracking_code()
                    .map(|code| (code.as_str().to_string(), application.id.clone()))
            })
            .collect();
    }
}

/// Running click counters, kept apart from [`StoreState`] so clicks never
/// copy or rewrite the application snapshot.
#[derive(Debug, Default)]
struct ClickTotals {
    link_stats: HashMap<ApplicationId, LinkStats>,
    seen_addresses: HashMap<ApplicationId, HashSet<String>>,
}

impl ClickTotals {
    fn apply(&mut self, event: &ClickEvent) -> LinkStats {
        let first_visit = match &event.address_hash {
            Some(hash) => self
                .seen_addresses
                .entry(event.application_id.clone())
                .or_default()
                .insert(hash.clone()),
            None => true,
        };

        let stats = self
            .link_stats
            .entry(event.application_id.clone())
            .or_insert_with(|| {
                LinkStats::empty(event.application_id.clone(), event.short_code.clone())
            });
        stats.click_count += 1;
        if first_visit {
            stats.unique_click_count += 1;
        }
        stats.last_clicked_at = Some(event.clicked_at);
        stats.clone()
    }

    fn replay(path: &Path) -> Result<(Self, usize), RepositoryError> {
        let mut totals = Self::default();
        let file = match fs::File::open(path) {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok((totals, 0)),
            Err(err) => {
                return Err(RepositoryError::Unavailable(format!(
                    "unable to read click log {}: {err}",
                    path.display()
                )))
            }
        };

        let mut replayed = 0;
        for (index, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|err| {
                RepositoryError::Unavailable(format!(
                    "unable to read click log {}: {err}",
                    path.display()
                ))
            })?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<ClickEvent>(&line) {
                Ok(event) => {
                    totals.apply(&event);
                    replayed += 1;
                }
                Err(err) => warn!(
                    path = %path.display(),
                    line = index + 1,
                    error = %err,
                    "skipping unreadable click log entry"
                ),
            }
        }
        Ok((totals, replayed))
    }
}

/// Click log location for a data file: `marketplace.json` logs to
/// `marketplace.clicks.jsonl`.
pub(crate) fn click_log_path(data_file: &Path) -> PathBuf {
    data_file.with_extension("clicks.jsonl")
}

/// Marketplace state shared by the lifecycle service, worker, and tracking routes.
#[derive(Debug, Default)]
pub struct MarketplaceStore {
    state: Mutex<StoreState>,
    clicks: Mutex<ClickTotals>,
    data_file: Option<PathBuf>,
}

impl MarketplaceStore {
    /// Volatile store; contents vanish with the process.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Store backed by a JSON snapshot at `path`, loading it when present.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, RepositoryError> {
        let path = path.as_ref().to_path_buf();
        let mut state = match fs::read(&path) {
            Ok(bytes) => serde_json::from_slice::<StoreState>(&bytes).map_err(|err| {
                RepositoryError::Unavailable(format!(
                    "data file {} is not a valid snapshot: {err}",
                    path.display()
                ))
            })?,
            Err(err) if err.kind() == io::ErrorKind::NotFound => StoreState::default(),
            Err(err) => {
                return Err(RepositoryError::Unavailable(format!(
                    "unable to read data file {}: {err}",
                    path.display()
                )))
            }
        };
        state.rebuild_indexes();
        let (clicks, replayed) = ClickTotals::replay(&click_log_path(&path))?;

        info!(
            path = %path.display(),
            applications = state.applications.len(),
            pending_jobs = state.approval_jobs.len(),
            clicks = replayed,
            "marketplace store opened"
        );

        Ok(Self {
            state: Mutex::new(state),
            clicks: Mutex::new(clicks),
            data_file: Some(path),
        })
    }

    pub fn data_file(&self) -> Option<&Path> {
        self.data_file.as_deref()
    }

    /// Registers or replaces a creator profile.
    pub fn upsert_creator(&self, creator: Creator) -> Result<(), RepositoryError> {
        self.transact(|state| {
            state.creators.insert(creator.id.clone(), creator);
            Ok(())
        })
    }

    /// Registers or replaces an offer.
    pub fn upsert_offer(&self, offer: Offer) -> Result<(), RepositoryError> {
        self.transact(|state| {
            state.offers.insert(offer.id.clone(), offer);
            Ok(())
        })
    }

    /// Number of approval jobs still waiting.
    pub fn pending_job_count(&self) -> Result<usize, RepositoryError> {
        self.read(|state| state.approval_jobs.len())
    }

    /// Every stored application, in id order.
    pub fn all_applications(&self) -> Result<Vec<Application>, RepositoryError> {
        self.read(|state| state.applications.values().cloned().collect())
    }

    fn lock(&self) -> Result<MutexGuard<'_, StoreState>, RepositoryError> {
        self.state
            .lock()
            .map_err(|_| RepositoryError::Unavailable("store lock poisoned".to_string()))
    }

    fn lock_clicks(&self) -> Result<MutexGuard<'_, ClickTotals>, RepositoryError> {
        self.clicks
            .lock()
            .map_err(|_| RepositoryError::Unavailable("click lock poisoned".to_string()))
    }

    fn read<T>(&self, f: impl FnOnce(&StoreState) -> T) -> Result<T, RepositoryError> {
        let guard = self.lock()?;
        Ok(f(&guard))
    }

    fn transact<T>(
        &self,
        f: impl FnOnce(&mut StoreState) -> Result<T, RepositoryError>,
    ) -> Result<T, RepositoryError> {
        let mut guard = self.lock()?;
        let mut draft = guard.clone();
        let output = f(&mut draft)?;
        self.persist(&draft)?;
        *guard = draft;
        Ok(output)
    }

    fn persist(&self, state: &StoreState) -> Result<(), RepositoryError> {
        let Some(path) = &self.data_file else {
            return Ok(());
        };

        let bytes = serde_json::to_vec_pretty(state)
            .map_err(|err| RepositoryError::Unavailable(format!("snapshot encoding: {err}")))?;
        let temp_path = path.with_extension("json.tmp");
        fs::write(&temp_path, bytes)
            .and_then(|()| fs::rename(&temp_path, path))
            .map_err(|err| {
                RepositoryError::Unavailable(format!(
                    "unable to write data file {}: {err}",
                    path.display()
                ))
            })?;
        debug!(path = %path.display(), "marketplace snapshot written");
        Ok(())
    }

    fn append_click(&self, event: &ClickEvent) -> Result<(), RepositoryError> {
        let Some(data_file) = &self.data_file else {
            return Ok(());
        };

        let path = click_log_path(data_file);
        let mut line = serde_json::to_vec(event)
            .map_err(|err| RepositoryError::Unavailable(format!("click encoding: {err}")))?;
        line.push(b'\n');
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .and_then(|mut log| log.write_all(&line))
            .map_err(|err| {
                RepositoryError::Unavailable(format!(
                    "unable to append to click log {}: {err}",
                    path.display()
                ))
            })
    }
}

impl ApplicationRepository for MarketplaceStore {
    fn create_application(
        &self,
        application: Application,
        job: ApprovalJob,
    ) -> Result<Application, RepositoryError> {
        self.transact(|state| {
            if !state.creators.contains_key(&application.creator_id) {
                return Err(RepositoryError::MissingReference {
                    entity: "creator",
                    id: application.creator_id.0.clone(),
                });
            }
            if !state.offers.contains_key(&application.offer_id) {
                return Err(RepositoryError::MissingReference {
                    entity: "offer",
                    id: application.offer_id.0.clone(),
                });
            }
            if state.applications.contains_key(&application.id) {
                return Err(RepositoryError::Conflict);
            }

            state.approval_jobs.insert(application.id.clone(), job);
            state
                .applications
                .insert(application.id.clone(), application.clone());
            Ok(application)
        })
    }

    fn update_application(
        &self,
        id: &ApplicationId,
        update: ApplicationUpdate,
    ) -> Result<Application, RepositoryError> {
        self.transact(|state| {
            let current = state
                .applications
                .get(id)
                .ok_or(RepositoryError::NotFound)?;

            if let Some(expected) = update.expected_status {
                if current.status != expected {
                    return Err(RepositoryError::StatusMismatch {
                        current: current.status,
                    });
                }
            }

            if let Some(tracking) = &update.tracking {
                match state.tracking_codes.get(tracking.code.as_str()) {
                    Some(owner) if owner != id => {
                        return Err(RepositoryError::DuplicateTrackingCode)
                    }
                    _ => {}
                }
            }

            let mut updated = current.clone();
            if let Some(status) = update.status {
                updated.status = status;
            }
            if let Some(approved_at) = update.approved_at {
                updated.approved_at = Some(approved_at);
            }
            if let Some(tracking) = update.tracking {
                if let Some(previous) = updated.tracking_code() {
                    state.tracking_codes.remove(previous.as_str());
                }
                state
                    .tracking_codes
                    .insert(tracking.code.as_str().to_string(), id.clone());
                updated.tracking = Some(tracking);
            }

            state.applications.insert(id.clone(), updated.clone());
            Ok(updated)
        })
    }

    fn get_application(&self, id: &ApplicationId) -> Result<Option<Application>, RepositoryError> {
        self.read(|state| state.applications.get(id).cloned())
    }

    fn applications_for_creator(
        &self,
        creator_id: &CreatorId,
    ) -> Result<Vec<Application>, RepositoryError> {
        self.read(|state| {
            let mut applications: Vec<Application> = state
                .applications
                .values()
                .filter(|application| &application.creator_id == creator_id)
                .cloned()
                .collect();
            applications.sort_by(|a, b| b.applied_at.cmp(&a.applied_at));
            applications
        })
    }

    fn find_by_tracking_code(&self, code: &str) -> Result<Option<Application>, RepositoryError> {
        self.read(|state| {
            state
                .tracking_codes
                .get(code)
                .and_then(|id| state.applications.get(id))
                .cloned()
        })
    }

    fn due_approvals(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<ApprovalJob>, RepositoryError> {
        self.read(|state| {
            let mut due: Vec<ApprovalJob> = state
                .approval_jobs
                .values()
                .filter(|job| job.due_at <= now)
                .cloned()
                .collect();
            due.sort_by(|a, b| a.due_at.cmp(&b.due_at));
            due.truncate(limit);
            due
        })
    }

    fn reschedule_approval(
        &self,
        id: &ApplicationId,
        due_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        self.transact(|state| {
            let job = state
                .approval_jobs
                .get_mut(id)
                .ok_or(RepositoryError::NotFound)?;
            job.attempts = job.attempts.saturating_add(1);
            job.due_at = due_at;
            Ok(())
        })
    }

    fn complete_approval(&self, id: &ApplicationId) -> Result<(), RepositoryError> {
        let present = self.read(|state| state.approval_jobs.contains_key(id))?;
        if !present {
            return Ok(());
        }

        self.transact(|state| {
            state.approval_jobs.remove(id);
            Ok(())
        })
    }
}

impl OfferCatalog for MarketplaceStore {
    fn get_offer(&self, id: &OfferId) -> Result<Option<Offer>, RepositoryError> {
        self.read(|state| state.offers.get(id).cloned())
    }

    fn get_creator(&self, id: &CreatorId) -> Result<Option<Creator>, RepositoryError> {
        self.read(|state| state.creators.get(id).cloned())
    }
}

impl ClickLedger for MarketplaceStore {
    fn record_click(&self, event: ClickEvent) -> Result<LinkStats, RepositoryError> {
        let known = self.read(|state| state.applications.contains_key(&event.application_id))?;
        if !known {
            return Err(RepositoryError::NotFound);
        }

        let mut totals = self.lock_clicks()?;
        self.append_click(&event)?;
        Ok(totals.apply(&event))
    }

    fn link_stats(
        &self,
        application_id: &ApplicationId,
    ) -> Result<Option<LinkStats>, RepositoryError> {
        let totals = self.lock_clicks()?;
        Ok(totals.link_stats.get(application_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marketplace::applications::domain::{ApplicationStatus, TrackingAssignment};
    use crate::marketplace::offers::{CommissionType, OfferStatus};
    use crate::marketplace::tracking::ShortCode;

    fn seeded_store() -> MarketplaceStore {
        let store = MarketplaceStore::in_memory();
        store
            .upsert_creator(Creator {
                id: CreatorId("C1".to_string()),
                display_name: "Creator One".to_string(),
            })
            .expect("creator stored");
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
    }

    fn pending(id: &str) -> Application {
        Application {
            id: ApplicationId(id.to_string()),
            creator_id: CreatorId("C1".to_string()),
            offer_id: OfferId("O1".to_string()),
            message: None,
            preferred_commission_type: None,
            status: ApplicationStatus::Pending,
            applied_at: Utc::now(),
            approved_at: None,
            tracking: None,
        }
    }

    fn assignment(code: &str) -> TrackingAssignment {
        let code = ShortCode::parse(code).expect("valid code");
        TrackingAssignment {
            link: code.link("https://track.affiliatexchange.com/go/"),
            code,
        }
    }

    fn insert(store: &MarketplaceStore, id: &str) -> Application {
        let application = pending(id);
        let job = ApprovalJob::new(application.id.clone(), application.applied_at);
        store
            .create_application(application, job)
            .expect("application stored")
    }

    #[test]
    fn create_rejects_missing_offer_without_writing() {
        let store = seeded_store();
        let mut application = pending("app-1");
        application.offer_id = OfferId("missing".to_string());
        let job = ApprovalJob::new(application.id.clone(), Utc::now());

        match store.create_application(application, job) {
            Err(RepositoryError::MissingReference { entity, id }) => {
                assert_eq!(entity, "offer");
                assert_eq!(id, "missing");
            }
            other => panic!("expected missing reference, got {other:?}"),
        }
        assert!(store.all_applications().expect("read").is_empty());
        assert_eq!(store.pending_job_count().expect("read"), 0);
    }

    #[test]
    fn create_writes_job_alongside_application() {
        let store = seeded_store();
        insert(&store, "app-1");
        assert_eq!(store.pending_job_count().expect("read"), 1);
        let due = store
            .due_approvals(Utc::now(), 10)
            .expect("due jobs readable");
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].application_id.0, "app-1");
    }

    #[test]
    fn guarded_update_refuses_stale_status() {
        let store = seeded_store();
        insert(&store, "app-1");
        let id = ApplicationId("app-1".to_string());
        store
            .update_application(
                &id,
                ApplicationUpdate::transition(
                    ApplicationStatus::Pending,
                    ApplicationStatus::Rejected,
                ),
            )
            .expect("rejection applies");

        let approval = ApplicationUpdate::approval(Utc::now(), assignment("Ab3dEf7H"));
        match store.update_application(&id, approval) {
            Err(RepositoryError::StatusMismatch { current }) => {
                assert_eq!(current, ApplicationStatus::Rejected)
            }
            other => panic!("expected status mismatch, got {other:?}"),
        }
        let stored = store.get_application(&id).expect("read").expect("present");
        assert!(stored.tracking.is_none());
        assert!(store.find_by_tracking_code("Ab3dEf7H").expect("read").is_none());
    }

    #[test]
    fn duplicate_tracking_codes_are_rejected() {
        let store = seeded_store();
        insert(&store, "app-1");
        insert(&store, "app-2");
        store
            .update_application(
                &ApplicationId("app-1".to_string()),
                ApplicationUpdate::approval(Utc::now(), assignment("Ab3dEf7H")),
            )
            .expect("first approval");

        match store.update_application(
            &ApplicationId("app-2".to_string()),
            ApplicationUpdate::approval(Utc::now(), assignment("Ab3dEf7H")),
        ) {
            Err(RepositoryError::DuplicateTrackingCode) => {}
            other => panic!("expected duplicate code, got {other:?}"),
        }
        let second = store
            .get_application(&ApplicationId("app-2".to_string()))
            .expect("read")
            .expect("present");
        assert_eq!(second.status, ApplicationStatus::Pending);
    }

    #[test]
    fn update_of_unknown_application_is_not_found() {
        let store = seeded_store();
        match store.update_application(
            &ApplicationId("ghost".to_string()),
            ApplicationUpdate::approval(Utc::now(), assignment("Ab3dEf7H")),
        ) {
            Err(RepositoryError::NotFound) => {}
            other => panic!("expected not found, got {other:?}"),
        }
    }

    #[test]
    fn due_approvals_respects_time_and_limit() {
        let store = seeded_store();
        let now = Utc::now();
        for (index, offset) in [30_i64, -30, -60, -90].into_iter().enumerate() {
            let application = pending(&format!("app-{index}"));
            let job = ApprovalJob::new(
                application.id.clone(),
                now + chrono::Duration::seconds(offset),
            );
            store
                .create_application(application, job)
                .expect("stored");
        }

        let due = store.due_approvals(now, 2).expect("read");
        let ids: Vec<&str> = due.iter().map(|job| job.application_id.0.as_str()).collect();
        assert_eq!(ids, vec!["app-3", "app-2"]);
    }

    #[test]
    fn reschedule_and_complete_manage_jobs() {
        let store = seeded_store();
        insert(&store, "app-1");
        let id = ApplicationId("app-1".to_string());
        let later = Utc::now() + chrono::Duration::minutes(5);

        store.reschedule_approval(&id, later).expect("rescheduled");
        assert!(store.due_approvals(Utc::now(), 10).expect("read").is_empty());
        let job = store.due_approvals(later, 10).expect("read");
        assert_eq!(job[0].attempts, 1);

        store.complete_approval(&id).expect("completed");
        store.complete_approval(&id).expect("completing twice is fine");
        assert_eq!(store.pending_job_count().expect("read"), 0);
    }

    #[test]
    fn clicks_count_unique_addresses() {
        let store = seeded_store();
        insert(&store, "app-1");
        let id = ApplicationId("app-1".to_string());
        let code = ShortCode::parse("Ab3dEf7H").expect("valid");
        let click = |hash: Option<&str>| ClickEvent {
            application_id: id.clone(),
            short_code: code.clone(),
            clicked_at: Utc::now(),
            address_hash: hash.map(str::to_string),
            user_agent: None,
            referrer: None,
        };

        store.record_click(click(Some("aaa"))).expect("click");
        store.record_click(click(Some("aaa"))).expect("click");
        let stats = store.record_click(click(Some("bbb"))).expect("click");
        assert_eq!(stats.click_count, 3);
        assert_eq!(stats.unique_click_count, 2);
        assert_eq!(store.link_stats(&id).expect("read"), Some(stats));
    }

    #[test]
    fn snapshot_round_trips_through_data_file() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("marketplace.json");

        {
            let store = MarketplaceStore::open(&path).expect("open empty");
            store
                .upsert_creator(Creator {
                    id: CreatorId("C1".to_string()),
                    display_name: "Creator One".to_string(),
                })
                .expect("creator");
            store
                .upsert_offer(Offer {
                    id: OfferId("O1".to_string()),
                    company_id: "acme".to_string(),
                    title: "Acme headphones".to_string(),
                    commission_type: CommissionType::PerSale,
                    status: OfferStatus::Live,
                    destination_url: "https://acme.example/headphones".to_string(),
                })
                .expect("offer");
            insert(&store, "app-1");
            insert(&store, "app-2");
            store
                .update_application(
                    &ApplicationId("app-1".to_string()),
                    ApplicationUpdate::approval(Utc::now(), assignment("Ab3dEf7H")),
                )
                .expect("approved");
            store
                .complete_approval(&ApplicationId("app-1".to_string()))
                .expect("job done");
        }

        let reopened = MarketplaceStore::open(&path).expect("reopen");
        assert_eq!(reopened.all_applications().expect("read").len(), 2);
        assert_eq!(reopened.pending_job_count().expect("read"), 1);
        let by_code = reopened
            .find_by_tracking_code("Ab3dEf7H")
            .expect("read")
            .expect("index rebuilt");
        assert_eq!(by_code.id.0, "app-1");
    }

    #[test]
    fn clicks_append_to_log_and_replay_on_reopen() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("marketplace.json");
        let id = ApplicationId("app-1".to_string());
        let code = ShortCode::parse("Ab3dEf7H").expect("valid");
        let click = |hash: &str| ClickEvent {
            application_id: id.clone(),
            short_code: code.clone(),
            clicked_at: Utc::now(),
            address_hash: Some(hash.to_string()),
            user_agent: None,
            referrer: None,
        };

        {
            let store = MarketplaceStore::open(&path).expect("open empty");
            store
                .upsert_creator(Creator {
                    id: CreatorId("C1".to_string()),
                    display_name: "Creator One".to_string(),
                })
                .expect("creator");
            store
                .upsert_offer(Offer {
                    id: OfferId("O1".to_string()),
                    company_id: "acme".to_string(),
                    title: "Acme headphones".to_string(),
                    commission_type: CommissionType::PerSale,
                    status: OfferStatus::Live,
                    destination_url: "https://acme.example/headphones".to_string(),
                })
                .expect("offer");
            insert(&store, "app-1");

            let snapshot_before = fs::read(&path).expect("snapshot written");
            for hash in ["aaa", "aaa", "bbb"] {
                store.record_click(click(hash)).expect("click");
            }
            assert_eq!(fs::read(&path).expect("snapshot"), snapshot_before);
        }

        let log = fs::read_to_string(click_log_path(&path)).expect("click log written");
        assert_eq!(log.lines().count(), 3);

        let reopened = MarketplaceStore::open(&path).expect("reopen");
        let stats = reopened.link_stats(&id).expect("read").expect("replayed");
        assert_eq!(stats.click_count, 3);
        assert_eq!(stats.unique_click_count, 2);

        let stats = reopened.record_click(click("aaa")).expect("click");
        assert_eq!(stats.click_count, 4);
        assert_eq!(stats.unique_click_count, 2);
    }

    #[test]
    fn torn_click_log_entry_is_skipped() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("marketplace.json");
        let id = ApplicationId("app-1".to_string());
        let event = ClickEvent {
            application_id: id.clone(),
            short_code: ShortCode::parse("Ab3dEf7H").expect("valid"),
            clicked_at: Utc::now(),
            address_hash: None,
            user_agent: None,
            referrer: None,
        };
        let mut log = serde_json::to_string(&event).expect("encode");
        log.push_str("\n{\"applicationId\":\"app-1\",\"shortC");
        fs::write(click_log_path(&path), log).expect("write");

        let store = MarketplaceStore::open(&path).expect("open");
        let stats = store.link_stats(&id).expect("read").expect("replayed");
        assert_eq!(stats.click_count, 1);
    }

    #[test]
    fn click_for_unknown_application_is_not_logged() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("marketplace.json");
        let store = MarketplaceStore::open(&path).expect("open");
        let event = ClickEvent {
            application_id: ApplicationId("ghost".to_string()),
            short_code: ShortCode::parse("Ab3dEf7H").expect("valid"),
            clicked_at: Utc::now(),
            address_hash: None,
            user_agent: None,
            referrer: None,
        };

        assert!(matches!(
            store.record_click(event),
            Err(RepositoryError::NotFound)
        ));
        assert!(!click_log_path(&path).exists());
    }

    #[test]
    fn corrupt_data_file_is_reported() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("marketplace.json");
        fs::write(&path, b"{not json").expect("write");

        match MarketplaceStore::open(&path) {
            Err(RepositoryError::Unavailable(message)) => {
                assert!(message.contains("not a valid snapshot"))
            }
            other => panic!("expected unavailable error, got {other:?}"),
        }
    }
}
