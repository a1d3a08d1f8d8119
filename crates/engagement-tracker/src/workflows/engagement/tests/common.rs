use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex};

use axum::response::Response;
use serde_json::Value;

use crate::workflows::engagement::{
    engagement_router, EngagementRecord, EngagementRepository, EngagementService, OwnerId, Page,
    PostId, RepositoryError, ScoringConfig, WeightConfiguration,
};

pub(super) const PER_POST_CSV: &str = "Tweet ID,Tweet text,Posted date,Likes,Retweets,Replies,Mentions
101,Launch day,2024-01-15 14:30:00,10,5,3,2
";

pub(super) fn owner() -> OwnerId {
    OwnerId("owner-1".to_string())
}

pub(super) fn scoring_config(page_size: usize) -> ScoringConfig {
    ScoringConfig {
        recompute_page_size: page_size,
        dashboard_limit: 50,
    }
}

/// CSV with `count` posts; post `n` has `n` likes and nothing else.
pub(super) fn numbered_posts_csv(count: u64) -> String {
    let mut csv = String::from("Tweet ID,Likes,Retweets,Replies,Mentions\n");
    for n in 1..=count {
        csv.push_str(&format!("post-{n:03},{n},0,0,0\n"));
    }
    csv
}

pub(super) fn point_values(
    like: i64,
    retweet: i64,
    reply: i64,
    mention: i64,
) -> BTreeMap<String, Value> {
    [
        ("like", like),
        ("retweet", retweet),
        ("reply", reply),
        ("mention", mention),
    ]
    .into_iter()
    .map(|(key, value)| (key.to_string(), Value::from(value)))
    .collect()
}

pub(super) fn build_service(
    page_size: usize,
) -> (EngagementService<MemoryRepository>, Arc<MemoryRepository>) {
    let repository = Arc::new(MemoryRepository::default());
    let service = EngagementService::new(repository.clone(), scoring_config(page_size));
    (service, repository)
}

#[derive(Default, Clone)]
pub(super) struct MemoryRepository {
    records: Arc<Mutex<BTreeMap<(OwnerId, PostId), EngagementRecord>>>,
    weights: Arc<Mutex<HashMap<OwnerId, WeightConfiguration>>>,
}

impl MemoryRepository {
    pub(super) fn record(&self, owner_id: &OwnerId, post_id: &str) -> Option<EngagementRecord> {
        self.records
            .lock()
            .expect("repository mutex poisoned")
            .get(&(owner_id.clone(), PostId(post_id.to_string())))
            .cloned()
    }

    pub(super) fn all(&self, owner_id: &OwnerId) -> Vec<EngagementRecord> {
        self.records
            .lock()
            .expect("repository mutex poisoned")
            .values()
            .filter(|record| &record.owner_id == owner_id)
            .cloned()
            .collect()
    }

    pub(super) fn stored_weights(&self, owner_id: &OwnerId) -> Option<WeightConfiguration> {
        self.weights
            .lock()
            .expect("weights mutex poisoned")
            .get(owner_id)
            .copied()
    }
}

impl EngagementRepository for MemoryRepository {
    fn records(
        &self,
        owner_id: &OwnerId,
        page: Page,
    ) -> Result<Vec<EngagementRecord>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard
            .values()
            .filter(|record| &record.owner_id == owner_id)
            .skip(page.offset)
            .take(page.limit)
            .cloned()
            .collect())
    }

    fn upsert_record(&self, record: EngagementRecord) -> Result<(), RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        guard.insert((record.owner_id.clone(), record.post_id.clone()), record);
        Ok(())
    }

    fn weights(&self, owner_id: &OwnerId) -> Result<Option<WeightConfiguration>, RepositoryError> {
        Ok(self.stored_weights(owner_id))
    }

    fn save_weights(
        &self,
        owner_id: &OwnerId,
        weights: &WeightConfiguration,
    ) -> Result<(), RepositoryError> {
        self.weights
            .lock()
            .expect("weights mutex poisoned")
            .insert(owner_id.clone(), *weights);
        Ok(())
    }
}

/// Memory repository that rejects writes for selected post ids.
#[derive(Default, Clone)]
pub(super) struct FlakyRepository {
    pub(super) inner: MemoryRepository,
    failing: Arc<Mutex<HashSet<PostId>>>,
}

impl FlakyRepository {
    pub(super) fn fail_writes_for(&self, post_id: &str) {
        self.failing
            .lock()
            .expect("flaky mutex poisoned")
            .insert(PostId(post_id.to_string()));
    }
}

impl EngagementRepository for FlakyRepository {
    fn records(
        &self,
        owner_id: &OwnerId,
        page: Page,
    ) -> Result<Vec<EngagementRecord>, RepositoryError> {
        self.inner.records(owner_id, page)
    }

    fn upsert_record(&self, record: EngagementRecord) -> Result<(), RepositoryError> {
        let failing = self.failing.lock().expect("flaky mutex poisoned");
        if failing.contains(&record.post_id) {
            return Err(RepositoryError::Unavailable("write rejected".to_string()));
        }
        drop(failing);
        self.inner.upsert_record(record)
    }

    fn weights(&self, owner_id: &OwnerId) -> Result<Option<WeightConfiguration>, RepositoryError> {
        self.inner.weights(owner_id)
    }

    fn save_weights(
        &self,
        owner_id: &OwnerId,
        weights: &WeightConfiguration,
    ) -> Result<(), RepositoryError> {
        self.inner.save_weights(owner_id, weights)
    }
}

pub(super) struct UnavailableRepository;

impl EngagementRepository for UnavailableRepository {
    fn records(
        &self,
        _owner_id: &OwnerId,
        _page: Page,
    ) -> Result<Vec<EngagementRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn upsert_record(&self, _record: EngagementRecord) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn weights(&self, _owner_id: &OwnerId) -> Result<Option<WeightConfiguration>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn save_weights(
        &self,
        _owner_id: &OwnerId,
        _weights: &WeightConfiguration,
    ) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

/// Weight saves park until the sender returned by [`GatedRepository::new`] sends or drops.
pub(super) struct GatedRepository {
    saving: AtomicBool,
    gate: Mutex<mpsc::Receiver<()>>,
}

impl GatedRepository {
    pub(super) fn new() -> (Self, mpsc::Sender<()>) {
        let (open, gate) = mpsc::channel();
        let repository = Self {
            saving: AtomicBool::new(false),
            gate: Mutex::new(gate),
        };
        (repository, open)
    }

    pub(super) fn save_in_progress(&self) -> bool {
        self.saving.load(Ordering::SeqCst)
    }
}

impl EngagementRepository for GatedRepository {
    fn records(
        &self,
        _owner_id: &OwnerId,
        _page: Page,
    ) -> Result<Vec<EngagementRecord>, RepositoryError> {
        Ok(Vec::new())
    }

    fn upsert_record(&self, _record: EngagementRecord) -> Result<(), RepositoryError> {
        Ok(())
    }

    fn weights(&self, _owner_id: &OwnerId) -> Result<Option<WeightConfiguration>, RepositoryError> {
        Ok(None)
    }

    fn save_weights(
        &self,
        _owner_id: &OwnerId,
        _weights: &WeightConfiguration,
    ) -> Result<(), RepositoryError> {
        self.saving.store(true, Ordering::SeqCst);
        let gate = self.gate.lock().expect("gate mutex poisoned");
        // a dropped sender opens the gate too
        let _ = gate.recv();
        Ok(())
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

pub(super) fn router_with_service(service: EngagementService<MemoryRepository>) -> axum::Router {
    engagement_router(Arc::new(service))
}
