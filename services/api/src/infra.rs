use engagement_tracker::workflows::engagement::{
    EngagementRecord, EngagementRepository, OwnerId, Page, PostId, RepositoryError,
    WeightConfiguration,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Process-local store. Records are keyed by owner then post id, which gives the post id
/// ordering paging relies on.
#[derive(Default, Clone)]
pub(crate) struct InMemoryEngagementRepository {
    records: Arc<Mutex<BTreeMap<(OwnerId, PostId), EngagementRecord>>>,
    weights: Arc<Mutex<HashMap<OwnerId, WeightConfiguration>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, RepositoryError> {
    mutex
        .lock()
        .map_err(|_| RepositoryError::Unavailable("in-memory store poisoned".to_string()))
}

impl EngagementRepository for InMemoryEngagementRepository {
    fn records(
        &self,
        owner_id: &OwnerId,
        page: Page,
    ) -> Result<Vec<EngagementRecord>, RepositoryError> {
        let guard = lock(&self.records)?;
        Ok(guard
            .range((owner_id.clone(), PostId(String::new()))..)
            .take_while(|((owner, _), _)| owner == owner_id)
            .skip(page.offset)
            .take(page.limit)
            .map(|(_, record)| record.clone())
            .collect())
    }

    fn upsert_record(&self, record: EngagementRecord) -> Result<(), RepositoryError> {
        let (post_id, owner_id) = record.natural_key();
        let key = (owner_id.clone(), post_id.clone());
        let mut guard = lock(&self.records)?;
        guard.insert(key, record);
        Ok(())
    }

    fn weights(&self, owner_id: &OwnerId) -> Result<Option<WeightConfiguration>, RepositoryError> {
        let guard = lock(&self.weights)?;
        Ok(guard.get(owner_id).copied())
    }

    fn save_weights(
        &self,
        owner_id: &OwnerId,
        weights: &WeightConfiguration,
    ) -> Result<(), RepositoryError> {
        let mut guard = lock(&self.weights)?;
        guard.insert(owner_id.clone(), *weights);
        Ok(())
    }
}
