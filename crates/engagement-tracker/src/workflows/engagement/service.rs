use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use super::domain::{EngagementRecord, OwnerId, Page, PostId};
use super::impact::PointImpactAnalysis;
use super::repository::{EngagementRepository, RepositoryError};
use super::scoring::{self, RecalculationReport, ScoringEngine};
use super::weights::{InvalidWeights, WeightConfiguration};
use crate::workflows::ingest::{self, ExportLayout, IngestError, ParseError};

/// Tunables for scoring passes and dashboard reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoringConfig {
    pub recompute_page_size: usize,
    pub dashboard_limit: usize,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            recompute_page_size: 500,
            dashboard_limit: 50,
        }
    }
}

/// Result of one CSV upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadReport {
    pub layout: ExportLayout,
    pub records_processed: usize,
    pub records_stored: usize,
    /// Earlier rows replaced by a later row with the same post id in the same file.
    pub duplicates_superseded: usize,
    pub storage_failures: usize,
    pub errors: Vec<ParseError>,
}

impl UploadReport {
    /// `Row N: message` lines for display.
    pub fn error_messages(&self) -> Vec<String> {
        self.errors.iter().map(ToString::to_string).collect()
    }
}

/// Ranked view of an owner's posts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngagementDashboard {
    pub owner_id: OwnerId,
    pub weights: WeightConfiguration,
    pub record_count: usize,
    pub total_score: u64,
    pub posts: Vec<EngagementRecord>,
}

/// Per-owner mutexes. An owner's entry only lives while some caller holds or waits on it.
#[derive(Default)]
struct OwnerLocks {
    locks: Mutex<HashMap<OwnerId, Arc<Mutex<()>>>>,
}

impl OwnerLocks {
    fn with_owner<T>(&self, owner_id: &OwnerId, work: impl FnOnce() -> T) -> T {
        let lock = self.acquire(owner_id);
        let result = {
            let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
            work()
        };
        self.release(owner_id, lock);
        result
    }

    fn acquire(&self, owner_id: &OwnerId) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.entry(owner_id.clone()).or_default().clone()
    }

    // Clones are only taken under the map lock, so a count of two (map plus ours) means
    // nobody else is waiting.
    fn release(&self, owner_id: &OwnerId, lock: Arc<Mutex<()>>) {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        let idle = locks
            .get(owner_id)
            .is_some_and(|current| Arc::ptr_eq(current, &lock) && Arc::strong_count(&lock) == 2);
        if idle {
            locks.remove(owner_id);
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

/// Service composing ingestion, the scoring engine and weight management.
///
/// Every operation that reads weights and writes scores for an owner runs under that
/// owner's lock, so concurrent weight updates are linearized and no record is stored with
/// a score computed from superseded weights.
pub struct EngagementService<R> {
    repository: Arc<R>,
    engine: ScoringEngine<R>,
    locks: OwnerLocks,
    config: ScoringConfig,
}

impl<R> EngagementService<R>
where
    R: EngagementRepository + 'static,
{
    pub fn new(repository: Arc<R>, config: ScoringConfig) -> Self {
        let engine = ScoringEngine::new(repository.clone(), config.recompute_page_size);
        Self {
            repository,
            engine,
            locks: OwnerLocks::default(),
            config,
        }
    }

    pub fn score_one(&self, record: &EngagementRecord, weights: &WeightConfiguration) -> u64 {
        scoring::score(&record.counts, weights)
    }

    pub fn weights(&self, owner_id: &OwnerId) -> Result<WeightConfiguration, EngagementServiceError> {
        Ok(self.engine.current_weights(owner_id)?)
    }

    /// Ingest an export, score each record with the owner's current weights and store it.
    ///
    /// When a post id appears more than once in the file only the last row is stored.
    pub fn upload(
        &self,
        owner_id: &OwnerId,
        raw: &[u8],
    ) -> Result<UploadReport, EngagementServiceError> {
        let outcome = ingest::ingest(raw, owner_id)?;
        let records_processed = outcome.records.len();
        let (records, duplicates_superseded) = keep_last_per_post(outcome.records);

        let (records_stored, storage_failures) = self.locks.with_owner(owner_id, || {
            let weights = self.engine.current_weights(owner_id)?;
            let mut stored = 0;
            let mut failures = 0;
            for mut record in records {
                scoring::apply_score(&mut record, &weights);
                let post_id = record.post_id.0.clone();
                match self.repository.upsert_record(record) {
                    Ok(()) => stored += 1,
                    Err(err) => {
                        warn!(%owner_id, post_id = %post_id, error = %err, "failed to store record");
                        failures += 1;
                    }
                }
            }
            Ok::<_, RepositoryError>((stored, failures))
        })?;

        info!(
            %owner_id,
            layout = ?outcome.layout,
            records_processed,
            records_stored,
            row_errors = outcome.errors.len(),
            "processed engagement upload"
        );

        Ok(UploadReport {
            layout: outcome.layout,
            records_processed,
            records_stored,
            duplicates_superseded,
            storage_failures,
            errors: outcome.errors,
        })
    }

    /// Validate submitted point values, persist them and rescore every stored record.
    pub fn update_weights(
        &self,
        owner_id: &OwnerId,
        point_values: &BTreeMap<String, Value>,
    ) -> Result<RecalculationReport, EngagementServiceError> {
        let weights = WeightConfiguration::from_point_values(point_values)?;
        self.set_weights(owner_id, weights)
    }

    /// Persist already validated weights, then rescore. The weights are committed before
    /// the rescoring pass reads them; a failed save leaves scores untouched.
    pub fn set_weights(
        &self,
        owner_id: &OwnerId,
        weights: WeightConfiguration,
    ) -> Result<RecalculationReport, EngagementServiceError> {
        let report = self.locks.with_owner(owner_id, || {
            self.repository.save_weights(owner_id, &weights)?;
            self.engine.recompute_all(owner_id)
        })?;
        info!(
            %owner_id,
            updated = report.updated_count,
            failed = report.failed_count,
            "point values updated"
        );
        Ok(report)
    }

    pub fn recompute_all(
        &self,
        owner_id: &OwnerId,
    ) -> Result<RecalculationReport, EngagementServiceError> {
        Ok(self
            .locks
            .with_owner(owner_id, || self.engine.recompute_all(owner_id))?)
    }

    #[cfg(test)]
    pub(crate) fn active_owner_locks(&self) -> usize {
        self.locks.len()
    }

    /// Posts ranked by score (highest first, ties by post id) with the owner's total.
    pub fn dashboard(
        &self,
        owner_id: &OwnerId,
        limit: Option<usize>,
    ) -> Result<EngagementDashboard, EngagementServiceError> {
        let weights = self.engine.current_weights(owner_id)?;
        let mut posts = self.all_records(owner_id)?;
        let record_count = posts.len();
        let total_score = posts
            .iter()
            .fold(0u64, |total, record| total.saturating_add(record.engagement_score));

        posts.sort_by(|a, b| {
            b.engagement_score
                .cmp(&a.engagement_score)
                .then_with(|| a.post_id.cmp(&b.post_id))
        });
        posts.truncate(limit.unwrap_or(self.config.dashboard_limit));

        Ok(EngagementDashboard {
            owner_id: owner_id.clone(),
            weights,
            record_count,
            total_score,
            posts,
        })
    }

    pub fn impact(&self, owner_id: &OwnerId) -> Result<PointImpactAnalysis, EngagementServiceError> {
        let weights = self.engine.current_weights(owner_id)?;
        Ok(PointImpactAnalysis::for_weights(&weights))
    }

    fn all_records(&self, owner_id: &OwnerId) -> Result<Vec<EngagementRecord>, RepositoryError> {
        let mut records = Vec::new();
        let mut page = Page::first(self.engine.page_size());
        loop {
            let batch = self.repository.records(owner_id, page)?;
            let fetched = batch.len();
            records.extend(batch);
            if fetched < page.limit {
                return Ok(records);
            }
            page = page.next();
        }
    }
}

fn keep_last_per_post(records: Vec<EngagementRecord>) -> (Vec<EngagementRecord>, usize) {
    let mut last_seen: HashMap<PostId, usize> = HashMap::with_capacity(records.len());
    for (index, record) in records.iter().enumerate() {
        last_seen.insert(record.post_id.clone(), index);
    }

    let total = records.len();
    let kept: Vec<EngagementRecord> = records
        .into_iter()
        .enumerate()
        .filter(|(index, record)| last_seen.get(&record.post_id) == Some(index))
        .map(|(_, record)| record)
        .collect();
    let superseded = total - kept.len();
    (kept, superseded)
}

/// Error raised by the engagement service.
#[derive(Debug, thiserror::Error)]
pub enum EngagementServiceError {
    #[error(transparent)]
    Ingest(#[from] IngestError),
    #[error("invalid point values: {0}")]
    InvalidWeights(#[from] InvalidWeights),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}
