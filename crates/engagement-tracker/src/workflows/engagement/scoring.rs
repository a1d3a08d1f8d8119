use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::domain::{EngagementCounts, EngagementKind, EngagementRecord, OwnerId, Page};
use super::repository::{EngagementRepository, RepositoryError};
use super::weights::WeightConfiguration;

/// Lookup of the points awarded per engagement kind.
pub trait PointValues {
    fn points(&self, kind: EngagementKind) -> u64;
}

impl PointValues for WeightConfiguration {
    fn points(&self, kind: EngagementKind) -> u64 {
        u64::from(self.get(kind))
    }
}

/// Partial overrides: a kind missing from the map is worth nothing.
impl PointValues for BTreeMap<EngagementKind, u32> {
    fn points(&self, kind: EngagementKind) -> u64 {
        self.get(&kind).copied().map(u64::from).unwrap_or(0)
    }
}

/// Weighted sum of the four counts. Saturates at `u64::MAX`.
pub fn score<P>(counts: &EngagementCounts, weights: &P) -> u64
where
    P: PointValues + ?Sized,
{
    EngagementKind::ALL.into_iter().fold(0u64, |total, kind| {
        total.saturating_add(counts.get(kind).saturating_mul(weights.points(kind)))
    })
}

/// Outcome of a bulk rescoring pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecalculationReport {
    pub updated_count: usize,
    pub failed_count: usize,
}

/// Applies the owner's persisted weights to stored records.
pub struct ScoringEngine<R> {
    repository: Arc<R>,
    page_size: usize,
}

impl<R> ScoringEngine<R>
where
    R: EngagementRepository,
{
    pub fn new(repository: Arc<R>, page_size: usize) -> Self {
        Self {
            repository,
            page_size: page_size.max(1),
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Persisted weights for the owner, falling back to the defaults.
    pub fn current_weights(
        &self,
        owner_id: &OwnerId,
    ) -> Result<WeightConfiguration, RepositoryError> {
        Ok(self.repository.weights(owner_id)?.unwrap_or_default())
    }

    /// Rescore every stored record of the owner against the currently persisted weights.
    ///
    /// Individual write failures are logged and counted, the remaining records are still
    /// written. Failing to read the weights or a page of records aborts the pass.
    pub fn recompute_all(
        &self,
        owner_id: &OwnerId,
    ) -> Result<RecalculationReport, RepositoryError> {
        let weights = self.current_weights(owner_id)?;
        let mut report = RecalculationReport::default();
        let mut page = Page::first(self.page_size);

        loop {
            let batch = self.repository.records(owner_id, page)?;
            let fetched = batch.len();
            debug!(%owner_id, offset = page.offset, fetched, "rescoring page");

            for mut record in batch {
                record.engagement_score = score(&record.counts, &weights);
                let post_id = record.post_id.0.clone();
                match self.repository.upsert_record(record) {
                    Ok(()) => report.updated_count += 1,
                    Err(err) => {
                        warn!(
                            %owner_id,
                            post_id = %post_id,
                            error = %err,
                            "failed to store recomputed score"
                        );
                        report.failed_count += 1;
                    }
                }
            }

            if fetched < page.limit {
                break;
            }
            page = page.next();
        }

        Ok(report)
    }
}

/// Assign the score for `weights` to a freshly ingested record.
pub fn apply_score<P>(record: &mut EngagementRecord, weights: &P)
where
    P: PointValues + ?Sized,
{
    record.engagement_score = score(&record.counts, weights);
}
