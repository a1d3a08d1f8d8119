use super::domain::{EngagementRecord, OwnerId, Page};
use super::weights::WeightConfiguration;

/// Storage abstraction so scoring and ingestion can be exercised in isolation.
pub trait EngagementRepository: Send + Sync {
    /// Records for one owner, ordered by post id, restricted to `page`.
    fn records(
        &self,
        owner_id: &OwnerId,
        page: Page,
    ) -> Result<Vec<EngagementRecord>, RepositoryError>;

    /// Insert or replace the record sharing `(post_id, owner_id)`.
    fn upsert_record(&self, record: EngagementRecord) -> Result<(), RepositoryError>;

    /// Stored point values; `None` when the owner never customized them.
    fn weights(&self, owner_id: &OwnerId) -> Result<Option<WeightConfiguration>, RepositoryError>;

    fn save_weights(
        &self,
        owner_id: &OwnerId,
        weights: &WeightConfiguration,
    ) -> Result<(), RepositoryError>;
}

/// Storage backend failure. Upserts replace existing rows and missing weights read as
/// `None`, so the backend being unreachable is the only failure callers handle.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}
