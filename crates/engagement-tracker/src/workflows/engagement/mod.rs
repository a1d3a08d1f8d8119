//! Engagement scoring: owner-tunable point values applied to imported post metrics.
//!
//! Records arrive through [`crate::workflows::ingest`], get scored against the owner's
//! current [`WeightConfiguration`] and are persisted through an [`EngagementRepository`].
//! Changing the weights rescores every stored record of that owner.

pub mod domain;
pub mod impact;
pub mod repository;
pub mod router;
pub mod scoring;
pub mod service;
pub mod weights;

#[cfg(test)]
mod tests;

pub use domain::{
    EngagementCounts, EngagementKind, EngagementRecord, OwnerId, Page, PostId, RecordId,
};
pub use impact::{ExampleScenarios, ImpactRecommendations, ImpactScenario, PointImpactAnalysis};
pub use repository::{EngagementRepository, RepositoryError};
pub use router::engagement_router;
pub use scoring::{score, PointValues, RecalculationReport, ScoringEngine};
pub use service::{
    EngagementDashboard, EngagementService, EngagementServiceError, ScoringConfig, UploadReport,
};
pub use weights::{InvalidWeights, WeightConfiguration};
