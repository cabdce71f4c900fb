//! Statistics aggregation over completed submissions.
//!
//! # Responsibility
//! - Turn raw answers into per-question, per-section, and per-formation
//!   summaries for the reporting layer.
//! - Degrade to zero-filled results on sparse or empty data, never error.
//!
//! # Invariants
//! - Missing answers are skipped, never counted as zero.
//! - Only completed submissions feed question statistics.
//! - All values are computed live from the store; no sampled placeholders.

pub mod aggregate;
pub mod report;

pub use aggregate::{
    overall_statistics, overall_statistics_with_cancel, publication_statistics,
    publication_statistics_with_cancel, CancelToken, StatsError, StatsResult,
};
pub use report::{
    DistributionBucket, FormationBreakdown, OverallStatistics, PublicationStatistics,
    QuestionStatistics, SectionStatistics,
};
