//! Core domain logic for CoursePulse, the course-evaluation platform.
//! This crate is the single source of truth for publication and
//! aggregation invariants.

pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod stats;
pub mod sync;

pub use logging::{default_log_level, init_logging, logging_status};
pub use model::formation::{Formation, FormationId};
pub use model::publication::{Publication, PublicationId};
pub use model::submission::{
    Answer, AnswerValidationError, AnswerValue, RespondentId, Submission, SubmissionId,
};
pub use model::template::{
    Question, QuestionDraft, QuestionId, QuestionOption, QuestionType, Role, Section, SectionId,
    Template, TemplateId, TemplateStatus, TemplateValidationError, LIKERT_MAX, LIKERT_MIN,
};
pub use repo::catalog_repo::{CatalogRepoError, CatalogRepository, SqliteCatalogRepository};
pub use repo::formation_repo::{
    DirectoryRepoError, FormationDirectory, SqliteFormationDirectory,
};
pub use repo::publication_repo::{
    PublicationRepoError, PublicationRepository, SqlitePublicationRepository,
};
pub use repo::submission_repo::{
    AnswerUpsert, SqliteSubmissionRepository, SubmissionRepoError, SubmissionRepository,
};
pub use service::catalog_service::{CatalogService, CatalogServiceError};
pub use service::publication_service::{GateError, PublicationService};
pub use service::submission_service::{
    AnswerInput, SubmissionService, SubmitError, SubmitOutcome, SubmitRequest,
};
pub use stats::{
    overall_statistics, overall_statistics_with_cancel, publication_statistics,
    publication_statistics_with_cancel, CancelToken, DistributionBucket, FormationBreakdown,
    OverallStatistics, PublicationStatistics, QuestionStatistics, SectionStatistics, StatsError,
};
pub use sync::directory_sync::{apply_directory_events, DirectoryEvent, SyncReport};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
