//! Statistics read models in reporting wire shape.
//!
//! Field names serialize to camelCase to match the reporting layer; question
//! kind serializes as a `type` string tag.

use crate::model::publication::PublicationId;
use crate::model::template::{QuestionId, QuestionType};
use serde::{Deserialize, Serialize};

/// One distribution bucket for an enumerated question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistributionBucket {
    /// Answer value this bucket counts.
    pub value: i64,
    /// Display label from the question's option list, or a fallback.
    pub label: String,
    pub count: u64,
    /// `count / totalAnswers * 100`, plain floating point.
    pub percentage: f64,
}

/// Aggregated statistics for one question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionStatistics {
    pub question_uuid: QuestionId,
    /// Question wording.
    pub text: String,
    #[serde(rename = "type")]
    pub kind: QuestionType,
    /// Count of recorded (non-null) values for this question.
    pub total_answers: u64,
    /// Arithmetic mean. `Some` only for Likert questions with data.
    pub average_score: Option<f64>,
    /// Buckets per distinct value present, ordered by value ascending.
    /// Empty for Text questions.
    pub answer_distribution: Vec<DistributionBucket>,
    /// Non-blank text values verbatim, in submission order. Empty for
    /// enumerated questions.
    pub text_answers: Vec<String>,
}

/// Question statistics grouped under their owning section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionStatistics {
    pub title: String,
    pub display_order: i64,
    pub questions: Vec<QuestionStatistics>,
}

/// Full statistics for one publication.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicationStatistics {
    pub publication_uuid: PublicationId,
    /// Completed submissions only.
    pub total_submissions: u64,
    /// Completed over all submissions for this publication, percent.
    pub completion_rate: f64,
    pub sections: Vec<SectionStatistics>,
}

/// Per-formation slice of the overall summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormationBreakdown {
    pub code: String,
    pub title: String,
    pub submission_count: u64,
    /// Mean of Likert values across completed submissions; `None` when no
    /// Likert data exists for the formation.
    pub average_rating: Option<f64>,
}

/// Cross-publication summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverallStatistics {
    /// Published templates.
    pub total_questionnaires: u64,
    /// All submissions, drafts included.
    pub total_submissions: u64,
    /// Completed over all submissions, percent; 0.0 on an empty store.
    pub overall_completion_rate: f64,
    pub per_formation: Vec<FormationBreakdown>,
}
