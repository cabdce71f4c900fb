//! Aggregation algorithms over the submission store.
//!
//! # Responsibility
//! - Compute per-question statistics branched by question type.
//! - Roll questions up into sections and publications into the overall
//!   summary.
//!
//! # Invariants
//! - Reads are point-in-time; concurrent submissions may land after the
//!   snapshot and simply show up in the next run.
//! - Distribution buckets are ordered by value ascending.
//! - A cancelled run returns `Cancelled` and no partial results.

use crate::db::DbError;
use crate::model::publication::PublicationId;
use crate::model::submission::AnswerValue;
use crate::model::template::{Question, QuestionId, QuestionType, Section};
use crate::repo::catalog_repo::{CatalogRepoError, CatalogRepository, SqliteCatalogRepository};
use crate::stats::report::{
    DistributionBucket, FormationBreakdown, OverallStatistics, PublicationStatistics,
    QuestionStatistics, SectionStatistics,
};
use log::info;
use rusqlite::{Connection, OptionalExtension};
use std::collections::{BTreeMap, HashMap};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

pub type StatsResult<T> = Result<T, StatsError>;

/// Errors from statistics aggregation.
#[derive(Debug)]
pub enum StatsError {
    /// Target publication does not exist.
    PublicationNotFound(PublicationId),
    /// Run was cancelled cooperatively between questions.
    Cancelled,
    Catalog(CatalogRepoError),
    Db(DbError),
    /// Persisted data cannot be converted to a valid read model.
    InvalidData(String),
}

impl Display for StatsError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PublicationNotFound(id) => write!(f, "publication not found: {id}"),
            Self::Cancelled => write!(f, "statistics aggregation cancelled"),
            Self::Catalog(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid statistics data: {message}"),
        }
    }
}

impl Error for StatsError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Catalog(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<CatalogRepoError> for StatsError {
    fn from(value: CatalogRepoError) -> Self {
        Self::Catalog(value)
    }
}

impl From<DbError> for StatsError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StatsError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Cooperative cancellation handle checked between aggregation units.
///
/// Cloned handles share one flag; any clone can cancel the run.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation; the running aggregation stops at its next
    /// check point.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Computes full statistics for one publication.
pub fn publication_statistics(
    conn: &Connection,
    publication_uuid: PublicationId,
) -> StatsResult<PublicationStatistics> {
    publication_statistics_with_cancel(conn, publication_uuid, &CancelToken::new())
}

/// Computes full statistics for one publication with cooperative
/// cancellation between questions.
pub fn publication_statistics_with_cancel(
    conn: &Connection,
    publication_uuid: PublicationId,
    cancel: &CancelToken,
) -> StatsResult<PublicationStatistics> {
    let started_at = Instant::now();

    let template_uuid: Option<String> = conn
        .query_row(
            "SELECT template_uuid FROM publications WHERE publication_uuid = ?1;",
            [publication_uuid.to_string()],
            |row| row.get(0),
        )
        .optional()?;
    let Some(template_uuid_text) = template_uuid else {
        return Err(StatsError::PublicationNotFound(publication_uuid));
    };
    let template_uuid = Uuid::parse_str(&template_uuid_text).map_err(|_| {
        StatsError::InvalidData(format!(
            "invalid uuid `{template_uuid_text}` in publications.template_uuid"
        ))
    })?;

    let catalog = SqliteCatalogRepository::try_new(conn)?;
    let template = catalog
        .load_template_by_id(template_uuid)?
        .ok_or_else(|| {
            StatsError::InvalidData(format!(
                "publication {publication_uuid} references missing template {template_uuid}"
            ))
        })?;

    let (total, completed): (i64, i64) = conn.query_row(
        "SELECT COUNT(*), COALESCE(SUM(is_completed), 0)
         FROM submissions
         WHERE publication_uuid = ?1;",
        [publication_uuid.to_string()],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;

    let mut values_by_question = load_completed_answers(conn, publication_uuid)?;

    let mut sections = Vec::with_capacity(template.sections.len());
    for section in &template.sections {
        sections.push(section_statistics(section, &mut values_by_question, cancel)?);
    }

    let stats = PublicationStatistics {
        publication_uuid,
        total_submissions: completed.max(0) as u64,
        completion_rate: percentage(completed.max(0) as u64, total.max(0) as u64),
        sections,
    };

    info!(
        "event=stats_publication module=stats status=ok publication={} submissions={} questions={} duration_ms={}",
        publication_uuid,
        stats.total_submissions,
        template.question_count(),
        started_at.elapsed().as_millis()
    );

    Ok(stats)
}

/// Computes the cross-publication summary.
pub fn overall_statistics(conn: &Connection) -> StatsResult<OverallStatistics> {
    overall_statistics_with_cancel(conn, &CancelToken::new())
}

/// Computes the cross-publication summary with cooperative cancellation
/// between formations.
pub fn overall_statistics_with_cancel(
    conn: &Connection,
    cancel: &CancelToken,
) -> StatsResult<OverallStatistics> {
    let started_at = Instant::now();

    let total_questionnaires: i64 = conn.query_row(
        "SELECT COUNT(*) FROM templates WHERE status = 'published';",
        [],
        |row| row.get(0),
    )?;

    let (total_submissions, completed): (i64, i64) = conn.query_row(
        "SELECT COUNT(*), COALESCE(SUM(is_completed), 0) FROM submissions;",
        [],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;

    let mut per_formation = Vec::new();
    let mut stmt = conn.prepare(
        "SELECT formation_uuid, code, title
         FROM formations
         WHERE is_active = 1
         ORDER BY code ASC;",
    )?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        if cancel.is_cancelled() {
            return Err(StatsError::Cancelled);
        }

        let formation_uuid: String = row.get(0)?;
        let code: String = row.get(1)?;
        let title: String = row.get(2)?;

        let submission_count: i64 = conn.query_row(
            "SELECT COUNT(*)
             FROM submissions s
             JOIN publications p ON p.publication_uuid = s.publication_uuid
             WHERE p.formation_uuid = ?1;",
            [formation_uuid.as_str()],
            |row| row.get(0),
        )?;

        let average_rating: Option<f64> = conn.query_row(
            "SELECT AVG(CAST(a.value_number AS REAL))
             FROM answers a
             JOIN submissions s ON s.submission_uuid = a.submission_uuid
             JOIN publications p ON p.publication_uuid = s.publication_uuid
             JOIN questions q ON q.question_uuid = a.question_uuid
             WHERE p.formation_uuid = ?1
               AND s.is_completed = 1
               AND q.kind = 'likert'
               AND a.value_number IS NOT NULL;",
            [formation_uuid.as_str()],
            |row| row.get(0),
        )?;

        per_formation.push(FormationBreakdown {
            code,
            title,
            submission_count: submission_count.max(0) as u64,
            average_rating,
        });
    }

    let stats = OverallStatistics {
        total_questionnaires: total_questionnaires.max(0) as u64,
        total_submissions: total_submissions.max(0) as u64,
        overall_completion_rate: percentage(completed.max(0) as u64, total_submissions.max(0) as u64),
        per_formation,
    };

    info!(
        "event=stats_overall module=stats status=ok questionnaires={} submissions={} formations={} duration_ms={}",
        stats.total_questionnaires,
        stats.total_submissions,
        stats.per_formation.len(),
        started_at.elapsed().as_millis()
    );

    Ok(stats)
}

/// Loads recorded answer values of completed submissions, grouped by
/// question, preserving submission order within each group.
fn load_completed_answers(
    conn: &Connection,
    publication_uuid: PublicationId,
) -> StatsResult<HashMap<QuestionId, Vec<AnswerValue>>> {
    let mut stmt = conn.prepare(
        "SELECT a.question_uuid, a.value_number, a.value_text
         FROM answers a
         JOIN submissions s ON s.submission_uuid = a.submission_uuid
         WHERE s.publication_uuid = ?1
           AND s.is_completed = 1
         ORDER BY s.created_at ASC, s.respondent_id ASC;",
    )?;
    let mut rows = stmt.query([publication_uuid.to_string()])?;

    let mut values: HashMap<QuestionId, Vec<AnswerValue>> = HashMap::new();
    while let Some(row) = rows.next()? {
        let question_uuid_text: String = row.get(0)?;
        let question_uuid = Uuid::parse_str(&question_uuid_text).map_err(|_| {
            StatsError::InvalidData(format!(
                "invalid uuid `{question_uuid_text}` in answers.question_uuid"
            ))
        })?;

        let value_number: Option<i64> = row.get(1)?;
        let value_text: Option<String> = row.get(2)?;
        let value = match (value_number, value_text) {
            (Some(number), None) => AnswerValue::Number(number),
            (None, Some(text)) => AnswerValue::Text(text),
            _ => {
                return Err(StatsError::InvalidData(format!(
                    "answer for question {question_uuid} violates numeric-xor-text"
                )));
            }
        };
        values.entry(question_uuid).or_default().push(value);
    }
    Ok(values)
}

fn section_statistics(
    section: &Section,
    values_by_question: &mut HashMap<QuestionId, Vec<AnswerValue>>,
    cancel: &CancelToken,
) -> StatsResult<SectionStatistics> {
    let mut questions = Vec::with_capacity(section.questions.len());
    for question in &section.questions {
        if cancel.is_cancelled() {
            return Err(StatsError::Cancelled);
        }
        let values = values_by_question
            .remove(&question.question_uuid)
            .unwrap_or_default();
        questions.push(question_statistics(question, values));
    }

    Ok(SectionStatistics {
        title: section.title.clone(),
        display_order: section.display_order,
        questions,
    })
}

/// Computes one question's statistics, branched by question type.
fn question_statistics(question: &Question, values: Vec<AnswerValue>) -> QuestionStatistics {
    let total_answers = values.len() as u64;

    let mut average_score = None;
    let mut answer_distribution = Vec::new();
    let mut text_answers = Vec::new();

    match question.kind {
        QuestionType::Likert | QuestionType::Binary => {
            let numbers: Vec<i64> = values
                .iter()
                .filter_map(|value| match value {
                    AnswerValue::Number(number) => Some(*number),
                    AnswerValue::Text(_) => None,
                })
                .collect();

            if question.kind == QuestionType::Likert && !numbers.is_empty() {
                let sum: i64 = numbers.iter().sum();
                average_score = Some(sum as f64 / numbers.len() as f64);
            }

            let mut counts: BTreeMap<i64, u64> = BTreeMap::new();
            for number in &numbers {
                *counts.entry(*number).or_default() += 1;
            }
            answer_distribution = counts
                .into_iter()
                .map(|(value, count)| DistributionBucket {
                    value,
                    label: bucket_label(question, value),
                    count,
                    percentage: percentage(count, total_answers),
                })
                .collect();
        }
        QuestionType::Text => {
            text_answers = values
                .into_iter()
                .filter_map(|value| match value {
                    AnswerValue::Text(text) if !text.trim().is_empty() => Some(text),
                    _ => None,
                })
                .collect();
        }
    }

    QuestionStatistics {
        question_uuid: question.question_uuid,
        text: question.wording.clone(),
        kind: question.kind,
        total_answers,
        average_score,
        answer_distribution,
        text_answers,
    }
}

/// Resolves a bucket label from the question's option list, with stable
/// fallbacks for unlabelled values.
fn bucket_label(question: &Question, value: i64) -> String {
    if let Some(option) = question.options.iter().find(|option| option.value == value) {
        return option.label.clone();
    }
    match (question.kind, value) {
        (QuestionType::Binary, 0) => "No".to_string(),
        (QuestionType::Binary, 1) => "Yes".to_string(),
        _ => value.to_string(),
    }
}

fn percentage(count: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    count as f64 / total as f64 * 100.0
}
