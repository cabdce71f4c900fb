//! Submission repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist the one-submission-per-(publication, respondent) aggregate.
//! - Merge answer batches atomically: submission upsert, keyed answer
//!   upserts, and completion flag commit together or not at all.
//!
//! # Invariants
//! - The `UNIQUE (publication_uuid, respondent_id)` constraint backs the
//!   single-aggregate rule; merges target the existing row.
//! - Answers absent from a batch are preserved (merge, never replace-all).
//! - Completed submission listing is deterministic: `created_at ASC,
//!   respondent_id ASC`.

use crate::db::migrations::latest_version;
use crate::db::DbError;
use crate::model::publication::PublicationId;
use crate::model::submission::{
    Answer, AnswerValue, RespondentId, Submission, SubmissionId,
};
use crate::model::template::QuestionId;
use crate::repo::{schema_version, table_exists};
use rusqlite::{params, Connection, Row, Transaction, TransactionBehavior};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub type SubmissionRepoResult<T> = Result<T, SubmissionRepoError>;

/// Errors from submission persistence operations.
#[derive(Debug)]
pub enum SubmissionRepoError {
    Db(DbError),
    /// Target submission vanished between write and read-back.
    SubmissionNotFound {
        publication_uuid: PublicationId,
        respondent_id: RespondentId,
    },
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    /// Required table is missing.
    MissingRequiredTable(&'static str),
    /// Persisted data cannot be converted to a valid read model.
    InvalidData(String),
}

impl Display for SubmissionRepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::SubmissionNotFound {
                publication_uuid,
                respondent_id,
            } => write!(
                f,
                "submission not found for publication {publication_uuid}, respondent {respondent_id}"
            ),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "submission repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "submission repository requires table `{table}`")
            }
            Self::InvalidData(message) => write!(f, "invalid submission data: {message}"),
        }
    }
}

impl Error for SubmissionRepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for SubmissionRepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for SubmissionRepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// One validated answer ready to merge into a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerUpsert {
    pub question_uuid: QuestionId,
    pub value: AnswerValue,
}

/// Repository interface for submission aggregates.
pub trait SubmissionRepository {
    /// Loads one full aggregate (submission row + answer map).
    fn load_submission(
        &self,
        publication_uuid: PublicationId,
        respondent_id: RespondentId,
    ) -> SubmissionRepoResult<Option<Submission>>;
    /// Merges one validated batch into the aggregate, atomically.
    ///
    /// Creates the submission row on first contact, upserts each answer by
    /// question key, and sets the completed flag when `finalize` is true.
    /// The whole call is one transaction: no partially merged state is ever
    /// observable.
    fn merge_answers(
        &self,
        publication_uuid: PublicationId,
        respondent_id: RespondentId,
        answers: &[AnswerUpsert],
        finalize: bool,
    ) -> SubmissionRepoResult<Submission>;
    /// Lists completed submissions for one publication, with answers.
    fn list_completed(
        &self,
        publication_uuid: PublicationId,
    ) -> SubmissionRepoResult<Vec<Submission>>;
    /// Counts (all, completed) submissions for one publication.
    fn count_for_publication(
        &self,
        publication_uuid: PublicationId,
    ) -> SubmissionRepoResult<(u64, u64)>;
}

/// SQLite-backed submission repository.
pub struct SqliteSubmissionRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteSubmissionRepository<'conn> {
    /// Creates repository from migrated connection.
    pub fn try_new(conn: &'conn Connection) -> SubmissionRepoResult<Self> {
        let expected_version = latest_version();
        let actual_version = schema_version(conn)?;
        if actual_version != expected_version {
            return Err(SubmissionRepoError::UninitializedConnection {
                expected_version,
                actual_version,
            });
        }
        for table in ["submissions", "answers"] {
            if !table_exists(conn, table)? {
                return Err(SubmissionRepoError::MissingRequiredTable(table));
            }
        }
        Ok(Self { conn })
    }
}

impl SubmissionRepository for SqliteSubmissionRepository<'_> {
    fn load_submission(
        &self,
        publication_uuid: PublicationId,
        respondent_id: RespondentId,
    ) -> SubmissionRepoResult<Option<Submission>> {
        let mut stmt = self.conn.prepare(
            "SELECT
                submission_uuid,
                publication_uuid,
                respondent_id,
                is_completed,
                created_at,
                updated_at
             FROM submissions
             WHERE publication_uuid = ?1
               AND respondent_id = ?2;",
        )?;
        let mut rows = stmt.query(params![
            publication_uuid.to_string(),
            respondent_id.to_string(),
        ])?;
        let Some(row) = rows.next()? else {
            return Ok(None);
        };
        let mut submission = parse_submission_row(row)?;
        submission.answers = load_answers(self.conn, submission.submission_uuid)?;
        Ok(Some(submission))
    }

    fn merge_answers(
        &self,
        publication_uuid: PublicationId,
        respondent_id: RespondentId,
        answers: &[AnswerUpsert],
        finalize: bool,
    ) -> SubmissionRepoResult<Submission> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;

        tx.execute(
            "INSERT INTO submissions (submission_uuid, publication_uuid, respondent_id)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(publication_uuid, respondent_id) DO UPDATE SET
                updated_at = (strftime('%s', 'now') * 1000);",
            params![
                Uuid::new_v4().to_string(),
                publication_uuid.to_string(),
                respondent_id.to_string(),
            ],
        )?;

        let submission_uuid_text: String = tx.query_row(
            "SELECT submission_uuid
             FROM submissions
             WHERE publication_uuid = ?1
               AND respondent_id = ?2;",
            params![publication_uuid.to_string(), respondent_id.to_string()],
            |row| row.get(0),
        )?;

        for answer in answers {
            let (value_number, value_text) = match &answer.value {
                AnswerValue::Number(number) => (Some(*number), None),
                AnswerValue::Text(text) => (None, Some(text.as_str())),
            };
            tx.execute(
                "INSERT INTO answers (submission_uuid, question_uuid, value_number, value_text)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(submission_uuid, question_uuid) DO UPDATE SET
                    value_number = excluded.value_number,
                    value_text = excluded.value_text,
                    updated_at = (strftime('%s', 'now') * 1000);",
                params![
                    submission_uuid_text,
                    answer.question_uuid.to_string(),
                    value_number,
                    value_text,
                ],
            )?;
        }

        if finalize {
            tx.execute(
                "UPDATE submissions
                 SET is_completed = 1,
                     updated_at = (strftime('%s', 'now') * 1000)
                 WHERE submission_uuid = ?1;",
                [submission_uuid_text.as_str()],
            )?;
        }

        tx.commit()?;

        self.load_submission(publication_uuid, respondent_id)?
            .ok_or(SubmissionRepoError::SubmissionNotFound {
                publication_uuid,
                respondent_id,
            })
    }

    fn list_completed(
        &self,
        publication_uuid: PublicationId,
    ) -> SubmissionRepoResult<Vec<Submission>> {
        let mut stmt = self.conn.prepare(
            "SELECT
                submission_uuid,
                publication_uuid,
                respondent_id,
                is_completed,
                created_at,
                updated_at
             FROM submissions
             WHERE publication_uuid = ?1
               AND is_completed = 1
             ORDER BY created_at ASC, respondent_id ASC;",
        )?;
        let mut rows = stmt.query([publication_uuid.to_string()])?;

        let mut submissions = Vec::new();
        while let Some(row) = rows.next()? {
            submissions.push(parse_submission_row(row)?);
        }
        for submission in &mut submissions {
            submission.answers = load_answers(self.conn, submission.submission_uuid)?;
        }
        Ok(submissions)
    }

    fn count_for_publication(
        &self,
        publication_uuid: PublicationId,
    ) -> SubmissionRepoResult<(u64, u64)> {
        let (total, completed): (i64, i64) = self.conn.query_row(
            "SELECT
                COUNT(*),
                COALESCE(SUM(is_completed), 0)
             FROM submissions
             WHERE publication_uuid = ?1;",
            [publication_uuid.to_string()],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        Ok((total.max(0) as u64, completed.max(0) as u64))
    }
}

fn load_answers(
    conn: &Connection,
    submission_uuid: SubmissionId,
) -> SubmissionRepoResult<BTreeMap<QuestionId, Answer>> {
    let mut stmt = conn.prepare(
        "SELECT question_uuid, value_number, value_text, updated_at
         FROM answers
         WHERE submission_uuid = ?1;",
    )?;
    let mut rows = stmt.query([submission_uuid.to_string()])?;

    let mut answers = BTreeMap::new();
    while let Some(row) = rows.next()? {
        let question_uuid_text: String = row.get("question_uuid")?;
        let question_uuid = Uuid::parse_str(&question_uuid_text).map_err(|_| {
            SubmissionRepoError::InvalidData(format!(
                "invalid uuid `{question_uuid_text}` in answers.question_uuid"
            ))
        })?;

        let value_number: Option<i64> = row.get("value_number")?;
        let value_text: Option<String> = row.get("value_text")?;
        let value = match (value_number, value_text) {
            (Some(number), None) => AnswerValue::Number(number),
            (None, Some(text)) => AnswerValue::Text(text),
            _ => {
                return Err(SubmissionRepoError::InvalidData(format!(
                    "answer for question {question_uuid} violates numeric-xor-text"
                )));
            }
        };

        answers.insert(
            question_uuid,
            Answer {
                question_uuid,
                value,
                updated_at: row.get("updated_at")?,
            },
        );
    }
    Ok(answers)
}

fn parse_submission_row(row: &Row<'_>) -> SubmissionRepoResult<Submission> {
    let submission_uuid = parse_uuid(row, "submission_uuid")?;
    let publication_uuid = parse_uuid(row, "publication_uuid")?;
    let respondent_id = parse_uuid(row, "respondent_id")?;

    let is_completed = match row.get::<_, i64>("is_completed")? {
        0 => false,
        1 => true,
        other => {
            return Err(SubmissionRepoError::InvalidData(format!(
                "invalid is_completed value `{other}` in submissions.is_completed"
            )));
        }
    };

    Ok(Submission {
        submission_uuid,
        publication_uuid,
        respondent_id,
        is_completed,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
        answers: BTreeMap::new(),
    })
}

fn parse_uuid(row: &Row<'_>, column: &'static str) -> SubmissionRepoResult<Uuid> {
    let value: String = row.get(column)?;
    Uuid::parse_str(&value).map_err(|_| {
        SubmissionRepoError::InvalidData(format!("invalid uuid `{value}` in submissions.{column}"))
    })
}
