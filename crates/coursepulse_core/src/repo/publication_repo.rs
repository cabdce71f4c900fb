//! Publication repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist immutable publication windows.
//! - Resolve the active publication for a (template, formation, now) triple.
//!
//! # Invariants
//! - Publications are never updated after insert.
//! - Active lookup is inclusive on both window ends.
//! - Overlapping windows resolve deterministically: most recently created
//!   wins, then `publication_uuid DESC`.

use crate::db::migrations::latest_version;
use crate::db::DbError;
use crate::model::formation::FormationId;
use crate::model::publication::{Publication, PublicationId};
use crate::model::template::TemplateId;
use crate::repo::{schema_version, table_exists};
use rusqlite::{params, Connection, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub type PublicationRepoResult<T> = Result<T, PublicationRepoError>;

/// Errors from publication persistence and lookup operations.
#[derive(Debug)]
pub enum PublicationRepoError {
    Db(DbError),
    /// Window end precedes window start.
    InvalidWindow { window_start: i64, window_end: i64 },
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

impl Display for PublicationRepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidWindow {
                window_start,
                window_end,
            } => write!(
                f,
                "publication window end {window_end} precedes start {window_start}"
            ),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "publication repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "publication repository requires table `{table}`")
            }
            Self::InvalidData(message) => write!(f, "invalid publication data: {message}"),
        }
    }
}

impl Error for PublicationRepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for PublicationRepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for PublicationRepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Repository interface for publication windows.
pub trait PublicationRepository {
    /// Inserts one immutable publication window.
    fn create_publication(
        &self,
        template_uuid: TemplateId,
        formation_uuid: FormationId,
        window_start: i64,
        window_end: i64,
    ) -> PublicationRepoResult<Publication>;
    /// Loads one publication by id.
    fn get_publication(
        &self,
        publication_uuid: PublicationId,
    ) -> PublicationRepoResult<Option<Publication>>;
    /// Resolves the active publication for the triple, if any.
    fn find_active(
        &self,
        template_uuid: TemplateId,
        formation_uuid: FormationId,
        now_epoch_ms: i64,
    ) -> PublicationRepoResult<Option<Publication>>;
}

/// SQLite-backed publication repository.
pub struct SqlitePublicationRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqlitePublicationRepository<'conn> {
    /// Creates repository from migrated connection.
    pub fn try_new(conn: &'conn Connection) -> PublicationRepoResult<Self> {
        let expected_version = latest_version();
        let actual_version = schema_version(conn)?;
        if actual_version != expected_version {
            return Err(PublicationRepoError::UninitializedConnection {
                expected_version,
                actual_version,
            });
        }
        if !table_exists(conn, "publications")? {
            return Err(PublicationRepoError::MissingRequiredTable("publications"));
        }
        Ok(Self { conn })
    }
}

impl PublicationRepository for SqlitePublicationRepository<'_> {
    fn create_publication(
        &self,
        template_uuid: TemplateId,
        formation_uuid: FormationId,
        window_start: i64,
        window_end: i64,
    ) -> PublicationRepoResult<Publication> {
        if window_end < window_start {
            return Err(PublicationRepoError::InvalidWindow {
                window_start,
                window_end,
            });
        }

        let publication_uuid = Uuid::new_v4();
        self.conn.execute(
            "INSERT INTO publications (
                publication_uuid,
                template_uuid,
                formation_uuid,
                window_start,
                window_end
            ) VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                publication_uuid.to_string(),
                template_uuid.to_string(),
                formation_uuid.to_string(),
                window_start,
                window_end,
            ],
        )?;

        self.get_publication(publication_uuid)?.ok_or_else(|| {
            PublicationRepoError::InvalidData(format!(
                "publication `{publication_uuid}` missing after insert"
            ))
        })
    }

    fn get_publication(
        &self,
        publication_uuid: PublicationId,
    ) -> PublicationRepoResult<Option<Publication>> {
        let mut stmt = self.conn.prepare(
            "SELECT
                publication_uuid,
                template_uuid,
                formation_uuid,
                window_start,
                window_end,
                created_at
             FROM publications
             WHERE publication_uuid = ?1;",
        )?;
        let mut rows = stmt.query([publication_uuid.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_publication_row(row)?));
        }
        Ok(None)
    }

    fn find_active(
        &self,
        template_uuid: TemplateId,
        formation_uuid: FormationId,
        now_epoch_ms: i64,
    ) -> PublicationRepoResult<Option<Publication>> {
        let mut stmt = self.conn.prepare(
            "SELECT
                publication_uuid,
                template_uuid,
                formation_uuid,
                window_start,
                window_end,
                created_at
             FROM publications
             WHERE template_uuid = ?1
               AND formation_uuid = ?2
               AND window_start <= ?3
               AND window_end >= ?3
             ORDER BY created_at DESC, publication_uuid DESC
             LIMIT 1;",
        )?;
        let mut rows = stmt.query(params![
            template_uuid.to_string(),
            formation_uuid.to_string(),
            now_epoch_ms,
        ])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_publication_row(row)?));
        }
        Ok(None)
    }
}

fn parse_publication_row(row: &Row<'_>) -> PublicationRepoResult<Publication> {
    Ok(Publication {
        publication_uuid: parse_uuid(row, "publication_uuid")?,
        template_uuid: parse_uuid(row, "template_uuid")?,
        formation_uuid: parse_uuid(row, "formation_uuid")?,
        window_start: row.get("window_start")?,
        window_end: row.get("window_end")?,
        created_at: row.get("created_at")?,
    })
}

fn parse_uuid(row: &Row<'_>, column: &'static str) -> PublicationRepoResult<Uuid> {
    let value: String = row.get(column)?;
    Uuid::parse_str(&value).map_err(|_| {
        PublicationRepoError::InvalidData(format!(
            "invalid uuid `{value}` in publications.{column}"
        ))
    })
}
