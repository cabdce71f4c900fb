//! Formation directory store contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist the local copy of formation records fed by the external sync.
//! - Resolve formation codes for the publication gate.
//!
//! # Invariants
//! - `code` is unique; upserts are keyed by it.
//! - Gate-facing lookups return active formations only.

use crate::db::migrations::latest_version;
use crate::db::DbError;
use crate::model::formation::{Formation, FormationId};
use crate::model::template::{validate_code, TemplateValidationError};
use crate::repo::{schema_version, table_exists};
use rusqlite::{params, Connection, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub type DirectoryResult<T> = Result<T, DirectoryRepoError>;

/// Errors from formation directory operations.
#[derive(Debug)]
pub enum DirectoryRepoError {
    Validation(TemplateValidationError),
    Db(DbError),
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

impl Display for DirectoryRepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "formation directory requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "formation directory requires table `{table}`")
            }
            Self::InvalidData(message) => write!(f, "invalid formation data: {message}"),
        }
    }
}

impl Error for DirectoryRepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<TemplateValidationError> for DirectoryRepoError {
    fn from(value: TemplateValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for DirectoryRepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for DirectoryRepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Store interface for the formation directory.
pub trait FormationDirectory {
    /// Inserts or updates one formation record keyed by code.
    ///
    /// The sync consumer is the only writer; `synced_at` records the event
    /// time it applied.
    fn upsert_formation(
        &self,
        code: &str,
        title: &str,
        is_active: bool,
        synced_at: i64,
    ) -> DirectoryResult<Formation>;
    /// Resolves one active formation by code.
    fn find_by_code(&self, code: &str) -> DirectoryResult<Option<Formation>>;
}

/// SQLite-backed formation directory store.
pub struct SqliteFormationDirectory<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteFormationDirectory<'conn> {
    /// Creates store from migrated connection.
    pub fn try_new(conn: &'conn Connection) -> DirectoryResult<Self> {
        let expected_version = latest_version();
        let actual_version = schema_version(conn)?;
        if actual_version != expected_version {
            return Err(DirectoryRepoError::UninitializedConnection {
                expected_version,
                actual_version,
            });
        }
        if !table_exists(conn, "formations")? {
            return Err(DirectoryRepoError::MissingRequiredTable("formations"));
        }
        Ok(Self { conn })
    }
}

impl FormationDirectory for SqliteFormationDirectory<'_> {
    fn upsert_formation(
        &self,
        code: &str,
        title: &str,
        is_active: bool,
        synced_at: i64,
    ) -> DirectoryResult<Formation> {
        validate_code(code)?;

        self.conn.execute(
            "INSERT INTO formations (formation_uuid, code, title, is_active, synced_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(code) DO UPDATE SET
                title = excluded.title,
                is_active = excluded.is_active,
                synced_at = excluded.synced_at;",
            params![
                Uuid::new_v4().to_string(),
                code,
                title,
                is_active as i64,
                synced_at,
            ],
        )?;

        let mut stmt = self.conn.prepare(
            "SELECT formation_uuid, code, title, is_active, synced_at
             FROM formations
             WHERE code = ?1;",
        )?;
        let mut rows = stmt.query([code])?;
        let Some(row) = rows.next()? else {
            return Err(DirectoryRepoError::InvalidData(format!(
                "formation `{code}` missing after upsert"
            )));
        };
        parse_formation_row(row)
    }

    fn find_by_code(&self, code: &str) -> DirectoryResult<Option<Formation>> {
        let mut stmt = self.conn.prepare(
            "SELECT formation_uuid, code, title, is_active, synced_at
             FROM formations
             WHERE code = ?1
               AND is_active = 1;",
        )?;
        let mut rows = stmt.query([code])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_formation_row(row)?));
        }
        Ok(None)
    }
}

fn parse_formation_row(row: &Row<'_>) -> DirectoryResult<Formation> {
    let formation_uuid_text: String = row.get("formation_uuid")?;
    let formation_uuid: FormationId = Uuid::parse_str(&formation_uuid_text).map_err(|_| {
        DirectoryRepoError::InvalidData(format!(
            "invalid uuid `{formation_uuid_text}` in formations.formation_uuid"
        ))
    })?;

    let is_active = match row.get::<_, i64>("is_active")? {
        0 => false,
        1 => true,
        other => {
            return Err(DirectoryRepoError::InvalidData(format!(
                "invalid is_active value `{other}` in formations.is_active"
            )));
        }
    };

    Ok(Formation {
        formation_uuid,
        code: row.get("code")?,
        title: row.get("title")?,
        is_active,
        synced_at: row.get("synced_at")?,
    })
}
