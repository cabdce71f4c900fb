//! Catalog repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist templates, sections, questions, and option labels.
//! - Assemble the full template tree for resolve/statistics reads.
//!
//! # Invariants
//! - Write paths validate domain input before SQL mutations.
//! - Structural writes are rejected once a template is Published.
//! - Section/question ordering is deterministic: `display_order ASC,
//!   uuid ASC`.

use crate::db::migrations::latest_version;
use crate::db::DbError;
use crate::model::template::{
    validate_code, Question, QuestionDraft, QuestionId, QuestionOption, QuestionType, Role,
    Section, SectionId, Template, TemplateId, TemplateStatus, TemplateValidationError,
};
use crate::repo::{schema_version, table_exists};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub type CatalogRepoResult<T> = Result<T, CatalogRepoError>;

/// Errors from catalog persistence and query operations.
#[derive(Debug)]
pub enum CatalogRepoError {
    Validation(TemplateValidationError),
    Db(DbError),
    /// Target template does not exist.
    TemplateNotFound(TemplateId),
    /// Target section does not exist.
    SectionNotFound(SectionId),
    /// Template code is already taken.
    DuplicateTemplateCode(String),
    /// Structural edit attempted on a Published template.
    TemplateNotEditable(TemplateId),
    /// Publish attempted on an already Published template.
    AlreadyPublished(TemplateId),
    /// Publish attempted on a template with no questions.
    EmptyTemplate(TemplateId),
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

impl Display for CatalogRepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::TemplateNotFound(id) => write!(f, "template not found: {id}"),
            Self::SectionNotFound(id) => write!(f, "section not found: {id}"),
            Self::DuplicateTemplateCode(code) => {
                write!(f, "template code already exists: `{code}`")
            }
            Self::TemplateNotEditable(id) => {
                write!(f, "template is published and cannot be edited: {id}")
            }
            Self::AlreadyPublished(id) => write!(f, "template already published: {id}"),
            Self::EmptyTemplate(id) => {
                write!(f, "template has no questions and cannot be published: {id}")
            }
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "catalog repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "catalog repository requires table `{table}`")
            }
            Self::InvalidData(message) => write!(f, "invalid catalog data: {message}"),
        }
    }
}

impl Error for CatalogRepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<TemplateValidationError> for CatalogRepoError {
    fn from(value: TemplateValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for CatalogRepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for CatalogRepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Repository interface for catalog authoring and resolve reads.
pub trait CatalogRepository {
    /// Creates one Draft template with a unique code.
    fn create_template(&self, code: &str, title: &str, target_role: Role)
        -> CatalogRepoResult<Template>;
    /// Appends one section to a Draft template.
    fn add_section(&self, template_uuid: TemplateId, title: &str) -> CatalogRepoResult<Section>;
    /// Appends one question (with option labels) to a section.
    fn add_question(
        &self,
        section_uuid: SectionId,
        draft: &QuestionDraft,
    ) -> CatalogRepoResult<Question>;
    /// Transitions one template Draft -> Published. One-way.
    fn publish_template(&self, template_uuid: TemplateId) -> CatalogRepoResult<()>;
    /// Loads the full template tree by code, any status.
    fn load_template_by_code(&self, code: &str) -> CatalogRepoResult<Option<Template>>;
    /// Loads the full template tree by id, any status.
    fn load_template_by_id(&self, template_uuid: TemplateId)
        -> CatalogRepoResult<Option<Template>>;
}

/// SQLite-backed catalog repository.
pub struct SqliteCatalogRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteCatalogRepository<'conn> {
    /// Creates repository from migrated connection.
    pub fn try_new(conn: &'conn Connection) -> CatalogRepoResult<Self> {
        ensure_catalog_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl CatalogRepository for SqliteCatalogRepository<'_> {
    fn create_template(
        &self,
        code: &str,
        title: &str,
        target_role: Role,
    ) -> CatalogRepoResult<Template> {
        validate_code(code)?;

        let taken: i64 = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM templates WHERE code = ?1);",
            [code],
            |row| row.get(0),
        )?;
        if taken == 1 {
            return Err(CatalogRepoError::DuplicateTemplateCode(code.to_string()));
        }

        let template_uuid = Uuid::new_v4();
        self.conn.execute(
            "INSERT INTO templates (template_uuid, code, title, status, target_role)
             VALUES (?1, ?2, ?3, 'draft', ?4);",
            params![
                template_uuid.to_string(),
                code,
                title,
                role_to_db(target_role),
            ],
        )?;

        self.load_template_by_id(template_uuid)?
            .ok_or(CatalogRepoError::TemplateNotFound(template_uuid))
    }

    fn add_section(&self, template_uuid: TemplateId, title: &str) -> CatalogRepoResult<Section> {
        ensure_template_editable(self.conn, template_uuid)?;

        let section_uuid = Uuid::new_v4();
        let display_order: i64 = self.conn.query_row(
            "SELECT COALESCE(MAX(display_order), -1) + 1
             FROM sections
             WHERE template_uuid = ?1;",
            [template_uuid.to_string()],
            |row| row.get(0),
        )?;

        self.conn.execute(
            "INSERT INTO sections (section_uuid, template_uuid, title, display_order)
             VALUES (?1, ?2, ?3, ?4);",
            params![
                section_uuid.to_string(),
                template_uuid.to_string(),
                title,
                display_order,
            ],
        )?;
        touch_template(self.conn, template_uuid)?;

        Ok(Section {
            section_uuid,
            template_uuid,
            title: title.to_string(),
            display_order,
            questions: Vec::new(),
        })
    }

    fn add_question(
        &self,
        section_uuid: SectionId,
        draft: &QuestionDraft,
    ) -> CatalogRepoResult<Question> {
        draft.validate()?;

        let template_uuid = section_template(self.conn, section_uuid)?
            .ok_or(CatalogRepoError::SectionNotFound(section_uuid))?;
        ensure_template_editable(self.conn, template_uuid)?;

        let question_uuid = Uuid::new_v4();
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;

        let display_order: i64 = tx.query_row(
            "SELECT COALESCE(MAX(display_order), -1) + 1
             FROM questions
             WHERE section_uuid = ?1;",
            [section_uuid.to_string()],
            |row| row.get(0),
        )?;

        tx.execute(
            "INSERT INTO questions (
                question_uuid,
                section_uuid,
                wording,
                kind,
                mandatory,
                max_length,
                display_order
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
            params![
                question_uuid.to_string(),
                section_uuid.to_string(),
                draft.wording.as_str(),
                kind_to_db(draft.kind),
                draft.mandatory as i64,
                draft.max_length,
                display_order,
            ],
        )?;

        for option in &draft.options {
            tx.execute(
                "INSERT INTO question_options (question_uuid, opt_value, label)
                 VALUES (?1, ?2, ?3);",
                params![question_uuid.to_string(), option.value, option.label.as_str()],
            )?;
        }

        tx.commit()?;
        touch_template(self.conn, template_uuid)?;

        let mut options = draft.options.clone();
        options.sort_by_key(|option| option.value);

        Ok(Question {
            question_uuid,
            section_uuid,
            wording: draft.wording.clone(),
            kind: draft.kind,
            mandatory: draft.mandatory,
            max_length: draft.max_length,
            options,
            display_order,
        })
    }

    fn publish_template(&self, template_uuid: TemplateId) -> CatalogRepoResult<()> {
        match template_status(self.conn, template_uuid)? {
            None => return Err(CatalogRepoError::TemplateNotFound(template_uuid)),
            Some(TemplateStatus::Published) => {
                return Err(CatalogRepoError::AlreadyPublished(template_uuid));
            }
            Some(TemplateStatus::Draft) => {}
        }

        let question_count: i64 = self.conn.query_row(
            "SELECT COUNT(*)
             FROM questions q
             JOIN sections s ON s.section_uuid = q.section_uuid
             WHERE s.template_uuid = ?1;",
            [template_uuid.to_string()],
            |row| row.get(0),
        )?;
        if question_count == 0 {
            return Err(CatalogRepoError::EmptyTemplate(template_uuid));
        }

        self.conn.execute(
            "UPDATE templates
             SET status = 'published',
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE template_uuid = ?1
               AND status = 'draft';",
            [template_uuid.to_string()],
        )?;
        Ok(())
    }

    fn load_template_by_code(&self, code: &str) -> CatalogRepoResult<Option<Template>> {
        let template_uuid: Option<String> = self
            .conn
            .query_row(
                "SELECT template_uuid FROM templates WHERE code = ?1;",
                [code],
                |row| row.get(0),
            )
            .optional()?;

        match template_uuid {
            Some(value) => {
                let template_uuid = parse_uuid(&value, "templates.template_uuid")?;
                self.load_template_by_id(template_uuid)
            }
            None => Ok(None),
        }
    }

    fn load_template_by_id(
        &self,
        template_uuid: TemplateId,
    ) -> CatalogRepoResult<Option<Template>> {
        let mut stmt = self.conn.prepare(
            "SELECT
                template_uuid,
                code,
                title,
                version,
                status,
                target_role,
                created_at,
                updated_at
             FROM templates
             WHERE template_uuid = ?1;",
        )?;
        let mut rows = stmt.query([template_uuid.to_string()])?;
        let Some(row) = rows.next()? else {
            return Ok(None);
        };
        let mut template = parse_template_row(row)?;
        template.sections = load_sections(self.conn, template_uuid)?;
        Ok(Some(template))
    }
}

fn load_sections(conn: &Connection, template_uuid: TemplateId) -> CatalogRepoResult<Vec<Section>> {
    let mut stmt = conn.prepare(
        "SELECT section_uuid, template_uuid, title, display_order
         FROM sections
         WHERE template_uuid = ?1
         ORDER BY display_order ASC, section_uuid ASC;",
    )?;
    let mut rows = stmt.query([template_uuid.to_string()])?;

    let mut sections = Vec::new();
    while let Some(row) = rows.next()? {
        let section_uuid_text: String = row.get("section_uuid")?;
        sections.push(Section {
            section_uuid: parse_uuid(&section_uuid_text, "sections.section_uuid")?,
            template_uuid,
            title: row.get("title")?,
            display_order: row.get("display_order")?,
            questions: Vec::new(),
        });
    }

    let mut options_by_question = load_options(conn, template_uuid)?;
    for section in &mut sections {
        section.questions = load_questions(conn, section.section_uuid, &mut options_by_question)?;
    }
    Ok(sections)
}

fn load_questions(
    conn: &Connection,
    section_uuid: SectionId,
    options_by_question: &mut HashMap<QuestionId, Vec<QuestionOption>>,
) -> CatalogRepoResult<Vec<Question>> {
    let mut stmt = conn.prepare(
        "SELECT question_uuid, wording, kind, mandatory, max_length, display_order
         FROM questions
         WHERE section_uuid = ?1
         ORDER BY display_order ASC, question_uuid ASC;",
    )?;
    let mut rows = stmt.query([section_uuid.to_string()])?;

    let mut questions = Vec::new();
    while let Some(row) = rows.next()? {
        let question_uuid_text: String = row.get("question_uuid")?;
        let question_uuid = parse_uuid(&question_uuid_text, "questions.question_uuid")?;

        let kind_text: String = row.get("kind")?;
        let kind = parse_kind(&kind_text).ok_or_else(|| {
            CatalogRepoError::InvalidData(format!(
                "invalid question kind `{kind_text}` in questions.kind"
            ))
        })?;

        let mandatory = match row.get::<_, i64>("mandatory")? {
            0 => false,
            1 => true,
            other => {
                return Err(CatalogRepoError::InvalidData(format!(
                    "invalid mandatory value `{other}` in questions.mandatory"
                )));
            }
        };

        questions.push(Question {
            question_uuid,
            section_uuid,
            wording: row.get("wording")?,
            kind,
            mandatory,
            max_length: row.get("max_length")?,
            options: options_by_question.remove(&question_uuid).unwrap_or_default(),
            display_order: row.get("display_order")?,
        });
    }
    Ok(questions)
}

fn load_options(
    conn: &Connection,
    template_uuid: TemplateId,
) -> CatalogRepoResult<HashMap<QuestionId, Vec<QuestionOption>>> {
    let mut stmt = conn.prepare(
        "SELECT o.question_uuid, o.opt_value, o.label
         FROM question_options o
         JOIN questions q ON q.question_uuid = o.question_uuid
         JOIN sections s ON s.section_uuid = q.section_uuid
         WHERE s.template_uuid = ?1
         ORDER BY o.question_uuid ASC, o.opt_value ASC;",
    )?;
    let mut rows = stmt.query([template_uuid.to_string()])?;

    let mut result: HashMap<QuestionId, Vec<QuestionOption>> = HashMap::new();
    while let Some(row) = rows.next()? {
        let question_uuid_text: String = row.get(0)?;
        let question_uuid = parse_uuid(&question_uuid_text, "question_options.question_uuid")?;
        result.entry(question_uuid).or_default().push(QuestionOption {
            value: row.get(1)?,
            label: row.get(2)?,
        });
    }
    Ok(result)
}

fn parse_template_row(row: &Row<'_>) -> CatalogRepoResult<Template> {
    let template_uuid_text: String = row.get("template_uuid")?;
    let template_uuid = parse_uuid(&template_uuid_text, "templates.template_uuid")?;

    let status_text: String = row.get("status")?;
    let status = parse_status(&status_text).ok_or_else(|| {
        CatalogRepoError::InvalidData(format!(
            "invalid template status `{status_text}` in templates.status"
        ))
    })?;

    let role_text: String = row.get("target_role")?;
    let target_role = parse_role(&role_text).ok_or_else(|| {
        CatalogRepoError::InvalidData(format!(
            "invalid target role `{role_text}` in templates.target_role"
        ))
    })?;

    Ok(Template {
        template_uuid,
        code: row.get("code")?,
        title: row.get("title")?,
        version: row.get("version")?,
        status,
        target_role,
        sections: Vec::new(),
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn section_template(
    conn: &Connection,
    section_uuid: SectionId,
) -> CatalogRepoResult<Option<TemplateId>> {
    let value: Option<String> = conn
        .query_row(
            "SELECT template_uuid FROM sections WHERE section_uuid = ?1;",
            [section_uuid.to_string()],
            |row| row.get(0),
        )
        .optional()?;
    value
        .map(|text| parse_uuid(&text, "sections.template_uuid"))
        .transpose()
}

fn template_status(
    conn: &Connection,
    template_uuid: TemplateId,
) -> CatalogRepoResult<Option<TemplateStatus>> {
    let value: Option<String> = conn
        .query_row(
            "SELECT status FROM templates WHERE template_uuid = ?1;",
            [template_uuid.to_string()],
            |row| row.get(0),
        )
        .optional()?;

    match value.as_deref() {
        None => Ok(None),
        Some(text) => parse_status(text).map(Some).ok_or_else(|| {
            CatalogRepoError::InvalidData(format!(
                "invalid template status `{text}` in templates.status"
            ))
        }),
    }
}

fn ensure_template_editable(conn: &Connection, template_uuid: TemplateId) -> CatalogRepoResult<()> {
    match template_status(conn, template_uuid)? {
        None => Err(CatalogRepoError::TemplateNotFound(template_uuid)),
        Some(TemplateStatus::Published) => {
            Err(CatalogRepoError::TemplateNotEditable(template_uuid))
        }
        Some(TemplateStatus::Draft) => Ok(()),
    }
}

fn touch_template(conn: &Connection, template_uuid: TemplateId) -> CatalogRepoResult<()> {
    conn.execute(
        "UPDATE templates
         SET updated_at = (strftime('%s', 'now') * 1000)
         WHERE template_uuid = ?1;",
        [template_uuid.to_string()],
    )?;
    Ok(())
}

fn role_to_db(role: Role) -> &'static str {
    match role {
        Role::Student => "student",
        Role::Teacher => "teacher",
        Role::Professional => "professional",
    }
}

fn parse_role(value: &str) -> Option<Role> {
    match value {
        "student" => Some(Role::Student),
        "teacher" => Some(Role::Teacher),
        "professional" => Some(Role::Professional),
        _ => None,
    }
}

fn parse_status(value: &str) -> Option<TemplateStatus> {
    match value {
        "draft" => Some(TemplateStatus::Draft),
        "published" => Some(TemplateStatus::Published),
        _ => None,
    }
}

fn kind_to_db(kind: QuestionType) -> &'static str {
    match kind {
        QuestionType::Likert => "likert",
        QuestionType::Binary => "binary",
        QuestionType::Text => "text",
    }
}

fn parse_kind(value: &str) -> Option<QuestionType> {
    match value {
        "likert" => Some(QuestionType::Likert),
        "binary" => Some(QuestionType::Binary),
        "text" => Some(QuestionType::Text),
        _ => None,
    }
}

fn parse_uuid(value: &str, column: &'static str) -> Result<Uuid, CatalogRepoError> {
    Uuid::parse_str(value)
        .map_err(|_| CatalogRepoError::InvalidData(format!("invalid uuid `{value}` in {column}")))
}

fn ensure_catalog_connection_ready(conn: &Connection) -> CatalogRepoResult<()> {
    let expected_version = latest_version();
    let actual_version = schema_version(conn)?;
    if actual_version != expected_version {
        return Err(CatalogRepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    for table in ["templates", "sections", "questions", "question_options"] {
        if !table_exists(conn, table)? {
            return Err(CatalogRepoError::MissingRequiredTable(table));
        }
    }

    Ok(())
}
