//! Catalog authoring and resolve use-case service.
//!
//! # Responsibility
//! - Normalize authoring input above the repository layer.
//! - Provide the role-scoped published-template resolve operation.
//!
//! # Invariants
//! - Titles are trimmed and must not be blank.
//! - Binary questions authored without options receive Yes/No defaults, so
//!   distributions always carry labels.
//! - `resolve` never returns Draft templates or templates for another role.

use crate::model::template::{
    Question, QuestionDraft, QuestionOption, QuestionType, Role, Section, SectionId, Template,
    TemplateId, TemplateStatus,
};
use crate::repo::catalog_repo::{CatalogRepoError, CatalogRepository};
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Service error for catalog use-cases.
#[derive(Debug)]
pub enum CatalogServiceError {
    /// Title input is blank after trim.
    InvalidTitle,
    /// No published template with this code for this role.
    TemplateNotFound(String),
    /// Persistence-layer failure.
    Repo(CatalogRepoError),
}

impl Display for CatalogServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidTitle => write!(f, "title must not be blank"),
            Self::TemplateNotFound(code) => write!(f, "template not found: `{code}`"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for CatalogServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<CatalogRepoError> for CatalogServiceError {
    fn from(value: CatalogRepoError) -> Self {
        Self::Repo(value)
    }
}

/// Catalog use-case facade.
pub struct CatalogService<R: CatalogRepository> {
    repo: R,
}

impl<R: CatalogRepository> CatalogService<R> {
    /// Creates service from repository implementation.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Creates one Draft template.
    pub fn create_template(
        &self,
        code: &str,
        title: impl Into<String>,
        target_role: Role,
    ) -> Result<Template, CatalogServiceError> {
        let title = normalize_title(title.into())?;
        let template = self.repo.create_template(code, title.as_str(), target_role)?;
        info!(
            "event=template_create module=catalog status=ok template={} code={} role={:?}",
            template.template_uuid, template.code, target_role
        );
        Ok(template)
    }

    /// Appends one section to a Draft template.
    pub fn add_section(
        &self,
        template_uuid: TemplateId,
        title: impl Into<String>,
    ) -> Result<Section, CatalogServiceError> {
        let title = normalize_title(title.into())?;
        self.repo
            .add_section(template_uuid, title.as_str())
            .map_err(Into::into)
    }

    /// Appends one question to a section of a Draft template.
    pub fn add_question(
        &self,
        section_uuid: SectionId,
        mut draft: QuestionDraft,
    ) -> Result<Question, CatalogServiceError> {
        if draft.kind == QuestionType::Binary && draft.options.is_empty() {
            draft.options = default_binary_options();
        }
        self.repo.add_question(section_uuid, &draft).map_err(Into::into)
    }

    /// Publishes one template. One-way; structure freezes afterwards.
    pub fn publish(&self, template_uuid: TemplateId) -> Result<(), CatalogServiceError> {
        self.repo.publish_template(template_uuid)?;
        info!(
            "event=template_publish module=catalog status=ok template={}",
            template_uuid
        );
        Ok(())
    }

    /// Resolves one published template tree by code and target role.
    ///
    /// # Contract
    /// - Returns the tree iff status = Published and the role matches.
    /// - Fails with `TemplateNotFound` otherwise; Draft templates and role
    ///   mismatches are indistinguishable from missing codes.
    pub fn resolve(&self, code: &str, role: Role) -> Result<Template, CatalogServiceError> {
        let template = self
            .repo
            .load_template_by_code(code)?
            .ok_or_else(|| CatalogServiceError::TemplateNotFound(code.to_string()))?;

        if template.status != TemplateStatus::Published || template.target_role != role {
            return Err(CatalogServiceError::TemplateNotFound(code.to_string()));
        }
        Ok(template)
    }
}

fn default_binary_options() -> Vec<QuestionOption> {
    vec![
        QuestionOption {
            value: 0,
            label: "No".to_string(),
        },
        QuestionOption {
            value: 1,
            label: "Yes".to_string(),
        },
    ]
}

fn normalize_title(value: String) -> Result<String, CatalogServiceError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(CatalogServiceError::InvalidTitle);
    }
    Ok(trimmed.to_string())
}
