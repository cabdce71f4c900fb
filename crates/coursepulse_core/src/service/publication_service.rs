//! Publication gate use-case service.
//!
//! # Responsibility
//! - Create publication windows over Published templates.
//! - Resolve the active publication for a (template, formation, now) triple.
//!
//! # Invariants
//! - Publications only reference Published templates and active formations.
//! - Active resolution is inclusive on both window ends.
//! - Overlapping windows resolve to the most recently created publication.

use crate::model::publication::Publication;
use crate::model::template::{Role, Template, TemplateStatus};
use crate::repo::catalog_repo::{CatalogRepoError, CatalogRepository};
use crate::repo::formation_repo::{DirectoryRepoError, FormationDirectory};
use crate::repo::publication_repo::{PublicationRepoError, PublicationRepository};
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Errors from publication gate operations.
#[derive(Debug)]
pub enum GateError {
    /// No template with this code (or it is not visible to the caller).
    TemplateNotFound(String),
    /// Publication creation requires a Published template.
    TemplateNotPublished(String),
    /// No active formation with this code in the directory store.
    FormationNotFound(String),
    /// No publication window covers `now` for the triple.
    NoActivePublication {
        template_code: String,
        formation_code: String,
    },
    /// Catalog persistence failure.
    Catalog(CatalogRepoError),
    /// Formation directory failure.
    Directory(DirectoryRepoError),
    /// Publication persistence failure.
    Publications(PublicationRepoError),
}

impl Display for GateError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TemplateNotFound(code) => write!(f, "template not found: `{code}`"),
            Self::TemplateNotPublished(code) => {
                write!(f, "template is not published: `{code}`")
            }
            Self::FormationNotFound(code) => write!(f, "formation not found: `{code}`"),
            Self::NoActivePublication {
                template_code,
                formation_code,
            } => write!(
                f,
                "no active publication for template `{template_code}` and formation `{formation_code}`"
            ),
            Self::Catalog(err) => write!(f, "{err}"),
            Self::Directory(err) => write!(f, "{err}"),
            Self::Publications(err) => write!(f, "{err}"),
        }
    }
}

impl Error for GateError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Catalog(err) => Some(err),
            Self::Directory(err) => Some(err),
            Self::Publications(err) => Some(err),
            _ => None,
        }
    }
}

impl From<CatalogRepoError> for GateError {
    fn from(value: CatalogRepoError) -> Self {
        Self::Catalog(value)
    }
}

impl From<DirectoryRepoError> for GateError {
    fn from(value: DirectoryRepoError) -> Self {
        Self::Directory(value)
    }
}

impl From<PublicationRepoError> for GateError {
    fn from(value: PublicationRepoError) -> Self {
        Self::Publications(value)
    }
}

/// Publication gate facade over catalog, directory, and publication stores.
pub struct PublicationService<C, F, P>
where
    C: CatalogRepository,
    F: FormationDirectory,
    P: PublicationRepository,
{
    catalog: C,
    formations: F,
    publications: P,
}

impl<C, F, P> PublicationService<C, F, P>
where
    C: CatalogRepository,
    F: FormationDirectory,
    P: PublicationRepository,
{
    /// Creates the gate from its three store implementations.
    pub fn new(catalog: C, formations: F, publications: P) -> Self {
        Self {
            catalog,
            formations,
            publications,
        }
    }

    /// Creates one publication window binding a template to a formation.
    pub fn create_publication(
        &self,
        template_code: &str,
        formation_code: &str,
        window_start: i64,
        window_end: i64,
    ) -> Result<Publication, GateError> {
        let template = self
            .catalog
            .load_template_by_code(template_code)?
            .ok_or_else(|| GateError::TemplateNotFound(template_code.to_string()))?;
        if template.status != TemplateStatus::Published {
            return Err(GateError::TemplateNotPublished(template_code.to_string()));
        }

        let formation = self
            .formations
            .find_by_code(formation_code)?
            .ok_or_else(|| GateError::FormationNotFound(formation_code.to_string()))?;

        let publication = self.publications.create_publication(
            template.template_uuid,
            formation.formation_uuid,
            window_start,
            window_end,
        )?;
        info!(
            "event=publication_create module=gate status=ok publication={} template={} formation={} window_start={} window_end={}",
            publication.publication_uuid,
            template_code,
            formation_code,
            window_start,
            window_end
        );
        Ok(publication)
    }

    /// Resolves the active publication for the triple.
    ///
    /// # Contract
    /// - Formation is resolved by code first; unknown/inactive codes fail
    ///   with `FormationNotFound`.
    /// - Among overlapping windows the most recently created wins.
    pub fn find_active(
        &self,
        template_code: &str,
        formation_code: &str,
        now_epoch_ms: i64,
    ) -> Result<Publication, GateError> {
        let template = self
            .catalog
            .load_template_by_code(template_code)?
            .ok_or_else(|| GateError::TemplateNotFound(template_code.to_string()))?;

        let formation = self
            .formations
            .find_by_code(formation_code)?
            .ok_or_else(|| GateError::FormationNotFound(formation_code.to_string()))?;

        self.publications
            .find_active(template.template_uuid, formation.formation_uuid, now_epoch_ms)?
            .ok_or_else(|| GateError::NoActivePublication {
                template_code: template_code.to_string(),
                formation_code: formation_code.to_string(),
            })
    }

    /// Returns the questionnaire tree a respondent may answer right now.
    ///
    /// # Contract
    /// - Succeeds iff the template is Published, targets `role`, and some
    ///   publication window for the formation covers `now`.
    /// - Draft templates and role mismatches surface as `TemplateNotFound`,
    ///   indistinguishable from missing codes.
    pub fn active_questionnaire(
        &self,
        template_code: &str,
        formation_code: &str,
        role: Role,
        now_epoch_ms: i64,
    ) -> Result<Template, GateError> {
        let template = self
            .catalog
            .load_template_by_code(template_code)?
            .ok_or_else(|| GateError::TemplateNotFound(template_code.to_string()))?;
        if template.status != TemplateStatus::Published || template.target_role != role {
            return Err(GateError::TemplateNotFound(template_code.to_string()));
        }

        let formation = self
            .formations
            .find_by_code(formation_code)?
            .ok_or_else(|| GateError::FormationNotFound(formation_code.to_string()))?;

        self.publications
            .find_active(template.template_uuid, formation.formation_uuid, now_epoch_ms)?
            .ok_or_else(|| GateError::NoActivePublication {
                template_code: template_code.to_string(),
                formation_code: formation_code.to_string(),
            })?;

        Ok(template)
    }
}
