//! Submission engine use-case service.
//!
//! # Responsibility
//! - Run the submit pipeline: gate check, whole-batch validation, atomic
//!   merge, optional finalize.
//! - Keep the merge additive: prior answers survive batches that do not
//!   mention them.
//!
//! # Invariants
//! - The entire batch is validated against the template before any storage
//!   touch; a submit call is all-or-nothing.
//! - Mandatory coverage is checked on the merged answer map (prior answers
//!   plus batch), only when finalizing.
//! - Submitting the identical batch repeatedly yields the same stored state.

use crate::model::publication::PublicationId;
use crate::model::submission::{
    validate_answer_value, AnswerValidationError, AnswerValue, RespondentId, SubmissionId,
};
use crate::model::template::{QuestionId, Role, Template, TemplateStatus};
use crate::repo::catalog_repo::{CatalogRepoError, CatalogRepository};
use crate::repo::formation_repo::{DirectoryRepoError, FormationDirectory};
use crate::repo::publication_repo::{PublicationRepoError, PublicationRepository};
use crate::repo::submission_repo::{
    AnswerUpsert, SubmissionRepoError, SubmissionRepository,
};
use log::{info, warn};
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

/// One incoming answer in wire shape: numeric XOR text slot populated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerInput {
    pub question_uuid: QuestionId,
    pub value_number: Option<i64>,
    pub value_text: Option<String>,
}

impl AnswerInput {
    /// Convenience constructor for a numeric answer.
    pub fn number(question_uuid: QuestionId, value: i64) -> Self {
        Self {
            question_uuid,
            value_number: Some(value),
            value_text: None,
        }
    }

    /// Convenience constructor for a text answer.
    pub fn text(question_uuid: QuestionId, value: impl Into<String>) -> Self {
        Self {
            question_uuid,
            value_number: None,
            value_text: Some(value.into()),
        }
    }

    fn into_value(self) -> Result<(QuestionId, AnswerValue), AnswerValidationError> {
        match (self.value_number, self.value_text) {
            (Some(number), None) => Ok((self.question_uuid, AnswerValue::Number(number))),
            (None, Some(text)) => Ok((self.question_uuid, AnswerValue::Text(text))),
            (None, None) => Err(AnswerValidationError::MissingValue(self.question_uuid)),
            (Some(_), Some(_)) => Err(AnswerValidationError::AmbiguousValue(self.question_uuid)),
        }
    }
}

/// One submit call: identity claims, batch, and finalize intent.
///
/// `respondent_id` and `respondent_role` come verified from the identity
/// collaborator; the core trusts the claim and never re-derives it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitRequest {
    pub template_code: String,
    pub formation_code: String,
    pub respondent_id: RespondentId,
    pub respondent_role: Role,
    pub answers: Vec<AnswerInput>,
    /// `true` asks for mandatory-coverage check + completion; `false` is a
    /// draft save that merges only.
    pub finalize: bool,
    pub now_epoch_ms: i64,
}

/// Result of an accepted submit call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitOutcome {
    pub submission_uuid: SubmissionId,
    pub publication_uuid: PublicationId,
    /// Number of answers merged from this batch.
    pub answers_merged: usize,
    pub completed: bool,
}

/// Errors from the submit pipeline, mapped to the caller-facing taxonomy.
#[derive(Debug)]
pub enum SubmitError {
    /// NotFound: unknown or invisible template code.
    TemplateNotFound(String),
    /// NotFound: unknown or inactive formation code.
    FormationNotFound(String),
    /// NotFound: no publication window covers `now`.
    NoActivePublication {
        template_code: String,
        formation_code: String,
    },
    /// Forbidden: template targets another respondent population.
    RoleMismatch {
        template_role: Role,
        respondent_role: Role,
    },
    /// Validation: batch rejected before persistence.
    Validation(AnswerValidationError),
    Catalog(CatalogRepoError),
    Directory(DirectoryRepoError),
    Publications(PublicationRepoError),
    Submissions(SubmissionRepoError),
}

impl Display for SubmitError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TemplateNotFound(code) => write!(f, "template not found: `{code}`"),
            Self::FormationNotFound(code) => write!(f, "formation not found: `{code}`"),
            Self::NoActivePublication {
                template_code,
                formation_code,
            } => write!(
                f,
                "no active publication for template `{template_code}` and formation `{formation_code}`"
            ),
            Self::RoleMismatch {
                template_role,
                respondent_role,
            } => write!(
                f,
                "template targets {template_role:?}, respondent is {respondent_role:?}"
            ),
            Self::Validation(err) => write!(f, "{err}"),
            Self::Catalog(err) => write!(f, "{err}"),
            Self::Directory(err) => write!(f, "{err}"),
            Self::Publications(err) => write!(f, "{err}"),
            Self::Submissions(err) => write!(f, "{err}"),
        }
    }
}

impl Error for SubmitError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Catalog(err) => Some(err),
            Self::Directory(err) => Some(err),
            Self::Publications(err) => Some(err),
            Self::Submissions(err) => Some(err),
            _ => None,
        }
    }
}

impl From<AnswerValidationError> for SubmitError {
    fn from(value: AnswerValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<CatalogRepoError> for SubmitError {
    fn from(value: CatalogRepoError) -> Self {
        Self::Catalog(value)
    }
}

impl From<DirectoryRepoError> for SubmitError {
    fn from(value: DirectoryRepoError) -> Self {
        Self::Directory(value)
    }
}

impl From<PublicationRepoError> for SubmitError {
    fn from(value: PublicationRepoError) -> Self {
        Self::Publications(value)
    }
}

impl From<SubmissionRepoError> for SubmitError {
    fn from(value: SubmissionRepoError) -> Self {
        Self::Submissions(value)
    }
}

/// Submission engine facade.
pub struct SubmissionService<C, F, P, S>
where
    C: CatalogRepository,
    F: FormationDirectory,
    P: PublicationRepository,
    S: SubmissionRepository,
{
    catalog: C,
    formations: F,
    publications: P,
    submissions: S,
}

impl<C, F, P, S> SubmissionService<C, F, P, S>
where
    C: CatalogRepository,
    F: FormationDirectory,
    P: PublicationRepository,
    S: SubmissionRepository,
{
    /// Creates the engine from its four store implementations.
    pub fn new(catalog: C, formations: F, publications: P, submissions: S) -> Self {
        Self {
            catalog,
            formations,
            publications,
            submissions,
        }
    }

    /// Merges one answer batch into the caller's submission.
    ///
    /// # Contract
    /// - Succeeds only inside an active publication window and for the
    ///   template's target role.
    /// - Merge is additive and idempotent per question key; re-submitting
    ///   after completion keeps merging while the window is open.
    /// - On any error nothing is persisted.
    pub fn submit(&self, request: &SubmitRequest) -> Result<SubmitOutcome, SubmitError> {
        let started_at = Instant::now();
        let result = self.submit_inner(request);

        match &result {
            Ok(outcome) => info!(
                "event=submit module=submission status=ok publication={} respondent={} answers={} completed={} duration_ms={}",
                outcome.publication_uuid,
                request.respondent_id,
                outcome.answers_merged,
                outcome.completed,
                started_at.elapsed().as_millis()
            ),
            Err(err) => warn!(
                "event=submit module=submission status=error template={} formation={} respondent={} duration_ms={} error={}",
                request.template_code,
                request.formation_code,
                request.respondent_id,
                started_at.elapsed().as_millis(),
                err
            ),
        }

        result
    }

    fn submit_inner(&self, request: &SubmitRequest) -> Result<SubmitOutcome, SubmitError> {
        let template = self
            .catalog
            .load_template_by_code(&request.template_code)?
            .filter(|template| template.status == TemplateStatus::Published)
            .ok_or_else(|| SubmitError::TemplateNotFound(request.template_code.clone()))?;

        if template.target_role != request.respondent_role {
            return Err(SubmitError::RoleMismatch {
                template_role: template.target_role,
                respondent_role: request.respondent_role,
            });
        }

        let formation = self
            .formations
            .find_by_code(&request.formation_code)?
            .ok_or_else(|| SubmitError::FormationNotFound(request.formation_code.clone()))?;

        let publication = self
            .publications
            .find_active(
                template.template_uuid,
                formation.formation_uuid,
                request.now_epoch_ms,
            )?
            .ok_or_else(|| SubmitError::NoActivePublication {
                template_code: request.template_code.clone(),
                formation_code: request.formation_code.clone(),
            })?;

        if request.answers.is_empty() && !request.finalize {
            return Err(SubmitError::Validation(
                AnswerValidationError::EmptyAnswerBatch,
            ));
        }

        let upserts = validate_batch(&template, &request.answers)?;

        if request.finalize {
            self.ensure_mandatory_coverage(&template, &publication.publication_uuid, request, &upserts)?;
        }

        let submission = self.submissions.merge_answers(
            publication.publication_uuid,
            request.respondent_id,
            &upserts,
            request.finalize,
        )?;

        Ok(SubmitOutcome {
            submission_uuid: submission.submission_uuid,
            publication_uuid: publication.publication_uuid,
            answers_merged: upserts.len(),
            completed: submission.is_completed,
        })
    }

    /// Checks mandatory coverage on the merged answer map.
    ///
    /// Coverage only grows under merge, so a pre-transaction read is safe:
    /// a concurrent batch can add answers but never remove them.
    fn ensure_mandatory_coverage(
        &self,
        template: &Template,
        publication_uuid: &PublicationId,
        request: &SubmitRequest,
        upserts: &[AnswerUpsert],
    ) -> Result<(), SubmitError> {
        let mandatory = template.mandatory_question_ids();
        if mandatory.is_empty() {
            return Ok(());
        }

        let mut covered: BTreeSet<QuestionId> =
            upserts.iter().map(|upsert| upsert.question_uuid).collect();
        if let Some(existing) = self
            .submissions
            .load_submission(*publication_uuid, request.respondent_id)?
        {
            covered.extend(existing.answers.keys().copied());
        }

        for question_uuid in mandatory {
            if !covered.contains(&question_uuid) {
                return Err(SubmitError::Validation(
                    AnswerValidationError::MandatoryUnanswered(question_uuid),
                ));
            }
        }
        Ok(())
    }
}

/// Validates the whole batch against the template, in input order.
///
/// Later duplicates of the same question key win, matching merge semantics.
fn validate_batch(
    template: &Template,
    answers: &[AnswerInput],
) -> Result<Vec<AnswerUpsert>, AnswerValidationError> {
    let mut upserts = Vec::with_capacity(answers.len());
    for input in answers {
        let (question_uuid, value) = input.clone().into_value()?;
        let question = template
            .find_question(question_uuid)
            .ok_or(AnswerValidationError::UnknownQuestion(question_uuid))?;
        validate_answer_value(question, &value)?;
        upserts.push(AnswerUpsert {
            question_uuid,
            value,
        });
    }
    Ok(upserts)
}
