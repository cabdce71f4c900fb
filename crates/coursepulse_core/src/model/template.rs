//! Questionnaire template domain model.
//!
//! # Responsibility
//! - Define the Template -> Section -> Question catalog tree.
//! - Validate authoring input before it reaches persistence.
//!
//! # Invariants
//! - `code` is unique across templates and matches [`TEMPLATE_CODE_RE`].
//! - A Published template is structurally frozen; only Draft templates accept
//!   section/question edits.
//! - `max_length` is meaningful only for `QuestionType::Text`; option lists
//!   only for enumerated types (Likert/Binary).

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier for a questionnaire template.
pub type TemplateId = Uuid;
/// Stable identifier for a template section.
pub type SectionId = Uuid;
/// Stable identifier for a question.
pub type QuestionId = Uuid;

/// Inclusive Likert scale bounds.
pub const LIKERT_MIN: i64 = 1;
pub const LIKERT_MAX: i64 = 5;

/// Allowed template/formation code shape: uppercase alphanumeric start, then
/// up to 31 more characters from `[A-Z0-9_-]`.
pub static TEMPLATE_CODE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z0-9][A-Z0-9_-]{1,31}$").expect("valid template code regex"));

/// Respondent population a template targets.
///
/// One service parametrized by this enum replaces per-role service copies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Student,
    Teacher,
    Professional,
}

/// Template lifecycle state. The transition is one-way: Draft -> Published.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateStatus {
    Draft,
    Published,
}

/// Supported question kinds, each with its own value domain and
/// aggregation rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    /// Numeric rating on the inclusive 1..=5 scale.
    Likert,
    /// Numeric 0/1 answer with negative/affirmative labels.
    Binary,
    /// Free text bounded by an optional maximum length.
    Text,
}

/// Display label attached to one enumerated answer value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionOption {
    /// Answer value this label describes (1..=5 for Likert, 0/1 for Binary).
    pub value: i64,
    pub label: String,
}

/// Persisted question read model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub question_uuid: QuestionId,
    pub section_uuid: SectionId,
    pub wording: String,
    #[serde(rename = "type")]
    pub kind: QuestionType,
    pub mandatory: bool,
    /// Maximum answer length in characters. `Some` only for Text questions.
    pub max_length: Option<u32>,
    /// Value labels, ordered by value ascending. Empty for Text questions.
    pub options: Vec<QuestionOption>,
    /// Stable position within the owning section.
    pub display_order: i64,
}

/// Persisted section read model with its ordered questions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    pub section_uuid: SectionId,
    pub template_uuid: TemplateId,
    pub title: String,
    pub display_order: i64,
    pub questions: Vec<Question>,
}

/// Full questionnaire template tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    pub template_uuid: TemplateId,
    pub code: String,
    pub title: String,
    pub version: i64,
    pub status: TemplateStatus,
    pub target_role: Role,
    pub sections: Vec<Section>,
    /// Epoch ms creation timestamp.
    pub created_at: i64,
    /// Epoch ms update timestamp.
    pub updated_at: i64,
}

impl Template {
    /// Looks up one question anywhere in the tree by stable id.
    pub fn find_question(&self, question_uuid: QuestionId) -> Option<&Question> {
        self.sections
            .iter()
            .flat_map(|section| section.questions.iter())
            .find(|question| question.question_uuid == question_uuid)
    }

    /// Returns ids of all questions flagged mandatory, in display order.
    pub fn mandatory_question_ids(&self) -> Vec<QuestionId> {
        self.sections
            .iter()
            .flat_map(|section| section.questions.iter())
            .filter(|question| question.mandatory)
            .map(|question| question.question_uuid)
            .collect()
    }

    /// Total number of questions across all sections.
    pub fn question_count(&self) -> usize {
        self.sections
            .iter()
            .map(|section| section.questions.len())
            .sum()
    }
}

/// Authoring input for one question, validated before persistence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionDraft {
    pub wording: String,
    pub kind: QuestionType,
    pub mandatory: bool,
    pub max_length: Option<u32>,
    pub options: Vec<QuestionOption>,
}

impl QuestionDraft {
    /// Creates a draft with no options and no length bound.
    pub fn new(kind: QuestionType, wording: impl Into<String>) -> Self {
        Self {
            wording: wording.into(),
            kind,
            mandatory: false,
            max_length: None,
            options: Vec::new(),
        }
    }

    /// Checks structural rules for the question kind.
    ///
    /// # Invariants
    /// - Wording must not be blank.
    /// - `max_length` is allowed only on Text questions and must be > 0.
    /// - Options are allowed only on enumerated kinds, with non-blank labels,
    ///   unique values, and values inside the kind's domain.
    pub fn validate(&self) -> Result<(), TemplateValidationError> {
        if self.wording.trim().is_empty() {
            return Err(TemplateValidationError::BlankWording);
        }

        match self.kind {
            QuestionType::Text => {
                if self.max_length == Some(0) {
                    return Err(TemplateValidationError::ZeroMaxLength);
                }
                if !self.options.is_empty() {
                    return Err(TemplateValidationError::OptionsOnTextQuestion);
                }
            }
            QuestionType::Likert | QuestionType::Binary => {
                if self.max_length.is_some() {
                    return Err(TemplateValidationError::MaxLengthOnNonText);
                }
                let (min, max) = value_domain(self.kind);
                let mut seen = Vec::with_capacity(self.options.len());
                for option in &self.options {
                    if option.label.trim().is_empty() {
                        return Err(TemplateValidationError::BlankOptionLabel(option.value));
                    }
                    if option.value < min || option.value > max {
                        return Err(TemplateValidationError::OptionValueOutOfDomain {
                            value: option.value,
                            min,
                            max,
                        });
                    }
                    if seen.contains(&option.value) {
                        return Err(TemplateValidationError::DuplicateOptionValue(option.value));
                    }
                    seen.push(option.value);
                }
            }
        }

        Ok(())
    }
}

/// Returns the inclusive numeric value domain for an enumerated kind.
///
/// Text questions have no numeric domain and must not be passed here.
pub fn value_domain(kind: QuestionType) -> (i64, i64) {
    match kind {
        QuestionType::Likert => (LIKERT_MIN, LIKERT_MAX),
        QuestionType::Binary => (0, 1),
        QuestionType::Text => (0, 0),
    }
}

/// Checks the shared code shape used by templates and formations.
pub fn validate_code(code: &str) -> Result<(), TemplateValidationError> {
    if TEMPLATE_CODE_RE.is_match(code) {
        Ok(())
    } else {
        Err(TemplateValidationError::InvalidCode(code.to_string()))
    }
}

/// Authoring-time validation failures for catalog structures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateValidationError {
    /// Code does not match the required shape.
    InvalidCode(String),
    /// Question wording is blank after trim.
    BlankWording,
    /// `max_length` set on a non-Text question.
    MaxLengthOnNonText,
    /// `max_length` of zero would reject every answer.
    ZeroMaxLength,
    /// Option list attached to a Text question.
    OptionsOnTextQuestion,
    /// Option label is blank after trim.
    BlankOptionLabel(i64),
    /// Option value outside the kind's numeric domain.
    OptionValueOutOfDomain { value: i64, min: i64, max: i64 },
    /// Two options share the same value.
    DuplicateOptionValue(i64),
}

impl Display for TemplateValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidCode(code) => write!(f, "invalid code `{code}`"),
            Self::BlankWording => write!(f, "question wording must not be blank"),
            Self::MaxLengthOnNonText => {
                write!(f, "max_length is only valid for text questions")
            }
            Self::ZeroMaxLength => write!(f, "max_length must be greater than zero"),
            Self::OptionsOnTextQuestion => {
                write!(f, "options are only valid for likert/binary questions")
            }
            Self::BlankOptionLabel(value) => {
                write!(f, "option label for value {value} must not be blank")
            }
            Self::OptionValueOutOfDomain { value, min, max } => {
                write!(f, "option value {value} outside domain {min}..={max}")
            }
            Self::DuplicateOptionValue(value) => {
                write!(f, "duplicate option value {value}")
            }
        }
    }
}

impl Error for TemplateValidationError {}
