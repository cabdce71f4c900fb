//! Submission aggregate and answer-value validation.
//!
//! # Responsibility
//! - Model one respondent's answer set for one publication.
//! - Enforce the answer-value invariant: numeric XOR text, matching the
//!   owning question's type and domain.
//!
//! # Invariants
//! - Exactly one submission exists per (publication, respondent) key.
//! - Answers are keyed by question id; merging overwrites by key and never
//!   drops keys absent from a batch.
//! - `is_completed` is set only after mandatory coverage holds on the merged
//!   answer map.

use crate::model::publication::PublicationId;
use crate::model::template::{value_domain, Question, QuestionId, QuestionType};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier for a submission aggregate.
pub type SubmissionId = Uuid;
/// Verified respondent identity supplied by the identity collaborator.
pub type RespondentId = Uuid;

/// Recorded value of one answer: numeric or text, never both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnswerValue {
    /// Likert 1..=5 or Binary 0/1.
    Number(i64),
    /// Free text for Text questions.
    Text(String),
}

/// One question's recorded value within a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Answer {
    pub question_uuid: QuestionId,
    pub value: AnswerValue,
    /// Epoch ms of the last merge touching this answer.
    pub updated_at: i64,
}

/// Aggregate root keyed by (publication, respondent).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub submission_uuid: SubmissionId,
    pub publication_uuid: PublicationId,
    pub respondent_id: RespondentId,
    pub is_completed: bool,
    /// Epoch ms creation timestamp; orders text-answer collection.
    pub created_at: i64,
    pub updated_at: i64,
    /// Owned answers, keyed by question id for deterministic iteration.
    pub answers: BTreeMap<QuestionId, Answer>,
}

impl Submission {
    /// Whether every id in `mandatory` has a recorded answer.
    pub fn covers_mandatory(&self, mandatory: &[QuestionId]) -> bool {
        mandatory.iter().all(|id| self.answers.contains_key(id))
    }
}

/// Checks one answer value against its owning question.
///
/// # Contract
/// - Likert/Binary accept only `AnswerValue::Number` inside the kind's
///   inclusive domain.
/// - Text accepts only `AnswerValue::Text` within `max_length` characters
///   when a bound is set.
pub fn validate_answer_value(
    question: &Question,
    value: &AnswerValue,
) -> Result<(), AnswerValidationError> {
    match (question.kind, value) {
        (QuestionType::Likert | QuestionType::Binary, AnswerValue::Number(number)) => {
            let (min, max) = value_domain(question.kind);
            if *number < min || *number > max {
                return Err(AnswerValidationError::NumberOutOfRange {
                    question_uuid: question.question_uuid,
                    value: *number,
                    min,
                    max,
                });
            }
            Ok(())
        }
        (QuestionType::Text, AnswerValue::Text(text)) => {
            if let Some(max_length) = question.max_length {
                let length = text.chars().count();
                if length > max_length as usize {
                    return Err(AnswerValidationError::TextTooLong {
                        question_uuid: question.question_uuid,
                        length,
                        max_length,
                    });
                }
            }
            Ok(())
        }
        (expected_kind, _) => Err(AnswerValidationError::WrongValueSlot {
            question_uuid: question.question_uuid,
            expected: expected_kind,
        }),
    }
}

/// Validation failures for submitted answer batches.
///
/// All variants reject the whole batch before any persistence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnswerValidationError {
    /// Batch references a question absent from the template.
    UnknownQuestion(QuestionId),
    /// Neither value slot is populated.
    MissingValue(QuestionId),
    /// Both value slots are populated.
    AmbiguousValue(QuestionId),
    /// Populated slot does not match the question type.
    WrongValueSlot {
        question_uuid: QuestionId,
        expected: QuestionType,
    },
    /// Numeric value outside the question kind's inclusive domain.
    NumberOutOfRange {
        question_uuid: QuestionId,
        value: i64,
        min: i64,
        max: i64,
    },
    /// Text answer exceeds the question's maximum length.
    TextTooLong {
        question_uuid: QuestionId,
        length: usize,
        max_length: u32,
    },
    /// A mandatory question has no answer on the merged map at finalize.
    MandatoryUnanswered(QuestionId),
    /// Non-finalizing call carried no answers.
    EmptyAnswerBatch,
}

impl Display for AnswerValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownQuestion(id) => write!(f, "unknown question: {id}"),
            Self::MissingValue(id) => write!(f, "answer for question {id} has no value"),
            Self::AmbiguousValue(id) => {
                write!(f, "answer for question {id} has both numeric and text values")
            }
            Self::WrongValueSlot {
                question_uuid,
                expected,
            } => write!(
                f,
                "answer for question {question_uuid} does not match question type {expected:?}"
            ),
            Self::NumberOutOfRange {
                question_uuid,
                value,
                min,
                max,
            } => write!(
                f,
                "value {value} for question {question_uuid} outside {min}..={max}"
            ),
            Self::TextTooLong {
                question_uuid,
                length,
                max_length,
            } => write!(
                f,
                "text answer for question {question_uuid} has {length} chars, max {max_length}"
            ),
            Self::MandatoryUnanswered(id) => {
                write!(f, "mandatory question {id} is unanswered")
            }
            Self::EmptyAnswerBatch => write!(f, "answer batch is empty"),
        }
    }
}

impl Error for AnswerValidationError {}

#[cfg(test)]
mod tests {
    use super::{validate_answer_value, AnswerValidationError, AnswerValue};
    use crate::model::template::{Question, QuestionType};
    use uuid::Uuid;

    fn question(kind: QuestionType, max_length: Option<u32>) -> Question {
        Question {
            question_uuid: Uuid::new_v4(),
            section_uuid: Uuid::new_v4(),
            wording: "q".to_string(),
            kind,
            mandatory: false,
            max_length,
            options: Vec::new(),
            display_order: 0,
        }
    }

    #[test]
    fn likert_accepts_domain_and_rejects_outside() {
        let q = question(QuestionType::Likert, None);
        validate_answer_value(&q, &AnswerValue::Number(1)).expect("1 is in domain");
        validate_answer_value(&q, &AnswerValue::Number(5)).expect("5 is in domain");
        assert!(matches!(
            validate_answer_value(&q, &AnswerValue::Number(0)),
            Err(AnswerValidationError::NumberOutOfRange { value: 0, .. })
        ));
        assert!(matches!(
            validate_answer_value(&q, &AnswerValue::Number(6)),
            Err(AnswerValidationError::NumberOutOfRange { value: 6, .. })
        ));
    }

    #[test]
    fn binary_rejects_text_slot() {
        let q = question(QuestionType::Binary, None);
        let err = validate_answer_value(&q, &AnswerValue::Text("yes".to_string())).unwrap_err();
        assert!(matches!(
            err,
            AnswerValidationError::WrongValueSlot {
                expected: QuestionType::Binary,
                ..
            }
        ));
    }

    #[test]
    fn text_length_bound_counts_characters() {
        let q = question(QuestionType::Text, Some(4));
        validate_answer_value(&q, &AnswerValue::Text("abcd".to_string())).expect("at bound");
        // Multibyte characters count as one each.
        validate_answer_value(&q, &AnswerValue::Text("héhé".to_string())).expect("4 chars");
        assert!(matches!(
            validate_answer_value(&q, &AnswerValue::Text("abcde".to_string())),
            Err(AnswerValidationError::TextTooLong { length: 5, .. })
        ));
    }

    #[test]
    fn text_without_bound_accepts_any_length() {
        let q = question(QuestionType::Text, None);
        validate_answer_value(&q, &AnswerValue::Text("x".repeat(10_000))).expect("unbounded");
    }
}
