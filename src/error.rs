// ⚠️ Error taxonomy for the records engine
//
// Every failure carries a stable kind plus the entity id / field involved,
// so callers can build their own message. No user-facing text is formatted here
// beyond the Display impls used for logs.

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// ENTITY + RULE TAGS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Entity {
    Course,
    Student,
    GradeRecord,
    Transcript,
}

impl Entity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Entity::Course => "course",
            Entity::Student => "student",
            Entity::GradeRecord => "grade_record",
            Entity::Transcript => "transcript",
        }
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One-way transitions and the rules guarding them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BusinessRule {
    /// Draft-only mutation attempted on a finalized record
    RecordFinalized,
    /// Second finalize on the same record
    AlreadyFinalized,
    /// Second certify on the same transcript
    AlreadyCertified,
}

impl BusinessRule {
    pub fn as_str(&self) -> &'static str {
        match self {
            BusinessRule::RecordFinalized => "record is finalized and cannot be modified",
            BusinessRule::AlreadyFinalized => "record is already finalized",
            BusinessRule::AlreadyCertified => "transcript is already certified",
        }
    }
}

impl fmt::Display for BusinessRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// ERROR
// ============================================================================

#[derive(thiserror::Error, Debug)]
pub enum RecordError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: Entity, id: String },

    #[error(
        "grade record already exists for course {course_id}, student {student_id}, \
         {semester} {academic_year}"
    )]
    Conflict {
        course_id: String,
        student_id: String,
        semester: String,
        academic_year: String,
    },

    #[error("invalid {field}: {reason}")]
    InvalidInput { field: &'static str, reason: String },

    #[error("{entity} {id}: {rule}")]
    BusinessRuleViolation {
        entity: Entity,
        id: String,
        rule: BusinessRule,
    },

    #[error("invariant violated on {entity} {id}: {detail}")]
    InvariantViolation {
        entity: Entity,
        id: String,
        detail: String,
    },

    #[error(transparent)]
    Storage(#[from] rusqlite::Error),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

/// Stable, serializable classification of a [`RecordError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    Conflict,
    InvalidInput,
    BusinessRuleViolation,
    InvariantViolation,
    Storage,
}

impl RecordError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RecordError::NotFound { .. } => ErrorKind::NotFound,
            RecordError::Conflict { .. } => ErrorKind::Conflict,
            RecordError::InvalidInput { .. } => ErrorKind::InvalidInput,
            RecordError::BusinessRuleViolation { .. } => ErrorKind::BusinessRuleViolation,
            RecordError::InvariantViolation { .. } => ErrorKind::InvariantViolation,
            RecordError::Storage(_) | RecordError::Serialization(_) => ErrorKind::Storage,
        }
    }

    pub(crate) fn not_found(entity: Entity, id: &str) -> Self {
        RecordError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        RecordError::InvalidInput {
            field,
            reason: reason.into(),
        }
    }

    pub(crate) fn rule(entity: Entity, id: &str, rule: BusinessRule) -> Self {
        tracing::warn!(
            entity = entity.as_str(),
            id,
            rule = rule.as_str(),
            "business rule violation"
        );
        RecordError::BusinessRuleViolation {
            entity,
            id: id.to_string(),
            rule,
        }
    }

    /// Invariant violations are fatal: logged at error level, never corrected.
    pub(crate) fn invariant(entity: Entity, id: &str, detail: impl Into<String>) -> Self {
        let detail = detail.into();
        tracing::error!(entity = entity.as_str(), id, %detail, "invariant violation");
        RecordError::InvariantViolation {
            entity,
            id: id.to_string(),
            detail,
        }
    }
}

pub type Result<T> = std::result::Result<T, RecordError>;
