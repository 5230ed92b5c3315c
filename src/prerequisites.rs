// 🔐 Prerequisite Validator - gate enrollment on verified completion
//
// A prerequisite is satisfied only by a FINALIZED record with a PASSING score
// (≥ 60). Draft grades and finalized failing grades both count as missing.
// Missing prerequisites are reported in catalog-declared order.

use crate::catalog::{CourseCatalog, StudentDirectory};
use crate::entities::GradeRecordFilter;
use crate::error::{Entity, RecordError, Result};
use crate::period::PeriodFilter;
use crate::store::GradeRecordSource;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrerequisiteCheck {
    pub satisfied: bool,

    /// Unsatisfied prerequisite course ids, in catalog order
    pub missing: Vec<String>,
}

impl PrerequisiteCheck {
    pub fn satisfied() -> Self {
        PrerequisiteCheck {
            satisfied: true,
            missing: Vec::new(),
        }
    }

    fn from_missing(missing: Vec<String>) -> Self {
        PrerequisiteCheck {
            satisfied: missing.is_empty(),
            missing,
        }
    }
}

pub struct PrerequisiteValidator {
    records: Arc<dyn GradeRecordSource>,
    catalog: Arc<dyn CourseCatalog>,
    directory: Arc<dyn StudentDirectory>,
}

impl PrerequisiteValidator {
    pub fn new(
        records: Arc<dyn GradeRecordSource>,
        catalog: Arc<dyn CourseCatalog>,
        directory: Arc<dyn StudentDirectory>,
    ) -> Self {
        PrerequisiteValidator {
            records,
            catalog,
            directory,
        }
    }

    pub fn validate(&self, student_id: &str, course_id: &str) -> Result<PrerequisiteCheck> {
        let course = self
            .catalog
            .course(course_id)
            .ok_or_else(|| RecordError::not_found(Entity::Course, course_id))?;
        if !self.directory.exists(student_id) {
            return Err(RecordError::not_found(Entity::Student, student_id));
        }

        if course.prerequisites.is_empty() {
            return Ok(PrerequisiteCheck::satisfied());
        }

        // Any finalized passing attempt counts, whatever the period
        let records = self
            .records
            .list(&GradeRecordFilter::finalized_for(student_id, PeriodFilter::all()))?;
        let passed: HashSet<&str> = records
            .iter()
            .filter(|r| r.finalized && r.is_passing())
            .map(|r| r.course_id.as_str())
            .collect();

        let missing: Vec<String> = course
            .prerequisites
            .iter()
            .filter(|p| !passed.contains(p.as_str()))
            .cloned()
            .collect();

        let check = PrerequisiteCheck::from_missing(missing);
        tracing::debug!(
            student_id,
            course_id,
            satisfied = check.satisfied,
            missing = ?check.missing,
            "prerequisites checked"
        );
        Ok(check)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::period::{AcademicYear, Semester};
    use crate::test_support::{fixture, Fixture, OTHER_STUDENT, STUDENT};

    fn validator(f: &Fixture) -> PrerequisiteValidator {
        PrerequisiteValidator::new(
            f.store.clone(),
            Arc::new(f.catalog.clone()),
            Arc::new(f.students.clone()),
        )
    }

    fn year() -> AcademicYear {
        "2024-2025".parse().unwrap()
    }

    fn grade(f: &Fixture, course: &str, score: f64, semester: Semester, finalize: bool) {
        let record = f
            .store
            .create(course, STUDENT, score, semester, year(), None)
            .unwrap();
        if finalize {
            f.store.finalize(record.id(), "registrar").unwrap();
        }
    }

    fn ids(missing: &[&str]) -> Vec<String> {
        missing.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_no_prerequisites_is_satisfied() {
        let f = fixture();
        let check = validator(&f).validate(STUDENT, "CS101").unwrap();
        assert_eq!(check, PrerequisiteCheck::satisfied());
    }

    #[test]
    fn test_unfinalized_grade_does_not_satisfy() {
        let f = fixture();
        grade(&f, "CS101", 95.0, Semester::Fall, false);
        grade(&f, "MATH100", 95.0, Semester::Fall, true);

        let check = validator(&f).validate(STUDENT, "CS201").unwrap();
        assert!(!check.satisfied);
        assert_eq!(check.missing, ids(&["CS101"]));
    }

    #[test]
    fn test_finalized_failing_grade_does_not_satisfy() {
        let f = fixture();
        grade(&f, "CS101", 55.0, Semester::Fall, true);
        grade(&f, "MATH100", 95.0, Semester::Fall, true);

        let check = validator(&f).validate(STUDENT, "CS201").unwrap();
        assert_eq!(check.missing, ids(&["CS101"]));
        assert!(!check.satisfied);
    }

    #[test]
    fn test_finalized_passing_grades_satisfy() {
        let f = fixture();
        grade(&f, "CS101", 85.0, Semester::Fall, true);
        grade(&f, "MATH100", 60.0, Semester::Fall, true);

        let check = validator(&f).validate(STUDENT, "CS201").unwrap();
        assert!(check.satisfied);
        assert!(check.missing.is_empty());
    }

    #[test]
    fn test_any_passing_attempt_counts() {
        let f = fixture();
        grade(&f, "CS101", 40.0, Semester::Fall, true);
        grade(&f, "CS101", 78.0, Semester::Spring, true);
        grade(&f, "MATH100", 88.0, Semester::Fall, true);

        assert!(validator(&f).validate(STUDENT, "CS201").unwrap().satisfied);
    }

    #[test]
    fn test_missing_preserves_catalog_order() {
        let f = fixture();
        let check = validator(&f).validate(OTHER_STUDENT, "CS201").unwrap();
        assert_eq!(check.missing, ids(&["CS101", "MATH100"]));
    }

    #[test]
    fn test_other_students_grades_do_not_count() {
        let f = fixture();
        grade(&f, "CS101", 90.0, Semester::Fall, true);
        grade(&f, "MATH100", 90.0, Semester::Fall, true);

        let check = validator(&f).validate(OTHER_STUDENT, "CS201").unwrap();
        assert!(!check.satisfied);
    }

    #[test]
    fn test_unknown_course_or_student() {
        let f = fixture();
        let err = validator(&f).validate(STUDENT, "CS999").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = validator(&f).validate("S404", "CS201").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
