// 📝 Grade Record Entity - one student's grade in one course for one period
//
// Letter and points are DERIVED values: they are only ever written through
// set_score(), which recomputes both from the score.
//
// Lifecycle: Draft → Finalized (terminal, no unfinalize)

use super::RecordMeta;
use crate::error::{Entity, RecordError, Result};
use crate::grade_scale::{self, GradePoints, LetterGrade, Score};
use crate::period::{AcademicYear, PeriodFilter, Semester};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeRecord {
    // ========================================================================
    // IDENTITY (never changes)
    // ========================================================================
    #[serde(flatten)]
    pub meta: RecordMeta,

    pub course_id: String,
    pub student_id: String,
    pub semester: Semester,
    pub academic_year: AcademicYear,

    // ========================================================================
    // VALUES (mutable while draft)
    // ========================================================================
    pub score: Score,

    /// Derived from score
    pub letter_grade: LetterGrade,

    /// Derived from letter_grade
    pub grade_points: GradePoints,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,

    // ========================================================================
    // FINALIZATION (one-way)
    // ========================================================================
    pub finalized: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finalized_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finalized_by: Option<String>,
}

impl GradeRecord {
    /// New draft record with derived grade values filled in
    pub fn draft(
        course_id: &str,
        student_id: &str,
        score: Score,
        semester: Semester,
        academic_year: AcademicYear,
        comment: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        let (letter_grade, grade_points) = grade_scale::grade(score);

        GradeRecord {
            meta: RecordMeta::new(now),
            course_id: course_id.to_string(),
            student_id: student_id.to_string(),
            semester,
            academic_year,
            score,
            letter_grade,
            grade_points,
            comment,
            finalized: false,
            finalized_at: None,
            finalized_by: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.meta.id
    }

    /// Replace the score and recompute letter + points
    pub fn set_score(&mut self, score: Score) {
        let (letter_grade, grade_points) = grade_scale::grade(score);
        self.score = score;
        self.letter_grade = letter_grade;
        self.grade_points = grade_points;
    }

    pub fn is_passing(&self) -> bool {
        grade_scale::is_passing(self.score)
    }

    /// Verify the derived values still agree with the score.
    ///
    /// A mismatch means storage was written outside the engine; it is
    /// reported, never repaired.
    pub fn check_consistency(&self) -> Result<()> {
        let (letter, points) = grade_scale::grade(self.score);

        if letter != self.letter_grade || points != self.grade_points {
            return Err(RecordError::invariant(
                Entity::GradeRecord,
                self.id(),
                format!(
                    "score {} implies {} / {} but record holds {} / {}",
                    self.score, letter, points, self.letter_grade, self.grade_points
                ),
            ));
        }

        if self.finalized != self.finalized_at.is_some() {
            return Err(RecordError::invariant(
                Entity::GradeRecord,
                self.id(),
                "finalized flag disagrees with finalization timestamp",
            ));
        }

        Ok(())
    }
}

// ============================================================================
// FILTER
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradeRecordFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub course_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub student_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finalized: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semester: Option<Semester>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub academic_year: Option<AcademicYear>,
}

impl GradeRecordFilter {
    /// Finalized records for one student within a period
    pub fn finalized_for(student_id: &str, period: PeriodFilter) -> Self {
        GradeRecordFilter {
            course_id: None,
            student_id: Some(student_id.to_string()),
            finalized: Some(true),
            semester: period.semester,
            academic_year: period.academic_year,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(score: f64) -> GradeRecord {
        GradeRecord::draft(
            "CS101",
            "S1",
            Score::new(score).unwrap(),
            Semester::Fall,
            "2024-2025".parse().unwrap(),
            None,
            Utc::now(),
        )
    }

    #[test]
    fn test_draft_derives_grade() {
        let record = sample(88.5);

        assert!(!record.finalized);
        assert_eq!(record.letter_grade, LetterGrade::BPlus);
        assert_eq!(record.grade_points.to_string(), "3.30");
        assert!(record.is_passing());
        assert!(record.check_consistency().is_ok());
    }

    #[test]
    fn test_set_score_recomputes() {
        let mut record = sample(88.5);
        record.set_score(Score::new(59.0).unwrap());

        assert_eq!(record.letter_grade, LetterGrade::F);
        assert_eq!(record.grade_points, GradePoints::ZERO);
        assert!(!record.is_passing());
        assert!(record.check_consistency().is_ok());
    }

    #[test]
    fn test_consistency_detects_tampering() {
        let mut record = sample(95.0);
        record.letter_grade = LetterGrade::C;

        let err = record.check_consistency().unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::InvariantViolation);
    }

    #[test]
    fn test_finalized_filter_for_period() {
        let period = PeriodFilter::parse(Some("Spring"), Some("2024-2025")).unwrap();
        let filter = GradeRecordFilter::finalized_for("S1", period);

        assert_eq!(filter.student_id.as_deref(), Some("S1"));
        assert_eq!(filter.finalized, Some(true));
        assert_eq!(filter.semester, Some(Semester::Spring));
        assert_eq!(filter.academic_year, period.academic_year);
        assert!(filter.course_id.is_none());
    }

    #[test]
    fn test_serialized_shape() {
        let record = sample(91.0);
        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(json["letter_grade"], "A-");
        assert_eq!(json["score"], 91.0);
        assert_eq!(json["semester"], "fall");
        assert_eq!(json["academic_year"], "2024-2025");
        assert!(json["id"].is_string());
        assert!(json.get("finalized_at").is_none());
    }
}
