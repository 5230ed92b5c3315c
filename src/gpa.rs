// 📊 GPA Engine - credit-weighted grade point average
//
// GPA = Σ(points × credits) / Σ(credits) over FINALIZED records only.
// Arithmetic is exact on hundredths; the final value is rounded half-up
// to 2 decimals. Zero total credits yields 0.00, never a division by zero.

use crate::catalog::{CourseCatalog, StudentDirectory};
use crate::entities::{GradeRecord, GradeRecordFilter};
use crate::error::{Entity, RecordError, Result};
use crate::grade_scale::GradePoints;
use crate::period::PeriodFilter;
use crate::store::GradeRecordSource;
use std::collections::HashMap;
use std::sync::Arc;

pub struct GpaEngine {
    records: Arc<dyn GradeRecordSource>,
    catalog: Arc<dyn CourseCatalog>,
    directory: Arc<dyn StudentDirectory>,
}

impl GpaEngine {
    pub fn new(
        records: Arc<dyn GradeRecordSource>,
        catalog: Arc<dyn CourseCatalog>,
        directory: Arc<dyn StudentDirectory>,
    ) -> Self {
        GpaEngine {
            records,
            catalog,
            directory,
        }
    }

    /// GPA over the student's finalized records in `period`.
    ///
    /// Returns `None` when no finalized record matches.
    pub fn calculate_gpa(
        &self,
        student_id: &str,
        period: PeriodFilter,
    ) -> Result<Option<GradePoints>> {
        if !self.directory.exists(student_id) {
            return Err(RecordError::not_found(Entity::Student, student_id));
        }

        let records = self
            .records
            .list(&GradeRecordFilter::finalized_for(student_id, period))?;
        if records.is_empty() {
            tracing::debug!(student_id, ?period, "no finalized records for GPA");
            return Ok(None);
        }

        let gpa = self.gpa_of(&records)?;
        tracing::debug!(student_id, ?period, %gpa, records = records.len(), "GPA calculated");
        Ok(Some(gpa))
    }

    /// Weighted GPA of an already-selected set of records
    pub fn gpa_of(&self, records: &[GradeRecord]) -> Result<GradePoints> {
        let mut credits_by_course: HashMap<&str, u32> = HashMap::new();
        let mut weighted = Vec::with_capacity(records.len());

        for record in records {
            let credits = match credits_by_course.get(record.course_id.as_str()) {
                Some(credits) => *credits,
                None => {
                    let course = self
                        .catalog
                        .course(&record.course_id)
                        .ok_or_else(|| RecordError::not_found(Entity::Course, &record.course_id))?;
                    credits_by_course.insert(record.course_id.as_str(), course.credits);
                    course.credits
                }
            };
            weighted.push((record.grade_points, credits));
        }

        weighted_average(weighted)
    }
}

/// Σ(points × credits) / Σ(credits), rounded half-up to hundredths
pub fn weighted_average(
    items: impl IntoIterator<Item = (GradePoints, u32)>,
) -> Result<GradePoints> {
    let (numerator, total_credits) = items.into_iter().fold(
        (0u64, 0u64),
        |(num, den), (points, credits)| {
            (
                num + points.hundredths() as u64 * credits as u64,
                den + credits as u64,
            )
        },
    );

    if total_credits == 0 {
        return Ok(GradePoints::ZERO);
    }

    let rounded = (2 * numerator + total_credits) / (2 * total_credits);
    GradePoints::from_hundredths(rounded.min(GradePoints::MAX.hundredths() as u64) as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::period::{AcademicYear, Semester};
    use crate::test_support::{fixture, Fixture, OTHER_STUDENT, STUDENT};

    fn engine(f: &Fixture) -> GpaEngine {
        GpaEngine::new(
            f.store.clone(),
            Arc::new(f.catalog.clone()),
            Arc::new(f.students.clone()),
        )
    }

    fn year() -> AcademicYear {
        "2024-2025".parse().unwrap()
    }

    fn finalized(f: &Fixture, course: &str, score: f64, semester: Semester) -> GradeRecord {
        let record = f
            .store
            .create(course, STUDENT, score, semester, year(), None)
            .unwrap();
        f.store.finalize(record.id(), "registrar").unwrap()
    }

    fn pts(hundredths: u32) -> GradePoints {
        GradePoints::from_hundredths(hundredths).unwrap()
    }

    #[test]
    fn test_credit_weighted_gpa() {
        let f = fixture();
        finalized(&f, "CS101", 85.0, Semester::Fall); // 3cr, B, 3.00
        finalized(&f, "MATH100", 95.0, Semester::Fall); // 4cr, A, 4.00

        let gpa = engine(&f).calculate_gpa(STUDENT, PeriodFilter::all()).unwrap();
        assert_eq!(gpa.unwrap().to_string(), "3.57");
    }

    #[test]
    fn test_absent_when_nothing_finalized() {
        let f = fixture();
        f.store
            .create("CS101", STUDENT, 85.0, Semester::Fall, year(), None)
            .unwrap();

        // Draft only → absent, not 0.00
        let gpa = engine(&f).calculate_gpa(STUDENT, PeriodFilter::all()).unwrap();
        assert!(gpa.is_none());

        let gpa = engine(&f).calculate_gpa(OTHER_STUDENT, PeriodFilter::all()).unwrap();
        assert!(gpa.is_none());
    }

    #[test]
    fn test_drafts_do_not_count() {
        let f = fixture();
        finalized(&f, "CS101", 85.0, Semester::Fall);
        f.store
            .create("MATH100", STUDENT, 40.0, Semester::Fall, year(), None)
            .unwrap();

        let gpa = engine(&f).calculate_gpa(STUDENT, PeriodFilter::all()).unwrap();
        assert_eq!(gpa, Some(pts(300)));
    }

    #[test]
    fn test_period_filter() {
        let f = fixture();
        finalized(&f, "CS101", 85.0, Semester::Fall);
        finalized(&f, "MATH100", 95.0, Semester::Spring);

        let fall = PeriodFilter {
            semester: Some(Semester::Fall),
            academic_year: None,
        };
        assert_eq!(engine(&f).calculate_gpa(STUDENT, fall).unwrap(), Some(pts(300)));

        let earlier = PeriodFilter {
            semester: None,
            academic_year: Some("2023-2024".parse().unwrap()),
        };
        assert_eq!(engine(&f).calculate_gpa(STUDENT, earlier).unwrap(), None);
    }

    #[test]
    fn test_zero_credit_courses_yield_zero() {
        let f = fixture();
        finalized(&f, "ART100", 99.0, Semester::Fall); // 0 credits

        let gpa = engine(&f).calculate_gpa(STUDENT, PeriodFilter::all()).unwrap();
        assert_eq!(gpa, Some(GradePoints::ZERO));
    }

    #[test]
    fn test_unknown_student_is_not_found() {
        let f = fixture();
        let err = engine(&f).calculate_gpa("S404", PeriodFilter::all()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_course_dropped_from_catalog_is_not_found() {
        let f = fixture();
        let record = finalized(&f, "CS101", 85.0, Semester::Fall);

        let thin_catalog = crate::catalog::CourseRegistry::new();
        let engine = GpaEngine::new(
            f.store.clone(),
            Arc::new(thin_catalog),
            Arc::new(f.students.clone()),
        );
        let err = engine.gpa_of(&[record]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_weighted_average_rounding() {
        // 2500 / 7 = 357.14 → 3.57
        assert_eq!(weighted_average([(pts(300), 3), (pts(400), 4)]).unwrap(), pts(357));

        // 370 / 20 = 18.5 → half-up to 0.19
        assert_eq!(weighted_average([(pts(370), 1), (pts(0), 19)]).unwrap(), pts(19));

        assert_eq!(weighted_average(Vec::new()).unwrap(), GradePoints::ZERO);
        assert_eq!(weighted_average([(pts(400), 0)]).unwrap(), GradePoints::ZERO);
    }
}
