// Shared fixtures for unit tests

use crate::catalog::{Course, CourseRegistry, StudentRegistry};
use crate::clock::FixedClock;
use crate::db::Database;
use crate::store::GradeRecordStore;
use chrono::{TimeZone, Utc};
use std::sync::Arc;

pub const STUDENT: &str = "S1001";
pub const OTHER_STUDENT: &str = "S1002";

pub struct Fixture {
    pub db: Database,
    pub catalog: CourseRegistry,
    pub students: StudentRegistry,
    pub clock: Arc<FixedClock>,
    pub store: Arc<GradeRecordStore>,
}

/// CS101 (3cr), MATH100 (4cr), CS201 (4cr, needs CS101 then MATH100), ART100 (0cr)
pub fn catalog() -> CourseRegistry {
    CourseRegistry::from_courses([
        Course::new("CS101", "CS101", "Introduction to Programming", 3),
        Course::new("MATH100", "MATH100", "Calculus I", 4),
        Course::new("CS201", "CS201", "Data Structures", 4)
            .requires("CS101")
            .requires("MATH100"),
        Course::new("ART100", "ART100", "Studio Seminar", 0),
    ])
}

pub fn fixture_with(db: Database) -> Fixture {
    let catalog = catalog();
    let students = StudentRegistry::from_ids([STUDENT, OTHER_STUDENT]);
    let clock = Arc::new(FixedClock::new(
        Utc.with_ymd_and_hms(2025, 1, 15, 9, 0, 0).unwrap(),
    ));
    let store = Arc::new(GradeRecordStore::new(
        db.clone(),
        Arc::new(catalog.clone()),
        Arc::new(students.clone()),
        clock.clone(),
    ));

    Fixture {
        db,
        catalog,
        students,
        clock,
        store,
    }
}

pub fn fixture() -> Fixture {
    fixture_with(Database::open_in_memory().unwrap())
}
