// Academic Records - Core Library
// Grade records, GPA, prerequisites and transcripts over SQLite.
// Exposes all modules for use in CLI, API server, and tests

pub mod catalog;       // Course catalog + student directory collaborators
pub mod clock;
pub mod config;
pub mod db;
pub mod engine;        // Facade used by the binaries
pub mod entities;      // GradeRecord, Transcript
pub mod error;
pub mod gpa;
pub mod grade_scale;   // Score → letter → points
pub mod period;
pub mod prerequisites;
pub mod store;         // Grade record lifecycle (draft → finalized)
pub mod transcripts;   // Snapshots + certification

#[cfg(test)]
mod test_support;

// Re-export commonly used types
pub use catalog::{Course, CourseCatalog, CourseRegistry, StudentDirectory, StudentRegistry};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::EngineConfig;
pub use db::{setup_database, Database, Event};
pub use engine::{GradeUpdate, NewGradeRecord, RecordsEngine};
pub use entities::{
    GradeRecord, GradeRecordFilter, RecordMeta, Transcript, TranscriptEntry, TranscriptType,
};
pub use error::{BusinessRule, Entity, ErrorKind, RecordError, Result};
pub use gpa::GpaEngine;
pub use grade_scale::{GradePoints, LetterGrade, Score};
pub use period::{AcademicYear, PeriodFilter, Semester};
pub use prerequisites::{PrerequisiteCheck, PrerequisiteValidator};
pub use store::{GradeRecordSource, GradeRecordStore};
pub use transcripts::{TranscriptGenerator, TranscriptSummary};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
