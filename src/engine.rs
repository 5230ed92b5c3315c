// 🎓 Records Engine - single entry point for the CLI and the API server
//
// Wires one GradeRecordStore into the derived-value components (GPA,
// prerequisites, transcripts) so they all read the same store.

use crate::catalog::{CourseCatalog, StudentDirectory};
use crate::clock::Clock;
use crate::db::{Database, Event};
use crate::entities::{GradeRecord, GradeRecordFilter, Transcript, TranscriptType};
use crate::error::{Entity, Result};
use crate::gpa::GpaEngine;
use crate::grade_scale::GradePoints;
use crate::period::{AcademicYear, PeriodFilter, Semester};
use crate::prerequisites::{PrerequisiteCheck, PrerequisiteValidator};
use crate::store::{GradeRecordSource, GradeRecordStore};
use crate::transcripts::{TranscriptGenerator, TranscriptSummary};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Input for a new draft grade record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewGradeRecord {
    pub course_id: String,
    pub student_id: String,
    pub score: f64,
    pub semester: Semester,
    pub academic_year: AcademicYear,
    #[serde(default)]
    pub comment: Option<String>,
}

/// Partial update for a draft record; absent fields are left alone
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GradeUpdate {
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub comment: Option<String>,
}

pub struct RecordsEngine {
    db: Database,
    store: Arc<GradeRecordStore>,
    gpa: Arc<GpaEngine>,
    prerequisites: PrerequisiteValidator,
    transcripts: TranscriptGenerator,
}

impl RecordsEngine {
    pub fn new(
        db: Database,
        catalog: Arc<dyn CourseCatalog>,
        directory: Arc<dyn StudentDirectory>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let store = Arc::new(GradeRecordStore::new(
            db.clone(),
            catalog.clone(),
            directory.clone(),
            clock.clone(),
        ));
        let records: Arc<dyn GradeRecordSource> = store.clone();

        let gpa = Arc::new(GpaEngine::new(
            records.clone(),
            catalog.clone(),
            directory.clone(),
        ));
        let prerequisites =
            PrerequisiteValidator::new(records.clone(), catalog.clone(), directory.clone());
        let transcripts =
            TranscriptGenerator::new(db.clone(), records, gpa.clone(), catalog, directory, clock);

        RecordsEngine {
            db,
            store,
            gpa,
            prerequisites,
            transcripts,
        }
    }

    // ========================================================================
    // GRADE RECORDS
    // ========================================================================

    pub fn create_grade_record(&self, input: NewGradeRecord) -> Result<GradeRecord> {
        self.store.create(
            &input.course_id,
            &input.student_id,
            input.score,
            input.semester,
            input.academic_year,
            input.comment,
        )
    }

    pub fn update_grade_record(&self, id: &str, update: GradeUpdate) -> Result<GradeRecord> {
        self.store.update(id, update.score, update.comment)
    }

    pub fn finalize_grade_record(&self, id: &str, actor_id: &str) -> Result<GradeRecord> {
        self.store.finalize(id, actor_id)
    }

    pub fn get_grade_record(&self, id: &str) -> Result<GradeRecord> {
        self.store.get(id)
    }

    pub fn list_grade_records(&self, filter: &GradeRecordFilter) -> Result<Vec<GradeRecord>> {
        self.store.list(filter)
    }

    // ========================================================================
    // DERIVED VALUES
    // ========================================================================

    pub fn calculate_gpa(
        &self,
        student_id: &str,
        period: PeriodFilter,
    ) -> Result<Option<GradePoints>> {
        self.gpa.calculate_gpa(student_id, period)
    }

    pub fn validate_prerequisites(
        &self,
        student_id: &str,
        course_id: &str,
    ) -> Result<PrerequisiteCheck> {
        self.prerequisites.validate(student_id, course_id)
    }

    // ========================================================================
    // TRANSCRIPTS
    // ========================================================================

    pub fn generate_transcript(
        &self,
        student_id: &str,
        transcript_type: TranscriptType,
        period: PeriodFilter,
        actor_id: &str,
    ) -> Result<Transcript> {
        self.transcripts
            .generate(student_id, transcript_type, period, actor_id)
    }

    pub fn certify_transcript(&self, transcript_id: &str, actor_id: &str) -> Result<Transcript> {
        self.transcripts.certify(transcript_id, actor_id)
    }

    pub fn get_latest_transcript(
        &self,
        student_id: &str,
        transcript_type: Option<TranscriptType>,
    ) -> Result<Option<Transcript>> {
        self.transcripts.get_latest(student_id, transcript_type)
    }

    pub fn get_transcript_summary(&self, student_id: &str) -> Result<TranscriptSummary> {
        self.transcripts.summary(student_id)
    }

    pub fn get_transcript(&self, transcript_id: &str) -> Result<Transcript> {
        self.transcripts.get(transcript_id)
    }

    pub fn list_transcripts(&self, student_id: &str) -> Result<Vec<Transcript>> {
        self.transcripts.list(student_id)
    }

    pub fn verify_transcript(&self, transcript_id: &str) -> Result<()> {
        self.transcripts.verify(transcript_id)
    }

    /// Audit trail for one entity, newest first
    pub fn events_for(&self, entity: Entity, id: &str) -> Result<Vec<Event>> {
        self.db.events_for(entity.as_str(), id)
    }
}
