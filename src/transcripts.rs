// 📜 Transcript Generator - point-in-time snapshots + one-way certification
//
// generate() freezes the student's finalized records (plus catalog metadata
// at that moment) into a NEW transcript row. Existing rows are never edited
// except for the certification fields, which move unset → set exactly once.
//
// Every load re-verifies the snapshot digest and the stored totals, so a row
// that drifted from its snapshot surfaces as an InvariantViolation.

use crate::catalog::{CourseCatalog, StudentDirectory};
use crate::clock::Clock;
use crate::db::{insert_event, opt_ts_from_row, ts_from_row, ts_to_sql, Database, Event};
use crate::entities::{
    GradeRecord, GradeRecordFilter, RecordMeta, Transcript, TranscriptEntry, TranscriptType,
};
use crate::error::{BusinessRule, Entity, RecordError, Result};
use crate::gpa::GpaEngine;
use crate::grade_scale::GradePoints;
use crate::period::PeriodFilter;
use crate::store::GradeRecordSource;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const TRANSCRIPT_COLUMNS: &str = "id, student_id, transcript_type, period_semester,
     period_academic_year, entries, snapshot_digest, total_credits_attempted,
     total_credits_earned, cumulative_gpa, generated_at, generated_by, is_certified,
     certified_at, certified_by, created_at, updated_at";

// ============================================================================
// SUMMARY
// ============================================================================

/// Side-effect-free projection of a student's finalized record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptSummary {
    pub student_id: String,
    pub total_credits_attempted: u32,
    pub total_credits_earned: u32,
    pub gpa: GradePoints,
    pub courses_completed: usize,
    pub courses_failed: usize,
    pub total_courses: usize,
}

/// Ordered entries plus their credit totals
struct Snapshot {
    entries: Vec<TranscriptEntry>,
    credits_attempted: u32,
    credits_earned: u32,
}

impl Snapshot {
    fn totals_of(entries: &[TranscriptEntry]) -> Result<(u32, u32)> {
        let overflow =
            || RecordError::invalid("credits", "total credits exceed the supported range");

        entries.iter().try_fold((0u32, 0u32), |(attempted, earned), entry| {
            let attempted = attempted.checked_add(entry.credits).ok_or_else(overflow)?;
            let earned = if entry.is_passing() {
                earned.checked_add(entry.credits).ok_or_else(overflow)?
            } else {
                earned
            };
            Ok((attempted, earned))
        })
    }
}

// ============================================================================
// GENERATOR
// ============================================================================

pub struct TranscriptGenerator {
    db: Database,
    records: Arc<dyn GradeRecordSource>,
    gpa: Arc<GpaEngine>,
    catalog: Arc<dyn CourseCatalog>,
    directory: Arc<dyn StudentDirectory>,
    clock: Arc<dyn Clock>,
}

impl TranscriptGenerator {
    pub fn new(
        db: Database,
        records: Arc<dyn GradeRecordSource>,
        gpa: Arc<GpaEngine>,
        catalog: Arc<dyn CourseCatalog>,
        directory: Arc<dyn StudentDirectory>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        TranscriptGenerator {
            db,
            records,
            gpa,
            catalog,
            directory,
            clock,
        }
    }

    /// Snapshot the student's finalized records matching `period` into a new,
    /// uncertified transcript.
    ///
    /// Only `certify` produces an official transcript.
    pub fn generate(
        &self,
        student_id: &str,
        transcript_type: TranscriptType,
        period: PeriodFilter,
        actor_id: &str,
    ) -> Result<Transcript> {
        if actor_id.trim().is_empty() {
            return Err(RecordError::invalid(
                "actor_id",
                "actor is required to generate a transcript",
            ));
        }
        if transcript_type == TranscriptType::Official {
            return Err(RecordError::invalid(
                "transcript_type",
                "official transcripts are produced by certification, not generation",
            ));
        }
        if !self.directory.exists(student_id) {
            return Err(RecordError::not_found(Entity::Student, student_id));
        }

        let records = self
            .records
            .list(&GradeRecordFilter::finalized_for(student_id, period))?;
        let snapshot = self.snapshot(&records)?;
        let cumulative_gpa = if records.is_empty() {
            GradePoints::ZERO
        } else {
            self.gpa.gpa_of(&records)?
        };

        let now = self.clock.now();
        let (entries_json, snapshot_digest) = Transcript::encode_entries(&snapshot.entries)?;
        let transcript = Transcript {
            meta: RecordMeta::new(now),
            student_id: student_id.to_string(),
            entries: snapshot.entries,
            total_credits_attempted: snapshot.credits_attempted,
            total_credits_earned: snapshot.credits_earned,
            cumulative_gpa,
            transcript_type,
            period,
            generated_at: now,
            generated_by: actor_id.to_string(),
            is_certified: false,
            certified_at: None,
            certified_by: None,
            snapshot_digest,
        };

        self.db.write(|tx| {
            insert_transcript(tx, &transcript, &entries_json)?;
            insert_event(
                tx,
                &Event::new(
                    "transcript_generated",
                    Entity::Transcript.as_str(),
                    transcript.id(),
                    serde_json::json!({
                        "student_id": transcript.student_id,
                        "transcript_type": transcript.transcript_type,
                        "entries": transcript.entries.len(),
                        "cumulative_gpa": transcript.cumulative_gpa,
                    }),
                    actor_id,
                    now,
                ),
            )
        })?;

        tracing::info!(
            id = transcript.id(),
            student_id,
            transcript_type = %transcript.transcript_type,
            entries = transcript.entries.len(),
            gpa = %transcript.cumulative_gpa,
            "transcript generated"
        );
        Ok(transcript)
    }

    /// One-way: certified transcripts become official and stay that way
    pub fn certify(&self, transcript_id: &str, actor_id: &str) -> Result<Transcript> {
        if actor_id.trim().is_empty() {
            return Err(RecordError::invalid("actor_id", "actor is required to certify"));
        }
        let now = self.clock.now();

        let transcript = self.db.write(|tx| {
            let mut transcript = load_transcript(tx, transcript_id)?;
            transcript.certify(actor_id, now)?;

            let changed = tx.execute(
                "UPDATE transcripts
                 SET is_certified = 1, transcript_type = ?1, certified_at = ?2,
                     certified_by = ?3, updated_at = ?2
                 WHERE id = ?4 AND is_certified = 0",
                params![
                    TranscriptType::Official.as_str(),
                    ts_to_sql(now),
                    actor_id,
                    transcript_id,
                ],
            )?;
            if changed == 0 {
                return Err(RecordError::rule(
                    Entity::Transcript,
                    transcript_id,
                    BusinessRule::AlreadyCertified,
                ));
            }

            insert_event(
                tx,
                &Event::new(
                    "transcript_certified",
                    Entity::Transcript.as_str(),
                    transcript_id,
                    serde_json::json!({ "snapshot_digest": transcript.snapshot_digest }),
                    actor_id,
                    now,
                ),
            )?;

            Ok(transcript)
        })?;

        tracing::info!(id = transcript_id, actor_id, "transcript certified");
        Ok(transcript)
    }

    pub fn get(&self, transcript_id: &str) -> Result<Transcript> {
        tracing::debug!(transcript_id, "get transcript");
        self.db.with_conn(|conn| load_transcript(conn, transcript_id))
    }

    /// Re-check a stored transcript's snapshot integrity
    pub fn verify(&self, transcript_id: &str) -> Result<()> {
        self.get(transcript_id).map(|_| ())
    }

    /// All transcripts for a student, most recently generated first
    pub fn list(&self, student_id: &str) -> Result<Vec<Transcript>> {
        self.db
            .with_conn(|conn| query_transcripts(conn, student_id, None, None))
    }

    /// Most recently generated transcript, optionally of one type
    pub fn get_latest(
        &self,
        student_id: &str,
        transcript_type: Option<TranscriptType>,
    ) -> Result<Option<Transcript>> {
        let mut latest = self
            .db
            .with_conn(|conn| query_transcripts(conn, student_id, transcript_type, Some(1)))?;
        Ok(latest.pop())
    }

    /// Same aggregation as generate() over all finalized records; persists nothing
    pub fn summary(&self, student_id: &str) -> Result<TranscriptSummary> {
        if !self.directory.exists(student_id) {
            return Err(RecordError::not_found(Entity::Student, student_id));
        }

        let records = self
            .records
            .list(&GradeRecordFilter::finalized_for(student_id, PeriodFilter::all()))?;
        let snapshot = self.snapshot(&records)?;
        let gpa = if records.is_empty() {
            GradePoints::ZERO
        } else {
            self.gpa.gpa_of(&records)?
        };

        let courses_completed = records.iter().filter(|r| r.is_passing()).count();
        Ok(TranscriptSummary {
            student_id: student_id.to_string(),
            total_credits_attempted: snapshot.credits_attempted,
            total_credits_earned: snapshot.credits_earned,
            gpa,
            courses_completed,
            courses_failed: records.len() - courses_completed,
            total_courses: records.len(),
        })
    }

    fn snapshot(&self, records: &[GradeRecord]) -> Result<Snapshot> {
        let mut entries = Vec::with_capacity(records.len());

        for record in records {
            let finalized_at = record.finalized_at.ok_or_else(|| {
                RecordError::invariant(
                    Entity::GradeRecord,
                    record.id(),
                    "draft record reached a transcript snapshot",
                )
            })?;
            let course = self
                .catalog
                .course(&record.course_id)
                .ok_or_else(|| RecordError::not_found(Entity::Course, &record.course_id))?;

            entries.push(TranscriptEntry {
                grade_record_id: record.id().to_string(),
                course_id: course.id,
                course_code: course.code,
                course_title: course.title,
                credits: course.credits,
                score: record.score,
                letter_grade: record.letter_grade,
                grade_points: record.grade_points,
                semester: record.semester,
                academic_year: record.academic_year,
                finalized_at,
            });
        }

        entries.sort_by(|a, b| {
            a.academic_year
                .cmp(&b.academic_year)
                .then(a.semester.ordinal().cmp(&b.semester.ordinal()))
                .then_with(|| a.course_code.cmp(&b.course_code))
        });

        let (credits_attempted, credits_earned) = Snapshot::totals_of(&entries)?;
        Ok(Snapshot {
            entries,
            credits_attempted,
            credits_earned,
        })
    }
}

// ============================================================================
// SQL HELPERS
// ============================================================================

fn insert_transcript(conn: &Connection, transcript: &Transcript, entries_json: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO transcripts (
            id, student_id, transcript_type, period_semester, period_academic_year,
            entries, snapshot_digest, total_credits_attempted, total_credits_earned,
            cumulative_gpa, generated_at, generated_by, is_certified, certified_at,
            certified_by, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
        params![
            transcript.id(),
            transcript.student_id,
            transcript.transcript_type.as_str(),
            transcript.period.semester.map(|s| s.as_str()),
            transcript.period.academic_year.map(|y| y.to_string()),
            entries_json,
            transcript.snapshot_digest,
            transcript.total_credits_attempted,
            transcript.total_credits_earned,
            transcript.cumulative_gpa.hundredths(),
            ts_to_sql(transcript.generated_at),
            transcript.generated_by,
            transcript.is_certified,
            transcript.certified_at.map(ts_to_sql),
            transcript.certified_by,
            ts_to_sql(transcript.meta.created_at),
            ts_to_sql(transcript.meta.updated_at),
        ],
    )?;
    Ok(())
}

fn load_transcript(conn: &Connection, transcript_id: &str) -> Result<Transcript> {
    let sql = format!("SELECT {} FROM transcripts WHERE id = ?1", TRANSCRIPT_COLUMNS);
    conn.query_row(&sql, [transcript_id], StoredTranscript::from_row)
        .optional()?
        .ok_or_else(|| RecordError::not_found(Entity::Transcript, transcript_id))?
        .into_transcript()
}

fn query_transcripts(
    conn: &Connection,
    student_id: &str,
    transcript_type: Option<TranscriptType>,
    limit: Option<u32>,
) -> Result<Vec<Transcript>> {
    let sql = format!(
        "SELECT {} FROM transcripts
         WHERE student_id = ?1 AND (?2 IS NULL OR transcript_type = ?2)
         ORDER BY generated_at DESC, seq DESC
         LIMIT ?3",
        TRANSCRIPT_COLUMNS
    );
    let limit = limit.map_or(-1, i64::from);

    let mut stmt = conn.prepare(&sql)?;
    let stored = stmt
        .query_map(
            params![student_id, transcript_type.map(|t| t.as_str()), limit],
            StoredTranscript::from_row,
        )?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    stored.into_iter().map(StoredTranscript::into_transcript).collect()
}

/// Raw row; entries still JSON until the digest has been checked
struct StoredTranscript {
    id: String,
    student_id: String,
    transcript_type: String,
    period_semester: Option<String>,
    period_academic_year: Option<String>,
    entries_json: String,
    snapshot_digest: String,
    total_credits_attempted: u32,
    total_credits_earned: u32,
    cumulative_gpa: u32,
    generated_at: DateTime<Utc>,
    generated_by: String,
    is_certified: bool,
    certified_at: Option<DateTime<Utc>>,
    certified_by: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl StoredTranscript {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(StoredTranscript {
            id: row.get(0)?,
            student_id: row.get(1)?,
            transcript_type: row.get(2)?,
            period_semester: row.get(3)?,
            period_academic_year: row.get(4)?,
            entries_json: row.get(5)?,
            snapshot_digest: row.get(6)?,
            total_credits_attempted: row.get(7)?,
            total_credits_earned: row.get(8)?,
            cumulative_gpa: row.get(9)?,
            generated_at: ts_from_row(row, 10)?,
            generated_by: row.get(11)?,
            is_certified: row.get(12)?,
            certified_at: opt_ts_from_row(row, 13)?,
            certified_by: row.get(14)?,
            created_at: ts_from_row(row, 15)?,
            updated_at: ts_from_row(row, 16)?,
        })
    }

    fn into_transcript(self) -> Result<Transcript> {
        let entries =
            Transcript::decode_entries(&self.id, &self.entries_json, &self.snapshot_digest)?;

        let (attempted, earned) = Snapshot::totals_of(&entries)?;
        if attempted != self.total_credits_attempted || earned != self.total_credits_earned {
            return Err(RecordError::invariant(
                Entity::Transcript,
                &self.id,
                format!(
                    "stored credits {}/{} disagree with snapshot {}/{}",
                    self.total_credits_attempted, self.total_credits_earned, attempted, earned
                ),
            ));
        }

        let transcript_type: TranscriptType = self.transcript_type.parse()?;
        if self.is_certified != (transcript_type == TranscriptType::Official) {
            return Err(RecordError::invariant(
                Entity::Transcript,
                &self.id,
                format!(
                    "type {} disagrees with certification flag {}",
                    transcript_type, self.is_certified
                ),
            ));
        }

        Ok(Transcript {
            meta: RecordMeta {
                id: self.id,
                created_at: self.created_at,
                updated_at: self.updated_at,
            },
            student_id: self.student_id,
            entries,
            total_credits_attempted: self.total_credits_attempted,
            total_credits_earned: self.total_credits_earned,
            cumulative_gpa: GradePoints::from_hundredths(self.cumulative_gpa)?,
            transcript_type,
            period: PeriodFilter::parse(
                self.period_semester.as_deref(),
                self.period_academic_year.as_deref(),
            )?,
            generated_at: self.generated_at,
            generated_by: self.generated_by,
            is_certified: self.is_certified,
            certified_at: self.certified_at,
            certified_by: self.certified_by,
            snapshot_digest: self.snapshot_digest,
        })
    }
}
