// 🗄️ Grade Record Store - owns every GradeRecord
//
// All mutation goes through here:
// - create   → draft record, letter/points derived from score
// - update   → draft only, re-derives letter/points when the score changes
// - finalize → one-way, stamps time + actor
//
// Races are settled by SQLite, not by check-then-act in Rust:
// the unique index decides duplicate creates, and conditional UPDATEs
// (`WHERE finalized = 0`) decide racing finalizes.

use crate::catalog::{CourseCatalog, StudentDirectory};
use crate::clock::Clock;
use crate::db::{
    column_error, insert_event, is_unique_violation, opt_ts_from_row, ts_from_row, ts_to_sql,
    Database, Event,
};
use crate::entities::{GradeRecord, GradeRecordFilter, RecordMeta};
use crate::error::{BusinessRule, Entity, RecordError, Result};
use crate::grade_scale::{GradePoints, Score};
use crate::period::{AcademicYear, Semester};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::sync::Arc;

/// Actor recorded on audit events for operations that carry no actor
const SYSTEM_ACTOR: &str = "system";

const GRADE_COLUMNS: &str = "id, course_id, student_id, semester, academic_year, score,
     letter_grade, grade_points, comment, finalized, finalized_at, finalized_by,
     created_at, updated_at";

// ============================================================================
// READ INTERFACE
// ============================================================================

/// Read access to grade records, injected into the derived-value components
pub trait GradeRecordSource: Send + Sync {
    fn list(&self, filter: &GradeRecordFilter) -> Result<Vec<GradeRecord>>;
}

// ============================================================================
// STORE
// ============================================================================

pub struct GradeRecordStore {
    db: Database,
    catalog: Arc<dyn CourseCatalog>,
    directory: Arc<dyn StudentDirectory>,
    clock: Arc<dyn Clock>,
}

impl GradeRecordStore {
    pub fn new(
        db: Database,
        catalog: Arc<dyn CourseCatalog>,
        directory: Arc<dyn StudentDirectory>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        GradeRecordStore {
            db,
            catalog,
            directory,
            clock,
        }
    }

    /// Create a draft grade record.
    ///
    /// Fails with InvalidInput (score), NotFound (course / student) or
    /// Conflict (same course, student, semester, academic year).
    pub fn create(
        &self,
        course_id: &str,
        student_id: &str,
        score: f64,
        semester: Semester,
        academic_year: AcademicYear,
        comment: Option<String>,
    ) -> Result<GradeRecord> {
        let score = Score::new(score)?;

        if self.catalog.course(course_id).is_none() {
            return Err(RecordError::not_found(Entity::Course, course_id));
        }
        if !self.directory.exists(student_id) {
            return Err(RecordError::not_found(Entity::Student, student_id));
        }

        let now = self.clock.now();
        let record = GradeRecord::draft(
            course_id,
            student_id,
            score,
            semester,
            academic_year,
            comment,
            now,
        );

        self.db.write(|tx| {
            insert_record(tx, &record).map_err(|e| {
                if is_unique_violation(&e) {
                    tracing::warn!(
                        course_id,
                        student_id,
                        %semester,
                        %academic_year,
                        "duplicate grade record rejected"
                    );
                    RecordError::Conflict {
                        course_id: course_id.to_string(),
                        student_id: student_id.to_string(),
                        semester: semester.to_string(),
                        academic_year: academic_year.to_string(),
                    }
                } else {
                    RecordError::from(e)
                }
            })?;

            insert_event(
                tx,
                &Event::new(
                    "grade_created",
                    Entity::GradeRecord.as_str(),
                    record.id(),
                    serde_json::json!({
                        "course_id": record.course_id,
                        "student_id": record.student_id,
                        "score": record.score,
                        "letter_grade": record.letter_grade,
                    }),
                    SYSTEM_ACTOR,
                    now,
                ),
            )
        })?;

        tracing::info!(
            id = record.id(),
            course_id,
            student_id,
            letter = %record.letter_grade,
            "grade record created"
        );
        Ok(record)
    }

    /// Change score and/or comment on a draft record
    pub fn update(
        &self,
        id: &str,
        new_score: Option<f64>,
        new_comment: Option<String>,
    ) -> Result<GradeRecord> {
        let new_score = new_score.map(Score::new).transpose()?;
        let now = self.clock.now();

        let record = self.db.write(|tx| {
            let mut record = load_record(tx, id)?;
            if record.finalized {
                return Err(RecordError::rule(
                    Entity::GradeRecord,
                    id,
                    BusinessRule::RecordFinalized,
                ));
            }

            let previous_score = record.score;
            let comment_changed = new_comment.is_some();
            if let Some(score) = new_score {
                record.set_score(score);
            }
            if let Some(comment) = new_comment {
                record.comment = Some(comment);
            }
            record.meta.touch(now);

            let changed = tx.execute(
                "UPDATE grade_records
                 SET score = ?1, letter_grade = ?2, grade_points = ?3, comment = ?4, updated_at = ?5
                 WHERE id = ?6 AND finalized = 0",
                params![
                    record.score.hundredths(),
                    record.letter_grade.as_str(),
                    record.grade_points.hundredths(),
                    record.comment,
                    ts_to_sql(now),
                    id,
                ],
            )?;
            if changed == 0 {
                return Err(RecordError::rule(
                    Entity::GradeRecord,
                    id,
                    BusinessRule::RecordFinalized,
                ));
            }

            insert_event(
                tx,
                &Event::new(
                    "grade_updated",
                    Entity::GradeRecord.as_str(),
                    id,
                    serde_json::json!({
                        "previous_score": previous_score,
                        "score": record.score,
                        "letter_grade": record.letter_grade,
                        "comment_changed": comment_changed,
                    }),
                    SYSTEM_ACTOR,
                    now,
                ),
            )?;

            Ok(record)
        })?;

        tracing::info!(id, letter = %record.letter_grade, "grade record updated");
        Ok(record)
    }

    /// One-way transition to finalized. A second call fails.
    pub fn finalize(&self, id: &str, actor_id: &str) -> Result<GradeRecord> {
        if actor_id.trim().is_empty() {
            return Err(RecordError::invalid("actor_id", "actor is required to finalize"));
        }
        let now = self.clock.now();

        let record = self.db.write(|tx| {
            let mut record = load_record(tx, id)?;
            if record.finalized {
                return Err(RecordError::rule(
                    Entity::GradeRecord,
                    id,
                    BusinessRule::AlreadyFinalized,
                ));
            }

            let changed = tx.execute(
                "UPDATE grade_records
                 SET finalized = 1, finalized_at = ?1, finalized_by = ?2, updated_at = ?1
                 WHERE id = ?3 AND finalized = 0",
                params![ts_to_sql(now), actor_id, id],
            )?;
            if changed == 0 {
                return Err(RecordError::rule(
                    Entity::GradeRecord,
                    id,
                    BusinessRule::AlreadyFinalized,
                ));
            }

            record.finalized = true;
            record.finalized_at = Some(now);
            record.finalized_by = Some(actor_id.to_string());
            record.meta.touch(now);

            insert_event(
                tx,
                &Event::new(
                    "grade_finalized",
                    Entity::GradeRecord.as_str(),
                    id,
                    serde_json::json!({
                        "score": record.score,
                        "letter_grade": record.letter_grade,
                        "grade_points": record.grade_points,
                    }),
                    actor_id,
                    now,
                ),
            )?;

            Ok(record)
        })?;

        tracing::info!(id, actor_id, "grade record finalized");
        Ok(record)
    }

    pub fn get(&self, id: &str) -> Result<GradeRecord> {
        tracing::debug!(id, "get grade record");
        self.db.with_conn(|conn| load_record(conn, id))
    }
}

impl GradeRecordSource for GradeRecordStore {
    fn list(&self, filter: &GradeRecordFilter) -> Result<Vec<GradeRecord>> {
        tracing::debug!(?filter, "list grade records");
        self.db.read(|tx| list_records(tx, filter))
    }
}

// ============================================================================
// SQL HELPERS
// ============================================================================

fn insert_record(conn: &Connection, record: &GradeRecord) -> rusqlite::Result<usize> {
    conn.execute(
        "INSERT INTO grade_records (
            id, course_id, student_id, semester, academic_year, score,
            letter_grade, grade_points, comment, finalized, finalized_at, finalized_by,
            created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
        params![
            record.id(),
            record.course_id,
            record.student_id,
            record.semester.as_str(),
            record.academic_year.to_string(),
            record.score.hundredths(),
            record.letter_grade.as_str(),
            record.grade_points.hundredths(),
            record.comment,
            record.finalized,
            record.finalized_at.map(ts_to_sql),
            record.finalized_by,
            ts_to_sql(record.meta.created_at),
            ts_to_sql(record.meta.updated_at),
        ],
    )
}

fn load_record(conn: &Connection, id: &str) -> Result<GradeRecord> {
    let sql = format!("SELECT {} FROM grade_records WHERE id = ?1", GRADE_COLUMNS);
    let record = conn
        .query_row(&sql, [id], record_from_row)
        .optional()?
        .ok_or_else(|| RecordError::not_found(Entity::GradeRecord, id))?;

    record.check_consistency()?;
    Ok(record)
}

fn list_records(conn: &Connection, filter: &GradeRecordFilter) -> Result<Vec<GradeRecord>> {
    let mut clauses: Vec<&str> = Vec::new();
    let mut values: Vec<Value> = Vec::new();

    if let Some(course_id) = &filter.course_id {
        clauses.push("course_id = ?");
        values.push(Value::Text(course_id.clone()));
    }
    if let Some(student_id) = &filter.student_id {
        clauses.push("student_id = ?");
        values.push(Value::Text(student_id.clone()));
    }
    if let Some(finalized) = filter.finalized {
        clauses.push("finalized = ?");
        values.push(Value::Integer(finalized as i64));
    }
    if let Some(semester) = filter.semester {
        clauses.push("semester = ?");
        values.push(Value::Text(semester.as_str().to_string()));
    }
    if let Some(academic_year) = filter.academic_year {
        clauses.push("academic_year = ?");
        values.push(Value::Text(academic_year.to_string()));
    }

    let where_clause = if clauses.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", clauses.join(" AND "))
    };
    let sql = format!(
        "SELECT {} FROM grade_records {} ORDER BY seq",
        GRADE_COLUMNS, where_clause
    );

    let mut stmt = conn.prepare(&sql)?;
    let records = stmt
        .query_map(params_from_iter(values), record_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    for record in &records {
        record.check_consistency()?;
    }
    Ok(records)
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<GradeRecord> {
    let semester: String = row.get(3)?;
    let academic_year: String = row.get(4)?;
    let letter: String = row.get(6)?;

    Ok(GradeRecord {
        meta: RecordMeta {
            id: row.get(0)?,
            created_at: ts_from_row(row, 12)?,
            updated_at: ts_from_row(row, 13)?,
        },
        course_id: row.get(1)?,
        student_id: row.get(2)?,
        semester: semester.parse().map_err(|e| column_error(3, e))?,
        academic_year: academic_year.parse().map_err(|e| column_error(4, e))?,
        score: Score::from_hundredths(row.get(5)?).map_err(|e| column_error(5, e))?,
        letter_grade: letter.parse().map_err(|e| column_error(6, e))?,
        grade_points: GradePoints::from_hundredths(row.get(7)?).map_err(|e| column_error(7, e))?,
        comment: row.get(8)?,
        finalized: row.get(9)?,
        finalized_at: opt_ts_from_row(row, 10)?,
        finalized_by: row.get(11)?,
    })
}
