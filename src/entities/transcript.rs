// 📜 Transcript Entity - immutable point-in-time snapshot of finalized grades
//
// The entries are a VALUE: a new generation always creates a new transcript.
// Only the certification fields ever change, and only once (unset → set).
//
// The snapshot digest (SHA-256 of the stored entries JSON) lets every load
// prove the snapshot has not drifted since generation.

use super::RecordMeta;
use crate::error::{BusinessRule, Entity, RecordError, Result};
use crate::grade_scale::{GradePoints, LetterGrade, Score};
use crate::period::{AcademicYear, PeriodFilter, Semester};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// TRANSCRIPT TYPE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranscriptType {
    #[default]
    Unofficial,
    Official,
    Interim,
}

impl TranscriptType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TranscriptType::Unofficial => "unofficial",
            TranscriptType::Official => "official",
            TranscriptType::Interim => "interim",
        }
    }
}

impl fmt::Display for TranscriptType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TranscriptType {
    type Err = RecordError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "unofficial" => Ok(TranscriptType::Unofficial),
            "official" => Ok(TranscriptType::Official),
            "interim" => Ok(TranscriptType::Interim),
            other => Err(RecordError::invalid(
                "transcript_type",
                format!("unknown transcript type '{}'", other),
            )),
        }
    }
}

// ============================================================================
// TRANSCRIPT ENTRY
// ============================================================================

/// One finalized grade, frozen together with the catalog metadata in effect
/// at snapshot time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub grade_record_id: String,
    pub course_id: String,
    pub course_code: String,
    pub course_title: String,
    pub credits: u32,
    pub score: Score,
    pub letter_grade: LetterGrade,
    pub grade_points: GradePoints,
    pub semester: Semester,
    pub academic_year: AcademicYear,
    pub finalized_at: DateTime<Utc>,
}

impl TranscriptEntry {
    pub fn is_passing(&self) -> bool {
        crate::grade_scale::is_passing(self.score)
    }
}

// ============================================================================
// TRANSCRIPT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    #[serde(flatten)]
    pub meta: RecordMeta,

    pub student_id: String,

    /// Ordered snapshot (academic year, semester, course code)
    pub entries: Vec<TranscriptEntry>,

    pub total_credits_attempted: u32,
    pub total_credits_earned: u32,
    pub cumulative_gpa: GradePoints,

    pub transcript_type: TranscriptType,

    /// Period the snapshot was restricted to
    #[serde(default)]
    pub period: PeriodFilter,

    pub generated_at: DateTime<Utc>,
    pub generated_by: String,

    // ========================================================================
    // CERTIFICATION (one-way)
    // ========================================================================
    pub is_certified: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certified_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certified_by: Option<String>,

    /// SHA-256 of the entries JSON as persisted
    pub snapshot_digest: String,
}

impl Transcript {
    pub fn id(&self) -> &str {
        &self.meta.id
    }

    /// Apply the certification transition in memory.
    ///
    /// Certification forces the type to official and cannot be undone.
    pub fn certify(&mut self, actor_id: &str, now: DateTime<Utc>) -> Result<()> {
        if self.is_certified {
            return Err(RecordError::rule(
                Entity::Transcript,
                self.id(),
                BusinessRule::AlreadyCertified,
            ));
        }

        self.is_certified = true;
        self.transcript_type = TranscriptType::Official;
        self.certified_at = Some(now);
        self.certified_by = Some(actor_id.to_string());
        self.meta.touch(now);
        Ok(())
    }

    /// Serialize entries for storage, returning (json, digest)
    pub fn encode_entries(entries: &[TranscriptEntry]) -> Result<(String, String)> {
        let json = serde_json::to_string(entries)?;
        let digest = digest_of(&json);
        Ok((json, digest))
    }

    /// Decode stored entries, refusing any snapshot whose digest has drifted
    pub fn decode_entries(
        transcript_id: &str,
        json: &str,
        expected_digest: &str,
    ) -> Result<Vec<TranscriptEntry>> {
        let actual = digest_of(json);
        if actual != expected_digest {
            return Err(RecordError::invariant(
                Entity::Transcript,
                transcript_id,
                format!(
                    "snapshot digest mismatch (stored {}, computed {})",
                    expected_digest, actual
                ),
            ));
        }
        Ok(serde_json::from_str(json)?)
    }
}

fn digest_of(json: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(json.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(code: &str, credits: u32, score: f64) -> TranscriptEntry {
        let score = Score::new(score).unwrap();
        let (letter_grade, grade_points) = crate::grade_scale::grade(score);
        TranscriptEntry {
            grade_record_id: uuid::Uuid::new_v4().to_string(),
            course_id: code.to_string(),
            course_code: code.to_string(),
            course_title: format!("{} title", code),
            credits,
            score,
            letter_grade,
            grade_points,
            semester: Semester::Fall,
            academic_year: "2024-2025".parse().unwrap(),
            finalized_at: Utc::now(),
        }
    }

    fn transcript(entries: Vec<TranscriptEntry>) -> Transcript {
        let now = Utc::now();
        let (_, digest) = Transcript::encode_entries(&entries).unwrap();
        Transcript {
            meta: RecordMeta::new(now),
            student_id: "S1".to_string(),
            entries,
            total_credits_attempted: 0,
            total_credits_earned: 0,
            cumulative_gpa: GradePoints::ZERO,
            transcript_type: TranscriptType::Interim,
            period: PeriodFilter::all(),
            generated_at: now,
            generated_by: "registrar".to_string(),
            is_certified: false,
            certified_at: None,
            certified_by: None,
            snapshot_digest: digest,
        }
    }

    #[test]
    fn test_certify_is_one_way() {
        let mut t = transcript(vec![entry("CS101", 3, 88.0)]);
        let now = Utc::now();

        t.certify("registrar", now).unwrap();
        assert!(t.is_certified);
        assert_eq!(t.transcript_type, TranscriptType::Official);
        assert_eq!(t.certified_by.as_deref(), Some("registrar"));

        let err = t.certify("registrar", now).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::BusinessRuleViolation);
    }

    #[test]
    fn test_digest_detects_drift() {
        let entries = vec![entry("CS101", 3, 88.0), entry("MATH100", 4, 72.0)];
        let (json, digest) = Transcript::encode_entries(&entries).unwrap();
        assert_eq!(digest.len(), 64);

        let decoded = Transcript::decode_entries("t1", &json, &digest).unwrap();
        assert_eq!(decoded, entries);

        let tampered = json.replace("88.0", "98.0");
        let err = Transcript::decode_entries("t1", &tampered, &digest).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::InvariantViolation);
    }

    #[test]
    fn test_transcript_type_parsing() {
        assert_eq!("Official".parse::<TranscriptType>().unwrap(), TranscriptType::Official);
        assert_eq!(TranscriptType::default(), TranscriptType::Unofficial);
        assert!("draft".parse::<TranscriptType>().is_err());
    }
}
