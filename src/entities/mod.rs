// Entity Models - grade records and transcripts
//
// Each entity embeds a RecordMeta value (identity + timestamps) instead of
// inheriting shared fields:
// - Stable identity (UUID) that NEVER changes
// - created_at stamped once, updated_at on every accepted mutation

pub mod grade_record;
pub mod transcript;

pub use grade_record::{GradeRecord, GradeRecordFilter};
pub use transcript::{Transcript, TranscriptEntry, TranscriptType};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identity + bookkeeping timestamps shared by every entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordMeta {
    /// Stable identity (UUID v4)
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RecordMeta {
    pub fn new(now: DateTime<Utc>) -> Self {
        RecordMeta {
            id: uuid::Uuid::new_v4().to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_record_meta_identity() {
        let now = Utc::now();
        let mut meta = RecordMeta::new(now);

        assert_eq!(meta.id.len(), 36);
        assert_eq!(meta.created_at, meta.updated_at);

        let id = meta.id.clone();
        meta.touch(now + Duration::seconds(5));

        assert_eq!(meta.id, id); // Identity remains the same!
        assert_eq!(meta.created_at, now);
        assert_eq!(meta.updated_at, now + Duration::seconds(5));
    }

    #[test]
    fn test_ids_are_unique() {
        let now = Utc::now();
        assert_ne!(RecordMeta::new(now).id, RecordMeta::new(now).id);
    }
}
