// 📅 Academic period - semester + academic year
//
// Both are validated on the way in; malformed values never reach storage.

use crate::error::{RecordError, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// SEMESTER
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Semester {
    Fall,
    Winter,
    Spring,
    Summer,
}

impl Semester {
    pub fn as_str(&self) -> &'static str {
        match self {
            Semester::Fall => "fall",
            Semester::Winter => "winter",
            Semester::Spring => "spring",
            Semester::Summer => "summer",
        }
    }

    /// Position inside an academic year (which starts in the fall)
    pub fn ordinal(&self) -> u8 {
        match self {
            Semester::Fall => 0,
            Semester::Winter => 1,
            Semester::Spring => 2,
            Semester::Summer => 3,
        }
    }
}

impl fmt::Display for Semester {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Semester {
    type Err = RecordError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "fall" => Ok(Semester::Fall),
            "winter" => Ok(Semester::Winter),
            "spring" => Ok(Semester::Spring),
            "summer" => Ok(Semester::Summer),
            other => Err(RecordError::invalid(
                "semester",
                format!("unknown semester '{}'", other),
            )),
        }
    }
}

// ============================================================================
// ACADEMIC YEAR
// ============================================================================

/// Academic year in `YYYY-YYYY` form, e.g. `2024-2025`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AcademicYear {
    start: u16,
}

impl AcademicYear {
    pub fn starting(start: u16) -> Result<Self> {
        if !(1900..=9998).contains(&start) {
            return Err(RecordError::invalid(
                "academic_year",
                format!("start year {} is out of range", start),
            ));
        }
        Ok(AcademicYear { start })
    }

    pub fn start_year(&self) -> u16 {
        self.start
    }

    pub fn end_year(&self) -> u16 {
        self.start + 1
    }
}

impl fmt::Display for AcademicYear {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end_year())
    }
}

impl FromStr for AcademicYear {
    type Err = RecordError;

    fn from_str(s: &str) -> Result<Self> {
        let malformed = || {
            RecordError::invalid(
                "academic_year",
                format!("'{}' is not of the form YYYY-YYYY", s),
            )
        };

        let (start, end) = s.trim().split_once('-').ok_or_else(malformed)?;
        if start.len() != 4 || end.len() != 4 {
            return Err(malformed());
        }
        let start: u16 = start.parse().map_err(|_| malformed())?;
        let end: u16 = end.parse().map_err(|_| malformed())?;

        if start.checked_add(1) != Some(end) {
            return Err(RecordError::invalid(
                "academic_year",
                format!("'{}' must span two consecutive years", s),
            ));
        }

        AcademicYear::starting(start)
    }
}

impl Serialize for AcademicYear {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for AcademicYear {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// PERIOD FILTER
// ============================================================================

/// Optional semester / academic-year restriction used by GPA and transcripts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semester: Option<Semester>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub academic_year: Option<AcademicYear>,
}

impl PeriodFilter {
    pub fn all() -> Self {
        Self::default()
    }

    /// Parse optional raw strings (CLI / query-string input)
    pub fn parse(semester: Option<&str>, academic_year: Option<&str>) -> Result<Self> {
        Ok(PeriodFilter {
            semester: semester.map(str::parse::<Semester>).transpose()?,
            academic_year: academic_year.map(str::parse::<AcademicYear>).transpose()?,
        })
    }
}
