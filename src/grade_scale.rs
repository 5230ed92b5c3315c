// 🎓 Grade Scale - score → letter → points
//
// Stateless and deterministic. Scores and points are fixed-point hundredths so
// boundary comparisons are exact (89.99 is never "almost 90").

use crate::error::{RecordError, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Minimum passing score, in hundredths (60.00)
pub const PASSING_SCORE: u32 = 6000;

/// Maximum score, in hundredths (100.00)
pub const MAX_SCORE: u32 = 10000;

// ============================================================================
// SCORE
// ============================================================================

/// Numeric score in [0.00, 100.00], stored as hundredths
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Score(u32);

impl Score {
    /// Validate and round to 2 decimal places (half away from zero)
    pub fn new(value: f64) -> Result<Self> {
        if !value.is_finite() {
            return Err(RecordError::invalid("score", "score must be a finite number"));
        }
        if !(0.0..=100.0).contains(&value) {
            return Err(RecordError::invalid(
                "score",
                format!("{} is outside [0, 100]", value),
            ));
        }

        Ok(Score((value * 100.0).round() as u32))
    }

    pub fn from_hundredths(hundredths: u32) -> Result<Self> {
        if hundredths > MAX_SCORE {
            return Err(RecordError::invalid(
                "score",
                format!("{} hundredths is above 100.00", hundredths),
            ));
        }
        Ok(Score(hundredths))
    }

    pub fn hundredths(&self) -> u32 {
        self.0
    }

    pub fn as_f64(&self) -> f64 {
        self.0 as f64 / 100.0
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

impl Serialize for Score {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_f64())
    }
}

impl<'de> Deserialize<'de> for Score {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = f64::deserialize(deserializer)?;
        Score::new(value).map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// GRADE POINTS
// ============================================================================

/// Grade points in [0.00, 4.00], stored as hundredths
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct GradePoints(u32);

impl GradePoints {
    pub const ZERO: GradePoints = GradePoints(0);
    pub const MAX: GradePoints = GradePoints(400);

    pub fn from_hundredths(hundredths: u32) -> Result<Self> {
        if hundredths > Self::MAX.0 {
            return Err(RecordError::invalid(
                "grade_points",
                format!("{} hundredths is above 4.00", hundredths),
            ));
        }
        Ok(GradePoints(hundredths))
    }

    pub fn hundredths(&self) -> u32 {
        self.0
    }

    pub fn as_f64(&self) -> f64 {
        self.0 as f64 / 100.0
    }
}

impl fmt::Display for GradePoints {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

impl Serialize for GradePoints {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_f64())
    }
}

impl<'de> Deserialize<'de> for GradePoints {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = f64::deserialize(deserializer)?;
        if !value.is_finite() || value < 0.0 {
            return Err(serde::de::Error::custom("grade points must be a non-negative number"));
        }
        GradePoints::from_hundredths((value * 100.0).round() as u32)
            .map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// LETTER GRADE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LetterGrade {
    #[serde(rename = "A+")]
    APlus,
    #[serde(rename = "A")]
    A,
    #[serde(rename = "A-")]
    AMinus,
    #[serde(rename = "B+")]
    BPlus,
    #[serde(rename = "B")]
    B,
    #[serde(rename = "B-")]
    BMinus,
    #[serde(rename = "C+")]
    CPlus,
    #[serde(rename = "C")]
    C,
    #[serde(rename = "C-")]
    CMinus,
    #[serde(rename = "D")]
    D,
    #[serde(rename = "F")]
    F,

    // Administrative letters (never produced from a score)
    #[serde(rename = "I")]
    Incomplete,
    #[serde(rename = "W")]
    Withdrawn,
    #[serde(rename = "P")]
    Pass,
    #[serde(rename = "NP")]
    NoPass,
}

impl LetterGrade {
    pub fn as_str(&self) -> &'static str {
        match self {
            LetterGrade::APlus => "A+",
            LetterGrade::A => "A",
            LetterGrade::AMinus => "A-",
            LetterGrade::BPlus => "B+",
            LetterGrade::B => "B",
            LetterGrade::BMinus => "B-",
            LetterGrade::CPlus => "C+",
            LetterGrade::C => "C",
            LetterGrade::CMinus => "C-",
            LetterGrade::D => "D",
            LetterGrade::F => "F",
            LetterGrade::Incomplete => "I",
            LetterGrade::Withdrawn => "W",
            LetterGrade::Pass => "P",
            LetterGrade::NoPass => "NP",
        }
    }
}

impl fmt::Display for LetterGrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LetterGrade {
    type Err = RecordError;

    fn from_str(s: &str) -> Result<Self> {
        let letter = match s.trim() {
            "A+" => LetterGrade::APlus,
            "A" => LetterGrade::A,
            "A-" => LetterGrade::AMinus,
            "B+" => LetterGrade::BPlus,
            "B" => LetterGrade::B,
            "B-" => LetterGrade::BMinus,
            "C+" => LetterGrade::CPlus,
            "C" => LetterGrade::C,
            "C-" => LetterGrade::CMinus,
            "D" => LetterGrade::D,
            "F" => LetterGrade::F,
            "I" => LetterGrade::Incomplete,
            "W" => LetterGrade::Withdrawn,
            "P" => LetterGrade::Pass,
            "NP" => LetterGrade::NoPass,
            other => {
                return Err(RecordError::invalid(
                    "letter_grade",
                    format!("unknown letter grade '{}'", other),
                ))
            }
        };
        Ok(letter)
    }
}

// ============================================================================
// CALCULATOR
// ============================================================================

/// Inclusive lower bounds (hundredths), highest first. Anything below the
/// last bound is an F.
const LETTER_BOUNDARIES: [(u32, LetterGrade); 10] = [
    (9700, LetterGrade::APlus),
    (9300, LetterGrade::A),
    (9000, LetterGrade::AMinus),
    (8700, LetterGrade::BPlus),
    (8300, LetterGrade::B),
    (8000, LetterGrade::BMinus),
    (7700, LetterGrade::CPlus),
    (7300, LetterGrade::C),
    (7000, LetterGrade::CMinus),
    (6000, LetterGrade::D),
];

pub fn compute_letter(score: Score) -> LetterGrade {
    LETTER_BOUNDARIES
        .iter()
        .find(|(lower, _)| score.hundredths() >= *lower)
        .map(|(_, letter)| *letter)
        .unwrap_or(LetterGrade::F)
}

pub fn compute_points(letter: LetterGrade) -> GradePoints {
    let hundredths = match letter {
        LetterGrade::APlus | LetterGrade::A => 400,
        LetterGrade::AMinus => 370,
        LetterGrade::BPlus => 330,
        LetterGrade::B => 300,
        LetterGrade::BMinus => 270,
        LetterGrade::CPlus => 230,
        LetterGrade::C => 200,
        LetterGrade::CMinus => 170,
        LetterGrade::D => 100,
        LetterGrade::F
        | LetterGrade::Incomplete
        | LetterGrade::Withdrawn
        | LetterGrade::Pass
        | LetterGrade::NoPass => 0,
    };
    GradePoints(hundredths)
}

pub fn is_passing(score: Score) -> bool {
    score.hundredths() >= PASSING_SCORE
}

/// Letter and points for a score in one step
pub fn grade(score: Score) -> (LetterGrade, GradePoints) {
    let letter = compute_letter(score);
    (letter, compute_points(letter))
}
