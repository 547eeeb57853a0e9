//! Terms, semester keys and the "current semester" pointer.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// Number of study years in a plan.
pub const YEARS: u8 = 4;

/// Academic year label of a study year, e.g. `2024/2025` for year 1 of a
/// plan starting in 2024.
pub fn academic_year(start_year: u16, year: u8) -> String {
    let first = u32::from(start_year) + u32::from(year.saturating_sub(1));
    format!("{}/{}", first, first + 1)
}

/// A term within an academic year. Declaration order is chronological.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Term {
    Sem1,
    Sem2,
    Special1,
    Special2,
}

impl Term {
    /// Number used by the flat placement form and offering calendars.
    pub fn number(self) -> u8 {
        match self {
            Self::Sem1 => 1,
            Self::Sem2 => 2,
            Self::Special1 => 3,
            Self::Special2 => 4,
        }
    }

    pub fn from_number(n: u8) -> Option<Self> {
        match n {
            1 => Some(Self::Sem1),
            2 => Some(Self::Sem2),
            3 => Some(Self::Special1),
            4 => Some(Self::Special2),
            _ => None,
        }
    }

    pub fn is_regular(self) -> bool {
        matches!(self, Self::Sem1 | Self::Sem2)
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Sem1 => "Semester 1",
            Self::Sem2 => "Semester 2",
            Self::Special1 => "Special Term 1",
            Self::Special2 => "Special Term 2",
        }
    }

    fn short(self) -> &'static str {
        match self {
            Self::Sem1 => "s1",
            Self::Sem2 => "s2",
            Self::Special1 => "st1",
            Self::Special2 => "st2",
        }
    }
}

// ---------------------------------------------------------------------------
// SemesterKey
// ---------------------------------------------------------------------------

/// A semester within the plan, written `y3s2` or `y1st1`.
///
/// Ordering follows [`SemesterKey::order`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SemesterKey {
    pub year: u8,
    pub term: Term,
}

impl SemesterKey {
    pub const fn new(year: u8, term: Term) -> Self {
        Self { year, term }
    }

    /// `year * 10 + term number`; strictly increasing in time.
    pub fn order(self) -> u16 {
        u16::from(self.year) * 10 + u16::from(self.term.number())
    }

    /// The eight regular semesters of a plan, in order.
    pub fn regular_horizon() -> Vec<Self> {
        (1..=YEARS)
            .flat_map(|year| [Self::new(year, Term::Sem1), Self::new(year, Term::Sem2)])
            .collect()
    }

    pub fn in_horizon(self) -> bool {
        (1..=YEARS).contains(&self.year)
    }

    pub fn label(self) -> String {
        format!("Year {} {}", self.year, self.term.label())
    }
}

impl fmt::Display for SemesterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "y{}{}", self.year, self.term.short())
    }
}

impl FromStr for SemesterKey {
    type Err = SemesterKeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || SemesterKeyParseError(s.to_owned());
        let lower = s.trim().to_ascii_lowercase();
        let rest = lower.strip_prefix('y').ok_or_else(err)?;
        let digits = rest.chars().take_while(char::is_ascii_digit).count();
        let year: u8 = rest[..digits].parse().map_err(|_| err())?;
        let term = match &rest[digits..] {
            "s1" => Term::Sem1,
            "s2" => Term::Sem2,
            "st1" => Term::Special1,
            "st2" => Term::Special2,
            _ => return Err(err()),
        };
        if year == 0 {
            return Err(err());
        }
        Ok(Self::new(year, term))
    }
}

impl Serialize for SemesterKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SemesterKey {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Error returned when parsing an invalid [`SemesterKey`] string.
#[derive(Debug, Clone)]
pub struct SemesterKeyParseError(pub String);

impl fmt::Display for SemesterKeyParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid semester {:?} (expected e.g. y1s1, y3s2, y2st1)",
            self.0
        )
    }
}

impl std::error::Error for SemesterKeyParseError {}

// ---------------------------------------------------------------------------
// CurrentSemester
// ---------------------------------------------------------------------------

/// Where the student is now. Placements before it are completed, at it are
/// in progress, after it are planned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CurrentSemester {
    /// Not yet started; everything is in the future.
    #[default]
    Incoming,
    At(SemesterKey),
}

impl CurrentSemester {
    /// Order of the current semester; `Incoming` is before everything.
    pub fn order(self) -> u16 {
        match self {
            Self::Incoming => 0,
            Self::At(key) => key.order(),
        }
    }

    /// Derive the current semester from a calendar date and the academic
    /// year in which year 1 started.
    ///
    /// Semester 1 runs August to December, semester 2 January to April,
    /// special term 1 May to mid June and special term 2 mid June to July.
    pub fn from_date(start_year: u16, date: NaiveDate) -> Self {
        let month = date.month();
        let calendar_year = date.year();
        let academic_start = if month >= 8 {
            calendar_year
        } else {
            calendar_year - 1
        };

        let study_year = academic_start - i32::from(start_year) + 1;
        if study_year < 1 {
            return Self::Incoming;
        }
        let year = u8::try_from(study_year).unwrap_or(u8::MAX);

        let term = match month {
            8..=12 => Term::Sem1,
            1..=4 => Term::Sem2,
            5 => Term::Special1,
            6 if date.day() <= 15 => Term::Special1,
            _ => Term::Special2,
        };
        Self::At(SemesterKey::new(year, term))
    }
}

impl fmt::Display for CurrentSemester {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Incoming => f.write_str("incoming"),
            Self::At(key) => write!(f, "{key}"),
        }
    }
}

impl FromStr for CurrentSemester {
    type Err = SemesterKeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("incoming") {
            Ok(Self::Incoming)
        } else {
            s.parse().map(Self::At)
        }
    }
}
