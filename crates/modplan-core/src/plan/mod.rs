//! The degree plan: four study years of semesters plus an exempted bucket.
//!
//! A plan is a plain value. Every derived view (violations, progress,
//! category coverage) is recomputed from it on demand.

mod placements;
mod semester;

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::Catalog;
use crate::code::normalize;

pub use placements::{EXEMPTED_SENTINEL, PlacementRecord};
pub use semester::{
    CurrentSemester, SemesterKey, SemesterKeyParseError, Term, YEARS, academic_year,
};

/// Code of the placeholder reserving an exchange semester.
pub const EXCHANGE_PLACEHOLDER: &str = "SEP-PLACEHOLDER";

/// Where a course currently sits in a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    Semester(SemesterKey),
    Exempted,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Semester(key) => write!(f, "{key}"),
            Self::Exempted => f.write_str("exempted"),
        }
    }
}

/// Errors from plan mutations. A failed mutation leaves the plan unchanged.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlanError {
    #[error("course {code} is already in the plan ({existing})")]
    Duplicate { code: String, existing: Location },

    #[error("course {0} is not in the plan")]
    NotFound(String),

    #[error("semester {0} does not exist in this plan")]
    NoSuchSemester(SemesterKey),

    #[error("{0} is not a special term")]
    NotSpecialTerm(SemesterKey),

    #[error("only regular semesters can be exchange semesters, not {0}")]
    ExchangeOnSpecialTerm(SemesterKey),

    #[error("invalid placement of {code}: year {year}, semester {semester}")]
    InvalidPlacement { code: String, year: i32, semester: i32 },
}

// ---------------------------------------------------------------------------
// Plan structure
// ---------------------------------------------------------------------------

/// A course placed in a semester. Title and credit are denormalized from
/// the catalog at placement time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedCourse {
    pub code: String,
    pub title: String,
    pub credit: Decimal,
    /// Interchangeable filler (GE/UE style placeholder or pick).
    #[serde(default)]
    pub is_fluff: bool,
    /// Taken on exchange; offering checks do not apply.
    #[serde(default)]
    pub is_exchange_slot: bool,
}

impl PlannedCourse {
    pub fn new(code: &str, title: impl Into<String>, credit: Decimal) -> Self {
        Self {
            code: normalize(code),
            title: title.into(),
            credit,
            is_fluff: false,
            is_exchange_slot: false,
        }
    }

    /// Build from catalog data, falling back to defaults for unknown codes.
    pub fn from_catalog(catalog: &dyn Catalog, code: &str) -> Self {
        let (title, credit) = catalog.describe(code);
        Self::new(code, title, credit)
    }

    pub fn fluff(mut self, is_fluff: bool) -> Self {
        self.is_fluff = is_fluff;
        self
    }

    /// The zero-credit placeholder that marks an exchange semester.
    pub fn exchange_placeholder() -> Self {
        Self {
            code: EXCHANGE_PLACEHOLDER.to_owned(),
            title: "Student Exchange".to_owned(),
            credit: Decimal::ZERO,
            is_fluff: true,
            is_exchange_slot: true,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.code == EXCHANGE_PLACEHOLDER
    }
}

/// A course credited without being taken.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExemptedCourse {
    pub code: String,
    pub title: String,
    pub credit: Decimal,
}

impl ExemptedCourse {
    pub fn from_catalog(catalog: &dyn Catalog, code: &str) -> Self {
        let (title, credit) = catalog.describe(code);
        Self {
            code: normalize(code),
            title,
            credit,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Semester {
    pub term: Term,
    #[serde(default)]
    pub exchange: bool,
    #[serde(default)]
    pub courses: Vec<PlannedCourse>,
}

impl Semester {
    fn new(term: Term) -> Self {
        Self {
            term,
            exchange: false,
            courses: Vec::new(),
        }
    }

    pub fn credits(&self) -> Decimal {
        self.courses.iter().map(|c| c.credit).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Year {
    pub year: u8,
    /// Regular semesters first, then any special terms, in term order.
    pub semesters: Vec<Semester>,
}

/// A student's degree plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub name: String,
    /// Calendar year in which study year 1 starts.
    pub start_year: u16,
    pub years: Vec<Year>,
    #[serde(default)]
    pub exempted: Vec<ExemptedCourse>,
}

impl Plan {
    /// An empty plan: four years of two regular semesters each.
    pub fn new(name: impl Into<String>, start_year: u16) -> Self {
        let years = (1..=YEARS)
            .map(|year| Year {
                year,
                semesters: vec![Semester::new(Term::Sem1), Semester::new(Term::Sem2)],
            })
            .collect();
        Self {
            name: name.into(),
            start_year,
            years,
            exempted: Vec::new(),
        }
    }

    pub fn academic_year(&self, year: u8) -> String {
        semester::academic_year(self.start_year, year)
    }

    pub fn semester(&self, key: SemesterKey) -> Option<&Semester> {
        self.years
            .iter()
            .find(|y| y.year == key.year)?
            .semesters
            .iter()
            .find(|s| s.term == key.term)
    }

    fn semester_mut(&mut self, key: SemesterKey) -> Option<&mut Semester> {
        self.years
            .iter_mut()
            .find(|y| y.year == key.year)?
            .semesters
            .iter_mut()
            .find(|s| s.term == key.term)
    }

    /// Every semester with its key, in chronological order.
    pub fn semesters(&self) -> impl Iterator<Item = (SemesterKey, &Semester)> {
        self.years.iter().flat_map(|y| {
            y.semesters
                .iter()
                .map(move |s| (SemesterKey::new(y.year, s.term), s))
        })
    }

    /// Every placed course in plan order.
    pub fn placed(&self) -> impl Iterator<Item = (SemesterKey, &PlannedCourse)> {
        self.semesters()
            .flat_map(|(key, s)| s.courses.iter().map(move |c| (key, c)))
    }

    pub fn locate(&self, code: &str) -> Option<Location> {
        let code = normalize(code);
        if self.exempted.iter().any(|e| e.code == code) {
            return Some(Location::Exempted);
        }
        self.placed()
            .find(|(_, c)| c.code == code)
            .map(|(key, _)| Location::Semester(key))
    }

    pub fn exchange_semester(&self) -> Option<SemesterKey> {
        self.semesters()
            .find(|(_, s)| s.exchange)
            .map(|(key, _)| key)
    }

    /// Sum of credits over placements and exemptions.
    pub fn total_credits(&self) -> Decimal {
        let placed: Decimal = self.placed().map(|(_, c)| c.credit).sum();
        let exempted: Decimal = self.exempted.iter().map(|e| e.credit).sum();
        placed + exempted
    }

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------

    fn ensure_absent(&self, code: &str) -> Result<(), PlanError> {
        match self.locate(code) {
            Some(existing) => Err(PlanError::Duplicate {
                code: code.to_owned(),
                existing,
            }),
            None => Ok(()),
        }
    }

    /// Check that `key` can receive a course: it exists, or it is a special
    /// term within the plan's years (created on demand).
    fn check_target(&self, key: SemesterKey) -> Result<(), PlanError> {
        if self.semester(key).is_some() || (key.in_horizon() && !key.term.is_regular()) {
            Ok(())
        } else {
            Err(PlanError::NoSuchSemester(key))
        }
    }

    fn target_mut(&mut self, key: SemesterKey) -> Result<&mut Semester, PlanError> {
        if self.semester(key).is_none() {
            self.add_special_term(key)?;
        }
        self.semester_mut(key).ok_or(PlanError::NoSuchSemester(key))
    }

    /// Place a course into a semester at `index` (appended when `None` or
    /// past the end). Special terms are created as needed. Courses placed
    /// into an exchange semester become exchange slots.
    pub fn place(
        &mut self,
        key: SemesterKey,
        mut course: PlannedCourse,
        index: Option<usize>,
    ) -> Result<(), PlanError> {
        course.code = normalize(&course.code);
        self.ensure_absent(&course.code)?;
        self.check_target(key)?;

        let semester = self.target_mut(key)?;
        if semester.exchange {
            course.is_exchange_slot = true;
        }
        let at = index
            .unwrap_or(semester.courses.len())
            .min(semester.courses.len());
        semester.courses.insert(at, course);
        Ok(())
    }

    /// Add a course to the exempted bucket.
    pub fn exempt(&mut self, mut course: ExemptedCourse) -> Result<(), PlanError> {
        course.code = normalize(&course.code);
        self.ensure_absent(&course.code)?;
        self.exempted.push(course);
        Ok(())
    }

    /// Remove a course from wherever it is, returning where it was.
    pub fn remove(&mut self, code: &str) -> Result<Location, PlanError> {
        let code = normalize(code);
        match self.locate(&code) {
            Some(Location::Exempted) => {
                self.exempted.retain(|e| e.code != code);
                Ok(Location::Exempted)
            }
            Some(Location::Semester(key)) => {
                if let Some(semester) = self.semester_mut(key) {
                    semester.courses.retain(|c| c.code != code);
                }
                Ok(Location::Semester(key))
            }
            None => Err(PlanError::NotFound(code)),
        }
    }

    /// Move a placed course to another semester and position.
    pub fn move_course(
        &mut self,
        code: &str,
        to: SemesterKey,
        index: Option<usize>,
    ) -> Result<(), PlanError> {
        let code = normalize(code);
        let Some(Location::Semester(from)) = self.locate(&code) else {
            return Err(PlanError::NotFound(code));
        };
        self.check_target(to)?;

        let Some(source) = self.semester_mut(from) else {
            return Err(PlanError::NoSuchSemester(from));
        };
        let Some(pos) = source.courses.iter().position(|c| c.code == code) else {
            return Err(PlanError::NotFound(code));
        };
        let mut course = source.courses.remove(pos);
        if source.exchange {
            course.is_exchange_slot = course.is_placeholder();
        }
        self.place(to, course, index)
    }

    /// Add an empty special term. Adding one that exists is a no-op.
    pub fn add_special_term(&mut self, key: SemesterKey) -> Result<(), PlanError> {
        if key.term.is_regular() {
            return Err(PlanError::NotSpecialTerm(key));
        }
        let Some(year) = self.years.iter_mut().find(|y| y.year == key.year) else {
            return Err(PlanError::NoSuchSemester(key));
        };
        if !year.semesters.iter().any(|s| s.term == key.term) {
            year.semesters.push(Semester::new(key.term));
            year.semesters.sort_by_key(|s| s.term);
        }
        Ok(())
    }

    /// Mark or unmark a regular semester as the exchange semester.
    ///
    /// Marking adds the exchange placeholder and clears the flag on any other
    /// semester; unmarking removes the placeholder.
    pub fn set_exchange(&mut self, key: SemesterKey, exchange: bool) -> Result<(), PlanError> {
        if !key.term.is_regular() {
            return Err(PlanError::ExchangeOnSpecialTerm(key));
        }
        if self.semester(key).is_none() {
            return Err(PlanError::NoSuchSemester(key));
        }

        if exchange {
            if let Some(previous) = self.exchange_semester().filter(|k| *k != key) {
                self.set_exchange(previous, false)?;
            }
        }

        let Some(semester) = self.semester_mut(key) else {
            return Err(PlanError::NoSuchSemester(key));
        };
        semester.exchange = exchange;
        if exchange {
            for course in &mut semester.courses {
                course.is_exchange_slot = true;
            }
            if !semester.courses.iter().any(PlannedCourse::is_placeholder) {
                semester.courses.insert(0, PlannedCourse::exchange_placeholder());
            }
        } else {
            semester.courses.retain(|c| !c.is_placeholder());
            for course in &mut semester.courses {
                course.is_exchange_slot = false;
            }
        }
        Ok(())
    }
}
