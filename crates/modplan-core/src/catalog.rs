//! Course catalog: credits, prerequisite rules and offering calendars.
//!
//! The engine only ever talks to the [`Catalog`] trait. Unknown codes are
//! answered with `None` / [`Offered::Unknown`] so callers can fail open.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::code::normalize;
use crate::prereq::PrerequisiteRule;

/// Credit assumed for a course the catalog does not know.
pub const DEFAULT_CREDIT: Decimal = Decimal::from_parts(4, 0, 0, false, 0);

/// Answer to "is this course offered in that semester?".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Offered {
    Yes,
    No,
    /// The catalog has no calendar data for this course or year.
    Unknown,
}

/// Per academic year offering calendar.
///
/// `by_year` maps an academic year label (`"2024/2025"`) to the term numbers
/// offered that year. `default_terms` is used for years without an entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Offerings {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub by_year: BTreeMap<String, Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_terms: Option<Vec<u8>>,
}

impl Offerings {
    pub fn offered(&self, academic_year: &str, term: u8) -> Offered {
        let terms = self
            .by_year
            .get(academic_year)
            .or(self.default_terms.as_ref());
        match terms {
            Some(terms) if terms.contains(&term) => Offered::Yes,
            Some(_) => Offered::No,
            None => Offered::Unknown,
        }
    }
}

/// A catalog course.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    pub code: String,
    pub title: String,
    pub credit: Decimal,
    #[serde(default)]
    pub prerequisite: PrerequisiteRule,
    /// Codes that must be taken in the same semester or earlier.
    #[serde(default)]
    pub corequisites: Vec<String>,
    /// Codes that cannot be taken together with this course.
    #[serde(default)]
    pub preclusions: Vec<String>,
    #[serde(default)]
    pub offerings: Offerings,
}

impl Course {
    pub fn new(code: impl Into<String>, title: impl Into<String>, credit: Decimal) -> Self {
        Self {
            code: normalize(&code.into()),
            title: title.into(),
            credit,
            prerequisite: PrerequisiteRule::None,
            corequisites: Vec::new(),
            preclusions: Vec::new(),
            offerings: Offerings::default(),
        }
    }

    pub fn prerequisite(mut self, rule: PrerequisiteRule) -> Self {
        self.prerequisite = rule;
        self
    }

    pub fn corequisites<I, S>(mut self, codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.corequisites = codes.into_iter().map(|c| normalize(c.as_ref())).collect();
        self
    }

    pub fn preclusions<I, S>(mut self, codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.preclusions = codes.into_iter().map(|c| normalize(c.as_ref())).collect();
        self
    }

    /// Offered in the given terms every year.
    pub fn terms(mut self, terms: &[u8]) -> Self {
        self.offerings.default_terms = Some(terms.to_vec());
        self
    }

    /// Offered in the given terms in one specific academic year.
    pub fn offered_in(mut self, academic_year: impl Into<String>, terms: &[u8]) -> Self {
        self.offerings
            .by_year
            .insert(academic_year.into(), terms.to_vec());
        self
    }
}

/// Source of course metadata.
pub trait Catalog: Send + Sync {
    /// Look up a course by code. Unknown codes return `None`.
    fn course(&self, code: &str) -> Option<&Course>;

    /// Whether `code` runs in `term` of `academic_year`.
    fn offered(&self, code: &str, academic_year: &str, term: u8) -> Offered {
        match self.course(code) {
            Some(course) => course.offerings.offered(academic_year, term),
            None => Offered::Unknown,
        }
    }

    /// Title and credit for denormalizing into a plan, with defaults for
    /// unknown codes.
    fn describe(&self, code: &str) -> (String, Decimal) {
        match self.course(code) {
            Some(course) => (course.title.clone(), course.credit),
            None => (normalize(code), DEFAULT_CREDIT),
        }
    }
}

/// A catalog held in memory, keyed by normalized code.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    courses: BTreeMap<String, Course>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a course, replacing and returning any previous entry.
    pub fn insert(&mut self, course: Course) -> Option<Course> {
        self.courses.insert(normalize(&course.code), course)
    }

    pub fn len(&self) -> usize {
        self.courses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.courses.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Course> {
        self.courses.values()
    }
}

impl FromIterator<Course> for InMemoryCatalog {
    fn from_iter<I: IntoIterator<Item = Course>>(iter: I) -> Self {
        let mut catalog = Self::new();
        for course in iter {
            catalog.insert(course);
        }
        catalog
    }
}

impl Catalog for InMemoryCatalog {
    fn course(&self, code: &str) -> Option<&Course> {
        self.courses.get(&normalize(code))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_credit_is_four() {
        assert_eq!(DEFAULT_CREDIT, Decimal::from(4));
    }

    #[test]
    fn year_specific_offering_wins_over_default() {
        let course = Course::new("CS3230", "Algorithms", Decimal::from(4))
            .terms(&[1, 2])
            .offered_in("2026/2027", &[2]);
        assert_eq!(course.offerings.offered("2026/2027", 1), Offered::No);
        assert_eq!(course.offerings.offered("2026/2027", 2), Offered::Yes);
        assert_eq!(course.offerings.offered("2025/2026", 1), Offered::Yes);
    }

    #[test]
    fn no_calendar_is_unknown() {
        let course = Course::new("CS9999", "Mystery", Decimal::from(4));
        assert_eq!(course.offerings.offered("2025/2026", 1), Offered::Unknown);
    }

    #[test]
    fn lookup_normalizes_codes() {
        let catalog: InMemoryCatalog =
            [Course::new("cs1101s", "Programming Methodology", Decimal::from(4))]
                .into_iter()
                .collect();
        assert!(catalog.course("CS1101S").is_some());
        assert!(catalog.course(" cs1101s ").is_some());
        assert!(catalog.course("CS1101").is_none());
    }

    #[test]
    fn unknown_course_is_unknown_and_described_with_defaults() {
        let catalog = InMemoryCatalog::new();
        assert_eq!(catalog.offered("XX1234", "2025/2026", 1), Offered::Unknown);
        let (title, credit) = catalog.describe("xx1234");
        assert_eq!(title, "XX1234");
        assert_eq!(credit, DEFAULT_CREDIT);
    }
}
