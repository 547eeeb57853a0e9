//! The flat placement form used for persistence and interchange.
//!
//! One record per course: `{ year, semester, index, code }` with optional
//! `fluff` / `exchange` markers. Exemptions use the sentinel bucket
//! `year = -1, semester = -1`.

use serde::{Deserialize, Serialize};

use super::{
    EXCHANGE_PLACEHOLDER, ExemptedCourse, Plan, PlanError, PlannedCourse, SemesterKey, Term, YEARS,
};
use crate::catalog::Catalog;
use crate::code::normalize;

/// Year and semester number of the exempted bucket.
pub const EXEMPTED_SENTINEL: i32 = -1;

/// A single flat placement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacementRecord {
    pub year: i32,
    pub semester: i32,
    pub index: u32,
    pub code: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub fluff: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub exchange: bool,
}

fn is_false(b: &bool) -> bool {
    !*b
}

impl PlacementRecord {
    pub fn is_exempted(&self) -> bool {
        self.year == EXEMPTED_SENTINEL && self.semester == EXEMPTED_SENTINEL
    }

    /// The semester this record targets, if it is a valid placement.
    pub fn key(&self) -> Option<SemesterKey> {
        let year = u8::try_from(self.year).ok().filter(|y| (1..=YEARS).contains(y))?;
        let term = u8::try_from(self.semester).ok().and_then(Term::from_number)?;
        Some(SemesterKey::new(year, term))
    }
}

fn index_of(i: usize) -> u32 {
    u32::try_from(i).unwrap_or(u32::MAX)
}

impl Plan {
    /// Flatten the plan: exemptions first, then every semester in order.
    pub fn to_placements(&self) -> Vec<PlacementRecord> {
        let exempted = self
            .exempted
            .iter()
            .enumerate()
            .map(|(i, e)| PlacementRecord {
                year: EXEMPTED_SENTINEL,
                semester: EXEMPTED_SENTINEL,
                index: index_of(i),
                code: e.code.clone(),
                fluff: false,
                exchange: false,
            });

        let placed = self.semesters().flat_map(|(key, semester)| {
            semester
                .courses
                .iter()
                .enumerate()
                .map(move |(i, c)| PlacementRecord {
                    year: i32::from(key.year),
                    semester: i32::from(key.term.number()),
                    index: index_of(i),
                    code: c.code.clone(),
                    fluff: c.is_fluff,
                    exchange: c.is_exchange_slot,
                })
        });

        exempted.chain(placed).collect()
    }

    /// Rebuild a plan from flat records, denormalizing titles and credits
    /// from the catalog.
    ///
    /// Records are ordered by `(year, semester, index)`; gaps in indices are
    /// closed. Duplicate codes and out-of-range year/semester values are
    /// rejected.
    pub fn from_placements(
        name: impl Into<String>,
        start_year: u16,
        records: &[PlacementRecord],
        catalog: &dyn Catalog,
    ) -> Result<Self, PlanError> {
        let mut plan = Plan::new(name, start_year);

        let mut sorted: Vec<&PlacementRecord> = records.iter().collect();
        sorted.sort_by_key(|r| (r.year, r.semester, r.index));

        let mut exchange_keys = Vec::new();

        for record in sorted {
            if record.is_exempted() {
                plan.exempt(ExemptedCourse::from_catalog(catalog, &record.code))?;
                continue;
            }

            let key = record.key().ok_or_else(|| PlanError::InvalidPlacement {
                code: normalize(&record.code),
                year: record.year,
                semester: record.semester,
            })?;

            let course = if normalize(&record.code) == EXCHANGE_PLACEHOLDER {
                PlannedCourse::exchange_placeholder()
            } else {
                let mut course = PlannedCourse::from_catalog(catalog, &record.code);
                course.is_fluff = record.fluff;
                course.is_exchange_slot = record.exchange;
                course
            };
            if course.is_exchange_slot && key.term.is_regular() && !exchange_keys.contains(&key) {
                exchange_keys.push(key);
            }
            plan.place(key, course, None)?;
        }

        for key in exchange_keys {
            if let Some(semester) = plan.semester_mut(key) {
                semester.exchange = true;
            }
        }

        Ok(plan)
    }
}
