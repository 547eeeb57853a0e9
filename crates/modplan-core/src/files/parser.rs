//! Validating parsers for the TOML file formats, plus plan serialization.
//!
//! Catalog validation checks:
//! - Course codes are unique and shaped like course codes.
//! - Credits are positive.
//! - Term numbers are 1 to 4.
//!
//! Requirements validation checks:
//! - At least one programme, unique by degree and major.
//! - Category kinds are valid and required credits are not negative.
//! - Focus area codes are unique within a programme.
//!
//! Plan validation checks:
//! - Year/semester values are in range, or the exempted sentinel pair.
//! - Codes are unique across all placements.
//! - No two placements share a position.

use std::collections::HashSet;

use rust_decimal::Decimal;
use thiserror::Error;

use super::toml_format::{
    CatalogToml, CategoryToml, CourseToml, PlanMeta, PlanToml, ProgrammeToml, RequirementsToml,
    SlotToml,
};
use crate::catalog::{Catalog, Course, InMemoryCatalog, Offerings};
use crate::code::{looks_like_code, normalize};
use crate::plan::{PlacementRecord, Plan, PlanError};
use crate::prereq;
use crate::requirements::{
    CategoryKind, FocusArea, InMemoryRequirements, Programme, RequirementCategory, RequirementSlot,
    SlotPattern,
};

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// Errors that can occur while loading a catalog file.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("duplicate course code: {0:?}")]
    DuplicateCourse(String),

    #[error("invalid course code: {0:?}")]
    InvalidCode(String),

    #[error("course {code:?} has non-positive credit {credit}")]
    InvalidCredit { code: String, credit: Decimal },

    #[error("course {code:?} lists invalid term {term} (expected 1 to 4)")]
    InvalidTerm { code: String, term: u8 },
}

/// Parse and validate a `catalog.toml` string.
pub fn parse_catalog_toml(content: &str) -> Result<InMemoryCatalog, CatalogError> {
    let file: CatalogToml = toml::from_str(content)?;
    catalog_from_toml(file)
}

/// Validate parsed catalog entries and build the in-memory catalog.
pub fn catalog_from_toml(file: CatalogToml) -> Result<InMemoryCatalog, CatalogError> {
    let mut seen = HashSet::new();
    let mut catalog = InMemoryCatalog::new();

    for entry in file.courses {
        let code = normalize(&entry.code);
        if !looks_like_code(&code) {
            return Err(CatalogError::InvalidCode(entry.code));
        }
        if !seen.insert(code.clone()) {
            return Err(CatalogError::DuplicateCourse(code));
        }
        if entry.credit <= Decimal::ZERO {
            return Err(CatalogError::InvalidCredit {
                code,
                credit: entry.credit,
            });
        }
        let all_terms = entry
            .terms
            .iter()
            .flatten()
            .chain(entry.offered.values().flatten());
        for &term in all_terms {
            if !(1..=4).contains(&term) {
                return Err(CatalogError::InvalidTerm { code, term });
            }
        }

        catalog.insert(course_from_toml(code, entry));
    }

    tracing::debug!(courses = catalog.len(), "catalog loaded");
    Ok(catalog)
}

fn course_from_toml(code: String, entry: CourseToml) -> Course {
    let title = if entry.title.trim().is_empty() {
        code.clone()
    } else {
        entry.title
    };
    Course {
        prerequisite: prereq::parse(entry.prerequisite.as_ref()),
        corequisites: entry.corequisites.iter().map(|c| normalize(c)).collect(),
        preclusions: entry.preclusions.iter().map(|c| normalize(c)).collect(),
        offerings: Offerings {
            by_year: entry.offered,
            default_terms: entry.terms,
        },
        code,
        title,
        credit: entry.credit,
    }
}

// ---------------------------------------------------------------------------
// Requirements
// ---------------------------------------------------------------------------

/// Errors that can occur while loading a requirements file.
#[derive(Debug, Error)]
pub enum RequirementsFileError {
    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("requirements must contain at least one programme")]
    NoProgrammes,

    #[error("duplicate programme: degree {degree:?}, major {major:?}")]
    DuplicateProgramme { degree: String, major: String },

    #[error(
        "invalid kind {value:?} on category {category:?} (expected foundation, breadth, elective, or unrestricted)"
    )]
    InvalidKind { category: String, value: String },

    #[error("category {0:?} has negative required credits")]
    NegativeCredits(String),

    #[error("duplicate focus area {code:?} in major {major:?}")]
    DuplicateFocusArea { major: String, code: String },
}

/// Parse and validate a `requirements.toml` string.
pub fn parse_requirements_toml(content: &str) -> Result<InMemoryRequirements, RequirementsFileError> {
    let file: RequirementsToml = toml::from_str(content)?;
    if file.programmes.is_empty() {
        return Err(RequirementsFileError::NoProgrammes);
    }

    let mut seen = HashSet::new();
    let mut programmes = Vec::with_capacity(file.programmes.len());
    for programme in file.programmes {
        let key = (
            programme.degree.to_lowercase(),
            programme.major.to_lowercase(),
        );
        if !seen.insert(key) {
            return Err(RequirementsFileError::DuplicateProgramme {
                degree: programme.degree,
                major: programme.major,
            });
        }
        programmes.push(programme_from_toml(programme)?);
    }

    tracing::debug!(programmes = programmes.len(), "requirements loaded");
    Ok(InMemoryRequirements::new(programmes))
}

fn programme_from_toml(p: ProgrammeToml) -> Result<Programme, RequirementsFileError> {
    let categories = categories_from_toml(p.categories)?;

    let mut codes = HashSet::new();
    let mut focus_areas = Vec::with_capacity(p.focus_areas.len());
    for focus in p.focus_areas {
        if !codes.insert(focus.code.to_uppercase()) {
            return Err(RequirementsFileError::DuplicateFocusArea {
                major: p.major,
                code: focus.code,
            });
        }
        focus_areas.push(FocusArea {
            code: focus.code,
            name: focus.name,
            categories: categories_from_toml(focus.categories)?,
        });
    }

    Ok(Programme {
        degree: p.degree,
        major: p.major,
        total_credits: p.total_credits,
        categories,
        focus_areas,
    })
}

fn categories_from_toml(
    categories: Vec<CategoryToml>,
) -> Result<Vec<RequirementCategory>, RequirementsFileError> {
    categories
        .into_iter()
        .map(|c| {
            let kind: CategoryKind =
                c.kind
                    .parse()
                    .map_err(|_| RequirementsFileError::InvalidKind {
                        category: c.name.clone(),
                        value: c.kind.clone(),
                    })?;
            if c.required_credits < Decimal::ZERO {
                return Err(RequirementsFileError::NegativeCredits(c.name));
            }
            let slots = c
                .slots
                .into_iter()
                .map(|slot| match slot {
                    SlotToml::Pattern(pattern) => RequirementSlot::new(SlotPattern::parse(&pattern)),
                    SlotToml::Detailed {
                        pattern,
                        description,
                    } => RequirementSlot {
                        pattern: SlotPattern::parse(&pattern),
                        description,
                    },
                })
                .collect();
            Ok(RequirementCategory {
                name: c.name,
                kind,
                required_credits: c.required_credits,
                fluff: c.fluff,
                slots,
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Plan
// ---------------------------------------------------------------------------

/// Errors that can occur while reading or writing plan files.
#[derive(Debug, Error)]
pub enum PlanFileError {
    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("course {0:?} appears more than once")]
    DuplicateCode(String),

    #[error("placement of {code:?} has invalid year {year} / semester {semester}")]
    InvalidPlacement { code: String, year: i32, semester: i32 },

    #[error("two placements share year {year}, semester {semester}, index {index}")]
    DuplicatePosition { year: i32, semester: i32, index: u32 },

    #[error(transparent)]
    Plan(#[from] PlanError),
}

/// Parse and validate a `plan.toml` string.
pub fn parse_plan_toml(content: &str) -> Result<PlanToml, PlanFileError> {
    let file: PlanToml = toml::from_str(content)?;
    validate_records(&file.placements)?;
    Ok(file)
}

/// Check flat records for range, uniqueness and position clashes.
pub fn validate_records(records: &[PlacementRecord]) -> Result<(), PlanFileError> {
    let mut codes = HashSet::new();
    let mut positions = HashSet::new();

    for record in records {
        if !record.is_exempted() && record.key().is_none() {
            return Err(PlanFileError::InvalidPlacement {
                code: record.code.clone(),
                year: record.year,
                semester: record.semester,
            });
        }
        if !codes.insert(normalize(&record.code)) {
            return Err(PlanFileError::DuplicateCode(normalize(&record.code)));
        }
        if !positions.insert((record.year, record.semester, record.index)) {
            return Err(PlanFileError::DuplicatePosition {
                year: record.year,
                semester: record.semester,
                index: record.index,
            });
        }
    }
    Ok(())
}

/// Parse a `plan.toml` string and build the plan against `catalog`.
pub fn load_plan(content: &str, catalog: &dyn Catalog) -> Result<(PlanMeta, Plan), PlanFileError> {
    let file = parse_plan_toml(content)?;
    let plan = Plan::from_placements(
        file.plan.name.clone(),
        file.plan.start_year,
        &file.placements,
        catalog,
    )?;
    Ok((file.plan, plan))
}

/// Render a plan as `plan.toml`.
pub fn plan_to_toml(meta: &PlanMeta, plan: &Plan) -> Result<String, PlanFileError> {
    let file = PlanToml {
        plan: meta.clone(),
        placements: plan.to_placements(),
    };
    Ok(toml::to_string_pretty(&file)?)
}

pub fn records_to_json(records: &[PlacementRecord]) -> Result<String, PlanFileError> {
    Ok(serde_json::to_string_pretty(records)?)
}

pub fn records_from_json(content: &str) -> Result<Vec<PlacementRecord>, PlanFileError> {
    let records: Vec<PlacementRecord> = serde_json::from_str(content)?;
    validate_records(&records)?;
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Offered;
    use crate::prereq::{PrereqTree, PrerequisiteRule};
    use crate::requirements::RequirementProvider;

    #[test]
    fn parse_valid_catalog() {
        let content = r#"
[[courses]]
code = "CS1101S"
title = "Programming Methodology"
credit = 4
terms = [1]

[[courses]]
code = "cs2040s"
title = "Data Structures and Algorithms"
credit = 4
prerequisite = "CS1101S or CS1010"
terms = [1, 2]

[courses.offered]
"2025/2026" = [2]

[[courses]]
code = "CS2030S"
title = "Programming Methodology II"
prerequisite = { or = ["CS1101S", "CS1010"] }
"#;
        let catalog = parse_catalog_toml(content).expect("should parse");
        assert_eq!(catalog.len(), 3);

        let cs2040s = catalog.course("CS2040S").unwrap();
        assert_eq!(
            cs2040s.prerequisite,
            PrerequisiteRule::Tree(PrereqTree::Any(vec![
                PrereqTree::Leaf("CS1101S".to_owned()),
                PrereqTree::Leaf("CS1010".to_owned()),
            ]))
        );
        assert_eq!(catalog.offered("CS2040S", "2025/2026", 1), Offered::No);
        assert_eq!(catalog.offered("CS2040S", "2026/2027", 1), Offered::Yes);

        let cs2030s = catalog.course("CS2030S").unwrap();
        assert_eq!(cs2030s.credit, Decimal::from(4));
        assert_eq!(cs2030s.prerequisite, cs2040s.prerequisite);
    }

    #[test]
    fn rejects_duplicate_course() {
        let content = r#"
[[courses]]
code = "CS1101S"

[[courses]]
code = "cs1101s"
"#;
        let err = parse_catalog_toml(content).unwrap_err();
        assert!(matches!(err, CatalogError::DuplicateCourse(ref c) if c == "CS1101S"));
    }

    #[test]
    fn rejects_bad_terms_and_credits() {
        let bad_term = r#"
[[courses]]
code = "CS1101S"
terms = [5]
"#;
        assert!(matches!(
            parse_catalog_toml(bad_term).unwrap_err(),
            CatalogError::InvalidTerm { term: 5, .. }
        ));

        let bad_credit = r#"
[[courses]]
code = "CS1101S"
credit = 0
"#;
        assert!(matches!(
            parse_catalog_toml(bad_credit).unwrap_err(),
            CatalogError::InvalidCredit { .. }
        ));
    }

    #[test]
    fn malformed_prerequisite_is_kept_as_text() {
        let content = r#"
[[courses]]
code = "CS4248"
prerequisite = "Pass CS3243 with distinction"
"#;
        let catalog = parse_catalog_toml(content).unwrap();
        assert_eq!(
            catalog.course("CS4248").unwrap().prerequisite,
            PrerequisiteRule::Unparsed("Pass CS3243 with distinction".to_owned())
        );
    }

    #[test]
    fn parse_requirements_with_focus_areas() {
        let content = r#"
[[programmes]]
degree = "computing"
major = "Computer Science"

[[programmes.categories]]
name = "Foundation"
kind = "foundation"
required_credits = 8
slots = ["CS1101S", { pattern = "CS1231%", description = "Discrete Structures" }]

[[programmes.categories]]
name = "Unrestricted Electives"
kind = "unrestricted"
required_credits = 40
fluff = true

[[programmes.focus_areas]]
code = "AI"
name = "Artificial Intelligence"

[[programmes.focus_areas.categories]]
name = "AI Focus"
kind = "elective"
required_credits = 4
slots = ["CS3243"]
"#;
        let provider = parse_requirements_toml(content).expect("should parse");
        let categories = provider
            .categories("computing", "Computer Science", Some("AI"))
            .unwrap();
        assert_eq!(categories.len(), 3);
        assert_eq!(categories[0].slots[1].label(), "Discrete Structures");
        assert_eq!(categories[0].slots[1].pattern, SlotPattern::Prefix("CS1231".to_owned()));
        assert!(categories[2].fluff);
        assert_eq!(provider.programmes()[0].total_credits, Decimal::from(160));
    }

    #[test]
    fn rejects_invalid_kind() {
        let content = r#"
[[programmes]]
degree = "computing"
major = "Computer Science"

[[programmes.categories]]
name = "Core"
kind = "mandatory"
required_credits = 8
"#;
        let err = parse_requirements_toml(content).unwrap_err();
        assert!(matches!(err, RequirementsFileError::InvalidKind { ref value, .. } if value == "mandatory"));
    }

    #[test]
    fn rejects_empty_requirements() {
        assert!(matches!(
            parse_requirements_toml("").unwrap_err(),
            RequirementsFileError::NoProgrammes
        ));
    }

    #[test]
    fn parse_valid_plan() {
        let content = r#"
[plan]
name = "Four year plan"
start_year = 2024

[[placements]]
year = -1
semester = -1
index = 0
code = "MA1301"

[[placements]]
year = 1
semester = 1
index = 0
code = "CS1101S"

[[placements]]
year = 3
semester = 2
index = 0
code = "SEP-PLACEHOLDER"
fluff = true
exchange = true
"#;
        let file = parse_plan_toml(content).expect("should parse");
        assert_eq!(file.placements.len(), 3);
        let (meta, plan) = load_plan(content, &InMemoryCatalog::new()).unwrap();
        assert_eq!(meta.start_year, 2024);
        assert_eq!(plan.exchange_semester(), Some("y3s2".parse().unwrap()));
    }

    #[test]
    fn rejects_duplicate_codes_and_bad_sentinels() {
        let dup = r#"
[plan]
name = "p"
start_year = 2024

[[placements]]
year = 1
semester = 1
index = 0
code = "CS1101S"

[[placements]]
year = 2
semester = 1
index = 0
code = "CS1101S"
"#;
        assert!(matches!(
            parse_plan_toml(dup).unwrap_err(),
            PlanFileError::DuplicateCode(_)
        ));

        let sentinel = r#"
[plan]
name = "p"
start_year = 2024

[[placements]]
year = -1
semester = 2
index = 0
code = "CS1101S"
"#;
        assert!(matches!(
            parse_plan_toml(sentinel).unwrap_err(),
            PlanFileError::InvalidPlacement { .. }
        ));
    }

    #[test]
    fn rejects_shared_position() {
        let content = r#"
[plan]
name = "p"
start_year = 2024

[[placements]]
year = 1
semester = 1
index = 0
code = "CS1101S"

[[placements]]
year = 1
semester = 1
index = 0
code = "CS1231S"
"#;
        assert!(matches!(
            parse_plan_toml(content).unwrap_err(),
            PlanFileError::DuplicatePosition { .. }
        ));
    }

    #[test]
    fn plan_written_as_toml_reads_back() {
        let catalog = InMemoryCatalog::new();
        let meta = PlanMeta {
            name: "p".to_owned(),
            start_year: 2025,
            degree: Some("computing".to_owned()),
            major: None,
            focus_area: None,
        };
        let mut plan = Plan::new("p", 2025);
        plan.place(
            "y2s1".parse().unwrap(),
            crate::plan::PlannedCourse::from_catalog(&catalog, "CS2103T"),
            None,
        )
        .unwrap();

        let text = plan_to_toml(&meta, &plan).unwrap();
        let (meta_back, plan_back) = load_plan(&text, &catalog).unwrap();
        assert_eq!(meta_back, meta);
        assert_eq!(plan_back.to_placements(), plan.to_placements());
    }

    #[test]
    fn json_records_are_validated() {
        let json = r#"[{"year":1,"semester":1,"index":0,"code":"CS1101S"},{"year":9,"semester":1,"index":0,"code":"CS1231S"}]"#;
        assert!(matches!(
            records_from_json(json).unwrap_err(),
            PlanFileError::InvalidPlacement { .. }
        ));
    }
}
