//! Plan generation service.
//!
//! Resolves a programme's requirement categories, expands them into an
//! ordered course list and hands that list to the scheduler.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::{Catalog, DEFAULT_CREDIT};
use crate::code::{normalize, same_base};
use crate::plan::SemesterKey;
use crate::requirements::{RequirementCategory, RequirementError, RequirementProvider, SlotPattern};
use crate::scheduler::{ScheduleEntry, ScheduleOutcome, ScheduleRequest, Throttles, schedule};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateRequest {
    pub degree: String,
    pub major: String,
    #[serde(default)]
    pub focus_area: Option<String>,
    pub max_credits_per_semester: Decimal,
    #[serde(default)]
    pub exempted: Vec<String>,
    #[serde(default)]
    pub exchange: Option<SemesterKey>,
    /// Course code to the semester it must be placed in.
    #[serde(default)]
    pub fixed: BTreeMap<String, SemesterKey>,
    pub start_year: u16,
    #[serde(default)]
    pub throttles: Throttles,
}

/// Errors that prevent generation from starting. Courses that cannot be
/// placed are not errors; they are reported in the outcome.
#[derive(Debug, Error)]
pub enum GenerateError {
    #[error(transparent)]
    Requirement(#[from] RequirementError),

    #[error("max credits per semester must be positive, got {0}")]
    InvalidMaxCredits(Decimal),

    #[error("exchange semester {0} must be a regular semester in years 1 to 4")]
    InvalidExchange(SemesterKey),
}

// ---------------------------------------------------------------------------
// Generation
// ---------------------------------------------------------------------------

/// Generate an initial schedule for a programme.
pub fn generate(
    catalog: &dyn Catalog,
    provider: &dyn RequirementProvider,
    request: GenerateRequest,
) -> Result<ScheduleOutcome, GenerateError> {
    if request.max_credits_per_semester <= Decimal::ZERO {
        return Err(GenerateError::InvalidMaxCredits(
            request.max_credits_per_semester,
        ));
    }
    if let Some(key) = request.exchange {
        if !key.term.is_regular() || !key.in_horizon() {
            return Err(GenerateError::InvalidExchange(key));
        }
    }

    let categories =
        provider.categories(&request.degree, &request.major, request.focus_area.as_deref())?;
    let entries = expand_categories(catalog, &categories, &request.exempted);

    tracing::info!(
        degree = %request.degree,
        major = %request.major,
        categories = categories.len(),
        courses = entries.len(),
        "generating plan"
    );

    let mut schedule_request = ScheduleRequest::new(
        entries,
        request.max_credits_per_semester,
        request.start_year,
    );
    schedule_request.fixed = request.fixed;
    schedule_request.exchange = request.exchange;
    schedule_request.exempted = request.exempted;
    schedule_request.throttles = request.throttles;

    Ok(schedule(catalog, &schedule_request))
}

/// Expand categories into the scheduler's course list.
///
/// Exact slots are taken in order until the category's required credits are
/// covered. Exempted courses and courses already listed by an earlier
/// category cover their slot without being listed again. Prefix and `Any`
/// slots become numbered filler placeholders (`GEC-1`, `UE-1`, ...) unless
/// an unused exemption matches them.
pub fn expand_categories(
    catalog: &dyn Catalog,
    categories: &[RequirementCategory],
    exempted: &[String],
) -> Vec<ScheduleEntry> {
    let exempted: Vec<String> = exempted.iter().map(|c| normalize(c)).collect();
    let mut used_exemptions: Vec<&str> = Vec::new();
    let mut counters: BTreeMap<String, usize> = BTreeMap::new();
    let mut entries: Vec<ScheduleEntry> = Vec::new();

    for category in categories {
        let priority = category.kind.priority();
        let mut covered = Decimal::ZERO;

        for slot in category.effective_slots() {
            if covered >= category.required_credits {
                break;
            }

            if let SlotPattern::Exact(code) = &slot.pattern {
                let (_, credit) = catalog.describe(code);
                covered += credit;
                if let Some(e) = exempted.iter().find(|e| same_base(e, code)) {
                    used_exemptions.push(e);
                    continue;
                }
                if entries.iter().any(|entry| same_base(&entry.code, code)) {
                    continue;
                }
                let entry = if category.fluff {
                    ScheduleEntry::fluff(code, priority)
                } else {
                    ScheduleEntry::new(code, priority)
                };
                entries.push(entry);
                continue;
            }

            covered += DEFAULT_CREDIT;
            let unused = exempted
                .iter()
                .find(|e| slot.pattern.matches(e) && !used_exemptions.contains(&e.as_str()));
            if let Some(e) = unused {
                used_exemptions.push(e);
                continue;
            }
            let prefix = match &slot.pattern {
                SlotPattern::Prefix(prefix) => prefix.clone(),
                _ => "UE".to_owned(),
            };
            let n = counters.entry(prefix.clone()).or_insert(0);
            *n += 1;
            entries.push(ScheduleEntry::fluff(&format!("{prefix}-{n}"), priority));
        }

        if covered < category.required_credits {
            tracing::warn!(
                category = %category.name,
                covered = %covered,
                required = %category.required_credits,
                "category slots do not cover its required credits"
            );
        }
    }

    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Course, InMemoryCatalog};
    use crate::prereq::{PrereqTree, PrerequisiteRule};
    use crate::requirements::{CategoryKind, InMemoryRequirements, Programme, RequirementSlot};

    fn four(code: &str) -> Course {
        Course::new(code, code, Decimal::from(4))
    }

    fn category(name: &str, kind: CategoryKind, credits: i64, slots: &[&str]) -> RequirementCategory {
        RequirementCategory {
            name: name.to_owned(),
            kind,
            required_credits: Decimal::from(credits),
            fluff: false,
            slots: slots
                .iter()
                .map(|s| RequirementSlot::new(SlotPattern::parse(s)))
                .collect(),
        }
    }

    fn provider(categories: Vec<RequirementCategory>) -> InMemoryRequirements {
        InMemoryRequirements::new(vec![Programme {
            degree: "computing".to_owned(),
            major: "Computer Science".to_owned(),
            total_credits: Decimal::from(160),
            categories,
            focus_areas: Vec::new(),
        }])
    }

    fn request() -> GenerateRequest {
        GenerateRequest {
            degree: "computing".to_owned(),
            major: "Computer Science".to_owned(),
            focus_area: None,
            max_credits_per_semester: Decimal::from(20),
            exempted: Vec::new(),
            exchange: None,
            fixed: BTreeMap::new(),
            start_year: 2024,
            throttles: Throttles::default(),
        }
    }

    #[test]
    fn exact_slots_stop_once_credits_are_covered() {
        let catalog: InMemoryCatalog = ["CS1101S", "CS1231S", "MA1521"].into_iter().map(four).collect();
        let categories = vec![category(
            "Foundation",
            CategoryKind::Foundation,
            8,
            &["CS1101S", "CS1231S", "MA1521"],
        )];
        let entries = expand_categories(&catalog, &categories, &[]);
        let codes: Vec<_> = entries.iter().map(|e| e.code.as_str()).collect();
        assert_eq!(codes, ["CS1101S", "CS1231S"]);
        assert!(entries.iter().all(|e| e.priority == 1 && !e.fluff));
    }

    #[test]
    fn wildcard_slots_become_numbered_placeholders() {
        let categories = vec![
            category("General Education", CategoryKind::Breadth, 8, &["GEC%", "GEC%"]),
            category("Unrestricted Electives", CategoryKind::Unrestricted, 8, &[]),
        ];
        let entries = expand_categories(&InMemoryCatalog::new(), &categories, &[]);
        let codes: Vec<_> = entries.iter().map(|e| e.code.as_str()).collect();
        assert_eq!(codes, ["GEC-1", "GEC-2", "UE-1", "UE-2"]);
        assert!(entries.iter().all(|e| e.fluff));
        assert_eq!(entries[2].priority, 4);
    }

    #[test]
    fn exemptions_cover_slots_without_being_listed() {
        let catalog: InMemoryCatalog = ["MA1301", "CS1101S"].into_iter().map(four).collect();
        let categories = vec![
            category("Foundation", CategoryKind::Foundation, 8, &["MA1301", "CS1101S"]),
            category("Communication", CategoryKind::Breadth, 4, &["ES%"]),
        ];
        let exempted = vec!["ma1301".to_owned(), "ES1103".to_owned()];
        let entries = expand_categories(&catalog, &categories, &exempted);
        let codes: Vec<_> = entries.iter().map(|e| e.code.as_str()).collect();
        assert_eq!(codes, ["CS1101S"]);
    }

    #[test]
    fn courses_shared_between_categories_are_listed_once() {
        let catalog: InMemoryCatalog = ["CS2103T", "CS2101"].into_iter().map(four).collect();
        let categories = vec![
            category("Core", CategoryKind::Foundation, 4, &["CS2103T"]),
            category("Project", CategoryKind::Elective, 8, &["CS2103T", "CS2101"]),
        ];
        let entries = expand_categories(&catalog, &categories, &[]);
        let codes: Vec<_> = entries.iter().map(|e| e.code.as_str()).collect();
        assert_eq!(codes, ["CS2103T", "CS2101"]);
    }

    #[test]
    fn generate_schedules_the_expanded_list() {
        let catalog: InMemoryCatalog = [
            four("CS1101S"),
            four("CS2030S").prerequisite(PrerequisiteRule::from_tree(PrereqTree::Leaf(
                "CS1101S".to_owned(),
            ))),
        ]
        .into_iter()
        .collect();
        let provider = provider(vec![
            category("Foundation", CategoryKind::Foundation, 8, &["CS2030S", "CS1101S"]),
            category("Unrestricted Electives", CategoryKind::Unrestricted, 4, &[]),
        ]);

        let outcome = generate(&catalog, &provider, request()).unwrap();
        assert!(outcome.infeasible.is_empty());
        assert_eq!(outcome.semester_of("CS1101S"), Some("y1s1".parse().unwrap()));
        assert_eq!(outcome.semester_of("CS2030S"), Some("y1s2".parse().unwrap()));
        assert!(outcome.fluff.contains("UE-1"));
    }

    #[test]
    fn rejects_bad_inputs() {
        let provider = provider(Vec::new());
        let catalog = InMemoryCatalog::new();

        let mut zero = request();
        zero.max_credits_per_semester = Decimal::ZERO;
        assert!(matches!(
            generate(&catalog, &provider, zero),
            Err(GenerateError::InvalidMaxCredits(_))
        ));

        let mut special = request();
        special.exchange = Some("y2st1".parse().unwrap());
        assert!(matches!(
            generate(&catalog, &provider, special),
            Err(GenerateError::InvalidExchange(_))
        ));

        let mut unknown = request();
        unknown.major = "Philosophy".to_owned();
        assert!(matches!(
            generate(&catalog, &provider, unknown),
            Err(GenerateError::Requirement(RequirementError::UnknownProgramme { .. }))
        ));
    }
}
