//! The sample files under `docs/examples/` must stay loadable and
//! produce the results documented alongside them.

use std::path::PathBuf;

use rust_decimal::Decimal;

use modplan_core::files::{
    load_plan, parse_catalog_toml, parse_requirements_toml, plan_to_toml, records_from_json,
    records_to_json,
};
use modplan_core::plan::{CurrentSemester, Plan, SemesterKey};
use modplan_core::requirements::RequirementProvider;
use modplan_core::{GenerateRequest, InMemoryCatalog, evaluate, generate};

fn workspace_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .and_then(|p| p.parent())
        .expect("workspace root")
        .to_path_buf()
}

fn read_example(name: &str) -> String {
    let path = workspace_root().join("docs/examples").join(name);
    std::fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("failed to read {}: {e}", path.display()))
}

fn example_catalog() -> InMemoryCatalog {
    parse_catalog_toml(&read_example("catalog.toml")).expect("catalog.toml should parse")
}

#[test]
fn example_catalog_parses() {
    let catalog = example_catalog();
    assert!(catalog.len() >= 20);
    assert!(catalog.iter().all(|c| c.credit > Decimal::ZERO));
}

#[test]
fn example_plan_reports_offering_violations_only() {
    let catalog = example_catalog();
    let requirements = parse_requirements_toml(&read_example("requirements.toml")).unwrap();
    let (meta, plan) = load_plan(&read_example("plan.toml"), &catalog).unwrap();

    let categories = requirements
        .categories(
            meta.degree.as_deref().unwrap_or_default(),
            meta.major.as_deref().unwrap_or_default(),
            meta.focus_area.as_deref(),
        )
        .unwrap();
    let current = CurrentSemester::At("y2s1".parse().unwrap());
    let evaluation = evaluate(&plan, current, &catalog, &categories);

    let flagged: Vec<&str> = evaluation.violations.keys().map(String::as_str).collect();
    assert_eq!(flagged, ["CS3243", "CS3244"]);
    assert!(
        evaluation
            .violations
            .values()
            .all(|v| v.missing_prerequisites.is_empty() && v.offering_violation.is_some())
    );
    assert_eq!(
        evaluation.violations["CS3244"].offering_violation.as_deref(),
        Some("not offered in Semester 1 of 2026/2027")
    );

    assert_eq!(evaluation.progress.completed_credits, Decimal::from(32));
    assert_eq!(evaluation.progress.current_credits, Decimal::from(16));
    assert_eq!(evaluation.progress.planned_credits, Decimal::from(20));

    let general = evaluation
        .category_fulfillment
        .iter()
        .find(|c| c.name == "General Education")
        .unwrap();
    assert_eq!(general.slots[0].matched.as_deref(), Some("GEC1021"));
    assert_eq!(general.fulfilled_slots(), 1);
}

#[test]
fn example_plan_survives_json_export_and_import() {
    let catalog = example_catalog();
    let (meta, plan) = load_plan(&read_example("plan.toml"), &catalog).unwrap();

    let json = records_to_json(&plan.to_placements()).unwrap();
    let records = records_from_json(&json).unwrap();
    let imported = Plan::from_placements(meta.name.clone(), meta.start_year, &records, &catalog)
        .unwrap();
    assert_eq!(imported, plan);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("plan.toml");
    std::fs::write(&path, plan_to_toml(&meta, &imported).unwrap()).unwrap();
    let (_, reloaded) = load_plan(&std::fs::read_to_string(&path).unwrap(), &catalog).unwrap();
    assert_eq!(reloaded, plan);
}

#[test]
fn example_requirements_generate_a_complete_schedule() {
    let catalog = example_catalog();
    let requirements = parse_requirements_toml(&read_example("requirements.toml")).unwrap();

    let request = GenerateRequest {
        degree: "computing".to_owned(),
        major: "Computer Science".to_owned(),
        focus_area: Some("Artificial Intelligence".to_owned()),
        max_credits_per_semester: Decimal::from(20),
        exempted: vec!["MA1301".to_owned(), "ES1103".to_owned()],
        exchange: Some("y3s2".parse().unwrap()),
        fixed: Default::default(),
        start_year: 2024,
        throttles: Default::default(),
    };

    let outcome = generate(&catalog, &requirements, request.clone()).unwrap();
    assert!(outcome.infeasible.is_empty(), "{:?}", outcome.infeasible);
    let exchange: SemesterKey = "y3s2".parse().unwrap();
    assert_eq!(outcome.assignments[&exchange], ["SEP-PLACEHOLDER"]);
    // CS3243 is not run in semester 1 of 2026/2027 and y3s2 is abroad.
    assert_eq!(outcome.semester_of("CS3243"), Some("y4s1".parse().unwrap()));

    let again = generate(&catalog, &requirements, request).unwrap();
    assert_eq!(outcome, again);

    let plan = outcome.to_plan("generated", 2024, &catalog).unwrap();
    let violations = modplan_core::validator::validate(&plan, &catalog);
    assert!(violations.is_empty(), "{violations:?}");
}
