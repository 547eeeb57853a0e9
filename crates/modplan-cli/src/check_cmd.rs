//! `modplan check` command: validate a plan and report progress.

use std::path::Path;

use anyhow::{Context, Result};

use modplan_core::{Evaluation, evaluate};
use modplan_core::matcher::SlotState;
use modplan_core::plan::{CurrentSemester, Plan};

use crate::config::ModplanConfig;
use crate::load::{self, ProgrammeArgs};

/// Run the check command. Exits with status 1 when the plan has violations.
pub fn run_check(
    config: &ModplanConfig,
    plan_path: &Path,
    current: &str,
    programme: ProgrammeArgs,
    json: bool,
) -> Result<()> {
    let catalog = load::read_catalog(&config.catalog_path)?;
    let (meta, plan) = load::read_plan(plan_path, &catalog)?;
    let current = load::parse_current(current, plan.start_year)?;
    let programme = programme.or_meta(&meta);
    let categories = load::categories_for(&config.requirements_path, &programme)?;

    let evaluation = evaluate(&plan, current, &catalog, &categories);

    if json {
        let out = serde_json::to_string_pretty(&evaluation).context("failed to serialize evaluation")?;
        println!("{out}");
    } else {
        println!(
            "Plan: {} (starting {})",
            plan.name,
            plan.academic_year(1)
        );
        println!("Current semester: {current}");
        println!();
        print_evaluation(&plan, current, &evaluation);
    }

    if !evaluation.is_clean() {
        std::process::exit(1);
    }
    Ok(())
}

fn print_evaluation(plan: &Plan, current: CurrentSemester, evaluation: &Evaluation) {
    print_schedule(plan, current);

    if evaluation.violations.is_empty() {
        println!("No violations.");
    } else {
        println!("Violations ({}):", evaluation.violations.len());
        for (code, v) in &evaluation.violations {
            if !v.missing_prerequisites.is_empty() {
                println!(
                    "  {code:<10} missing prerequisites: {}",
                    v.missing_prerequisites.join(", ")
                );
            }
            if let Some(offering) = &v.offering_violation {
                println!("  {code:<10} {offering}");
            }
            if !v.missing_corequisites.is_empty() {
                println!(
                    "  {code:<10} corequisites not taken by then: {}",
                    v.missing_corequisites.join(", ")
                );
            }
            if !v.precluded_by.is_empty() {
                println!("  {code:<10} precluded by: {}", v.precluded_by.join(", "));
            }
        }
    }
    println!();

    let p = &evaluation.progress;
    println!(
        "Progress: {} completed, {} in progress, {} planned ({} total)",
        p.completed_credits.normalize(),
        p.current_credits.normalize(),
        p.planned_credits.normalize(),
        p.total().normalize()
    );

    if evaluation.category_fulfillment.is_empty() {
        return;
    }
    println!();
    println!("Requirements:");
    for category in &evaluation.category_fulfillment {
        println!(
            "  {} [{}/{} slots, {}/{} credits]",
            category.name,
            category.fulfilled_slots(),
            category.slots.len(),
            category.matched_credits.normalize(),
            category.required_credits.normalize(),
        );
        for slot in &category.slots {
            let mark = if slot.fulfilled { "x" } else { " " };
            let matched = slot.matched.as_deref().unwrap_or("-");
            println!(
                "    [{mark}] {:<28} {matched:<10} {}",
                slot.label,
                state_label(slot.state)
            );
        }
    }
}

fn print_schedule(plan: &Plan, current: CurrentSemester) {
    if !plan.exempted.is_empty() {
        let codes: Vec<&str> = plan.exempted.iter().map(|e| e.code.as_str()).collect();
        println!("Exempted: {}", codes.join(", "));
    }
    for (key, semester) in plan.semesters() {
        if semester.courses.is_empty() {
            continue;
        }
        let marker = if current.order() == key.order() { " <- current" } else { "" };
        let exchange = if semester.exchange { " (exchange)" } else { "" };
        println!(
            "{:<6} {}{exchange}, {} credits{marker}",
            key.to_string(),
            plan.academic_year(key.year),
            semester.credits().normalize()
        );
        for course in &semester.courses {
            if course.is_placeholder() {
                continue;
            }
            println!("  {:<10} {}", course.code, course.title);
        }
    }
    println!();
}

fn state_label(state: SlotState) -> &'static str {
    match state {
        SlotState::Completed => "completed",
        SlotState::InProgress => "in progress",
        SlotState::Planned => "planned",
        SlotState::Missing => "missing",
    }
}
