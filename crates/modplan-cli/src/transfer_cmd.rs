//! `modplan export` and `modplan import`: convert between `plan.toml` and the
//! flat JSON placement records.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};

use modplan_core::InMemoryCatalog;
use modplan_core::files::{self, PlanMeta};
use modplan_core::plan::Plan;

/// Write the plan's placement records as JSON to `output` or stdout.
pub fn run_export(plan_path: &Path, output: Option<&Path>) -> Result<()> {
    let content = std::fs::read_to_string(plan_path)
        .with_context(|| format!("failed to read plan file: {}", plan_path.display()))?;
    let file = files::parse_plan_toml(&content)
        .with_context(|| format!("failed to parse plan file: {}", plan_path.display()))?;
    let json = files::records_to_json(&file.placements)?;

    write_output(output, &json)?;
    if let Some(path) = output {
        println!(
            "Exported {} placements to {}",
            file.placements.len(),
            path.display()
        );
    }
    Ok(())
}

/// Read JSON placement records and write them as `plan.toml`.
pub fn run_import(
    records_path: &Path,
    name: &str,
    start_year: u16,
    output: Option<&Path>,
) -> Result<()> {
    let content = std::fs::read_to_string(records_path)
        .with_context(|| format!("failed to read records file: {}", records_path.display()))?;
    let records = files::records_from_json(&content)
        .with_context(|| format!("failed to parse records file: {}", records_path.display()))?;

    // Titles and credits are not persisted, so an empty catalog is enough
    // to check the records assemble into a plan.
    let plan = Plan::from_placements(name, start_year, &records, &InMemoryCatalog::new())
        .context("records do not form a valid plan")?;
    let meta = PlanMeta {
        name: name.to_owned(),
        start_year,
        degree: None,
        major: None,
        focus_area: None,
    };
    let toml = files::plan_to_toml(&meta, &plan)?;

    write_output(output, &toml)?;
    if let Some(path) = output {
        println!("Imported {} placements to {}", records.len(), path.display());
    }
    Ok(())
}

fn write_output(output: Option<&Path>, text: &str) -> Result<()> {
    let mut writer: Box<dyn Write> = if let Some(path) = output {
        Box::new(
            std::fs::File::create(path)
                .with_context(|| format!("cannot create output file: {}", path.display()))?,
        )
    } else {
        Box::new(std::io::stdout().lock())
    };
    writeln!(writer, "{text}")?;
    Ok(())
}
