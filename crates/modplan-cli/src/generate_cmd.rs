//! `modplan generate` command: build an initial plan for a programme.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use rust_decimal::Decimal;

use modplan_core::files;
use modplan_core::plan::SemesterKey;
use modplan_core::scheduler::Throttles;
use modplan_core::{GenerateRequest, ScheduleOutcome, generate};

use crate::config::ModplanConfig;
use crate::load::{self, ProgrammeArgs};

/// Options for `modplan generate`, as parsed from the command line.
#[derive(Debug)]
pub struct GenerateOptions {
    pub programme: ProgrammeArgs,
    pub exempt: Vec<String>,
    pub exchange: Option<SemesterKey>,
    pub fix: Vec<String>,
    pub start_year: Option<u16>,
    pub name: String,
    pub max_core: Option<usize>,
    pub max_fluff: Option<usize>,
    pub output: Option<PathBuf>,
    pub json: bool,
}

pub fn run_generate(config: &ModplanConfig, opts: GenerateOptions) -> Result<()> {
    let catalog = load::read_catalog(&config.catalog_path)?;
    let requirements = load::read_requirements(&config.requirements_path)?;

    let (Some(degree), Some(major)) = (opts.programme.degree.clone(), opts.programme.major.clone())
    else {
        anyhow::bail!("generate needs both --degree and --major");
    };

    let fixed = opts
        .fix
        .iter()
        .map(|raw| load::parse_fixed(raw))
        .collect::<Result<BTreeMap<_, _>>>()?;

    let exempted = if opts.exempt.is_empty() {
        config.exempted.clone()
    } else {
        opts.exempt.clone()
    };

    let start_year = opts
        .start_year
        .unwrap_or_else(|| load::academic_start_year(chrono::Local::now().date_naive()));

    let request = GenerateRequest {
        degree,
        major,
        focus_area: opts.programme.focus.clone(),
        max_credits_per_semester: config.max_credits,
        exempted,
        exchange: opts.exchange,
        fixed,
        start_year,
        throttles: Throttles {
            max_core_per_semester: opts.max_core,
            max_fluff_per_semester: opts.max_fluff,
        },
    };

    let outcome = generate(&catalog, &requirements, request)?;

    if opts.json {
        let out = serde_json::to_string_pretty(&outcome).context("failed to serialize schedule")?;
        println!("{out}");
    } else {
        print_outcome(&outcome, config.max_credits);
    }

    if let Some(path) = &opts.output {
        let plan = outcome
            .to_plan(opts.name.clone(), start_year, &catalog)
            .context("failed to build plan from schedule")?;
        let meta = opts.programme.meta(&opts.name, start_year);
        let text = files::plan_to_toml(&meta, &plan).context("failed to serialize plan")?;
        std::fs::write(path, text)
            .with_context(|| format!("failed to write plan file: {}", path.display()))?;
        if !opts.json {
            println!();
            println!("Plan written to {}", path.display());
        }
    }

    Ok(())
}

fn print_outcome(outcome: &ScheduleOutcome, max_credits: Decimal) {
    if !outcome.exempted.is_empty() {
        println!("Exempted: {}", outcome.exempted.join(", "));
    }
    for (key, codes) in &outcome.assignments {
        let exchange = if outcome.exchange == Some(*key) { " (exchange)" } else { "" };
        println!("{:<6}{exchange} {}", key.to_string(), codes.join(", "));
    }
    println!();
    println!(
        "Scheduled {} credits (max {} per semester).",
        outcome.total_credits.normalize(),
        max_credits.normalize()
    );

    if !outcome.infeasible.is_empty() {
        println!();
        println!("Could not place {} course(s):", outcome.infeasible.len());
        for item in &outcome.infeasible {
            println!("  {:<10} {}", item.code, item.reason);
        }
    }
}
