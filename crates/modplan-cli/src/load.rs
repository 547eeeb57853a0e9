//! Shared input loading and argument parsing for the subcommands.

use std::path::Path;

use anyhow::{Context, Result, bail};
use chrono::{Datelike, Local, NaiveDate};

use modplan_core::InMemoryCatalog;
use modplan_core::catalog::Catalog;
use modplan_core::files::{self, PlanMeta};
use modplan_core::plan::{CurrentSemester, Plan, SemesterKey};
use modplan_core::requirements::{InMemoryRequirements, RequirementCategory, RequirementProvider};

pub fn read_catalog(path: &Path) -> Result<InMemoryCatalog> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read catalog file: {}", path.display()))?;
    files::parse_catalog_toml(&content)
        .with_context(|| format!("failed to parse catalog file: {}", path.display()))
}

pub fn read_requirements(path: &Path) -> Result<InMemoryRequirements> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read requirements file: {}", path.display()))?;
    files::parse_requirements_toml(&content)
        .with_context(|| format!("failed to parse requirements file: {}", path.display()))
}

pub fn read_plan(path: &Path, catalog: &dyn Catalog) -> Result<(PlanMeta, Plan)> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read plan file: {}", path.display()))?;
    files::load_plan(&content, catalog)
        .with_context(|| format!("failed to load plan file: {}", path.display()))
}

/// Programme selection from flags, falling back to the plan's metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgrammeArgs {
    pub degree: Option<String>,
    pub major: Option<String>,
    pub focus: Option<String>,
}

impl ProgrammeArgs {
    pub fn or_meta(self, meta: &PlanMeta) -> Self {
        Self {
            degree: self.degree.or_else(|| meta.degree.clone()),
            major: self.major.or_else(|| meta.major.clone()),
            focus: self.focus.or_else(|| meta.focus_area.clone()),
        }
    }

    pub fn meta(&self, name: &str, start_year: u16) -> PlanMeta {
        PlanMeta {
            name: name.to_owned(),
            start_year,
            degree: self.degree.clone(),
            major: self.major.clone(),
            focus_area: self.focus.clone(),
        }
    }
}

/// Resolve requirement categories when a degree and major are known.
/// Returns an empty list (and logs) when they are not.
pub fn categories_for(
    requirements_path: &Path,
    programme: &ProgrammeArgs,
) -> Result<Vec<RequirementCategory>> {
    let (Some(degree), Some(major)) = (&programme.degree, &programme.major) else {
        tracing::info!("no degree/major given; skipping requirement matching");
        return Ok(Vec::new());
    };
    let requirements = read_requirements(requirements_path)?;
    let categories = requirements.categories(degree, major, programme.focus.as_deref())?;
    Ok(categories)
}

/// Parse `--current`: a semester key, `incoming`, or `today`.
pub fn parse_current(raw: &str, start_year: u16) -> Result<CurrentSemester> {
    if raw.trim().eq_ignore_ascii_case("today") {
        return Ok(CurrentSemester::from_date(
            start_year,
            Local::now().date_naive(),
        ));
    }
    raw.parse()
        .with_context(|| format!("invalid current semester {raw:?} (expected y2s1, incoming or today)"))
}

/// Parse `--fix CODE=y1s1`.
pub fn parse_fixed(raw: &str) -> Result<(String, SemesterKey)> {
    let Some((code, key)) = raw.split_once('=') else {
        bail!("invalid --fix {raw:?} (expected CODE=SEMESTER, e.g. CS2103T=y2s1)");
    };
    let code = code.trim();
    if code.is_empty() {
        bail!("invalid --fix {raw:?}: missing course code");
    }
    let key: SemesterKey = key
        .parse()
        .with_context(|| format!("invalid semester in --fix {raw:?}"))?;
    Ok((code.to_uppercase(), key))
}

/// Calendar year in which the academic year containing `date` started.
pub fn academic_start_year(date: NaiveDate) -> u16 {
    let year = if date.month() >= 8 {
        date.year()
    } else {
        date.year() - 1
    };
    u16::try_from(year).unwrap_or(u16::MAX)
}
