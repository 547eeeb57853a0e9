//! TOML format types for catalog, requirements and plan files.
//!
//! These types map directly to the on-disk formats and are deserialized via
//! `serde` + the `toml` crate. Validation lives in [`super::parser`].

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::catalog::DEFAULT_CREDIT;
use crate::plan::PlacementRecord;

// ---------------------------------------------------------------------------
// catalog.toml
// ---------------------------------------------------------------------------

/// Top-level structure of a `catalog.toml` file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CatalogToml {
    #[serde(default)]
    pub courses: Vec<CourseToml>,
}

/// A single `[[courses]]` entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CourseToml {
    pub code: String,
    #[serde(default)]
    pub title: String,
    #[serde(default = "default_credit")]
    pub credit: Decimal,
    /// Free text (`"CS1101S and MA1521"`) or a structured tree
    /// (`{ or = ["CS1231", "CS1231S"] }`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prerequisite: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub corequisites: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub preclusions: Vec<String>,
    /// Terms offered in every academic year without an `offered` entry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terms: Option<Vec<u8>>,
    /// Academic year label to terms offered that year.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub offered: BTreeMap<String, Vec<u8>>,
}

fn default_credit() -> Decimal {
    DEFAULT_CREDIT
}

// ---------------------------------------------------------------------------
// requirements.toml
// ---------------------------------------------------------------------------

/// Top-level structure of a `requirements.toml` file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RequirementsToml {
    #[serde(default)]
    pub programmes: Vec<ProgrammeToml>,
}

/// A `[[programmes]]` entry: one degree and major.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProgrammeToml {
    pub degree: String,
    pub major: String,
    #[serde(default = "default_total_credits")]
    pub total_credits: Decimal,
    #[serde(default)]
    pub categories: Vec<CategoryToml>,
    #[serde(default)]
    pub focus_areas: Vec<FocusAreaToml>,
}

fn default_total_credits() -> Decimal {
    Decimal::from(160)
}

/// A `[[programmes.categories]]` entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CategoryToml {
    pub name: String,
    /// "foundation", "breadth", "elective" or "unrestricted".
    pub kind: String,
    pub required_credits: Decimal,
    #[serde(default)]
    pub fluff: bool,
    #[serde(default)]
    pub slots: Vec<SlotToml>,
}

/// A slot: either a bare pattern or a table with a description.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum SlotToml {
    Pattern(String),
    Detailed {
        pattern: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
}

/// A `[[programmes.focus_areas]]` entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FocusAreaToml {
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub categories: Vec<CategoryToml>,
}

// ---------------------------------------------------------------------------
// plan.toml
// ---------------------------------------------------------------------------

/// Top-level structure of a `plan.toml` file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlanToml {
    pub plan: PlanMeta,
    #[serde(default)]
    pub placements: Vec<PlacementRecord>,
}

/// Plan-level metadata in `[plan]`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlanMeta {
    pub name: String,
    /// Calendar year in which study year 1 starts.
    pub start_year: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub degree: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub major: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub focus_area: Option<String>,
}
