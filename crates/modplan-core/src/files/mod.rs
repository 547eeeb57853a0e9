//! On-disk formats: catalog, requirements and plan files.

pub mod parser;
pub mod toml_format;

pub use parser::{
    CatalogError, PlanFileError, RequirementsFileError, load_plan, parse_catalog_toml,
    parse_plan_toml, parse_requirements_toml, plan_to_toml, records_from_json, records_to_json,
};
pub use toml_format::{PlanMeta, PlanToml};
