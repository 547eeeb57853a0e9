//! Constraint scheduling and validation engine for multi-year degree plans.
//!
//! - [`scheduler`] builds an initial semester assignment from a degree's
//!   requirement list, honouring prerequisites, offerings and credit caps.
//! - [`validator`] and [`matcher`] re-evaluate any (possibly hand-edited)
//!   [`plan::Plan`] and report violations, progress and category coverage.
//! - [`revalidate`] runs that evaluation as a debounced background worker.

pub mod catalog;
pub mod code;
pub mod evaluate;
pub mod files;
pub mod matcher;
pub mod plan;
pub mod prereq;
pub mod requirements;
pub mod revalidate;
pub mod scheduler;
pub mod service;
pub mod validator;

pub use catalog::{Catalog, Course, InMemoryCatalog, Offered};
pub use evaluate::{Evaluation, evaluate};
pub use plan::{CurrentSemester, Plan, PlanError, SemesterKey, Term};
pub use prereq::{PrereqTree, PrerequisiteRule};
pub use requirements::{RequirementCategory, RequirementProvider};
pub use scheduler::{ScheduleOutcome, ScheduleRequest, schedule};
pub use service::{GenerateError, GenerateRequest, generate};
