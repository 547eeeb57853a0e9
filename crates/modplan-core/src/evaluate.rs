//! One-shot evaluation of a plan: violations, progress and category
//! coverage together.

use serde::{Deserialize, Serialize};

use crate::catalog::Catalog;
use crate::matcher::{CategoryFulfillment, ProgressSnapshot, match_categories, progress};
use crate::plan::{CurrentSemester, Plan};
use crate::requirements::RequirementCategory;
use crate::validator::{ViolationRecord, validate};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evaluation {
    pub violations: ViolationRecord,
    pub progress: ProgressSnapshot,
    pub category_fulfillment: Vec<CategoryFulfillment>,
}

impl Evaluation {
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Evaluate `plan` as of `current`. Pure: the same inputs always give the
/// same result.
pub fn evaluate(
    plan: &Plan,
    current: CurrentSemester,
    catalog: &dyn Catalog,
    categories: &[RequirementCategory],
) -> Evaluation {
    let evaluation = Evaluation {
        violations: validate(plan, catalog),
        progress: progress(plan, current),
        category_fulfillment: match_categories(plan, current, categories),
    };
    tracing::debug!(
        plan = %plan.name,
        violations = evaluation.violations.len(),
        completed = %evaluation.progress.completed_credits,
        "plan evaluated"
    );
    evaluation
}
