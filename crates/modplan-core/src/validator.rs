//! Per-course constraint checks over a plan snapshot.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::catalog::{Catalog, Offered};
use crate::code::same_base;
use crate::plan::Plan;
use crate::prereq::Available;

/// Findings for one placed course.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseViolations {
    /// Minimal set of leaves still needed, sorted.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing_prerequisites: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offering_violation: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing_corequisites: Vec<String>,
    /// Other plan courses that preclude this one.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub precluded_by: Vec<String>,
}

impl CourseViolations {
    pub fn is_empty(&self) -> bool {
        self.missing_prerequisites.is_empty()
            && self.offering_violation.is_none()
            && self.missing_corequisites.is_empty()
            && self.precluded_by.is_empty()
    }
}

/// Course code to its findings. Courses without findings are absent.
pub type ViolationRecord = BTreeMap<String, CourseViolations>;

struct Taken<'a> {
    code: &'a str,
    /// `None` for exemptions, which precede everything.
    order: Option<u16>,
}

/// Check every non-filler placement against the catalog.
pub fn validate(plan: &Plan, catalog: &dyn Catalog) -> ViolationRecord {
    let taken: Vec<Taken<'_>> = plan
        .exempted
        .iter()
        .map(|e| Taken {
            code: &e.code,
            order: None,
        })
        .chain(
            plan.placed()
                .filter(|(_, c)| !c.is_placeholder())
                .map(|(key, c)| Taken {
                    code: &c.code,
                    order: Some(key.order()),
                }),
        )
        .collect();

    let mut record = ViolationRecord::new();

    for (key, planned) in plan.placed() {
        if planned.is_fluff {
            continue;
        }
        let Some(course) = catalog.course(&planned.code) else {
            tracing::debug!(code = %planned.code, "course not in catalog, skipping checks");
            continue;
        };
        let order = key.order();
        let mut findings = CourseViolations::default();

        let earlier: Available = taken
            .iter()
            .filter(|t| t.order.is_none_or(|o| o < order))
            .map(|t| t.code)
            .collect();
        findings.missing_prerequisites = course.prerequisite.missing(&earlier).into_iter().collect();

        if !planned.is_exchange_slot {
            let year = plan.academic_year(key.year);
            if catalog.offered(&planned.code, &year, key.term.number()) == Offered::No {
                findings.offering_violation =
                    Some(format!("not offered in {} of {year}", key.term.label()));
            }
        }

        findings.missing_corequisites = course
            .corequisites
            .iter()
            .filter(|co| {
                !taken
                    .iter()
                    .any(|t| t.order.is_none_or(|o| o <= order) && same_base(t.code, co))
            })
            .cloned()
            .collect();

        for precluded in &course.preclusions {
            for t in &taken {
                if t.code != planned.code
                    && same_base(t.code, precluded)
                    && !findings.precluded_by.iter().any(|p| p == t.code)
                {
                    findings.precluded_by.push(t.code.to_owned());
                }
            }
        }

        if !findings.is_empty() {
            tracing::debug!(code = %planned.code, semester = %key, "constraint violations found");
            record.insert(planned.code.clone(), findings);
        }
    }

    record
}
