//! Requirement fulfillment and credit progress.
//!
//! Specific categories are matched slot by slot against every code in the
//! plan; within a category each code fills at most one slot. Unrestricted electives are filled by count from the codes no
//! specific category pattern claims, in plan order.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::plan::{CurrentSemester, Plan};
use crate::requirements::{CategoryKind, RequirementCategory, RequirementSlot, SlotPattern};

/// Display state of a requirement slot relative to the current semester.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotState {
    Completed,
    InProgress,
    Planned,
    Missing,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotFulfillment {
    pub label: String,
    pub pattern: SlotPattern,
    pub fulfilled: bool,
    /// The code credited to this slot, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched: Option<String>,
    pub state: SlotState,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryFulfillment {
    pub name: String,
    pub kind: CategoryKind,
    pub required_credits: Decimal,
    /// Credits of the distinct codes credited to this category's slots.
    pub matched_credits: Decimal,
    pub slots: Vec<SlotFulfillment>,
}

impl CategoryFulfillment {
    pub fn fulfilled_slots(&self) -> usize {
        self.slots.iter().filter(|s| s.fulfilled).count()
    }

    pub fn is_complete(&self) -> bool {
        self.slots.iter().all(|s| s.fulfilled)
    }
}

/// Credits split by position relative to the current semester.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub completed_credits: Decimal,
    pub current_credits: Decimal,
    pub planned_credits: Decimal,
}

impl ProgressSnapshot {
    pub fn total(&self) -> Decimal {
        self.completed_credits + self.current_credits + self.planned_credits
    }
}

/// A code the student has taken or plans to take.
#[derive(Debug, Clone)]
struct Taken {
    code: String,
    credit: Decimal,
    /// `None` for exemptions.
    order: Option<u16>,
}

impl Taken {
    fn state(&self, current: u16) -> SlotState {
        match self.order {
            None => SlotState::Completed,
            Some(o) if o < current => SlotState::Completed,
            Some(o) if o == current => SlotState::InProgress,
            Some(_) => SlotState::Planned,
        }
    }
}

/// Exemptions first, then placements by semester and position. The exchange
/// placeholder is never a taken course.
fn taken(plan: &Plan) -> Vec<Taken> {
    plan.exempted
        .iter()
        .map(|e| Taken {
            code: e.code.clone(),
            credit: e.credit,
            order: None,
        })
        .chain(
            plan.placed()
                .filter(|(_, c)| !c.is_placeholder())
                .map(|(key, c)| Taken {
                    code: c.code.clone(),
                    credit: c.credit,
                    order: Some(key.order()),
                }),
        )
        .collect()
}

/// Credit each slot with a distinct taken code. Exact slots pick first so a
/// wildcard slot never takes the one code an exact slot needs.
fn fill_slots<'t>(slots: &[RequirementSlot], taken: &'t [Taken]) -> Vec<Option<&'t Taken>> {
    let mut credited: Vec<Option<&Taken>> = vec![None; slots.len()];
    let exact_first = slots
        .iter()
        .enumerate()
        .filter(|(_, s)| s.pattern.is_exact())
        .chain(
            slots
                .iter()
                .enumerate()
                .filter(|(_, s)| !s.pattern.is_exact()),
        );
    for (i, slot) in exact_first {
        let hit = taken.iter().find(|t| {
            slot.pattern.matches(&t.code)
                && !credited.iter().flatten().any(|used| used.code == t.code)
        });
        credited[i] = hit;
    }
    credited
}

/// Match every category against the plan.
pub fn match_categories(
    plan: &Plan,
    current: CurrentSemester,
    categories: &[RequirementCategory],
) -> Vec<CategoryFulfillment> {
    let taken = taken(plan);
    let current = current.order();

    let specific_patterns: Vec<SlotPattern> = categories
        .iter()
        .filter(|c| !c.is_unrestricted())
        .flat_map(|c| c.effective_slots())
        .map(|s| s.pattern)
        .collect();
    let unconsumed: Vec<&Taken> = taken
        .iter()
        .filter(|t| !specific_patterns.iter().any(|p| p.matches(&t.code)))
        .collect();

    categories
        .iter()
        .map(|category| {
            let slots = category.effective_slots();
            let credited: Vec<Option<&Taken>> = if category.is_unrestricted() {
                (0..slots.len()).map(|i| unconsumed.get(i).copied()).collect()
            } else {
                fill_slots(&slots, &taken)
            };

            let mut counted: Vec<&str> = Vec::new();
            let mut matched_credits = Decimal::ZERO;
            for t in credited.iter().flatten() {
                if !counted.contains(&t.code.as_str()) {
                    counted.push(&t.code);
                    matched_credits += t.credit;
                }
            }

            let slots = slots
                .into_iter()
                .zip(credited)
                .map(|(slot, hit)| SlotFulfillment {
                    label: slot.label(),
                    pattern: slot.pattern,
                    fulfilled: hit.is_some(),
                    matched: hit.map(|t| t.code.clone()),
                    state: hit.map_or(SlotState::Missing, |t| t.state(current)),
                })
                .collect();

            CategoryFulfillment {
                name: category.name.clone(),
                kind: category.kind,
                required_credits: category.required_credits,
                matched_credits,
                slots,
            }
        })
        .collect()
}

/// Completed, current and planned credits. Exemptions are completed.
pub fn progress(plan: &Plan, current: CurrentSemester) -> ProgressSnapshot {
    let current = current.order();
    let mut snapshot = ProgressSnapshot::default();
    for t in taken(plan) {
        match t.state(current) {
            SlotState::Completed => snapshot.completed_credits += t.credit,
            SlotState::InProgress => snapshot.current_credits += t.credit,
            SlotState::Planned | SlotState::Missing => snapshot.planned_credits += t.credit,
        }
    }
    snapshot
}
