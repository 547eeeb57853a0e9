//! Greedy, prerequisite-aware placement of a course list into semesters.
//!
//! The scheduler never fails: courses it cannot place are returned in
//! [`ScheduleOutcome::infeasible`] with a reason, and placement continues
//! with everything else. Identical input always yields identical output.

use std::collections::{BTreeMap, BTreeSet};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::catalog::{Catalog, Offered};
use crate::code::{normalize, same_base};
use crate::plan::{
    EXCHANGE_PLACEHOLDER, ExemptedCourse, Plan, PlanError, PlannedCourse, SemesterKey, YEARS,
    academic_year,
};
use crate::prereq::{Available, PrerequisiteRule};

/// One course to schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub code: String,
    /// Category priority; lower is placed first.
    pub priority: u8,
    /// Fillers skip prerequisite and offering checks.
    #[serde(default)]
    pub fluff: bool,
}

impl ScheduleEntry {
    pub fn new(code: &str, priority: u8) -> Self {
        Self {
            code: normalize(code),
            priority,
            fluff: false,
        }
    }

    pub fn fluff(code: &str, priority: u8) -> Self {
        Self {
            fluff: true,
            ..Self::new(code, priority)
        }
    }
}

/// Optional per-semester count limits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Throttles {
    /// Maximum non-filler courses per semester.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_core_per_semester: Option<usize>,
    /// Maximum filler courses per semester; not applied in the final year.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_fluff_per_semester: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleRequest {
    /// Courses in requirement order.
    pub entries: Vec<ScheduleEntry>,
    pub max_credits_per_semester: Decimal,
    /// Courses pinned to a semester, placed before anything else.
    pub fixed: BTreeMap<String, SemesterKey>,
    /// Semester spent on exchange; it receives no ordinary placement.
    pub exchange: Option<SemesterKey>,
    pub exempted: Vec<String>,
    pub start_year: u16,
    pub throttles: Throttles,
}

impl ScheduleRequest {
    pub fn new(entries: Vec<ScheduleEntry>, max_credits_per_semester: Decimal, start_year: u16) -> Self {
        Self {
            entries,
            max_credits_per_semester,
            fixed: BTreeMap::new(),
            exchange: None,
            exempted: Vec::new(),
            start_year,
            throttles: Throttles::default(),
        }
    }
}

/// A course the scheduler could not place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Infeasible {
    pub code: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScheduleOutcome {
    /// Semester to codes, in placement order.
    pub assignments: BTreeMap<SemesterKey, Vec<String>>,
    /// Credits of every placed course (exemptions excluded).
    pub total_credits: Decimal,
    pub infeasible: Vec<Infeasible>,
    /// Placed codes that are fillers.
    #[serde(default)]
    pub fluff: BTreeSet<String>,
    #[serde(default)]
    pub exempted: Vec<String>,
    #[serde(default)]
    pub exchange: Option<SemesterKey>,
}

impl ScheduleOutcome {
    pub fn semester_of(&self, code: &str) -> Option<SemesterKey> {
        let code = normalize(code);
        self.assignments
            .iter()
            .find(|(_, codes)| codes.contains(&code))
            .map(|(key, _)| *key)
    }

    /// Materialize the outcome as a plan, denormalizing from the catalog.
    pub fn to_plan(
        &self,
        name: impl Into<String>,
        start_year: u16,
        catalog: &dyn Catalog,
    ) -> Result<Plan, PlanError> {
        let mut plan = Plan::new(name, start_year);
        for code in &self.exempted {
            plan.exempt(ExemptedCourse::from_catalog(catalog, code))?;
        }
        if let Some(key) = self.exchange {
            plan.set_exchange(key, true)?;
        }
        for (key, codes) in &self.assignments {
            for code in codes.iter().filter(|c| c.as_str() != EXCHANGE_PLACEHOLDER) {
                let course =
                    PlannedCourse::from_catalog(catalog, code).fluff(self.fluff.contains(code));
                plan.place(*key, course, None)?;
            }
        }
        Ok(plan)
    }
}

/// Schedule `request` against `catalog`.
pub fn schedule(catalog: &dyn Catalog, request: &ScheduleRequest) -> ScheduleOutcome {
    let mut scheduler = Scheduler::new(catalog, request);
    scheduler.reserve_exchange();
    scheduler.place_anchors();
    let pending = scheduler.pending_entries();
    let pending = scheduler.reject_unsatisfiable(pending);
    scheduler.run(pending);
    scheduler.finish()
}

// ---------------------------------------------------------------------------
// Internal state
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct Pending {
    /// Position in the deduplicated list; second tie-breaker after priority.
    seq: usize,
    code: String,
    priority: u8,
    fluff: bool,
    credit: Decimal,
    rule: PrerequisiteRule,
    /// In-list corequisite partners, as they appear in the list.
    coreqs: Vec<String>,
}

#[derive(Debug, Default)]
struct Load {
    credits: Decimal,
    core: usize,
    fluff: usize,
    codes: Vec<String>,
}

struct Scheduler<'a> {
    catalog: &'a dyn Catalog,
    request: &'a ScheduleRequest,
    horizon: Vec<SemesterKey>,
    exempted: Vec<String>,
    exchange: Option<SemesterKey>,
    loads: BTreeMap<SemesterKey, Load>,
    placed: Vec<(String, SemesterKey)>,
    fluff: BTreeSet<String>,
    infeasible: Vec<Infeasible>,
}

impl<'a> Scheduler<'a> {
    fn new(catalog: &'a dyn Catalog, request: &'a ScheduleRequest) -> Self {
        let mut exempted: Vec<String> = Vec::new();
        for code in &request.exempted {
            let code = normalize(code);
            if !exempted.contains(&code) {
                exempted.push(code);
            }
        }
        Self {
            catalog,
            request,
            horizon: SemesterKey::regular_horizon(),
            exempted,
            exchange: None,
            loads: BTreeMap::new(),
            placed: Vec::new(),
            fluff: BTreeSet::new(),
            infeasible: Vec::new(),
        }
    }

    fn reject(&mut self, code: &str, reason: String) {
        tracing::debug!(code, %reason, "course infeasible");
        self.infeasible.push(Infeasible {
            code: code.to_owned(),
            reason,
        });
    }

    fn is_exempted(&self, code: &str) -> bool {
        self.exempted.iter().any(|e| e == code)
    }

    fn is_placed(&self, code: &str) -> bool {
        self.placed.iter().any(|(c, _)| c == code)
    }

    /// Exempted codes plus everything placed strictly before `order`.
    fn available_before(&self, order: u16) -> Available {
        let mut available: Available = self.exempted.iter().collect();
        for (code, key) in &self.placed {
            if key.order() < order {
                available.insert(code);
            }
        }
        available
    }

    fn commit(&mut self, key: SemesterKey, code: &str, credit: Decimal, fluff: bool) {
        let load = self.loads.entry(key).or_default();
        load.credits += credit;
        if fluff {
            load.fluff += 1;
            self.fluff.insert(code.to_owned());
        } else {
            load.core += 1;
        }
        load.codes.push(code.to_owned());
        self.placed.push((code.to_owned(), key));
        tracing::debug!(code, semester = %key, %credit, "placed course");
    }

    // -----------------------------------------------------------------------
    // Phases
    // -----------------------------------------------------------------------

    fn reserve_exchange(&mut self) {
        let Some(key) = self.request.exchange else {
            return;
        };
        if !key.term.is_regular() || !key.in_horizon() {
            tracing::warn!(semester = %key, "exchange semester outside the planning horizon, ignoring");
            return;
        }
        self.exchange = Some(key);
        let load = self.loads.entry(key).or_default();
        load.codes.push(EXCHANGE_PLACEHOLDER.to_owned());
    }

    fn place_anchors(&mut self) {
        let request = self.request;
        for (raw, key) in &request.fixed {
            let code = normalize(raw);
            if self.is_exempted(&code) {
                self.reject(&code, format!("fixed to {key} but already exempted"));
                continue;
            }
            if self.is_placed(&code) {
                continue;
            }
            if Some(*key) == self.exchange {
                self.reject(&code, format!("fixed to {key}, which is the exchange semester"));
                continue;
            }
            if !key.term.is_regular() || !key.in_horizon() {
                self.reject(&code, format!("fixed to {key}, outside the planning horizon"));
                continue;
            }

            let fluff = request
                .entries
                .iter()
                .any(|e| e.fluff && normalize(&e.code) == code);
            let (_, credit) = self.catalog.describe(&code);
            self.commit(*key, &code, credit, fluff);

            let load = &self.loads[key];
            if load.credits > request.max_credits_per_semester {
                tracing::warn!(
                    semester = %key,
                    credits = %load.credits,
                    max = %request.max_credits_per_semester,
                    "fixed courses exceed the semester credit limit"
                );
            }
        }
    }

    /// Deduplicated list without exempted or already anchored codes.
    fn pending_entries(&self) -> Vec<Pending> {
        let mut seen: Vec<String> = Vec::new();
        for entry in &self.request.entries {
            let code = normalize(&entry.code);
            if !seen.contains(&code) {
                seen.push(code);
            }
        }

        let mut pending = Vec::new();
        for entry in &self.request.entries {
            let code = normalize(&entry.code);
            if pending.iter().any(|p: &Pending| p.code == code)
                || self.is_exempted(&code)
                || self.is_placed(&code)
                || self.infeasible.iter().any(|i| i.code == code)
            {
                continue;
            }

            let course = self.catalog.course(&code);
            let rule = course.map(|c| c.prerequisite.clone()).unwrap_or_default();
            let credit = course.map_or_else(|| self.catalog.describe(&code).1, |c| c.credit);
            let coreqs = course
                .map(|c| {
                    c.corequisites
                        .iter()
                        .filter_map(|co| seen.iter().find(|s| same_base(s, co)).cloned())
                        .filter(|co| *co != code)
                        .collect()
                })
                .unwrap_or_default();

            pending.push(Pending {
                seq: pending.len(),
                code,
                priority: entry.priority,
                fluff: entry.fluff,
                credit,
                rule,
                coreqs,
            });
        }
        pending
    }

    /// Drop courses whose prerequisites cannot be met by anything in the
    /// list, the anchors or the exemptions.
    fn reject_unsatisfiable(&mut self, pending: Vec<Pending>) -> Vec<Pending> {
        let mut universe = self.available_before(u16::MAX);
        universe.extend(pending.iter().map(|p| p.code.as_str()));

        let mut kept = Vec::with_capacity(pending.len());
        for entry in pending {
            if entry.fluff || entry.rule.is_satisfied(&universe) {
                kept.push(entry);
                continue;
            }
            let missing = join(entry.rule.missing(&universe));
            self.reject(
                &entry.code,
                format!("requires {missing}, which is neither planned nor exempted"),
            );
        }
        kept
    }

    fn run(&mut self, mut pending: Vec<Pending>) {
        while !pending.is_empty() {
            let available = self.available_before(u16::MAX);
            let ready: Vec<usize> = (0..pending.len())
                .filter(|&i| pending[i].fluff || pending[i].rule.is_satisfied(&available))
                .collect();

            if ready.is_empty() {
                self.stall(pending);
                return;
            }

            // A course waits for a pending corequisite partner that is not
            // ready yet, unless every ready course is waiting.
            let is_ready = |code: &str| ready.iter().any(|&i| pending[i].code == code);
            let is_pending = |code: &str| pending.iter().any(|p| p.code == code);
            let unblocked: Vec<usize> = ready
                .iter()
                .copied()
                .filter(|&i| {
                    pending[i]
                        .coreqs
                        .iter()
                        .all(|p| !is_pending(p) || is_ready(p))
                })
                .collect();
            let pool = if unblocked.is_empty() { &ready } else { &unblocked };

            let Some(pick) = pool
                .iter()
                .copied()
                .min_by_key(|&i| (pending[i].priority, pending[i].seq))
            else {
                return;
            };

            let entry = pending.remove(pick);
            let Some(earliest) = self.earliest(&entry) else {
                self.reject(
                    &entry.code,
                    "its prerequisites are only met after the last semester of the plan".to_owned(),
                );
                continue;
            };

            match self.target(&entry, earliest, &pending) {
                Some(key) => {
                    self.commit(key, &entry.code, entry.credit, entry.fluff);
                    self.place_partners(key, &entry, &mut pending);
                }
                None => {
                    let from = self.horizon[earliest];
                    self.reject(
                        &entry.code,
                        format!(
                            "no semester within the horizon from {from} onward has room for it and offers it"
                        ),
                    );
                }
            }
        }
    }

    /// Index into the horizon of the first semester whose earlier placements
    /// satisfy the course's prerequisites.
    fn earliest(&self, entry: &Pending) -> Option<usize> {
        if entry.fluff {
            return Some(0);
        }
        self.horizon
            .iter()
            .position(|key| entry.rule.is_satisfied(&self.available_before(key.order())))
    }

    /// First semester from `earliest` that fits the course together with its
    /// ready corequisite partners, or the course alone when no semester in
    /// the horizon fits the group.
    fn target(&self, entry: &Pending, earliest: usize, pending: &[Pending]) -> Option<SemesterKey> {
        let window = &self.horizon[earliest..];
        let together = window.iter().copied().find(|&key| {
            let mut group = self.partners_at(key, entry, pending);
            group.push(entry);
            self.fits(key, &group)
        });
        together.or_else(|| window.iter().copied().find(|&key| self.fits(key, &[entry])))
    }

    /// Unplaced in-list partners of `entry` whose prerequisites are met
    /// before `key`.
    fn partners_at<'p>(&self, key: SemesterKey, entry: &Pending, pending: &'p [Pending]) -> Vec<&'p Pending> {
        let available = self.available_before(key.order());
        entry
            .coreqs
            .iter()
            .filter_map(|partner| pending.iter().find(|p| &p.code == partner))
            .filter(|p| p.fluff || p.rule.is_satisfied(&available))
            .collect()
    }

    /// Whether every course in `group` can go into `key` at once.
    fn fits(&self, key: SemesterKey, group: &[&Pending]) -> bool {
        if Some(key) == self.exchange {
            return false;
        }

        let year = academic_year(self.request.start_year, key.year);
        let unoffered = group.iter().any(|entry| {
            !entry.fluff
                && self.catalog.offered(&entry.code, &year, key.term.number()) == Offered::No
        });
        if unoffered {
            return false;
        }

        let empty = Load::default();
        let load = self.loads.get(&key).unwrap_or(&empty);
        let credits: Decimal = group.iter().map(|entry| entry.credit).sum();
        if load.credits + credits > self.request.max_credits_per_semester {
            return false;
        }

        let throttles = self.request.throttles;
        let fluff = group.iter().filter(|entry| entry.fluff).count();
        let core = group.len() - fluff;
        // Filler limits are relaxed in the final year.
        if fluff > 0
            && key.year != YEARS
            && throttles.max_fluff_per_semester.is_some_and(|max| load.fluff + fluff > max)
        {
            return false;
        }
        if core > 0 && throttles.max_core_per_semester.is_some_and(|max| load.core + core > max) {
            return false;
        }
        true
    }

    /// Put ready corequisite partners of `entry` into the same semester.
    fn place_partners(&mut self, key: SemesterKey, entry: &Pending, pending: &mut Vec<Pending>) {
        for partner in &entry.coreqs {
            let Some(pos) = pending.iter().position(|p| &p.code == partner) else {
                continue;
            };
            let candidate = &pending[pos];
            let ready = candidate.fluff
                || candidate
                    .rule
                    .is_satisfied(&self.available_before(key.order()));
            if ready && self.fits(key, &[candidate]) {
                let partner = pending.remove(pos);
                self.commit(key, &partner.code, partner.credit, partner.fluff);
            } else {
                tracing::debug!(code = %entry.code, partner = %candidate.code, semester = %key, "corequisite placed separately");
            }
        }
    }

    /// Nothing is ready: classify every remaining course as blocked by an
    /// infeasible course or as part of a prerequisite cycle.
    fn stall(&mut self, pending: Vec<Pending>) {
        let available = self.available_before(u16::MAX);
        let mut blocked: Vec<String> = self.infeasible.iter().map(|i| i.code.clone()).collect();
        let mut remaining: Vec<(Pending, BTreeSet<String>)> = pending
            .into_iter()
            .map(|p| {
                let missing = p.rule.missing(&available);
                (p, missing)
            })
            .collect();

        loop {
            let blocked_set: Available = blocked.iter().collect();
            let mut progressed = false;
            let mut still = Vec::with_capacity(remaining.len());

            for (entry, missing) in remaining {
                let culprits: BTreeSet<String> = missing
                    .iter()
                    .filter(|m| blocked_set.satisfies(m))
                    .cloned()
                    .collect();
                if culprits.is_empty() {
                    still.push((entry, missing));
                    continue;
                }
                self.reject(
                    &entry.code,
                    format!("depends on unscheduled prerequisite(s) {}", join(culprits)),
                );
                blocked.push(entry.code);
                progressed = true;
            }

            remaining = still;
            if !progressed {
                break;
            }
        }

        let cycle: Vec<String> = remaining.iter().map(|(p, _)| p.code.clone()).collect();
        for (entry, _) in remaining {
            self.reject(
                &entry.code,
                format!("prerequisite cycle involving {}", cycle.join(", ")),
            );
        }
    }

    fn finish(self) -> ScheduleOutcome {
        let total_credits: Decimal = self.loads.values().map(|l| l.credits).sum();
        let assignments: BTreeMap<SemesterKey, Vec<String>> = self
            .loads
            .into_iter()
            .filter(|(_, load)| !load.codes.is_empty())
            .map(|(key, load)| (key, load.codes))
            .collect();

        tracing::info!(
            semesters = assignments.len(),
            placed = self.placed.len(),
            infeasible = self.infeasible.len(),
            %total_credits,
            "schedule generated"
        );

        ScheduleOutcome {
            assignments,
            total_credits,
            infeasible: self.infeasible,
            fluff: self.fluff,
            exempted: self.exempted,
            exchange: self.exchange,
        }
    }
}

fn join(codes: BTreeSet<String>) -> String {
    codes.into_iter().collect::<Vec<_>>().join(", ")
}
