//! Best-first backtracking search over [`ResolverState`]s.
//!
//! The driver keeps a priority queue of states keyed by
//! `combine(cost(state), estimate(state))`. Each expansion picks the pending
//! unit with the highest priority weight and branches on every version of it
//! that does not immediately conflict. Units whose every candidate fails get
//! their weight bumped so they are tried earlier along other branches.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::fmt;

use im::OrdMap;
use pinpoint_core::version::is_prerelease;
use pinpoint_util::errors::{PinpointError, PinpointResult};

use crate::graph::SolutionGraph;
use crate::index::{CatalogIndex, ConstraintId, UnitId, UnitVersionId};
use crate::queue::PriorityQueue;
use crate::state::{ResolverState, StateError};

/// A search cost. Costs are compared with `PartialOrd`; lower is better.
pub trait Cost: Clone + PartialOrd + fmt::Debug {
    fn zero() -> Self;

    /// Default way to join a state's cost with its estimate.
    fn combine(&self, other: &Self) -> Self;
}

impl Cost for f64 {
    fn zero() -> Self {
        0.0
    }

    fn combine(&self, other: &Self) -> Self {
        self + other
    }
}

type CostFn<'a, C> = Box<dyn Fn(&ResolverState) -> C + 'a>;
type CombineFn<'a, C> = Box<dyn Fn(&C, &C) -> C + 'a>;
type NudgeFn<'a> = Box<dyn FnMut(u64) -> PinpointResult<()> + 'a>;

/// Knobs of a single [`resolve`] call.
pub struct ResolveOptions<'a, C: Cost = f64> {
    cost: CostFn<'a, C>,
    estimate: CostFn<'a, C>,
    combine: CombineFn<'a, C>,
    nudge: Option<NudgeFn<'a>>,
    root_priority: u32,
    priority_step: u32,
    use_rcs: bool,
}

impl<'a> ResolveOptions<'a, f64> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<'a, C: Cost> Default for ResolveOptions<'a, C> {
    fn default() -> Self {
        Self {
            cost: Box::new(|_| C::zero()),
            estimate: Box::new(|_| C::zero()),
            combine: Box::new(|a, b| a.combine(b)),
            nudge: None,
            root_priority: 100,
            priority_step: 1,
            use_rcs: false,
        }
    }
}

impl<'a, C: Cost> ResolveOptions<'a, C> {
    /// Cost of the choices a state has made so far.
    pub fn with_cost(mut self, cost: impl Fn(&ResolverState) -> C + 'a) -> Self {
        self.cost = Box::new(cost);
        self
    }

    /// Estimated cost of the choices a state still has to make.
    pub fn with_estimate(mut self, estimate: impl Fn(&ResolverState) -> C + 'a) -> Self {
        self.estimate = Box::new(estimate);
        self
    }

    pub fn with_combine(mut self, combine: impl Fn(&C, &C) -> C + 'a) -> Self {
        self.combine = Box::new(combine);
        self
    }

    /// Callback run once per loop iteration with the iteration count. An
    /// error aborts the search and is returned as is.
    pub fn with_nudge(mut self, nudge: impl FnMut(u64) -> PinpointResult<()> + 'a) -> Self {
        self.nudge = Some(Box::new(nudge));
        self
    }

    pub fn with_root_priority(mut self, root_priority: u32) -> Self {
        self.root_priority = root_priority;
        self
    }

    pub fn with_priority_step(mut self, priority_step: u32) -> Self {
        self.priority_step = priority_step;
        self
    }

    /// Let unconstrained units pick pre-release versions.
    pub fn with_rcs(mut self, use_rcs: bool) -> Self {
        self.use_rcs = use_rcs;
        self
    }

    fn key(&self, state: &ResolverState) -> C {
        (self.combine)(&(self.cost)(state), &(self.estimate)(state))
    }
}

/// A complete assignment of versions to units.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Solution {
    choices: OrdMap<UnitId, UnitVersionId>,
}

impl Solution {
    pub fn get(&self, unit: UnitId) -> Option<UnitVersionId> {
        self.choices.get(&unit).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (UnitId, UnitVersionId)> + '_ {
        self.choices.iter().map(|(&unit, &uv)| (unit, uv))
    }

    pub fn unit_versions(&self) -> impl Iterator<Item = UnitVersionId> + '_ {
        self.choices.values().copied()
    }

    pub fn len(&self) -> usize {
        self.choices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.choices.is_empty()
    }

    /// `unit name -> version` for display and serialisation.
    pub fn to_version_map(&self, index: &CatalogIndex) -> BTreeMap<String, String> {
        self.unit_versions()
            .map(|uv| {
                let uv = index.unit_version(uv);
                (uv.name.clone(), uv.version.to_string())
            })
            .collect()
    }
}

impl From<OrdMap<UnitId, UnitVersionId>> for Solution {
    fn from(choices: OrdMap<UnitId, UnitVersionId>) -> Self {
        Self { choices }
    }
}

/// Find versions for `dependencies` (unit names) and everything they pull in,
/// honouring `constraints`.
///
/// Fails with [`PinpointError::UnknownUnit`] or [`PinpointError::Resolution`]
/// for ordinary failures. Any error returned by the nudge callback is passed
/// through.
pub fn resolve<C, S>(
    index: &CatalogIndex,
    dependencies: &[S],
    constraints: &[ConstraintId],
    mut options: ResolveOptions<'_, C>,
) -> PinpointResult<Solution>
where
    C: Cost,
    S: AsRef<str>,
{
    let mut priority: HashMap<UnitId, u32> = HashMap::new();
    let mut state = ResolverState::new();

    let mut seen_constraints = HashSet::new();
    for &constraint in constraints {
        if seen_constraints.insert(constraint) {
            state = state.add_constraint(index, constraint, None);
        }
    }
    for name in dependencies {
        let name = name.as_ref();
        let Some(unit) = index.unit_id(name) else {
            return Err(StateError::UnknownUnit(name.to_string()).into());
        };
        if priority.insert(unit, options.root_priority).is_none() {
            state = state.add_dependency(index, unit);
        }
    }

    let state = pin_exact_dependencies(index, state);

    if let Some(err) = state.error() {
        tracing::debug!("start state is a dead end: {err}");
        return Err(err.clone().into());
    }
    if state.success() {
        tracing::debug!("resolved from start state ({} choices)", state.choice_count());
        return finish(index, &state);
    }

    let mut queue = PriorityQueue::new();
    let key = options.key(&state);
    let choices = state.choice_count();
    queue.push(state, key, choices);

    let mut some_error: Option<StateError> = None;
    let mut iterations: u64 = 0;

    while let Some(state) = queue.pop() {
        iterations += 1;
        if let Some(nudge) = options.nudge.as_mut() {
            nudge(iterations)?;
        }

        if state.success() {
            tracing::debug!(
                "resolved after {iterations} iterations ({} choices)",
                state.choice_count()
            );
            return finish(index, &state);
        }

        let Some(unit) = next_unit(&state, &priority) else {
            continue;
        };

        let constrained = state.is_constrained(unit);
        let mut neighbors = Vec::new();
        let mut first_error = None;
        for candidate in state.candidates(index, unit) {
            if !options.use_rcs
                && !constrained
                && is_prerelease(&index.unit_version(candidate).version)
            {
                continue;
            }
            let next = state.add_choice(index, candidate);
            match next.error() {
                Some(err) => {
                    if first_error.is_none() {
                        first_error = Some(err.clone());
                    }
                }
                None => neighbors.push(next),
            }
        }

        if neighbors.is_empty() {
            let weight = priority.entry(unit).or_insert(0);
            *weight = weight.saturating_add(options.priority_step);
            tracing::trace!(
                "no candidate of {} fits; priority raised to {}",
                index.unit_name(unit),
                weight
            );
            some_error = Some(
                first_error
                    .unwrap_or_else(|| StateError::Conflict(state.conflict_report(index, unit))),
            );
            continue;
        }

        for neighbor in neighbors {
            let key = options.key(&neighbor);
            let choices = neighbor.choice_count();
            queue.push(neighbor, key, choices);
        }
    }

    tracing::debug!("search exhausted after {iterations} iterations");
    match some_error {
        Some(err) => Err(err.into()),
        None => Err(PinpointError::Internal {
            message: "search exhausted without recording a failure".to_string(),
        }),
    }
}

/// Choose every pending unit whose recorded constraints pin it to one
/// exact version, following the dependencies those choices add.
fn pin_exact_dependencies(index: &CatalogIndex, mut state: ResolverState) -> ResolverState {
    loop {
        if state.error().is_some() {
            return state;
        }
        let forced = state.pending().find_map(|unit| {
            state.constraints_on(unit).find_map(|entry| {
                index.constraint(entry.constraint).exact_version()?;
                index.get_satisfying_unit_version(entry.constraint)
            })
        });
        let Some(uv) = forced else {
            return state;
        };
        tracing::trace!("pinned {} from the start state", index.unit_version(uv));
        state = state.add_choice(index, uv);
    }
}

/// Pending unit with the highest weight; ties go to the lowest id.
fn next_unit(state: &ResolverState, priority: &HashMap<UnitId, u32>) -> Option<UnitId> {
    let mut best: Option<(UnitId, u32)> = None;
    for unit in state.pending() {
        let weight = priority.get(&unit).copied().unwrap_or(0);
        if best.map_or(true, |(_, w)| weight > w) {
            best = Some((unit, weight));
        }
    }
    best.map(|(unit, _)| unit)
}

fn finish(index: &CatalogIndex, state: &ResolverState) -> PinpointResult<Solution> {
    let solution = Solution::from(state.choices().clone());
    let violations = SolutionGraph::build(index, &solution).violations(index);
    if let Some(first) = violations.first() {
        return Err(PinpointError::Internal {
            message: format!("resolved assignment is inconsistent: {first}"),
        });
    }
    Ok(solution)
}

/// Expand exact constraints transitively without searching.
///
/// Each exact constraint pins its unit; the exact constraints the pinned
/// version places on its own dependencies are followed in turn. Inexact
/// constraints are ignored.
pub fn propagate_exact_dependencies(
    index: &CatalogIndex,
    constraints: &[ConstraintId],
) -> PinpointResult<Solution> {
    let mut choices: OrdMap<UnitId, UnitVersionId> = OrdMap::new();
    let mut queue: VecDeque<ConstraintId> = constraints
        .iter()
        .copied()
        .filter(|&c| index.constraint(c).exact_version().is_some())
        .collect();

    while let Some(constraint) = queue.pop_front() {
        let c = index.constraint(constraint);
        if !index.is_known(c.unit) {
            return Err(PinpointError::UnknownUnit {
                name: c.name.clone(),
            });
        }
        let Some(uv) = index.get_satisfying_unit_version(constraint) else {
            return Err(PinpointError::Resolution {
                message: format!("no version matches {c}"),
            });
        };
        match choices.get(&c.unit) {
            Some(&existing) if existing == uv => continue,
            Some(&existing) => {
                return Err(PinpointError::Resolution {
                    message: format!(
                        "{c} conflicts with {}",
                        index.unit_version(existing)
                    ),
                })
            }
            None => {}
        }
        choices.insert(c.unit, uv);

        let unit_version = index.unit_version(uv);
        queue.extend(unit_version.constraints().iter().copied().filter(|&dep| {
            let dep = index.constraint(dep);
            dep.exact_version().is_some() && unit_version.dependencies().contains(&dep.unit)
        }));
    }

    Ok(Solution::from(choices))
}
