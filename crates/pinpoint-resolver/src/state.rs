//! Search-tree nodes.
//!
//! A [`ResolverState`] is an immutable partial assignment. Every transition
//! returns a new state; the maps are persistent (`im`), so sibling states
//! share almost all of their structure and branching stays cheap.

use std::fmt;
use std::sync::Arc;

use im::{OrdMap, OrdSet, Vector};
use pinpoint_util::errors::PinpointError;
use semver::Version;

use crate::conflict::ConflictReport;
use crate::index::{CatalogIndex, ConstraintId, UnitId, UnitVersionId};

/// A constraint recorded against a unit, with the unit version that
/// introduced it (`None` for top-level constraints).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConstraintEntry {
    pub constraint: ConstraintId,
    pub origin: Option<UnitVersionId>,
}

/// Why a state is a dead end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    UnknownUnit(String),
    Conflict(ConflictReport),
}

impl fmt::Display for StateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateError::UnknownUnit(name) => write!(f, "unknown unit: {name}"),
            StateError::Conflict(report) => report.fmt(f),
        }
    }
}

impl From<StateError> for PinpointError {
    fn from(err: StateError) -> Self {
        match err {
            StateError::UnknownUnit(name) => PinpointError::UnknownUnit { name },
            StateError::Conflict(report) => PinpointError::Resolution {
                message: report.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ResolverState {
    choices: OrdMap<UnitId, UnitVersionId>,
    pending: OrdSet<UnitId>,
    constraints: OrdMap<UnitId, Vector<ConstraintEntry>>,
    error: Option<Arc<StateError>>,
}

impl ResolverState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn choices(&self) -> &OrdMap<UnitId, UnitVersionId> {
        &self.choices
    }

    pub fn choice(&self, unit: UnitId) -> Option<UnitVersionId> {
        self.choices.get(&unit).copied()
    }

    pub fn choice_count(&self) -> usize {
        self.choices.len()
    }

    /// Units required but not yet assigned, in id order.
    pub fn pending(&self) -> impl Iterator<Item = UnitId> + '_ {
        self.pending.iter().copied()
    }

    pub fn error(&self) -> Option<&StateError> {
        self.error.as_deref()
    }

    /// No pending units and no error.
    pub fn success(&self) -> bool {
        self.error.is_none() && self.pending.is_empty()
    }

    pub fn constraints_on(&self, unit: UnitId) -> impl Iterator<Item = ConstraintEntry> + '_ {
        self.constraints
            .get(&unit)
            .into_iter()
            .flat_map(|entries| entries.iter().copied())
    }

    pub fn is_constrained(&self, unit: UnitId) -> bool {
        self.constraints.get(&unit).is_some_and(|entries| !entries.is_empty())
    }

    /// Whether `uv` satisfies every constraint recorded against its unit.
    pub fn admits(&self, index: &CatalogIndex, uv: UnitVersionId) -> bool {
        let unit = index.unit_version(uv).unit;
        self.constraints_on(unit)
            .all(|entry| index.is_satisfied(entry.constraint, uv))
    }

    /// Versions of `unit` admitted by the recorded constraints, ascending.
    pub fn candidates(&self, index: &CatalogIndex, unit: UnitId) -> Vec<UnitVersionId> {
        index
            .versions_of(unit)
            .iter()
            .copied()
            .filter(|&uv| self.admits(index, uv))
            .collect()
    }

    /// Lowest version named by any constraint recorded against `unit`.
    pub fn minimal_version<'i>(&self, index: &'i CatalogIndex, unit: UnitId) -> Option<&'i Version> {
        self.constraints_on(unit)
            .flat_map(|entry| {
                index
                    .constraint(entry.constraint)
                    .version_constraint
                    .alternatives()
                    .iter()
                    .map(|alt| &alt.version)
            })
            .min()
    }

    /// Record a constraint. Fails when the unit is unknown, when the unit is
    /// already chosen at a version the constraint rejects, or when the unit
    /// is pending and no version is left.
    pub fn add_constraint(
        &self,
        index: &CatalogIndex,
        constraint: ConstraintId,
        origin: Option<UnitVersionId>,
    ) -> Self {
        if self.error.is_some() {
            return self.clone();
        }
        let unit = index.constraint(constraint).unit;
        if !index.is_known(unit) {
            return self
                .clone()
                .fail(StateError::UnknownUnit(index.unit_name(unit).to_string()));
        }

        let mut next = self.clone();
        let entry = ConstraintEntry { constraint, origin };
        let mut entries = next.constraints.get(&unit).cloned().unwrap_or_default();
        if !entries.contains(&entry) {
            entries.push_back(entry);
        }
        next.constraints.insert(unit, entries);

        if let Some(chosen) = next.choice(unit) {
            if !index.is_satisfied(constraint, chosen) {
                return next.conflict(index, unit);
            }
        } else if next.pending.contains(&unit) && next.candidates(index, unit).is_empty() {
            return next.conflict(index, unit);
        }
        next
    }

    /// Mark `unit` as needing a version. No-op if it is chosen or pending.
    pub fn add_dependency(&self, index: &CatalogIndex, unit: UnitId) -> Self {
        if self.error.is_some() || self.choices.contains_key(&unit) || self.pending.contains(&unit) {
            return self.clone();
        }
        if !index.is_known(unit) {
            return self
                .clone()
                .fail(StateError::UnknownUnit(index.unit_name(unit).to_string()));
        }

        let mut next = self.clone();
        next.pending.insert(unit);
        if next.candidates(index, unit).is_empty() {
            return next.conflict(index, unit);
        }
        next
    }

    /// Pin `uv`'s unit to `uv`, then record its constraints and its
    /// dependencies.
    pub fn add_choice(&self, index: &CatalogIndex, uv: UnitVersionId) -> Self {
        if self.error.is_some() {
            return self.clone();
        }
        let unit_version = index.unit_version(uv);
        let unit = unit_version.unit;

        let mut next = self.clone();
        let previous = next.choices.insert(unit, uv);
        next.pending.remove(&unit);
        if previous.is_some_and(|prev| prev != uv) || !self.admits(index, uv) {
            return next.conflict(index, unit);
        }

        for &constraint in unit_version.constraints() {
            next = next.add_constraint(index, constraint, Some(uv));
            if next.error.is_some() {
                return next;
            }
        }
        for &dependency in unit_version.dependencies() {
            next = next.add_dependency(index, dependency);
            if next.error.is_some() {
                return next;
            }
        }
        next
    }

    /// Dead-end report for `unit` built from what this state recorded.
    pub fn conflict_report(&self, index: &CatalogIndex, unit: UnitId) -> ConflictReport {
        ConflictReport::for_unit(
            index,
            unit,
            self.choice(unit),
            self.constraints_on(unit).map(|e| (e.constraint, e.origin)),
        )
    }

    fn conflict(self, index: &CatalogIndex, unit: UnitId) -> Self {
        let report = self.conflict_report(index, unit);
        self.fail(StateError::Conflict(report))
    }

    fn fail(mut self, error: StateError) -> Self {
        tracing::trace!("dead end: {error}");
        self.error = Some(Arc::new(error));
        self
    }
}
