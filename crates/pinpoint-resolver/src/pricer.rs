//! Cost functions for the search driver.
//!
//! [`magnitude_cost`] sums the magnitudes of every chosen version, which makes
//! the search pick the lowest versions that work. [`VersionPricer`] prices
//! states on four tiers compared lexicographically:
//!
//! 1. very major: downgrading or breaking a root dependency pinned by a
//!    previous solution;
//! 2. major: distance a root dependency moved forward from its previous
//!    version;
//! 3. medium: distance of a root dependency from its latest version;
//! 4. minor: changes to transitive dependencies, and how far each one sits
//!    above the most conservative version its constraints name.

use std::collections::{HashMap, HashSet};

use pinpoint_core::version::version_magnitude;
use semver::Version;

use crate::index::{CatalogIndex, UnitId, UnitVersionId};
use crate::resolver::{Cost, ResolveOptions};
use crate::state::ResolverState;

/// Estimated cost of a pending transitive dependency.
const TRANSITIVE_ESTIMATE: f64 = 10_000_000.0;

/// Four-tier cost: `[very major, major, medium, minor]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, PartialOrd)]
pub struct TieredCost(pub [f64; 4]);

impl TieredCost {
    pub const VERY_MAJOR: usize = 0;
    pub const MAJOR: usize = 1;
    pub const MEDIUM: usize = 2;
    pub const MINOR: usize = 3;
}

impl Cost for TieredCost {
    fn zero() -> Self {
        Self::default()
    }

    fn combine(&self, other: &Self) -> Self {
        let mut out = self.0;
        for (slot, extra) in out.iter_mut().zip(other.0) {
            *slot += extra;
        }
        Self(out)
    }
}

/// Sum of the magnitudes of every chosen version.
pub fn magnitude_cost(index: &CatalogIndex, state: &ResolverState) -> f64 {
    state
        .choices()
        .values()
        .map(|&uv| version_magnitude(&index.unit_version(uv).version))
        .sum()
}

/// Tiered pricing of states, relative to the root dependencies and an
/// optional previous solution.
pub struct VersionPricer<'i> {
    index: &'i CatalogIndex,
    roots: HashSet<UnitId>,
    previous: HashMap<UnitId, UnitVersionId>,
}

impl<'i> VersionPricer<'i> {
    pub fn new(index: &'i CatalogIndex, roots: impl IntoIterator<Item = UnitId>) -> Self {
        Self {
            index,
            roots: roots.into_iter().collect(),
            previous: HashMap::new(),
        }
    }

    /// Versions picked by a previous run. Leave out units that should be
    /// upgraded.
    pub fn with_previous_solution(
        mut self,
        previous: impl IntoIterator<Item = UnitVersionId>,
    ) -> Self {
        for uv in previous {
            self.previous.insert(self.index.unit_version(uv).unit, uv);
        }
        self
    }

    pub fn cost(&self, state: &ResolverState) -> TieredCost {
        let mut cost = [0.0; 4];

        for &uv in state.choices().values() {
            let uv = self.index.unit_version(uv);
            let magnitude = version_magnitude(&uv.version);
            let is_root = self.roots.contains(&uv.unit);

            if let Some(&prev) = self.previous.get(&uv.unit) {
                let prev = self.index.unit_version(prev);
                let distance = magnitude - version_magnitude(&prev.version);
                let compatible = prev.earliest_compatible_version == uv.earliest_compatible_version;
                if !is_root {
                    if distance != 0.0 {
                        cost[TieredCost::MINOR] += 1.0;
                    }
                } else if distance < 0.0 || !compatible {
                    cost[TieredCost::VERY_MAJOR] += 1.0;
                } else {
                    cost[TieredCost::MAJOR] += distance;
                }
            } else if is_root {
                cost[TieredCost::MEDIUM] += self.latest_magnitude(uv.unit) - magnitude;
            } else {
                let zero = Version::new(0, 0, 0);
                let minimal = state.minimal_version(self.index, uv.unit).unwrap_or(&zero);
                cost[TieredCost::MINOR] += magnitude - version_magnitude(minimal);
            }
        }

        TieredCost(cost)
    }

    pub fn estimate(&self, state: &ResolverState) -> TieredCost {
        let mut cost = [0.0; 4];

        for unit in state.pending() {
            if !self.roots.contains(&unit) {
                cost[TieredCost::MINOR] += TRANSITIVE_ESTIMATE;
                continue;
            }

            let candidates = state.candidates(self.index, unit);
            if let Some(&prev) = self.previous.get(&unit) {
                if state.admits(self.index, prev) {
                    continue;
                }
                let Some(&earliest) = candidates.first() else {
                    continue;
                };
                let prev = self.index.unit_version(prev);
                let earliest = self.index.unit_version(earliest);
                let distance =
                    version_magnitude(&earliest.version) - version_magnitude(&prev.version);
                if prev.earliest_compatible_version != earliest.earliest_compatible_version
                    || distance < 0.0
                {
                    cost[TieredCost::VERY_MAJOR] += 1.0;
                } else {
                    cost[TieredCost::MAJOR] += distance;
                }
            } else if let Some(&latest_matching) = candidates.last() {
                let latest_matching = &self.index.unit_version(latest_matching).version;
                cost[TieredCost::MEDIUM] +=
                    self.latest_magnitude(unit) - version_magnitude(latest_matching);
            }
        }

        TieredCost(cost)
    }

    /// Search options using this pricer's cost and estimate.
    pub fn options(&self) -> ResolveOptions<'_, TieredCost> {
        ResolveOptions::default()
            .with_cost(move |state| self.cost(state))
            .with_estimate(move |state| self.estimate(state))
    }

    fn latest_magnitude(&self, unit: UnitId) -> f64 {
        self.index
            .latest_version(unit)
            .map(|uv| version_magnitude(&self.index.unit_version(uv).version))
            .unwrap_or(0.0)
    }
}
