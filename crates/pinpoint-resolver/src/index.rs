//! The catalog index: every unit version and constraint the resolver works
//! with, each created exactly once and referred to by id afterwards.
//!
//! Ids are dense indexes into the index's arenas, so comparing two ids is the
//! same as comparing the identity of the objects they name. The index is
//! add-only; nothing is ever removed during its lifetime.

use std::collections::HashMap;
use std::fmt;

use pinpoint_core::constraint::VersionConstraint;
use pinpoint_core::version::parse_version;
use pinpoint_util::errors::{PinpointError, PinpointResult};
use semver::Version;

/// Identity of a unit (a package, or one architecture of a package).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UnitId(u32);

/// Identity of one published version of one unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UnitVersionId(u32);

/// Identity of an interned constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConstraintId(u32);

impl UnitId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

impl UnitVersionId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

impl ConstraintId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// One published version of a unit, with what it requires.
#[derive(Debug, Clone)]
pub struct UnitVersion {
    pub unit: UnitId,
    pub name: String,
    pub version: Version,
    pub earliest_compatible_version: Version,
    dependencies: Vec<UnitId>,
    constraints: Vec<ConstraintId>,
}

impl UnitVersion {
    /// Units this version needs resolved alongside it.
    pub fn dependencies(&self) -> &[UnitId] {
        &self.dependencies
    }

    /// Constraints this version places on other units.
    pub fn constraints(&self) -> &[ConstraintId] {
        &self.constraints
    }
}

impl fmt::Display for UnitVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.version)
    }
}

/// A requirement that the chosen version of `unit` satisfy
/// `version_constraint`.
#[derive(Debug, Clone)]
pub struct Constraint {
    pub unit: UnitId,
    pub name: String,
    pub version_constraint: VersionConstraint,
}

impl Constraint {
    pub fn exact_version(&self) -> Option<&Version> {
        self.version_constraint.exact_version()
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.version_constraint)
    }
}

#[derive(Debug, Default)]
struct UnitEntry {
    name: String,
    /// Ascending by version.
    versions: Vec<UnitVersionId>,
    by_version: HashMap<Version, UnitVersionId>,
    /// ECVs of versions referenced by constraints but not selectable.
    extra_ecvs: HashMap<Version, Version>,
}

/// Registry of units, unit versions and constraints.
#[derive(Debug, Default)]
pub struct CatalogIndex {
    unit_ids: HashMap<String, UnitId>,
    units: Vec<UnitEntry>,
    unit_versions: Vec<UnitVersion>,
    constraint_ids: HashMap<(String, String), ConstraintId>,
    constraints: Vec<Constraint>,
}

impl CatalogIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the id of `name`, registering the unit if it is new. A unit can
    /// exist without versions; such a unit is unknown to the catalog.
    pub fn intern_unit(&mut self, name: &str) -> UnitId {
        if let Some(&id) = self.unit_ids.get(name) {
            return id;
        }
        let id = UnitId(self.units.len() as u32);
        self.units.push(UnitEntry {
            name: name.to_string(),
            ..UnitEntry::default()
        });
        self.unit_ids.insert(name.to_string(), id);
        id
    }

    pub fn unit_id(&self, name: &str) -> Option<UnitId> {
        self.unit_ids.get(name).copied()
    }

    pub fn unit_name(&self, unit: UnitId) -> &str {
        &self.units[unit.index()].name
    }

    /// Whether the catalog has at least one version of `unit`.
    pub fn is_known(&self, unit: UnitId) -> bool {
        !self.units[unit.index()].versions.is_empty()
    }

    /// Register a unit version.
    ///
    /// Versions of a unit must arrive in strictly ascending order, each
    /// exactly once; anything else means the catalog feed is inconsistent.
    pub fn add_unit_version(
        &mut self,
        name: &str,
        version: &str,
        earliest_compatible_version: &str,
    ) -> PinpointResult<UnitVersionId> {
        let version = parse_version(version)?;
        let earliest_compatible_version = parse_version(earliest_compatible_version)?;
        let unit = self.intern_unit(name);

        let entry = &self.units[unit.index()];
        if entry.by_version.contains_key(&version) {
            return Err(PinpointError::Catalog {
                message: format!("unit version {name}@{version} was already added"),
            });
        }
        if let Some(&last) = entry.versions.last() {
            let last = &self.unit_versions[last.index()].version;
            if *last > version {
                return Err(PinpointError::Catalog {
                    message: format!(
                        "{name}@{version} added after {name}@{last}; versions must be added in ascending order"
                    ),
                });
            }
        }

        let id = UnitVersionId(self.unit_versions.len() as u32);
        self.unit_versions.push(UnitVersion {
            unit,
            name: name.to_string(),
            version: version.clone(),
            earliest_compatible_version,
            dependencies: Vec::new(),
            constraints: Vec::new(),
        });
        let entry = &mut self.units[unit.index()];
        entry.versions.push(id);
        entry.by_version.insert(version, id);
        Ok(id)
    }

    /// Declare that `uv` needs `dependency` resolved.
    pub fn add_dependency(&mut self, uv: UnitVersionId, dependency: &str) -> PinpointResult<()> {
        let unit = self.intern_unit(dependency);
        let entry = &mut self.unit_versions[uv.index()];
        if entry.dependencies.contains(&unit) {
            return Err(PinpointError::Catalog {
                message: format!("{entry} already depends on {dependency}"),
            });
        }
        entry.dependencies.push(unit);
        Ok(())
    }

    /// Attach a constraint to `uv`.
    pub fn add_constraint(&mut self, uv: UnitVersionId, constraint: ConstraintId) -> PinpointResult<()> {
        let entry = &mut self.unit_versions[uv.index()];
        if entry.constraints.contains(&constraint) {
            let constraint = &self.constraints[constraint.index()];
            return Err(PinpointError::Catalog {
                message: format!("{entry} already carries constraint {constraint}"),
            });
        }
        entry.constraints.push(constraint);
        Ok(())
    }

    pub fn unit_version(&self, id: UnitVersionId) -> &UnitVersion {
        &self.unit_versions[id.index()]
    }

    /// Exact lookup of `name` at `version` (build metadata ignored).
    pub fn get_unit_version(&self, name: &str, version: &str) -> Option<UnitVersionId> {
        let unit = self.unit_id(name)?;
        let version = parse_version(version).ok()?;
        self.units[unit.index()].by_version.get(&version).copied()
    }

    /// All versions of `unit`, ascending.
    pub fn versions_of(&self, unit: UnitId) -> &[UnitVersionId] {
        &self.units[unit.index()].versions
    }

    pub fn latest_version(&self, unit: UnitId) -> Option<UnitVersionId> {
        self.versions_of(unit).last().copied()
    }

    /// Get the interned constraint for `name@version_constraint`, creating it
    /// on first use. Returns `None` for constraints that admit anything
    /// (`""` and `"none"`).
    pub fn get_constraint(
        &mut self,
        name: &str,
        version_constraint: &str,
    ) -> PinpointResult<Option<ConstraintId>> {
        let key = (name.to_string(), version_constraint.trim().to_string());
        if let Some(&id) = self.constraint_ids.get(&key) {
            return Ok(Some(id));
        }
        let Some(parsed) = VersionConstraint::parse(version_constraint)? else {
            return Ok(None);
        };

        let unit = self.intern_unit(name);
        let id = ConstraintId(self.constraints.len() as u32);
        self.constraints.push(Constraint {
            unit,
            name: name.to_string(),
            version_constraint: parsed,
        });
        self.constraint_ids.insert(key, id);
        Ok(Some(id))
    }

    pub fn constraint(&self, id: ConstraintId) -> &Constraint {
        &self.constraints[id.index()]
    }

    /// Record the ECV of a version that is referenced by constraints but is
    /// not itself selectable.
    pub fn add_extra_earliest_compatible_version(
        &mut self,
        name: &str,
        version: &str,
        earliest_compatible_version: &str,
    ) -> PinpointResult<()> {
        let version = parse_version(version)?;
        let ecv = parse_version(earliest_compatible_version)?;
        let unit = self.intern_unit(name);
        self.units[unit.index()].extra_ecvs.insert(version, ecv);
        Ok(())
    }

    /// The ECV of `unit` at `version`: the selectable version's own ECV
    /// first, then the auxiliary table.
    pub fn earliest_compatible_version(&self, unit: UnitId, version: &Version) -> Option<&Version> {
        let entry = &self.units[unit.index()];
        entry
            .by_version
            .get(version)
            .map(|&id| &self.unit_versions[id.index()].earliest_compatible_version)
            .or_else(|| entry.extra_ecvs.get(version))
    }

    /// Whether `candidate` satisfies `constraint`. A constraint never matches
    /// versions of a different unit.
    pub fn is_satisfied(&self, constraint: ConstraintId, candidate: UnitVersionId) -> bool {
        let constraint = self.constraint(constraint);
        let candidate = self.unit_version(candidate);
        if constraint.unit != candidate.unit {
            return false;
        }
        constraint
            .version_constraint
            .alternatives()
            .iter()
            .any(|alt| {
                alt.is_satisfied_by(
                    &candidate.version,
                    &candidate.earliest_compatible_version,
                    self.earliest_compatible_version(constraint.unit, &alt.version),
                )
            })
    }

    /// Some version satisfying `constraint`: a direct lookup for exact pins,
    /// otherwise the lowest satisfying version.
    pub fn get_satisfying_unit_version(&self, constraint: ConstraintId) -> Option<UnitVersionId> {
        let c = self.constraint(constraint);
        if let Some(version) = c.exact_version() {
            return self.units[c.unit.index()].by_version.get(version).copied();
        }
        self.versions_of(c.unit)
            .iter()
            .copied()
            .find(|&uv| self.is_satisfied(constraint, uv))
    }
}
