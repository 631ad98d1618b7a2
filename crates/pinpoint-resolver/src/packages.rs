//! Package-level front end over the unit resolver.
//!
//! Each package version is split into one unit per configured architecture
//! (`name#arch`). Sibling units of one version pin each other to that
//! version, so a solution always carries a single version per package and
//! the `#arch` suffix can be dropped from the answer.

use std::cmp::Reverse;
use std::collections::{BTreeMap, HashSet, VecDeque};

use pinpoint_core::catalog::{Catalog, DependencySpec};
use pinpoint_core::config::ResolverConfig;
use pinpoint_core::constraint::VersionConstraint;
use pinpoint_core::version::{default_earliest_compatible_version, parse_version};
use pinpoint_util::errors::{PinpointError, PinpointResult};

use crate::index::{CatalogIndex, ConstraintId, UnitVersionId};
use crate::pricer::{magnitude_cost, VersionPricer};
use crate::resolver::{resolve, Cost, ResolveOptions, Solution};

/// A top-level constraint on a package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageConstraint {
    pub name: String,
    /// `None` admits any version.
    pub constraint: Option<String>,
}

impl PackageConstraint {
    pub fn new(name: impl Into<String>, constraint: &str) -> Self {
        let constraint = constraint.trim();
        Self {
            name: name.into(),
            constraint: (!constraint.is_empty() && constraint != "none")
                .then(|| constraint.to_string()),
        }
    }

    /// Parse `name@constraint`, e.g. `forms@=1.0.1`.
    pub fn parse(s: &str) -> PinpointResult<Self> {
        let Some((name, constraint)) = s.split_once('@') else {
            return Err(PinpointError::InvalidConstraint {
                constraint: s.to_string(),
                message: "expected `name@constraint`".to_string(),
            });
        };
        VersionConstraint::parse(constraint)?;
        Ok(Self::new(name.trim(), constraint))
    }
}

/// How candidate solutions are priced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Pricing {
    /// Lowest sum of version magnitudes wins.
    Magnitude,
    /// Latest root dependencies, conservative transitive ones, minimal churn
    /// against a previous solution.
    #[default]
    Tiered,
}

#[derive(Debug, Clone, Default)]
pub struct PackagesResolveOptions {
    /// Packages to move away from their previous version if possible.
    pub upgrade: Vec<String>,
    /// `package -> version` from an earlier run.
    pub previous_solution: BTreeMap<String, String>,
    pub pricing: Pricing,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackagesSolution {
    /// `package -> version`.
    pub answer: BTreeMap<String, String>,
    /// Whether pre-release candidates had to be enabled.
    pub used_rcs: bool,
}

/// Resolves packages from a [`Catalog`], loading package metadata into its
/// [`CatalogIndex`] on first use.
pub struct PackagesResolver<'c, C: Catalog + ?Sized> {
    catalog: &'c C,
    index: CatalogIndex,
    config: ResolverConfig,
    loaded: HashSet<String>,
    /// Set once a load fails; the index may then hold partial packages.
    broken: Option<String>,
}

impl<'c, C: Catalog + ?Sized> PackagesResolver<'c, C> {
    pub fn new(catalog: &'c C) -> Self {
        Self::with_config(catalog, ResolverConfig::default())
    }

    pub fn with_config(catalog: &'c C, config: ResolverConfig) -> Self {
        Self {
            catalog,
            index: CatalogIndex::new(),
            config,
            loaded: HashSet::new(),
            broken: None,
        }
    }

    pub fn index(&self) -> &CatalogIndex {
        &self.index
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Load `package` and, breadth first, every package it can reach. Each
    /// package is loaded at most once.
    ///
    /// A failed load leaves the index incomplete, so every later call fails
    /// with the same catalog error.
    pub fn ensure_loaded(&mut self, package: &str) -> PinpointResult<()> {
        if let Some(message) = &self.broken {
            return Err(PinpointError::Catalog {
                message: format!("catalog failed to load earlier: {message}"),
            });
        }
        let mut queue = VecDeque::new();
        if self.loaded.insert(package.to_string()) {
            queue.push_back(package.to_string());
        }
        while let Some(next) = queue.pop_front() {
            if let Err(err) = self.load_package(&next, &mut queue) {
                tracing::warn!("Failed to load {next}: {err}");
                self.broken = Some(err.to_string());
                return Err(err);
            }
        }
        Ok(())
    }

    fn load_package(
        &mut self,
        package: &str,
        queue: &mut VecDeque<String>,
    ) -> PinpointResult<()> {
        let versions = self.catalog.sorted_versions(package);
        tracing::debug!("Loading {} version(s) of {package}", versions.len());

        for version in &versions {
            let metadata = self.catalog.unit_metadata(package, version).ok_or_else(|| {
                PinpointError::Catalog {
                    message: format!("{package}@{version} is listed without metadata"),
                }
            })?;
            let ecv = match metadata.earliest_compatible_version {
                Some(ecv) => ecv,
                None => {
                    default_earliest_compatible_version(&parse_version(version)?).to_string()
                }
            };

            let mut unibuilds: Vec<(&str, UnitVersionId)> = Vec::new();
            for arch in &self.config.architectures {
                let uv = self
                    .index
                    .add_unit_version(&unit_name(package, arch), version, &ecv)?;
                unibuilds.push((arch.as_str(), uv));
            }

            for dependency in &metadata.dependencies {
                if self.loaded.insert(dependency.name.clone()) {
                    queue.push_back(dependency.name.clone());
                }
                for arch in matching_archs(&self.config.architectures, package, dependency)? {
                    let Some(&(_, uv)) = unibuilds.iter().find(|(a, _)| *a == arch) else {
                        continue;
                    };
                    let target = unit_name(&dependency.name, arch);
                    if !dependency.weak {
                        self.index.add_dependency(uv, &target)?;
                    }
                    if let Some(constraint) = &dependency.constraint {
                        if let Some(c) = self.index.get_constraint(&target, constraint)? {
                            self.index.add_constraint(uv, c)?;
                        }
                    }
                }
            }

            let exact = format!("={version}");
            for &(arch, uv) in &unibuilds {
                for &(other, _) in &unibuilds {
                    if other == arch {
                        continue;
                    }
                    let sibling = unit_name(package, other);
                    if let Some(c) = self.index.get_constraint(&sibling, &exact)? {
                        self.index.add_constraint(uv, c)?;
                    }
                }
            }
        }

        for (version, ecv) in self.catalog.forgotten_ecvs(package) {
            for arch in &self.config.architectures {
                self.index.add_extra_earliest_compatible_version(
                    &unit_name(package, arch),
                    &version,
                    &ecv,
                )?;
            }
        }
        Ok(())
    }

    /// Resolve `dependencies` (package names) under `constraints`.
    ///
    /// With a previous solution and nothing to upgrade, the previous versions
    /// are tried as exact pins first. Then the plain request is tried, and
    /// finally (if enabled) the plain request with pre-release candidates.
    pub fn resolve<S: AsRef<str>>(
        &mut self,
        dependencies: &[S],
        constraints: &[PackageConstraint],
        options: &PackagesResolveOptions,
    ) -> PinpointResult<PackagesSolution> {
        for name in dependencies {
            self.ensure_loaded(name.as_ref())?;
        }
        for constraint in constraints {
            self.ensure_loaded(&constraint.name)?;
        }
        for package in options.previous_solution.keys() {
            self.ensure_loaded(package)?;
        }

        let unit_deps: Vec<String> = dependencies
            .iter()
            .flat_map(|name| self.units_for_package(name.as_ref()))
            .collect();
        let mut unit_constraints = Vec::new();
        for constraint in constraints {
            let Some(text) = &constraint.constraint else {
                continue;
            };
            for unit in self.units_for_package(&constraint.name) {
                if let Some(c) = self.index.get_constraint(&unit, text)? {
                    unit_constraints.push(c);
                }
            }
        }

        let previous: Vec<UnitVersionId> = options
            .previous_solution
            .iter()
            .flat_map(|(package, version)| {
                self.units_for_package(package)
                    .into_iter()
                    .filter_map(|unit| self.index.get_unit_version(&unit, version))
                    .collect::<Vec<_>>()
            })
            .collect();
        let upgrade: HashSet<&str> = options.upgrade.iter().map(String::as_str).collect();

        let mut locked = None;
        if !previous.is_empty() && upgrade.is_empty() {
            let mut with_locks = unit_constraints.clone();
            for &uv in &previous {
                let uv = self.index.unit_version(uv);
                let (name, exact) = (uv.name.clone(), format!("={}", uv.version));
                if let Some(c) = self.index.get_constraint(&name, &exact)? {
                    with_locks.push(c);
                }
            }
            locked = Some(with_locks);
        }

        let roots = unit_deps.iter().filter_map(|unit| self.index.unit_id(unit));
        let pricer = VersionPricer::new(&self.index, roots).with_previous_solution(
            previous
                .iter()
                .copied()
                .filter(|&uv| !upgrade.contains(package_name(&self.index.unit_version(uv).name))),
        );

        if let Some(with_locks) = locked {
            match self.run(&unit_deps, &with_locks, options.pricing, &pricer, false) {
                Ok(solution) => return Ok(self.to_package_solution(&solution, false)),
                Err(err) if err.is_resolution_failure() => {
                    tracing::debug!("Previous solution no longer fits, resolving afresh: {err}");
                }
                Err(err) => return Err(self.package_error(err)),
            }
        }

        match self.run(&unit_deps, &unit_constraints, options.pricing, &pricer, false) {
            Ok(solution) => Ok(self.to_package_solution(&solution, false)),
            Err(err) if err.is_resolution_failure() && self.config.prerelease_fallback => {
                tracing::debug!("Retrying with pre-release versions: {err}");
                self.run(&unit_deps, &unit_constraints, options.pricing, &pricer, true)
                    .map(|solution| self.to_package_solution(&solution, true))
                    .map_err(|err| self.package_error(err))
            }
            Err(err) => Err(self.package_error(err)),
        }
    }

    fn run(
        &self,
        dependencies: &[String],
        constraints: &[ConstraintId],
        pricing: Pricing,
        pricer: &VersionPricer<'_>,
        use_rcs: bool,
    ) -> PinpointResult<Solution> {
        let index = &self.index;
        match pricing {
            Pricing::Magnitude => {
                let options =
                    ResolveOptions::new().with_cost(move |state| magnitude_cost(index, state));
                resolve(index, dependencies, constraints, self.tune(options, use_rcs))
            }
            Pricing::Tiered => resolve(
                index,
                dependencies,
                constraints,
                self.tune(pricer.options(), use_rcs),
            ),
        }
    }

    fn tune<'a, K: Cost>(
        &self,
        options: ResolveOptions<'a, K>,
        use_rcs: bool,
    ) -> ResolveOptions<'a, K> {
        let options = options
            .with_root_priority(self.config.root_priority)
            .with_priority_step(self.config.priority_step)
            .with_rcs(use_rcs);
        match self.config.max_iterations {
            Some(max) => options.with_nudge(move |iteration| {
                if iteration > max {
                    Err(PinpointError::Interrupted {
                        message: format!("gave up after {max} iterations"),
                    })
                } else {
                    Ok(())
                }
            }),
            None => options,
        }
    }

    fn units_for_package(&self, package: &str) -> Vec<String> {
        self.config
            .architectures
            .iter()
            .map(|arch| unit_name(package, arch))
            .collect()
    }

    fn to_package_solution(&self, solution: &Solution, used_rcs: bool) -> PackagesSolution {
        let answer = solution
            .unit_versions()
            .map(|uv| {
                let uv = self.index.unit_version(uv);
                (package_name(&uv.name).to_string(), uv.version.to_string())
            })
            .collect();
        PackagesSolution { answer, used_rcs }
    }

    /// Rewrite unit names in an error to package names.
    fn package_error(&self, err: PinpointError) -> PinpointError {
        match err {
            PinpointError::UnknownUnit { name } => PinpointError::UnknownUnit {
                name: package_name(&name).to_string(),
            },
            PinpointError::Resolution { message } => PinpointError::Resolution {
                message: self.strip_archs(&message),
            },
            other => other,
        }
    }

    fn strip_archs(&self, text: &str) -> String {
        let mut archs: Vec<&String> = self.config.architectures.iter().collect();
        archs.sort_by_key(|arch| Reverse(arch.len()));
        archs
            .into_iter()
            .fold(text.to_string(), |text, arch| text.replace(&format!("#{arch}"), ""))
    }
}

fn unit_name(package: &str, arch: &str) -> String {
    format!("{package}#{arch}")
}

fn package_name(unit: &str) -> &str {
    unit.split_once('#').map_or(unit, |(package, _)| package)
}

/// Whether `arch` is `base` or one of its sub-architectures (`web` matches
/// `web.browser`).
fn arch_matches(arch: &str, base: &str) -> bool {
    arch.strip_prefix(base)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('.'))
}

/// Configured architectures a dependency applies to.
fn matching_archs<'a>(
    architectures: &'a [String],
    package: &str,
    dependency: &DependencySpec,
) -> PinpointResult<Vec<&'a str>> {
    let Some(refs) = &dependency.archs else {
        return Ok(architectures.iter().map(String::as_str).collect());
    };
    let matched: Vec<&str> = architectures
        .iter()
        .map(String::as_str)
        .filter(|arch| refs.iter().any(|base| arch_matches(arch, base)))
        .collect();
    if matched.is_empty() {
        return Err(PinpointError::Catalog {
            message: format!(
                "{package} depends on {} for non-standard architecture(s) {}",
                dependency.name,
                refs.join(", ")
            ),
        });
    }
    Ok(matched)
}
