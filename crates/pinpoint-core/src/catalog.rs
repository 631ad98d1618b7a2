//! The catalog collaborator: which packages exist, their versions, and what
//! each version depends on.
//!
//! The resolver only reads through the [`Catalog`] trait. [`InMemoryCatalog`]
//! is a complete implementation backed by a snapshot that can be loaded from
//! TOML or JSON:
//!
//! ```toml
//! [[version]]
//! name = "forms"
//! version = "1.0.1"
//! earliest-compatible-version = "1.0.0"
//!
//! [version.dependencies]
//! sparkle = "2.1.0"
//! jquery-widgets = { constraint = "1.0.0", archs = ["web"] }
//!
//! [forgotten-ecvs.sparkle]
//! "2.0.5" = "2.0.0"
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use pinpoint_util::errors::{PinpointError, PinpointResult};
use semver::Version;
use serde::{Deserialize, Serialize};

use crate::version::parse_version;

/// Read access to package metadata.
pub trait Catalog {
    /// Names of every package the catalog knows.
    fn all_unit_names(&self) -> Vec<String>;

    /// Versions of `name`, ascending in semantic-version order.
    fn sorted_versions(&self, name: &str) -> Vec<String>;

    fn unit_metadata(&self, name: &str, version: &str) -> Option<UnitMetadata>;

    /// Earliest compatible versions of versions of `name` that are not
    /// themselves selectable (e.g. overridden by a local package), keyed by
    /// version.
    fn forgotten_ecvs(&self, _name: &str) -> BTreeMap<String, String> {
        BTreeMap::new()
    }
}

/// What a catalog records about one package version.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnitMetadata {
    pub earliest_compatible_version: Option<String>,
    pub dependencies: Vec<DependencySpec>,
}

/// A dependency of a package version on another package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencySpec {
    pub name: String,
    /// Constraint string; `None` admits any version.
    pub constraint: Option<String>,
    /// A weak dependency only constrains the target if something else pulls
    /// it in.
    pub weak: bool,
    /// Architectures the dependency applies to. `None` means all of them.
    pub archs: Option<Vec<String>>,
}

impl DependencySpec {
    pub fn new(name: impl Into<String>, constraint: Option<&str>) -> Self {
        Self {
            name: name.into(),
            constraint: constraint
                .filter(|c| !c.is_empty() && *c != "none")
                .map(str::to_string),
            weak: false,
            archs: None,
        }
    }

    pub fn weak(mut self) -> Self {
        self.weak = true;
        self
    }

    pub fn with_archs(mut self, archs: &[&str]) -> Self {
        self.archs = Some(archs.iter().map(|a| a.to_string()).collect());
        self
    }
}

/// Serialized catalog snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CatalogSnapshot {
    #[serde(default, rename = "version")]
    pub versions: Vec<VersionRecord>,
    #[serde(default)]
    pub forgotten_ecvs: BTreeMap<String, BTreeMap<String, String>>,
}

/// One `[[version]]` entry of a snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct VersionRecord {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub earliest_compatible_version: Option<String>,
    #[serde(default)]
    pub dependencies: BTreeMap<String, DependencyDecl>,
}

/// A dependency declaration: either a bare constraint string or a table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DependencyDecl {
    Short(String),
    Detailed(DetailedDependency),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DetailedDependency {
    #[serde(default)]
    pub constraint: Option<String>,
    #[serde(default)]
    pub weak: bool,
    #[serde(default)]
    pub archs: Option<Vec<String>>,
}

impl DependencyDecl {
    fn into_spec(self, name: String) -> DependencySpec {
        match self {
            DependencyDecl::Short(c) => DependencySpec::new(name, Some(&c)),
            DependencyDecl::Detailed(d) => {
                let mut spec = DependencySpec::new(name, d.constraint.as_deref());
                spec.weak = d.weak;
                spec.archs = d.archs;
                spec
            }
        }
    }
}

#[derive(Debug, Clone)]
struct CatalogVersion {
    version: Version,
    raw: String,
    metadata: UnitMetadata,
}

/// A catalog held entirely in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    packages: BTreeMap<String, Vec<CatalogVersion>>,
    forgotten_ecvs: BTreeMap<String, BTreeMap<String, String>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a package version. Versions may be added in any order; adding
    /// the same version twice (ignoring build metadata) is an error.
    pub fn add_version(
        &mut self,
        name: &str,
        version: &str,
        metadata: UnitMetadata,
    ) -> PinpointResult<()> {
        let parsed = parse_version(version)?;
        let versions = self.packages.entry(name.to_string()).or_default();
        match versions.binary_search_by(|v| v.version.cmp(&parsed)) {
            Ok(_) => Err(PinpointError::Catalog {
                message: format!("{name}@{version} is listed twice"),
            }),
            Err(pos) => {
                versions.insert(
                    pos,
                    CatalogVersion {
                        version: parsed,
                        raw: version.to_string(),
                        metadata,
                    },
                );
                Ok(())
            }
        }
    }

    /// Builder form of [`add_version`](Self::add_version) taking
    /// `(dependency, constraint)` pairs; an empty constraint admits any
    /// version.
    pub fn with_version(
        mut self,
        name: &str,
        version: &str,
        dependencies: &[(&str, &str)],
    ) -> PinpointResult<Self> {
        let metadata = UnitMetadata {
            earliest_compatible_version: None,
            dependencies: dependencies
                .iter()
                .map(|(dep, constraint)| DependencySpec::new(*dep, Some(*constraint)))
                .collect(),
        };
        self.add_version(name, version, metadata)?;
        Ok(self)
    }

    pub fn add_forgotten_ecv(&mut self, name: &str, version: &str, ecv: &str) {
        self.forgotten_ecvs
            .entry(name.to_string())
            .or_default()
            .insert(version.to_string(), ecv.to_string());
    }

    pub fn from_snapshot(snapshot: CatalogSnapshot) -> PinpointResult<Self> {
        let mut catalog = Self::new();
        for record in snapshot.versions {
            let metadata = UnitMetadata {
                earliest_compatible_version: record.earliest_compatible_version,
                dependencies: record
                    .dependencies
                    .into_iter()
                    .map(|(name, decl)| decl.into_spec(name))
                    .collect(),
            };
            catalog.add_version(&record.name, &record.version, metadata)?;
        }
        catalog.forgotten_ecvs = snapshot.forgotten_ecvs;
        Ok(catalog)
    }

    pub fn from_toml_str(content: &str) -> PinpointResult<Self> {
        let snapshot: CatalogSnapshot =
            toml::from_str(content).map_err(|e| PinpointError::Catalog {
                message: format!("Failed to parse catalog: {e}"),
            })?;
        Self::from_snapshot(snapshot)
    }

    pub fn from_json_str(content: &str) -> PinpointResult<Self> {
        let snapshot: CatalogSnapshot =
            serde_json::from_str(content).map_err(|e| PinpointError::Catalog {
                message: format!("Failed to parse catalog: {e}"),
            })?;
        Self::from_snapshot(snapshot)
    }

    /// Load a snapshot file; `.json` files are read as JSON, anything else
    /// as TOML.
    pub fn from_path(path: &Path) -> PinpointResult<Self> {
        let content = std::fs::read_to_string(path)?;
        tracing::debug!("Loading catalog snapshot from {}", path.display());
        if path.extension().is_some_and(|ext| ext == "json") {
            Self::from_json_str(&content)
        } else {
            Self::from_toml_str(&content)
        }
    }

    fn find(&self, name: &str, version: &str) -> Option<&CatalogVersion> {
        let parsed = parse_version(version).ok()?;
        let versions = self.packages.get(name)?;
        versions
            .binary_search_by(|v| v.version.cmp(&parsed))
            .ok()
            .map(|pos| &versions[pos])
    }
}

impl Catalog for InMemoryCatalog {
    fn all_unit_names(&self) -> Vec<String> {
        self.packages.keys().cloned().collect()
    }

    fn sorted_versions(&self, name: &str) -> Vec<String> {
        self.packages
            .get(name)
            .map(|versions| versions.iter().map(|v| v.raw.clone()).collect())
            .unwrap_or_default()
    }

    fn unit_metadata(&self, name: &str, version: &str) -> Option<UnitMetadata> {
        self.find(name, version).map(|v| v.metadata.clone())
    }

    fn forgotten_ecvs(&self, name: &str) -> BTreeMap<String, String> {
        self.forgotten_ecvs.get(name).cloned().unwrap_or_default()
    }
}
