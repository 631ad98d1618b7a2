use pinpoint_util::errors::{PinpointError, PinpointResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Contents of a `pinpoint.toml` file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub resolver: ResolverConfig,
}

/// Resolver settings from `[resolver]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ResolverConfig {
    /// Architectures every package is split into.
    #[serde(default = "default_architectures")]
    pub architectures: Vec<String>,
    /// Initial priority weight of top-level dependencies.
    #[serde(default = "default_root_priority")]
    pub root_priority: u32,
    /// Added to a unit's priority each time none of its versions fit.
    #[serde(default = "default_priority_step")]
    pub priority_step: u32,
    /// Abort a search after this many queue pops.
    #[serde(default)]
    pub max_iterations: Option<u64>,
    /// Retry with pre-release candidates when an ordinary resolve fails.
    #[serde(default = "default_true")]
    pub prerelease_fallback: bool,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            architectures: default_architectures(),
            root_priority: default_root_priority(),
            priority_step: default_priority_step(),
            max_iterations: None,
            prerelease_fallback: true,
        }
    }
}

fn default_architectures() -> Vec<String> {
    ["os", "web.browser", "web.cordova"]
        .iter()
        .map(|a| a.to_string())
        .collect()
}

fn default_root_priority() -> u32 {
    100
}

fn default_priority_step() -> u32 {
    1
}

fn default_true() -> bool {
    true
}

impl ResolverConfig {
    /// Parse the `[resolver]` table of a TOML document.
    pub fn from_toml_str(content: &str) -> PinpointResult<Self> {
        let file: ConfigFile = toml::from_str(content).map_err(|e| PinpointError::Config {
            message: format!("Failed to parse config: {e}"),
        })?;
        file.resolver.validate()?;
        Ok(file.resolver)
    }

    /// Load configuration from a file.
    pub fn from_path(path: &Path) -> PinpointResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| PinpointError::Config {
            message: format!("Failed to read {}: {e}", path.display()),
        })?;
        Self::from_toml_str(&content)
    }

    fn validate(&self) -> PinpointResult<()> {
        if self.architectures.is_empty() {
            return Err(PinpointError::Config {
                message: "at least one architecture is required".to_string(),
            });
        }
        if self.priority_step == 0 {
            return Err(PinpointError::Config {
                message: "priority-step must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}
