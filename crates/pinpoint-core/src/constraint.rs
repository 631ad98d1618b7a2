//! Version constraints and the rule deciding whether a version satisfies one.
//!
//! Syntax of a single alternative:
//! - `=1.2.3`  exactly `1.2.3`
//! - `>=1.2.3` `1.2.3` or anything newer
//! - `1.2.3`   compatible with `1.2.3`: at least `1.2.3` and in the same
//!   compatibility class (same earliest compatible version)
//!
//! Alternatives may be joined with `||`. The empty string and `none` mean
//! "no constraint at all".

use std::fmt;

use pinpoint_util::errors::{PinpointError, PinpointResult};
use semver::Version;

use crate::version::{is_prerelease, parse_version};

/// How a constraint compares candidate versions against its own version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConstraintKind {
    Exactly,
    AtLeast,
    CompatibleWith,
}

impl ConstraintKind {
    fn prefix(self) -> &'static str {
        match self {
            Self::Exactly => "=",
            Self::AtLeast => ">=",
            Self::CompatibleWith => "",
        }
    }
}

/// One alternative of a constraint: a kind and the version it names.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SimpleConstraint {
    pub kind: ConstraintKind,
    pub version: Version,
}

impl SimpleConstraint {
    pub fn parse(s: &str) -> PinpointResult<Self> {
        let s = s.trim();
        let (kind, version) = if let Some(rest) = s.strip_prefix(">=") {
            (ConstraintKind::AtLeast, rest)
        } else if let Some(rest) = s.strip_prefix('=') {
            (ConstraintKind::Exactly, rest)
        } else {
            (ConstraintKind::CompatibleWith, s)
        };

        if version.is_empty() {
            return Err(PinpointError::InvalidConstraint {
                constraint: s.to_string(),
                message: "missing version".to_string(),
            });
        }

        Ok(Self {
            kind,
            version: parse_version(version)?,
        })
    }

    /// Check a candidate against this alternative.
    ///
    /// `candidate_ecv` is the candidate's earliest compatible version and
    /// `constraint_ecv` the one recorded for this constraint's own version,
    /// if any is known. A `CompatibleWith` constraint whose version has no
    /// known ECV is never satisfied.
    pub fn is_satisfied_by(
        &self,
        candidate: &Version,
        candidate_ecv: &Version,
        constraint_ecv: Option<&Version>,
    ) -> bool {
        // Pre-releases only ever match themselves.
        if is_prerelease(&self.version) || is_prerelease(candidate) {
            return self.version == *candidate;
        }

        match self.kind {
            ConstraintKind::Exactly => *candidate == self.version,
            ConstraintKind::AtLeast => *candidate >= self.version,
            ConstraintKind::CompatibleWith => {
                *candidate >= self.version && constraint_ecv == Some(candidate_ecv)
            }
        }
    }
}

impl fmt::Display for SimpleConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.kind.prefix(), self.version)
    }
}

/// A parsed version constraint: one or more alternatives.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VersionConstraint {
    raw: String,
    alternatives: Vec<SimpleConstraint>,
}

impl VersionConstraint {
    /// Parse a constraint string. Returns `None` for the empty string and
    /// `none`, which place no restriction on the version.
    pub fn parse(s: &str) -> PinpointResult<Option<Self>> {
        let raw = s.trim();
        if raw.is_empty() || raw == "none" {
            return Ok(None);
        }

        let alternatives = raw
            .split("||")
            .map(|alt| {
                if alt.trim().is_empty() {
                    Err(PinpointError::InvalidConstraint {
                        constraint: raw.to_string(),
                        message: "empty alternative".to_string(),
                    })
                } else {
                    SimpleConstraint::parse(alt)
                }
            })
            .collect::<PinpointResult<Vec<_>>>()?;

        Ok(Some(Self {
            raw: raw.to_string(),
            alternatives,
        }))
    }

    pub fn alternatives(&self) -> &[SimpleConstraint] {
        &self.alternatives
    }

    /// The pinned version if this is a single `exactly` alternative.
    pub fn exact_version(&self) -> Option<&Version> {
        match self.alternatives.as_slice() {
            [only] if only.kind == ConstraintKind::Exactly => Some(&only.version),
            _ => None,
        }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for VersionConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.alternatives.iter().map(|a| a.to_string()).collect();
        f.write_str(&parts.join(" || "))
    }
}
