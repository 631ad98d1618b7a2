//! Semantic version helpers.
//!
//! Versions are parsed with the `semver` crate. Build metadata (`+local`)
//! is stripped on parse: two versions that differ only in build metadata are
//! the same version for resolution purposes.

use pinpoint_util::errors::{PinpointError, PinpointResult};
use semver::{BuildMetadata, Prerelease, Version};

/// Characters allowed in a pre-release identifier, in precedence order.
const PRERELEASE_CHARS: &str = "-0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

/// Parse a version string, dropping any build metadata.
pub fn parse_version(version: &str) -> PinpointResult<Version> {
    let mut parsed = Version::parse(version.trim()).map_err(|e| PinpointError::InvalidVersion {
        version: version.to_string(),
        message: e.to_string(),
    })?;
    parsed.build = BuildMetadata::EMPTY;
    Ok(parsed)
}

/// The canonical string form of a version: everything but the build metadata.
pub fn canonical_version(version: &str) -> PinpointResult<String> {
    parse_version(version).map(|v| v.to_string())
}

pub fn is_prerelease(version: &Version) -> bool {
    !version.pre.is_empty()
}

/// The earliest compatible version assumed when a catalog does not say:
/// everything sharing a major version is one compatibility class.
pub fn default_earliest_compatible_version(version: &Version) -> Version {
    Version::new(version.major, 0, 0)
}

/// Project a version onto a float that preserves ordering for ordinary
/// versions.
///
/// Each of `minor` and `patch` gets two decimal digits, so components of 100
/// or more may collide. Pre-release identifiers contribute a fraction in
/// `(-1, 0]` scaled below the patch digit; only the first two characters of
/// alphanumeric identifiers are significant.
pub fn version_magnitude(version: &Version) -> f64 {
    version.major as f64 * 100.0 * 100.0
        + version.minor as f64 * 100.0
        + version.patch as f64
        + prerelease_fraction(&version.pre) / 100.0 / 100.0
}

fn prerelease_fraction(pre: &Prerelease) -> f64 {
    if pre.is_empty() {
        return 0.0;
    }

    let base = PRERELEASE_CHARS.len() as f64;
    pre.as_str()
        .split('.')
        .enumerate()
        .fold(-1.0, |memo, (index, part)| {
            let digit = match part.parse::<u64>() {
                Ok(n) => n as f64 + 1.0,
                Err(_) => {
                    // Alphanumeric identifiers rank above numeric ones.
                    let mut chars = part.chars();
                    let first = chars.next().map(char_rank).unwrap_or(0) as f64;
                    let second = chars.next().map(char_rank).unwrap_or(0) as f64;
                    101.0 + first * base + second
                }
            };
            memo + digit / 4100f64.powi(index as i32 + 1)
        })
}

fn char_rank(ch: char) -> usize {
    PRERELEASE_CHARS.find(ch).unwrap_or(0)
}
