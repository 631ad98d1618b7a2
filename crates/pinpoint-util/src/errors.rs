use miette::Diagnostic;
use thiserror::Error;

/// Unified error type for all Pinpoint operations.
#[derive(Debug, Error, Diagnostic)]
pub enum PinpointError {
    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A version string is not valid semver.
    #[error("Invalid version `{version}`: {message}")]
    #[diagnostic(help("Versions must look like semver, e.g. `1.2.3`"))]
    InvalidVersion { version: String, message: String },

    /// A version constraint string could not be parsed.
    #[error("Invalid constraint `{constraint}`: {message}")]
    #[diagnostic(help("Use `=1.2.3`, `>=1.2.3`, `1.2.3` or alternatives joined with `||`"))]
    InvalidConstraint { constraint: String, message: String },

    /// Invalid or unreadable resolver configuration.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// The catalog fed to the resolver is internally inconsistent
    /// (duplicate or out-of-order versions, unknown architectures).
    #[error("Catalog error: {message}")]
    #[diagnostic(help("This is a defect in the catalog feed, not an unsatisfiable request"))]
    Catalog { message: String },

    /// A dependency or constraint names a unit the catalog does not know.
    #[error("Unknown unit: {name}")]
    UnknownUnit { name: String },

    /// No assignment satisfies every constraint.
    #[error("Dependency resolution failed: {message}")]
    Resolution { message: String },

    /// The host interrupted a running search through the nudge callback.
    #[error("Resolution interrupted: {message}")]
    Interrupted { message: String },

    /// The resolver broke one of its own invariants.
    #[error("Internal resolver error: {message}")]
    Internal { message: String },
}

impl PinpointError {
    /// Whether this error is an ordinary, recoverable resolution failure
    /// rather than a defect or an interruption.
    pub fn is_resolution_failure(&self) -> bool {
        matches!(self, Self::UnknownUnit { .. } | Self::Resolution { .. })
    }
}

/// Convenience alias for `Result<T, PinpointError>`.
pub type PinpointResult<T> = Result<T, PinpointError>;
