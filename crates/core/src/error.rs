//! Error types for configuration loading, resolution and validation

use semver::Version;
use std::fmt;

/// Errors produced while registering, resolving or validating build configuration.
///
/// Registration errors (`DuplicateVersion`, `DuplicateNetworkName`, `InvalidGasLimit`,
/// `InvalidCompilerVersion`, `InvalidVersionRequirement`) are returned immediately.
/// The remaining variants are collected into a [`ValidationReport`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("compiler {version} is registered more than once")]
    DuplicateVersion { version: Version },

    #[error("invalid compiler version `{version}`: {reason}")]
    InvalidCompilerVersion { version: String, reason: String },

    #[error("invalid version requirement `{expression}`: {reason}")]
    InvalidVersionRequirement { expression: String, reason: String },

    #[error("no registered compiler satisfies `{requirement}`")]
    NoMatchingCompiler { requirement: String },

    #[error("source unit `{unit}` cannot be resolved: {reason}")]
    UnresolvedSourceUnit { unit: String, reason: String },

    #[error("compiler {version}: optimizer is enabled with 0 runs")]
    InvalidOptimizerRuns { version: Version },

    #[error("compiler {version} does not support evm target `{evm_version}` (requires >= {minimum})")]
    UnsupportedEvmVersion {
        version: Version,
        evm_version: String,
        minimum: Version,
    },

    #[error("compiler {version}: library `{library}` has a malformed address")]
    MalformedLibraryAddress { version: Version, library: String },

    #[error("network `{name}` is registered more than once")]
    DuplicateNetworkName { name: String },

    #[error("network `{name}` must have a positive gas limit")]
    InvalidGasLimit { name: String },

    #[error("unknown network `{name}`")]
    UnknownNetwork { name: String },

    #[error("network `{network}`: secret `{reference}` is not set")]
    MissingSecret { network: String, reference: String },

    #[error("network `{network}`: malformed rpc endpoint: {reason}")]
    MalformedEndpoint { network: String, reason: String },
}

/// Complete set of errors found by one validation pass.
///
/// Never empty when returned from [`crate::ConfigValidator::validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    errors: Vec<ConfigError>,
}

impl ValidationReport {
    pub(crate) fn new(errors: Vec<ConfigError>) -> Self {
        Self { errors }
    }

    pub fn errors(&self) -> &[ConfigError] {
        &self.errors
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn into_errors(self) -> Vec<ConfigError> {
        self.errors
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "configuration has {} error(s)", self.errors.len())?;
        for error in &self.errors {
            write!(f, "\n  - {error}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationReport {}

impl IntoIterator for ValidationReport {
    type Item = ConfigError;
    type IntoIter = std::vec::IntoIter<ConfigError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}
