//! Registered compiler versions and version selection

use crate::{error::ConfigError, settings::SettingsLayer, version::VersionRange};
use semver::Version;
use std::collections::BTreeMap;

/// A compiler release available to the build, with its own settings layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilerEntry {
    pub version: Version,
    pub settings: SettingsLayer,
}

impl CompilerEntry {
    pub fn new(version: Version, settings: SettingsLayer) -> Self {
        Self { version, settings }
    }

    /// Parses a version string such as `"0.8.17"` or `"v0.8.17"`
    pub fn parse(version: &str, settings: SettingsLayer) -> Result<Self, ConfigError> {
        let trimmed = version.trim();
        let version = Version::parse(trimmed.strip_prefix('v').unwrap_or(trimmed)).map_err(|e| {
            ConfigError::InvalidCompilerVersion {
                version: version.to_string(),
                reason: e.to_string(),
            }
        })?;
        Ok(Self::new(version, settings))
    }
}

/// Set of compiler entries keyed by version, kept in ascending order.
///
/// Filled during startup, then only read.
#[derive(Debug, Clone, Default)]
pub struct CompilerRegistry {
    entries: BTreeMap<Version, CompilerEntry>,
}

impl CompilerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, entry: CompilerEntry) -> Result<(), ConfigError> {
        if self.entries.contains_key(&entry.version) {
            return Err(ConfigError::DuplicateVersion {
                version: entry.version,
            });
        }
        tracing::debug!("Registered compiler {}", entry.version);
        self.entries.insert(entry.version.clone(), entry);
        Ok(())
    }

    /// Selects the highest registered version satisfying `requirement`.
    ///
    /// Several matches are never an error: the highest version always wins.
    pub fn resolve(&self, requirement: &VersionRange) -> Result<&CompilerEntry, ConfigError> {
        self.entries
            .values()
            .rev()
            .find(|entry| requirement.matches(&entry.version))
            .ok_or_else(|| ConfigError::NoMatchingCompiler {
                requirement: requirement.to_string(),
            })
    }

    pub fn get(&self, version: &Version) -> Option<&CompilerEntry> {
        self.entries.get(version)
    }

    pub fn versions(&self) -> impl Iterator<Item = &Version> {
        self.entries.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CompilerEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
