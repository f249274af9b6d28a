//! Grouping source units into per-compiler build jobs

use crate::{
    compiler::CompilerRegistry,
    error::ConfigError,
    settings::{CompilerSettings, SettingsLayer},
    version::SourceVersionMap,
};
use semver::Version;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// One compiler version applied to its share of the source units
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildJob {
    /// Compiler version identifier
    #[serde(serialize_with = "serialize_version")]
    pub version: Version,
    /// Settings after merging global and per-compiler layers
    pub settings: CompilerSettings,
    /// Source units compiled by this job
    pub sources: BTreeSet<String>,
}

fn serialize_version<S: serde::Serializer>(version: &Version, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(version)
}

/// Outcome of planning: jobs for every unit that resolved, plus one
/// `UnresolvedSourceUnit` for every unit that did not
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildPlan {
    pub jobs: Vec<BuildJob>,
    pub unresolved: Vec<ConfigError>,
}

impl BuildPlan {
    pub fn is_complete(&self) -> bool {
        self.unresolved.is_empty()
    }

    /// The jobs, or every unresolved unit if any are left
    pub fn into_result(self) -> Result<Vec<BuildJob>, Vec<ConfigError>> {
        if self.unresolved.is_empty() {
            Ok(self.jobs)
        } else {
            Err(self.unresolved)
        }
    }
}

/// Resolves source requirements against a compiler registry.
pub struct BuildPlanResolver<'a> {
    registry: &'a CompilerRegistry,
    defaults: &'a SettingsLayer,
}

impl<'a> BuildPlanResolver<'a> {
    pub fn new(registry: &'a CompilerRegistry, defaults: &'a SettingsLayer) -> Self {
        Self { registry, defaults }
    }

    /// Produces one job per compiler actually needed, ascending by version.
    ///
    /// Every unresolvable unit is reported, not just the first, and units that
    /// did resolve still get their jobs.
    pub fn resolve(&self, sources: &SourceVersionMap) -> BuildPlan {
        let mut groups: BTreeMap<&Version, BTreeSet<String>> = BTreeMap::new();
        let mut unresolved = Vec::new();

        for (unit, requirement) in sources.iter() {
            match self.registry.resolve(requirement) {
                Ok(entry) => {
                    tracing::debug!("{} ({}) -> solc {}", unit, requirement, entry.version);
                    groups.entry(&entry.version).or_default().insert(unit.to_string());
                }
                Err(err) => unresolved.push(ConfigError::UnresolvedSourceUnit {
                    unit: unit.to_string(),
                    reason: err.to_string(),
                }),
            }
        }

        let jobs = groups
            .into_iter()
            .filter_map(|(version, sources)| {
                let entry = self.registry.get(version)?;
                Some(BuildJob {
                    version: version.clone(),
                    settings: CompilerSettings::from_layers([self.defaults, &entry.settings]),
                    sources,
                })
            })
            .collect();

        BuildPlan { jobs, unresolved }
    }
}
