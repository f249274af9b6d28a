//! Configuration document loading and registry population

use crate::{
    compiler::{CompilerEntry, CompilerRegistry},
    error::ConfigError,
    network::{Endpoint, NetworkProfile, NetworkProfileRegistry},
    secrets::SecretStore,
    settings::SettingsLayer,
    validate::ConfigValidator,
    version::{SourceVersionMap, VersionRange},
};
use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

/// Default document name looked up in the project root
pub const DEFAULT_CONFIG_FILE: &str = "forgeplan.toml";

/// Top-level configuration document
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ProjectConfig {
    /// Compiler entries and global compiler settings
    #[serde(default)]
    pub solidity: SolidityConfig,

    /// Source units and their version requirements
    #[serde(default)]
    pub sources: SourcesConfig,

    /// Deployment networks
    #[serde(default)]
    pub networks: Vec<NetworkConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct SolidityConfig {
    /// Settings applied beneath every compiler's own settings
    #[serde(default)]
    pub defaults: SettingsLayer,

    #[serde(default)]
    pub compilers: Vec<CompilerConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct CompilerConfig {
    pub version: String,
    #[serde(default)]
    pub settings: SettingsLayer,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct SourcesConfig {
    /// Directory scanned for `.sol` files, relative to the project root
    pub root: Option<PathBuf>,

    /// Explicit requirements; these win over scanned pragmas
    #[serde(default)]
    pub requirements: BTreeMap<String, String>,
}

/// A network as written in the document. Secrets are referenced by variable name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct NetworkConfig {
    pub name: String,
    /// Literal RPC URL
    pub url: Option<String>,
    /// Variable holding the RPC URL
    pub url_env: Option<String>,
    /// Variable holding the deployer account key
    pub account_env: String,
    pub gas_limit: u64,
    pub chain_id: Option<u64>,
    /// Variable holding the block-explorer API key
    pub explorer_key_env: Option<String>,
    /// Network name used by the block explorer
    pub explorer_network: Option<String>,
}

impl NetworkConfig {
    fn into_profile(self) -> Result<NetworkProfile> {
        let endpoint = match (self.url, self.url_env) {
            (Some(url), None) => Endpoint::Url(url),
            (None, Some(reference)) => Endpoint::Secret(reference),
            (Some(_), Some(_)) => {
                return Err(eyre::eyre!(
                    "Network `{}` sets both `url` and `url_env`; use one",
                    self.name
                ))
            }
            (None, None) => {
                return Err(eyre::eyre!(
                    "Network `{}` needs either `url` or `url_env`",
                    self.name
                ))
            }
        };

        Ok(NetworkProfile {
            name: self.name,
            endpoint,
            account_secret_ref: self.account_env,
            gas_limit: self.gas_limit,
            chain_id: self.chain_id,
            explorer_api_key_ref: self.explorer_key_env,
            explorer_network: self.explorer_network,
        })
    }
}

/// Registries populated from a document, ready for validation
#[derive(Debug, Clone, Default)]
pub struct Registries {
    pub compilers: CompilerRegistry,
    pub defaults: SettingsLayer,
    pub sources: SourceVersionMap,
    pub networks: NetworkProfileRegistry,
}

impl Registries {
    /// Creates a validator over these registries
    pub fn validator<'a>(&'a self, secrets: &'a dyn SecretStore) -> ConfigValidator<'a> {
        ConfigValidator::new(&self.compilers, &self.sources, &self.networks, secrets)
            .with_defaults(&self.defaults)
    }
}

impl ProjectConfig {
    /// Loads a document, picking the format from the file extension (`.json` or TOML)
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;

        let config: Self = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse {}", path.display()))?,
            _ => Self::from_toml_str(&content)
                .with_context(|| format!("Failed to parse {}", path.display()))?,
        };

        tracing::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Builds the registries, failing on the first structural error.
    ///
    /// `project_root` anchors `sources.root` and scanned unit identifiers.
    pub fn registries(&self, project_root: &Path) -> Result<Registries> {
        let mut compilers = CompilerRegistry::new();
        for compiler in &self.solidity.compilers {
            compilers.register(CompilerEntry::parse(&compiler.version, compiler.settings.clone())?)?;
        }

        let mut sources = match &self.sources.root {
            Some(root) => SourceVersionMap::scan(project_root, root)?,
            None => SourceVersionMap::new(),
        };
        for (unit, expression) in &self.sources.requirements {
            let range = VersionRange::parse(expression)
                .wrap_err_with(|| format!("Invalid requirement for source unit `{unit}`"))?;
            if let Some(scanned) = sources.insert(unit.clone(), range) {
                tracing::debug!("Requirement for {} overrides pragma {}", unit, scanned);
            }
        }

        let mut networks = NetworkProfileRegistry::new();
        for network in &self.networks {
            networks.register(network.clone().into_profile()?)?;
        }

        tracing::info!(
            "Loaded {} compiler(s), {} source unit(s), {} network(s)",
            compilers.len(),
            sources.len(),
            networks.len()
        );

        Ok(Registries {
            compilers,
            defaults: self.solidity.defaults.clone(),
            sources,
            networks,
        })
    }

    /// Create a new builder for ProjectConfig
    pub fn builder() -> ProjectConfigBuilder {
        ProjectConfigBuilder::default()
    }
}

/// Builder for assembling a ProjectConfig in code
#[derive(Default)]
pub struct ProjectConfigBuilder {
    config: ProjectConfig,
}

impl ProjectConfigBuilder {
    /// Set the global settings layer
    pub fn defaults(mut self, defaults: SettingsLayer) -> Self {
        self.config.solidity.defaults = defaults;
        self
    }

    /// Add a compiler version with default settings
    pub fn compiler(self, version: &str) -> Self {
        self.compiler_with(version, SettingsLayer::default())
    }

    /// Add a compiler version with its own settings layer
    pub fn compiler_with(mut self, version: &str, settings: SettingsLayer) -> Self {
        self.config.solidity.compilers.push(CompilerConfig {
            version: version.to_string(),
            settings,
        });
        self
    }

    /// Require a version range for a source unit
    pub fn source(mut self, unit: &str, requirement: &str) -> Self {
        self.config
            .sources
            .requirements
            .insert(unit.to_string(), requirement.to_string());
        self
    }

    /// Scan a directory for pragma directives
    pub fn source_root(mut self, root: PathBuf) -> Self {
        self.config.sources.root = Some(root);
        self
    }

    /// Add a network
    pub fn network(mut self, network: NetworkConfig) -> Self {
        self.config.networks.push(network);
        self
    }

    pub fn build(self) -> ProjectConfig {
        self.config
    }
}

/// Finds the structural [`ConfigError`] behind a loading failure, if there is one
pub fn structural_error(report: &eyre::Report) -> Option<&ConfigError> {
    report.chain().find_map(|cause| cause.downcast_ref::<ConfigError>())
}
