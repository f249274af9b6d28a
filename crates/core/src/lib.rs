//! Build-configuration resolution for Solidity projects
//!
//! Selects a compiler version for every source unit, merges compiler settings
//! into per-version build jobs, resolves network profiles against environment
//! secrets, and validates everything in one pass before any compiler or
//! network collaborator runs.
pub mod compiler;
pub mod config;
pub mod configuration;
pub mod error;
pub mod network;
pub mod plan;
pub mod secrets;
pub mod settings;
mod utils;
pub mod validate;
pub mod version;

pub use compiler::{CompilerEntry, CompilerRegistry};
pub use config::{structural_error, NetworkConfig, ProjectConfig, Registries, DEFAULT_CONFIG_FILE};
pub use configuration::{
    BuildConfiguration, CompilerInput, DeploymentTarget, ExplorerApiKey, ResolvedNetwork,
};
pub use error::{ConfigError, ValidationReport};
pub use network::{Endpoint, NetworkProfile, NetworkProfileRegistry};
pub use plan::{BuildJob, BuildPlan, BuildPlanResolver};
pub use secrets::{EnvSecretStore, MissingSecret, SecretResolver, SecretStore, SecretValue};
pub use settings::{CompilerSettings, EvmVersion, Libraries, SettingsLayer};
pub use validate::ConfigValidator;
pub use version::{SourceVersionMap, VersionRange};
