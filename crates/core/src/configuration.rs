//! The validated, immutable build configuration and the views handed to
//! compiler, deployer and verifier collaborators.

use crate::{
    error::ConfigError, plan::BuildJob, secrets::SecretValue, settings::CompilerSettings, utils,
};
use semver::Version;
use serde::Serialize;
use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
};
use url::Url;

/// A network whose secrets have all been resolved
#[derive(Clone)]
pub struct ResolvedNetwork {
    pub(crate) name: String,
    pub(crate) endpoint: Url,
    pub(crate) account: SecretValue,
    pub(crate) gas_limit: u64,
    pub(crate) chain_id: Option<u64>,
    pub(crate) explorer_api_key: Option<SecretValue>,
    pub(crate) explorer_network: String,
}

impl ResolvedNetwork {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Endpoint host, safe to print (the full URL may carry an API key)
    pub fn host(&self) -> &str {
        self.endpoint.host_str().unwrap_or_default()
    }

    pub fn gas_limit(&self) -> u64 {
        self.gas_limit
    }

    pub fn chain_id(&self) -> Option<u64> {
        self.chain_id
    }

    pub fn has_explorer_api_key(&self) -> bool {
        self.explorer_api_key.is_some()
    }

    pub fn explorer_network(&self) -> &str {
        &self.explorer_network
    }
}

impl fmt::Debug for ResolvedNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedNetwork")
            .field("name", &self.name)
            .field("host", &self.host())
            .field("gas_limit", &self.gas_limit)
            .field("chain_id", &self.chain_id)
            .field("explorer_api_key", &self.explorer_api_key.is_some())
            .finish()
    }
}

/// What the compiler collaborator receives for one build job
#[derive(Debug, Clone, Copy, Serialize)]
pub struct CompilerInput<'a> {
    #[serde(serialize_with = "serialize_version")]
    pub version: &'a Version,
    pub settings: &'a CompilerSettings,
    pub sources: &'a BTreeSet<String>,
}

fn serialize_version<S: serde::Serializer>(version: &&Version, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(version)
}

/// What the deployer collaborator receives for one network
#[derive(Clone, Copy)]
pub struct DeploymentTarget<'a> {
    pub network: &'a str,
    pub endpoint: &'a Url,
    pub account: &'a SecretValue,
    pub gas_limit: u64,
    pub chain_id: Option<u64>,
}

impl fmt::Debug for DeploymentTarget<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeploymentTarget")
            .field("network", &self.network)
            .field("host", &self.endpoint.host_str())
            .field("gas_limit", &self.gas_limit)
            .field("chain_id", &self.chain_id)
            .finish_non_exhaustive()
    }
}

/// What the verification collaborator receives for one network
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExplorerApiKey<'a> {
    Available {
        explorer_network: &'a str,
        key: &'a SecretValue,
    },
    /// No explorer key was configured for this network
    Unavailable,
}

impl ExplorerApiKey<'_> {
    pub fn is_available(&self) -> bool {
        matches!(self, ExplorerApiKey::Available { .. })
    }
}

/// Validated build plan and deployment targets.
///
/// Only produced by [`crate::ConfigValidator`]; exposes read-only views and is
/// safe to share across threads.
#[derive(Debug, Clone)]
pub struct BuildConfiguration {
    jobs: Vec<BuildJob>,
    networks: BTreeMap<String, ResolvedNetwork>,
}

impl BuildConfiguration {
    pub(crate) fn new(jobs: Vec<BuildJob>, networks: BTreeMap<String, ResolvedNetwork>) -> Self {
        Self { jobs, networks }
    }

    /// Build jobs in ascending compiler version order
    pub fn jobs(&self) -> &[BuildJob] {
        &self.jobs
    }

    pub fn compiler_inputs(&self) -> impl Iterator<Item = CompilerInput<'_>> {
        self.jobs.iter().map(|job| CompilerInput {
            version: &job.version,
            settings: &job.settings,
            sources: &job.sources,
        })
    }

    pub fn networks(&self) -> impl Iterator<Item = &ResolvedNetwork> {
        self.networks.values()
    }

    pub fn network(&self, name: &str) -> Result<&ResolvedNetwork, ConfigError> {
        self.networks.get(name).ok_or_else(|| ConfigError::UnknownNetwork {
            name: name.to_string(),
        })
    }

    pub fn deployment_target(&self, name: &str) -> Result<DeploymentTarget<'_>, ConfigError> {
        let network = self.network(name)?;
        Ok(DeploymentTarget {
            network: &network.name,
            endpoint: &network.endpoint,
            account: &network.account,
            gas_limit: network.gas_limit,
            chain_id: network.chain_id,
        })
    }

    pub fn explorer_api_key(&self, name: &str) -> Result<ExplorerApiKey<'_>, ConfigError> {
        let network = self.network(name)?;
        Ok(match &network.explorer_api_key {
            Some(key) => ExplorerApiKey::Available {
                explorer_network: &network.explorer_network,
                key,
            },
            None => ExplorerApiKey::Unavailable,
        })
    }

    /// Which compiler version each source unit was assigned to
    pub fn source_assignments(&self) -> BTreeMap<&str, &Version> {
        self.jobs
            .iter()
            .flat_map(|job| job.sources.iter().map(move |unit| (unit.as_str(), &job.version)))
            .collect()
    }

    /// SHA-256 over the serialized compiler inputs
    pub fn fingerprint(&self) -> String {
        let inputs: Vec<CompilerInput<'_>> = self.compiler_inputs().collect();
        // Serializing plain maps, strings and numbers cannot fail.
        let bytes = serde_json::to_vec(&inputs).unwrap_or_default();
        utils::hash_bytes(&bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secret(value: &str) -> SecretValue {
        let store = BTreeMap::from([("KEY".to_string(), value.to_string())]);
        crate::secrets::SecretResolver::new(&store).resolve("KEY").unwrap()
    }

    fn configuration() -> BuildConfiguration {
        let jobs = vec![
            BuildJob {
                version: Version::new(0, 7, 6),
                settings: CompilerSettings::default(),
                sources: BTreeSet::from(["Vault.sol".to_string()]),
            },
            BuildJob {
                version: Version::new(0, 8, 17),
                settings: CompilerSettings::default(),
                sources: BTreeSet::from(["Pair.sol".to_string(), "Token.sol".to_string()]),
            },
        ];
        let mumbai = ResolvedNetwork {
            name: "mumbai".to_string(),
            endpoint: Url::parse("https://polygon-mumbai.infura.io/v3/projectsecret").unwrap(),
            account: secret("0xaccount"),
            gas_limit: 300_000_000,
            chain_id: Some(80001),
            explorer_api_key: Some(secret("explorer-key")),
            explorer_network: "polygonMumbai".to_string(),
        };
        let sepolia = ResolvedNetwork {
            name: "sepolia".to_string(),
            endpoint: Url::parse("https://rpc.sepolia.org").unwrap(),
            account: secret("0xaccount"),
            gas_limit: 30_000_000,
            chain_id: None,
            explorer_api_key: None,
            explorer_network: "sepolia".to_string(),
        };
        BuildConfiguration::new(
            jobs,
            BTreeMap::from([
                ("mumbai".to_string(), mumbai),
                ("sepolia".to_string(), sepolia),
            ]),
        )
    }

    #[test]
    fn test_source_assignments() {
        let config = configuration();
        let assignments = config.source_assignments();
        assert_eq!(assignments.len(), 3);
        assert_eq!(assignments["Vault.sol"], &Version::new(0, 7, 6));
        assert_eq!(assignments["Token.sol"], &Version::new(0, 8, 17));
    }

    #[test]
    fn test_deployment_target() {
        let config = configuration();
        let target = config.deployment_target("mumbai").unwrap();
        assert_eq!(target.gas_limit, 300_000_000);
        assert_eq!(target.chain_id, Some(80001));
        assert_eq!(target.account.expose(), "0xaccount");
        assert_eq!(target.endpoint.host_str(), Some("polygon-mumbai.infura.io"));

        assert!(matches!(
            config.deployment_target("mainnet"),
            Err(ConfigError::UnknownNetwork { .. })
        ));
    }

    #[test]
    fn test_explorer_api_key() {
        let config = configuration();
        match config.explorer_api_key("mumbai").unwrap() {
            ExplorerApiKey::Available {
                explorer_network,
                key,
            } => {
                assert_eq!(explorer_network, "polygonMumbai");
                assert_eq!(key.expose(), "explorer-key");
            }
            ExplorerApiKey::Unavailable => panic!("expected an explorer key"),
        }
        assert_eq!(
            config.explorer_api_key("sepolia").unwrap(),
            ExplorerApiKey::Unavailable
        );
    }

    #[test]
    fn test_debug_output_hides_secrets() {
        let rendered = format!("{:?}", configuration());
        assert!(!rendered.contains("projectsecret"));
        assert!(!rendered.contains("0xaccount"));
        assert!(!rendered.contains("explorer-key"));
    }

    #[test]
    fn test_fingerprint_is_stable() {
        let a = configuration().fingerprint();
        let b = configuration().fingerprint();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_compiler_inputs_serialize_version_as_string() {
        let config = configuration();
        let inputs: Vec<_> = config.compiler_inputs().collect();
        let value = serde_json::to_value(&inputs).unwrap();
        assert_eq!(value[0]["version"], "0.7.6");
        assert_eq!(value[1]["sources"], serde_json::json!(["Pair.sol", "Token.sol"]));
    }

    #[test]
    fn test_configuration_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<BuildConfiguration>();
    }
}
