//! Named deployment targets

use crate::error::ConfigError;
use std::collections::BTreeMap;

/// Where a network's RPC endpoint comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// Literal URL written in the configuration
    Url(String),
    /// Name of a secret holding the URL (provider URLs usually embed an API key)
    Secret(String),
}

/// Deployment target as declared in configuration; secrets are referenced by name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkProfile {
    /// Unique network name (e.g. "goerli", "mumbai")
    pub name: String,
    /// RPC endpoint
    pub endpoint: Endpoint,
    /// Secret holding the deployer account key
    pub account_secret_ref: String,
    /// Gas limit used for every transaction on this network
    pub gas_limit: u64,
    /// Expected chain ID, if pinned
    pub chain_id: Option<u64>,
    /// Secret holding the block-explorer API key
    pub explorer_api_key_ref: Option<String>,
    /// Name the explorer uses for this network, when it differs from `name`
    pub explorer_network: Option<String>,
}

impl NetworkProfile {
    pub fn new(
        name: impl Into<String>,
        endpoint: Endpoint,
        account_secret_ref: impl Into<String>,
        gas_limit: u64,
    ) -> Self {
        Self {
            name: name.into(),
            endpoint,
            account_secret_ref: account_secret_ref.into(),
            gas_limit,
            chain_id: None,
            explorer_api_key_ref: None,
            explorer_network: None,
        }
    }

    pub fn with_chain_id(mut self, chain_id: u64) -> Self {
        self.chain_id = Some(chain_id);
        self
    }

    pub fn with_explorer_key(mut self, reference: impl Into<String>) -> Self {
        self.explorer_api_key_ref = Some(reference.into());
        self
    }

    pub fn with_explorer_network(mut self, name: impl Into<String>) -> Self {
        self.explorer_network = Some(name.into());
        self
    }

    /// Every secret this profile depends on, in resolution order
    pub fn secret_refs(&self) -> impl Iterator<Item = &str> {
        let endpoint = match &self.endpoint {
            Endpoint::Secret(reference) => Some(reference.as_str()),
            Endpoint::Url(_) => None,
        };
        endpoint
            .into_iter()
            .chain(std::iter::once(self.account_secret_ref.as_str()))
            .chain(self.explorer_api_key_ref.as_deref())
    }
}

/// Network profiles keyed by name.
///
/// Populated once at startup and read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct NetworkProfileRegistry {
    profiles: BTreeMap<String, NetworkProfile>,
}

impl NetworkProfileRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, profile: NetworkProfile) -> Result<(), ConfigError> {
        if self.profiles.contains_key(&profile.name) {
            return Err(ConfigError::DuplicateNetworkName { name: profile.name });
        }
        if profile.gas_limit == 0 {
            return Err(ConfigError::InvalidGasLimit { name: profile.name });
        }
        tracing::debug!("Registered network {}", profile.name);
        self.profiles.insert(profile.name.clone(), profile);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<&NetworkProfile, ConfigError> {
        self.profiles.get(name).ok_or_else(|| ConfigError::UnknownNetwork {
            name: name.to_string(),
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &NetworkProfile> {
        self.profiles.values()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.profiles.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn goerli() -> NetworkProfile {
        NetworkProfile::new(
            "goerli",
            Endpoint::Secret("ETH_GOERLI_ENDPOINT".to_string()),
            "ACCOUNT_PRIVATE_KEY",
            300_000_000,
        )
        .with_chain_id(5)
        .with_explorer_key("ETH_GOERLI_KEY")
    }

    #[test]
    fn test_register_and_get() {
        let mut registry = NetworkProfileRegistry::new();
        registry.register(goerli()).unwrap();

        let profile = registry.get("goerli").unwrap();
        assert_eq!(profile.gas_limit, 300_000_000);
        assert_eq!(profile.chain_id, Some(5));
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let mut registry = NetworkProfileRegistry::new();
        registry.register(goerli()).unwrap();

        let err = registry.register(goerli()).unwrap_err();
        assert_eq!(
            err,
            ConfigError::DuplicateNetworkName {
                name: "goerli".to_string()
            }
        );
    }

    #[test]
    fn test_zero_gas_limit_rejected() {
        let mut registry = NetworkProfileRegistry::new();
        let profile = NetworkProfile::new(
            "local",
            Endpoint::Url("http://localhost:8545".to_string()),
            "ACCOUNT_PRIVATE_KEY",
            0,
        );
        assert!(matches!(
            registry.register(profile),
            Err(ConfigError::InvalidGasLimit { .. })
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_unknown_network() {
        let registry = NetworkProfileRegistry::new();
        assert_eq!(
            registry.get("mainnet").unwrap_err(),
            ConfigError::UnknownNetwork {
                name: "mainnet".to_string()
            }
        );
    }

    #[test]
    fn test_secret_refs() {
        let goerli = goerli();
        let refs: Vec<&str> = goerli.secret_refs().collect();
        assert_eq!(
            refs,
            vec!["ETH_GOERLI_ENDPOINT", "ACCOUNT_PRIVATE_KEY", "ETH_GOERLI_KEY"]
        );

        let local = NetworkProfile::new(
            "local",
            Endpoint::Url("http://localhost:8545".to_string()),
            "ACCOUNT_PRIVATE_KEY",
            30_000_000,
        );
        assert_eq!(local.secret_refs().collect::<Vec<_>>(), vec!["ACCOUNT_PRIVATE_KEY"]);
    }
}
