//! One-pass validation that turns registries into a [`BuildConfiguration`]

use crate::{
    compiler::CompilerRegistry,
    configuration::{BuildConfiguration, ResolvedNetwork},
    error::{ConfigError, ValidationReport},
    network::{Endpoint, NetworkProfile, NetworkProfileRegistry},
    plan::{BuildJob, BuildPlanResolver},
    secrets::{SecretResolver, SecretStore, SecretValue},
    settings::SettingsLayer,
    version::SourceVersionMap,
};
use std::collections::BTreeMap;
use url::Url;

const ENDPOINT_SCHEMES: &[&str] = &["http", "https", "ws", "wss"];

/// Runs every configuration check before any compiler or network is touched.
///
/// All problems are collected into a single [`ValidationReport`]. `validate`
/// consumes the validator, so a pass cannot be repeated or resumed.
pub struct ConfigValidator<'a> {
    compilers: &'a CompilerRegistry,
    defaults: Option<&'a SettingsLayer>,
    sources: &'a SourceVersionMap,
    networks: &'a NetworkProfileRegistry,
    secrets: SecretResolver<'a>,
}

impl<'a> ConfigValidator<'a> {
    pub fn new(
        compilers: &'a CompilerRegistry,
        sources: &'a SourceVersionMap,
        networks: &'a NetworkProfileRegistry,
        secrets: &'a dyn SecretStore,
    ) -> Self {
        Self {
            compilers,
            defaults: None,
            sources,
            networks,
            secrets: SecretResolver::new(secrets),
        }
    }

    /// Global settings layer applied beneath every compiler's own settings
    pub fn with_defaults(mut self, defaults: &'a SettingsLayer) -> Self {
        self.defaults = Some(defaults);
        self
    }

    pub fn validate(self) -> Result<BuildConfiguration, ValidationReport> {
        tracing::info!(
            "Validating {} source unit(s) against {} compiler(s) and {} network(s)",
            self.sources.len(),
            self.compilers.len(),
            self.networks.len()
        );

        let mut errors = Vec::new();
        let no_defaults = SettingsLayer::default();
        let defaults = self.defaults.unwrap_or(&no_defaults);

        let plan = BuildPlanResolver::new(self.compilers, defaults).resolve(self.sources);
        errors.extend(plan.unresolved);
        for job in &plan.jobs {
            errors.extend(job.settings.check(&job.version));
        }
        let jobs = plan.jobs;

        let mut networks = BTreeMap::new();
        for profile in self.networks.iter() {
            match self.resolve_network(profile) {
                Ok(network) => {
                    networks.insert(profile.name.clone(), network);
                }
                Err(network_errors) => errors.extend(network_errors),
            }
        }

        if !errors.is_empty() {
            tracing::warn!("Configuration rejected with {} error(s)", errors.len());
            return Err(ValidationReport::new(errors));
        }

        log_plan(&jobs);
        Ok(BuildConfiguration::new(jobs, networks))
    }

    fn resolve_network(&self, profile: &NetworkProfile) -> Result<ResolvedNetwork, Vec<ConfigError>> {
        let mut errors = Vec::new();
        let name = &profile.name;

        let endpoint = match &profile.endpoint {
            Endpoint::Url(raw) => parse_endpoint(name, raw, true),
            Endpoint::Secret(reference) => self
                .secret(name, reference)
                .and_then(|value| parse_endpoint(name, value.expose(), false)),
        };
        let endpoint = keep_ok(endpoint, &mut errors);

        let account = keep_ok(self.secret(name, &profile.account_secret_ref), &mut errors);

        let explorer_api_key = match &profile.explorer_api_key_ref {
            Some(reference) => keep_ok(self.secret(name, reference), &mut errors),
            None => None,
        };

        match (endpoint, account) {
            (Some(endpoint), Some(account)) if errors.is_empty() => {
                tracing::debug!("Network {} resolved to host {:?}", name, endpoint.host_str());
                Ok(ResolvedNetwork {
                    name: name.clone(),
                    endpoint,
                    account,
                    gas_limit: profile.gas_limit,
                    chain_id: profile.chain_id,
                    explorer_api_key,
                    explorer_network: profile
                        .explorer_network
                        .clone()
                        .unwrap_or_else(|| name.clone()),
                })
            }
            _ => Err(errors),
        }
    }

    fn secret(&self, network: &str, reference: &str) -> Result<SecretValue, ConfigError> {
        self.secrets
            .resolve(reference)
            .map_err(|missing| ConfigError::MissingSecret {
                network: network.to_string(),
                reference: missing.reference,
            })
    }
}

fn keep_ok<T>(result: Result<T, ConfigError>, errors: &mut Vec<ConfigError>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(err) => {
            errors.push(err);
            None
        }
    }
}

/// Parses an RPC endpoint. Input sourced from a secret is never echoed back.
fn parse_endpoint(network: &str, raw: &str, literal: bool) -> Result<Url, ConfigError> {
    let malformed = |reason: String| ConfigError::MalformedEndpoint {
        network: network.to_string(),
        reason,
    };

    let url = Url::parse(raw.trim()).map_err(|e| {
        if literal {
            malformed(format!("`{raw}`: {e}"))
        } else {
            malformed(e.to_string())
        }
    })?;

    if !ENDPOINT_SCHEMES.contains(&url.scheme()) {
        return Err(malformed(format!("unsupported scheme `{}`", url.scheme())));
    }
    if url.host_str().is_none() {
        return Err(malformed("missing host".to_string()));
    }

    Ok(url)
}

fn log_plan(jobs: &[BuildJob]) {
    for job in jobs {
        tracing::info!(
            "solc {}: {} source unit(s), optimizer {} ({} runs)",
            job.version,
            job.sources.len(),
            if job.settings.optimizer.enabled { "on" } else { "off" },
            job.settings.optimizer.runs
        );
    }
}
