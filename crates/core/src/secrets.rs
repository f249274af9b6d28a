//! Secret lookup against an environment snapshot
//!
//! Resolved values live only in memory. [`SecretValue`] has no `Display` or
//! `Serialize`, and its `Debug` output is redacted.

use eyre::{Context, Result};
use std::{
    collections::{BTreeMap, HashMap},
    fmt,
    path::Path,
};

/// Read-only key/value source that secret references are resolved against
pub trait SecretStore {
    fn lookup(&self, key: &str) -> Option<String>;
}

impl SecretStore for BTreeMap<String, String> {
    fn lookup(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

impl SecretStore for HashMap<String, String> {
    fn lookup(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

/// Snapshot of the process environment, taken once at startup
#[derive(Clone, Default)]
pub struct EnvSecretStore {
    vars: BTreeMap<String, String>,
}

impl EnvSecretStore {
    /// Captures the current process environment
    pub fn from_process() -> Self {
        Self {
            vars: process_vars().collect(),
        }
    }

    /// Reads a dotenv file, then overlays the process environment on top of it
    pub fn with_dotenv(path: &Path) -> Result<Self> {
        let mut vars = BTreeMap::new();
        let entries = dotenvy::from_path_iter(path)
            .with_context(|| format!("Failed to open {}", path.display()))?;
        for entry in entries {
            let (key, value) =
                entry.with_context(|| format!("Failed to parse {}", path.display()))?;
            vars.insert(key, value);
        }
        let from_file = vars.len();

        vars.extend(process_vars());
        tracing::debug!("Loaded {} entries from {}", from_file, path.display());

        Ok(Self { vars })
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

/// Process variables with valid UTF-8 names and values; others are skipped
fn process_vars() -> impl Iterator<Item = (String, String)> {
    std::env::vars_os()
        .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?)))
}

impl fmt::Debug for EnvSecretStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnvSecretStore")
            .field("entries", &self.vars.len())
            .finish()
    }
}

impl SecretStore for EnvSecretStore {
    fn lookup(&self, key: &str) -> Option<String> {
        self.vars.get(key).cloned()
    }
}

/// A resolved secret. The value is only reachable through [`SecretValue::expose`].
#[derive(Clone, PartialEq, Eq)]
pub struct SecretValue(String);

impl SecretValue {
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SecretValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretValue(<redacted>)")
    }
}

/// A referenced secret that is unset, empty or blank
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("secret `{reference}` is not set")]
pub struct MissingSecret {
    pub reference: String,
}

/// Resolves secret references by name
pub struct SecretResolver<'a> {
    store: &'a dyn SecretStore,
}

impl<'a> SecretResolver<'a> {
    pub fn new(store: &'a dyn SecretStore) -> Self {
        Self { store }
    }

    pub fn resolve(&self, reference: &str) -> Result<SecretValue, MissingSecret> {
        match self.store.lookup(reference) {
            Some(value) if !value.trim().is_empty() => Ok(SecretValue(value)),
            _ => Err(MissingSecret {
                reference: reference.to_string(),
            }),
        }
    }
}
