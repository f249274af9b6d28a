//! Compiler settings: the optional layers found in configuration documents and
//! the concrete settings block handed to the compiler.

use crate::error::ConfigError;
use semver::Version;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Optimizer runs used when nothing else is configured
pub const DEFAULT_OPTIMIZER_RUNS: u32 = 200;

/// Named EVM hard-fork targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EvmVersion {
    Homestead,
    TangerineWhistle,
    SpuriousDragon,
    Byzantium,
    Constantinople,
    Petersburg,
    Istanbul,
    Berlin,
    London,
    Paris,
    Shanghai,
    Cancun,
}

impl EvmVersion {
    pub fn as_str(&self) -> &'static str {
        match self {
            EvmVersion::Homestead => "homestead",
            EvmVersion::TangerineWhistle => "tangerineWhistle",
            EvmVersion::SpuriousDragon => "spuriousDragon",
            EvmVersion::Byzantium => "byzantium",
            EvmVersion::Constantinople => "constantinople",
            EvmVersion::Petersburg => "petersburg",
            EvmVersion::Istanbul => "istanbul",
            EvmVersion::Berlin => "berlin",
            EvmVersion::London => "london",
            EvmVersion::Paris => "paris",
            EvmVersion::Shanghai => "shanghai",
            EvmVersion::Cancun => "cancun",
        }
    }

    /// Oldest compiler release that accepts this target
    pub fn min_compiler(&self) -> Version {
        let (minor, patch) = match self {
            EvmVersion::Homestead | EvmVersion::TangerineWhistle | EvmVersion::SpuriousDragon => {
                (4, 0)
            }
            EvmVersion::Byzantium | EvmVersion::Constantinople => (4, 21),
            EvmVersion::Petersburg => (5, 5),
            EvmVersion::Istanbul => (5, 14),
            EvmVersion::Berlin => (8, 5),
            EvmVersion::London => (8, 7),
            EvmVersion::Paris => (8, 18),
            EvmVersion::Shanghai => (8, 20),
            EvmVersion::Cancun => (8, 24),
        };
        Version::new(0, minor, patch)
    }

    pub fn supported_by(&self, compiler: &Version) -> bool {
        *compiler >= self.min_compiler()
    }
}

impl fmt::Display for EvmVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Hash scheme appended to the bytecode metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BytecodeHash {
    Ipfs,
    Bzzr1,
    None,
}

/// How revert and require reason strings are treated
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RevertStrings {
    #[default]
    Default,
    Strip,
    Debug,
    VerboseDebug,
}

/// Fine-grained optimizer switches.
///
/// Documents use snake_case keys; the compiler receives camelCase.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all(serialize = "camelCase"), deny_unknown_fields)]
pub struct OptimizerDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peephole: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inliner: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jumpdest_remover: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_literals: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deduplicate: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cse: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constant_optimizer: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub yul: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizerSettings {
    pub enabled: bool,
    pub runs: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<OptimizerDetails>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_literal_content: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bytecode_hash: Option<BytecodeHash>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugSettings {
    pub revert_strings: RevertStrings,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub debug_info: Vec<String>,
}

/// Output selection in the compiler's `file -> contract -> outputs` shape
pub type OutputSelection = BTreeMap<String, BTreeMap<String, Vec<String>>>;

/// Selection requested when a configuration does not name one
pub fn default_output_selection() -> OutputSelection {
    let contract_outputs: Vec<String> = [
        "abi",
        "evm.bytecode",
        "evm.deployedBytecode",
        "evm.methodIdentifiers",
        "metadata",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();

    let mut per_file = BTreeMap::new();
    per_file.insert("*".to_string(), contract_outputs);
    per_file.insert(String::new(), vec!["ast".to_string()]);

    let mut selection = BTreeMap::new();
    selection.insert("*".to_string(), per_file);
    selection
}

/// Deployed library addresses keyed by source file, then library name
pub type Libraries = BTreeMap<String, BTreeMap<String, String>>;

/// Fully merged settings for one compiler version.
///
/// Serializes to the `settings` object of the compiler's standard JSON input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompilerSettings {
    pub optimizer: OptimizerSettings,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evm_version: Option<EvmVersion>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<MetadataSettings>,
    pub debug: DebugSettings,
    pub output_selection: OutputSelection,
    pub libraries: Libraries,
}

impl Default for CompilerSettings {
    fn default() -> Self {
        Self {
            optimizer: OptimizerSettings {
                enabled: false,
                runs: DEFAULT_OPTIMIZER_RUNS,
                details: None,
            },
            evm_version: None,
            metadata: None,
            debug: DebugSettings {
                revert_strings: RevertStrings::Default,
                debug_info: Vec::new(),
            },
            output_selection: default_output_selection(),
            libraries: BTreeMap::new(),
        }
    }
}

impl CompilerSettings {
    /// Merges layers onto the built-in defaults; later layers win
    pub fn from_layers<'a>(layers: impl IntoIterator<Item = &'a SettingsLayer>) -> Self {
        let mut settings = Self::default();
        for layer in layers {
            settings.apply(layer);
        }
        settings
    }

    fn apply(&mut self, layer: &SettingsLayer) {
        if let Some(optimizer) = &layer.optimizer {
            if let Some(enabled) = optimizer.enabled {
                self.optimizer.enabled = enabled;
            }
            if let Some(runs) = optimizer.runs {
                self.optimizer.runs = runs;
            }
            if let Some(details) = &optimizer.details {
                self.optimizer.details = Some(details.clone());
            }
        }

        if let Some(evm_version) = layer.evm_version {
            self.evm_version = Some(evm_version);
        }

        if let Some(metadata) = &layer.metadata {
            let current = self.metadata.get_or_insert(MetadataSettings {
                use_literal_content: None,
                bytecode_hash: None,
            });
            if metadata.use_literal_content.is_some() {
                current.use_literal_content = metadata.use_literal_content;
            }
            if metadata.bytecode_hash.is_some() {
                current.bytecode_hash = metadata.bytecode_hash;
            }
        }

        if let Some(debug) = &layer.debug {
            if let Some(revert_strings) = debug.revert_strings {
                self.debug.revert_strings = revert_strings;
            }
            if let Some(debug_info) = &debug.debug_info {
                self.debug.debug_info = debug_info.clone();
            }
        }

        if let Some(selection) = &layer.output_selection {
            self.output_selection = selection.clone();
        }

        for (file, libraries) in &layer.libraries {
            let linked = self.libraries.entry(file.clone()).or_default();
            for (name, address) in libraries {
                linked.insert(name.clone(), address.clone());
            }
        }
    }

    /// Checks the merged settings against the compiler they will run on
    pub fn check(&self, version: &Version) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if self.optimizer.enabled && self.optimizer.runs == 0 {
            errors.push(ConfigError::InvalidOptimizerRuns {
                version: version.clone(),
            });
        }

        if let Some(evm_version) = self.evm_version {
            if !evm_version.supported_by(version) {
                errors.push(ConfigError::UnsupportedEvmVersion {
                    version: version.clone(),
                    evm_version: evm_version.to_string(),
                    minimum: evm_version.min_compiler(),
                });
            }
        }

        for (file, libraries) in &self.libraries {
            for (library, address) in libraries {
                if !is_address(address) {
                    errors.push(ConfigError::MalformedLibraryAddress {
                        version: version.clone(),
                        library: format!("{file}:{library}"),
                    });
                }
            }
        }

        errors
    }
}

fn is_address(value: &str) -> bool {
    value
        .strip_prefix("0x")
        .is_some_and(|hex| hex.len() == 40 && hex.chars().all(|c| c.is_ascii_hexdigit()))
}

/// Partial settings as written in a configuration document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SettingsLayer {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optimizer: Option<OptimizerLayer>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evm_version: Option<EvmVersion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<MetadataLayer>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug: Option<DebugLayer>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_selection: Option<OutputSelection>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub libraries: Libraries,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OptimizerLayer {
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub runs: Option<u32>,
    #[serde(default)]
    pub details: Option<OptimizerDetails>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetadataLayer {
    #[serde(default)]
    pub use_literal_content: Option<bool>,
    #[serde(default)]
    pub bytecode_hash: Option<BytecodeHash>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DebugLayer {
    #[serde(default)]
    pub revert_strings: Option<RevertStrings>,
    #[serde(default)]
    pub debug_info: Option<Vec<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    #[test]
    fn test_defaults() {
        let settings = CompilerSettings::default();
        assert!(!settings.optimizer.enabled);
        assert_eq!(settings.optimizer.runs, DEFAULT_OPTIMIZER_RUNS);
        assert_eq!(settings.debug.revert_strings, RevertStrings::Default);
        assert_eq!(settings.output_selection["*"][""], vec!["ast"]);
        assert!(settings.check(&v("0.5.0")).is_empty());
    }

    #[test]
    fn test_compiler_layer_overrides_global_layer() {
        let global = SettingsLayer {
            optimizer: Some(OptimizerLayer {
                enabled: Some(true),
                runs: Some(1000),
                details: None,
            }),
            libraries: BTreeMap::from([(
                "lib/Math.sol".to_string(),
                BTreeMap::from([
                    ("Math".to_string(), format!("0x{}", "1".repeat(40))),
                    ("SafeMath".to_string(), format!("0x{}", "2".repeat(40))),
                ]),
            )]),
            ..Default::default()
        };
        let local = SettingsLayer {
            optimizer: Some(OptimizerLayer {
                enabled: None,
                runs: Some(200),
                details: None,
            }),
            evm_version: Some(EvmVersion::London),
            libraries: BTreeMap::from([
                (
                    "lib/Math.sol".to_string(),
                    BTreeMap::from([("Math".to_string(), format!("0x{}", "a".repeat(40)))]),
                ),
                (
                    "lib/Strings.sol".to_string(),
                    BTreeMap::from([("Strings".to_string(), format!("0x{}", "3".repeat(40)))]),
                ),
            ]),
            ..Default::default()
        };

        let settings = CompilerSettings::from_layers([&global, &local]);

        assert!(settings.optimizer.enabled);
        assert_eq!(settings.optimizer.runs, 200);
        assert_eq!(settings.evm_version, Some(EvmVersion::London));
        let math = &settings.libraries["lib/Math.sol"];
        assert_eq!(math["Math"], format!("0x{}", "a".repeat(40)));
        assert_eq!(math["SafeMath"], format!("0x{}", "2".repeat(40)));
        assert_eq!(
            settings.libraries["lib/Strings.sol"]["Strings"],
            format!("0x{}", "3".repeat(40))
        );
    }

    #[test]
    fn test_serializes_to_standard_json_shape() {
        let layer = SettingsLayer {
            optimizer: Some(OptimizerLayer {
                enabled: Some(true),
                runs: None,
                details: Some(OptimizerDetails {
                    inliner: Some(true),
                    cse: Some(true),
                    order_literals: Some(true),
                    ..Default::default()
                }),
            }),
            evm_version: Some(EvmVersion::London),
            metadata: Some(MetadataLayer {
                use_literal_content: Some(true),
                bytecode_hash: Some(BytecodeHash::Ipfs),
            }),
            debug: Some(DebugLayer {
                revert_strings: Some(RevertStrings::Debug),
                debug_info: Some(vec!["location".to_string(), "snippet".to_string()]),
            }),
            ..Default::default()
        };

        let value = serde_json::to_value(CompilerSettings::from_layers([&layer])).unwrap();

        assert_eq!(
            value["optimizer"],
            json!({
                "enabled": true,
                "runs": 200,
                "details": {"inliner": true, "orderLiterals": true, "cse": true}
            })
        );
        assert_eq!(value["evmVersion"], "london");
        assert_eq!(
            value["metadata"],
            json!({"useLiteralContent": true, "bytecodeHash": "ipfs"})
        );
        assert_eq!(
            value["debug"],
            json!({"revertStrings": "debug", "debugInfo": ["location", "snippet"]})
        );
        assert_eq!(value["libraries"], json!({}));
    }

    #[test]
    fn test_check_reports_every_problem() {
        let layer = SettingsLayer {
            optimizer: Some(OptimizerLayer {
                enabled: Some(true),
                runs: Some(0),
                details: None,
            }),
            evm_version: Some(EvmVersion::Shanghai),
            libraries: BTreeMap::from([(
                "lib/Math.sol".to_string(),
                BTreeMap::from([("Math".to_string(), "0x1234".to_string())]),
            )]),
            ..Default::default()
        };
        let settings = CompilerSettings::from_layers([&layer]);

        let errors = settings.check(&v("0.8.17"));

        assert_eq!(errors.len(), 3);
        assert!(matches!(errors[0], ConfigError::InvalidOptimizerRuns { .. }));
        assert!(matches!(
            &errors[1],
            ConfigError::UnsupportedEvmVersion { evm_version, .. } if evm_version == "shanghai"
        ));
        assert!(matches!(
            &errors[2],
            ConfigError::MalformedLibraryAddress { library, .. } if library == "lib/Math.sol:Math"
        ));
    }

    #[test]
    fn test_libraries_nest_under_source_file() {
        let layer: SettingsLayer = toml::from_str(
            r#"
[libraries."contracts/lib/Math.sol"]
Math = "0x1111111111111111111111111111111111111111"
"#,
        )
        .unwrap();

        let value = serde_json::to_value(CompilerSettings::from_layers([&layer])).unwrap();

        assert_eq!(
            value["libraries"],
            json!({
                "contracts/lib/Math.sol": {
                    "Math": "0x1111111111111111111111111111111111111111"
                }
            })
        );
    }

    #[test]
    fn test_evm_support() {
        assert!(EvmVersion::London.supported_by(&v("0.8.17")));
        assert!(!EvmVersion::London.supported_by(&v("0.7.6")));
        assert!(EvmVersion::Petersburg.supported_by(&v("0.5.5")));
        assert!(EvmVersion::Homestead.supported_by(&v("0.5.0")));
    }

    #[test]
    fn test_layer_rejects_unknown_keys() {
        let parsed: Result<SettingsLayer, _> = toml::from_str("optimiser = { enabled = true }");
        assert!(parsed.is_err());
    }
}
