//! CLI for the forgeplan library
//!
//! Validates Solidity build and deployment configuration before anything is
//! compiled or deployed.

use clap::{Parser, Subcommand};
use eyre::{Context, Result};
use forgeplan::{
    structural_error, BuildConfiguration, EnvSecretStore, ProjectConfig, ValidationReport,
    DEFAULT_CONFIG_FILE,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Solidity build configuration resolver
#[derive(Parser, Debug)]
#[command(name = "forgeplan")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress all logging except errors
    #[arg(short, long, global = true)]
    quiet: bool,
}

/// Where configuration and secrets come from
#[derive(Parser, Debug, Clone)]
struct ConfigSource {
    /// Configuration document (TOML, or JSON with a .json extension)
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Dotenv file read before the process environment
    #[arg(long)]
    env_file: Option<PathBuf>,

    /// Output JSON to stdout
    #[arg(long)]
    json: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Validate compilers, sources and networks in one pass
    Validate {
        #[command(flatten)]
        source: ConfigSource,
    },

    /// Print the compiler inputs of the validated build plan
    Plan {
        #[command(flatten)]
        source: ConfigSource,
    },

    /// List validated deployment networks
    Networks {
        #[command(flatten)]
        source: ConfigSource,
    },
}

#[derive(Debug, Serialize)]
#[serde(tag = "status")]
enum Output {
    #[serde(rename = "success")]
    Success {
        #[serde(flatten)]
        data: SuccessData,
    },

    #[serde(rename = "error")]
    Error {
        error_type: String,
        message: String,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        errors: Vec<String>,
    },
}

#[derive(Debug, Serialize)]
#[serde(tag = "command")]
enum SuccessData {
    #[serde(rename = "validate")]
    Validate {
        jobs: usize,
        source_units: usize,
        networks: Vec<String>,
        fingerprint: String,
    },

    #[serde(rename = "plan")]
    Plan { jobs: Vec<serde_json::Value> },

    #[serde(rename = "networks")]
    Networks { networks: Vec<NetworkJson> },
}

#[derive(Debug, Serialize)]
struct NetworkJson {
    name: String,
    host: String,
    gas_limit: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    chain_id: Option<u64>,
    explorer_api_key: bool,
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.quiet {
        "error"
    } else if cli.verbose {
        "debug"
    } else {
        "info"
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let (result, json) = match cli.command {
        Commands::Validate { source } => (run_validate(&source), source.json),
        Commands::Plan { source } => (run_plan(&source), source.json),
        Commands::Networks { source } => (run_networks(&source), source.json),
    };

    if let Err(e) = result {
        output_error(e, json);
        std::process::exit(1);
    }
}

/// Loads the document and secrets, then validates
fn load_and_validate(source: &ConfigSource) -> Result<BuildConfiguration> {
    let config = ProjectConfig::load(&source.config)?;
    let project_root = project_root(&source.config);
    let registries = config
        .registries(&project_root)
        .context("Invalid configuration document")?;

    let secrets = match &source.env_file {
        Some(path) => EnvSecretStore::with_dotenv(path)?,
        None => EnvSecretStore::from_process(),
    };

    let build = registries.validator(&secrets).validate()?;
    Ok(build)
}

fn project_root(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn run_validate(source: &ConfigSource) -> Result<()> {
    let build = load_and_validate(source)?;
    let source_units = build.source_assignments().len();
    let networks: Vec<String> = build.networks().map(|n| n.name().to_string()).collect();

    if source.json {
        let output = Output::Success {
            data: SuccessData::Validate {
                jobs: build.jobs().len(),
                source_units,
                networks,
                fingerprint: build.fingerprint(),
            },
        };
        println!("{}", serde_json::to_string(&output)?);
    } else {
        println!("✅ Configuration is valid");
        for job in build.jobs() {
            println!(
                "   - solc {} ({} source unit(s))",
                job.version,
                job.sources.len()
            );
        }
        if !networks.is_empty() {
            println!("🌐 Networks: {}", networks.join(", "));
        }
        println!("🔒 Plan fingerprint: {}", build.fingerprint());
    }

    Ok(())
}

fn run_plan(source: &ConfigSource) -> Result<()> {
    let build = load_and_validate(source)?;

    let jobs = build
        .compiler_inputs()
        .map(serde_json::to_value)
        .collect::<Result<Vec<_>, _>>()?;

    if source.json {
        let output = Output::Success {
            data: SuccessData::Plan { jobs },
        };
        println!("{}", serde_json::to_string(&output)?);
    } else {
        println!("{}", serde_json::to_string_pretty(&jobs)?);
    }

    Ok(())
}

fn run_networks(source: &ConfigSource) -> Result<()> {
    let build = load_and_validate(source)?;

    let networks: Vec<NetworkJson> = build
        .networks()
        .map(|n| NetworkJson {
            name: n.name().to_string(),
            host: n.host().to_string(),
            gas_limit: n.gas_limit(),
            chain_id: n.chain_id(),
            explorer_api_key: n.has_explorer_api_key(),
        })
        .collect();

    if source.json {
        let output = Output::Success {
            data: SuccessData::Networks { networks },
        };
        println!("{}", serde_json::to_string(&output)?);
    } else if networks.is_empty() {
        println!("No networks configured");
    } else {
        for network in &networks {
            let chain = network
                .chain_id
                .map(|id| format!("chain {id}"))
                .unwrap_or_else(|| "chain unpinned".to_string());
            let explorer = if network.explorer_api_key { "explorer key" } else { "no explorer key" };
            println!(
                "🌐 {}: {} ({}, gas limit {}, {})",
                network.name, network.host, chain, network.gas_limit, explorer
            );
        }
    }

    Ok(())
}

fn output_error(error: eyre::Report, json: bool) {
    let (error_type, errors) = if let Some(report) = error.downcast_ref::<ValidationReport>() {
        (
            "invalid_configuration",
            report.errors().iter().map(|e| e.to_string()).collect(),
        )
    } else if structural_error(&error).is_some() {
        ("malformed_configuration", Vec::new())
    } else {
        ("load_error", Vec::new())
    };

    if !json {
        eprintln!("❌ {error:#}");
        return;
    }

    let output = Output::Error {
        error_type: error_type.to_string(),
        message: format!("{error:#}"),
        errors,
    };

    match serde_json::to_string(&output) {
        Ok(rendered) => eprintln!("{rendered}"),
        Err(_) => eprintln!("❌ {error:#}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::parse_from(["forgeplan", "validate"]);
        match cli.command {
            Commands::Validate { source } => {
                assert_eq!(source.config, PathBuf::from(DEFAULT_CONFIG_FILE));
                assert!(source.env_file.is_none());
                assert!(!source.json);
            }
            other => panic!("unexpected command: {other:?}"),
        }

        let cli = Cli::parse_from([
            "forgeplan",
            "plan",
            "--config",
            "deploy/forgeplan.json",
            "--env-file",
            ".env",
            "--json",
            "-v",
        ]);
        assert!(cli.verbose);
        match cli.command {
            Commands::Plan { source } => {
                assert_eq!(source.config, PathBuf::from("deploy/forgeplan.json"));
                assert_eq!(source.env_file, Some(PathBuf::from(".env")));
                assert!(source.json);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_project_root_from_config_path() {
        assert_eq!(project_root(Path::new("forgeplan.toml")), PathBuf::from("."));
        assert_eq!(
            project_root(Path::new("deploy/forgeplan.toml")),
            PathBuf::from("deploy")
        );
    }

    #[test]
    fn test_invalid_configuration_is_reported_as_validation_report() {
        let temp_dir = TempDir::new().unwrap();
        let config = temp_dir.path().join("forgeplan.toml");
        fs::write(
            &config,
            r#"
[[solidity.compilers]]
version = "0.8.17"

[sources.requirements]
"Legacy.sol" = "^0.6.0"
"#,
        )
        .unwrap();
        let env_file = temp_dir.path().join(".env");
        fs::write(&env_file, "").unwrap();

        let source = ConfigSource {
            config,
            env_file: Some(env_file),
            json: true,
        };

        let err = load_and_validate(&source).unwrap_err();
        let report = err.downcast_ref::<ValidationReport>().unwrap();
        assert_eq!(report.len(), 1);
    }
}
