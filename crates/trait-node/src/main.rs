// trait-node/src/main.rs
use anyhow::Context;
use chain_core::EpochId;
use clap::{Parser, Subcommand};
use std::path::Path;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use trait_engine::{BlockContext, ContractId, DeployRequest, Engine, EpochRuleSet, LanguageVersion};

#[derive(Parser)]
#[command(name = "trait-node")]
#[command(about = "Epoch-gated trait conformance and dispatch node", version, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    Init {
        /// Configuration file path
        #[arg(short, long, default_value = "./trait-node.toml")]
        config: String,
    },

    /// Apply a transaction plan and print the receipts
    Run {
        /// Configuration file path
        #[arg(short, long, default_value = "./trait-node.toml")]
        config: String,

        /// Plan file (JSON)
        #[arg(short, long)]
        plan: String,
    },

    /// Show the rules in force for an epoch
    Rules {
        /// Epoch, e.g. 2.05
        #[arg(short, long)]
        epoch: String,

        /// Language version requested by a deployment (v1, v2)
        #[arg(short, long)]
        language: Option<String>,
    },

    /// Validate a contract source file against an empty chain
    Check {
        /// Epoch, e.g. 2.1
        #[arg(short, long)]
        epoch: String,

        /// Language version requested by the deployment (v1, v2)
        #[arg(short, long)]
        language: Option<String>,

        /// Issuer principal of the contract
        #[arg(short, long, default_value = "ST1PQHQKV0RJXZFY1DGX8MNSNYVE3VGZJSRTPGZGM")]
        issuer: String,

        /// Contract source file
        file: String,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "{}={},trait_engine={},chain_core={}",
                    env!("CARGO_PKG_NAME").replace('-', "_"),
                    log_level,
                    log_level,
                    log_level
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Commands::Init { config } => init_config(&config),
        Commands::Run { config, plan } => run_plan(&config, &plan),
        Commands::Rules { epoch, language } => show_rules(&epoch, language.as_deref()),
        Commands::Check {
            epoch,
            language,
            issuer,
            file,
        } => check_source(&epoch, language.as_deref(), &issuer, &file),
    }
}

fn parse_epoch(epoch: &str) -> anyhow::Result<EpochId> {
    Ok(epoch.parse()?)
}

fn parse_version(version: Option<&str>) -> anyhow::Result<Option<LanguageVersion>> {
    version
        .map(|v| v.parse::<LanguageVersion>().map_err(anyhow::Error::msg))
        .transpose()
}

fn init_config(path: &str) -> anyhow::Result<()> {
    tracing::info!("Writing default configuration to {}", path);

    if let Some(parent) = Path::new(path).parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    trait_node::NodeConfig::default().to_file(path)?;

    tracing::info!("Edit {} to configure epochs, fees and genesis accounts", path);
    Ok(())
}

fn run_plan(config_path: &str, plan_path: &str) -> anyhow::Result<()> {
    use trait_node::{Node, NodeConfig, Plan};

    tracing::info!("Loading configuration from {}", config_path);
    let config = NodeConfig::from_file(config_path).with_context(|| format!("reading {}", config_path))?;
    let plan = Plan::from_file(plan_path).with_context(|| format!("reading {}", plan_path))?;

    let mut node = Node::new(config)?;
    let outputs = node.run(&plan)?;

    println!("{}", serde_json::to_string_pretty(&outputs)?);
    tracing::info!(
        "Plan applied: final height {}, fees collected {}",
        node.height(),
        node.ledger().fees_collected()
    );
    Ok(())
}

fn show_rules(epoch: &str, version: Option<&str>) -> anyhow::Result<()> {
    let epoch = parse_epoch(epoch)?;
    let rules = EpochRuleSet::for_deployment(epoch, parse_version(version)?)?;
    println!("{}", serde_json::to_string_pretty(&rules)?);
    Ok(())
}

fn check_source(epoch: &str, version: Option<&str>, issuer: &str, file: &str) -> anyhow::Result<()> {
    let epoch = parse_epoch(epoch)?;
    let name = Path::new(file)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .with_context(|| format!("cannot derive a contract name from {}", file))?;

    let request = DeployRequest {
        contract: ContractId::new(issuer, name),
        source: std::fs::read_to_string(file)?,
        language_version: parse_version(version)?,
    };

    let engine = Engine::default();
    let prepared = engine.prepare_deployment(&request, BlockContext::new(0, epoch))?;
    let record = prepared.record();

    println!("{} is valid in epoch {} ({})", record.id, epoch, record.language_version);
    for definition in prepared.traits() {
        println!("  defines {} ({} methods)", definition.identity, definition.methods.len());
    }
    for trait_id in &record.implemented_traits {
        println!("  implements {}", trait_id);
    }
    for signature in &record.public_interface {
        println!("  exposes {}", signature);
    }
    Ok(())
}
