// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
use anyhow::{Result, bail};
use bas_cli::commands::{self, SchemaKind};
use bas_cli::format;
use bas_core::JobStatus;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "bas", version, about = "Breach-and-attack simulation engine CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging.
    #[arg(long, global = true)]
    debug: bool,

    /// Emit logs as JSON lines on stderr.
    #[arg(long, global = true)]
    log_json: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List platforms with a registered adapter.
    Platforms {
        /// Engine configuration (TOML).
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Run a scenario to completion and print the final job.
    Run {
        /// Scenario file (JSON).
        #[arg(long)]
        scenario: PathBuf,

        /// Engine configuration (TOML).
        #[arg(long)]
        config: Option<PathBuf>,

        /// Seed for the mock adapter's random source.
        #[arg(long)]
        seed: Option<u64>,

        /// Print the job snapshot as JSON instead of text.
        #[arg(long)]
        json: bool,
    },

    /// Check that the remote automation service is reachable.
    Health {
        /// Engine configuration (TOML).
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Validate a configuration file and print any warnings.
    ValidateConfig {
        /// Configuration file (TOML).
        file: PathBuf,
    },

    /// Print a JSON schema.
    Schema {
        #[arg(value_enum, default_value_t = SchemaArg::Scenario)]
        kind: SchemaArg,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SchemaArg {
    Scenario,
    Findings,
    Config,
}

impl From<SchemaArg> for SchemaKind {
    fn from(v: SchemaArg) -> Self {
        match v {
            SchemaArg::Scenario => SchemaKind::Scenario,
            SchemaArg::Findings => SchemaKind::Findings,
            SchemaArg::Config => SchemaKind::Config,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.debug {
        EnvFilter::new("bas=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("bas=info"))
    };
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if cli.log_json {
        builder.json().init();
    } else {
        builder.init();
    }

    match cli.command {
        Commands::Platforms { config } => cmd_platforms(config),
        Commands::Run {
            scenario,
            config,
            seed,
            json,
        } => cmd_run(scenario, config, seed, json).await,
        Commands::Health { config } => cmd_health(config).await,
        Commands::ValidateConfig { file } => cmd_validate_config(file),
        Commands::Schema { kind } => {
            println!("{}", commands::schema_json(kind.into())?);
            Ok(())
        }
    }
}

fn cmd_platforms(config: Option<PathBuf>) -> Result<()> {
    let (config, _) = commands::resolve_config(config.as_deref())?;
    let engine = commands::build_engine(config, None);
    for p in engine.platforms() {
        println!("{p}");
    }
    Ok(())
}

async fn cmd_run(
    scenario: PathBuf,
    config: Option<PathBuf>,
    seed: Option<u64>,
    json: bool,
) -> Result<()> {
    let (config, _) = commands::resolve_config(config.as_deref())?;
    let scenario = commands::load_scenario(&scenario)?;
    let engine = commands::build_engine(config, seed);
    let job = commands::run_scenario(&engine, scenario).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&job)?);
    } else {
        print!("{}", format::format_job(&job));
    }

    if job.status == JobStatus::Failed {
        bail!("simulation {} failed", job.job_id);
    }
    Ok(())
}

async fn cmd_health(config: Option<PathBuf>) -> Result<()> {
    let (config, _) = commands::resolve_config(config.as_deref())?;
    let report = commands::health(&config).await;
    println!("{}", serde_json::to_string(&report)?);
    if !report.healthy && config.remote.enabled {
        bail!("remote service unhealthy: {}", report.reason);
    }
    Ok(())
}

fn cmd_validate_config(file: PathBuf) -> Result<()> {
    let warnings = commands::validate_config_file(&file)?;
    if warnings.is_empty() {
        println!("ok");
    } else {
        for w in &warnings {
            println!("warning: {w}");
        }
    }
    Ok(())
}
