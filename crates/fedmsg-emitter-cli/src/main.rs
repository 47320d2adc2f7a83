//! fedmsg-emit - report a finished build to the fedmsg bus
//!
//! Meant to run as a post-build step. Build identity defaults to the
//! `JOB_NAME` / `BUILD_NUMBER` variables the CI host exports.
//!
//! ## Commands
//!
//! - `emit`: build, optionally sign, and publish the message
//! - `preview`: print the unsigned message JSON without connecting

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use fedmsg_emitter::{BuildContext, BuildOutcome, Pipeline, PipelineConfig};
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "fedmsg-emit")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Publish build outcomes to a fedmsg bus", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// TOML configuration file
    #[arg(short, long, global = true, env = "FEDMSG_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Publish the message for a finished build
    Emit {
        #[command(flatten)]
        build: BuildArgs,

        #[command(flatten)]
        overrides: Overrides,
    },

    /// Print the message that would be published
    Preview {
        #[command(flatten)]
        build: BuildArgs,

        #[command(flatten)]
        overrides: Overrides,
    },
}

#[derive(Args, Debug)]
struct BuildArgs {
    /// Project name, `project » configuration` for matrix jobs
    #[arg(long, env = "JOB_NAME")]
    project: String,

    /// Build number
    #[arg(long, env = "BUILD_NUMBER")]
    number: u64,

    /// Build result (SUCCESS, FAILURE, ABORTED, NOT_BUILT, UNSTABLE); omit while running
    #[arg(long)]
    result: Option<String>,
}

impl BuildArgs {
    fn to_context(&self) -> BuildContext {
        BuildContext::new(
            self.project.clone(),
            self.number,
            self.result.as_deref().map(BuildOutcome::parse),
        )
    }
}

#[derive(Args, Debug, Default)]
struct Overrides {
    /// Bus endpoint (tcp://host:port)
    #[arg(long)]
    endpoint: Option<String>,

    /// Environment shortname (prod, stg, dev)
    #[arg(long)]
    environment: Option<String>,

    /// Sign the message
    #[arg(long)]
    sign: bool,
}

/// File, then `FEDMSG_*` environment, then command-line flags.
fn load_config(path: Option<&PathBuf>, overrides: &Overrides) -> Result<PipelineConfig> {
    let config = match path {
        Some(path) => PipelineConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    let mut config = config
        .apply_env()
        .context("Invalid FEDMSG_* environment override")?;

    if let Some(endpoint) = &overrides.endpoint {
        config.endpoint = endpoint.clone();
    }
    if let Some(environment) = &overrides.environment {
        config.environment_shortname = environment.clone();
    }
    if overrides.sign {
        config.should_sign = true;
    }
    Ok(config)
}

async fn cmd_emit(config: PipelineConfig, build: &BuildArgs) -> Result<ExitCode> {
    let pipeline = Pipeline::zmq(config).context("Invalid configuration")?;

    if pipeline.emit(&build.to_context()).await {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

fn cmd_preview(config: PipelineConfig, build: &BuildArgs) -> Result<ExitCode> {
    let pipeline = Pipeline::zmq(config).context("Invalid configuration")?;
    match pipeline.preview(&build.to_context()) {
        Some(message) => {
            let json = serde_json::to_string_pretty(&message)?;
            println!("{json}");
        }
        None => info!("Build has no result yet, nothing would be sent"),
    }
    Ok(ExitCode::SUCCESS)
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    fedmsg_emitter::init_tracing(cli.json, level);

    match &cli.command {
        Commands::Emit { build, overrides } => {
            let config = load_config(cli.config.as_ref(), overrides)?;
            cmd_emit(config, build).await
        }
        Commands::Preview { build, overrides } => {
            let config = load_config(cli.config.as_ref(), overrides)?;
            cmd_preview(config, build)
        }
    }
}
