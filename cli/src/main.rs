use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use clap::Subcommand;
use clap::ValueEnum;
use tracing_subscriber::EnvFilter;

mod commands;
mod report;

#[derive(Debug, Parser)]
#[command(name = "cloudcrafters")]
#[command(about = "Design, implement and security-review AWS infrastructure with model-backed agents")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run the pipeline and print each stage's output
    Run(RunArgs),

    /// Show the agents and stages of a pipeline
    List {
        /// Pipeline definition to inspect instead of the built-in one
        #[arg(short, long)]
        pipeline: Option<PathBuf>,

        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Show the effective configuration and any problems with it
    Status,
}

#[derive(Debug, Parser)]
pub(crate) struct RunArgs {
    /// What to build; bound to the pipeline's subject variable
    #[arg(short, long)]
    pub subject: Option<String>,

    /// Pipeline definition to run instead of the built-in one
    #[arg(short, long)]
    pub pipeline: Option<PathBuf>,

    /// Model to use for agents that do not name their own
    #[arg(short, long)]
    pub model: Option<String>,

    /// Extra template variable, repeatable
    #[arg(long = "var", value_name = "NAME=VALUE", value_parser = parse_var)]
    pub vars: Vec<(String, String)>,

    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

fn parse_var(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got `{raw}`"))?;
    let name = name.trim();
    cloudcrafters_crew::validate_variable_name(name).map_err(|e| e.to_string())?;
    Ok((name.to_string(), value.to_string()))
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "cloudcrafters={level},cloudcrafters_core={level},cloudcrafters_crew={level}"
        ))
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = cloudcrafters_core::Config::load(cli.config.as_deref()).await?;

    match cli.command {
        Commands::Run(args) => commands::run(config, args).await?,
        Commands::List { pipeline, format } => {
            commands::list(&config, pipeline.as_deref(), format)?;
        }
        Commands::Status => commands::status(&config)?,
    }

    Ok(())
}
