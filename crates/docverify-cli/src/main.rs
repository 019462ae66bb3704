//! CLI for classifying documents and verifying extracted invoice data.

mod commands;

use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use commands::{check, classify, config, process, validate};

/// docverify - Classify documents and cross-check extracted invoice data
#[derive(Parser)]
#[command(name = "docverify")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Detect the document type and select an extractor
    Classify(classify::ClassifyArgs),

    /// Run the full pipeline on a text file
    Process(process::ProcessArgs),

    /// Validate an extracted record against its source text
    Validate(validate::ValidateArgs),

    /// Run consistency checks on an extracted record
    Check(check::CheckArgs),

    /// Manage configuration
    Config(config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Classify(args) => classify::run(args, config_path).await,
        Commands::Process(args) => process::run(args, config_path).await,
        Commands::Validate(args) => validate::run(args, config_path).await,
        Commands::Check(args) => check::run(args, config_path).await,
        Commands::Config(args) => config::run(args, config_path).await,
    }
}
