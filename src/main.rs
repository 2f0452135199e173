mod commands;

use std::net::IpAddr;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::OutputFormat;
use nic_owner::config::{Config, LogFormat};

#[derive(Parser)]
#[command(
    name = "nic-owner",
    version,
    about = "Discover, classify and select network interfaces on Linux, Windows, ESXi and FreeBSD hosts"
)]
struct Cli {
    /// Path to config file (default: ~/.config/nic-owner/config.yaml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Remote host to manage over ssh (overrides config)
    #[arg(long, global = true)]
    host: Option<IpAddr>,

    /// ssh user (overrides config)
    #[arg(long, global = true)]
    user: Option<String>,

    /// Log level (overrides config)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Detect the target's platform
    Check,

    /// Print every interface the target exposes
    Discover {
        #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },

    /// Select interfaces by PCI address, device, family, speed or name
    Get(commands::get::GetArgs),

    /// Sample interface counters and validate their trend
    Trend(commands::trend::TrendArgs),
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    // stdout is reserved for command output.
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match config.log_format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(host) = cli.host {
        config.target.host = Some(host);
    }
    if let Some(user) = cli.user {
        config.target.user = user;
    }
    if let Some(level) = cli.log_level {
        config.log_level = level;
    }
    init_tracing(&config);

    match cli.command {
        Commands::Check => commands::check::run(&config),
        Commands::Discover { format } => commands::discover::run(&config, format),
        Commands::Get(args) => commands::get::run(&config, &args),
        Commands::Trend(args) => commands::trend::run(&config, &args),
    }
}
