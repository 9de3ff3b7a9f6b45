//! graphwire - offline inspector for graphwire message bodies

use clap::{Parser, Subcommand};
use colored::Colorize;
use graphwire::inspect::{self, DecodeOptions, Target};
use graphwire::Config;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "graphwire")]
#[command(about = "Decode captured graphwire message bodies")]
#[command(version)]
struct Cli {
    /// YAML configuration file
    #[arg(short, long, env = "GRAPHWIRE_CONFIG")]
    config: Option<PathBuf>,

    /// Record format the peer used for record bodies
    #[arg(short, long)]
    serializer: Option<String>,

    /// Protocol version negotiated by the peer
    #[arg(short, long)]
    protocol_version: Option<i16>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode a captured message body
    Decode {
        /// Structure to decode the capture as
        #[arg(value_enum)]
        target: Target,

        /// Capture as hex (or @file with hex text or raw bytes)
        input: String,
    },

    /// List the registered record formats
    Formats,
}

fn main() {
    let cli = Cli::parse();

    let mut config = match Config::load(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{}: {}", "Error".red(), e);
            std::process::exit(1);
        }
    };
    if let Some(serializer) = cli.serializer {
        config.codec.serializer = serializer;
    }
    if let Some(version) = cli.protocol_version {
        config.codec.protocol_version = version;
    }

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .init();

    if let Some(path) = &cli.config {
        tracing::debug!("Loaded config from {}", path.display());
    }

    if let Err(e) = run(cli.command, &config) {
        eprintln!("{}: {}", "Error".red(), e);
        std::process::exit(1);
    }
}

fn run(command: Commands, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    config.validate()?;
    let ctx = config.codec.context()?;

    match command {
        Commands::Formats => {
            for name in ctx.serializers().names() {
                if name == ctx.active_serializer() {
                    println!("{} {}", name.cyan(), "(active)".dimmed());
                } else {
                    println!("{}", name.cyan());
                }
            }
        }
        Commands::Decode { target, input } => {
            let bytes = inspect::parse_input(&input)?;
            tracing::debug!(
                len = bytes.len(),
                serializer = %config.codec.serializer,
                protocol_version = config.codec.protocol_version,
                "decoding capture"
            );
            let options = DecodeOptions {
                serializer: &config.codec.serializer,
                protocol_version: config.codec.protocol_version,
            };
            let inspection = inspect::decode(target, bytes, options, &ctx)?;
            println!("{}", inspect::render(&inspection));
        }
    }
    Ok(())
}
