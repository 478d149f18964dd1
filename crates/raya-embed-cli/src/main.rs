//! `raya-embed` command-line tool
//!
//! Inspects module images and the dependencies bundled inside them, and
//! runs the same search the runtime uses to resolve a bundled module.

mod commands;
mod output;

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use raya_embed::EmbedConfig;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Environment variable holding the log filter
const LOG_ENV: &str = "RAYA_LOG";

#[derive(Parser)]
#[command(name = "raya-embed")]
#[command(about = "Inspect and search bundled Raya module images", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file (`raya.toml` is read as a manifest)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Nesting levels searched below a module
    #[arg(long, global = true)]
    max_depth: Option<usize>,

    /// When to use colors
    #[arg(long, global = true, value_parser = ["auto", "always", "never"])]
    color: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show a module's identity and its resource directory
    Inspect {
        /// Module image
        file: PathBuf,
        /// How many levels of bundled modules to expand [default: configured max depth]
        #[arg(short, long)]
        depth: Option<usize>,
        /// Print the tree as JSON
        #[arg(long)]
        json: bool,
    },

    /// Search a module's bundled resources for an identity
    Find {
        /// Module image
        file: PathBuf,
        /// Full identity, e.g. "util, Version=1.2.0, Culture=neutral, PublicKeyToken=null"
        identity: String,
        /// Write the bundled image to this path
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(env_filter)
        .init();
}

/// File, then environment, then flags
fn load_config(path: Option<&Path>, max_depth: Option<usize>) -> anyhow::Result<EmbedConfig> {
    let mut config = match path {
        Some(path) => EmbedConfig::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => EmbedConfig::default(),
    };
    config = config.with_env()?;
    if let Some(depth) = max_depth {
        config.max_depth = depth;
    }
    config.validate()?;
    tracing::debug!(max_depth = config.max_depth, "configuration loaded");
    Ok(config)
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let choice = output::resolve_color_choice(cli.color.as_deref());
    let mut out = output::StyledOutput::stdout(choice);
    let config = load_config(cli.config.as_deref(), cli.max_depth)?;

    match cli.command {
        Commands::Inspect { file, depth, json } => {
            commands::inspect::execute(&file, depth, json, &config, &mut out)
        }
        Commands::Find {
            file,
            identity,
            output,
        } => commands::find::execute(&file, &identity, output.as_deref(), &config, &mut out),
    }
}
