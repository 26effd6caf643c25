use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "doclass-server")]
#[command(author, version, about = "Multi-modal PDF classification service", long_about = None)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config.yaml", global = true)]
    pub config: PathBuf,

    /// Listen address
    #[arg(short = 'l', long)]
    pub listen: Option<String>,

    /// Listen port
    #[arg(short = 'P', long)]
    pub port: Option<u16>,

    /// Fusion model weights
    #[arg(short, long, env = "DOCLASS_MODEL", global = true)]
    pub model: Option<PathBuf>,

    /// Label map file
    #[arg(long, env = "DOCLASS_LABELS", global = true)]
    pub labels: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the HTTP server (default)
    Serve,

    /// Classify one PDF and print the result as JSON
    Classify {
        /// Document to classify
        path: PathBuf,
    },
}
