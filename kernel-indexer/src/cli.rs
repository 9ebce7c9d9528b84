use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "kernel-indexer", about, long_about = None)]
pub struct Cli {
    /// Path to the indexer TOML config
    #[arg(long, default_value = "indexer.toml")]
    pub config: PathBuf,

    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    pub database_url: String,

    #[arg(long)]
    pub otel_endpoint: Option<String>,

    /// Apply pending migrations and exit
    #[arg(long, default_value_t = false)]
    pub migrate_only: bool,
}
