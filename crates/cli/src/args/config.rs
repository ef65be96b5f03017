use clap::{Args, Subcommand};

#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Show one config value.
    Get(ConfigGetArgs),
    /// Set a config value (JSON; bare words are taken as strings).
    Set(ConfigSetArgs),
}

#[derive(Debug, Clone, Args)]
pub struct ConfigGetArgs {
    pub key: String,
}

#[derive(Debug, Clone, Args)]
pub struct ConfigSetArgs {
    pub key: String,
    pub value: String,
    /// Reason recorded in the audit log.
    #[arg(long)]
    pub reason: Option<String>,
}
