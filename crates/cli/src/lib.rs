pub mod args;
pub mod commands;
pub mod view;

pub use args::*;
pub use commands::CommandContext;

use anyhow::Context;
use ciris_client::{CirisClient, ClientConfig};
use clap::Parser;

use crate::commands::agents::handle_agents;
use crate::commands::config::handle_config;
use crate::commands::oauth::handle_oauth_url;
use crate::commands::session::{handle_login, handle_logout, handle_whoami};
use crate::commands::status::handle_status;

/// Shared async entrypoint used by the CLI binary.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    run_parsed(cli).await
}

/// Execute the CLI given a pre-parsed argument struct.
pub async fn run_parsed(cli: Cli) -> anyhow::Result<()> {
    ciris_client::telemetry::init_tracing(cli.globals.log_json);

    let config = load_config(&cli.globals)?;
    let client = CirisClient::new(config).context("failed to initialize client")?;
    let ctx = CommandContext::new(client, cli.globals.json);

    match cli.command {
        Commands::Login(args) => handle_login(&ctx, args).await?,
        Commands::Logout => handle_logout(&ctx).await?,
        Commands::Whoami => handle_whoami(&ctx).await?,
        Commands::Status => handle_status(&ctx).await?,
        Commands::Agents { command } => handle_agents(&ctx, command).await?,
        Commands::Config { command } => handle_config(&ctx, command).await?,
        Commands::OauthUrl(args) => handle_oauth_url(&ctx, args).await?,
    }

    Ok(())
}

/// Precedence: flags > env > config file > defaults.
pub fn load_config(globals: &GlobalArgs) -> anyhow::Result<ClientConfig> {
    let mut config = ciris_client::config::load_from(globals.config.as_deref())
        .context("failed to load configuration")?;
    if let Some(origin) = &globals.origin {
        config.origin = origin.trim().trim_end_matches('/').to_string();
    }
    if let Some(base) = &globals.api_base_url {
        config.api_base_url = Some(base.trim().trim_end_matches('/').to_string());
    }
    if let Some(dir) = &globals.state_dir {
        config.state_dir = Some(dir.display().to_string());
    }
    config.validate()?;
    Ok(config)
}
