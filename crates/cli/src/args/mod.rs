use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

pub mod agents;
pub mod config;

pub use agents::*;
pub use config::*;

#[derive(Debug, Parser)]
#[command(
    name = "ciris",
    version,
    about = "ciris - operator CLI for CIRIS agents"
)]
pub struct Cli {
    #[command(flatten)]
    pub globals: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Args)]
pub struct GlobalArgs {
    /// Origin the agents are served from, e.g. https://agents.example.com
    #[arg(long, global = true)]
    pub origin: Option<String>,

    /// Fixed API base URL; skips manager discovery.
    #[arg(long = "api-base-url", global = true)]
    pub api_base_url: Option<String>,

    /// Directory holding the session and agent selection.
    #[arg(long = "state-dir", global = true)]
    pub state_dir: Option<PathBuf>,

    /// Config file (default: ./ciris.toml when present).
    #[arg(long, env = "CIRIS_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Emit JSON instead of text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Emit logs as JSON on stderr.
    #[arg(long = "log-json", global = true)]
    pub log_json: bool,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Sign in with username and password.
    Login(LoginArgs),
    /// Sign out and forget the stored session.
    Logout,
    /// Show the signed-in user.
    Whoami,
    /// Show deployment mode, agent health and status.
    Status,
    /// Discover and select agents.
    Agents {
        #[command(subcommand)]
        command: AgentCommands,
    },
    /// Read and change agent configuration.
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Print the OAuth login URL for a provider.
    OauthUrl(OauthUrlArgs),
}

#[derive(Debug, Clone, Args)]
pub struct LoginArgs {
    #[arg(long, short = 'u', env = "CIRIS_USERNAME")]
    pub username: String,
    #[arg(long, short = 'p', env = "CIRIS_PASSWORD", hide_env_values = true)]
    pub password: String,
}

#[derive(Debug, Clone, Args)]
pub struct OauthUrlArgs {
    /// Provider key, e.g. google or github.
    pub provider: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "ciris",
            "agents",
            "select",
            "a2",
            "--origin",
            "https://agents.example.com",
            "--json",
        ])
        .expect("parse");
        assert_eq!(cli.globals.origin.as_deref(), Some("https://agents.example.com"));
        assert!(cli.globals.json);
        match cli.command {
            Commands::Agents {
                command: AgentCommands::Select(args),
            } => assert_eq!(args.agent_id, "a2"),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn config_set_takes_key_and_value() {
        let cli = Cli::try_parse_from(["ciris", "config", "set", "agent.max_rounds", "9", "--reason", "tuning"])
            .expect("parse");
        match cli.command {
            Commands::Config {
                command: ConfigCommands::Set(args),
            } => {
                assert_eq!(args.key, "agent.max_rounds");
                assert_eq!(args.value, "9");
                assert_eq!(args.reason.as_deref(), Some("tuning"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn oauth_url_requires_provider() {
        assert!(Cli::try_parse_from(["ciris", "oauth-url"]).is_err());
        let cli = Cli::try_parse_from(["ciris", "oauth-url", "google"]).expect("parse");
        assert!(matches!(cli.command, Commands::OauthUrl(OauthUrlArgs { ref provider }) if provider == "google"));
    }
}
