use clap::{Args, Subcommand};

#[derive(Debug, Subcommand)]
pub enum AgentCommands {
    /// Probe the deployment and list reachable agents.
    List,
    /// Route subsequent commands to an agent.
    Select(AgentSelectArgs),
}

#[derive(Debug, Clone, Args)]
pub struct AgentSelectArgs {
    /// Agent id as listed by `ciris agents list`.
    pub agent_id: String,
}
