use anyhow::Context;

use crate::args::{AgentCommands, AgentSelectArgs};
use crate::commands::CommandContext;
use crate::view::{render_agents_table, to_pretty_json};

pub async fn handle_agents(ctx: &CommandContext, command: AgentCommands) -> anyhow::Result<()> {
    match command {
        AgentCommands::List => handle_agents_list(ctx).await,
        AgentCommands::Select(args) => handle_agents_select(ctx, args).await,
    }
}

async fn handle_agents_list(ctx: &CommandContext) -> anyhow::Result<()> {
    let deployment = ctx
        .client
        .resolve()
        .await
        .context("failed to resolve CIRIS deployment")?;
    if ctx.json {
        println!("{}", to_pretty_json(&deployment.agents)?);
        return Ok(());
    }
    println!("mode: {}", deployment.mode);
    let selected = deployment.selected.as_ref().map(|a| a.agent_id.as_str());
    println!("{}", render_agents_table(&deployment.agents, selected));
    Ok(())
}

async fn handle_agents_select(ctx: &CommandContext, args: AgentSelectArgs) -> anyhow::Result<()> {
    ctx.client
        .resolve()
        .await
        .context("failed to resolve CIRIS deployment")?;
    let deployment = ctx.client.resolver().select_agent(&args.agent_id)?;
    if ctx.json {
        println!("{}", to_pretty_json(&deployment.selected)?);
    } else {
        println!("selected {} -> {}", args.agent_id, deployment.base_url);
    }
    Ok(())
}
