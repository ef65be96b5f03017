use anyhow::Context;
use serde::Serialize;

use common::api::{AgentStatus, SystemHealth};

use crate::commands::CommandContext;
use crate::view::to_pretty_json;

#[derive(Debug, Serialize)]
struct StatusReport {
    mode: Option<String>,
    base_url: String,
    agent_id: Option<String>,
    agent_name: Option<String>,
    health: SystemHealth,
    status: Option<AgentStatus>,
}

pub async fn handle_status(ctx: &CommandContext) -> anyhow::Result<()> {
    let deployment = ctx.prepare().await?;
    let health = ctx
        .client
        .system()
        .health()
        .await
        .context("failed to fetch agent health")?;
    let status = if ctx.client.auth_store().is_authenticated() {
        Some(
            ctx.client
                .agent()
                .status()
                .await
                .context("failed to fetch agent status")?,
        )
    } else {
        None
    };

    let selected = deployment.as_ref().and_then(|d| d.selected.as_ref());
    let report = StatusReport {
        mode: deployment.as_ref().map(|d| d.mode.to_string()),
        base_url: ctx.client.transport().base_url(),
        agent_id: selected.map(|a| a.agent_id.clone()),
        agent_name: selected.map(|a| a.agent_name.clone()),
        health,
        status,
    };

    if ctx.json {
        println!("{}", to_pretty_json(&report)?);
        return Ok(());
    }

    println!("mode:     {}", report.mode.as_deref().unwrap_or("fixed"));
    println!("base_url: {}", report.base_url);
    if let Some(agent_id) = &report.agent_id {
        println!(
            "agent:    {} ({})",
            agent_id,
            report.agent_name.as_deref().unwrap_or("-")
        );
    }
    println!(
        "health:   {} (version {})",
        report.health.status, report.health.version
    );
    match &report.status {
        Some(status) => println!("state:    {}", status.cognitive_state),
        None => println!("state:    sign in to see agent status"),
    }
    Ok(())
}
