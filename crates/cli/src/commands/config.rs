use anyhow::Context;
use common::config_value::unwrap_config_value;
use serde_json::Value;

use crate::args::{ConfigCommands, ConfigGetArgs, ConfigSetArgs};
use crate::commands::CommandContext;
use crate::view::to_pretty_json;

pub async fn handle_config(ctx: &CommandContext, command: ConfigCommands) -> anyhow::Result<()> {
    ctx.require_session()?;
    ctx.prepare().await?;
    match command {
        ConfigCommands::Get(args) => handle_config_get(ctx, args).await,
        ConfigCommands::Set(args) => handle_config_set(ctx, args).await,
    }
}

async fn handle_config_get(ctx: &CommandContext, args: ConfigGetArgs) -> anyhow::Result<()> {
    let item = ctx
        .client
        .config()
        .get(&args.key)
        .await
        .with_context(|| format!("failed to read config '{}'", args.key))?;
    let value = unwrap_config_value(&item.value);
    if ctx.json {
        println!("{}", to_pretty_json(&item)?);
    } else {
        println!("{} = {}", item.key, value);
    }
    Ok(())
}

async fn handle_config_set(ctx: &CommandContext, args: ConfigSetArgs) -> anyhow::Result<()> {
    let value = parse_value(&args.value);
    let item = ctx
        .client
        .config()
        .set(&args.key, value, args.reason.as_deref())
        .await
        .with_context(|| format!("failed to update config '{}'", args.key))?;
    if ctx.json {
        println!("{}", to_pretty_json(&item)?);
    } else {
        println!("{} = {}", item.key, unwrap_config_value(&item.value));
    }
    Ok(())
}

/// JSON when it parses, otherwise the raw text as a string.
pub fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}
