use anyhow::Context;
use tracing::warn;

use crate::args::LoginArgs;
use crate::commands::CommandContext;
use crate::view::{render_user, to_pretty_json};

pub async fn handle_login(ctx: &CommandContext, args: LoginArgs) -> anyhow::Result<()> {
    ctx.prepare().await?;
    let user = ctx
        .client
        .login(&args.username, &args.password)
        .await
        .context("login failed")?;
    if ctx.json {
        println!("{}", to_pretty_json(&user)?);
    } else {
        println!("signed in as {} ({})", user.username, user.role);
    }
    Ok(())
}

pub async fn handle_logout(ctx: &CommandContext) -> anyhow::Result<()> {
    // Best effort: the session is cleared even when no agent can be targeted.
    if !ctx.client.transport().has_base_override()
        && let Err(err) = ctx.client.resolver().restore()
    {
        warn!(%err, "could not restore agent selection before logout");
    }
    ctx.client.logout().await.context("logout failed")?;
    if !ctx.json {
        println!("signed out");
    }
    Ok(())
}

pub async fn handle_whoami(ctx: &CommandContext) -> anyhow::Result<()> {
    ctx.require_session()?;
    ctx.prepare().await?;
    let user = ctx
        .client
        .auth()
        .get_me()
        .await
        .context("failed to fetch current user")?;
    if ctx.json {
        println!("{}", to_pretty_json(&user)?);
    } else {
        println!("{}", render_user(&user));
    }
    Ok(())
}
