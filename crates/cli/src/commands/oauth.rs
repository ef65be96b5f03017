use serde::Serialize;

use crate::args::OauthUrlArgs;
use crate::commands::CommandContext;
use crate::view::to_pretty_json;

#[derive(Debug, Serialize)]
struct OauthUrls {
    provider: String,
    login_url: String,
    redirect_uri: String,
    authorize_url: String,
}

pub async fn handle_oauth_url(ctx: &CommandContext, args: OauthUrlArgs) -> anyhow::Result<()> {
    ctx.deployment().await?;
    let resolver = ctx.client.resolver();
    let authorize_url = resolver.oauth_authorize_url(&args.provider)?;
    if ctx.json {
        let urls = OauthUrls {
            login_url: resolver.oauth_login_url(&args.provider)?,
            redirect_uri: resolver.oauth_redirect_uri()?,
            provider: args.provider,
            authorize_url,
        };
        println!("{}", to_pretty_json(&urls)?);
    } else {
        println!("{authorize_url}");
    }
    Ok(())
}
