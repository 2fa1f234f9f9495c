//! Registers Hearth's slash commands with Discord.
//!
//! Prints what would change, then replaces the registered set when anything
//! differs. Commands go to `GUILD_ID` when it is set, otherwise globally.

use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use twilight_http::Client as HttpClient;
use twilight_model::application::command::Command;

use hearth::commands::slash_definitions;
use twilight_model::id::{
    Id,
    marker::{ApplicationMarker, GuildMarker},
};

use hearth::deploy::{command_diff, retry_after};

#[derive(Debug, Parser)]
#[command(name = "deploy", about = "Sync slash commands with Discord")]
struct Args {
    #[arg(long, env = "DISCORD_TOKEN", hide_env_values = true)]
    token: String,
    /// Application id; looked up from the token when absent.
    #[arg(long, env = "CLIENT_ID")]
    client_id: Option<u64>,
    /// Register in this guild instead of globally.
    #[arg(long, env = "GUILD_ID")]
    guild_id: Option<u64>,
    /// Upload even when nothing changed.
    #[arg(long)]
    force: bool,
    /// Only print the diff.
    #[arg(long)]
    dry_run: bool,
}

async fn run(args: Args) -> anyhow::Result<()> {
    let http = HttpClient::new(args.token.clone());
    let guild_id: Option<Id<GuildMarker>> = args.guild_id.and_then(Id::new_checked);
    let client_id: Option<Id<ApplicationMarker>> = args.client_id.and_then(Id::new_checked);

    let application_id = match client_id {
        Some(id) => id,
        None => {
            http.current_user_application()
                .await
                .context("Failed to fetch the application")?
                .model()
                .await?
                .id
        }
    };
    let client = http.interaction(application_id);
    let local = slash_definitions();

    let registered: Vec<Command> = match guild_id {
        Some(guild_id) => client.guild_commands(guild_id).await?.models().await?,
        None => client.global_commands().await?.models().await?,
    };
    let scope = guild_id
        .map_or_else(|| "global".to_string(), |guild_id| format!("guild {guild_id}"));

    let diff = command_diff(&local, &registered);
    println!("Commands ({scope}):\n{diff}");

    if args.dry_run {
        println!("Dry run, nothing uploaded.");
        return Ok(());
    }
    if !diff.has_changes() && !args.force {
        println!("Already up to date.");
        return Ok(());
    }

    let uploaded = match guild_id {
        Some(guild_id) => client.set_guild_commands(guild_id, &local).await?.models().await?,
        None => client.set_global_commands(&local).await?.models().await?,
    };
    println!("Uploaded {} commands.", uploaded.len());
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("Failed to read .env file: {e}");
            return ExitCode::FAILURE;
        }
    }
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .init();

    match run(Args::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            match retry_after(&e) {
                Some(seconds) => eprintln!("Rate limited by Discord, retry after {seconds:.1}s."),
                None => eprintln!("Deploy failed: {e:#}"),
            }
            ExitCode::FAILURE
        }
    }
}
