//! slackline - Slack session credentials and MCP tools
//!
//! `serve` (the default) speaks MCP on stdout, so all logging goes to stderr.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use slackline_lib::commands;
use slackline_lib::{AppConfig, AppContext, AppState};

/// Slack session credentials and MCP tools
#[derive(Parser, Debug)]
#[command(name = "slackline")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Workspace to use (URL or subdomain)
    #[arg(short, long, global = true)]
    workspace: Option<String>,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Config file (default: config.json in the per-user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate and store a session token and cookie
    Setup {
        /// Session token (xoxc-...); prefer SLACK_TOKEN to keep it out of shell history
        #[arg(long)]
        token: Option<String>,

        /// `d` cookie value (xoxd-...); prefer SLACK_COOKIE
        #[arg(long)]
        cookie: Option<String>,
    },
    /// Run the MCP server on stdio
    Serve,
    /// Show stored credentials, the live identity and the cache
    Status,
    /// Remove stored credentials and the cache
    Logout,
    /// Manage the local cache
    Cache {
        #[command(subcommand)]
        action: CacheCommand,
    },
}

#[derive(Subcommand, Debug)]
enum CacheCommand {
    /// Delete the cache file
    Clear,
}

fn init_logging(debug: bool) {
    let filter = if debug {
        EnvFilter::new("info,slackline=debug,slackline_lib=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    // stdout is the MCP transport
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn run(args: Args) -> Result<()> {
    let config = match &args.config {
        Some(path) => AppConfig::load_from(path),
        None => AppConfig::load(),
    };

    let workspace = args.workspace.or_else(|| config.default_workspace.clone());
    let mut ctx = AppContext::new(workspace, args.debug);
    let state = AppState::new(config)?;

    match args.command.unwrap_or(Command::Serve) {
        Command::Setup { token, cookie } => {
            let identity = commands::setup(&state, &mut ctx, token, cookie).await?;
            println!(
                "Signed in as {} in {}",
                identity.user.as_deref().unwrap_or("?"),
                identity.team.as_deref().unwrap_or("?")
            );
        }
        Command::Serve => commands::serve(&state, ctx).await?,
        Command::Status => {
            let report = commands::status(&state, &mut ctx).await?;
            println!("{}", report);
        }
        Command::Logout => {
            commands::logout(&state).await?;
            println!("Signed out");
        }
        Command::Cache {
            action: CacheCommand::Clear,
        } => {
            commands::cache_clear(&state).await?;
            println!("Cache cleared");
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.debug);

    tracing::debug!("Starting slackline v{}", env!("CARGO_PKG_VERSION"));

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}
