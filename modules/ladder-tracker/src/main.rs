use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use ladder_common::{Config, LadderError, OwnerId};
use ladder_tracker::{
    extractor::PageExtractor,
    jobs,
    notify::{render, LogReporter, Reporter, WebhookReporter},
    store::FileStore,
    RegistryStore, Tracker,
};
use leaderboard_client::LeaderboardClient;

#[derive(Parser)]
#[command(name = "tracker", about = "Leaderboard points tracker")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the scheduled points, leaderboard and daily-orders jobs until Ctrl-C
    Run,
    /// Run one scoring cycle now
    Score,
    /// Link a player tag to an owner
    Link {
        tag: String,
        owner_id: String,
        display_name: String,
    },
    /// Unlink a player tag
    Unlink { tag: String },
    /// Show linked accounts for one owner, or a summary of all owners
    Accounts { owner_id: Option<String> },
    /// Print the current owner leaderboard
    Leaderboard,
    /// Print the daily orders breakdown
    Report,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing()?;

    let cli = Cli::parse();

    let config = match cli.command {
        Command::Run => Config::daemon_from_env(),
        _ => Config::from_env(),
    }
    .context("Invalid configuration")?;
    config.log_redacted();

    let tracker = Arc::new(build_tracker(&config).await?);

    match cli.command {
        Command::Run => run(&config, tracker).await,
        Command::Score => {
            let deltas = tracker.scoring_cycle().await;
            LogReporter.scoring(&deltas).await
        }
        Command::Link {
            tag,
            owner_id,
            display_name,
        } => report_admin(
            tracker
                .link(&tag, OwnerId::new(owner_id), &display_name)
                .await
                .map(|tag| format!("Linked {tag}")),
        ),
        Command::Unlink { tag } => report_admin(
            tracker
                .unlink(&tag)
                .await
                .map(|record| format!("Unlinked {tag} ({} points)", record.points)),
        ),
        Command::Accounts { owner_id: Some(owner) } => {
            let accounts = tracker.linked_accounts(&OwnerId::new(owner)).await;
            if accounts.accounts.is_empty() {
                println!("{} has no linked accounts", accounts.owner_id);
            } else {
                for (tag, points) in &accounts.accounts {
                    println!("{tag}: {points} points");
                }
                println!("Total Points: {}", accounts.total_points);
            }
            Ok(())
        }
        Command::Accounts { owner_id: None } => {
            let owners = tracker.all_linked_accounts().await;
            if owners.is_empty() {
                println!("No accounts are currently linked");
            }
            for owner in owners {
                println!(
                    "{} | Accounts: {} | Total Points: {}",
                    owner.owner_id, owner.account_count, owner.total_points
                );
            }
            Ok(())
        }
        Command::Leaderboard => {
            print!("{}", render::leaderboard(&tracker.leaderboard().await));
            Ok(())
        }
        Command::Report => {
            match tracker.daily_report().await {
                Some(report) => print!("{}", render::daily(&report)),
                None => println!("No data available for daily orders calculation"),
            }
            Ok(())
        }
    }
}

fn init_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| {
        EnvFilter::try_new("info,ladder_tracker=info,ladder_common=info,leaderboard_client=info")
    })?;
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if std::env::var("LOG_FORMAT").is_ok_and(|f| f == "json") {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}

async fn build_tracker(config: &Config) -> Result<Tracker> {
    let client = LeaderboardClient::new(&config.user_agent, config.fetch_timeout)
        .context("Failed to build HTTP client")?;
    let extractor = PageExtractor::new(
        Box::new(client),
        config.leaderboard_url.clone(),
        config.scrape_cooldown,
    );
    let store: Arc<dyn RegistryStore> = Arc::new(FileStore::new(&config.data_dir));
    Ok(Tracker::load(store, extractor).await)
}

async fn run(config: &Config, tracker: Arc<Tracker>) -> Result<()> {
    let webhook_url = config
        .webhook_url
        .clone()
        .context("TRACKER_WEBHOOK_URL is required to run the scheduler")?;
    let reporter: Arc<dyn Reporter> = Arc::new(WebhookReporter::new(webhook_url));

    let mut scheduler = jobs::build_scheduler(config, tracker, reporter);
    info!("Tracker is now running");

    tokio::select! {
        _ = scheduler.supervise() => {}
        result = tokio::signal::ctrl_c() => {
            result.context("Failed to listen for shutdown signal")?;
            info!("Shutdown requested");
        }
    }

    scheduler.shutdown();
    Ok(())
}

/// Validation rejections are user errors: print them and exit non-zero.
fn report_admin(result: Result<String, LadderError>) -> Result<()> {
    match result {
        Ok(message) => {
            println!("{message}");
            Ok(())
        }
        Err(e) if e.is_validation() => {
            eprintln!("{e}");
            std::process::exit(2);
        }
        Err(e) => {
            error!(error = %e, "Admin command failed");
            Err(e.into())
        }
    }
}
