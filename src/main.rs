use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

use feedwatch::config::Config;
use feedwatch::feed::{build_http_client, HttpFeedClient};
use feedwatch::notify::{LogNotifier, Notifier, WebhookNotifier};
use feedwatch::poller::Scheduler;
use feedwatch::storage::{Database, DatabaseError};
use feedwatch::util::format_interval;

/// Get the config directory path (~/.config/feedwatch/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".config").join("feedwatch"))
}

#[derive(Parser, Debug)]
#[command(
    name = "feedwatch",
    version,
    about = "Polls RSS/Atom feeds and delivers new items to subscribers"
)]
struct Args {
    /// Config file (default: ~/.config/feedwatch/config.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// SQLite database file, overrides `database_path` from the config
    #[arg(long, value_name = "FILE")]
    database: Option<PathBuf>,

    /// Run a single poll cycle and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let config_dir = get_config_dir()?;
    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| config_dir.join("config.toml"));
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    let db_path = match args.database.clone().or_else(|| config.database_path.clone()) {
        Some(path) => path,
        None => {
            if !config_dir.exists() {
                std::fs::create_dir_all(&config_dir)
                    .context("Failed to create config directory")?;
                tracing::info!(path = %config_dir.display(), "Created config directory");
            }
            config_dir.join("feedwatch.db")
        }
    };

    let db_path_str = db_path
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("Invalid UTF-8 in database path"))?;
    let db = match Database::open(db_path_str).await {
        Ok(db) => db,
        Err(DatabaseError::InstanceLocked) => {
            eprintln!("Error: Another feedwatch instance is using {}", db_path.display());
            std::process::exit(1);
        }
        Err(e) => return Err(anyhow::anyhow!("Failed to open database: {}", e)),
    };

    let seeds = config
        .seed_subscriptions()
        .context("Invalid subscription in config")?;
    for seed in &seeds {
        let id = db
            .subscribe(seed)
            .await
            .with_context(|| format!("Failed to seed subscription {}", seed.source_url))?;
        tracing::info!(
            subscription_id = id,
            subscriber_id = seed.subscriber_id,
            url = %seed.source_url,
            interval = %format_interval(seed.refresh_interval_secs.unsigned_abs()),
            "Seeded subscription"
        );
    }

    let http = build_http_client().context("Failed to build HTTP client")?;
    let client = HttpFeedClient::new(http.clone()).with_max_feed_size(config.max_feed_size_bytes);

    let notifier: Arc<dyn Notifier> = match &config.notifier.webhook_url {
        Some(url) => {
            let mut webhook = WebhookNotifier::new(http, url.clone());
            if let Some(token) = config.webhook_token() {
                webhook = webhook.with_token(token);
            }
            tracing::info!(url = %url, "Delivering via webhook");
            Arc::new(webhook)
        }
        None => {
            tracing::info!("No webhook configured, delivering to the log");
            Arc::new(LogNotifier)
        }
    };

    let settings = config.poll_settings();
    let scheduler = Scheduler::new(Arc::new(db), Arc::new(client), notifier, &settings);

    if args.once {
        scheduler
            .run_cycle()
            .await
            .context("Failed to query due subscriptions")?;
        return Ok(());
    }

    tracing::info!(
        tick = %format_interval(settings.tick_interval.as_secs()),
        workers = settings.worker_pool_size,
        "Scheduler started"
    );
    let handle = scheduler.spawn();

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    tracing::info!("Shutting down, waiting for the current cycle to finish");
    handle.stop().await.context("Scheduler task failed")?;

    Ok(())
}
