use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use casfos::app::build_app;
use casfos::backup::alert::{Alerter, EmailAlerter, LogAlerter};
use casfos::backup::command::TokioCommandRunner;
use casfos::backup::disk::Fs2DiskProbe;
use casfos::backup::schedule::{parse_schedule, spawn_scheduler};
use casfos::backup::BackupJob;
use casfos::config::{redact_uri, AppConfig};
use casfos::seeder;
use casfos::state::AppState;
use casfos::storage::client::{LocalStorageClient, StorageClient};

/// CASFOS records portal server.
#[derive(Debug, Parser)]
#[command(name = "casfos", version, about)]
struct Args {
    /// Configuration file (TOML/YAML/JSON); `casfos.*` in the working
    /// directory is used when present.
    #[arg(short, long)]
    config: Option<String>,
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
    }
    tracing::info!("Shutdown signal received");
}

fn build_backup_job(config: &AppConfig) -> anyhow::Result<Arc<BackupJob>> {
    let alerter: Arc<dyn Alerter> = match EmailAlerter::from_settings(&config.mail)? {
        Some(email) => {
            tracing::info!(recipients = config.mail.to.len(), "Backup alerts go by e-mail");
            Arc::new(email)
        }
        None => {
            tracing::warn!("No SMTP relay configured, backup alerts are only logged");
            Arc::new(LogAlerter)
        }
    };

    Ok(Arc::new(BackupJob::new(
        config.backup.clone(),
        config.backup_source_uri(),
        Arc::new(TokioCommandRunner),
        Arc::new(Fs2DiskProbe),
        alerter,
    )))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "casfos=info,tower_http=info".into()),
        )
        .init();

    let args = Args::parse();
    let config = Arc::new(
        AppConfig::load(args.config.as_deref()).context("Failed to load configuration")?,
    );

    tracing::info!("Starting CASFOS portal...");

    // Connect to MongoDB
    let mongo_client = mongodb::Client::with_uri_str(&config.database.uri)
        .await
        .context("Failed to connect to MongoDB")?;
    let mongo_db = mongo_client.database(&config.database.name);
    seeder::ensure_indexes(&mongo_db)
        .await
        .context("Failed to create database indexes")?;

    tracing::info!(
        "Connected to MongoDB at {} (database '{}')",
        redact_uri(&config.database.uri),
        config.database.name
    );

    let storage_client: Arc<dyn StorageClient> = Arc::new(
        LocalStorageClient::new(&config.uploads.dir)
            .await
            .context("Failed to initialize upload storage")?,
    );
    tracing::info!("Uploads stored under {}", config.uploads.dir);

    let mut state = AppState::from_database(&mongo_db, storage_client, config.clone());

    if config.backup.enabled {
        let schedule = parse_schedule(&config.backup.schedule)?;
        let job = build_backup_job(&config)?;
        spawn_scheduler(job.clone(), schedule);
        tracing::info!(
            schedule = %config.backup.schedule,
            dir = %config.backup.dir,
            restore = config.backup.restore_uri.is_some(),
            "Backup scheduler started"
        );
        state = state.with_backup(job);
    } else {
        tracing::info!("Scheduled backups are disabled");
    }

    seeder::seed_admin(state.users.as_ref(), &config.bootstrap).await?;

    let app = build_app(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    Ok(())
}
