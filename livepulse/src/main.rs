use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use livepulse::config::AppConfig;
use livepulse::database::repositories::{
    SqlxEventRepository, SqlxNotificationRepository, SqlxSessionRepository, SqlxStreamerRepository,
    SqlxSubscriptionRepository,
};
use livepulse::feed::{CursorWalker, HttpListingClient, ListingClient};
use livepulse::notifier::{DiscordWebhookSender, NotificationService, SubscriptionMatcher};
use livepulse::scheduler::ScanScheduler;
use livepulse::store::{CursorStore, LiveStateStore, SqlxCursorStore, SqlxLiveStateStore};
use livepulse::sync::{LiveSyncOrchestrator, TransitionHandler};
use livepulse::{database, Result};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("livepulse=info,sqlx=warn")),
        )
        .with(fmt::layer())
        .init();

    let config = AppConfig::from_env()?;

    let pool = database::init_pool(&config.database_url).await?;
    let write_pool = database::init_write_pool(&config.database_url).await?;
    database::run_migrations(&pool).await?;

    let scheduler = Arc::new(build_scheduler(&config, pool.clone(), write_pool.clone())?);

    let cancel = CancellationToken::new();
    let scheduler_task = tokio::spawn({
        let scheduler = scheduler.clone();
        let cancel = cancel.clone();
        async move { scheduler.run(cancel).await }
    });

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown signal received");
    cancel.cancel();
    scheduler_task.await?;

    write_pool.close().await;
    pool.close().await;
    Ok(())
}

fn build_scheduler(
    config: &AppConfig,
    pool: database::DbPool,
    write_pool: database::WritePool,
) -> Result<ScanScheduler> {
    let client: Arc<dyn ListingClient> = Arc::new(HttpListingClient::new(config)?);

    let streamers = Arc::new(SqlxStreamerRepository::new(pool.clone()));
    let sessions = Arc::new(SqlxSessionRepository::new(pool.clone(), write_pool.clone()));
    let events = Arc::new(SqlxEventRepository::new(pool.clone()));
    let subscriptions = Arc::new(SqlxSubscriptionRepository::new(pool.clone()));
    let notifications = Arc::new(SqlxNotificationRepository::new(pool.clone()));

    let cursors: Arc<dyn CursorStore> =
        Arc::new(SqlxCursorStore::new(pool.clone(), write_pool.clone()));
    let live_state: Arc<dyn LiveStateStore> =
        Arc::new(SqlxLiveStateStore::new(pool.clone(), write_pool.clone()));

    let notifier = Arc::new(NotificationService::new(
        SubscriptionMatcher::new(subscriptions.clone()),
        Arc::new(DiscordWebhookSender::new(config)?),
        notifications,
        events.clone(),
        config.watch_url_base.clone(),
    ));

    let handler = Arc::new(TransitionHandler::new(
        streamers,
        sessions,
        events,
        subscriptions,
        live_state.clone(),
        notifier,
        config,
    ));

    let orchestrator = Arc::new(LiveSyncOrchestrator::new(
        client.clone(),
        cursors.clone(),
        live_state.clone(),
        handler,
        config,
    ));

    let walker = CursorWalker::new(client, config.viewer_threshold, config.retry_interval);

    Ok(ScanScheduler::new(
        walker,
        cursors,
        live_state,
        orchestrator,
        config,
    ))
}
