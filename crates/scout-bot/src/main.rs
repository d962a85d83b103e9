mod aggregator;
mod api;
mod config;
mod dispatcher;
mod error;
mod format;
mod gateway;
mod telegram;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::Router;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::aggregator::Aggregator;
use crate::config::{preview_secret, AppConfig};
use crate::dispatcher::Dispatcher;
use crate::gateway::MarketplaceGateway;
use crate::telegram::TelegramClient;

pub use crate::error::{AppError, AppResult};

/// Pending replies before handlers start waiting on the sender
const OUTBOX_CAPACITY: usize = 256;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub started_at: Instant,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "scout=info,scout_bot=info,tower_http=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false),
        )
        .init();

    println!("================================================");
    println!("          EDEN SCOUT - Starting Up              ");
    println!("================================================");

    let config = AppConfig::load().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;

    println!("[CONFIG] Server: {}", config.server_addr());
    println!("[CONFIG] Telegram API: {}", config.telegram.api_url);
    println!("[CONFIG] Telegram Bot Token: {}", preview_secret(&config.telegram.bot_token));
    println!("[CONFIG] Magic Eden API: {}", config.marketplace.base_url);
    println!("[CONFIG] Magic Eden API Key: {}", preview_secret(&config.marketplace.api_key));
    println!(
        "[CONFIG] Batch: max {} wallets, {}ms apart",
        config.report.max_batch, config.report.batch_delay_ms
    );

    if let Err(e) = config.validate() {
        println!("[CONFIG] FATAL: {}", e);
        tracing::error!(error = %e, "Refusing to start with invalid configuration");
        return Err(e.into());
    }

    tracing::info!(
        addr = %config.server_addr(),
        max_batch = config.report.max_batch,
        "Starting Eden Scout"
    );

    // Marketplace side
    let gateway = MarketplaceGateway::new(&config.marketplace)?;
    let aggregator = Aggregator::new(gateway, &config.report);

    // Telegram side
    let telegram = TelegramClient::new(&config.telegram)?;
    let (outbox_tx, outbox_rx) = mpsc::channel(OUTBOX_CAPACITY);
    let dispatcher = Arc::new(Dispatcher::new(aggregator, outbox_tx));

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for Ctrl-C");
                return;
            }
            println!("[SHUTDOWN] Ctrl-C received, stopping...");
            cancel.cancel();
        });
    }

    let sender = tokio::spawn(dispatcher::run_sender(
        telegram.clone(),
        outbox_rx,
        cancel.clone(),
    ));
    let poller = tokio::spawn(dispatcher::run_polling(
        telegram,
        dispatcher,
        Duration::from_secs(config.telegram.poll_retry_secs),
        cancel.clone(),
    ));

    let state = AppState {
        config: Arc::new(config.clone()),
        started_at: Instant::now(),
    };

    let app = Router::new()
        .merge(api::create_router())
        .layer(TraceLayer::new_for_http())
        .with_state(state);
    println!("[ROUTER] Routes configured: /, /health");

    let addr: SocketAddr = config.server_addr().parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    println!("================================================");
    println!("  Server listening on http://{}", addr);
    println!("  Bot is polling Telegram for messages");
    println!("================================================");
    println!();

    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(cancel.clone().cancelled_owned())
        .await?;

    // The server can also stop on its own; make sure the bot loops follow
    cancel.cancel();
    if let Err(e) = poller.await {
        tracing::error!(error = %e, "Polling task ended abnormally");
    }
    if let Err(e) = sender.await {
        tracing::error!(error = %e, "Sender task ended abnormally");
    }

    println!("[SHUTDOWN] Eden Scout stopped");
    Ok(())
}
