use anyhow::{Context, Result};
use charlotte_bot::bot::{self, HandlerContext};
use charlotte_bot::config::{AppConfig, StorageConfig};
use charlotte_bot::conversation::ConversationState;
use charlotte_bot::errors::error_logging::log_config_error;
use charlotte_bot::localization;
use charlotte_bot::observability;
use charlotte_bot::storage::{postgres, JsonFileStorage, PgStorage, Storage};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use teloxide::dispatching::dialogue::InMemStorage;
use teloxide::prelude::*;
use teloxide::update_listeners::webhooks;
use tracing::info;

/// Open the configured storage backend, creating tables or files as needed
async fn open_storage(config: &StorageConfig) -> Result<Arc<dyn Storage>> {
    match config {
        StorageConfig::Postgres(database) => {
            let pool = postgres::connect(database).await?;
            postgres::init_database_schema(&pool).await?;
            Ok(Arc::new(PgStorage::new(pool)))
        }
        StorageConfig::JsonFiles { data_dir } => {
            Ok(Arc::new(JsonFileStorage::open(data_dir).await?))
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file first
    dotenvy::dotenv().ok();

    // A missing token is the one fatal startup error
    let config = AppConfig::from_env()?;

    observability::init_observability(&config.observability)?;

    if let Err(e) = config.validate() {
        log_config_error(&e, "startup");
        return Err(e.into());
    }
    info!("{}", config.summary());

    let storage = open_storage(&config.storage).await?;
    let localization = localization::create_localization_manager()?;

    // Initialize the bot with custom client configuration for better reliability
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.bot.http_timeout_secs))
        .build()
        .context("Failed to create HTTP client")?;
    let bot = Bot::with_client(config.bot.token.clone(), client);

    let ctx = HandlerContext {
        storage,
        localization,
    };

    let mut dispatcher = Dispatcher::builder(bot.clone(), bot::schema())
        .dependencies(dptree::deps![ctx, InMemStorage::<ConversationState>::new()])
        .error_handler(LoggingErrorHandler::with_custom_text(
            "An error has occurred in the dispatcher",
        ))
        .enable_ctrlc_handler()
        .build();

    if config.webhook.use_polling {
        info!("Starting dispatcher with long polling");
        bot.delete_webhook().await?;
        dispatcher.dispatch().await;
        return Ok(());
    }

    let url = config
        .webhook
        .url(&config.bot.token)
        .context("WEBHOOK_URL is required in webhook mode")?;
    let url = reqwest::Url::parse(&url).context("WEBHOOK_URL is not a valid URL")?;
    let addr = SocketAddr::from(([0, 0, 0, 0], config.webhook.port));

    let listener = webhooks::axum(bot, webhooks::Options::new(addr, url))
        .await
        .context("Failed to register webhook")?;

    info!(
        port = config.webhook.port,
        path = "/bot[REDACTED]",
        "Webhook server listening"
    );

    dispatcher
        .dispatch_with_listener(
            listener,
            LoggingErrorHandler::with_custom_text("An error from the update listener"),
        )
        .await;

    Ok(())
}
