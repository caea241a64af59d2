use anyhow::Result;
use dotenvy::dotenv;
use secrecy::ExposeSecret;
use std::fs::File;
use std::io::{self, BufWriter};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use teloxide::prelude::*;
use teloxide::types::AllowedUpdate;
use teloxide::update_listeners::webhooks;
use teloxide::update_listeners::Polling;
use tokio::time::sleep;

use referearn::cli::{self, Cli, Commands};
use referearn::core::config::{self, Config, WebhookConfig};
use referearn::core::{init_logger, log_configuration};
use referearn::storage::{create_pool, SqliteUserStore, UserStore};
use referearn::telegram::{
    create_bot, schema, setup_bot_commands, Broadcaster, CommandRouter, HandlerDeps, Messenger, RouterSettings,
    TelegramMessenger,
};

/// Main entry point for the Telegram bot
///
/// Parses CLI arguments and dispatches to appropriate subcommand.
///
/// # Errors
/// Returns an error if initialization fails (logging, configuration, store, bot creation).
#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse_args();

    // Set up global panic handler so panics inside the dispatcher end up in the log
    std::panic::set_hook(Box::new(|panic_info| {
        log::error!("Panic caught: {:?}", panic_info);
        if let Some(location) = panic_info.location() {
            log::error!("Panic at {}:{}:{}", location.file(), location.line(), location.column());
        }
        if let Some(msg) = panic_info.payload().downcast_ref::<&str>() {
            log::error!("Panic message: {}", msg);
        }
    }));

    // Load environment variables from .env if present
    let _ = dotenv();

    // Initialize logger (console + file)
    init_logger(&config::log_file_path())?;

    // Dispatch to appropriate command
    match cli.command.unwrap_or(Commands::Run { polling: false }) {
        Commands::Run { polling } => run_bot(polling).await,
        Commands::Stats => {
            let store = open_store(&config::database_path()).await?;
            cli::print_stats(store.as_ref(), &mut io::stdout().lock()).await
        }
        Commands::Export { path } => {
            let store = open_store(&config::database_path()).await?;
            let mut out = BufWriter::new(File::create(&path)?);
            let count = cli::export_users(store.as_ref(), &mut out).await?;
            log::info!("Exported {} users to {}", count, path.display());
            Ok(())
        }
        Commands::DeleteUser { id } => {
            let store = open_store(&config::database_path()).await?;
            if cli::delete_user(store.as_ref(), id).await? {
                Ok(())
            } else {
                Err(anyhow::anyhow!("User {} not found", id))
            }
        }
    }
}

/// Opens the store and checks it answers; an unreachable store is fatal.
async fn open_store(database_path: &str) -> Result<Arc<dyn UserStore>> {
    let pool = create_pool(database_path).map_err(|e| anyhow::anyhow!("Failed to create database pool: {}", e))?;
    let store: Arc<dyn UserStore> = Arc::new(SqliteUserStore::new(Arc::new(pool)));
    store
        .ping()
        .await
        .map_err(|e| anyhow::anyhow!("Store {} is unreachable: {}", database_path, e))?;
    log::info!("Connected to store {}", database_path);
    Ok(store)
}

/// Run the Telegram bot
async fn run_bot(force_polling: bool) -> Result<()> {
    log::info!("Starting bot...");

    let config = Config::from_env()?;
    log_configuration(&config);

    let store = open_store(&config.database_path).await?;

    // Create bot instance
    let bot = create_bot(&config)?;

    // Get bot information for referral links
    // Retry while the Bot API is unreachable
    let bot_info = {
        let startup_max_retries = config::retry::MAX_DISPATCHER_RETRIES;
        let mut startup_retry = 0;
        loop {
            match bot.get_me().await {
                Ok(info) => break info,
                Err(e) => {
                    let retryable = matches!(e, teloxide::RequestError::Network(_) | teloxide::RequestError::Io(_));
                    startup_retry += 1;
                    if startup_retry >= startup_max_retries || !retryable {
                        return Err(anyhow::anyhow!(
                            "Failed to connect to Bot API after {} attempts: {}",
                            startup_retry,
                            e
                        ));
                    }
                    log::warn!(
                        "Bot API not reachable (attempt {}/{}): {}. Retrying...",
                        startup_retry,
                        startup_max_retries,
                        e
                    );
                    sleep(config::retry::dispatcher_delay()).await;
                }
            }
        }
    };
    let bot_username = bot_info.username().to_string();
    log::info!("Bot username: {}, Bot ID: {}", bot_username, bot_info.id);

    if let Err(e) = setup_bot_commands(&bot).await {
        log::warn!("Failed to set bot commands: {}", e);
    }

    let messenger: Arc<dyn Messenger> = Arc::new(TelegramMessenger::new(bot.clone()));
    let broadcaster = Arc::new(Broadcaster::new(
        Arc::clone(&store),
        Arc::clone(&messenger),
        config.broadcast_delay,
    ));
    let router = Arc::new(CommandRouter::new(
        Arc::clone(&store),
        messenger,
        Arc::clone(&broadcaster),
        RouterSettings {
            owner_id: config.owner_id,
            logger_id: config.logger_id,
            bot_username: bot_username.clone(),
        },
    ));
    let handler = schema(HandlerDeps::new(router));

    match config.webhook.as_ref().filter(|_| !force_polling) {
        Some(webhook) => run_webhook(bot, handler, webhook, &config).await?,
        None => run_polling(bot, handler).await,
    }

    // Stop a running broadcast; it still reports what it delivered
    broadcaster.shutdown();
    if let Ok(Some(report)) = tokio::time::timeout(Duration::from_secs(5), broadcaster.join()).await {
        log::info!(
            "Broadcast stopped at shutdown: {} delivered, {} failed",
            report.delivered,
            report.failed
        );
    }
    log::info!("{} has been stopped", bot_username);
    Ok(())
}

async fn run_webhook(
    bot: Bot,
    handler: teloxide::dispatching::UpdateHandler<referearn::telegram::HandlerError>,
    webhook: &WebhookConfig,
    config: &Config,
) -> Result<()> {
    let url = url::Url::parse(&format!("{}{}", webhook.url, config.bot_token.expose_secret()))
        .map_err(|e| anyhow::anyhow!("Invalid WEBHOOK_URL: {}", e))?;
    let address = SocketAddr::from(([0, 0, 0, 0], webhook.port));

    let mut options = webhooks::Options::new(address, url)
        .max_connections(config::webhook::MAX_CONNECTIONS)
        .drop_pending_updates();
    if let Some(secret) = &webhook.secret_token {
        options = options.secret_token(secret.expose_secret().to_string());
    }

    let listener = webhooks::axum(bot.clone(), options)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to set webhook: {}", e))?;
    log::info!("Starting bot in webhook mode on port {}", webhook.port);

    Dispatcher::builder(bot, handler)
        .dependencies(DependencyMap::new())
        .enable_ctrlc_handler()
        .build()
        .dispatch_with_listener(listener, LoggingErrorHandler::with_custom_text("An error from the webhook listener"))
        .await;
    Ok(())
}

async fn run_polling(bot: Bot, handler: teloxide::dispatching::UpdateHandler<referearn::telegram::HandlerError>) {
    log::info!("Starting bot in long polling mode");
    let mut retry_count = 0;
    let max_retries = config::retry::MAX_DISPATCHER_RETRIES;

    // Run the dispatcher with retry logic
    loop {
        let bot_clone = bot.clone();
        let handler_clone = handler.clone();

        // Dispatcher runs in its own task so a panic surfaces through the JoinHandle
        let handle = tokio::spawn(async move {
            let listener = Polling::builder(bot_clone.clone())
                .timeout(config::polling::timeout())
                .allowed_updates(vec![AllowedUpdate::Message, AllowedUpdate::CallbackQuery])
                .drop_pending_updates()
                .build();

            Dispatcher::builder(bot_clone, handler_clone)
                .dependencies(DependencyMap::new())
                .enable_ctrlc_handler()
                .build()
                .dispatch_with_listener(
                    listener,
                    LoggingErrorHandler::with_custom_text("An error from the update listener"),
                )
                .await
        });

        match handle.await {
            Ok(()) => {
                log::info!("Dispatcher shutdown gracefully");
                break;
            }
            Err(join_err) if join_err.is_panic() => {
                log::error!("Dispatcher panicked: {}", join_err);
                if retry_count >= max_retries {
                    log::error!("Max retries reached after panic. Exiting...");
                    break;
                }
                retry_count += 1;
                log::info!(
                    "Restarting dispatcher after panic (attempt {}/{})...",
                    retry_count,
                    max_retries
                );
                sleep(config::retry::dispatcher_delay()).await;
            }
            Err(join_err) => {
                log::warn!("Dispatcher task was cancelled: {}", join_err);
                break;
            }
        }
    }
}
