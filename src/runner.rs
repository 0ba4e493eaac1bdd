use crate::bot;
use crate::bot::handlers::{is_link_message, Command};
use crate::bot::TelegramMessenger;
use crate::config::Settings;
use crate::downloader::{temp, Messenger, RapidApiResolver, RelayService};
use crate::keep_alive;
use crate::scheduler::{DeletionScheduler, DeletionStore};
use std::sync::Arc;
use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use teloxide::types::CallbackQuery;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Run the bot until Ctrl-C.
pub async fn run_bot(settings: Arc<Settings>) {
    let bot = Bot::new(settings.telegram_token.clone());
    let messenger: Arc<dyn Messenger> =
        Arc::new(TelegramMessenger::new(bot.clone(), settings.channel_id));

    prepare_download_dir(&settings).await;
    let scheduler = init_scheduler(&settings, Arc::clone(&messenger)).await;

    let resolver = Arc::new(RapidApiResolver::from_settings(&settings));
    let service = Arc::new(RelayService::new(&settings, resolver, messenger, scheduler));
    info!(
        capacity = settings.cache_capacity,
        auto_delete_secs = settings.auto_delete_secs,
        "Relay service initialized."
    );

    let shutdown = CancellationToken::new();
    if let Some(port) = settings.port {
        let server_service = Arc::clone(&service);
        let server_shutdown = shutdown.clone();
        tokio::spawn(async move {
            if let Err(e) = keep_alive::serve(port, server_service, server_shutdown).await {
                error!("Keep-alive server failed: {e}");
            }
        });
    }

    let handler = setup_handler();

    info!("Bot is running...");

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![service])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    shutdown.cancel();
    info!("Bot stopped.");
}

async fn prepare_download_dir(settings: &Settings) {
    match temp::sweep_stale(&settings.download_dir).await {
        Ok(0) => {}
        Ok(n) => info!("Removed {n} stale downloads from {}", settings.download_dir.display()),
        Err(e) => {
            error!(
                "Download directory {} is unusable: {e}",
                settings.download_dir.display()
            );
            std::process::exit(1);
        }
    }
}

async fn init_scheduler(settings: &Settings, messenger: Arc<dyn Messenger>) -> DeletionScheduler {
    let store = DeletionStore::file(settings.deletion_store_path.clone());
    let scheduler = DeletionScheduler::new(messenger, store, settings.auto_delete_after());

    match scheduler.restore().await {
        Ok(0) => {}
        Ok(n) => info!("Restored {n} pending deletions."),
        Err(e) => warn!(
            "Failed to restore pending deletions from {}: {e}",
            settings.deletion_store_path.display()
        ),
    }
    scheduler
}

fn setup_handler() -> UpdateHandler<teloxide::RequestError> {
    dptree::entry()
        .branch(Update::filter_callback_query().endpoint(handle_callback))
        .branch(
            Update::filter_message()
                .branch(
                    dptree::entry()
                        .filter_command::<Command>()
                        .endpoint(handle_command),
                )
                .branch(
                    dptree::filter(|msg: Message| msg.text().is_some_and(is_link_message))
                        .endpoint(handle_link),
                ),
        )
}

async fn handle_command(
    bot: Bot,
    msg: Message,
    cmd: Command,
    service: Arc<RelayService>,
) -> Result<(), teloxide::RequestError> {
    let res = match cmd {
        Command::Start => bot::handlers::start(bot, msg).await,
        Command::Help => bot::handlers::help(bot, msg, service).await,
        Command::Stats => bot::handlers::stats(bot, msg, service).await,
        Command::Delete => bot::handlers::delete(bot, msg, service).await,
    };
    if let Err(e) = res {
        error!("Command error: {}", e);
    }
    respond(())
}

async fn handle_link(
    msg: Message,
    service: Arc<RelayService>,
) -> Result<(), teloxide::RequestError> {
    if let Err(e) = bot::handlers::handle_link(msg, service).await {
        error!("Link handler error: {}", e);
    }
    respond(())
}

async fn handle_callback(bot: Bot, q: CallbackQuery) -> Result<(), teloxide::RequestError> {
    if let Err(e) = bot::handlers::handle_callback(bot, q).await {
        error!("Callback handler error: {}", e);
    }
    respond(())
}
