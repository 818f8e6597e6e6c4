use std::sync::Arc;

use clap::Parser;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use stickfix_core::{
    commands::standard_dispatcher,
    config::Config,
    messaging::port::MessagingPort,
    session::BotSession,
    store::{SqliteUserStore, UserStore},
};
use stickfix_telegram::{router, Bot, TelegramMessenger};

/// Inbound events buffered between the Telegram poller and the event loop.
const EVENT_BUFFER: usize = 256;

#[derive(Parser, Debug)]
#[command(name = "stickfix", about = "Stickfix Telegram bot")]
struct Args {
    /// Use the test bot token (TELEGRAM_TEST_TOKEN) instead of STICKFIX_TOKEN.
    #[arg(long)]
    test: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let cfg = Arc::new(Config::load(args.test)?);
    stickfix_core::logging::init("stickfix", Some(&cfg.log_dir))?;
    info!(root = %cfg.root_dir.display(), test = args.test, "Starting Stickfix");

    let store: Arc<dyn UserStore> = Arc::new(SqliteUserStore::open(&cfg.database_path).await?);

    // The store is closed on every path out of `serve`, including startup errors.
    let outcome = serve(cfg, store.clone()).await;
    store.close().await;

    if let Err(e) = &outcome {
        error!(error = %e, "Stickfix stopped with an error");
    }
    outcome
}

async fn serve(cfg: Arc<Config>, store: Arc<dyn UserStore>) -> anyhow::Result<()> {
    let bot = Bot::new(cfg.telegram_bot_token.clone());

    // Flood limits are handled by the adapter's RetryAfter retry.
    let messenger: Arc<dyn MessagingPort> = Arc::new(TelegramMessenger::new(bot.clone()));

    let session = Arc::new(BotSession::new(
        store,
        messenger,
        standard_dispatcher(&cfg.command_settings()),
    ));

    let (tx, rx) = mpsc::channel(EVENT_BUFFER);
    let shutdown = CancellationToken::new();
    let event_loop = tokio::spawn(session.run(rx, shutdown.clone()));

    let polled = router::run_polling(bot, tx).await;

    // The sender is gone once polling returns; on error stop right away.
    if polled.is_err() {
        shutdown.cancel();
    }
    event_loop.await?;

    polled
}
