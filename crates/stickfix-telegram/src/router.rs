use std::sync::Arc;

use teloxide::{dispatching::Dispatcher, dptree, prelude::*};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use stickfix_core::{
    domain::UserId,
    messaging::types::{Event, InboundEvent},
};

/// Shared state for update endpoints.
#[derive(Clone)]
pub struct AppState {
    pub events: mpsc::Sender<InboundEvent>,
}

/// Converts a Telegram message into a core event. Only text messages carry
/// something the bot understands.
pub fn to_inbound(msg: &Message) -> Option<InboundEvent> {
    let text = msg.text()?;
    Some(InboundEvent {
        user_id: UserId(msg.chat.id.0),
        username: msg.chat.username().map(str::to_string),
        event: Event::parse(text),
    })
}

/// Long-polls Telegram and forwards every text message to `events` until
/// Ctrl-C. Teloxide processes updates of one chat sequentially, so per-user
/// order is preserved into the channel.
pub async fn run_polling(bot: Bot, events: mpsc::Sender<InboundEvent>) -> anyhow::Result<()> {
    match bot.get_me().await {
        Ok(me) => info!(username = %me.username(), "Stickfix started"),
        Err(e) => return Err(anyhow::anyhow!("telegram get_me failed: {e}")),
    }

    let state = Arc::new(AppState { events });

    let handler = dptree::entry().branch(Update::filter_message().endpoint(handle_message));

    info!("Running bot polling service...");
    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    info!("Polling stopped");
    Ok(())
}

async fn handle_message(msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let Some(inbound) = to_inbound(&msg) else {
        debug!(chat_id = msg.chat.id.0, "Non-text message ignored");
        return Ok(());
    };

    if state.events.send(inbound).await.is_err() {
        warn!(chat_id = msg.chat.id.0, "Event loop closed, update dropped");
    }
    Ok(())
}
