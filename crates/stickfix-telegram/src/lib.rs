//! Telegram adapter (teloxide).
//!
//! Implements the `stickfix-core` MessagingPort over the Bot API and turns
//! incoming updates into core events.

use async_trait::async_trait;

use teloxide::{
    prelude::*,
    types::{InputFile, KeyboardButton, KeyboardMarkup, ParseMode},
};

use tokio::time::sleep;

pub mod router;

pub use teloxide::Bot;

use stickfix_core::{
    domain::UserId,
    errors::Error,
    messaging::{port::MessagingPort, types::ReplyKeyboard},
    Result,
};

#[derive(Clone)]
pub struct TelegramMessenger {
    bot: Bot,
}

impl TelegramMessenger {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    fn tg_chat(user: UserId) -> teloxide::types::ChatId {
        teloxide::types::ChatId(user.0)
    }

    fn map_err(e: teloxide::RequestError) -> Error {
        Error::External(format!("telegram error: {e}"))
    }

    fn keyboard_markup(keyboard: &ReplyKeyboard) -> KeyboardMarkup {
        let rows: Vec<Vec<KeyboardButton>> = keyboard
            .rows
            .iter()
            .map(|row| row.iter().map(KeyboardButton::new).collect())
            .collect();

        let mut markup = KeyboardMarkup::new(rows);
        if keyboard.one_time {
            markup = markup.one_time_keyboard(true);
        }
        if keyboard.resize {
            markup = markup.resize_keyboard(true);
        }
        markup
    }

    async fn with_retry<T, Fut>(&self, mut op: impl FnMut() -> Fut) -> Result<T>
    where
        Fut: std::future::IntoFuture<Output = std::result::Result<T, teloxide::RequestError>>,
        Fut::IntoFuture: Send,
    {
        const MAX_RETRIES: usize = 1;
        let mut attempts = 0usize;
        loop {
            match op().await {
                Ok(v) => return Ok(v),
                Err(e) => match e {
                    teloxide::RequestError::RetryAfter(d) if attempts < MAX_RETRIES => {
                        attempts += 1;
                        sleep(d).await;
                        continue;
                    }
                    other => return Err(Self::map_err(other)),
                },
            }
        }
    }
}

#[async_trait]
impl MessagingPort for TelegramMessenger {
    async fn send_text(&self, to: UserId, text: &str) -> Result<()> {
        self.with_retry(|| self.bot.send_message(Self::tg_chat(to), text.to_string()))
            .await?;
        Ok(())
    }

    async fn send_markdown(&self, to: UserId, markdown: &str) -> Result<()> {
        // Help texts are written in Telegram's legacy Markdown.
        #[allow(deprecated)]
        let mode = ParseMode::Markdown;
        self.with_retry(|| {
            self.bot
                .send_message(Self::tg_chat(to), markdown.to_string())
                .parse_mode(mode)
        })
        .await?;
        Ok(())
    }

    async fn send_sticker(&self, to: UserId, sticker_id: &str) -> Result<()> {
        self.with_retry(|| {
            self.bot
                .send_sticker(Self::tg_chat(to), InputFile::file_id(sticker_id.to_string()))
        })
        .await?;
        Ok(())
    }

    async fn send_with_keyboard(
        &self,
        to: UserId,
        text: &str,
        keyboard: &ReplyKeyboard,
    ) -> Result<()> {
        let markup = Self::keyboard_markup(keyboard);
        self.with_retry(|| {
            self.bot
                .send_message(Self::tg_chat(to), text.to_string())
                .reply_markup(markup.clone())
        })
        .await?;
        Ok(())
    }
}
