//! Test doubles for the messaging port.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::{
    domain::UserId,
    errors::Error,
    messaging::{port::MessagingPort, types::ReplyKeyboard},
    Result,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outbound {
    Text(String),
    Markdown(String),
    Sticker(String),
    Keyboard(String, ReplyKeyboard),
}

/// Records every outbound call. When `fail_sends` is set, every call fails
/// after being recorded.
#[derive(Default)]
pub struct RecordingMessenger {
    sent: Mutex<Vec<(UserId, Outbound)>>,
    pub fail_sends: bool,
}

impl RecordingMessenger {
    pub fn failing() -> Self {
        Self {
            sent: Mutex::default(),
            fail_sends: true,
        }
    }

    pub fn sent(&self) -> Vec<(UserId, Outbound)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_to(&self, user: UserId) -> Vec<Outbound> {
        self.sent()
            .into_iter()
            .filter(|(to, _)| *to == user)
            .map(|(_, out)| out)
            .collect()
    }

    fn record(&self, to: UserId, out: Outbound) -> Result<()> {
        self.sent.lock().unwrap().push((to, out));
        if self.fail_sends {
            return Err(Error::External("telegram error: network down".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl MessagingPort for RecordingMessenger {
    async fn send_text(&self, to: UserId, text: &str) -> Result<()> {
        self.record(to, Outbound::Text(text.to_string()))
    }

    async fn send_markdown(&self, to: UserId, markdown: &str) -> Result<()> {
        self.record(to, Outbound::Markdown(markdown.to_string()))
    }

    async fn send_sticker(&self, to: UserId, sticker_id: &str) -> Result<()> {
        self.record(to, Outbound::Sticker(sticker_id.to_string()))
    }

    async fn send_with_keyboard(
        &self,
        to: UserId,
        text: &str,
        keyboard: &ReplyKeyboard,
    ) -> Result<()> {
        self.record(to, Outbound::Keyboard(text.to_string(), keyboard.clone()))
    }
}
