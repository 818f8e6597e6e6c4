use crate::{dispatcher::normalize_token, domain::UserId};

/// Reply keyboard shown under the input field (not inline buttons).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReplyKeyboard {
    pub rows: Vec<Vec<String>>,
    pub one_time: bool,
    pub resize: bool,
}

impl ReplyKeyboard {
    /// "Yes" / "No" on a single row, hidden after one use.
    pub fn yes_no() -> Self {
        Self {
            rows: vec![vec!["Yes".to_string(), "No".to_string()]],
            one_time: true,
            resize: true,
        }
    }
}

/// Inbound payload as understood by the core.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    Command { name: String, args: String },
    Text(String),
}

impl Event {
    /// Telegram may send `/cmd@botname arg1 ...`; the bot suffix is dropped and
    /// the command name lowercased.
    pub fn parse(text: &str) -> Self {
        let trimmed = text.trim();
        if !trimmed.starts_with('/') {
            return Event::Text(text.to_string());
        }

        let mut parts = trimmed.splitn(2, char::is_whitespace);
        let first = parts.next().unwrap_or("");
        let args = parts.next().unwrap_or("").trim().to_string();

        let name = normalize_token(first.split('@').next().unwrap_or(""));

        Event::Command { name, args }
    }
}

/// One event delivered by the transport.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InboundEvent {
    pub user_id: UserId,
    pub username: Option<String>,
    pub event: Event,
}

impl InboundEvent {
    pub fn new(user_id: UserId, event: Event) -> Self {
        Self {
            user_id,
            username: None,
            event,
        }
    }
}
