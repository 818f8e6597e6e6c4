use async_trait::async_trait;

use crate::{domain::UserId, messaging::types::ReplyKeyboard, Result};

/// Outbound side of the chat transport.
///
/// The core only distinguishes plain text from Markdown-emphasised text; how
/// either is rendered is up to the adapter.
#[async_trait]
pub trait MessagingPort: Send + Sync {
    async fn send_text(&self, to: UserId, text: &str) -> Result<()>;

    async fn send_markdown(&self, to: UserId, markdown: &str) -> Result<()>;

    async fn send_sticker(&self, to: UserId, sticker_id: &str) -> Result<()>;

    /// Plain text with a reply affordance attached.
    async fn send_with_keyboard(
        &self,
        to: UserId,
        text: &str,
        keyboard: &ReplyKeyboard,
    ) -> Result<()>;
}
