//! The bot's command set: `/start`, `/help`, `/forgetMe` and the yes/no answer
//! that follows `/forgetMe`.

use std::{path::PathBuf, sync::Arc};

use async_trait::async_trait;
use tracing::{info, warn};

use crate::{
    dispatcher::{CommandDispatcher, CommandHandler, HandlerContext, PendingPolicy, TextHandler},
    errors::Error,
    messaging::types::ReplyKeyboard,
    state::{ConfirmationReply, ConversationState},
    Result,
};

pub const START: &str = "start";
pub const HELP: &str = "help";
pub const FORGET_ME: &str = "forgetme";

pub const DEFAULT_WELCOME_STICKER: &str = "CAADBAADTAADqAABTgXzVqN6dJUIXwI";

const HELP_UNAVAILABLE: &str = "I can't help you rn due to an unexpected error uwu";
const FORGET_WARNING: &str = "This will remove all of your *private packs*.";
const FORGET_QUESTION: &str = "Are you sure you want me to remove you from the Database?";
const FORGOTTEN: &str = "Ok uwu";
const NOTHING_TO_FORGET: &str = "You weren't registered, nothing to forget.";
const KEPT: &str = "Ok, I'll keep your data.";

/// Inputs for building the standard command table.
#[derive(Clone, Debug)]
pub struct CommandSettings {
    pub welcome_sticker: String,
    pub help_path: PathBuf,
    pub pending_policy: PendingPolicy,
}

/// Builds the dispatch table once; every token is bound exactly once.
pub fn standard_dispatcher(settings: &CommandSettings) -> CommandDispatcher {
    let mut d = CommandDispatcher::new(settings.pending_policy);
    d.register(
        START,
        Arc::new(Start {
            sticker_id: settings.welcome_sticker.clone(),
        }),
    );
    d.register(
        HELP,
        Arc::new(Help {
            path: settings.help_path.clone(),
        }),
    );
    d.register(FORGET_ME, Arc::new(ForgetMe));
    d.register_text(
        ConversationState::AwaitingForgetConfirmation,
        Arc::new(ForgetConfirmation),
    );
    d
}

/// Registers the user if needed and greets them with a sticker.
pub struct Start {
    pub sticker_id: String,
}

#[async_trait]
impl CommandHandler for Start {
    async fn handle(&self, ctx: &mut HandlerContext<'_>, _args: &str) -> Result<()> {
        match ctx.store.add(ctx.user).await {
            Ok(()) => info!(user_id = %ctx.user, "User added to the database"),
            Err(e) if e.is_already_registered() => {
                info!(user_id = %ctx.user, "User already in the database")
            }
            Err(e) => {
                warn!(user_id = %ctx.user, error = %e, "Failed to register user");
                return Err(e.into());
            }
        }

        ctx.messenger.send_sticker(ctx.user, &self.sticker_id).await
    }
}

/// Sends the Markdown help file.
pub struct Help {
    pub path: PathBuf,
}

#[async_trait]
impl CommandHandler for Help {
    async fn handle(&self, ctx: &mut HandlerContext<'_>, _args: &str) -> Result<()> {
        let text = match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Help message unavailable");
                ctx.messenger.send_text(ctx.user, HELP_UNAVAILABLE).await?;
                return Err(Error::Handler(format!("help message unavailable: {e}")));
            }
        };

        ctx.messenger.send_markdown(ctx.user, &text).await?;
        info!(user_id = %ctx.user, "Help message sent");
        Ok(())
    }
}

/// Asks for confirmation before forgetting the user. Nothing is deleted here.
pub struct ForgetMe;

#[async_trait]
impl CommandHandler for ForgetMe {
    async fn handle(&self, ctx: &mut HandlerContext<'_>, _args: &str) -> Result<()> {
        *ctx.state = ConversationState::AwaitingForgetConfirmation;
        ctx.messenger.send_markdown(ctx.user, FORGET_WARNING).await?;
        ctx.messenger
            .send_with_keyboard(ctx.user, FORGET_QUESTION, &ReplyKeyboard::yes_no())
            .await
    }
}

/// Handles the answer to the `/forgetMe` question.
pub struct ForgetConfirmation;

#[async_trait]
impl TextHandler for ForgetConfirmation {
    async fn handle(&self, ctx: &mut HandlerContext<'_>, text: &str) -> Result<()> {
        match ConfirmationReply::classify(text) {
            ConfirmationReply::Affirmative => {
                *ctx.state = ConversationState::Idle;
                // The deletion stands even if the reply below fails to send.
                let removed = ctx.store.remove(ctx.user).await?;
                if removed {
                    info!(user_id = %ctx.user, "User removed from the database");
                    ctx.messenger.send_text(ctx.user, FORGOTTEN).await
                } else {
                    info!(user_id = %ctx.user, "User asked to be forgotten but was not registered");
                    ctx.messenger.send_text(ctx.user, NOTHING_TO_FORGET).await
                }
            }
            ConfirmationReply::Negative => {
                *ctx.state = ConversationState::Idle;
                ctx.messenger.send_text(ctx.user, KEPT).await
            }
            ConfirmationReply::Unrecognized => {
                ctx.messenger
                    .send_with_keyboard(ctx.user, FORGET_QUESTION, &ReplyKeyboard::yes_no())
                    .await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dispatcher::DispatchResult,
        domain::UserId,
        messaging::{
            testing::{Outbound, RecordingMessenger},
            types::Event,
        },
        store::{MemoryUserStore, UserStore},
    };

    fn settings(help_path: PathBuf) -> CommandSettings {
        CommandSettings {
            welcome_sticker: DEFAULT_WELCOME_STICKER.to_string(),
            help_path,
            pending_policy: PendingPolicy::Keep,
        }
    }

    fn cmd(name: &str) -> Event {
        Event::Command {
            name: name.to_string(),
            args: String::new(),
        }
    }

    fn text(s: &str) -> Event {
        Event::Text(s.to_string())
    }

    #[test]
    fn standard_table_binds_each_command_once() {
        let d = standard_dispatcher(&settings(PathBuf::from("/nonexistent/help.md")));
        assert_eq!(d.commands(), vec![FORGET_ME, HELP, START]);
        assert!(d.is_bound("forgetMe"));
        assert!(d.has_text_handler(ConversationState::AwaitingForgetConfirmation));
        assert!(!d.has_text_handler(ConversationState::Idle));
    }

    #[tokio::test]
    async fn start_registers_once_and_sends_sticker() {
        let d = standard_dispatcher(&settings(PathBuf::from("/nonexistent/help.md")));
        let store = MemoryUserStore::new();
        let messenger = RecordingMessenger::default();
        let mut state = ConversationState::Idle;

        for _ in 0..2 {
            let res = d
                .dispatch(UserId(42), &cmd(START), &mut state, &store, &messenger)
                .await;
            assert_eq!(res, DispatchResult::Handled);
        }

        assert!(store.contains(UserId(42)).await.unwrap());
        assert_eq!(store.len().await, 1);
        assert_eq!(
            messenger.sent_to(UserId(42)),
            vec![
                Outbound::Sticker(DEFAULT_WELCOME_STICKER.to_string()),
                Outbound::Sticker(DEFAULT_WELCOME_STICKER.to_string())
            ]
        );
        assert_eq!(state, ConversationState::Idle);
    }

    #[tokio::test]
    async fn help_sends_file_contents_as_markdown() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("help.md");
        std::fs::write(&path, "*Stickfix* help").unwrap();

        let d = standard_dispatcher(&settings(path));
        let store = MemoryUserStore::new();
        let messenger = RecordingMessenger::default();
        let mut state = ConversationState::Idle;

        let res = d
            .dispatch(UserId(1), &cmd(HELP), &mut state, &store, &messenger)
            .await;

        assert_eq!(res, DispatchResult::Handled);
        assert_eq!(
            messenger.sent_to(UserId(1)),
            vec![Outbound::Markdown("*Stickfix* help".to_string())]
        );
    }

    #[tokio::test]
    async fn missing_help_file_apologises_and_fails() {
        let dir = tempfile::tempdir().unwrap();
        let d = standard_dispatcher(&settings(dir.path().join("missing.md")));
        let store = MemoryUserStore::new();
        let messenger = RecordingMessenger::default();
        let mut state = ConversationState::Idle;

        let res = d
            .dispatch(UserId(1), &cmd(HELP), &mut state, &store, &messenger)
            .await;

        assert!(matches!(res, DispatchResult::HandlerFailed(_)));
        assert_eq!(
            messenger.sent_to(UserId(1)),
            vec![Outbound::Text(HELP_UNAVAILABLE.to_string())]
        );
    }

    #[tokio::test]
    async fn forget_me_prompts_without_deleting() {
        let d = standard_dispatcher(&settings(PathBuf::from("/nonexistent/help.md")));
        let store = MemoryUserStore::new();
        store.add(UserId(42)).await.unwrap();
        let messenger = RecordingMessenger::default();
        let mut state = ConversationState::Idle;

        d.dispatch(UserId(42), &cmd(FORGET_ME), &mut state, &store, &messenger)
            .await;

        assert_eq!(state, ConversationState::AwaitingForgetConfirmation);
        assert!(store.contains(UserId(42)).await.unwrap());
        assert_eq!(
            messenger.sent_to(UserId(42)),
            vec![
                Outbound::Markdown(FORGET_WARNING.to_string()),
                Outbound::Keyboard(FORGET_QUESTION.to_string(), ReplyKeyboard::yes_no())
            ]
        );
    }

    #[tokio::test]
    async fn unrecognized_answer_reprompts_and_keeps_record() {
        let d = standard_dispatcher(&settings(PathBuf::from("/nonexistent/help.md")));
        let store = MemoryUserStore::new();
        store.add(UserId(42)).await.unwrap();
        let messenger = RecordingMessenger::default();
        let mut state = ConversationState::AwaitingForgetConfirmation;

        d.dispatch(UserId(42), &text("maybe"), &mut state, &store, &messenger)
            .await;

        assert_eq!(state, ConversationState::AwaitingForgetConfirmation);
        assert!(store.contains(UserId(42)).await.unwrap());
        assert_eq!(
            messenger.sent_to(UserId(42)),
            vec![Outbound::Keyboard(
                FORGET_QUESTION.to_string(),
                ReplyKeyboard::yes_no()
            )]
        );
    }

    #[tokio::test]
    async fn negative_answer_keeps_record() {
        let d = standard_dispatcher(&settings(PathBuf::from("/nonexistent/help.md")));
        let store = MemoryUserStore::new();
        store.add(UserId(42)).await.unwrap();
        let messenger = RecordingMessenger::default();
        let mut state = ConversationState::AwaitingForgetConfirmation;

        d.dispatch(UserId(42), &text("No"), &mut state, &store, &messenger)
            .await;

        assert_eq!(state, ConversationState::Idle);
        assert!(store.contains(UserId(42)).await.unwrap());
        assert_eq!(
            messenger.sent_to(UserId(42)),
            vec![Outbound::Text(KEPT.to_string())]
        );
    }

    #[tokio::test]
    async fn affirmative_answer_deletes_record() {
        let d = standard_dispatcher(&settings(PathBuf::from("/nonexistent/help.md")));
        let store = MemoryUserStore::new();
        store.add(UserId(42)).await.unwrap();
        let messenger = RecordingMessenger::default();
        let mut state = ConversationState::AwaitingForgetConfirmation;

        let res = d
            .dispatch(UserId(42), &text("yes"), &mut state, &store, &messenger)
            .await;

        assert_eq!(res, DispatchResult::Handled);
        assert_eq!(state, ConversationState::Idle);
        assert!(!store.contains(UserId(42)).await.unwrap());
        assert_eq!(
            messenger.sent_to(UserId(42)),
            vec![Outbound::Text(FORGOTTEN.to_string())]
        );
    }

    #[tokio::test]
    async fn affirmative_answer_for_unregistered_user_completes() {
        let d = standard_dispatcher(&settings(PathBuf::from("/nonexistent/help.md")));
        let store = MemoryUserStore::new();
        let messenger = RecordingMessenger::default();
        let mut state = ConversationState::AwaitingForgetConfirmation;

        let res = d
            .dispatch(UserId(7), &text("Yes"), &mut state, &store, &messenger)
            .await;

        assert_eq!(res, DispatchResult::Handled);
        assert_eq!(state, ConversationState::Idle);
        assert_eq!(
            messenger.sent_to(UserId(7)),
            vec![Outbound::Text(NOTHING_TO_FORGET.to_string())]
        );
    }

    #[tokio::test]
    async fn deletion_stands_when_reply_fails() {
        let d = standard_dispatcher(&settings(PathBuf::from("/nonexistent/help.md")));
        let store = MemoryUserStore::new();
        store.add(UserId(42)).await.unwrap();
        let messenger = RecordingMessenger::failing();
        let mut state = ConversationState::AwaitingForgetConfirmation;

        let res = d
            .dispatch(UserId(42), &text("yes"), &mut state, &store, &messenger)
            .await;

        assert!(matches!(res, DispatchResult::HandlerFailed(_)));
        assert_eq!(state, ConversationState::Idle);
        assert!(!store.contains(UserId(42)).await.unwrap());
    }

    #[tokio::test]
    async fn failed_prompt_leaves_user_idle() {
        let d = standard_dispatcher(&settings(PathBuf::from("/nonexistent/help.md")));
        let store = MemoryUserStore::new();
        let messenger = RecordingMessenger::failing();
        let mut state = ConversationState::Idle;

        let res = d
            .dispatch(UserId(1), &cmd(FORGET_ME), &mut state, &store, &messenger)
            .await;

        assert!(matches!(res, DispatchResult::HandlerFailed(_)));
        assert_eq!(state, ConversationState::Idle);
    }
}
