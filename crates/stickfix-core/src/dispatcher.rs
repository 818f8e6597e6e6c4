//! Routes one inbound event to the handler bound to (state, payload).
//!
//! Handlers work on a copy of the user's state. The copy is committed only when
//! the handler succeeds; any failure, a panic included, leaves the user `Idle`.

use std::{any::Any, collections::HashMap, future::Future, panic::AssertUnwindSafe, sync::Arc};

use async_trait::async_trait;
use futures::FutureExt;
use tracing::{debug, error, warn};

use crate::{
    domain::UserId,
    errors::Error,
    messaging::{port::MessagingPort, types::Event},
    state::ConversationState,
    store::UserStore,
    Result,
};

/// Everything a handler may touch during one invocation. Nothing here outlives
/// the call.
pub struct HandlerContext<'a> {
    pub user: UserId,
    pub state: &'a mut ConversationState,
    pub store: &'a dyn UserStore,
    pub messenger: &'a dyn MessagingPort,
}

#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn handle(&self, ctx: &mut HandlerContext<'_>, args: &str) -> Result<()>;
}

#[async_trait]
pub trait TextHandler: Send + Sync {
    async fn handle(&self, ctx: &mut HandlerContext<'_>, text: &str) -> Result<()>;
}

/// Canonical form of a command token: no leading `/`, lowercase.
pub fn normalize_token(command: &str) -> String {
    command.trim_start_matches('/').to_lowercase()
}

/// What happens to a pending expectation when the user issues a command instead
/// of answering it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PendingPolicy {
    /// The pending expectation survives the command.
    #[default]
    Keep,
    /// The user is reset to `Idle` before the command runs.
    Cancel,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DispatchResult {
    Handled,
    /// Free text with no handler for the current state; the user is back to `Idle`.
    Ignored,
    UnknownCommand(String),
    HandlerFailed(String),
}

#[derive(Default)]
pub struct CommandDispatcher {
    commands: HashMap<String, Arc<dyn CommandHandler>>,
    text: HashMap<ConversationState, Arc<dyn TextHandler>>,
    policy: PendingPolicy,
}

impl CommandDispatcher {
    pub fn new(policy: PendingPolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    pub fn policy(&self) -> PendingPolicy {
        self.policy
    }

    /// Binds `handler` to a command token (matched case-insensitively).
    ///
    /// Last registration wins; the replaced handler is returned so callers can
    /// detect double binding.
    pub fn register(
        &mut self,
        command: &str,
        handler: Arc<dyn CommandHandler>,
    ) -> Option<Arc<dyn CommandHandler>> {
        let token = normalize_token(command);
        let previous = self.commands.insert(token.clone(), handler);
        if previous.is_some() {
            warn!(command = %token, "Command handler replaced");
        }
        previous
    }

    /// Binds the free-text handler for one state.
    pub fn register_text(
        &mut self,
        state: ConversationState,
        handler: Arc<dyn TextHandler>,
    ) -> Option<Arc<dyn TextHandler>> {
        self.text.insert(state, handler)
    }

    pub fn is_bound(&self, command: &str) -> bool {
        self.commands.contains_key(&normalize_token(command))
    }

    /// Bound command tokens, sorted.
    pub fn commands(&self) -> Vec<&str> {
        let mut out: Vec<&str> = self.commands.keys().map(String::as_str).collect();
        out.sort_unstable();
        out
    }

    pub fn has_text_handler(&self, state: ConversationState) -> bool {
        self.text.contains_key(&state)
    }

    /// Dispatches one event for `user`, whose state the caller has locked.
    pub async fn dispatch(
        &self,
        user: UserId,
        event: &Event,
        state: &mut ConversationState,
        store: &dyn UserStore,
        messenger: &dyn MessagingPort,
    ) -> DispatchResult {
        let mut next = *state;

        let outcome = match event {
            Event::Command { name, args } => {
                let Some(handler) = self.commands.get(&normalize_token(name)) else {
                    debug!(user_id = %user, command = %name, "Unknown command");
                    return DispatchResult::UnknownCommand(name.clone());
                };

                if self.policy == PendingPolicy::Cancel && !next.is_idle() {
                    debug!(user_id = %user, state = ?next, command = %name, "Command cancels pending state");
                    next = ConversationState::Idle;
                }

                let mut ctx = HandlerContext {
                    user,
                    state: &mut next,
                    store,
                    messenger,
                };
                contain_panic(handler.handle(&mut ctx, args)).await
            }
            Event::Text(text) => {
                let Some(handler) = self.text.get(&next) else {
                    debug!(user_id = %user, state = ?next, "No text handler, falling back to idle");
                    *state = ConversationState::Idle;
                    return DispatchResult::Ignored;
                };

                let mut ctx = HandlerContext {
                    user,
                    state: &mut next,
                    store,
                    messenger,
                };
                contain_panic(handler.handle(&mut ctx, text)).await
            }
        };

        match outcome {
            Ok(()) => {
                *state = next;
                DispatchResult::Handled
            }
            Err(e) => {
                error!(user_id = %user, error = %e, "Handler failed, resetting to idle");
                *state = ConversationState::Idle;
                DispatchResult::HandlerFailed(e.to_string())
            }
        }
    }
}

/// Turns a panic inside a handler into an ordinary handler error.
async fn contain_panic<F>(fut: F) -> Result<()>
where
    F: Future<Output = Result<()>>,
{
    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(outcome) => outcome,
        Err(payload) => Err(Error::Handler(format!(
            "handler panicked: {}",
            panic_message(payload.as_ref())
        ))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        *s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string payload"
    }
}
