//! Per-user conversation state.

use std::{collections::HashMap, sync::Arc};

use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::domain::UserId;

/// What the bot expects next from one specific user.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ConversationState {
    /// No pending expectation.
    #[default]
    Idle,
    /// `/forgetMe` was issued; waiting for a yes/no answer.
    AwaitingForgetConfirmation,
}

impl ConversationState {
    pub fn is_idle(&self) -> bool {
        matches!(self, ConversationState::Idle)
    }
}

/// How a free-text answer to a yes/no question was understood.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConfirmationReply {
    Affirmative,
    Negative,
    Unrecognized,
}

impl ConfirmationReply {
    pub fn classify(text: &str) -> Self {
        match text.trim().to_lowercase().as_str() {
            "yes" | "y" => ConfirmationReply::Affirmative,
            "no" | "n" => ConfirmationReply::Negative,
            _ => ConfirmationReply::Unrecognized,
        }
    }
}

/// State table keyed by user. Each user gets its own lock, so one user's
/// handler never waits on another's.
///
/// A slot only exists while it carries information: `release` drops slots that
/// are back to `Idle` once nobody holds or waits on them.
#[derive(Default)]
pub struct StateTable {
    inner: Mutex<HashMap<UserId, Arc<Mutex<ConversationState>>>>,
}

impl StateTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Locks the user's state for the duration of one dispatch. Unseen users
    /// start out `Idle`.
    pub async fn lock_user(&self, id: UserId) -> OwnedMutexGuard<ConversationState> {
        let slot = {
            let mut map = self.inner.lock().await;
            map.entry(id)
                .or_insert_with(|| Arc::new(Mutex::new(ConversationState::Idle)))
                .clone()
        };
        slot.lock_owned().await
    }

    /// Snapshot of a user's state (waits for any in-flight dispatch of that user).
    pub async fn get(&self, id: UserId) -> ConversationState {
        let slot = { self.inner.lock().await.get(&id).cloned() };
        match slot {
            Some(slot) => *slot.lock().await,
            None => ConversationState::Idle,
        }
    }

    /// Evicts the user's slot if it is `Idle` and unreferenced outside the
    /// table. Returns whether the slot was dropped.
    pub async fn release(&self, id: UserId) -> bool {
        let mut map = self.inner.lock().await;
        let evictable = match map.get(&id) {
            // Clones are only taken under the map lock, so a count of one
            // means no guard or waiter exists for this slot.
            Some(slot) if Arc::strong_count(slot) == 1 => {
                slot.try_lock().map(|s| s.is_idle()).unwrap_or(false)
            }
            _ => false,
        };
        if evictable {
            map.remove(&id);
        }
        evictable
    }

    /// Number of users with a live slot.
    pub async fn tracked_users(&self) -> usize {
        self.inner.lock().await.len()
    }
}
