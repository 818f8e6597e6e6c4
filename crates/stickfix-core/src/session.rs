//! Bot session: owns the state table and the dispatch table, and runs the
//! event loop between the transport and the dispatcher.

use std::{collections::HashMap, sync::Arc, time::Duration};

use tokio::{
    sync::mpsc,
    task::{JoinError, JoinSet},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    dispatcher::{CommandDispatcher, DispatchResult},
    domain::UserId,
    messaging::{
        port::MessagingPort,
        types::{Event, InboundEvent},
    },
    state::{ConversationState, StateTable},
    store::UserStore,
};

const APOLOGY: &str = "Sorry, something went wrong. Please try again later.";

/// How long a user's worker waits for the next event before exiting.
pub const WORKER_IDLE: Duration = Duration::from_secs(600);

pub struct BotSession {
    store: Arc<dyn UserStore>,
    messenger: Arc<dyn MessagingPort>,
    dispatcher: CommandDispatcher,
    states: StateTable,
    worker_idle: Duration,
}

impl BotSession {
    pub fn new(
        store: Arc<dyn UserStore>,
        messenger: Arc<dyn MessagingPort>,
        dispatcher: CommandDispatcher,
    ) -> Self {
        Self {
            store,
            messenger,
            dispatcher,
            states: StateTable::new(),
            worker_idle: WORKER_IDLE,
        }
    }

    pub fn with_worker_idle(mut self, idle: Duration) -> Self {
        self.worker_idle = idle;
        self
    }

    /// Current state of a user (`Idle` if never seen).
    pub async fn state_of(&self, user: UserId) -> ConversationState {
        self.states.get(user).await
    }

    /// Handles one event for one user. The user's state stays locked for the
    /// whole dispatch, so events of the same user never interleave.
    pub async fn handle_event(&self, user: UserId, event: &Event) -> DispatchResult {
        let mut state = self.states.lock_user(user).await;

        let result = self
            .dispatcher
            .dispatch(
                user,
                event,
                &mut state,
                self.store.as_ref(),
                self.messenger.as_ref(),
            )
            .await;
        let now = *state;
        drop(state);
        self.states.release(user).await;

        match &result {
            DispatchResult::Handled => debug!(user_id = %user, state = ?now, "Event handled"),
            DispatchResult::Ignored => debug!(user_id = %user, "Text ignored"),
            DispatchResult::UnknownCommand(name) => {
                debug!(user_id = %user, command = %name, "Unknown command ignored")
            }
            DispatchResult::HandlerFailed(reason) => {
                if let Err(e) = self.messenger.send_text(user, APOLOGY).await {
                    warn!(user_id = %user, error = %e, reason = %reason, "Could not deliver apology");
                }
            }
        }

        result
    }

    /// Runs until `events` closes or `shutdown` fires.
    ///
    /// Each user gets a worker task fed by its own queue: one user's events are
    /// handled in arrival order, different users proceed independently. Workers
    /// exit after `worker_idle` without events and are respawned on demand.
    /// Events already handed to a worker are finished before returning.
    pub async fn run(
        self: Arc<Self>,
        mut events: mpsc::Receiver<InboundEvent>,
        shutdown: CancellationToken,
    ) {
        info!(
            commands = ?self.dispatcher.commands(),
            pending_policy = ?self.dispatcher.policy(),
            worker_idle = ?self.worker_idle,
            "Event loop started"
        );

        let mut queues: HashMap<UserId, UserQueue> = HashMap::new();
        let mut workers: JoinSet<UserId> = JoinSet::new();

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                Some(done) = workers.join_next(), if !workers.is_empty() => {
                    retire_worker(&mut queues, done);
                }
                next = events.recv() => match next {
                    Some(inbound) => self.enqueue(&mut queues, &mut workers, inbound),
                    None => break,
                },
            }
        }

        drop(queues);
        while let Some(done) = workers.join_next().await {
            if let Err(e) = done {
                warn!(error = %e, "User worker terminated");
            }
        }

        let tracked_users = self.states.tracked_users().await;
        info!(tracked_users, "Event loop stopped");
    }

    fn enqueue(
        self: &Arc<Self>,
        queues: &mut HashMap<UserId, UserQueue>,
        workers: &mut JoinSet<UserId>,
        inbound: InboundEvent,
    ) {
        let user = inbound.user_id;
        debug!(
            user_id = %user,
            username = inbound.username.as_deref().unwrap_or("unknown"),
            "Inbound event"
        );

        let queue = queues
            .entry(user)
            .or_insert_with(|| UserQueue::spawn(workers, self, user, None));

        if let Err(mpsc::error::SendError(event)) = queue.tx.send(inbound.event) {
            // The worker went idle and closed its queue; the replacement waits
            // until the old one has finished its backlog.
            debug!(user_id = %user, "Restarting user worker");
            let previous = queue.done.clone();
            let fresh = UserQueue::spawn(workers, self, user, Some(previous));
            let _ = fresh.tx.send(event);
            *queue = fresh;
        }
    }
}

struct UserQueue {
    tx: mpsc::UnboundedSender<Event>,
    /// Cancelled once the worker behind `tx` has returned.
    done: CancellationToken,
}

impl UserQueue {
    fn spawn(
        workers: &mut JoinSet<UserId>,
        session: &Arc<BotSession>,
        user: UserId,
        after: Option<CancellationToken>,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let done = CancellationToken::new();
        workers.spawn(user_worker(session.clone(), user, rx, after, done.clone()));
        Self { tx, done }
    }
}

fn retire_worker(queues: &mut HashMap<UserId, UserQueue>, done: Result<UserId, JoinError>) {
    match done {
        Ok(user) => {
            // A replacement may already own the entry; only a closed queue goes.
            if queues.get(&user).is_some_and(|q| q.tx.is_closed()) {
                queues.remove(&user);
                debug!(user_id = %user, "User worker retired");
            }
        }
        Err(e) => warn!(error = %e, "User worker terminated"),
    }
}

async fn user_worker(
    session: Arc<BotSession>,
    user: UserId,
    mut rx: mpsc::UnboundedReceiver<Event>,
    after: Option<CancellationToken>,
    done: CancellationToken,
) -> UserId {
    let _done = done.drop_guard();
    if let Some(previous) = after {
        previous.cancelled().await;
    }

    loop {
        match tokio::time::timeout(session.worker_idle, rx.recv()).await {
            Ok(Some(event)) => {
                session.handle_event(user, &event).await;
            }
            Ok(None) => break,
            Err(_) => {
                rx.close();
                while let Some(event) = rx.recv().await {
                    session.handle_event(user, &event).await;
                }
                debug!(user_id = %user, "User worker idle, exiting");
                break;
            }
        }
    }

    user
}
