//! Per-screen state machine with latest-wins cancellation.
//!
//! Each screen owns one `StateMachine`. Starting a new load supersedes the
//! previous one: its task is cancelled and, should it still finish, its result
//! is dropped instead of published.

use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use skycast_weather::Outcome;

/// What a screen shows.
#[derive(Debug, Clone, PartialEq)]
pub enum ScreenState<T> {
    Loading,
    /// Nothing to show and nothing was fetched (list screen only)
    Empty,
    Success(T),
    Error { code: u16, message: String },
}

impl<T> ScreenState<T> {
    /// Failures keep the HTTP status and server message; exceptions report
    /// code 0 with a display message.
    pub fn from_outcome<U>(outcome: Outcome<U>, map: impl FnOnce(U) -> T) -> Self {
        match outcome {
            Outcome::Success(value) => Self::Success(map(value)),
            Outcome::Failure { code, message } => Self::Error {
                code,
                message: message.unwrap_or_default(),
            },
            Outcome::Exception(e) => Self::Error {
                code: 0,
                message: e.user_message().to_string(),
            },
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Loading => "loading",
            Self::Empty => "empty",
            Self::Success(_) => "success",
            Self::Error { .. } => "error",
        }
    }
}

struct InFlight {
    generation: u64,
    token: CancellationToken,
}

pub struct StateMachine<T> {
    name: &'static str,
    tx: watch::Sender<ScreenState<T>>,
    inflight: Mutex<InFlight>,
}

impl<T> std::fmt::Debug for StateMachine<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateMachine").field("name", &self.name).finish()
    }
}

impl<T: Clone + Send + Sync + 'static> StateMachine<T> {
    /// Starts in `Loading`.
    pub fn new(name: &'static str) -> Arc<Self> {
        Self::with_initial(name, ScreenState::Loading)
    }

    pub fn with_initial(name: &'static str, initial: ScreenState<T>) -> Arc<Self> {
        let (tx, _rx) = watch::channel(initial);
        Arc::new(Self {
            name,
            tx,
            inflight: Mutex::new(InFlight {
                generation: 0,
                token: CancellationToken::new(),
            }),
        })
    }

    pub fn subscribe(&self) -> watch::Receiver<ScreenState<T>> {
        self.tx.subscribe()
    }

    pub fn current(&self) -> ScreenState<T> {
        self.tx.borrow().clone()
    }

    /// Supersede whatever is in flight and hand out the right to publish.
    pub fn begin(self: &Arc<Self>) -> Ticket<T> {
        let mut inflight = self.inflight.lock();
        inflight.token.cancel();
        inflight.generation += 1;
        inflight.token = CancellationToken::new();

        Ticket {
            machine: Arc::clone(self),
            generation: inflight.generation,
            token: inflight.token.clone(),
        }
    }

    /// Re-enter `Loading`, then publish whatever `load` resolves to.
    pub fn refresh<Fut>(self: &Arc<Self>, load: Fut) -> JoinHandle<()>
    where
        Fut: Future<Output = ScreenState<T>> + Send + 'static,
    {
        let ticket = self.begin();
        ticket.publish(ScreenState::Loading);
        ticket.spawn(load)
    }

    /// Publish immediately, superseding any in-flight load.
    pub fn set(self: &Arc<Self>, state: ScreenState<T>) {
        self.begin().publish(state);
    }

    /// Cancel the in-flight load without publishing anything (screen teardown).
    pub fn cancel(&self) {
        let mut inflight = self.inflight.lock();
        inflight.token.cancel();
        inflight.generation += 1;
    }

    fn publish_if_current(&self, generation: u64, state: ScreenState<T>) -> bool {
        // Held across the send so a superseding begin() cannot interleave.
        let inflight = self.inflight.lock();
        if inflight.generation != generation {
            tracing::debug!("{}: dropping superseded {} state", self.name, state.label());
            return false;
        }
        tracing::debug!("{}: -> {}", self.name, state.label());
        self.tx.send_replace(state);
        true
    }
}

/// Permission to publish for one generation of a state machine.
pub struct Ticket<T> {
    machine: Arc<StateMachine<T>>,
    generation: u64,
    token: CancellationToken,
}

impl<T> Clone for Ticket<T> {
    fn clone(&self) -> Self {
        Self {
            machine: Arc::clone(&self.machine),
            generation: self.generation,
            token: self.token.clone(),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Ticket<T> {
    /// Returns false if this ticket has been superseded.
    pub fn publish(&self, state: ScreenState<T>) -> bool {
        self.machine.publish_if_current(self.generation, state)
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Run `load` until it finishes or this ticket is superseded.
    pub fn spawn<Fut>(self, load: Fut) -> JoinHandle<()>
    where
        Fut: Future<Output = ScreenState<T>> + Send + 'static,
    {
        tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = self.token.cancelled() => {
                    tracing::debug!("{}: load superseded", self.machine.name);
                }
                state = load => {
                    self.publish(state);
                }
            }
        })
    }
}
