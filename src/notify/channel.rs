//! Per-player notification sessions
//!
//! A session is one spawned task owning two timers: the poll timer drives
//! [`Matcher::attempt`] and the heartbeat timer emits keep-alive frames. The
//! task ends on a terminal event, on explicit cancellation, or when the
//! receiving side is dropped. Every emission races its buffer slot against
//! cancellation and re-checks the shared `closed` flag before sending, so
//! nothing is delivered once the session has closed. Open sessions are
//! tracked in a [`SessionRegistry`] and deregister themselves on exit.

use crate::config::ChannelConfig;
use crate::matching::{Matcher, PositionTracker};
use crate::metrics::MetricsCollector;
use crate::notify::SessionRegistry;
use crate::types::{MatchOutcome, NotificationEvent, PlayerId};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, Notify};
use tokio::time::{interval, interval_at, Instant, MissedTickBehavior};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, error, info};

pub const NOT_FOUND_MESSAGE: &str = "Player not found in queue";
pub const SERVER_ERROR_MESSAGE: &str = "Server error";

/// Lifecycle of a notification session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Streaming,
    ClosedMatched,
    ClosedError,
    ClosedNotFound,
    ClosedCancelled,
}

impl SessionState {
    pub fn is_closed(&self) -> bool {
        !matches!(self, SessionState::Connecting | SessionState::Streaming)
    }

    pub fn label(&self) -> &'static str {
        match self {
            SessionState::Connecting => "connecting",
            SessionState::Streaming => "streaming",
            SessionState::ClosedMatched => "matched",
            SessionState::ClosedError => "error",
            SessionState::ClosedNotFound => "not_found",
            SessionState::ClosedCancelled => "cancelled",
        }
    }
}

#[derive(Debug)]
struct SessionShared {
    closed: AtomicBool,
    state: Mutex<SessionState>,
    cancel: Notify,
}

impl SessionShared {
    fn new() -> Self {
        Self {
            closed: AtomicBool::new(false),
            state: Mutex::new(SessionState::Connecting),
            cancel: Notify::new(),
        }
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn state(&self) -> SessionState {
        *self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn set_state(&self, state: SessionState) {
        *self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = state;
    }

    /// Connecting -> Streaming, unless a close got there first
    fn start_streaming(&self) {
        let mut state = self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if *state == SessionState::Connecting && !self.is_closed() {
            *state = SessionState::Streaming;
        }
    }

    /// Close once; later calls keep the first terminal state
    fn close(&self, state: SessionState) -> bool {
        if self
            .closed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        self.set_state(state);
        self.cancel.notify_one();
        true
    }
}

/// Cloneable control handle for one session
#[derive(Debug, Clone)]
pub struct SessionHandle {
    player_id: PlayerId,
    shared: Arc<SessionShared>,
}

impl SessionHandle {
    pub fn player_id(&self) -> &str {
        &self.player_id
    }

    /// Stop both timers and release the session; no further events are sent
    pub fn cancel(&self) {
        if self.shared.close(SessionState::ClosedCancelled) {
            debug!("Notification session for '{}' cancelled", self.player_id);
        }
    }

    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }

    pub fn state(&self) -> SessionState {
        self.shared.state()
    }

    /// Whether both handles control the same session
    pub fn same_session(&self, other: &SessionHandle) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }
}

/// The receiving end of a session
pub struct NotificationSession {
    handle: SessionHandle,
    events: mpsc::Receiver<NotificationEvent>,
}

impl NotificationSession {
    pub fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    /// Next event, or `None` once the session has ended
    pub async fn recv(&mut self) -> Option<NotificationEvent> {
        self.events.recv().await
    }

    /// Hand the event stream to a transport. Dropping the stream ends the session.
    pub fn into_stream(self) -> (SessionHandle, ReceiverStream<NotificationEvent>) {
        (self.handle, ReceiverStream::new(self.events))
    }
}

/// Opens notification sessions against a shared matcher
#[derive(Clone)]
pub struct NotificationChannel {
    matcher: Matcher,
    tracker: PositionTracker,
    config: ChannelConfig,
    metrics: Arc<MetricsCollector>,
    registry: Arc<SessionRegistry>,
}

impl NotificationChannel {
    pub fn new(
        matcher: Matcher,
        tracker: PositionTracker,
        config: ChannelConfig,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            matcher,
            tracker,
            config,
            metrics,
            registry: Arc::new(SessionRegistry::new()),
        }
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    /// Sessions opened through this channel that have not ended yet
    pub fn registry(&self) -> Arc<SessionRegistry> {
        self.registry.clone()
    }

    /// Spawn a session for `player_id`; the first event is always `connected`
    pub fn open(&self, player_id: &str) -> NotificationSession {
        let (tx, events) = mpsc::channel(self.config.buffer_size.max(1));
        let shared = Arc::new(SessionShared::new());
        let handle = SessionHandle {
            player_id: player_id.to_string(),
            shared: shared.clone(),
        };

        let worker = SessionWorker {
            player_id: player_id.to_string(),
            matcher: self.matcher.clone(),
            tracker: self.tracker.clone(),
            config: self.config.clone(),
            metrics: self.metrics.clone(),
            shared,
            handle: handle.clone(),
            registry: self.registry.clone(),
            tx,
        };

        // Registered before the worker runs so its exit always finds the entry
        self.registry.register(handle.clone());
        self.metrics.record_session_opened();
        tokio::spawn(worker.run());

        NotificationSession { handle, events }
    }
}

struct SessionWorker {
    player_id: PlayerId,
    matcher: Matcher,
    tracker: PositionTracker,
    config: ChannelConfig,
    metrics: Arc<MetricsCollector>,
    shared: Arc<SessionShared>,
    handle: SessionHandle,
    registry: Arc<SessionRegistry>,
    tx: mpsc::Sender<NotificationEvent>,
}

impl SessionWorker {
    async fn run(self) {
        let opened = Instant::now();
        info!("Notification session opened for '{}'", self.player_id);

        let connected = NotificationEvent::Connected {
            player_id: self.player_id.clone(),
        };
        if self.emit(connected).await {
            self.shared.start_streaming();
            self.stream().await;
        } else {
            self.shared.close(SessionState::ClosedCancelled);
        }

        self.registry.remove(&self.handle);
        let state = self.shared.state();
        self.metrics
            .record_session_closed(state.label(), opened.elapsed());
        info!(
            "Notification session for '{}' closed: {}",
            self.player_id,
            state.label()
        );
    }

    async fn stream(&self) {
        let mut poll = interval(self.config.poll_interval);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let heartbeat_every = self.config.heartbeat_interval;
        let mut heartbeat = interval_at(Instant::now() + heartbeat_every, heartbeat_every);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

        while !self.shared.is_closed() {
            tokio::select! {
                biased;

                _ = self.shared.cancel.notified() => {
                    self.shared.close(SessionState::ClosedCancelled);
                }
                _ = self.tx.closed() => {
                    debug!("Receiver for '{}' dropped", self.player_id);
                    self.shared.close(SessionState::ClosedCancelled);
                }
                _ = poll.tick() => {
                    if let Some(terminal) = self.poll_once().await {
                        self.shared.close(terminal);
                    }
                }
                _ = heartbeat.tick() => {
                    if !self.emit(NotificationEvent::KeepAlive).await {
                        self.shared.close(SessionState::ClosedCancelled);
                    }
                }
            }
        }
    }

    /// One matcher round; returns the terminal state if the session must end
    async fn poll_once(&self) -> Option<SessionState> {
        let (event, terminal) = match self.matcher.attempt(&self.player_id).await {
            Ok(MatchOutcome::NotFound) => (
                NotificationEvent::Error {
                    message: NOT_FOUND_MESSAGE.to_string(),
                },
                Some(SessionState::ClosedNotFound),
            ),
            Ok(MatchOutcome::AlreadyMatched { match_id, opponent }) => (
                NotificationEvent::MatchFound { match_id, opponent },
                Some(SessionState::ClosedMatched),
            ),
            Ok(MatchOutcome::Matched { match_id, opponent }) => (
                NotificationEvent::MatchFound {
                    match_id,
                    opponent: Some(opponent),
                },
                Some(SessionState::ClosedMatched),
            ),
            Ok(MatchOutcome::Searching) => match self.tracker.position(&self.player_id).await {
                Ok(position) => (NotificationEvent::from(position), None),
                Err(e) => {
                    error!("Position lookup for '{}' failed: {}", self.player_id, e);
                    self.metrics.record_storage_error("position");
                    (server_error(), Some(SessionState::ClosedError))
                }
            },
            Err(e) => {
                error!("Polling for '{}' failed: {}", self.player_id, e);
                (server_error(), Some(SessionState::ClosedError))
            }
        };

        if !self.emit(event).await {
            return Some(SessionState::ClosedCancelled);
        }
        terminal
    }

    async fn emit(&self, event: NotificationEvent) -> bool {
        if self.shared.is_closed() {
            return false;
        }

        let permit = tokio::select! {
            biased;

            _ = self.shared.cancel.notified() => return false,
            permit = self.tx.reserve() => match permit {
                Ok(permit) => permit,
                Err(_) => return false,
            },
        };

        // A cancel may have landed while the slot was being reserved
        if self.shared.is_closed() {
            return false;
        }
        self.metrics.record_event_emitted(&event);
        permit.send(event);
        true
    }
}

fn server_error() -> NotificationEvent {
    NotificationEvent::Error {
        message: SERVER_ERROR_MESSAGE.to_string(),
    }
}
