//! Connected viewer sessions and event fan-out

use crate::error::SessionDeliveryError;
use crate::events::ServerEvent;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info, warn};
use uuid::Uuid;

pub type SessionId = Uuid;

/// Sending half of one viewer's delivery queue
pub struct SessionHandle {
    sender: mpsc::Sender<ServerEvent>,
    /// Simulated time of the last state or positions event this session accepted
    last_sync: Mutex<Option<DateTime<Utc>>>,
}

impl SessionHandle {
    pub fn new(sender: mpsc::Sender<ServerEvent>) -> Self {
        Self { sender, last_sync: Mutex::new(None) }
    }

    /// Create a handle together with the receiving end of its bounded queue
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<ServerEvent>) {
        let (sender, receiver) = mpsc::channel(capacity);
        (Self::new(sender), receiver)
    }

    /// Queue an event without waiting
    pub fn deliver(&self, event: ServerEvent) -> Result<(), SessionDeliveryError> {
        let simulated_time = match &event {
            ServerEvent::StateSync(sync) => Some(sync.time),
            ServerEvent::PositionsUpdated(snapshot) => Some(snapshot.time),
            _ => None,
        };

        match self.sender.try_send(event) {
            Ok(()) => {
                if let Some(time) = simulated_time {
                    *self.last_sync.lock() = Some(time);
                }
                Ok(())
            }
            Err(TrySendError::Full(_)) => Err(SessionDeliveryError::Lagging),
            Err(TrySendError::Closed(_)) => Err(SessionDeliveryError::Closed),
        }
    }

    pub fn last_sync(&self) -> Option<DateTime<Utc>> {
        *self.last_sync.lock()
    }
}

/// Outcome of one fan-out
#[derive(Debug, Default, Clone, PartialEq)]
pub struct BroadcastReport {
    pub delivered: usize,
    /// Sessions that failed delivery and were unregistered
    pub dropped: Vec<(SessionId, SessionDeliveryError)>,
}

/// All connected sessions. Membership has its own lock, independent of the clock.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<SessionId, SessionHandle>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, handle: SessionHandle) -> SessionId {
        let id = Uuid::new_v4();
        self.sessions.write().insert(id, handle);
        debug!(session_id = %id, "Registered session");
        id
    }

    /// Remove a session; dropping its handle closes the queue
    pub fn unregister(&self, id: SessionId) -> bool {
        let removed = self.sessions.write().remove(&id).is_some();
        if removed {
            debug!(session_id = %id, "Unregistered session");
        }
        removed
    }

    /// Deliver `event` to every session.
    ///
    /// Failures are collected under the read lock and the failed sessions removed afterwards
    /// under the write lock, so one bad session never blocks delivery to the rest.
    pub fn broadcast(&self, event: &ServerEvent) -> BroadcastReport {
        let mut report = BroadcastReport::default();

        {
            let sessions = self.sessions.read();
            for (id, session) in sessions.iter() {
                match session.deliver(event.clone()) {
                    Ok(()) => report.delivered += 1,
                    Err(e) => report.dropped.push((*id, e)),
                }
            }
        }

        if !report.dropped.is_empty() {
            let mut sessions = self.sessions.write();
            for (id, error) in &report.dropped {
                sessions.remove(id);
                log_dropped(*id, *error, event.name());
            }
        }

        report
    }

    /// Deliver `event` to one session, dropping it on failure
    pub fn send_to(&self, id: SessionId, event: ServerEvent) -> Result<(), SessionDeliveryError> {
        let name = event.name();
        let result = match self.sessions.read().get(&id) {
            Some(session) => session.deliver(event),
            None => return Err(SessionDeliveryError::UnknownSession),
        };

        if let Err(error) = result {
            self.sessions.write().remove(&id);
            log_dropped(id, error, name);
        }
        result
    }

    pub fn contains(&self, id: SessionId) -> bool {
        self.sessions.read().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }

    pub fn last_sync(&self, id: SessionId) -> Option<DateTime<Utc>> {
        self.sessions.read().get(&id).and_then(SessionHandle::last_sync)
    }

    /// Drop every session, closing their queues. Returns how many were open.
    pub fn close_all(&self) -> usize {
        let drained: Vec<_> = self.sessions.write().drain().collect();
        drained.len()
    }
}

fn log_dropped(id: SessionId, error: SessionDeliveryError, event: &'static str) {
    match error {
        SessionDeliveryError::Lagging => {
            warn!(session_id = %id, event, "Session queue full, dropping session")
        }
        _ => info!(session_id = %id, event, "Session closed, removing"),
    }
}
