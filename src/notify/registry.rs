//! Registry of open notification sessions, keyed by player

use crate::notify::SessionHandle;
use crate::types::PlayerId;
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Open sessions per player. Sessions deregister themselves when they end.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<PlayerId, Vec<SessionHandle>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<PlayerId, Vec<SessionHandle>>> {
        self.sessions.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<PlayerId, Vec<SessionHandle>>> {
        self.sessions.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn register(&self, handle: SessionHandle) {
        let mut sessions = self.write();
        let handles = sessions.entry(handle.player_id().to_string()).or_default();
        handles.retain(|open| !open.is_closed());
        handles.push(handle);
    }

    /// Drop `handle`, and the player's key once no session is left
    pub fn remove(&self, handle: &SessionHandle) {
        let mut sessions = self.write();
        if let Some(handles) = sessions.get_mut(handle.player_id()) {
            handles.retain(|other| !other.same_session(handle));
            if handles.is_empty() {
                sessions.remove(handle.player_id());
            }
        }
    }

    /// Remove and return every session of `player_id`
    pub fn take_player(&self, player_id: &str) -> Vec<SessionHandle> {
        self.write().remove(player_id).unwrap_or_default()
    }

    /// Remove and return every registered session
    pub fn drain(&self) -> Vec<SessionHandle> {
        self.write()
            .drain()
            .flat_map(|(_, handles)| handles)
            .collect()
    }

    /// Sessions not yet closed
    pub fn active(&self) -> usize {
        self.read()
            .values()
            .flatten()
            .filter(|handle| !handle.is_closed())
            .count()
    }

    /// Players with at least one registered session
    pub fn player_count(&self) -> usize {
        self.read().len()
    }
}
