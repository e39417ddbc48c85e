//! Concurrent session bookkeeping.
//!
//! The map guard is held only for insert/lookup/remove; each entry carries
//! its own lock so frame processing for one session never contends with the
//! map or with other sessions. Callers must drop the map guard before
//! locking an entry, which every method here does internally.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use linevox_foundation::RegistryError;

use crate::session::{DetectionSession, SessionSnapshot};

pub type SessionHandle = Arc<Mutex<DetectionSession>>;

pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, SessionHandle>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Register a new session. At most one entry may exist per id.
    pub fn insert(&self, session: DetectionSession) -> Result<SessionHandle, RegistryError> {
        let id = session.session_id().to_string();
        let mut map = self.sessions.write();
        if map.contains_key(&id) {
            return Err(RegistryError::AlreadyActive(id));
        }
        let handle = Arc::new(Mutex::new(session));
        map.insert(id, handle.clone());
        Ok(handle)
    }

    pub fn get(&self, session_id: &str) -> Option<SessionHandle> {
        self.sessions.read().get(session_id).cloned()
    }

    /// Claim and remove an entry. Frames arriving after this see no session
    /// and are dropped by the caller.
    pub fn remove(&self, session_id: &str) -> Result<SessionHandle, RegistryError> {
        self.sessions
            .write()
            .remove(session_id)
            .ok_or_else(|| RegistryError::NotFound(session_id.to_string()))
    }

    /// Drain every entry, for shutdown.
    pub fn drain(&self) -> Vec<SessionHandle> {
        self.sessions.write().drain().map(|(_, h)| h).collect()
    }

    pub fn snapshots(&self) -> Vec<SessionSnapshot> {
        // Clone the handles under the short map guard, then lock each entry
        // individually so a busy session never stalls the map.
        let handles: Vec<SessionHandle> = self.sessions.read().values().cloned().collect();
        let mut snapshots: Vec<SessionSnapshot> =
            handles.iter().map(|h| h.lock().snapshot()).collect();
        snapshots.sort_by(|a, b| a.session_id.cmp(&b.session_id));
        snapshots
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
