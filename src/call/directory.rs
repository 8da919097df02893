use std::{
    collections::HashMap,
    net::IpAddr,
    sync::{Arc, Mutex, MutexGuard},
};

use crate::{
    call::{
        call_error::{CallError, Result},
        session::CallSession,
    },
    signaling::channel::SignalingChannel,
};

type Sessions = HashMap<IpAddr, Arc<CallSession>>;

/// Active calls keyed by remote IP: at most one session per host.
///
/// A session removes its own entry once it has terminated, whichever side
/// ended it.
#[derive(Debug, Clone, Default)]
pub struct CallDirectory {
    sessions: Arc<Mutex<Sessions>>,
}

impl CallDirectory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Option<MutexGuard<'_, Sessions>> {
        self.sessions.lock().ok()
    }

    /// Starts a session on `channel` unless its host already has one.
    ///
    /// The check and the insert happen under one lock, so two simultaneous
    /// connections from a host cannot both get in. A refused channel is
    /// closed and the existing session is left alone.
    pub fn admit<F>(&self, channel: SignalingChannel, start: F) -> Result<Arc<CallSession>>
    where
        F: FnOnce(SignalingChannel) -> Result<Arc<CallSession>>,
    {
        let peer = channel.peer().ip();
        let session = {
            let Some(mut sessions) = self.lock() else {
                channel.close();
                return Err(CallError::Setup("call directory poisoned".into()));
            };
            if sessions.contains_key(&peer) {
                channel.close();
                return Err(CallError::AlreadyInCall(peer));
            }
            let session = start(channel)?;
            sessions.insert(peer, Arc::clone(&session));
            session
        };

        // Registered outside the lock: it runs at once if the session has
        // already ended, and it takes the lock itself.
        let directory = self.clone();
        session.set_on_terminated(move |ended| {
            directory.remove_session(ended);
        });
        Ok(session)
    }

    #[must_use]
    pub fn contains(&self, peer: IpAddr) -> bool {
        self.lock().is_some_and(|s| s.contains_key(&peer))
    }

    #[must_use]
    pub fn get(&self, peer: IpAddr) -> Option<Arc<CallSession>> {
        self.lock()?.get(&peer).cloned()
    }

    pub fn remove(&self, peer: IpAddr) -> Option<Arc<CallSession>> {
        self.lock()?.remove(&peer)
    }

    /// Removes `session`'s entry only if it is still the one registered.
    fn remove_session(&self, session: &Arc<CallSession>) {
        if let Some(mut sessions) = self.lock() {
            if sessions
                .get(&session.peer())
                .is_some_and(|s| Arc::ptr_eq(s, session))
            {
                sessions.remove(&session.peer());
            }
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().map_or(0, |s| s.len())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn peers(&self) -> Vec<IpAddr> {
        let mut peers: Vec<IpAddr> = self
            .lock()
            .map(|s| s.keys().copied().collect())
            .unwrap_or_default();
        peers.sort();
        peers
    }

    /// Hangs up every session and waits for each to quiesce.
    pub fn shutdown_all(&self) {
        let sessions: Vec<Arc<CallSession>> = self
            .lock()
            .map(|s| s.values().cloned().collect())
            .unwrap_or_default();
        for session in sessions {
            session.hang_up();
        }
    }
}
