use crate::domain::{PeerId, PeerSession, SessionState};
use instant::Duration;
use std::collections::HashMap;

/// A live session already exists for the peer
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("peer {peer} already has a {state} session")]
pub struct SessionExists {
    pub peer: PeerId,
    pub state: SessionState,
}

/// Authoritative map of peer sessions (one entry per peer)
///
/// Owned by a single coordinator; nothing else holds a reference to it.
#[derive(Debug, Default)]
pub struct SessionTable {
    sessions: HashMap<PeerId, PeerSession>,
}

impl SessionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a session, replacing only idle placeholders
    pub fn insert(&mut self, session: PeerSession) -> Result<(), SessionExists> {
        if let Some(existing) = self.sessions.get(session.peer_id()) {
            if existing.state().is_live() {
                return Err(SessionExists {
                    peer: session.peer_id().clone(),
                    state: existing.state(),
                });
            }
        }
        self.sessions.insert(session.peer_id().clone(), session);
        Ok(())
    }

    pub fn remove(&mut self, peer_id: &PeerId) -> Option<PeerSession> {
        self.sessions.remove(peer_id)
    }

    pub fn get(&self, peer_id: &PeerId) -> Option<&PeerSession> {
        self.sessions.get(peer_id)
    }

    pub fn get_mut(&mut self, peer_id: &PeerId) -> Option<&mut PeerSession> {
        self.sessions.get_mut(peer_id)
    }

    pub fn state_of(&self, peer_id: &PeerId) -> Option<SessionState> {
        self.sessions.get(peer_id).map(PeerSession::state)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PeerId, &PeerSession)> {
        self.sessions.iter()
    }

    /// Peers whose transport reported connected
    pub fn connected_peers(&self) -> Vec<PeerId> {
        let mut peers: Vec<PeerId> = self
            .sessions
            .iter()
            .filter(|(_, session)| session.state() == SessionState::Connected)
            .map(|(peer_id, _)| peer_id.clone())
            .collect();
        peers.sort();
        peers
    }

    /// Count of sessions holding a media handle
    pub fn live_count(&self) -> usize {
        self.sessions
            .values()
            .filter(|session| session.state().is_live())
            .count()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Offering/Answering sessions started at least `timeout` ago
    pub fn stuck_handshakes(&self, timeout: Duration) -> Vec<PeerId> {
        self.sessions
            .iter()
            .filter(|(_, session)| {
                session.state().is_handshaking()
                    && session
                        .handshake_elapsed()
                        .is_some_and(|elapsed| elapsed >= timeout)
            })
            .map(|(peer_id, _)| peer_id.clone())
            .collect()
    }

    /// Idle placeholders created at least `timeout` ago
    pub fn expired_idle(&self, timeout: Duration) -> Vec<PeerId> {
        self.sessions
            .iter()
            .filter(|(_, session)| {
                session.state() == SessionState::Idle && session.age() >= timeout
            })
            .map(|(peer_id, _)| peer_id.clone())
            .collect()
    }

    /// Take every entry out of the table (shutdown)
    pub fn drain(&mut self) -> Vec<PeerSession> {
        self.sessions.drain().map(|(_, session)| session).collect()
    }
}
