use crate::domain::{IceCandidate, PeerId};
use instant::{Duration, Instant};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

/// Opaque handle to a media-transport session, owned by exactly one PeerSession
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MediaHandle(pub u64);

impl fmt::Display for MediaHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "media#{}", self.0)
    }
}

/// Handshake state of a peer session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Known peer, nothing negotiated (may hold buffered candidates)
    Idle,
    /// Our offer is out, waiting for the answer
    Offering,
    /// Remote offer applied, answer being produced
    Answering,
    /// Both descriptions applied, waiting for the transport to connect
    Negotiating,
    Connected,
    Failed,
    Closed,
}

impl SessionState {
    /// Live sessions own a media handle and count as a membership slot
    pub fn is_live(&self) -> bool {
        matches!(
            self,
            SessionState::Offering
                | SessionState::Answering
                | SessionState::Negotiating
                | SessionState::Connected
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Failed | SessionState::Closed)
    }

    /// Still waiting on the other side to complete the description exchange
    pub fn is_handshaking(&self) -> bool {
        matches!(self, SessionState::Offering | SessionState::Answering)
    }

    fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        match (self, next) {
            (Idle, Offering) | (Idle, Answering) => true,
            (Offering, Negotiating) | (Answering, Negotiating) => true,
            (Negotiating, Connected) => true,
            (Offering | Answering | Negotiating | Connected, Failed) => true,
            (Failed | Closed, _) => false,
            (_, Closed) => true,
            _ => false,
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SessionState::Idle => "idle",
            SessionState::Offering => "offering",
            SessionState::Answering => "answering",
            SessionState::Negotiating => "negotiating",
            SessionState::Connected => "connected",
            SessionState::Failed => "failed",
            SessionState::Closed => "closed",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid session transition for {peer}: {from} -> {to}")]
pub struct InvalidTransition {
    pub peer: PeerId,
    pub from: SessionState,
    pub to: SessionState,
}

/// Candidates received before a remote description exists
///
/// Bounded: once full, the oldest candidate is evicted so a misbehaving
/// peer cannot grow it without limit.
#[derive(Debug, Clone)]
pub struct CandidateBuffer {
    candidates: VecDeque<IceCandidate>,
    capacity: usize,
}

impl CandidateBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            candidates: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    /// Returns the evicted candidate when the buffer was full
    pub fn push(&mut self, candidate: IceCandidate) -> Option<IceCandidate> {
        let evicted = if self.candidates.len() >= self.capacity {
            self.candidates.pop_front()
        } else {
            None
        };
        self.candidates.push_back(candidate);
        evicted
    }

    /// Take every buffered candidate in arrival order
    pub fn drain(&mut self) -> Vec<IceCandidate> {
        self.candidates.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

/// Per-peer handshake record, owned by the SessionTable
#[derive(Debug, Clone)]
pub struct PeerSession {
    peer_id: PeerId,
    state: SessionState,
    media: Option<MediaHandle>,
    remote_description_applied: bool,
    pending_candidates: CandidateBuffer,
    /// Set when a glare offer from the peer was ignored; candidates for that
    /// abandoned offer are dropped until the peer's answer arrives
    rejecting_stale_candidates: bool,
    created_at: Instant,
    /// When Offering/Answering was entered; inbound candidates never move it
    handshake_started_at: Option<Instant>,
}

impl PeerSession {
    /// Placeholder entry that only buffers candidates
    pub fn idle(peer_id: PeerId, max_pending_candidates: usize) -> Self {
        Self {
            peer_id,
            state: SessionState::Idle,
            media: None,
            remote_description_applied: false,
            pending_candidates: CandidateBuffer::new(max_pending_candidates),
            rejecting_stale_candidates: false,
            created_at: Instant::now(),
            handshake_started_at: None,
        }
    }

    /// Attach a freshly created media session and enter `state`
    pub fn start(
        mut self,
        media: MediaHandle,
        state: SessionState,
    ) -> Result<Self, InvalidTransition> {
        self.transition(state)?;
        self.media = Some(media);
        self.handshake_started_at = Some(Instant::now());
        Ok(self)
    }

    pub fn peer_id(&self) -> &PeerId {
        &self.peer_id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn media(&self) -> Option<MediaHandle> {
        self.media
    }

    pub fn owns(&self, handle: MediaHandle) -> bool {
        self.media == Some(handle)
    }

    pub fn remote_description_applied(&self) -> bool {
        self.remote_description_applied
    }

    pub fn mark_remote_description_applied(&mut self) {
        self.remote_description_applied = true;
        self.rejecting_stale_candidates = false;
    }

    /// Our offer won a glare: whatever the peer sent for its own offer is
    /// useless, both what is buffered and what is still in flight
    pub fn reject_glare_candidates(&mut self) -> usize {
        self.rejecting_stale_candidates = true;
        self.pending_candidates.drain().len()
    }

    pub fn is_rejecting_stale_candidates(&self) -> bool {
        self.rejecting_stale_candidates
    }

    pub fn pending_candidates(&self) -> &CandidateBuffer {
        &self.pending_candidates
    }

    pub fn buffer_candidate(&mut self, candidate: IceCandidate) -> Option<IceCandidate> {
        self.pending_candidates.push(candidate)
    }

    pub fn take_pending_candidates(&mut self) -> Vec<IceCandidate> {
        self.pending_candidates.drain()
    }

    /// Time since the entry was created (placeholders expire on this)
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// Time since the handshake started, `None` before `start`
    pub fn handshake_elapsed(&self) -> Option<Duration> {
        self.handshake_started_at.map(|started| started.elapsed())
    }

    pub fn transition(&mut self, next: SessionState) -> Result<(), InvalidTransition> {
        if !self.state.can_transition_to(next) {
            return Err(InvalidTransition {
                peer: self.peer_id.clone(),
                from: self.state,
                to: next,
            });
        }
        self.state = next;
        Ok(())
    }

    /// Enter a terminal state and hand back the media handle for release
    pub fn terminate(&mut self, terminal: SessionState) -> Option<MediaHandle> {
        debug_assert!(terminal.is_terminal());
        if self.transition(terminal).is_err() {
            // Idle -> Failed is not an edge; idle entries only ever close
            self.state = SessionState::Closed;
        }
        self.remote_description_applied = false;
        self.rejecting_stale_candidates = false;
        self.media.take()
    }
}
