use crate::application::config::CoordinatorConfig;
use crate::application::events::{CoordinatorInput, DiscardReason, RoomEvent, SignalOutcome};
use crate::application::runtime::InboundQueue;
use crate::domain::{
    IceCandidate, MediaHandle, PeerId, PeerSession, RoomId, SessionDescription, SessionExists,
    SessionState, SessionTable, SignalEnvelope, SignalPayload, Timestamp,
};
use crate::infrastructure::error::{Result, SignalingError};
use crate::infrastructure::media_transport::{LocalMedia, MediaEvent, MediaTransport, TransportState};
use crate::infrastructure::signal_transport::SignalTransport;
use std::collections::{HashMap, VecDeque};
use uuid::Uuid;

const MAX_REMEMBERED_ENVELOPES: usize = 4096;

/// Envelope ids already applied, kept until the envelope would be stale anyway
#[derive(Debug, Default)]
struct SeenEnvelopes {
    expiry: HashMap<Uuid, Timestamp>,
    order: VecDeque<Uuid>,
}

impl SeenEnvelopes {
    /// Returns false when the id was already seen
    fn insert(&mut self, id: Uuid, expires_at: Timestamp) -> bool {
        if self.expiry.contains_key(&id) {
            return false;
        }
        self.expiry.insert(id, expires_at);
        self.order.push_back(id);
        while self.order.len() > MAX_REMEMBERED_ENVELOPES {
            if let Some(oldest) = self.order.pop_front() {
                self.expiry.remove(&oldest);
                tracing::debug!(
                    "Forgetting envelope {} before expiry ({} remembered)",
                    oldest,
                    MAX_REMEMBERED_ENVELOPES
                );
            }
        }
        true
    }

    fn prune(&mut self, now: Timestamp) {
        let expiry = &mut self.expiry;
        expiry.retain(|_, expires_at| *expires_at > now);
        self.order.retain(|id| expiry.contains_key(id));
    }
}

/// Drives every peer handshake in one room for the local participant
///
/// Sole owner of the [`SessionTable`]. All mutations happen on `&mut self`,
/// so callers serialize access by construction: either call the operations
/// directly from one control flow, or `submit` inputs and `poll`.
pub struct SignalingCoordinator<S: SignalTransport, M: MediaTransport> {
    local_id: PeerId,
    config: CoordinatorConfig,
    signal: S,
    media: M,
    local_media: Option<LocalMedia>,
    microphone_enabled: bool,
    sessions: SessionTable,
    inbound: InboundQueue,
    events: Vec<RoomEvent>,
    seen: SeenEnvelopes,
    shut_down: bool,
}

impl<S: SignalTransport, M: MediaTransport> SignalingCoordinator<S, M> {
    /// `local_media` is `None` for listen-only participants
    pub fn new(
        local_id: PeerId,
        config: CoordinatorConfig,
        signal: S,
        media: M,
        local_media: Option<LocalMedia>,
    ) -> Self {
        tracing::info!(
            "🎯 Coordinator for {} in room {} ({})",
            local_id,
            config.room,
            if local_media.is_some() {
                "with microphone"
            } else {
                "listen-only"
            }
        );
        let inbound = InboundQueue::new(config.queue_size);
        Self {
            local_id,
            microphone_enabled: local_media.is_some(),
            local_media,
            config,
            signal,
            media,
            sessions: SessionTable::new(),
            inbound,
            events: Vec::new(),
            seen: SeenEnvelopes::default(),
            shut_down: false,
        }
    }

    /// Start a handshake with `peer` by sending it an offer
    ///
    /// Returns once the offer is handed to the signal transport; completion
    /// shows up later as `MembershipAdded`. A failed or closed session for the
    /// peer is replaced, a live one is refused with `SessionExists`.
    pub fn initiate(&mut self, peer: PeerId) -> Result<()> {
        if self.shut_down {
            return Err(SignalingError::ShutDown);
        }
        if peer == self.local_id {
            return Err(SignalingError::InvalidPeer(format!(
                "{} cannot call itself",
                peer
            )));
        }
        if let Some(state) = self.sessions.state_of(&peer) {
            if state.is_live() {
                return Err(SessionExists { peer, state }.into());
            }
        }

        let placeholder = self
            .sessions
            .remove(&peer)
            .unwrap_or_else(|| PeerSession::idle(peer.clone(), self.config.max_pending_candidates));

        let handle = match self.media.create_session(&peer, &self.config.ice_servers) {
            Ok(handle) => handle,
            Err(e) => {
                self.restore_placeholder(placeholder);
                return Err(e);
            }
        };

        let offer = match self.prepare_offer(handle) {
            Ok(offer) => offer,
            Err(e) => {
                tracing::error!("❌ Could not offer to {}: {}", peer, e);
                self.media.close_session(handle);
                self.restore_placeholder(placeholder);
                return Err(e);
            }
        };

        let session = match placeholder.start(handle, SessionState::Offering) {
            Ok(session) => session,
            Err(e) => {
                self.media.close_session(handle);
                return Err(e.into());
            }
        };
        self.sessions.insert(session)?;
        self.emit_state(&peer, SessionState::Offering);

        tracing::info!("📞 Calling {} ({})", peer, handle);
        self.send(&peer, offer.into());
        Ok(())
    }

    /// Apply one inbound envelope
    pub fn on_message(&mut self, envelope: SignalEnvelope) -> SignalOutcome {
        if self.shut_down {
            return SignalOutcome::Discarded(DiscardReason::ShutDown);
        }
        if envelope.receiver != self.local_id
            || envelope.room != self.config.room
            || envelope.sender == self.local_id
        {
            tracing::debug!(
                "Ignoring {} for {} in room {}",
                envelope.kind(),
                envelope.receiver,
                envelope.room
            );
            return SignalOutcome::Discarded(DiscardReason::Misaddressed);
        }
        if envelope.is_stale_at(Timestamp::now()) {
            tracing::debug!("⏰ Stale {} from {} dropped", envelope.kind(), envelope.sender);
            return SignalOutcome::Discarded(DiscardReason::Stale);
        }
        if !self.seen.insert(envelope.id, envelope.expires_at) {
            tracing::debug!("Duplicate {} from {} dropped", envelope.kind(), envelope.sender);
            return SignalOutcome::Discarded(DiscardReason::Duplicate);
        }

        tracing::debug!("📥 {} from {}", envelope.kind(), envelope.sender);
        let peer = envelope.sender;
        match envelope.payload {
            SignalPayload::Offer { sdp } => self.handle_offer(peer, SessionDescription::offer(sdp)),
            SignalPayload::Answer { sdp } => {
                self.handle_answer(&peer, SessionDescription::answer(sdp))
            }
            SignalPayload::Candidate { candidate } => self.handle_candidate(peer, candidate),
        }
    }

    /// Connection-state report for the peer's current media session
    pub fn on_transport_state_change(&mut self, peer: &PeerId, state: TransportState) {
        let Some(session) = self.sessions.get_mut(peer) else {
            tracing::debug!("Transport {} for unknown peer {}", state, peer);
            return;
        };

        match state {
            TransportState::Connecting => {
                tracing::debug!("Transport to {} connecting ({})", peer, session.state());
            }
            TransportState::Connected => {
                if session.state() != SessionState::Negotiating {
                    tracing::debug!("Ignoring connected for {} in {}", peer, session.state());
                    return;
                }
                if let Err(e) = session.transition(SessionState::Connected) {
                    tracing::warn!("❌ {}", e);
                    return;
                }
                tracing::info!("🟢 Connected to {}", peer);
                self.emit_state(peer, SessionState::Connected);
                self.events
                    .push(RoomEvent::MembershipAdded { peer: peer.clone() });
            }
            TransportState::Disconnected | TransportState::Failed | TransportState::Closed => {
                if !session.state().is_live() {
                    return;
                }
                tracing::warn!("🔴 Transport to {} {}", peer, state);
                self.teardown(peer, SessionState::Failed);
            }
        }
    }

    /// Local teardown without notifying the remote peer
    ///
    /// Returns false when there was nothing to close. Later envelopes from the
    /// peer are treated as coming from a stranger.
    pub fn close(&mut self, peer: &PeerId) -> bool {
        let closed = self.teardown(peer, SessionState::Closed);
        if closed {
            tracing::info!("👋 Closed session with {}", peer);
        }
        closed
    }

    /// Close every session, stop listening and release the microphone
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;

        let sessions = self.sessions.drain();
        let closed = sessions.len();
        for session in sessions {
            self.release(session, SessionState::Closed);
        }
        self.signal.unsubscribe();
        if let Some(local) = self.local_media.take() {
            self.media.release_local_media(local);
        }
        self.microphone_enabled = false;
        self.inbound.clear();
        tracing::info!(
            "🛑 {} left room {} ({} sessions closed)",
            self.local_id,
            self.config.room,
            closed
        );
    }

    /// Mute or unmute the shared local capture
    pub fn set_microphone_enabled(&mut self, enabled: bool) -> Result<()> {
        if self.shut_down {
            return Err(SignalingError::ShutDown);
        }
        let Some(local) = self.local_media.as_ref() else {
            return Err(SignalingError::LocalMediaUnavailable(
                "joined listen-only".to_string(),
            ));
        };
        self.media.set_local_media_enabled(local, enabled)?;
        self.microphone_enabled = enabled;
        tracing::info!("🎙️ Microphone {}", if enabled { "on" } else { "muted" });
        Ok(())
    }

    /// Queue an input for the next `poll`
    pub fn submit(&mut self, input: CoordinatorInput) -> Result<()> {
        if self.shut_down {
            return Err(SignalingError::ShutDown);
        }
        self.inbound.push(input)?;
        Ok(())
    }

    /// Pull pending transport input, process one batch, then sweep
    pub fn poll(&mut self) -> usize {
        if self.shut_down {
            return 0;
        }

        while self.inbound.has_room() {
            let Some(event) = self.media.poll_event() else {
                break;
            };
            if let Err(e) = self.inbound.push(CoordinatorInput::Media(event)) {
                tracing::warn!("❌ {}", e);
                break;
            }
        }
        while self.inbound.has_room() {
            let Some(envelope) = self.signal.try_recv() else {
                break;
            };
            if let Err(e) = self.inbound.push(CoordinatorInput::Signal(envelope)) {
                tracing::warn!("❌ {}", e);
                break;
            }
        }

        let mut processed = 0;
        while processed < self.config.batch_size {
            let Some(input) = self.inbound.pop() else {
                break;
            };
            self.process(input);
            processed += 1;
        }

        self.sweep_stale();
        processed
    }

    /// Fail stuck handshakes and forget expired placeholders
    pub fn sweep_stale(&mut self) -> usize {
        self.seen.prune(Timestamp::now());

        let stuck = self.sessions.stuck_handshakes(self.config.handshake_timeout);
        for peer in &stuck {
            tracing::warn!("⏰ Handshake with {} timed out", peer);
            self.teardown(peer, SessionState::Failed);
        }

        let idle = self.sessions.expired_idle(self.config.idle_timeout);
        for peer in &idle {
            tracing::debug!("⏰ Dropping idle entry for {}", peer);
            self.teardown(peer, SessionState::Closed);
        }

        stuck.len() + idle.len()
    }

    /// Take the events emitted since the last call
    pub fn drain_events(&mut self) -> Vec<RoomEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn local_id(&self) -> &PeerId {
        &self.local_id
    }

    pub fn room(&self) -> &RoomId {
        &self.config.room
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }

    pub fn has_local_media(&self) -> bool {
        self.local_media.is_some()
    }

    pub fn microphone_enabled(&self) -> bool {
        self.microphone_enabled
    }

    pub fn session_state(&self, peer: &PeerId) -> Option<SessionState> {
        self.sessions.state_of(peer)
    }

    pub fn media_handle(&self, peer: &PeerId) -> Option<MediaHandle> {
        self.sessions.get(peer).and_then(PeerSession::media)
    }

    pub fn pending_candidate_count(&self, peer: &PeerId) -> usize {
        self.sessions
            .get(peer)
            .map(|session| session.pending_candidates().len())
            .unwrap_or(0)
    }

    pub fn connected_peers(&self) -> Vec<PeerId> {
        self.sessions.connected_peers()
    }

    /// Surfaced sessions (Idle placeholders excluded), sorted by peer
    pub fn peer_states(&self) -> Vec<(PeerId, SessionState)> {
        let mut states: Vec<_> = self
            .sessions
            .iter()
            .filter(|(_, session)| session.state() != SessionState::Idle)
            .map(|(peer, session)| (peer.clone(), session.state()))
            .collect();
        states.sort_by(|a, b| a.0.cmp(&b.0));
        states
    }

    pub fn live_session_count(&self) -> usize {
        self.sessions.live_count()
    }

    pub fn queued_inputs(&self) -> usize {
        self.inbound.len()
    }

    pub fn signal(&self) -> &S {
        &self.signal
    }

    pub fn signal_mut(&mut self) -> &mut S {
        &mut self.signal
    }

    pub fn media(&self) -> &M {
        &self.media
    }

    pub fn media_mut(&mut self) -> &mut M {
        &mut self.media
    }

    fn process(&mut self, input: CoordinatorInput) {
        match input {
            CoordinatorInput::Signal(envelope) => {
                let sender = envelope.sender.clone();
                let kind = envelope.kind();
                let outcome = self.on_message(envelope);
                tracing::trace!("{} from {}: {:?}", kind, sender, outcome);
            }
            CoordinatorInput::Media(event) => self.on_media_event(event),
        }
    }

    fn on_media_event(&mut self, event: MediaEvent) {
        let owned = self
            .sessions
            .get(event.peer())
            .is_some_and(|session| session.owns(event.handle()));
        if !owned {
            tracing::trace!("Ignoring event from released {}", event.handle());
            return;
        }

        match event {
            MediaEvent::CandidateGathered { peer, candidate, .. } => {
                self.send(&peer, SignalPayload::Candidate { candidate });
            }
            MediaEvent::StateChanged { peer, state, .. } => {
                self.on_transport_state_change(&peer, state);
            }
        }
    }

    fn handle_offer(&mut self, peer: PeerId, offer: SessionDescription) -> SignalOutcome {
        let placeholder = match self.sessions.state_of(&peer) {
            Some(SessionState::Offering) => {
                if self.local_id < peer {
                    tracing::info!("⚔️ Glare with {}: keeping our offer", peer);
                    if let Some(session) = self.sessions.get_mut(&peer) {
                        let dropped = session.reject_glare_candidates();
                        if dropped > 0 {
                            tracing::debug!(
                                "🧊 Dropped {} candidates for the offer {} abandoned",
                                dropped,
                                peer
                            );
                        }
                    }
                    return SignalOutcome::Discarded(DiscardReason::GlareIgnored);
                }
                tracing::info!("⚔️ Glare with {}: yielding to their offer", peer);
                let mut abandoned = match self.sessions.remove(&peer) {
                    Some(session) => session,
                    None => return SignalOutcome::Discarded(DiscardReason::Unexpected),
                };
                if let Some(handle) = abandoned.terminate(SessionState::Closed) {
                    self.media.close_session(handle);
                }
                let mut placeholder =
                    PeerSession::idle(peer.clone(), self.config.max_pending_candidates);
                for candidate in abandoned.take_pending_candidates() {
                    placeholder.buffer_candidate(candidate);
                }
                placeholder
            }
            Some(state) if state.is_live() => {
                tracing::debug!("Offer from {} while {}", peer, state);
                return SignalOutcome::Discarded(DiscardReason::SessionActive);
            }
            Some(_) => match self.sessions.remove(&peer) {
                Some(placeholder) => placeholder,
                None => return SignalOutcome::Discarded(DiscardReason::Unexpected),
            },
            None => PeerSession::idle(peer.clone(), self.config.max_pending_candidates),
        };

        self.answer_offer(placeholder, offer)
    }

    fn answer_offer(&mut self, placeholder: PeerSession, offer: SessionDescription) -> SignalOutcome {
        let peer = placeholder.peer_id().clone();
        let handle = match self.media.create_session(&peer, &self.config.ice_servers) {
            Ok(handle) => handle,
            Err(e) => {
                tracing::warn!("❌ No media session for {}: {}", peer, e);
                self.restore_placeholder(placeholder);
                return SignalOutcome::Discarded(DiscardReason::HandshakeFailed);
            }
        };

        let session = match placeholder.start(handle, SessionState::Answering) {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!("❌ {}", e);
                self.media.close_session(handle);
                return SignalOutcome::Discarded(DiscardReason::HandshakeFailed);
            }
        };
        if let Err(e) = self.sessions.insert(session) {
            tracing::warn!("❌ {}", e);
            self.media.close_session(handle);
            return SignalOutcome::Discarded(DiscardReason::SessionActive);
        }
        self.emit_state(&peer, SessionState::Answering);

        if let Some(local) = self.local_media.as_ref() {
            if let Err(e) = self.media.attach_local_media(handle, local) {
                tracing::error!("❌ Could not attach microphone for {}: {}", peer, e);
                self.teardown(&peer, SessionState::Failed);
                return SignalOutcome::Discarded(DiscardReason::HandshakeFailed);
            }
        }

        if let Err(e) = self.media.set_remote_description(handle, &offer) {
            tracing::warn!("❌ Rejected offer from {}: {}", peer, e);
            self.teardown(&peer, SessionState::Failed);
            return SignalOutcome::Discarded(DiscardReason::HandshakeFailed);
        }
        if let Some(session) = self.sessions.get_mut(&peer) {
            session.mark_remote_description_applied();
        }

        let answer = match self.media.create_answer(handle) {
            Ok(answer) => answer,
            Err(e) => {
                tracing::warn!("❌ Could not answer {}: {}", peer, e);
                self.teardown(&peer, SessionState::Failed);
                return SignalOutcome::Discarded(DiscardReason::HandshakeFailed);
            }
        };
        self.send(&peer, answer.into());

        self.flush_pending(&peer, handle);
        self.advance_to_negotiating(&peer);
        SignalOutcome::Applied
    }

    fn handle_answer(&mut self, peer: &PeerId, answer: SessionDescription) -> SignalOutcome {
        let handle = match self.sessions.get(peer) {
            Some(session) if session.state() == SessionState::Offering => session.media(),
            Some(session) => {
                tracing::debug!("Answer from {} while {}", peer, session.state());
                return SignalOutcome::Discarded(DiscardReason::Unexpected);
            }
            None => {
                tracing::debug!("Answer from {} without an offer", peer);
                return SignalOutcome::Discarded(DiscardReason::Unexpected);
            }
        };
        let Some(handle) = handle else {
            return SignalOutcome::Discarded(DiscardReason::Unexpected);
        };

        if let Err(e) = self.media.set_remote_description(handle, &answer) {
            tracing::warn!("❌ Rejected answer from {}: {}", peer, e);
            self.teardown(peer, SessionState::Failed);
            return SignalOutcome::Discarded(DiscardReason::HandshakeFailed);
        }
        if let Some(session) = self.sessions.get_mut(peer) {
            session.mark_remote_description_applied();
        }

        self.flush_pending(peer, handle);
        self.advance_to_negotiating(peer);
        SignalOutcome::Applied
    }

    fn handle_candidate(&mut self, peer: PeerId, candidate: IceCandidate) -> SignalOutcome {
        let Some(session) = self.sessions.get_mut(&peer) else {
            let mut placeholder =
                PeerSession::idle(peer.clone(), self.config.max_pending_candidates);
            placeholder.buffer_candidate(candidate);
            tracing::debug!("🧊 Early candidate from {} buffered", peer);
            self.restore_placeholder(placeholder);
            return SignalOutcome::Buffered;
        };

        if session.is_rejecting_stale_candidates() {
            tracing::debug!("🧊 Candidate from {} belongs to its abandoned offer", peer);
            return SignalOutcome::Discarded(DiscardReason::GlareIgnored);
        }

        let handle = match session.media() {
            Some(handle) if session.remote_description_applied() => handle,
            _ => {
                if let Some(dropped) = session.buffer_candidate(candidate) {
                    tracing::warn!(
                        "🧊 Candidate buffer for {} full, dropped {}",
                        peer,
                        dropped.candidate
                    );
                }
                return SignalOutcome::Buffered;
            }
        };

        match self.media.add_candidate(handle, &candidate) {
            Ok(()) => SignalOutcome::Applied,
            Err(e) => {
                tracing::warn!("❌ Candidate from {} rejected: {}", peer, e);
                SignalOutcome::Discarded(DiscardReason::HandshakeFailed)
            }
        }
    }

    /// Apply everything buffered for the peer; only called right after the
    /// remote description was set
    fn flush_pending(&mut self, peer: &PeerId, handle: MediaHandle) {
        let pending = match self.sessions.get_mut(peer) {
            Some(session) => session.take_pending_candidates(),
            None => return,
        };
        if pending.is_empty() {
            return;
        }
        tracing::debug!("🧊 Applying {} buffered candidates for {}", pending.len(), peer);
        for candidate in &pending {
            if let Err(e) = self.media.add_candidate(handle, candidate) {
                tracing::warn!("❌ Buffered candidate for {} rejected: {}", peer, e);
            }
        }
    }

    fn advance_to_negotiating(&mut self, peer: &PeerId) {
        let Some(session) = self.sessions.get_mut(peer) else {
            return;
        };
        match session.transition(SessionState::Negotiating) {
            Ok(()) => self.emit_state(peer, SessionState::Negotiating),
            Err(e) => tracing::warn!("❌ {}", e),
        }
    }

    /// Remove the entry and release its media handle in one step
    fn teardown(&mut self, peer: &PeerId, terminal: SessionState) -> bool {
        match self.sessions.remove(peer) {
            Some(session) => {
                self.release(session, terminal);
                true
            }
            None => false,
        }
    }

    /// Terminate a session already taken out of the table
    fn release(&mut self, mut session: PeerSession, terminal: SessionState) {
        let surfaced = session.state() != SessionState::Idle;
        if let Some(handle) = session.terminate(terminal) {
            self.media.close_session(handle);
        }
        if surfaced {
            let peer = session.peer_id().clone();
            self.emit_state(&peer, session.state());
            self.events.push(RoomEvent::MembershipRemoved { peer });
        }
    }

    fn restore_placeholder(&mut self, placeholder: PeerSession) {
        if placeholder.pending_candidates().is_empty() {
            return;
        }
        if let Err(e) = self.sessions.insert(placeholder) {
            tracing::warn!("❌ {}", e);
        }
    }

    fn prepare_offer(&mut self, handle: MediaHandle) -> Result<SessionDescription> {
        if let Some(local) = self.local_media.as_ref() {
            self.media.attach_local_media(handle, local)?;
        }
        self.media.create_offer(handle)
    }

    fn send(&mut self, to: &PeerId, payload: SignalPayload) {
        let envelope = SignalEnvelope::new(
            self.local_id.clone(),
            to.clone(),
            self.config.room.clone(),
            payload,
            self.config.signal_ttl,
        );
        let kind = envelope.kind();
        match self.signal.send(envelope) {
            Ok(()) => tracing::debug!("📤 {} to {}", kind, to),
            Err(e) => tracing::warn!("❌ Failed to send {} to {}: {}", kind, to, e),
        }
    }

    fn emit_state(&mut self, peer: &PeerId, state: SessionState) {
        self.events.push(RoomEvent::SessionStateChanged {
            peer: peer.clone(),
            state,
        });
    }
}

impl<S: SignalTransport, M: MediaTransport> Drop for SignalingCoordinator<S, M> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
