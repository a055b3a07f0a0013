use crate::domain::{IceCandidate, IceServer, MediaHandle, PeerId, SdpKind, SessionDescription};
use crate::infrastructure::error::{Result, SignalingError};
use crate::infrastructure::media_transport::{
    AudioConstraints, LocalMedia, MediaEvent, MediaTransport, TransportState,
};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

/// Everything the coordinator asked the media engine to do, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaCall {
    OpenLocalMedia,
    SetLocalMediaEnabled(bool),
    ReleaseLocalMedia,
    CreateSession { peer: PeerId, handle: MediaHandle },
    AttachLocalMedia(MediaHandle),
    CreateOffer(MediaHandle),
    CreateAnswer(MediaHandle),
    SetRemoteDescription { handle: MediaHandle, kind: SdpKind },
    AddCandidate { handle: MediaHandle, candidate: String },
    CloseSession(MediaHandle),
}

#[derive(Debug)]
struct SimSession {
    peer: PeerId,
    local: Option<SdpKind>,
    remote: Option<SdpKind>,
    remote_candidates: usize,
    connected: bool,
}

struct Inner {
    next_handle: u64,
    sessions: HashMap<MediaHandle, SimSession>,
    events: VecDeque<MediaEvent>,
    calls: Vec<MediaCall>,
    local_media: Option<(LocalMedia, bool)>,
    auto_connect: bool,
    candidates_per_session: usize,
    fail_local_media: bool,
    fail_attach: bool,
    fail_answers: bool,
}

/// In-memory media engine for tests, demos and the BDD suite
///
/// Produces fake SDP, gathers synthetic candidates once a local description
/// exists and enforces the ordering rules a real engine would: a remote
/// description before candidates, a remote offer before an answer. With
/// auto-connect enabled it reports `Connected` once both descriptions and a
/// remote candidate are in place.
#[derive(Clone)]
pub struct SimulatedMedia {
    inner: Arc<Mutex<Inner>>,
}

impl SimulatedMedia {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                next_handle: 1,
                sessions: HashMap::new(),
                events: VecDeque::new(),
                calls: Vec::new(),
                local_media: None,
                auto_connect: false,
                candidates_per_session: 1,
                fail_local_media: false,
                fail_attach: false,
                fail_answers: false,
            })),
        }
    }

    pub fn with_auto_connect(self) -> Self {
        self.inner.lock().auto_connect = true;
        self
    }

    pub fn with_candidates_per_session(self, count: usize) -> Self {
        self.inner.lock().candidates_per_session = count;
        self
    }

    /// Microphone capture is refused (permission denied, no device)
    pub fn failing_local_media(self) -> Self {
        self.inner.lock().fail_local_media = true;
        self
    }

    pub fn failing_attach(self) -> Self {
        self.inner.lock().fail_attach = true;
        self
    }

    pub fn failing_answers(self) -> Self {
        self.inner.lock().fail_answers = true;
        self
    }

    pub fn calls(&self) -> Vec<MediaCall> {
        self.inner.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.inner.lock().calls.clear();
    }

    /// Candidates applied to `handle`, in order
    pub fn applied_candidates(&self, handle: MediaHandle) -> Vec<String> {
        self.inner
            .lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                MediaCall::AddCandidate { handle: h, candidate } if *h == handle => {
                    Some(candidate.clone())
                }
                _ => None,
            })
            .collect()
    }

    /// Open media session for `peer`, if any
    pub fn handle_for(&self, peer: &PeerId) -> Option<MediaHandle> {
        self.inner
            .lock()
            .sessions
            .iter()
            .filter(|(_, session)| &session.peer == peer)
            .map(|(handle, _)| *handle)
            .max()
    }

    pub fn open_sessions(&self) -> usize {
        self.inner.lock().sessions.len()
    }

    pub fn is_open(&self, handle: MediaHandle) -> bool {
        self.inner.lock().sessions.contains_key(&handle)
    }

    /// `Some(enabled)` while local capture is held
    pub fn local_media_enabled(&self) -> Option<bool> {
        self.inner.lock().local_media.as_ref().map(|(_, enabled)| *enabled)
    }

    /// Inject a connection-state change as the engine would report it
    pub fn report_state(&self, handle: MediaHandle, state: TransportState) {
        let mut inner = self.inner.lock();
        let peer = match inner.sessions.get(&handle) {
            Some(session) => session.peer.clone(),
            None => {
                tracing::debug!("Ignoring state report for closed {}", handle);
                return;
            }
        };
        inner
            .events
            .push_back(MediaEvent::StateChanged { peer, handle, state });
    }

    /// Same as [`SimulatedMedia::report_state`] for the peer's open session
    pub fn report_peer_state(&self, peer: &PeerId, state: TransportState) {
        if let Some(handle) = self.handle_for(peer) {
            self.report_state(handle, state);
        }
    }

    /// Push a raw event (stale handles, foreign peers)
    pub fn inject_event(&self, event: MediaEvent) {
        self.inner.lock().events.push_back(event);
    }
}

impl Default for SimulatedMedia {
    fn default() -> Self {
        Self::new()
    }
}

impl Inner {
    fn session_mut(&mut self, handle: MediaHandle) -> Result<&mut SimSession> {
        self.sessions
            .get_mut(&handle)
            .ok_or_else(|| SignalingError::Media(format!("unknown media session {}", handle)))
    }

    fn gather_candidates(&mut self, handle: MediaHandle) {
        let Some(session) = self.sessions.get(&handle) else {
            return;
        };
        let peer = session.peer.clone();
        for n in 0..self.candidates_per_session {
            let candidate = IceCandidate::new(format!(
                "candidate:{} 1 udp 2122260223 192.0.2.{} {} typ host",
                n + 1,
                handle.0 % 250 + 1,
                50_000 + n
            ));
            self.events.push_back(MediaEvent::CandidateGathered {
                peer: peer.clone(),
                handle,
                candidate,
            });
        }
    }

    fn maybe_connect(&mut self, handle: MediaHandle) {
        if !self.auto_connect {
            return;
        }
        let Some(session) = self.sessions.get_mut(&handle) else {
            return;
        };
        let ready = session.local.is_some()
            && session.remote.is_some()
            && session.remote_candidates > 0
            && !session.connected;
        if !ready {
            return;
        }
        session.connected = true;
        let peer = session.peer.clone();
        self.events.push_back(MediaEvent::StateChanged {
            peer: peer.clone(),
            handle,
            state: TransportState::Connecting,
        });
        self.events.push_back(MediaEvent::StateChanged {
            peer,
            handle,
            state: TransportState::Connected,
        });
    }
}

fn fake_sdp(handle: MediaHandle, kind: SdpKind) -> String {
    let role = match kind {
        SdpKind::Offer => "actpass",
        SdpKind::Answer => "active",
    };
    format!(
        "v=0\r\no=- {} 2 IN IP4 127.0.0.1\r\ns=-\r\nt=0 0\r\nm=audio 9 UDP/TLS/RTP/SAVPF 111\r\na=setup:{}\r\na=rtpmap:111 opus/48000/2\r\na=sendrecv\r\n",
        handle.0, role
    )
}

impl MediaTransport for SimulatedMedia {
    fn open_local_media(&mut self, constraints: &AudioConstraints) -> Result<LocalMedia> {
        let mut inner = self.inner.lock();
        inner.calls.push(MediaCall::OpenLocalMedia);
        if inner.fail_local_media {
            return Err(SignalingError::LocalMediaUnavailable(
                "microphone permission denied".to_string(),
            ));
        }
        let media = LocalMedia::new(*constraints);
        inner.local_media = Some((media.clone(), true));
        Ok(media)
    }

    fn set_local_media_enabled(&mut self, media: &LocalMedia, enabled: bool) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.calls.push(MediaCall::SetLocalMediaEnabled(enabled));
        match inner.local_media.as_mut() {
            Some((held, flag)) if held.id == media.id => {
                *flag = enabled;
                Ok(())
            }
            _ => Err(SignalingError::LocalMediaUnavailable(
                "local media not open".to_string(),
            )),
        }
    }

    fn release_local_media(&mut self, media: LocalMedia) {
        let mut inner = self.inner.lock();
        inner.calls.push(MediaCall::ReleaseLocalMedia);
        if inner
            .local_media
            .as_ref()
            .is_some_and(|(held, _)| held.id == media.id)
        {
            inner.local_media = None;
        }
    }

    fn create_session(&mut self, peer: &PeerId, ice_servers: &[IceServer]) -> Result<MediaHandle> {
        let mut inner = self.inner.lock();
        let handle = MediaHandle(inner.next_handle);
        inner.next_handle += 1;
        inner.calls.push(MediaCall::CreateSession {
            peer: peer.clone(),
            handle,
        });
        tracing::trace!(
            "Simulated session {} for {} ({} ICE servers)",
            handle,
            peer,
            ice_servers.len()
        );
        inner.sessions.insert(
            handle,
            SimSession {
                peer: peer.clone(),
                local: None,
                remote: None,
                remote_candidates: 0,
                connected: false,
            },
        );
        Ok(handle)
    }

    fn attach_local_media(&mut self, handle: MediaHandle, media: &LocalMedia) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.calls.push(MediaCall::AttachLocalMedia(handle));
        inner.session_mut(handle)?;
        if inner.fail_attach {
            return Err(SignalingError::LocalMediaUnavailable(format!(
                "track {} could not be attached",
                media.id
            )));
        }
        Ok(())
    }

    fn create_offer(&mut self, handle: MediaHandle) -> Result<SessionDescription> {
        let mut inner = self.inner.lock();
        inner.calls.push(MediaCall::CreateOffer(handle));
        inner.session_mut(handle)?.local = Some(SdpKind::Offer);
        inner.gather_candidates(handle);
        Ok(SessionDescription::offer(fake_sdp(handle, SdpKind::Offer)))
    }

    fn create_answer(&mut self, handle: MediaHandle) -> Result<SessionDescription> {
        let mut inner = self.inner.lock();
        inner.calls.push(MediaCall::CreateAnswer(handle));
        let fail = inner.fail_answers;
        let session = inner.session_mut(handle)?;
        if session.remote != Some(SdpKind::Offer) {
            return Err(SignalingError::Media(format!(
                "{} has no remote offer to answer",
                handle
            )));
        }
        if fail {
            return Err(SignalingError::Media("answer generation failed".to_string()));
        }
        session.local = Some(SdpKind::Answer);
        inner.gather_candidates(handle);
        inner.maybe_connect(handle);
        Ok(SessionDescription::answer(fake_sdp(handle, SdpKind::Answer)))
    }

    fn set_remote_description(
        &mut self,
        handle: MediaHandle,
        description: &SessionDescription,
    ) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.calls.push(MediaCall::SetRemoteDescription {
            handle,
            kind: description.kind,
        });
        let session = inner.session_mut(handle)?;
        match (description.kind, session.local) {
            (SdpKind::Offer, Some(_)) => {
                return Err(SignalingError::Media(format!(
                    "{} already has a local description",
                    handle
                )))
            }
            (SdpKind::Answer, local) if local != Some(SdpKind::Offer) => {
                return Err(SignalingError::Media(format!(
                    "{} received an answer without a local offer",
                    handle
                )))
            }
            _ => {}
        }
        if session.remote.is_some() {
            return Err(SignalingError::Media(format!(
                "{} already has a remote description",
                handle
            )));
        }
        session.remote = Some(description.kind);
        inner.maybe_connect(handle);
        Ok(())
    }

    fn add_candidate(&mut self, handle: MediaHandle, candidate: &IceCandidate) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.calls.push(MediaCall::AddCandidate {
            handle,
            candidate: candidate.candidate.clone(),
        });
        let session = inner.session_mut(handle)?;
        if session.remote.is_none() {
            return Err(SignalingError::Media(format!(
                "{} got a candidate before its remote description",
                handle
            )));
        }
        session.remote_candidates += 1;
        inner.maybe_connect(handle);
        Ok(())
    }

    fn close_session(&mut self, handle: MediaHandle) {
        let mut inner = self.inner.lock();
        inner.calls.push(MediaCall::CloseSession(handle));
        if inner.sessions.remove(&handle).is_none() {
            tracing::debug!("Close for unknown {}", handle);
        }
        // Events already queued for a closed session are left in place on purpose
    }

    fn poll_event(&mut self) -> Option<MediaEvent> {
        self.inner.lock().events.pop_front()
    }
}
