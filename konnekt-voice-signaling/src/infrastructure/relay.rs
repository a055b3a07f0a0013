use crate::domain::{PeerId, RoomId, SignalEnvelope};
use crate::infrastructure::error::Result;
use crate::infrastructure::signal_transport::SignalTransport;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TryRecvError};

type Mailbox = (RoomId, PeerId);

/// In-process signaling relay scoped by room
///
/// Behaves like a shared signal collection: envelopes for a participant
/// that is not subscribed yet are retained and handed over when it
/// subscribes. Each receiver gets its own serialized inbox, so concurrent
/// senders never interleave inside one coordinator.
#[derive(Clone)]
pub struct SignalRelay {
    inner: Arc<Mutex<RelayInner>>,
}

struct Subscription {
    id: u64,
    tx: mpsc::UnboundedSender<String>,
}

struct RelayInner {
    subscribers: HashMap<Mailbox, Subscription>,
    retained: HashMap<Mailbox, VecDeque<String>>,
    retain_limit: usize,
    next_subscription: u64,
    routed: u64,
}

impl SignalRelay {
    pub fn new() -> Self {
        Self::with_retain_limit(100)
    }

    /// Keep at most `limit` undelivered envelopes per receiver (oldest evicted)
    pub fn with_retain_limit(limit: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(RelayInner {
                subscribers: HashMap::new(),
                retained: HashMap::new(),
                retain_limit: limit.max(1),
                next_subscription: 1,
                routed: 0,
            })),
        }
    }

    /// Subscribe `peer` to envelopes addressed to it in `room`
    pub fn connect(&self, room: RoomId, peer: PeerId) -> RelaySignalTransport {
        let (tx, rx) = mpsc::unbounded_channel();
        let key = (room.clone(), peer.clone());

        let mut inner = self.inner.lock();
        let id = inner.next_subscription;
        inner.next_subscription += 1;

        let backlog = inner.retained.remove(&key).unwrap_or_default();
        if !backlog.is_empty() {
            tracing::debug!(
                "📬 Handing {} retained envelopes to {} in room {}",
                backlog.len(),
                peer,
                room
            );
        }
        for text in backlog {
            // rx is alive in this scope
            let _ = tx.send(text);
        }

        if inner.subscribers.insert(key, Subscription { id, tx }).is_some() {
            tracing::warn!("🔁 {} re-subscribed to room {}, old inbox detached", peer, room);
        }
        drop(inner);

        RelaySignalTransport {
            relay: self.clone(),
            room,
            local: peer,
            subscription: id,
            inbox: Some(rx),
        }
    }

    /// Route an envelope to its receiver's inbox (or retain it)
    pub fn post(&self, envelope: &SignalEnvelope) -> Result<()> {
        let text = serde_json::to_string(envelope)?;
        self.post_raw(&envelope.room, &envelope.receiver, text);
        Ok(())
    }

    /// Route already-encoded text; malformed text is dropped by the receiver
    pub fn post_raw(&self, room: &RoomId, receiver: &PeerId, text: String) {
        let key = (room.clone(), receiver.clone());
        let mut inner = self.inner.lock();
        inner.routed += 1;

        let undelivered = match inner.subscribers.get(&key) {
            Some(subscription) => match subscription.tx.send(text) {
                Ok(()) => return,
                Err(mpsc::error::SendError(text)) => text,
            },
            None => text,
        };

        inner.subscribers.remove(&key);
        let limit = inner.retain_limit;
        let mailbox = inner.retained.entry(key).or_default();
        if mailbox.len() >= limit {
            mailbox.pop_front();
            tracing::warn!("📪 Mailbox for {} full, oldest envelope evicted", receiver);
        }
        mailbox.push_back(undelivered);
    }

    /// Envelopes waiting for a receiver that is not subscribed
    pub fn retained_for(&self, room: &RoomId, peer: &PeerId) -> usize {
        self.inner
            .lock()
            .retained
            .get(&(room.clone(), peer.clone()))
            .map(VecDeque::len)
            .unwrap_or(0)
    }

    pub fn is_subscribed(&self, room: &RoomId, peer: &PeerId) -> bool {
        self.inner
            .lock()
            .subscribers
            .contains_key(&(room.clone(), peer.clone()))
    }

    /// Total envelopes routed since creation
    pub fn routed(&self) -> u64 {
        self.inner.lock().routed
    }

    fn detach(&self, room: &RoomId, peer: &PeerId, subscription: u64) {
        let key = (room.clone(), peer.clone());
        let mut inner = self.inner.lock();
        if inner
            .subscribers
            .get(&key)
            .is_some_and(|current| current.id == subscription)
        {
            inner.subscribers.remove(&key);
        }
    }
}

impl Default for SignalRelay {
    fn default() -> Self {
        Self::new()
    }
}

/// One participant's view of a [`SignalRelay`]
pub struct RelaySignalTransport {
    relay: SignalRelay,
    room: RoomId,
    local: PeerId,
    subscription: u64,
    inbox: Option<mpsc::UnboundedReceiver<String>>,
}

impl RelaySignalTransport {
    pub fn local_peer_id(&self) -> &PeerId {
        &self.local
    }

    pub fn room(&self) -> &RoomId {
        &self.room
    }

    pub fn is_subscribed(&self) -> bool {
        self.inbox.is_some()
    }
}

impl SignalTransport for RelaySignalTransport {
    fn send(&mut self, envelope: SignalEnvelope) -> Result<()> {
        self.relay.post(&envelope)
    }

    fn try_recv(&mut self) -> Option<SignalEnvelope> {
        let inbox = self.inbox.as_mut()?;
        loop {
            match inbox.try_recv() {
                Ok(text) => match serde_json::from_str::<SignalEnvelope>(&text) {
                    Ok(envelope) => return Some(envelope),
                    Err(e) => {
                        tracing::warn!("❌ Dropping malformed envelope for {}: {}", self.local, e);
                    }
                },
                Err(TryRecvError::Empty) => return None,
                Err(TryRecvError::Disconnected) => {
                    tracing::debug!("Inbox for {} detached", self.local);
                    self.inbox = None;
                    return None;
                }
            }
        }
    }

    fn unsubscribe(&mut self) {
        if self.inbox.take().is_some() {
            self.relay.detach(&self.room, &self.local, self.subscription);
            tracing::debug!("🔕 {} unsubscribed from room {}", self.local, self.room);
        }
    }
}

impl Drop for RelaySignalTransport {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}
