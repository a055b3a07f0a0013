use konnekt_voice_signaling::{Result, SignalEnvelope, SignalTransport};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Signal transport whose traffic is delivered by hand
///
/// Outbound envelopes land in a shared outbox the test inspects, reorders,
/// duplicates or drops before feeding them to the other side.
#[derive(Clone, Default)]
pub struct ManualSignal {
    outbox: Arc<Mutex<Vec<SignalEnvelope>>>,
    inbox: Arc<Mutex<VecDeque<SignalEnvelope>>>,
    unsubscribed: Arc<Mutex<bool>>,
}

impl ManualSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take everything sent since the last call
    pub fn take_sent(&self) -> Vec<SignalEnvelope> {
        std::mem::take(&mut *self.outbox.lock().unwrap())
    }

    pub fn sent_count(&self) -> usize {
        self.outbox.lock().unwrap().len()
    }

    /// Queue an envelope for the next `poll`
    pub fn deliver(&self, envelope: SignalEnvelope) {
        self.inbox.lock().unwrap().push_back(envelope);
    }

    pub fn is_unsubscribed(&self) -> bool {
        *self.unsubscribed.lock().unwrap()
    }
}

impl SignalTransport for ManualSignal {
    fn send(&mut self, envelope: SignalEnvelope) -> Result<()> {
        tracing::trace!("📤 {} → {} ({})", envelope.sender, envelope.receiver, envelope.kind());
        self.outbox.lock().unwrap().push(envelope);
        Ok(())
    }

    fn try_recv(&mut self) -> Option<SignalEnvelope> {
        if *self.unsubscribed.lock().unwrap() {
            return None;
        }
        self.inbox.lock().unwrap().pop_front()
    }

    fn unsubscribe(&mut self) {
        *self.unsubscribed.lock().unwrap() = true;
    }
}
