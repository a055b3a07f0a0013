use crate::domain::SignalEnvelope;
use crate::infrastructure::error::Result;

/// Port to the message channel that relays signaling envelopes
///
/// Delivery is at-least-once, unordered and possibly delayed. `send` is
/// fire-and-forget from the caller's perspective: an error is logged, never
/// retried.
pub trait SignalTransport {
    fn send(&mut self, envelope: SignalEnvelope) -> Result<()>;

    /// Next envelope addressed to the local participant, if any
    fn try_recv(&mut self) -> Option<SignalEnvelope>;

    /// Stop receiving; later sends to us are retained by the channel
    fn unsubscribe(&mut self);
}
