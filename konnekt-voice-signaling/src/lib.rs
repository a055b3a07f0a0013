//! Signaling relay and peer-session lifecycle coordinator for P2P voice rooms.
//!
//! A [`SignalingCoordinator`] turns an unordered, possibly duplicated stream
//! of offer/answer/candidate envelopes into correctly sequenced per-peer
//! handshakes, and tracks each peer session until it is connected or torn
//! down.

// Domain layer (core)
pub mod domain;

// Application layer (use cases)
pub mod application;

// Infrastructure layer (adapters)
pub mod infrastructure;

// Re-exports for convenience
pub use application::{
    CoordinatorBuilder, CoordinatorConfig, CoordinatorInput, DiscardReason, RoomEvent,
    SignalOutcome, SignalingCoordinator,
};
#[cfg(feature = "native")]
pub use application::{RoomRuntime, RoomSnapshot};
pub use domain::{
    IceCandidate, IceServer, PeerId, RoomId, SessionState, SignalEnvelope, SignalKind,
    SignalPayload, Timestamp,
};
#[cfg(feature = "native")]
pub use infrastructure::{RelaySignalTransport, SignalRelay};
pub use infrastructure::{
    AudioConstraints, MediaEvent, MediaTransport, Result, SignalTransport, SignalingError,
    SimulatedMedia, TransportState,
};
