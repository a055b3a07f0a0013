mod ice_server;
mod peer;
mod peer_session;
mod room;
mod session_table;
mod signal;
mod timestamp;

pub use ice_server::IceServer;
pub use peer::PeerId;
pub use peer_session::{CandidateBuffer, InvalidTransition, MediaHandle, PeerSession, SessionState};
pub use room::RoomId;
pub use session_table::{SessionExists, SessionTable};
pub use signal::{
    IceCandidate, SdpKind, SessionDescription, SignalEnvelope, SignalKind, SignalPayload,
};
pub use timestamp::Timestamp;
