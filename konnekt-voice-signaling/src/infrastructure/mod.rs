pub mod error;
pub mod media_transport;
#[cfg(feature = "native")]
pub mod relay;
pub mod signal_transport;
pub mod simulated_media;

pub use error::{Result, SignalingError};
pub use media_transport::{AudioConstraints, LocalMedia, MediaEvent, MediaTransport, TransportState};
#[cfg(feature = "native")]
pub use relay::{RelaySignalTransport, SignalRelay};
pub use signal_transport::SignalTransport;
pub use simulated_media::{MediaCall, SimulatedMedia};
