mod config;
mod coordinator;
mod events;
pub mod runtime;

pub use config::CoordinatorConfig;
pub use coordinator::SignalingCoordinator;
pub use events::{CoordinatorInput, DiscardReason, RoomEvent, SignalOutcome};
pub use runtime::{CoordinatorBuilder, InboundQueue, QueueError};
#[cfg(feature = "native")]
pub use runtime::{RoomCommand, RoomRuntime, RoomSnapshot};
