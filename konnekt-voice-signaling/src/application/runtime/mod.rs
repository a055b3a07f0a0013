mod builder;
mod inbound_queue;
#[cfg(feature = "native")]
mod room_runtime;

pub use builder::CoordinatorBuilder;
pub use inbound_queue::{InboundQueue, QueueError};
#[cfg(feature = "native")]
pub use room_runtime::{RoomCommand, RoomRuntime, RoomSnapshot};
