//! Call-wide state shared by every receive stream.
//!
//! - [`audio_state`] - Decoder factory, clock, mixer and sync groups
//! - [`packet_router`] - RTCP transport binding and send-stream RTT lookup
//! - [`sync_group`] - Sync group name to member streams
//! - [`event_log`] - Lifecycle event sinks

pub mod audio_state;
pub mod event_log;
pub mod packet_router;
pub mod sync_group;

pub use audio_state::AudioState;
pub use event_log::{EventLog, MemoryEventLog, StreamEvent, TracingEventLog};
pub use packet_router::{PacketRouter, RtcpTransport, SendStreamRtt};
pub use sync_group::SyncGroupRegistry;
