//! Receive side of one inbound RTP audio stream.
//!
//! - [`stream`] - The coordinator and the handles it gives the mixer and AV sync
//! - [`channel`] - Decode engine seam and the reference engine
//! - [`receiver`] - SSRC registration and packet routing
//! - [`call`] - State shared by every stream in a call
//! - [`audio`] - Frames, gain, level, resampling and mixing
//! - [`rtp`] - RTP/RTCP boundary types

pub mod audio;
pub mod call;
pub mod channel;
pub mod clock;
pub mod error;
pub mod receiver;
pub mod rtp;
pub mod stream;

pub use audio::{AudioFrame, AudioFrameInfo, AudioMixer};
pub use call::{AudioState, EventLog, MemoryEventLog, PacketRouter, StreamEvent, TracingEventLog};
pub use channel::{ChannelProxy, ChannelReceive, NetworkState};
pub use clock::{Clock, SimulatedClock, SystemClock};
pub use error::{Result, RtcpError, StreamError};
pub use receiver::{RtpStreamReceiverController, SsrcDemuxer};
pub use rtp::find_extension_ids;
pub use stream::{
    AudioReceiveStream, ConfigDiff, MixerSource, PlayoutInfo, ReceiveStreamConfig,
    ReceiveStreamStats, StreamState, Syncable,
};
