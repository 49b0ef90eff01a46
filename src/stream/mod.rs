//! The receive stream coordinator and the capabilities it hands out.
//!
//! [`AudioReceiveStream`] is the control handle. The mixer pulls through
//! [`MixerSource`] and the AV-sync controller reads [`Syncable`]; both are
//! separate `Arc` handles so each context only sees what it may call.

pub mod config;
pub mod coordinator;
pub mod mixer_source;
pub mod reconciler;
pub mod stats;
pub mod syncable;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{ConfigDiff, NackConfig, ReceiveStreamConfig, RtpConfig};
pub use coordinator::AudioReceiveStream;
pub use mixer_source::MixerSource;
pub use reconciler::ConfigReconciler;
pub use stats::{ReceiveStreamStats, StreamState};
pub use syncable::{PlayoutInfo, Syncable};
