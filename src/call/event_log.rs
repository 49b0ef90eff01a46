//! Lifecycle event sinks.

use std::sync::{Mutex, PoisonError};

use serde::Serialize;
use tracing::{info, warn};

use crate::stream::{ConfigDiff, ReceiveStreamConfig};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum StreamEvent {
    Created {
        remote_ssrc: u32,
        config: ReceiveStreamConfig,
    },
    Reconfigured {
        remote_ssrc: u32,
        diff: ConfigDiff,
    },
    Started {
        remote_ssrc: u32,
    },
    Stopped {
        remote_ssrc: u32,
    },
    Destroyed {
        remote_ssrc: u32,
    },
}

pub trait EventLog: Send + Sync {
    fn log(&self, event: StreamEvent);
}

/// Emits each event as JSON on the `stream_event` tracing target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventLog;

impl EventLog for TracingEventLog {
    fn log(&self, event: StreamEvent) {
        match serde_json::to_string(&event) {
            Ok(json) => info!(target: "stream_event", "{}", json),
            Err(e) => warn!("Failed to serialize stream event {:?}: {}", event, e),
        }
    }
}

/// Keeps events in memory for inspection.
#[derive(Debug, Default)]
pub struct MemoryEventLog {
    events: Mutex<Vec<StreamEvent>>,
}

impl MemoryEventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<StreamEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl EventLog for MemoryEventLog {
    fn log(&self, event: StreamEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}
