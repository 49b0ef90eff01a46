use std::sync::Arc;

use crate::audio::AudioMixer;
use crate::call::SyncGroupRegistry;
use crate::channel::{AudioDecoderFactory, BuiltinDecoderFactory};
use crate::clock::{Clock, SystemClock};

/// Everything receive streams in one call share.
pub struct AudioState {
    decoder_factory: Arc<dyn AudioDecoderFactory>,
    clock: Arc<dyn Clock>,
    mixer: Arc<AudioMixer>,
    sync_groups: SyncGroupRegistry,
}

impl AudioState {
    pub fn new(decoder_factory: Arc<dyn AudioDecoderFactory>, clock: Arc<dyn Clock>) -> Self {
        Self {
            decoder_factory,
            clock,
            mixer: Arc::new(AudioMixer::new()),
            sync_groups: SyncGroupRegistry::default(),
        }
    }

    pub fn decoder_factory(&self) -> &Arc<dyn AudioDecoderFactory> {
        &self.decoder_factory
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn mixer(&self) -> &Arc<AudioMixer> {
        &self.mixer
    }

    pub fn sync_groups(&self) -> &SyncGroupRegistry {
        &self.sync_groups
    }
}

impl Default for AudioState {
    fn default() -> Self {
        Self::new(Arc::new(BuiltinDecoderFactory), Arc::new(SystemClock::new()))
    }
}
