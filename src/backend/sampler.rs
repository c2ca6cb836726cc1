// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! The sampled backend. Wraps a sampler engine in the backend trait; the
//! streamed backend reuses this wrapper with a streamed engine.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::backend::{Backend, BackendKind};
use crate::channel::ChannelMap;
use crate::sampler::bank::SampleBank;
use crate::sampler::effects::{EffectRegistry, EffectRequest};
use crate::sampler::render::SampleClock;
use crate::sampler::{EngineMode, SamplerEngine};

pub struct EngineBackend {
    kind: BackendKind,
    engine: Arc<SamplerEngine>,
    channels: Arc<ChannelMap>,
}

impl EngineBackend {
    /// Connects a sampled engine over the bank.
    pub fn sampled(
        bank: Arc<SampleBank>,
        channels: Arc<ChannelMap>,
        sample_rate: u32,
    ) -> EngineBackend {
        EngineBackend {
            kind: BackendKind::Sampler,
            engine: Arc::new(SamplerEngine::new(
                EngineMode::Sampled,
                bank,
                channels.clone(),
                sample_rate,
                Some(EffectRegistry::builtin(sample_rate)),
            )),
            channels,
        }
    }

    /// Connects a streamed engine over the bank.
    pub fn streamed(
        bank: Arc<SampleBank>,
        channels: Arc<ChannelMap>,
        sample_rate: u32,
    ) -> EngineBackend {
        EngineBackend {
            kind: BackendKind::Stream,
            engine: Arc::new(SamplerEngine::new(
                EngineMode::Streamed,
                bank,
                channels.clone(),
                sample_rate,
                None,
            )),
            channels,
        }
    }

    /// The underlying engine, for wiring up the output device.
    pub fn engine(&self) -> Arc<SamplerEngine> {
        self.engine.clone()
    }
}

impl Backend for EngineBackend {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    fn note_on(&self, channel: u8, note: u8, velocity: u8, delay_secs: f64) -> Option<u64> {
        self.engine.note_on(channel, note, velocity, delay_secs)
    }

    fn note_off(&self, channel: u8, note: u8, delay_secs: f64) -> Option<u64> {
        self.engine.note_off(channel, note, delay_secs)
    }

    fn chord_on(
        &self,
        channel: u8,
        notes: &[u8],
        velocity: u8,
        delay_secs: f64,
    ) -> HashMap<u8, u64> {
        self.engine.chord_on(channel, notes, velocity, delay_secs)
    }

    fn chord_off(&self, channel: u8, notes: &[u8], delay_secs: f64) -> HashMap<u8, u64> {
        self.engine.chord_off(channel, notes, delay_secs)
    }

    fn program_change(&self, channel: u8, program: u8) {
        self.channels.set_instrument(channel, program);
    }

    /// Pitch bend is recorded but does not yet alter playback rate.
    fn pitch_bend(&self, channel: u8, value: u16) {
        debug!(channel = channel, value = value, "Recording pitch bend.");
        self.channels.set_pitch_bend(channel, value);
    }

    fn set_volume(&self, volume: u8, delay_secs: f64) {
        self.engine.set_volume(volume, delay_secs);
    }

    fn stop_all_notes(&self) {
        self.engine.stop_all_notes();
    }

    fn stop_channel(&self, channel: u8) {
        self.engine.stop_channel(channel);
    }

    fn set_effects(&self, requests: &[EffectRequest]) {
        self.engine.set_effects(requests);
    }

    fn active_voice_count(&self) -> usize {
        self.engine.active_voice_count()
    }

    fn clock(&self) -> Option<Arc<SampleClock>> {
        Some(self.engine.clock())
    }
}
