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

//! Sample playback scheduling.
//!
//! The engine is the control side of the sampler. It resolves notes against
//! the bank and the channel table, tracks logical voices, and sends commands
//! to the renderer running in the audio callback. All scheduling is in
//! engine time, read from the shared sample clock.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use crossbeam_channel::Sender;
use tracing::{debug, info, warn};

use super::bank::SampleBank;
use super::effects::{EffectRegistry, EffectRequest};
use super::render::{RenderCommand, Renderer, SampleClock};
use super::voice::{self, Voice, VoiceMap};
use crate::channel::ChannelMap;

/// How long a released note ramps to silence, in seconds.
pub const RELEASE_SECS: f64 = 0.3;

/// How long after release a voice is kept before it is dropped. Longer than
/// the release ramp so the tail is never clipped.
pub const STOP_LAG_SECS: f64 = 0.5;

/// The default master volume.
pub const DEFAULT_MASTER_VOLUME: u8 = 127;

/// How the engine materializes and scales note audio.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EngineMode {
    /// Decoded samples with velocity scaling and release envelopes.
    Sampled,
    /// Lazily decoded samples, master volume only, hard stops.
    Streamed,
}

/// Schedules note playback against a renderer.
pub struct SamplerEngine {
    mode: EngineMode,
    bank: Arc<SampleBank>,
    channels: Arc<ChannelMap>,
    clock: Arc<SampleClock>,
    voices: VoiceMap,
    master_volume: Arc<AtomicU8>,
    tx: Sender<RenderCommand>,
    renderer: Arc<Renderer>,
    effects: Option<EffectRegistry>,
}

impl SamplerEngine {
    /// Creates an engine and its paired renderer.
    pub fn new(
        mode: EngineMode,
        bank: Arc<SampleBank>,
        channels: Arc<ChannelMap>,
        sample_rate: u32,
        effects: Option<EffectRegistry>,
    ) -> SamplerEngine {
        let clock = Arc::new(SampleClock::new(sample_rate));
        let master_volume = Arc::new(AtomicU8::new(DEFAULT_MASTER_VOLUME));
        let (tx, rx) = crossbeam_channel::unbounded();
        let renderer = Arc::new(Renderer::new(clock.clone(), rx, master_volume.clone()));

        SamplerEngine {
            mode,
            bank,
            channels,
            clock,
            voices: VoiceMap::new(),
            master_volume,
            tx,
            renderer,
            effects,
        }
    }

    /// The renderer to hand to the output device.
    pub fn renderer(&self) -> Arc<Renderer> {
        self.renderer.clone()
    }

    /// The engine's sample clock.
    pub fn clock(&self) -> Arc<SampleClock> {
        self.clock.clone()
    }

    /// The current master volume.
    pub fn master_volume(&self) -> u8 {
        self.master_volume.load(Ordering::SeqCst)
    }

    /// The number of logically sounding voices.
    pub fn active_voice_count(&self) -> usize {
        self.voices.active_count()
    }

    /// Converts a scheduling delay to an absolute engine time. A delay
    /// earlier than the current clock is a relative offset from now; later
    /// values are already absolute.
    fn resolve_time(&self, delay_secs: f64) -> u64 {
        let now = self.clock.now_samples();
        let at = self.clock.secs_to_samples(delay_secs);
        if at < now {
            now + at
        } else {
            at
        }
    }

    /// Starts a note on the channel's current instrument and returns the
    /// started voice's id.
    ///
    /// If the bank has no sample for the note nothing sounds; the miss is
    /// logged at debug level and playback continues. Retriggering a sounding
    /// (channel, note) stops the old voice at the moment the new one starts.
    pub fn note_on(&self, channel: u8, note: u8, velocity: u8, delay_secs: f64) -> Option<u64> {
        let instrument = self.channels.instrument(channel);
        let audio = match self.bank.note_audio(instrument, note) {
            Some(audio) => audio,
            None => {
                debug!(
                    channel = channel,
                    note = note,
                    instrument = instrument,
                    "No sample for note, skipping."
                );
                return None;
            }
        };

        let start_at = self.resolve_time(delay_secs);
        let master = self.master_volume();
        let gain = match self.mode {
            EngineMode::Sampled => voice::note_gain(velocity, master),
            EngineMode::Streamed => f32::from(master) / 127.0,
        };

        let voice = Voice::new(instrument, gain, start_at);
        if let Some(displaced) = self.voices.insert((channel, note), voice) {
            self.send(RenderCommand::StopAt {
                id: displaced.id,
                at: start_at,
            });
        }

        self.send(RenderCommand::Start {
            id: voice.id,
            data: audio,
            gain,
            start_at,
        });
        Some(voice.id)
    }

    /// Releases a note and returns the released voice's id. Sampled voices
    /// ramp to silence over the release window; streamed voices stop
    /// outright. The voice stops being tracked immediately, so a new note-on
    /// for the key can sound during the tail.
    pub fn note_off(&self, channel: u8, note: u8, delay_secs: f64) -> Option<u64> {
        let instrument = self.channels.instrument(channel);
        if !self.bank.has_note(instrument, note) {
            return None;
        }

        let voice = self.voices.remove(&(channel, note))?;

        let at = self.resolve_time(delay_secs);
        match self.mode {
            EngineMode::Sampled => self.send(RenderCommand::Fade {
                id: voice.id,
                start_value: None,
                at,
                silent_at: at + self.clock.secs_to_samples(RELEASE_SECS),
                stop_at: at + self.clock.secs_to_samples(STOP_LAG_SECS),
            }),
            EngineMode::Streamed => self.send(RenderCommand::StopAt { id: voice.id, at }),
        }
        Some(voice.id)
    }

    /// Starts every note in the chord, returning the started voice ids by
    /// note.
    pub fn chord_on(
        &self,
        channel: u8,
        notes: &[u8],
        velocity: u8,
        delay_secs: f64,
    ) -> HashMap<u8, u64> {
        let mut voices = HashMap::new();
        for &note in notes {
            if let Some(id) = self.note_on(channel, note, velocity, delay_secs) {
                voices.insert(note, id);
            }
        }
        voices
    }

    /// Releases every note in the chord, returning the released voice ids by
    /// note.
    pub fn chord_off(&self, channel: u8, notes: &[u8], delay_secs: f64) -> HashMap<u8, u64> {
        let mut voices = HashMap::new();
        for &note in notes {
            if let Some(id) = self.note_off(channel, note, delay_secs) {
                voices.insert(note, id);
            }
        }
        voices
    }

    /// Stops every sounding voice with a short fade from full gain.
    pub fn stop_all_notes(&self) {
        let now = self.clock.now_samples();
        let release = self.clock.secs_to_samples(RELEASE_SECS);
        for voice in self.voices.drain() {
            match self.mode {
                EngineMode::Sampled => self.send(RenderCommand::Fade {
                    id: voice.id,
                    start_value: Some(1.0),
                    at: now,
                    silent_at: now + release,
                    stop_at: now + release,
                }),
                EngineMode::Streamed => self.send(RenderCommand::StopAt { id: voice.id, at: now }),
            }
        }
    }

    /// Stops every voice sounding on the channel.
    pub fn stop_channel(&self, channel: u8) {
        let now = self.clock.now_samples();
        let release = self.clock.secs_to_samples(RELEASE_SECS);
        for voice in self.voices.drain_channel(channel) {
            match self.mode {
                EngineMode::Sampled => self.send(RenderCommand::Fade {
                    id: voice.id,
                    start_value: Some(1.0),
                    at: now,
                    silent_at: now + release,
                    stop_at: now + release,
                }),
                EngineMode::Streamed => self.send(RenderCommand::StopAt { id: voice.id, at: now }),
            }
        }
    }

    /// Sets the master volume, optionally after a delay. Delayed changes are
    /// carried as render commands so they land at an engine time, not a wall
    /// time. Only affects notes scheduled after the change takes effect.
    pub fn set_volume(&self, volume: u8, delay_secs: f64) {
        let volume = volume.min(127);
        if delay_secs > 0.0 {
            self.send(RenderCommand::SetVolume {
                value: volume,
                at: self.resolve_time(delay_secs),
            });
        } else {
            self.master_volume.store(volume, Ordering::SeqCst);
        }
    }

    /// Replaces the output effect chain.
    pub fn set_effects(&self, requests: &[EffectRequest]) {
        if self.mode == EngineMode::Streamed {
            warn!("Effects are not supported in streamed mode.");
            return;
        }
        match &self.effects {
            None => info!("Effects module not installed."),
            Some(registry) => {
                let chain = registry.build(requests);
                debug!(count = chain.len(), "Applying effect chain.");
                self.send(RenderCommand::SetEffects(chain));
            }
        }
    }

    fn send(&self, command: RenderCommand) {
        // The renderer holds the receiver for as long as the engine lives.
        if self.tx.send(command).is_err() {
            warn!("Renderer is gone, dropping command.");
        }
    }

    #[cfg(test)]
    pub(crate) fn voice_gain(&self, channel: u8, note: u8) -> Option<f32> {
        self.voices.get(&(channel, note)).map(|voice| voice.gain)
    }

    #[cfg(test)]
    pub(crate) fn voice_started_at(&self, channel: u8, note: u8) -> Option<u64> {
        self.voices.get(&(channel, note)).map(|voice| voice.started_at)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::audio::Render;
    use crate::sampler::bank::{LoadMode, SampleBank};
    use crate::sampler::fetch::{BankFile, Fetcher};
    use crate::test::test::wav_data_uri;

    async fn loaded_bank() -> Arc<SampleBank> {
        let bank = Arc::new(SampleBank::new(44100));
        let uri = wav_data_uri(440.0, 44100, 44100);
        let file = BankFile {
            name: None,
            samples: [("C4", uri.clone()), ("E4", uri.clone()), ("G4", uri)]
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        };
        let fetcher = Fetcher::new("/tmp/soundfont", Duration::from_secs(5));
        bank.load_instrument(0, file, &fetcher, LoadMode::Decode, |_, _| {}, |_, _| {})
            .await;
        bank
    }

    async fn engine(mode: EngineMode) -> Arc<SamplerEngine> {
        Arc::new(SamplerEngine::new(
            mode,
            loaded_bank().await,
            Arc::new(ChannelMap::new()),
            44100,
            Some(EffectRegistry::builtin(44100)),
        ))
    }

    #[tokio::test]
    async fn test_note_on_tracks_voice() {
        let engine = engine(EngineMode::Sampled).await;
        engine.note_on(0, 60, 127, 0.0);

        assert_eq!(engine.active_voice_count(), 1);
        assert_eq!(engine.voice_gain(0, 60), Some(1.0));
    }

    #[tokio::test]
    async fn test_note_on_unknown_note_is_silent() {
        let engine = engine(EngineMode::Sampled).await;
        engine.note_on(0, 100, 127, 0.0);
        assert_eq!(engine.active_voice_count(), 0);
    }

    #[tokio::test]
    async fn test_retrigger_replaces_voice() {
        let engine = engine(EngineMode::Sampled).await;
        engine.note_on(0, 60, 127, 0.0);
        engine.note_on(0, 60, 64, 0.0);

        assert_eq!(engine.active_voice_count(), 1);
        let expected = voice::note_gain(64, 127);
        assert_eq!(engine.voice_gain(0, 60), Some(expected));
    }

    #[tokio::test]
    async fn test_note_off_untracks_immediately() {
        let engine = engine(EngineMode::Sampled).await;
        engine.note_on(0, 60, 127, 0.0);
        engine.note_off(0, 60, 0.0);

        assert_eq!(engine.active_voice_count(), 0);

        // The key can retrigger while the old voice's tail is still fading.
        engine.note_on(0, 60, 127, 0.0);
        assert_eq!(engine.active_voice_count(), 1);
    }

    #[tokio::test]
    async fn test_note_off_without_note_on_is_a_no_op() {
        let engine = engine(EngineMode::Sampled).await;
        engine.note_off(0, 60, 0.0);
        assert_eq!(engine.active_voice_count(), 0);
    }

    #[tokio::test]
    async fn test_chords_return_voice_ids() {
        let engine = engine(EngineMode::Sampled).await;

        // Note 100 has no sample, so it gets no voice id.
        let started = engine.chord_on(0, &[60, 64, 67, 100], 100, 0.0);
        assert_eq!(started.len(), 3);
        assert_eq!(engine.active_voice_count(), 3);

        let released = engine.chord_off(0, &[60, 64], 0.0);
        assert_eq!(released.len(), 2);
        assert_eq!(released.get(&60), started.get(&60));
        assert_eq!(engine.active_voice_count(), 1);
    }

    #[tokio::test]
    async fn test_delays_below_the_clock_are_relative() {
        let engine = engine(EngineMode::Sampled).await;
        let renderer = engine.renderer();
        let mut buf = vec![0.0f32; 44100];
        renderer.render(&mut buf, 1);

        // One second in, a half second delay is an offset from now.
        engine.note_on(0, 60, 127, 0.5);
        assert_eq!(engine.voice_started_at(0, 60), Some(44100 + 22050));

        // A delay past the clock is an absolute engine time.
        engine.note_on(0, 64, 127, 2.0);
        assert_eq!(engine.voice_started_at(0, 64), Some(88200));
    }

    #[tokio::test]
    async fn test_stop_all_notes() {
        let engine = engine(EngineMode::Sampled).await;
        engine.chord_on(0, &[60, 64, 67], 100, 0.0);
        engine.stop_all_notes();
        assert_eq!(engine.active_voice_count(), 0);
    }

    #[tokio::test]
    async fn test_stop_channel_leaves_other_channels() {
        let engine = engine(EngineMode::Sampled).await;
        engine.note_on(0, 60, 100, 0.0);
        engine.note_on(1, 64, 100, 0.0);

        engine.stop_channel(0);
        assert_eq!(engine.active_voice_count(), 1);
    }

    #[tokio::test]
    async fn test_master_volume_scales_new_notes() {
        let engine = engine(EngineMode::Sampled).await;
        engine.set_volume(64, 0.0);
        engine.note_on(0, 60, 127, 0.0);

        let expected = voice::note_gain(127, 64);
        assert_eq!(engine.voice_gain(0, 60), Some(expected));
    }

    #[tokio::test]
    async fn test_delayed_volume_change_lands_at_engine_time() {
        let engine = engine(EngineMode::Sampled).await;
        engine.set_volume(30, 0.5);
        assert_eq!(engine.master_volume(), DEFAULT_MASTER_VOLUME);

        let renderer = engine.renderer();
        let mut buf = vec![0.0f32; 4410];
        renderer.render(&mut buf, 1);
        assert_eq!(engine.master_volume(), DEFAULT_MASTER_VOLUME);

        let mut buf = vec![0.0f32; 44100];
        renderer.render(&mut buf, 1);
        assert_eq!(engine.master_volume(), 30);
    }

    #[tokio::test]
    async fn test_streamed_mode_ignores_velocity() {
        let engine = engine(EngineMode::Streamed).await;
        engine.note_on(0, 60, 1, 0.0);
        assert_eq!(engine.voice_gain(0, 60), Some(1.0));
    }

    #[tokio::test]
    async fn test_rendered_note_reaches_output() {
        let engine = engine(EngineMode::Sampled).await;
        engine.note_on(0, 60, 127, 0.0);

        let renderer = engine.renderer();
        let mut buf = vec![0.0f32; 512];
        renderer.render(&mut buf, 2);
        assert!(buf.iter().any(|&s| s != 0.0));
    }
}
