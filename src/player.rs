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

//! The player session.
//!
//! A player owns the bank, channel table, and whichever backend
//! initialization settled on. Playback calls before initialization finishes
//! are quiet no-ops, so callers never have to guard the surface.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info};

use crate::backend::{self, Backend, BackendKind, EngineBackend, MidiBackend};
use crate::capability::{self, Capabilities};
use crate::channel::ChannelMap;
use crate::config::Config;
use crate::loader::{self, ErrorFn, ProgressFn};
use crate::playsync::CancelHandle;
use crate::sampler::bank::{LoadMode, SampleBank};
use crate::sampler::effects::EffectRequest;
use crate::sampler::fetch::Fetcher;
use crate::sampler::render::SampleClock;
use crate::sampler::AudioFormat;
use crate::{audio, midi};

/// The instrument loaded when none are requested.
const DEFAULT_INSTRUMENT: &str = "acoustic_grand_piano";

/// Typed error for player initialization.
#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("no supported backend found")]
    NoSupportedBackend,
    #[error("unable to open device: {0}")]
    Device(String),
}

/// Initialization options.
#[derive(Clone, Default)]
pub struct InitOptions {
    /// Request a specific backend. Falls back to the priority order when
    /// the backend is unsupported.
    pub backend: Option<BackendKind>,
    /// Request a specific soundfont encoding.
    pub format: Option<AudioFormat>,
    /// Instruments to load, by GM id or program number. Empty loads the
    /// grand piano.
    pub instruments: Vec<String>,
    /// Receives load progress reports.
    pub on_progress: Option<ProgressFn>,
    /// Receives per-instrument load failures.
    pub on_error: Option<ErrorFn>,
}

/// A playback session.
pub struct Player {
    config: Config,
    bank: Arc<SampleBank>,
    channels: Arc<ChannelMap>,
    fetcher: Arc<Fetcher>,
    backend: RwLock<Option<Arc<dyn Backend>>>,
    format: RwLock<Option<AudioFormat>>,
    cancel_handle: RwLock<Option<CancelHandle>>,
}

impl Player {
    /// Creates an uninitialized player from configuration.
    pub fn new(config: Config) -> Player {
        let bank = Arc::new(SampleBank::new(config.sample_rate()));
        let fetcher = Arc::new(Fetcher::new(config.soundfont_dir(), config.fetch_timeout()));
        Player {
            config,
            bank,
            channels: Arc::new(ChannelMap::new()),
            fetcher,
            backend: RwLock::new(None),
            format: RwLock::new(None),
            cancel_handle: RwLock::new(None),
        }
    }

    /// Probes the host and connects the best available backend, then loads
    /// the requested instruments. Returns the backend that was connected.
    pub async fn initialize(&self, options: InitOptions) -> Result<BackendKind, InitError> {
        let capabilities = capability::detect().await;
        self.initialize_with_capabilities(&capabilities, options)
            .await
    }

    /// Like [`Player::initialize`], with capabilities supplied by the
    /// caller.
    pub async fn initialize_with_capabilities(
        &self,
        capabilities: &Capabilities,
        options: InitOptions,
    ) -> Result<BackendKind, InitError> {
        let kind = backend::select(capabilities, options.backend, self.config.backend())
            .ok_or(InitError::NoSupportedBackend)?;
        info!(backend = %kind, "Connecting backend.");

        match kind {
            BackendKind::Midi => {
                let device = midi::get_device(&self.config.midi_device())
                    .map_err(|e| InitError::Device(e.to_string()))?;
                let connected = MidiBackend::new(device, self.channels.clone());
                connected.set_volume(self.config.master_volume(), 0.0);
                *self.backend.write() = Some(Arc::new(connected));
            }
            BackendKind::Sampler | BackendKind::Stream => {
                let format = backend::select_format(capabilities, options.format)
                    .ok_or(InitError::NoSupportedBackend)?;
                *self.format.write() = Some(format);

                let device = audio::get_device(
                    &self.config.audio_device(),
                    self.config.sample_rate(),
                    self.config.channel_count(),
                )
                .map_err(|e| InitError::Device(e.to_string()))?;

                let connected = if kind == BackendKind::Sampler {
                    EngineBackend::sampled(
                        self.bank.clone(),
                        self.channels.clone(),
                        device.sample_rate(),
                    )
                } else {
                    backend::stream::connect(
                        self.bank.clone(),
                        self.channels.clone(),
                        device.sample_rate(),
                    )
                };

                let cancel_handle = CancelHandle::new();
                device
                    .start(connected.engine().renderer(), cancel_handle.clone())
                    .map_err(|e| InitError::Device(e.to_string()))?;
                *self.cancel_handle.write() = Some(cancel_handle);

                connected.set_volume(self.config.master_volume(), 0.0);
                *self.backend.write() = Some(Arc::new(connected));

                self.load_instruments(
                    options.instruments,
                    options.on_progress.clone(),
                    options.on_error.clone(),
                )
                .await;
            }
        }

        Ok(kind)
    }

    /// Loads additional instruments into the connected backend's bank.
    /// Instruments that are already loaded are not refetched.
    pub async fn load_instruments(
        &self,
        instruments: Vec<String>,
        on_progress: Option<ProgressFn>,
        on_error: Option<ErrorFn>,
    ) {
        let format = match *self.format.read() {
            Some(format) => format,
            None => {
                debug!("No soundfont format negotiated, skipping load.");
                return;
            }
        };
        let mode = match self.kind() {
            Some(BackendKind::Stream) => LoadMode::Stream,
            _ => LoadMode::Decode,
        };

        let instruments = if instruments.is_empty() {
            vec![DEFAULT_INSTRUMENT.to_string()]
        } else {
            instruments
        };

        loader::request_queue(
            self.bank.clone(),
            self.fetcher.clone(),
            instruments,
            format,
            mode,
            on_progress.unwrap_or_else(|| Arc::new(|_| {})),
            on_error.unwrap_or_else(|| Arc::new(|_| {})),
        )
        .await;
    }

    /// The connected backend kind, if initialization has finished.
    pub fn kind(&self) -> Option<BackendKind> {
        self.backend.read().as_ref().map(|backend| backend.kind())
    }

    /// The negotiated soundfont encoding, if one was needed.
    pub fn format(&self) -> Option<AudioFormat> {
        *self.format.read()
    }

    fn with_backend<T: Default>(&self, f: impl FnOnce(&Arc<dyn Backend>) -> T) -> T {
        match self.backend.read().as_ref() {
            Some(backend) => f(backend),
            None => {
                debug!("Player is not initialized, ignoring call.");
                T::default()
            }
        }
    }

    /// Starts a note, returning the started voice's id where the backend
    /// tracks voices.
    pub fn note_on(&self, channel: u8, note: u8, velocity: u8, delay_secs: f64) -> Option<u64> {
        self.with_backend(|backend| backend.note_on(channel, note, velocity, delay_secs))
    }

    /// Releases a note, returning the released voice's id where the backend
    /// tracks voices.
    pub fn note_off(&self, channel: u8, note: u8, delay_secs: f64) -> Option<u64> {
        self.with_backend(|backend| backend.note_off(channel, note, delay_secs))
    }

    /// Starts every note of a chord, returning the started voice ids by
    /// note.
    pub fn chord_on(
        &self,
        channel: u8,
        notes: &[u8],
        velocity: u8,
        delay_secs: f64,
    ) -> HashMap<u8, u64> {
        self.with_backend(|backend| backend.chord_on(channel, notes, velocity, delay_secs))
    }

    /// Releases every note of a chord, returning the released voice ids by
    /// note.
    pub fn chord_off(&self, channel: u8, notes: &[u8], delay_secs: f64) -> HashMap<u8, u64> {
        self.with_backend(|backend| backend.chord_off(channel, notes, delay_secs))
    }

    /// Starts a note on the channel.
    pub fn play_channel(
        &self,
        channel: u8,
        note: u8,
        velocity: u8,
        delay_secs: f64,
    ) -> Option<u64> {
        self.with_backend(|backend| backend.play_channel(channel, note, velocity, delay_secs))
    }

    /// Dispatches a raw MIDI event to the connected backend.
    pub fn send(&self, event: midly::live::LiveEvent<'static>, delay_secs: f64) {
        self.with_backend(|backend| backend.send(event, delay_secs));
    }

    /// Sets a MIDI controller value, where the backend supports it.
    pub fn set_controller(&self, channel: u8, controller: u8, value: u8, delay_secs: f64) {
        self.with_backend(|backend| backend.set_controller(channel, controller, value, delay_secs));
    }

    /// Assigns an instrument program to a channel.
    pub fn program_change(&self, channel: u8, program: u8) {
        self.with_backend(|backend| backend.program_change(channel, program));
    }

    /// Sets a channel's pitch bend value.
    pub fn pitch_bend(&self, channel: u8, value: u16) {
        self.with_backend(|backend| backend.pitch_bend(channel, value));
    }

    /// Sets the master volume, optionally after a delay.
    pub fn set_volume(&self, volume: u8, delay_secs: f64) {
        self.with_backend(|backend| backend.set_volume(volume, delay_secs));
    }

    /// Stops everything that is sounding.
    pub fn stop_all_notes(&self) {
        self.with_backend(|backend| backend.stop_all_notes());
    }

    /// Stops everything sounding on the channel.
    pub fn stop_channel(&self, channel: u8) {
        self.with_backend(|backend| backend.stop_channel(channel));
    }

    /// Replaces the output effect chain, where the backend has one.
    pub fn set_effects(&self, requests: &[EffectRequest]) {
        self.with_backend(|backend| backend.set_effects(requests));
    }

    /// The number of sounding voices, where the backend tracks them.
    pub fn active_voice_count(&self) -> usize {
        self.backend
            .read()
            .as_ref()
            .map(|backend| backend.active_voice_count())
            .unwrap_or(0)
    }

    /// The backend's sample clock, where one exists. The clock is the
    /// absolute-time reference for scheduling delays.
    pub fn clock(&self) -> Option<Arc<SampleClock>> {
        self.backend.read().as_ref().and_then(|backend| backend.clock())
    }

    /// Tears down the output stream and disconnects the backend.
    pub fn shutdown(&self) {
        if let Some(cancel_handle) = self.cancel_handle.write().take() {
            cancel_handle.cancel();
        }
        if self.backend.write().take().is_some() {
            info!("Player shut down.");
        }
    }
}

impl Drop for Player {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use serial_test::serial;

    use super::*;
    use crate::capability::{CAP_AUDIO, CAP_MIDI, CAP_OGG, CAP_WAV};
    use crate::sampler::AudioFormat;
    use crate::test::test::{wav_data_uri, write_bank_file};

    fn caps(pairs: &[(&str, bool)]) -> Capabilities {
        let mut caps = Capabilities::new();
        for (name, supported) in pairs {
            caps.set(name, *supported);
        }
        caps
    }

    fn player_with_soundfont(dir: &std::path::Path) -> Player {
        std::env::set_var("GMPLAY_SOUNDFONT_DIR", dir.to_str().expect("bad path"));
        std::env::set_var("GMPLAY_AUDIO_DEVICE", "mock-output");
        std::env::set_var("GMPLAY_MIDI_DEVICE", "mock-port");
        let config = Config::load(None).expect("unable to load config");
        std::env::remove_var("GMPLAY_SOUNDFONT_DIR");
        std::env::remove_var("GMPLAY_AUDIO_DEVICE");
        std::env::remove_var("GMPLAY_MIDI_DEVICE");
        Player::new(config)
    }

    fn grand_piano_soundfont() -> tempfile::TempDir {
        let dir = tempfile::tempdir().expect("unable to create temp dir");
        let uri = wav_data_uri(440.0, 441, 44100);
        write_bank_file(
            dir.path(),
            "acoustic_grand_piano",
            AudioFormat::Wav,
            &[("C4", uri.as_str()), ("E4", uri.as_str())],
        );
        dir
    }

    #[tokio::test]
    #[serial]
    async fn test_no_backend_is_an_error() {
        let dir = grand_piano_soundfont();
        let player = player_with_soundfont(dir.path());

        let result = player
            .initialize_with_capabilities(&caps(&[]), InitOptions::default())
            .await;
        assert!(matches!(result, Err(InitError::NoSupportedBackend)));
        assert_eq!(player.kind(), None);
    }

    #[tokio::test]
    #[serial]
    async fn test_initialize_sampler_loads_default_instrument() {
        let dir = grand_piano_soundfont();
        let player = player_with_soundfont(dir.path());

        let kind = player
            .initialize_with_capabilities(
                &caps(&[(CAP_AUDIO, true), (CAP_WAV, true)]),
                InitOptions::default(),
            )
            .await
            .expect("unable to initialize");

        assert_eq!(kind, BackendKind::Sampler);
        assert_eq!(player.format(), Some(AudioFormat::Wav));
        assert!(player.bank.is_loaded(0));
    }

    #[tokio::test]
    #[serial]
    async fn test_midi_wins_when_available() {
        let dir = grand_piano_soundfont();
        let player = player_with_soundfont(dir.path());

        let kind = player
            .initialize_with_capabilities(
                &caps(&[(CAP_MIDI, true), (CAP_AUDIO, true), (CAP_OGG, true)]),
                InitOptions::default(),
            )
            .await
            .expect("unable to initialize");
        assert_eq!(kind, BackendKind::Midi);
    }

    #[tokio::test]
    #[serial]
    async fn test_surface_is_a_no_op_before_initialization() {
        let dir = grand_piano_soundfont();
        let player = player_with_soundfont(dir.path());

        player.note_on(0, 60, 100, 0.0);
        player.stop_all_notes();
        assert_eq!(player.active_voice_count(), 0);
    }

    #[tokio::test]
    #[serial]
    async fn test_send_decomposes_into_playback_calls() {
        use midly::num::{u4, u7};

        let dir = grand_piano_soundfont();
        let player = player_with_soundfont(dir.path());

        player
            .initialize_with_capabilities(
                &caps(&[(CAP_AUDIO, true), (CAP_WAV, true)]),
                InitOptions::default(),
            )
            .await
            .expect("unable to initialize");

        player.send(
            midly::live::LiveEvent::Midi {
                channel: u4::from_int_lossy(0),
                message: midly::MidiMessage::NoteOn {
                    key: u7::from_int_lossy(60),
                    vel: u7::from_int_lossy(100),
                },
            },
            0.0,
        );
        assert_eq!(player.active_voice_count(), 1);
    }

    #[tokio::test]
    #[serial]
    async fn test_note_on_sounds_through_sampler() {
        let dir = grand_piano_soundfont();
        let player = player_with_soundfont(dir.path());

        player
            .initialize_with_capabilities(
                &caps(&[(CAP_AUDIO, true), (CAP_WAV, true)]),
                InitOptions::default(),
            )
            .await
            .expect("unable to initialize");

        player.note_on(0, 60, 127, 0.0);
        assert_eq!(player.active_voice_count(), 1);

        player.note_off(0, 60, 0.0);
        assert_eq!(player.active_voice_count(), 0);
    }

    #[tokio::test]
    #[serial]
    async fn test_chords_hand_back_voice_ids() {
        let dir = grand_piano_soundfont();
        let player = player_with_soundfont(dir.path());

        assert!(player.chord_on(0, &[60, 64], 100, 0.0).is_empty());

        player
            .initialize_with_capabilities(
                &caps(&[(CAP_AUDIO, true), (CAP_WAV, true)]),
                InitOptions::default(),
            )
            .await
            .expect("unable to initialize");

        let started = player.chord_on(0, &[60, 64], 100, 0.0);
        assert_eq!(started.len(), 2);

        let released = player.chord_off(0, &[60, 64], 0.0);
        assert_eq!(released, started);
        assert_eq!(player.active_voice_count(), 0);
    }

    #[tokio::test]
    #[serial]
    async fn test_clock_is_exposed_once_a_sampler_connects() {
        let dir = grand_piano_soundfont();
        let player = player_with_soundfont(dir.path());
        assert!(player.clock().is_none());

        player
            .initialize_with_capabilities(
                &caps(&[(CAP_AUDIO, true), (CAP_WAV, true)]),
                InitOptions::default(),
            )
            .await
            .expect("unable to initialize");

        let clock = player.clock().expect("sampler should expose a clock");
        assert_eq!(clock.sample_rate(), 44100);
    }
}
