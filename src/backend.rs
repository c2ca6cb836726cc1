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

//! Playback backends and backend selection.
//!
//! Three backends exist, tried in a fixed priority order: MIDI output,
//! the sampled engine, and the streamed engine. Selection is a pure function
//! of the detected capabilities plus any explicit or configured override.

use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use midly::live::LiveEvent;
use midly::MidiMessage;
use tracing::{debug, warn};

use crate::capability::{self, Capabilities};
use crate::sampler::effects::EffectRequest;
use crate::sampler::render::SampleClock;
use crate::sampler::AudioFormat;

pub mod midi;
pub mod sampler;
pub mod stream;

pub use self::midi::MidiBackend;
pub use self::sampler::EngineBackend;

/// The closed set of playback backends.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackendKind {
    /// Events are forwarded to a MIDI output port.
    Midi,
    /// Notes are synthesized from decoded soundfont samples.
    Sampler,
    /// Notes are played from lazily decoded samples with hard stops.
    Stream,
}

impl BackendKind {
    /// Backends in selection priority order.
    pub const PRIORITY: [BackendKind; 3] =
        [BackendKind::Midi, BackendKind::Sampler, BackendKind::Stream];

    /// Returns true if the capabilities can carry this backend.
    pub fn supported_by(&self, caps: &Capabilities) -> bool {
        match self {
            BackendKind::Midi => caps.supports(capability::CAP_MIDI),
            BackendKind::Sampler => {
                caps.supports(capability::CAP_AUDIO)
                    && (caps.supports(capability::CAP_OGG)
                        || caps.supports(capability::CAP_MP3)
                        || caps.supports(capability::CAP_WAV))
            }
            BackendKind::Stream => caps.supports(capability::CAP_AUDIO),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Midi => write!(f, "midi"),
            BackendKind::Sampler => write!(f, "sampler"),
            BackendKind::Stream => write!(f, "stream"),
        }
    }
}

impl FromStr for BackendKind {
    type Err = Box<dyn Error>;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "midi" => Ok(BackendKind::Midi),
            "sampler" => Ok(BackendKind::Sampler),
            "stream" => Ok(BackendKind::Stream),
            _ => Err(format!("unknown backend: {}", s).into()),
        }
    }
}

/// Picks a backend from the detected capabilities. An explicit request wins
/// over a configured one; both win over the priority order, but only when
/// the capabilities actually carry them. Returns None when nothing fits.
pub fn select(
    caps: &Capabilities,
    explicit: Option<BackendKind>,
    configured: Option<BackendKind>,
) -> Option<BackendKind> {
    for candidate in explicit.into_iter().chain(configured) {
        if candidate.supported_by(caps) {
            return Some(candidate);
        }
        warn!(backend = %candidate, "Requested backend is unsupported, falling back.");
    }

    BackendKind::PRIORITY
        .into_iter()
        .find(|kind| kind.supported_by(caps))
}

/// Picks the soundfont encoding: an explicit supported request, else ogg,
/// else the remaining encodings in preference order.
pub fn select_format(caps: &Capabilities, explicit: Option<AudioFormat>) -> Option<AudioFormat> {
    if let Some(format) = explicit {
        if caps.supports(format.capability()) {
            return Some(format);
        }
        warn!(format = %format, "Requested format is unsupported, falling back.");
    }

    [AudioFormat::Ogg, AudioFormat::Mp3, AudioFormat::Wav]
        .into_iter()
        .find(|format| caps.supports(format.capability()))
}

/// A connected playback backend.
///
/// Delays are in seconds of engine time; zero means immediately, and a delay
/// earlier than the backend's clock is an offset from now. Channel and note
/// arguments follow MIDI conventions.
pub trait Backend: Send + Sync {
    /// The kind this backend was selected as.
    fn kind(&self) -> BackendKind;

    /// Starts a note. Returns the started voice's id where the backend
    /// tracks voices; wire backends return None.
    fn note_on(&self, channel: u8, note: u8, velocity: u8, delay_secs: f64) -> Option<u64>;

    /// Releases a note. Returns the released voice's id where the backend
    /// tracks voices.
    fn note_off(&self, channel: u8, note: u8, delay_secs: f64) -> Option<u64>;

    /// Starts every note of a chord, returning the started voice ids by
    /// note.
    fn chord_on(
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

    /// Releases every note of a chord, returning the released voice ids by
    /// note.
    fn chord_off(&self, channel: u8, notes: &[u8], delay_secs: f64) -> HashMap<u8, u64> {
        let mut voices = HashMap::new();
        for &note in notes {
            if let Some(id) = self.note_off(channel, note, delay_secs) {
                voices.insert(note, id);
            }
        }
        voices
    }

    /// Starts a note on the channel. Alias for [`Backend::note_on`]; kept
    /// on the surface so callers can address playback per channel.
    fn play_channel(&self, channel: u8, note: u8, velocity: u8, delay_secs: f64) -> Option<u64> {
        self.note_on(channel, note, velocity, delay_secs)
    }

    /// Dispatches a raw MIDI event. Backends without a wire decompose the
    /// event into the equivalent playback calls.
    fn send(&self, event: LiveEvent<'static>, delay_secs: f64) {
        let LiveEvent::Midi { channel, message } = event else {
            debug!("Ignoring non-channel event.");
            return;
        };
        let channel = channel.as_int();
        match message {
            MidiMessage::NoteOn { key, vel } => {
                self.note_on(channel, key.as_int(), vel.as_int(), delay_secs);
            }
            MidiMessage::NoteOff { key, .. } => {
                self.note_off(channel, key.as_int(), delay_secs);
            }
            MidiMessage::ProgramChange { program } => {
                self.program_change(channel, program.as_int())
            }
            MidiMessage::PitchBend { bend } => self.pitch_bend(channel, bend.0.as_int()),
            MidiMessage::Controller { controller, value } => {
                self.set_controller(channel, controller.as_int(), value.as_int(), delay_secs)
            }
            _ => debug!("Ignoring unsupported event."),
        }
    }

    /// Sets a MIDI controller value. Only meaningful on the wire; other
    /// backends log and ignore it.
    fn set_controller(&self, channel: u8, controller: u8, value: u8, _delay_secs: f64) {
        debug!(
            channel = channel,
            controller = controller,
            value = value,
            backend = %self.kind(),
            "Controllers are not supported by this backend."
        );
    }

    /// Assigns an instrument program to a channel.
    fn program_change(&self, channel: u8, program: u8);

    /// Sets a channel's pitch bend value.
    fn pitch_bend(&self, channel: u8, value: u16);

    /// Sets the master volume, optionally after a delay.
    fn set_volume(&self, volume: u8, delay_secs: f64);

    /// Stops everything that is sounding.
    fn stop_all_notes(&self);

    /// Stops everything sounding on the channel.
    fn stop_channel(&self, channel: u8);

    /// Replaces the output effect chain. Backends without a render path
    /// ignore the request.
    fn set_effects(&self, _requests: &[EffectRequest]) {
        warn!(backend = %self.kind(), "Effects are not supported by this backend.");
    }

    /// The number of sounding voices, where the backend tracks them.
    fn active_voice_count(&self) -> usize {
        0
    }

    /// The backend's sample clock, where one exists.
    fn clock(&self) -> Option<Arc<SampleClock>> {
        None
    }
}
