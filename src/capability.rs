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

//! Capability detection for backend selection.
//!
//! The probe produces a read-only mapping from capability name to support
//! flag. Backend selection consumes the mapping but never mutates it.

use std::collections::HashMap;
use std::fmt;

use cpal::traits::HostTrait;
use tracing::warn;

/// A MIDI output port is available.
pub const CAP_MIDI: &str = "midi";
/// An audio output device is available.
pub const CAP_AUDIO: &str = "audio";
/// Ogg Vorbis soundfont banks can be decoded.
pub const CAP_OGG: &str = "audio/ogg";
/// MP3 soundfont banks can be decoded.
pub const CAP_MP3: &str = "audio/mp3";
/// WAV soundfont banks can be decoded.
pub const CAP_WAV: &str = "audio/wav";

/// A mapping from capability name to support flag.
#[derive(Clone, Debug, Default)]
pub struct Capabilities {
    supports: HashMap<String, bool>,
}

impl Capabilities {
    /// Creates an empty capability set. Absent capabilities are unsupported.
    pub fn new() -> Capabilities {
        Capabilities::default()
    }

    /// Records support for the named capability.
    pub fn set(&mut self, name: &str, supported: bool) {
        self.supports.insert(name.to_string(), supported);
    }

    /// Returns true if the named capability is supported.
    pub fn supports(&self, name: &str) -> bool {
        self.supports.get(name).copied().unwrap_or(false)
    }
}

impl fmt::Display for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.supports.keys().collect();
        names.sort();
        for name in names {
            writeln!(f, "{}: {}", name, self.supports[name])?;
        }
        Ok(())
    }
}

/// Probes the host environment for playback capabilities.
///
/// Device enumeration can block, so the probe runs on the blocking pool.
pub async fn detect() -> Capabilities {
    match tokio::task::spawn_blocking(detect_blocking).await {
        Ok(capabilities) => capabilities,
        Err(e) => {
            warn!(err = %e, "Capability probe panicked, assuming no support.");
            Capabilities::new()
        }
    }
}

fn detect_blocking() -> Capabilities {
    let mut capabilities = Capabilities::new();

    let midi_ports = midir::MidiOutput::new("gmplay probe")
        .map(|output| output.port_count())
        .unwrap_or(0);
    capabilities.set(CAP_MIDI, midi_ports > 0);

    let audio = cpal::default_host().default_output_device().is_some();
    capabilities.set(CAP_AUDIO, audio);

    // Codec support is compiled in via symphonia's feature set.
    capabilities.set(CAP_OGG, true);
    capabilities.set(CAP_MP3, true);
    capabilities.set(CAP_WAV, true);

    capabilities
}
