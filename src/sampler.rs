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

//! Soundfont sample playback.
//!
//! This module provides:
//! - Soundfont bank fetching (one JSON bank per instrument and encoding)
//! - Per-note decoding into in-memory audio, with fan-in load completion
//! - Voice scheduling with gain/velocity scaling and a release envelope
//! - An ordered effect chain on the render path

use std::error::Error;
use std::fmt;
use std::str::FromStr;

pub mod bank;
pub mod decode;
pub mod effects;
pub mod engine;
pub mod fetch;
pub mod render;
pub mod voice;

pub use bank::{LoadMode, SampleBank};
pub use engine::{EngineMode, SamplerEngine};
pub use fetch::Fetcher;
pub use render::{Renderer, SampleClock};

use crate::capability;

/// The audio encoding of a soundfont bank.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AudioFormat {
    Ogg,
    Mp3,
    Wav,
}

impl AudioFormat {
    /// The encoding suffix used in bank addresses.
    pub fn suffix(&self) -> &'static str {
        match self {
            AudioFormat::Ogg => "ogg",
            AudioFormat::Mp3 => "mp3",
            AudioFormat::Wav => "wav",
        }
    }

    /// The capability name guarding this encoding.
    pub fn capability(&self) -> &'static str {
        match self {
            AudioFormat::Ogg => capability::CAP_OGG,
            AudioFormat::Mp3 => capability::CAP_MP3,
            AudioFormat::Wav => capability::CAP_WAV,
        }
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.suffix())
    }
}

impl FromStr for AudioFormat {
    type Err = Box<dyn Error>;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ogg" => Ok(AudioFormat::Ogg),
            "mp3" => Ok(AudioFormat::Mp3),
            "wav" => Ok(AudioFormat::Wav),
            _ => Err(format!("unknown audio format: {}", s).into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_parsing() {
        assert_eq!("ogg".parse::<AudioFormat>().unwrap(), AudioFormat::Ogg);
        assert_eq!("MP3".parse::<AudioFormat>().unwrap(), AudioFormat::Mp3);
        assert!("flac".parse::<AudioFormat>().is_err());
    }

    #[test]
    fn test_format_suffix() {
        assert_eq!(AudioFormat::Ogg.suffix(), "ogg");
        assert_eq!(AudioFormat::Wav.to_string(), "wav");
    }
}
