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

//! Player configuration.
//!
//! Settings come from an optional config file overlaid with GMPLAY_*
//! environment variables; the environment wins. Everything has a default so
//! a player can start with no configuration at all.

use std::path::PathBuf;
use std::time::Duration;

use duration_string::DurationString;
use serde::Deserialize;
use tracing::warn;

use crate::backend::BackendKind;
use crate::sampler::AudioFormat;

/// The default soundfont directory.
const DEFAULT_SOUNDFONT_DIR: &str = "./soundfont";

/// How long a bank fetch may take before it fails.
const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Typed error for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("unable to load configuration: {0}")]
    Load(#[from] config::ConfigError),
}

/// Player settings.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct Config {
    soundfont_dir: Option<PathBuf>,
    backend: Option<String>,
    format: Option<String>,
    audio_device: Option<String>,
    midi_device: Option<String>,
    sample_rate: Option<u32>,
    channel_count: Option<u16>,
    fetch_timeout: Option<String>,
    master_volume: Option<u8>,
}

impl Config {
    /// Loads configuration from the given file, if any, overlaid with
    /// GMPLAY_* environment variables.
    pub fn load(path: Option<&str>) -> Result<Config, ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path));
        }
        let settings = builder
            .add_source(config::Environment::with_prefix("GMPLAY"))
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// The directory soundfont banks are fetched from.
    pub fn soundfont_dir(&self) -> PathBuf {
        self.soundfont_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SOUNDFONT_DIR))
    }

    /// The configured backend override, if it parses.
    pub fn backend(&self) -> Option<BackendKind> {
        self.parse_setting("backend", self.backend.as_deref())
    }

    /// The configured soundfont encoding override, if it parses.
    pub fn format(&self) -> Option<AudioFormat> {
        self.parse_setting("format", self.format.as_deref())
    }

    /// The audio output device name.
    pub fn audio_device(&self) -> String {
        self.audio_device
            .clone()
            .unwrap_or_else(|| "default".to_string())
    }

    /// The MIDI output device name.
    pub fn midi_device(&self) -> String {
        self.midi_device
            .clone()
            .unwrap_or_else(|| "default".to_string())
    }

    /// The output sample rate.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate.unwrap_or(44100)
    }

    /// The number of output channels.
    pub fn channel_count(&self) -> u16 {
        self.channel_count.unwrap_or(2)
    }

    /// How long a bank fetch may take before it fails.
    pub fn fetch_timeout(&self) -> Duration {
        match &self.fetch_timeout {
            None => DEFAULT_FETCH_TIMEOUT,
            Some(timeout) => match DurationString::from_string(timeout.clone()) {
                Ok(timeout) => timeout.into(),
                Err(e) => {
                    warn!(
                        err = e.to_string(),
                        timeout = timeout,
                        "Unable to parse fetch timeout, using the default."
                    );
                    DEFAULT_FETCH_TIMEOUT
                }
            },
        }
    }

    /// The initial master volume.
    pub fn master_volume(&self) -> u8 {
        self.master_volume.unwrap_or(127).min(127)
    }

    fn parse_setting<T: std::str::FromStr>(&self, name: &str, value: Option<&str>) -> Option<T> {
        let value = value?;
        match value.parse() {
            Ok(parsed) => Some(parsed),
            Err(_) => {
                warn!(setting = name, value = value, "Ignoring unparseable setting.");
                None
            }
        }
    }
}
