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
use std::{error::Error, fmt, sync::Arc};

use parking_lot::RwLock;

use crate::{audio::Render, playsync::CancelHandle};

/// A mock device. Doesn't open a stream; tests drive rendering by hand.
#[derive(Clone)]
pub struct Device {
    name: String,
    sample_rate: u32,
    channel_count: u16,
    renderer: Arc<RwLock<Option<Arc<dyn Render>>>>,
}

impl Device {
    /// Gets the given mock device.
    pub fn get(name: &str, sample_rate: u32, channel_count: u16) -> Device {
        Device {
            name: name.to_string(),
            sample_rate,
            channel_count,
            renderer: Arc::new(RwLock::new(None)),
        }
    }

    /// Renders the given number of frames through the attached renderer, as
    /// the stream callback would, and returns the interleaved buffer.
    #[cfg(test)]
    pub fn pump(&self, frames: usize) -> Vec<f32> {
        let mut buf = vec![0.0f32; frames * usize::from(self.channel_count)];
        if let Some(renderer) = self.renderer.read().as_ref() {
            renderer.render(&mut buf, self.channel_count);
        }
        buf
    }

    /// Returns true once a stream has been started.
    #[cfg(test)]
    pub fn is_started(&self) -> bool {
        self.renderer.read().is_some()
    }
}

impl crate::audio::Device for Device {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn channel_count(&self) -> u16 {
        self.channel_count
    }

    fn start(
        &self,
        renderer: Arc<dyn Render>,
        _cancel_handle: CancelHandle,
    ) -> Result<(), Box<dyn Error>> {
        *self.renderer.write() = Some(renderer);
        Ok(())
    }

    #[cfg(test)]
    fn to_mock(&self) -> Result<Arc<Device>, Box<dyn Error>> {
        Ok(Arc::new(self.clone()))
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Mock)", self.name)
    }
}
