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

use crate::playsync::CancelHandle;

pub mod cpal;
pub mod mock;

/// Produces output audio. The device calls this from its stream callback
/// with an interleaved buffer to fill.
pub trait Render: Send + Sync {
    fn render(&self, buf: &mut [f32], channels: u16);
}

pub trait Device: fmt::Display + Send + Sync {
    /// The device name.
    fn name(&self) -> String;

    /// The output sample rate.
    fn sample_rate(&self) -> u32;

    /// The number of interleaved output channels.
    fn channel_count(&self) -> u16;

    /// Starts a continuous output stream driven by the renderer. Returns
    /// once the stream is running; the stream lives until the cancel handle
    /// is cancelled.
    fn start(
        &self,
        renderer: Arc<dyn Render>,
        cancel_handle: CancelHandle,
    ) -> Result<(), Box<dyn Error>>;

    #[cfg(test)]
    fn to_mock(&self) -> Result<Arc<mock::Device>, Box<dyn Error>>;
}

/// Lists devices known to cpal.
pub fn list_devices() -> Result<Vec<Box<dyn Device>>, Box<dyn Error>> {
    cpal::Device::list()
}

/// Gets a device with the given name.
pub fn get_device(
    name: &str,
    sample_rate: u32,
    channel_count: u16,
) -> Result<Arc<dyn Device>, Box<dyn Error>> {
    if name.starts_with("mock") {
        return Ok(Arc::new(mock::Device::get(name, sample_rate, channel_count)));
    };

    Ok(Arc::new(cpal::Device::get(name, sample_rate, channel_count)?))
}
