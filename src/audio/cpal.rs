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
use std::{
    error::Error,
    fmt,
    sync::{atomic::AtomicBool, mpsc, Arc},
    thread,
};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tracing::{error, info};

use crate::{
    audio::{Device as AudioDevice, Render},
    playsync::CancelHandle,
};

/// A cpal output device.
pub struct Device {
    name: String,
    sample_rate: u32,
    channel_count: u16,
    device: cpal::Device,
}

impl Device {
    /// Lists cpal devices and produces the Device trait.
    pub fn list() -> Result<Vec<Box<dyn AudioDevice>>, Box<dyn Error>> {
        Ok(Device::list_cpal_devices(44100, 2)?
            .into_iter()
            .map(|device| {
                let device: Box<dyn AudioDevice> = Box::new(device);
                device
            })
            .collect())
    }

    /// Lists cpal devices that can produce output.
    fn list_cpal_devices(sample_rate: u32, channel_count: u16) -> Result<Vec<Device>, Box<dyn Error>> {
        let mut devices: Vec<Device> = Vec::new();
        for host_id in cpal::available_hosts() {
            let host_devices = match cpal::host_from_id(host_id)?.devices() {
                Ok(host_devices) => host_devices,
                Err(e) => {
                    error!(
                        err = e.to_string(),
                        host = host_id.name(),
                        "Unable to list devices for host."
                    );
                    continue;
                }
            };

            for device in host_devices {
                let mut max_channels = 0;

                let output_configs = match device.supported_output_configs() {
                    Ok(output_configs) => output_configs,
                    Err(_) => continue,
                };
                for output_config in output_configs {
                    if max_channels < output_config.channels() {
                        max_channels = output_config.channels();
                    }
                }

                if max_channels > 0 {
                    devices.push(Device {
                        name: device.name()?,
                        sample_rate,
                        channel_count: channel_count.min(max_channels),
                        device,
                    })
                }
            }
        }

        devices.sort_by_key(|device| device.name.to_string());
        Ok(devices)
    }

    /// Gets the given cpal device. The name "default" selects the host's
    /// default output device.
    pub fn get(name: &str, sample_rate: u32, channel_count: u16) -> Result<Device, Box<dyn Error>> {
        if name == "default" {
            let device = cpal::default_host()
                .default_output_device()
                .ok_or("no default output device found")?;
            return Ok(Device {
                name: device.name()?,
                sample_rate,
                channel_count,
                device,
            });
        }

        match Device::list_cpal_devices(sample_rate, channel_count)?
            .into_iter()
            .find(|device| device.name.trim() == name)
        {
            Some(device) => Ok(device),
            None => Err(format!("no device found with name {}", name).into()),
        }
    }
}

impl AudioDevice for Device {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn channel_count(&self) -> u16 {
        self.channel_count
    }

    /// Builds and starts the output stream. Streams aren't Send, so the
    /// stream is built and held on a dedicated thread; the build result is
    /// reported back before this returns.
    fn start(
        &self,
        renderer: Arc<dyn Render>,
        cancel_handle: CancelHandle,
    ) -> Result<(), Box<dyn Error>> {
        let config = cpal::StreamConfig {
            channels: self.channel_count,
            sample_rate: self.sample_rate,
            buffer_size: cpal::BufferSize::Default,
        };

        let name = self.name.clone();
        let channels = self.channel_count;
        let device = self.device.clone();
        let (result_tx, result_rx) = mpsc::channel::<Result<(), String>>();

        thread::spawn(move || {
            let stream_result = device.build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    renderer.render(data, channels);
                },
                |err| error!(err = err.to_string(), "Output stream error."),
                None,
            );

            let stream = match stream_result {
                Ok(stream) => stream,
                Err(e) => {
                    let _ = result_tx.send(Err(e.to_string()));
                    return;
                }
            };
            if let Err(e) = stream.play() {
                let _ = result_tx.send(Err(e.to_string()));
                return;
            }

            info!(device = name, "Output stream started.");
            let _ = result_tx.send(Ok(()));

            // Keep the stream alive until cancellation.
            cancel_handle.wait(Arc::new(AtomicBool::new(false)));
            drop(stream);
            info!(device = name, "Output stream stopped.");
        });

        result_rx.recv()?.map_err(|e| e.into())
    }

    #[cfg(test)]
    fn to_mock(&self) -> Result<Arc<crate::audio::mock::Device>, Box<dyn Error>> {
        Err("not a mock".into())
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} channels, {} Hz)",
            self.name, self.channel_count, self.sample_rate
        )
    }
}
