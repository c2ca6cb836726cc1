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
    sync::{Arc, Mutex},
    thread,
    time::Duration,
};

use midir::{MidiOutput, MidiOutputConnection, MidiOutputPort};
use midly::live::LiveEvent;
use tracing::error;

/// A midir output port.
pub struct Device {
    name: String,
    connection: Arc<Mutex<Option<MidiOutputConnection>>>,
    output_port: MidiOutputPort,
}

impl Device {
    /// Lists midir devices and produces the Device trait.
    pub fn list() -> Result<Vec<Box<dyn super::Device>>, Box<dyn Error>> {
        Ok(Device::list_midir_devices()?
            .into_iter()
            .map(|device| {
                let device: Box<dyn super::Device> = Box::new(device);
                device
            })
            .collect())
    }

    /// Lists midir output ports.
    fn list_midir_devices() -> Result<Vec<Device>, Box<dyn Error>> {
        let output = MidiOutput::new("gmplay output listing")?;

        let mut devices: Vec<Device> = Vec::new();
        for port in output.ports() {
            devices.push(Device {
                name: output.port_name(&port)?,
                connection: Arc::new(Mutex::new(None)),
                output_port: port,
            });
        }

        devices.sort_by_key(|device| device.name.to_string());
        Ok(devices)
    }

    /// Gets the given midir device and connects to it. The name "default"
    /// selects the first output port.
    pub fn get(name: &str) -> Result<Device, Box<dyn Error>> {
        let devices = Device::list_midir_devices()?;
        let device = if name == "default" {
            devices.into_iter().next()
        } else {
            devices
                .into_iter()
                .find(|device| device.name.trim() == name)
        };

        match device {
            Some(device) => {
                let output = MidiOutput::new("gmplay output")?;
                let connection = output.connect(&device.output_port, "gmplay player")?;
                *device.connection.lock().expect("unable to get lock") = Some(connection);
                Ok(device)
            }
            None => Err(format!("no device found with name {}", name).into()),
        }
    }
}

impl super::Device for Device {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn send(&self, event: LiveEvent<'static>, delay: Duration) -> Result<(), Box<dyn Error>> {
        let mut buf = Vec::with_capacity(8);
        event.write(&mut buf)?;

        if delay.is_zero() {
            let mut connection = self.connection.lock().expect("unable to get lock");
            match connection.as_mut() {
                Some(connection) => connection.send(&buf)?,
                None => return Err("device is not connected".into()),
            }
            return Ok(());
        }

        let name = self.name.clone();
        let connection = self.connection.clone();
        thread::spawn(move || {
            thread::sleep(delay);
            let mut connection = connection.lock().expect("unable to get lock");
            if let Some(connection) = connection.as_mut() {
                if let Err(e) = connection.send(&buf) {
                    error!(err = e.to_string(), device = name, "Unable to send event.");
                }
            }
        });
        Ok(())
    }

    #[cfg(test)]
    fn to_mock(&self) -> Result<Arc<super::mock::Device>, Box<dyn Error>> {
        Err("not a mock".into())
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (MIDI out)", self.name)
    }
}
