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
    time::Duration,
};

use midly::live::LiveEvent;

/// A mock device. Records events instead of sending them anywhere.
#[derive(Clone)]
pub struct Device {
    name: String,
    sent: Arc<Mutex<Vec<(LiveEvent<'static>, Duration)>>>,
}

impl Device {
    /// Gets the given mock device.
    pub fn get(name: &str) -> Device {
        Device {
            name: name.to_string(),
            sent: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Returns the events sent to the device so far.
    #[cfg(test)]
    pub fn sent_events(&self) -> Vec<(LiveEvent<'static>, Duration)> {
        self.sent.lock().expect("unable to get lock").clone()
    }
}

impl super::Device for Device {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn send(&self, event: LiveEvent<'static>, delay: Duration) -> Result<(), Box<dyn Error>> {
        self.sent
            .lock()
            .expect("unable to get lock")
            .push((event, delay));
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
