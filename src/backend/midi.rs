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

//! The MIDI output backend. Forwards playback as live events to a MIDI
//! output port; the channel table is still kept so backends can be swapped
//! without losing channel state.

use std::sync::Arc;
use std::time::Duration;

use midly::{
    live::LiveEvent,
    num::{u14, u4, u7},
    MidiMessage, PitchBend,
};
use tracing::error;

use crate::backend::{Backend, BackendKind};
use crate::channel::ChannelMap;
use crate::midi;

/// All-notes-off, per the General MIDI channel mode controllers.
const CC_ALL_NOTES_OFF: u8 = 123;

/// Channel volume.
const CC_VOLUME: u8 = 7;

pub struct MidiBackend {
    device: Arc<dyn midi::Device>,
    channels: Arc<ChannelMap>,
}

impl MidiBackend {
    pub fn new(device: Arc<dyn midi::Device>, channels: Arc<ChannelMap>) -> MidiBackend {
        MidiBackend { device, channels }
    }

    fn send_message(&self, channel: u8, message: MidiMessage, delay_secs: f64) {
        let event = LiveEvent::Midi {
            channel: u4::from_int_lossy(channel),
            message,
        };
        let delay = Duration::from_secs_f64(delay_secs.max(0.0));
        if let Err(e) = self.device.send(event, delay) {
            error!(
                err = e.to_string(),
                device = self.device.name(),
                "Unable to send MIDI event."
            );
        }
    }
}

impl Backend for MidiBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Midi
    }

    /// Notes live on the other side of the wire, so there is no voice id to
    /// hand back.
    fn note_on(&self, channel: u8, note: u8, velocity: u8, delay_secs: f64) -> Option<u64> {
        self.send_message(
            channel,
            MidiMessage::NoteOn {
                key: u7::from_int_lossy(note),
                vel: u7::from_int_lossy(velocity),
            },
            delay_secs,
        );
        None
    }

    fn note_off(&self, channel: u8, note: u8, delay_secs: f64) -> Option<u64> {
        self.send_message(
            channel,
            MidiMessage::NoteOff {
                key: u7::from_int_lossy(note),
                vel: u7::from_int_lossy(0),
            },
            delay_secs,
        );
        None
    }

    /// Raw events go straight to the wire. Program changes and pitch bends
    /// still update the channel table on the way through.
    fn send(&self, event: LiveEvent<'static>, delay_secs: f64) {
        if let LiveEvent::Midi { channel, message } = &event {
            match message {
                MidiMessage::ProgramChange { program } => self
                    .channels
                    .set_instrument(channel.as_int(), program.as_int()),
                MidiMessage::PitchBend { bend } => self
                    .channels
                    .set_pitch_bend(channel.as_int(), bend.0.as_int()),
                _ => {}
            }
        }

        let delay = Duration::from_secs_f64(delay_secs.max(0.0));
        if let Err(e) = self.device.send(event, delay) {
            error!(
                err = e.to_string(),
                device = self.device.name(),
                "Unable to send MIDI event."
            );
        }
    }

    fn set_controller(&self, channel: u8, controller: u8, value: u8, delay_secs: f64) {
        self.send_message(
            channel,
            MidiMessage::Controller {
                controller: u7::from_int_lossy(controller),
                value: u7::from_int_lossy(value),
            },
            delay_secs,
        );
    }

    fn program_change(&self, channel: u8, program: u8) {
        self.channels.set_instrument(channel, program);
        self.send_message(
            channel,
            MidiMessage::ProgramChange {
                program: u7::from_int_lossy(program),
            },
            0.0,
        );
    }

    fn pitch_bend(&self, channel: u8, value: u16) {
        self.channels.set_pitch_bend(channel, value);
        self.send_message(
            channel,
            MidiMessage::PitchBend {
                bend: PitchBend(u14::from_int_lossy(value)),
            },
            0.0,
        );
    }

    /// Volume maps onto the channel volume controller for every channel.
    fn set_volume(&self, volume: u8, delay_secs: f64) {
        for channel in 0..crate::channel::NUM_CHANNELS as u8 {
            self.send_message(
                channel,
                MidiMessage::Controller {
                    controller: u7::from_int_lossy(CC_VOLUME),
                    value: u7::from_int_lossy(volume),
                },
                delay_secs,
            );
        }
    }

    fn stop_all_notes(&self) {
        for channel in 0..crate::channel::NUM_CHANNELS as u8 {
            self.stop_channel(channel);
        }
    }

    fn stop_channel(&self, channel: u8) {
        self.send_message(
            channel,
            MidiMessage::Controller {
                controller: u7::from_int_lossy(CC_ALL_NOTES_OFF),
                value: u7::from_int_lossy(0),
            },
            0.0,
        );
    }
}
