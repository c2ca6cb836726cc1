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

//! Per-channel playback state.
//!
//! All 16 MIDI channels always exist. Program changes and pitch bends write
//! this state; note-on reads it to resolve the sounding instrument.

use parking_lot::RwLock;

/// The number of addressable MIDI channels.
pub const NUM_CHANNELS: usize = 16;

/// The default program for every channel (acoustic grand piano).
pub const DEFAULT_PROGRAM: u8 = 0;

/// The centered pitch bend value (no bend).
pub const PITCH_BEND_CENTER: u16 = 8192;

/// The mutable state of a single MIDI channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Channel {
    /// The instrument program assigned to this channel.
    pub instrument: u8,
    /// The current 14-bit pitch bend value. Stored but not yet applied to
    /// playback rate.
    pub pitch_bend: u16,
}

impl Default for Channel {
    fn default() -> Self {
        Channel {
            instrument: DEFAULT_PROGRAM,
            pitch_bend: PITCH_BEND_CENTER,
        }
    }
}

/// The shared channel table for one player session.
#[derive(Debug, Default)]
pub struct ChannelMap {
    channels: RwLock<[Channel; NUM_CHANNELS]>,
}

impl ChannelMap {
    /// Creates a channel table with all channels at their defaults.
    pub fn new() -> ChannelMap {
        ChannelMap::default()
    }

    // MIDI channels are 4 bits, so out of range ids wrap.
    fn index(channel: u8) -> usize {
        usize::from(channel) % NUM_CHANNELS
    }

    /// Returns the instrument program assigned to the channel.
    pub fn instrument(&self, channel: u8) -> u8 {
        self.channels.read()[Self::index(channel)].instrument
    }

    /// Assigns an instrument program to the channel.
    pub fn set_instrument(&self, channel: u8, program: u8) {
        self.channels.write()[Self::index(channel)].instrument = program;
    }

    /// Returns the pitch bend value of the channel.
    pub fn pitch_bend(&self, channel: u8) -> u16 {
        self.channels.read()[Self::index(channel)].pitch_bend
    }

    /// Sets the pitch bend value of the channel.
    pub fn set_pitch_bend(&self, channel: u8, value: u16) {
        self.channels.write()[Self::index(channel)].pitch_bend = value;
    }

    /// Returns a copy of the channel state.
    pub fn get(&self, channel: u8) -> Channel {
        self.channels.read()[Self::index(channel)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channels_default_to_grand_piano() {
        let channels = ChannelMap::new();
        for channel in 0..NUM_CHANNELS as u8 {
            assert_eq!(channels.instrument(channel), DEFAULT_PROGRAM);
            assert_eq!(channels.pitch_bend(channel), PITCH_BEND_CENTER);
        }
    }

    #[test]
    fn test_program_change_is_per_channel() {
        let channels = ChannelMap::new();
        channels.set_instrument(2, 24);

        assert_eq!(channels.instrument(2), 24);
        assert_eq!(channels.instrument(3), DEFAULT_PROGRAM);
    }

    #[test]
    fn test_pitch_bend_round_trip() {
        let channels = ChannelMap::new();
        channels.set_pitch_bend(0, 12000);
        assert_eq!(channels.pitch_bend(0), 12000);
        assert_eq!(channels.get(0).pitch_bend, 12000);
    }

    #[test]
    fn test_channel_ids_wrap() {
        let channels = ChannelMap::new();
        channels.set_instrument(16, 40);
        assert_eq!(channels.instrument(0), 40);
    }
}
