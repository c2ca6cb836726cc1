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

//! A General MIDI soundfont player.
//!
//! The player negotiates an audio backend at runtime (MIDI passthrough,
//! in-memory sampler, or a basic streamed fallback), bulk-loads per-note
//! instrument samples from JSON soundfont banks, and schedules voices with
//! gain/velocity scaling and a release envelope against a sample clock.
//!
//! This crate only orchestrates playback of pre-rendered samples; it performs
//! no synthesis.

pub mod audio;
pub mod backend;
pub mod capability;
pub mod channel;
pub mod config;
pub mod gm;
pub mod loader;
pub mod midi;
pub mod player;
pub mod playsync;
pub mod sampler;
#[cfg(test)]
mod test;
pub mod util;

pub use player::{InitError, InitOptions, Player};
pub use sampler::{AudioFormat, SampleClock};
