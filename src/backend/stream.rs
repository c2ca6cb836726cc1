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

//! The streamed fallback backend.
//!
//! Used when audio output exists but decoded playback isn't wanted or
//! possible. Samples decode lazily at first playback, velocity is ignored,
//! released notes stop without a tail, and effects are unavailable.

use std::sync::Arc;

use crate::backend::sampler::EngineBackend;
use crate::channel::ChannelMap;
use crate::sampler::bank::SampleBank;

/// Connects the streamed backend over the bank.
pub fn connect(bank: Arc<SampleBank>, channels: Arc<ChannelMap>, sample_rate: u32) -> EngineBackend {
    EngineBackend::streamed(bank, channels, sample_rate)
}
