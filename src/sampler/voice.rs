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

//! Logical voice bookkeeping.
//!
//! The engine tracks at most one sounding voice per (channel, note) key.
//! Retriggering a key stops the previous voice and replaces it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

static NEXT_VOICE_ID: AtomicU64 = AtomicU64::new(0);

/// The key a sounding voice is tracked under.
pub type VoiceKey = (u8, u8);

/// A sounding note.
#[derive(Clone, Copy, Debug)]
pub struct Voice {
    /// Unique id tying this voice to its render-side state.
    pub id: u64,
    /// The instrument program the voice sounds with.
    pub instrument: u8,
    /// The gain the voice was scheduled at.
    pub gain: f32,
    /// The engine time the voice starts, in samples.
    pub started_at: u64,
}

impl Voice {
    /// Creates a voice with a freshly allocated id.
    pub fn new(instrument: u8, gain: f32, started_at: u64) -> Voice {
        Voice {
            id: NEXT_VOICE_ID.fetch_add(1, Ordering::SeqCst),
            instrument,
            gain,
            started_at,
        }
    }
}

/// The sounding voices of one engine, keyed by (channel, note).
#[derive(Debug, Default)]
pub struct VoiceMap {
    voices: RwLock<HashMap<VoiceKey, Voice>>,
}

impl VoiceMap {
    pub fn new() -> VoiceMap {
        VoiceMap::default()
    }

    /// Tracks a voice under the key, returning the voice it displaced.
    pub fn insert(&self, key: VoiceKey, voice: Voice) -> Option<Voice> {
        self.voices.write().insert(key, voice)
    }

    /// Stops tracking the key, returning the voice if one was sounding.
    pub fn remove(&self, key: &VoiceKey) -> Option<Voice> {
        self.voices.write().remove(key)
    }

    /// Removes and returns every tracked voice.
    pub fn drain(&self) -> Vec<Voice> {
        self.voices.write().drain().map(|(_, voice)| voice).collect()
    }

    /// Removes and returns every voice sounding on the channel.
    pub fn drain_channel(&self, channel: u8) -> Vec<Voice> {
        let mut voices = self.voices.write();
        let keys: Vec<VoiceKey> = voices
            .keys()
            .filter(|(voice_channel, _)| *voice_channel == channel)
            .copied()
            .collect();
        keys.iter().filter_map(|key| voices.remove(key)).collect()
    }

    /// Returns true if a voice is tracked under the key.
    pub fn contains(&self, key: &VoiceKey) -> bool {
        self.voices.read().contains_key(key)
    }

    /// The number of tracked voices.
    pub fn active_count(&self) -> usize {
        self.voices.read().len()
    }

    /// Returns a copy of the voice tracked under the key.
    pub fn get(&self, key: &VoiceKey) -> Option<Voice> {
        self.voices.read().get(key).copied()
    }
}

/// Computes the scheduling gain for a note from its velocity and the master
/// volume. Both scale linearly out of 127; the result is expanded into the
/// [-1, 1] output range.
pub fn note_gain(velocity: u8, master_volume: u8) -> f32 {
    let gain = (f32::from(velocity) / 127.0) * (f32::from(master_volume) / 127.0) * 2.0 - 1.0;
    gain.clamp(-1.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_voice_ids_are_unique() {
        let a = Voice::new(0, 1.0, 0);
        let b = Voice::new(0, 1.0, 0);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_insert_returns_displaced_voice() {
        let voices = VoiceMap::new();
        let first = Voice::new(0, 0.5, 0);
        let first_id = first.id;

        assert!(voices.insert((0, 60), first).is_none());
        let displaced = voices.insert((0, 60), Voice::new(0, 0.5, 100));
        assert_eq!(displaced.unwrap().id, first_id);
        assert_eq!(voices.active_count(), 1);
    }

    #[test]
    fn test_remove_and_drain() {
        let voices = VoiceMap::new();
        voices.insert((0, 60), Voice::new(0, 0.5, 0));
        voices.insert((1, 64), Voice::new(24, 0.5, 0));

        assert!(voices.remove(&(0, 60)).is_some());
        assert!(voices.remove(&(0, 60)).is_none());
        assert_eq!(voices.drain().len(), 1);
        assert_eq!(voices.active_count(), 0);
    }

    #[test]
    fn test_note_gain_range() {
        assert_eq!(note_gain(127, 127), 1.0);
        assert_eq!(note_gain(0, 127), -1.0);
        assert_eq!(note_gain(127, 0), -1.0);

        // Half velocity at full volume lands at zero.
        let mid = note_gain(127, 64);
        assert!(mid > 0.0 && mid < 0.02);
    }
}
