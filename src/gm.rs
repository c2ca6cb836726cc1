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

//! The General MIDI instrument table and piano key lookup tables.
//!
//! Instruments are addressable by program number (0-127) or by canonical
//! snake_case id. Soundfont banks key their samples by piano key name
//! ("A0" through "C8", MIDI notes 21-108).

use std::fmt;

/// Canonical instrument ids in program-number order.
const INSTRUMENT_IDS: [&str; 128] = [
    // Piano
    "acoustic_grand_piano",
    "bright_acoustic_piano",
    "electric_grand_piano",
    "honkytonk_piano",
    "electric_piano_1",
    "electric_piano_2",
    "harpsichord",
    "clavinet",
    // Chromatic percussion
    "celesta",
    "glockenspiel",
    "music_box",
    "vibraphone",
    "marimba",
    "xylophone",
    "tubular_bells",
    "dulcimer",
    // Organ
    "drawbar_organ",
    "percussive_organ",
    "rock_organ",
    "church_organ",
    "reed_organ",
    "accordion",
    "harmonica",
    "tango_accordion",
    // Guitar
    "acoustic_guitar_nylon",
    "acoustic_guitar_steel",
    "electric_guitar_jazz",
    "electric_guitar_clean",
    "electric_guitar_muted",
    "overdriven_guitar",
    "distortion_guitar",
    "guitar_harmonics",
    // Bass
    "acoustic_bass",
    "electric_bass_finger",
    "electric_bass_pick",
    "fretless_bass",
    "slap_bass_1",
    "slap_bass_2",
    "synth_bass_1",
    "synth_bass_2",
    // Strings
    "violin",
    "viola",
    "cello",
    "contrabass",
    "tremolo_strings",
    "pizzicato_strings",
    "orchestral_harp",
    "timpani",
    // Ensemble
    "string_ensemble_1",
    "string_ensemble_2",
    "synth_strings_1",
    "synth_strings_2",
    "choir_aahs",
    "voice_oohs",
    "synth_choir",
    "orchestra_hit",
    // Brass
    "trumpet",
    "trombone",
    "tuba",
    "muted_trumpet",
    "french_horn",
    "brass_section",
    "synth_brass_1",
    "synth_brass_2",
    // Reed
    "soprano_sax",
    "alto_sax",
    "tenor_sax",
    "baritone_sax",
    "oboe",
    "english_horn",
    "bassoon",
    "clarinet",
    // Pipe
    "piccolo",
    "flute",
    "recorder",
    "pan_flute",
    "blown_bottle",
    "shakuhachi",
    "whistle",
    "ocarina",
    // Synth lead
    "lead_1_square",
    "lead_2_sawtooth",
    "lead_3_calliope",
    "lead_4_chiff",
    "lead_5_charang",
    "lead_6_voice",
    "lead_7_fifths",
    "lead_8_bass_lead",
    // Synth pad
    "pad_1_new_age",
    "pad_2_warm",
    "pad_3_polysynth",
    "pad_4_choir",
    "pad_5_bowed",
    "pad_6_metallic",
    "pad_7_halo",
    "pad_8_sweep",
    // Synth effects
    "fx_1_rain",
    "fx_2_soundtrack",
    "fx_3_crystal",
    "fx_4_atmosphere",
    "fx_5_brightness",
    "fx_6_goblins",
    "fx_7_echoes",
    "fx_8_scifi",
    // Ethnic
    "sitar",
    "banjo",
    "shamisen",
    "koto",
    "kalimba",
    "bagpipe",
    "fiddle",
    "shanai",
    // Percussive
    "tinkle_bell",
    "agogo",
    "steel_drums",
    "woodblock",
    "taiko_drum",
    "melodic_tom",
    "synth_drum",
    "reverse_cymbal",
    // Sound effects
    "guitar_fret_noise",
    "breath_noise",
    "seashore",
    "bird_tweet",
    "telephone_ring",
    "helicopter",
    "applause",
    "gunshot",
];

/// Pitch class names in flat notation, used to derive key names.
const PITCH_CLASSES: [&str; 12] = [
    "C", "Db", "D", "Eb", "E", "F", "Gb", "G", "Ab", "A", "Bb", "B",
];

/// The lowest piano key (A0).
pub const LOWEST_PIANO_NOTE: u8 = 21;
/// The highest piano key (C8).
pub const HIGHEST_PIANO_NOTE: u8 = 108;

/// A General MIDI instrument table entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Instrument {
    /// The program number (0-127).
    pub number: u8,
    /// The canonical snake_case id, used in soundfont bank addresses.
    pub id: &'static str,
    /// The human readable instrument name.
    pub name: String,
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.number)
    }
}

/// Looks up an instrument by program number.
pub fn by_number(number: u8) -> Option<Instrument> {
    INSTRUMENT_IDS.get(number as usize).map(|id| Instrument {
        number,
        id,
        name: display_name(id),
    })
}

/// Looks up an instrument by canonical id.
pub fn by_id(id: &str) -> Option<Instrument> {
    INSTRUMENT_IDS
        .iter()
        .position(|candidate| *candidate == id)
        .and_then(|number| by_number(number as u8))
}

/// Returns all instruments in program-number order.
pub fn all_instruments() -> impl Iterator<Item = Instrument> {
    (0..INSTRUMENT_IDS.len()).filter_map(|number| by_number(number as u8))
}

/// Derives the display name from a canonical id.
fn display_name(id: &str) -> String {
    id.split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Returns the key name for a MIDI note number (e.g. 60 -> "C4").
pub fn note_to_key(note: u8) -> Option<String> {
    if !(LOWEST_PIANO_NOTE..=HIGHEST_PIANO_NOTE).contains(&note) {
        return None;
    }
    let pitch_class = PITCH_CLASSES[(note % 12) as usize];
    let octave = (note / 12) as i8 - 1;
    Some(format!("{}{}", pitch_class, octave))
}

/// Returns the MIDI note number for a key name (e.g. "C4" -> 60).
/// Accepts flats ("Db4") and sharps ("C#4").
pub fn key_to_note(key: &str) -> Option<u8> {
    let (name, octave) = key.split_at(key.find(|c: char| c.is_ascii_digit() || c == '-')?);
    let octave: i16 = octave.parse().ok()?;

    let pitch_class = match name {
        "C" => 0,
        "C#" | "Db" => 1,
        "D" => 2,
        "D#" | "Eb" => 3,
        "E" => 4,
        "F" => 5,
        "F#" | "Gb" => 6,
        "G" => 7,
        "G#" | "Ab" => 8,
        "A" => 9,
        "A#" | "Bb" => 10,
        "B" => 11,
        _ => return None,
    };

    let note = (octave + 1) * 12 + pitch_class;
    if (LOWEST_PIANO_NOTE as i16..=HIGHEST_PIANO_NOTE as i16).contains(&note) {
        Some(note as u8)
    } else {
        None
    }
}

/// Returns the 88 piano key notes in ascending order.
pub fn piano_notes() -> impl Iterator<Item = u8> {
    LOWEST_PIANO_NOTE..=HIGHEST_PIANO_NOTE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_and_id_resolve_to_same_instrument() {
        let by_num = by_number(1).expect("instrument 1 should exist");
        let by_name = by_id("bright_acoustic_piano").expect("id should exist");
        assert_eq!(by_num, by_name);
        assert_eq!(by_num.id, "bright_acoustic_piano");

        let grand = by_number(0).expect("instrument 0 should exist");
        assert_eq!(grand.id, "acoustic_grand_piano");
        assert_eq!(grand.name, "Acoustic Grand Piano");
    }

    #[test]
    fn test_unknown_lookups() {
        assert!(by_number(200).is_none());
        assert!(by_id("theremin").is_none());
    }

    #[test]
    fn test_table_is_complete() {
        assert_eq!(all_instruments().count(), 128);
    }

    #[test]
    fn test_note_key_round_trip() {
        assert_eq!(note_to_key(21).as_deref(), Some("A0"));
        assert_eq!(note_to_key(60).as_deref(), Some("C4"));
        assert_eq!(note_to_key(108).as_deref(), Some("C8"));
        assert_eq!(note_to_key(109), None);
        assert_eq!(note_to_key(20), None);

        for note in piano_notes() {
            let key = note_to_key(note).expect("piano note should have a key");
            assert_eq!(key_to_note(&key), Some(note));
        }
    }

    #[test]
    fn test_sharps_and_flats_are_equivalent() {
        assert_eq!(key_to_note("C#4"), key_to_note("Db4"));
        assert_eq!(key_to_note("Db4"), Some(61));
        assert_eq!(key_to_note("H3"), None);
    }

    #[test]
    fn test_piano_key_count() {
        assert_eq!(piano_notes().count(), 88);
    }
}
