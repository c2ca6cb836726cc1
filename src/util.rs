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

use crate::gm;

/// Parses a note given either as a MIDI note number or a key name ("C4").
pub fn parse_note(input: &str) -> Option<u8> {
    if let Ok(number) = input.parse::<u8>() {
        return Some(number);
    }
    gm::key_to_note(input)
}

/// Parses a comma separated list of notes ("C4,E4,G4" or "60,64,67").
pub fn parse_note_list(input: &str) -> Result<Vec<u8>, String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| parse_note(part).ok_or_else(|| format!("unrecognized note: {}", part)))
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse_note() {
        assert_eq!(parse_note("60"), Some(60));
        assert_eq!(parse_note("C4"), Some(60));
        assert_eq!(parse_note("X9"), None);
    }

    #[test]
    fn test_parse_note_list() {
        assert_eq!(parse_note_list("C4, E4,G4").unwrap(), vec![60, 64, 67]);
        assert_eq!(parse_note_list("60,64").unwrap(), vec![60, 64]);
        assert!(parse_note_list("C4,nope").is_err());
    }
}
