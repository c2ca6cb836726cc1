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

//! In-memory soundfont storage.
//!
//! The bank holds decoded note audio per instrument. Decoded mode decodes
//! every note up front; streamed mode records the sample path and defers the
//! decode until the note first sounds.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use super::decode::{self, AudioData, DecodeError};
use super::fetch::{BankFile, Fetcher};
use crate::gm;

/// How note payloads in a bank are materialized.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadMode {
    /// Decode every note during the load.
    Decode,
    /// Record sample paths and decode lazily at first playback.
    Stream,
}

/// The audio behind one note of an instrument.
#[derive(Debug)]
pub enum NoteAudio {
    /// Fully decoded and ready to schedule.
    Decoded(Arc<AudioData>),
    /// A sample file decoded on first use.
    Streamed {
        path: PathBuf,
        cached: RwLock<Option<Arc<AudioData>>>,
    },
}

impl NoteAudio {
    /// Returns the decoded audio, decoding the streamed payload on first use.
    /// Returns None if a lazy decode fails; the failure is logged and the
    /// note stays silent.
    pub fn resolve(&self, target_rate: u32) -> Option<Arc<AudioData>> {
        match self {
            NoteAudio::Decoded(audio) => Some(audio.clone()),
            NoteAudio::Streamed { path, cached } => {
                if let Some(audio) = cached.read().as_ref() {
                    return Some(audio.clone());
                }

                let mut slot = cached.write();
                // Another thread may have beaten us to the decode.
                if let Some(audio) = slot.as_ref() {
                    return Some(audio.clone());
                }
                match decode::decode_file(path, target_rate) {
                    Ok(audio) => {
                        let audio = Arc::new(audio);
                        *slot = Some(audio.clone());
                        Some(audio)
                    }
                    Err(e) => {
                        warn!(path = %path.display(), err = %e, "Unable to decode streamed sample.");
                        None
                    }
                }
            }
        }
    }
}

#[derive(Debug, Default)]
struct InstrumentEntry {
    notes: HashMap<u8, NoteAudio>,
    is_loaded: bool,
}

/// Decoded soundfont storage shared by the loader and the engine.
#[derive(Debug)]
pub struct SampleBank {
    instruments: RwLock<HashMap<u8, InstrumentEntry>>,
    target_rate: u32,
}

impl SampleBank {
    /// Creates an empty bank whose notes decode to the given rate.
    pub fn new(target_rate: u32) -> SampleBank {
        SampleBank {
            instruments: RwLock::new(HashMap::new()),
            target_rate,
        }
    }

    /// The rate all stored notes are decoded at.
    pub fn target_rate(&self) -> u32 {
        self.target_rate
    }

    /// Returns true once the instrument's bank load has completed.
    pub fn is_loaded(&self, instrument: u8) -> bool {
        self.instruments
            .read()
            .get(&instrument)
            .map(|entry| entry.is_loaded)
            .unwrap_or(false)
    }

    /// Returns true if the instrument has audio for the note.
    pub fn has_note(&self, instrument: u8, note: u8) -> bool {
        self.instruments
            .read()
            .get(&instrument)
            .map(|entry| entry.notes.contains_key(&note))
            .unwrap_or(false)
    }

    /// Returns the decoded audio for a note, if the bank has it and it can
    /// be materialized.
    pub fn note_audio(&self, instrument: u8, note: u8) -> Option<Arc<AudioData>> {
        let instruments = self.instruments.read();
        instruments
            .get(&instrument)?
            .notes
            .get(&note)?
            .resolve(self.target_rate)
    }

    /// Loads an instrument from a fetched bank file.
    ///
    /// In decode mode every note is decoded concurrently on the blocking
    /// pool; `on_note_done` observes completion counts as (done, total) for
    /// progress reporting. Notes that fail to decode are reported through
    /// `on_note_error` and skipped, they do not fail the load. The
    /// instrument is marked loaded exactly once, after all notes settle.
    pub async fn load_instrument(
        &self,
        instrument: u8,
        bank_file: BankFile,
        fetcher: &Fetcher,
        mode: LoadMode,
        on_note_done: impl Fn(usize, usize),
        on_note_error: impl Fn(u8, DecodeError),
    ) {
        let mut pending: Vec<(u8, String)> = Vec::new();
        for (key, address) in bank_file.samples {
            match gm::key_to_note(&key) {
                Some(note) => pending.push((note, address)),
                None => debug!(key = key, "Skipping unrecognized bank key."),
            }
        }

        let total = pending.len();
        if total == 0 {
            self.mark_loaded(instrument);
            return;
        }

        let mut notes: HashMap<u8, NoteAudio> = HashMap::new();
        let mut tasks: JoinSet<(u8, Result<AudioData, DecodeError>)> = JoinSet::new();
        let mut done = 0usize;

        for (note, address) in pending {
            if mode == LoadMode::Stream && !decode::is_data_uri(&address) {
                notes.insert(
                    note,
                    NoteAudio::Streamed {
                        path: fetcher.sample_path(&address),
                        cached: RwLock::new(None),
                    },
                );
                done += 1;
                on_note_done(done, total);
                continue;
            }

            let target_rate = self.target_rate;
            let sample_path = fetcher.sample_path(&address);
            tasks.spawn_blocking(move || {
                let result = if decode::is_data_uri(&address) {
                    decode::decode_data_uri(&address, target_rate)
                } else {
                    decode::decode_file(&sample_path, target_rate)
                };
                (note, result)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            done += 1;
            match joined {
                Ok((note, Ok(audio))) => {
                    notes.insert(note, NoteAudio::Decoded(Arc::new(audio)));
                }
                Ok((note, Err(e))) => on_note_error(note, e),
                Err(e) => warn!(err = %e, "Note decode task failed to join."),
            }
            on_note_done(done, total);
        }

        let mut instruments = self.instruments.write();
        let entry = instruments.entry(instrument).or_default();
        entry.notes.extend(notes);
        entry.is_loaded = true;
    }

    fn mark_loaded(&self, instrument: u8) {
        self.instruments.write().entry(instrument).or_default().is_loaded = true;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;
    use crate::test::test::wav_data_uri;

    fn bank_with(samples: &[(&str, String)]) -> BankFile {
        BankFile {
            name: None,
            samples: samples
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        }
    }

    fn fetcher() -> Fetcher {
        Fetcher::new("/tmp/soundfont", Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_load_decodes_notes() {
        let bank = SampleBank::new(44100);
        let uri = wav_data_uri(440.0, 441, 44100);
        let file = bank_with(&[("C4", uri.clone()), ("E4", uri)]);

        bank.load_instrument(0, file, &fetcher(), LoadMode::Decode, |_, _| {}, |_, _| {})
            .await;

        assert!(bank.is_loaded(0));
        assert!(bank.has_note(0, 60));
        assert!(bank.has_note(0, 64));
        assert!(!bank.has_note(0, 65));
        assert_eq!(bank.note_audio(0, 60).unwrap().samples.len(), 441);
    }

    #[tokio::test]
    async fn test_load_reports_progress_per_note() {
        let bank = SampleBank::new(44100);
        let uri = wav_data_uri(440.0, 441, 44100);
        let file = bank_with(&[("C4", uri.clone()), ("E4", uri.clone()), ("G4", uri)]);

        let reports = AtomicUsize::new(0);
        let last_total = AtomicUsize::new(0);
        bank.load_instrument(
            0,
            file,
            &fetcher(),
            LoadMode::Decode,
            |done, total| {
                reports.fetch_add(1, Ordering::SeqCst);
                assert!(done <= total);
                last_total.store(total, Ordering::SeqCst);
            },
            |_, _| {},
        )
        .await;

        assert_eq!(reports.load(Ordering::SeqCst), 3);
        assert_eq!(last_total.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_bad_note_is_skipped_not_fatal() {
        let bank = SampleBank::new(44100);
        let uri = wav_data_uri(440.0, 441, 44100);
        let file = bank_with(&[
            ("C4", uri),
            ("E4", "data:audio/wav;base64,!!!".to_string()),
        ]);

        let errors = AtomicUsize::new(0);
        bank.load_instrument(
            0,
            file,
            &fetcher(),
            LoadMode::Decode,
            |_, _| {},
            |note, _| {
                assert_eq!(note, 64);
                errors.fetch_add(1, Ordering::SeqCst);
            },
        )
        .await;

        assert_eq!(errors.load(Ordering::SeqCst), 1);
        assert!(bank.is_loaded(0));
        assert!(bank.has_note(0, 60));
        assert!(!bank.has_note(0, 64));
    }

    #[tokio::test]
    async fn test_empty_bank_marks_loaded() {
        let bank = SampleBank::new(44100);
        bank.load_instrument(
            5,
            BankFile::default(),
            &fetcher(),
            LoadMode::Decode,
            |_, _| {},
            |_, _| {},
        )
        .await;
        assert!(bank.is_loaded(5));
    }

    #[tokio::test]
    async fn test_stream_mode_defers_decode() {
        let dir = tempfile::tempdir().expect("unable to create temp dir");
        let wav_path = dir.path().join("c4.wav");
        crate::test::test::write_wav(&wav_path, 440.0, 441, 44100);

        let bank = SampleBank::new(44100);
        let file = bank_with(&[("C4", "c4.wav".to_string())]);
        let fetcher = Fetcher::new(dir.path(), Duration::from_secs(5));

        bank.load_instrument(0, file, &fetcher, LoadMode::Stream, |_, _| {}, |_, _| {})
            .await;

        assert!(bank.is_loaded(0));
        assert!(bank.has_note(0, 60));
        // First resolve decodes from disk.
        assert_eq!(bank.note_audio(0, 60).unwrap().samples.len(), 441);
    }
}
