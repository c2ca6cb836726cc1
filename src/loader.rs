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

//! Instrument loading orchestration.
//!
//! Loads a set of instruments into the bank, fanning each bank fetch and
//! per-note decode out concurrently and fanning completion back in. Progress
//! is reported as a single monotonic fraction over all requested
//! instruments; individual failures are reported and skipped so one bad
//! instrument never wedges the rest of the load.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::gm;
use crate::sampler::bank::{LoadMode, SampleBank};
use crate::sampler::decode::DecodeError;
use crate::sampler::fetch::{FetchError, Fetcher};
use crate::sampler::AudioFormat;

/// A progress report for an in-flight load.
#[derive(Clone, Debug, PartialEq)]
pub struct LoadProgress {
    /// Overall completion in [0, 1]. Never decreases across reports.
    pub fraction: f64,
    /// The instrument the report is about, absent for the final report.
    pub instrument: Option<String>,
}

/// Receives progress reports during a load.
pub type ProgressFn = Arc<dyn Fn(LoadProgress) + Send + Sync>;

/// Receives per-instrument load failures.
pub type ErrorFn = Arc<dyn Fn(LoadError) + Send + Sync>;

/// A failure while loading one instrument.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("no such instrument: {0}")]
    UnknownInstrument(String),
    #[error("unable to fetch bank for {instrument}: {source}")]
    Fetch {
        instrument: String,
        source: FetchError,
    },
    #[error("unable to decode note {note} of {instrument}: {source}")]
    Decode {
        instrument: String,
        note: u8,
        source: DecodeError,
    },
}

/// Tracks overall completion across concurrently loading instruments.
struct Progress {
    total: usize,
    completed: usize,
    /// Last reported fraction, reports are clamped so they never go
    /// backwards under interleaving.
    last: f64,
}

impl Progress {
    fn report(&mut self, file_fraction: f64, on_progress: &ProgressFn, instrument: Option<&str>) {
        let fraction = (self.completed as f64 + file_fraction) / self.total as f64;
        let fraction = fraction.clamp(self.last, 1.0);
        self.last = fraction;
        on_progress(LoadProgress {
            fraction,
            instrument: instrument.map(str::to_string),
        });
    }
}

/// Loads the named instruments into the bank.
///
/// Instruments are named by GM id ("acoustic_grand_piano") or program
/// number as a decimal string. Already loaded instruments are counted as
/// complete without refetching. Always finishes with a progress report of
/// exactly 1.0, including for an empty request.
pub async fn request_queue(
    bank: Arc<SampleBank>,
    fetcher: Arc<Fetcher>,
    instruments: Vec<String>,
    format: AudioFormat,
    mode: LoadMode,
    on_progress: ProgressFn,
    on_error: ErrorFn,
) {
    let mut pending: Vec<gm::Instrument> = Vec::new();
    let mut satisfied = 0usize;
    for name in &instruments {
        let instrument = match resolve_instrument(name) {
            Some(instrument) => instrument,
            None => {
                on_error(LoadError::UnknownInstrument(name.clone()));
                continue;
            }
        };
        if bank.is_loaded(instrument.number) {
            satisfied += 1;
        } else {
            pending.push(instrument);
        }
    }

    let total = satisfied + pending.len();
    if total == 0 || pending.is_empty() {
        on_progress(LoadProgress {
            fraction: 1.0,
            instrument: None,
        });
        return;
    }

    info!(
        count = pending.len(),
        format = %format,
        "Loading instruments."
    );

    let progress = Arc::new(Mutex::new(Progress {
        total,
        completed: satisfied,
        last: 0.0,
    }));

    let mut tasks = JoinSet::new();
    for instrument in pending {
        let bank = bank.clone();
        let fetcher = fetcher.clone();
        let on_progress = on_progress.clone();
        let on_error = on_error.clone();
        let progress = progress.clone();

        tasks.spawn(async move {
            let bank_file = match fetcher.fetch(instrument.id, format).await {
                Ok(bank_file) => bank_file,
                Err(source) => {
                    on_error(LoadError::Fetch {
                        instrument: instrument.id.to_string(),
                        source,
                    });
                    let mut progress = progress.lock();
                    progress.completed += 1;
                    if progress.completed < progress.total {
                        progress.report(0.0, &on_progress, Some(instrument.id));
                    }
                    return;
                }
            };

            {
                let on_progress = on_progress.clone();
                let progress = progress.clone();
                bank.load_instrument(
                    instrument.number,
                    bank_file,
                    &fetcher,
                    mode,
                    move |done, note_total| {
                        let file_fraction = done as f64 / note_total as f64;
                        let mut progress = progress.lock();
                        // Interim reports only; the fan-in below owns 1.0.
                        if progress.completed + 1 < progress.total || file_fraction < 1.0 {
                            progress.report(file_fraction, &on_progress, Some(instrument.id));
                        }
                    },
                    |note, source| {
                        on_error(LoadError::Decode {
                            instrument: instrument.id.to_string(),
                            note,
                            source,
                        })
                    },
                )
                .await;
            }

            let mut progress = progress.lock();
            progress.completed += 1;
            if progress.completed < progress.total {
                progress.report(0.0, &on_progress, Some(instrument.id));
            }
        });
    }

    while let Some(joined) = tasks.join_next().await {
        if let Err(e) = joined {
            warn!(err = %e, "Instrument load task failed to join.");
        }
    }

    on_progress(LoadProgress {
        fraction: 1.0,
        instrument: None,
    });
}

/// Resolves an instrument given as a GM id or a program number string.
fn resolve_instrument(name: &str) -> Option<gm::Instrument> {
    if let Ok(number) = name.parse::<u8>() {
        return gm::by_number(number);
    }
    gm::by_id(name)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;
    use crate::test::test::{wav_data_uri, write_bank_file};

    fn progress_sink() -> (Arc<Mutex<Vec<LoadProgress>>>, ProgressFn) {
        let reports: Arc<Mutex<Vec<LoadProgress>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = reports.clone();
        let on_progress: ProgressFn = Arc::new(move |report| sink.lock().push(report));
        (reports, on_progress)
    }

    fn error_counter() -> (Arc<AtomicUsize>, ErrorFn) {
        let count = Arc::new(AtomicUsize::new(0));
        let sink = count.clone();
        let on_error: ErrorFn = Arc::new(move |_| {
            sink.fetch_add(1, Ordering::SeqCst);
        });
        (count, on_error)
    }

    #[tokio::test]
    async fn test_empty_request_reports_complete() {
        let (reports, on_progress) = progress_sink();
        let (errors, on_error) = error_counter();

        request_queue(
            Arc::new(SampleBank::new(44100)),
            Arc::new(Fetcher::new("/tmp/soundfont", Duration::from_secs(5))),
            Vec::new(),
            AudioFormat::Ogg,
            LoadMode::Decode,
            on_progress,
            on_error,
        )
        .await;

        let reports = reports.lock();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].fraction, 1.0);
        assert_eq!(errors.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_load_reports_monotonic_progress() {
        let dir = tempfile::tempdir().expect("unable to create temp dir");
        let uri = wav_data_uri(440.0, 441, 44100);
        write_bank_file(
            dir.path(),
            "acoustic_grand_piano",
            AudioFormat::Ogg,
            &[("C4", uri.as_str()), ("E4", uri.as_str())],
        );
        write_bank_file(
            dir.path(),
            "bright_acoustic_piano",
            AudioFormat::Ogg,
            &[("C4", uri.as_str())],
        );

        let bank = Arc::new(SampleBank::new(44100));
        let (reports, on_progress) = progress_sink();
        let (errors, on_error) = error_counter();

        request_queue(
            bank.clone(),
            Arc::new(Fetcher::new(dir.path(), Duration::from_secs(5))),
            vec![
                "acoustic_grand_piano".to_string(),
                "bright_acoustic_piano".to_string(),
            ],
            AudioFormat::Ogg,
            LoadMode::Decode,
            on_progress,
            on_error,
        )
        .await;

        let reports = reports.lock();
        assert!(!reports.is_empty());
        for pair in reports.windows(2) {
            assert!(pair[0].fraction <= pair[1].fraction);
        }
        assert_eq!(reports.last().unwrap().fraction, 1.0);
        assert_eq!(reports.iter().filter(|r| r.fraction >= 1.0).count(), 1);

        assert!(bank.is_loaded(0));
        assert!(bank.is_loaded(1));
        assert_eq!(errors.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_bank_reports_error_and_continues() {
        let dir = tempfile::tempdir().expect("unable to create temp dir");
        let uri = wav_data_uri(440.0, 441, 44100);
        write_bank_file(
            dir.path(),
            "acoustic_grand_piano",
            AudioFormat::Ogg,
            &[("C4", uri.as_str())],
        );

        let bank = Arc::new(SampleBank::new(44100));
        let (reports, on_progress) = progress_sink();
        let (errors, on_error) = error_counter();

        request_queue(
            bank.clone(),
            Arc::new(Fetcher::new(dir.path(), Duration::from_secs(5))),
            vec![
                "acoustic_grand_piano".to_string(),
                "church_organ".to_string(),
            ],
            AudioFormat::Ogg,
            LoadMode::Decode,
            on_progress,
            on_error,
        )
        .await;

        assert!(bank.is_loaded(0));
        assert_eq!(errors.load(Ordering::SeqCst), 1);
        assert_eq!(reports.lock().last().unwrap().fraction, 1.0);
    }

    #[tokio::test]
    async fn test_unknown_instrument_reports_error() {
        let (reports, on_progress) = progress_sink();
        let (errors, on_error) = error_counter();

        request_queue(
            Arc::new(SampleBank::new(44100)),
            Arc::new(Fetcher::new("/tmp/soundfont", Duration::from_secs(5))),
            vec!["kazoo_ensemble".to_string()],
            AudioFormat::Ogg,
            LoadMode::Decode,
            on_progress,
            on_error,
        )
        .await;

        assert_eq!(errors.load(Ordering::SeqCst), 1);
        assert_eq!(reports.lock().last().unwrap().fraction, 1.0);
    }

    #[tokio::test]
    async fn test_already_loaded_instrument_is_not_refetched() {
        let dir = tempfile::tempdir().expect("unable to create temp dir");
        let uri = wav_data_uri(440.0, 441, 44100);
        write_bank_file(
            dir.path(),
            "acoustic_grand_piano",
            AudioFormat::Ogg,
            &[("C4", uri.as_str())],
        );

        let bank = Arc::new(SampleBank::new(44100));
        let fetcher = Arc::new(Fetcher::new(dir.path(), Duration::from_secs(5)));
        let (_, on_progress) = progress_sink();
        let (_, on_error) = error_counter();

        request_queue(
            bank.clone(),
            fetcher.clone(),
            vec!["acoustic_grand_piano".to_string()],
            AudioFormat::Ogg,
            LoadMode::Decode,
            on_progress.clone(),
            on_error.clone(),
        )
        .await;
        assert_eq!(fetcher.request_count(), 1);

        request_queue(
            bank,
            fetcher.clone(),
            vec!["acoustic_grand_piano".to_string()],
            AudioFormat::Ogg,
            LoadMode::Decode,
            on_progress,
            on_error,
        )
        .await;
        assert_eq!(fetcher.request_count(), 1);
    }

    #[test]
    fn test_resolve_instrument_by_number_or_id() {
        assert_eq!(resolve_instrument("0").unwrap().id, "acoustic_grand_piano");
        assert_eq!(resolve_instrument("acoustic_grand_piano").unwrap().number, 0);
        assert!(resolve_instrument("nonsense").is_none());
    }
}
