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

//! Soundfont bank fetching.
//!
//! A bank is one JSON file per instrument and encoding, named
//! `<instrument-id>-<suffix>.json` under the soundfont directory. Each entry
//! maps a key name ("C4") to its sample address.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use super::AudioFormat;

/// A parsed soundfont bank for a single instrument.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct BankFile {
    /// Optional display name embedded in the bank.
    #[serde(default)]
    pub name: Option<String>,
    /// Key name to sample address. Addresses are either data URIs or file
    /// paths relative to the soundfont directory.
    #[serde(flatten)]
    pub samples: HashMap<String, String>,
}

/// Typed error for bank fetches.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("unable to read bank {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("timed out reading bank {path} after {timeout:?}")]
    TimedOut { path: PathBuf, timeout: Duration },
    #[error("malformed bank {path}: {source}")]
    Malformed {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Fetches instrument banks from the soundfont directory.
#[derive(Debug)]
pub struct Fetcher {
    soundfont_dir: PathBuf,
    timeout: Duration,
    requests: AtomicUsize,
}

impl Fetcher {
    /// Creates a fetcher rooted at the given soundfont directory.
    pub fn new<P: AsRef<Path>>(soundfont_dir: P, timeout: Duration) -> Fetcher {
        Fetcher {
            soundfont_dir: soundfont_dir.as_ref().to_path_buf(),
            timeout,
            requests: AtomicUsize::new(0),
        }
    }

    /// The directory banks are fetched from.
    pub fn soundfont_dir(&self) -> &Path {
        &self.soundfont_dir
    }

    /// The path a bank for the given instrument and encoding would live at.
    pub fn bank_path(&self, instrument_id: &str, format: AudioFormat) -> PathBuf {
        self.soundfont_dir
            .join(format!("{}-{}.json", instrument_id, format.suffix()))
    }

    /// Resolves a relative sample address against the soundfont directory.
    pub fn sample_path(&self, address: &str) -> PathBuf {
        self.soundfont_dir.join(address)
    }

    /// The number of bank reads issued so far.
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    /// Reads and parses an instrument bank, failing if the read exceeds the
    /// configured timeout.
    pub async fn fetch(
        &self,
        instrument_id: &str,
        format: AudioFormat,
    ) -> Result<BankFile, FetchError> {
        let path = self.bank_path(instrument_id, format);
        self.requests.fetch_add(1, Ordering::SeqCst);
        debug!(path = %path.display(), "Fetching soundfont bank.");

        let bytes = match tokio::time::timeout(self.timeout, tokio::fs::read(&path)).await {
            Ok(Ok(bytes)) => bytes,
            Ok(Err(source)) => return Err(FetchError::Io { path, source }),
            Err(_) => {
                return Err(FetchError::TimedOut {
                    path,
                    timeout: self.timeout,
                })
            }
        };

        serde_json::from_slice(&bytes).map_err(|source| FetchError::Malformed { path, source })
    }
}
