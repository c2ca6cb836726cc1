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

//! Note sample decoding.
//!
//! A bank entry addresses its payload either as an embedded base64 data URI
//! or as a sample file next to the bank. Payloads are decoded with symphonia,
//! downmixed to mono, and resampled to the engine rate so the render path
//! never has to convert.

use std::fs;
use std::io::Cursor;
use std::path::Path;

use base64::Engine as _;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::default::{get_codecs, get_probe};
use tracing::debug;

/// The URI prefix selecting the embedded base64 decode path.
const DATA_URI_PREFIX: &str = "data:audio";

/// Decoded note audio: mono samples at a known rate.
#[derive(Clone, Debug, PartialEq)]
pub struct AudioData {
    /// Mono samples.
    pub samples: Vec<f32>,
    /// The rate the samples were resampled to.
    pub sample_rate: u32,
}

impl AudioData {
    /// Returns the playable duration in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Typed error for note sample decoding.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("malformed data URI")]
    MalformedDataUri,
    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("codec error: {0}")]
    Codec(String),
}

/// Returns true if the URL selects the embedded base64 decode path.
pub fn is_data_uri(url: &str) -> bool {
    url.starts_with(DATA_URI_PREFIX)
}

/// Decodes an embedded `data:audio/<subtype>;base64,<payload>` URI.
pub fn decode_data_uri(uri: &str, target_rate: u32) -> Result<AudioData, DecodeError> {
    if !is_data_uri(uri) {
        return Err(DecodeError::MalformedDataUri);
    }

    let (header, payload) = uri.split_once(',').ok_or(DecodeError::MalformedDataUri)?;

    // The media subtype doubles as the codec hint ("data:audio/ogg;base64").
    let hint = header
        .strip_prefix("data:audio/")
        .and_then(|rest| rest.split(';').next())
        .map(str::to_string);

    let bytes = base64::engine::general_purpose::STANDARD.decode(payload)?;
    decode_bytes(bytes, hint.as_deref(), target_rate)
}

/// Decodes a sample file from disk.
pub fn decode_file(path: &Path, target_rate: u32) -> Result<AudioData, DecodeError> {
    let bytes = fs::read(path).map_err(|e| {
        DecodeError::Io(std::io::Error::new(
            e.kind(),
            format!("{}: {}", path.display(), e),
        ))
    })?;
    let hint = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_string);
    decode_bytes(bytes, hint.as_deref(), target_rate)
}

/// Decodes an in-memory audio payload into mono samples at the target rate.
pub fn decode_bytes(
    bytes: Vec<u8>,
    extension_hint: Option<&str>,
    target_rate: u32,
) -> Result<AudioData, DecodeError> {
    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());

    let mut hint = Hint::new();
    if let Some(extension) = extension_hint {
        hint.with_extension(extension);
    }

    let meta_opts: MetadataOptions = Default::default();
    let fmt_opts: FormatOptions = Default::default();
    let probed = get_probe()
        .format(&hint, mss, &fmt_opts, &meta_opts)
        .map_err(|e| DecodeError::Codec(e.to_string()))?;

    let mut format_reader = probed.format;
    let track = format_reader
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| DecodeError::Codec("no audio track found".to_string()))?;

    let track_id = track.id;
    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| DecodeError::Codec("sample rate not specified".to_string()))?;

    let decoder_opts: DecoderOptions = Default::default();
    let mut decoder = get_codecs()
        .make(&track.codec_params, &decoder_opts)
        .map_err(|e| DecodeError::Codec(e.to_string()))?;

    let mut samples: Vec<f32> = Vec::new();
    let mut channel_count: u16 = 0;
    let mut sample_buf: Option<SampleBuffer<f32>> = None;

    loop {
        let packet = match format_reader.next_packet() {
            Ok(packet) => packet,
            // End of stream. Symphonia reports this as an I/O error.
            Err(SymphoniaError::IoError(_)) => break,
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(DecodeError::Codec(e.to_string())),
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(e)) => {
                // Skip malformed packets, the rest of the stream may be fine.
                debug!(err = e, "Skipping malformed packet.");
                continue;
            }
            Err(e) => return Err(DecodeError::Codec(e.to_string())),
        };

        if sample_buf.is_none() {
            let spec = *decoded.spec();
            channel_count = spec.channels.count() as u16;
            sample_buf = Some(SampleBuffer::<f32>::new(decoded.capacity() as u64, spec));
        }
        if let Some(buf) = sample_buf.as_mut() {
            buf.copy_interleaved_ref(decoded);
            samples.extend_from_slice(buf.samples());
        }
    }

    if samples.is_empty() || channel_count == 0 {
        return Err(DecodeError::Codec("no audio data decoded".to_string()));
    }

    let mono = downmix_to_mono(&samples, channel_count);
    let resampled = if sample_rate != target_rate {
        resample(&mono, sample_rate, target_rate)
    } else {
        mono
    };

    Ok(AudioData {
        samples: resampled,
        sample_rate: target_rate,
    })
}

/// Averages interleaved channels into a mono signal.
fn downmix_to_mono(samples: &[f32], channel_count: u16) -> Vec<f32> {
    if channel_count <= 1 {
        return samples.to_vec();
    }

    let channels = channel_count as usize;
    samples
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect()
}

/// Resamples mono audio with linear interpolation. Good enough for one-shot
/// note samples; a polyphase resampler would be overkill here.
fn resample(samples: &[f32], source_rate: u32, target_rate: u32) -> Vec<f32> {
    let ratio = target_rate as f64 / source_rate as f64;
    let target_frames = (samples.len() as f64 * ratio).ceil() as usize;
    let mut output = Vec::with_capacity(target_frames);

    for target_frame in 0..target_frames {
        let source_pos = target_frame as f64 / ratio;
        let source_frame = source_pos.floor() as usize;
        let frac = source_pos.fract() as f32;

        let s0 = samples.get(source_frame).copied().unwrap_or(0.0);
        let s1 = samples.get(source_frame + 1).copied().unwrap_or(s0);
        output.push(s0 + (s1 - s0) * frac);
    }

    output
}
