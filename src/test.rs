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
#[cfg(test)]
pub mod test {
    use std::{io::Cursor, path::Path};

    use base64::Engine as _;

    use crate::sampler::AudioFormat;

    /// Renders a mono sine wave as WAV bytes.
    pub fn wav_bytes(frequency: f32, frames: usize, sample_rate: u32) -> Vec<u8> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };

        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer =
                hound::WavWriter::new(&mut cursor, spec).expect("unable to create writer");
            for frame in 0..frames {
                let t = frame as f32 / sample_rate as f32;
                let sample = (2.0 * std::f32::consts::PI * frequency * t).sin() * 0.5;
                writer.write_sample(sample).expect("unable to write sample");
            }
            writer.finalize().expect("unable to finalize writer");
        }
        cursor.into_inner()
    }

    /// Writes a mono sine wave WAV file.
    pub fn write_wav(path: &Path, frequency: f32, frames: usize, sample_rate: u32) {
        std::fs::write(path, wav_bytes(frequency, frames, sample_rate))
            .expect("unable to write wav");
    }

    /// Renders a mono sine wave as an embedded base64 data URI.
    pub fn wav_data_uri(frequency: f32, frames: usize, sample_rate: u32) -> String {
        let encoded = base64::engine::general_purpose::STANDARD
            .encode(wav_bytes(frequency, frames, sample_rate));
        format!("data:audio/wav;base64,{}", encoded)
    }

    /// Writes an instrument bank file into a soundfont directory.
    pub fn write_bank_file(
        dir: &Path,
        instrument_id: &str,
        format: AudioFormat,
        entries: &[(&str, &str)],
    ) {
        let bank: serde_json::Map<String, serde_json::Value> = entries
            .iter()
            .map(|(key, value)| (key.to_string(), serde_json::Value::from(*value)))
            .collect();
        let path = dir.join(format!("{}-{}.json", instrument_id, format.suffix()));
        std::fs::write(path, serde_json::to_vec(&bank).expect("unable to serialize"))
            .expect("unable to write bank");
    }
}
