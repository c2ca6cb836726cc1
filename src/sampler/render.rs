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

//! The render side of the sampler.
//!
//! The engine schedules work by sending commands over a channel; the audio
//! callback drains them, mixes the sounding voices into the output buffer,
//! applies the effect chain, and advances the sample clock. Nothing on this
//! path blocks.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

use crossbeam_channel::Receiver;
use parking_lot::Mutex;

use super::decode::AudioData;
use super::effects::Effect;
use crate::audio;

/// Monotonic engine time, counted in samples rendered since the stream
/// started. Readable from any thread.
#[derive(Debug)]
pub struct SampleClock {
    pos: AtomicU64,
    sample_rate: u32,
}

impl SampleClock {
    pub fn new(sample_rate: u32) -> SampleClock {
        SampleClock {
            pos: AtomicU64::new(0),
            sample_rate,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// The current engine time in samples.
    pub fn now_samples(&self) -> u64 {
        self.pos.load(Ordering::SeqCst)
    }

    /// The current engine time in seconds.
    pub fn now_secs(&self) -> f64 {
        self.now_samples() as f64 / self.sample_rate as f64
    }

    /// Converts a duration in seconds to samples.
    pub fn secs_to_samples(&self, secs: f64) -> u64 {
        (secs.max(0.0) * self.sample_rate as f64).round() as u64
    }

    /// Advances the clock by a rendered buffer's worth of frames.
    pub fn advance(&self, frames: u64) {
        self.pos.fetch_add(frames, Ordering::SeqCst);
    }
}

/// A pending gain ramp on a voice.
#[derive(Clone, Copy, Debug)]
struct Fade {
    /// The gain the ramp starts from, or the voice's scheduled gain.
    start_value: Option<f32>,
    /// When the ramp begins, in samples.
    at: u64,
    /// When the voice reaches silence, in samples.
    silent_at: u64,
    /// When the voice is dropped, in samples.
    stop_at: u64,
}

/// Work sent from the engine to the audio callback.
pub enum RenderCommand {
    /// Start playing decoded audio at the given time and gain.
    Start {
        id: u64,
        data: Arc<AudioData>,
        gain: f32,
        start_at: u64,
    },
    /// Ramp the voice to silence and drop it.
    Fade {
        id: u64,
        start_value: Option<f32>,
        at: u64,
        silent_at: u64,
        stop_at: u64,
    },
    /// Drop the voice at the given time with no ramp.
    StopAt { id: u64, at: u64 },
    /// Store a new master volume once the clock reaches the given time.
    SetVolume { value: u8, at: u64 },
    /// Replace the output effect chain.
    SetEffects(Vec<Box<dyn Effect>>),
}

struct RenderVoice {
    data: Arc<AudioData>,
    gain: f32,
    start_at: u64,
    fade: Option<Fade>,
    stop_at: Option<u64>,
}

impl RenderVoice {
    /// The voice gain at the given engine time, following the pending ramp.
    fn gain_at(&self, now: u64) -> f32 {
        match self.fade {
            None => self.gain,
            Some(fade) => {
                if now < fade.at {
                    return self.gain;
                }
                if now >= fade.silent_at {
                    return 0.0;
                }
                let base = fade.start_value.unwrap_or(self.gain);
                let span = (fade.silent_at - fade.at) as f32;
                let elapsed = (now - fade.at) as f32;
                base * (1.0 - elapsed / span)
            }
        }
    }

    /// Whether the voice can be dropped at the given engine time.
    fn finished_at(&self, now: u64) -> bool {
        if let Some(stop_at) = self.stop_at {
            if now >= stop_at {
                return true;
            }
        }
        if let Some(fade) = self.fade {
            if now >= fade.stop_at {
                return true;
            }
        }
        // Out of samples with no pending ramp.
        self.fade.is_none()
            && self.stop_at.is_none()
            && now >= self.start_at + self.data.samples.len() as u64
    }

    /// The mono sample the voice contributes at the given engine time.
    fn sample_at(&self, now: u64) -> f32 {
        if now < self.start_at {
            return 0.0;
        }
        let offset = (now - self.start_at) as usize;
        self.data.samples.get(offset).copied().unwrap_or(0.0)
    }
}

struct RenderState {
    voices: HashMap<u64, RenderVoice>,
    effects: Vec<Box<dyn Effect>>,
    volume_changes: Vec<(u64, u8)>,
}

/// Mixes scheduled voices into output buffers.
///
/// Shared with the output device as the stream's render callback.
pub struct Renderer {
    clock: Arc<SampleClock>,
    rx: Receiver<RenderCommand>,
    master_volume: Arc<AtomicU8>,
    state: Mutex<RenderState>,
}

impl Renderer {
    pub fn new(
        clock: Arc<SampleClock>,
        rx: Receiver<RenderCommand>,
        master_volume: Arc<AtomicU8>,
    ) -> Renderer {
        Renderer {
            clock,
            rx,
            master_volume,
            state: Mutex::new(RenderState {
                voices: HashMap::new(),
                effects: Vec::new(),
                volume_changes: Vec::new(),
            }),
        }
    }

    fn apply(state: &mut RenderState, command: RenderCommand) {
        match command {
            RenderCommand::Start {
                id,
                data,
                gain,
                start_at,
            } => {
                state.voices.insert(
                    id,
                    RenderVoice {
                        data,
                        gain,
                        start_at,
                        fade: None,
                        stop_at: None,
                    },
                );
            }
            RenderCommand::Fade {
                id,
                start_value,
                at,
                silent_at,
                stop_at,
            } => {
                if let Some(voice) = state.voices.get_mut(&id) {
                    voice.fade = Some(Fade {
                        start_value,
                        at,
                        silent_at,
                        stop_at,
                    });
                }
            }
            RenderCommand::StopAt { id, at } => {
                if let Some(voice) = state.voices.get_mut(&id) {
                    voice.stop_at = Some(at);
                }
            }
            RenderCommand::SetVolume { value, at } => state.volume_changes.push((at, value)),
            RenderCommand::SetEffects(effects) => state.effects = effects,
        }
    }

    /// The number of voices currently held by the render state.
    pub fn voice_count(&self) -> usize {
        self.state.lock().voices.len()
    }
}

impl audio::Render for Renderer {
    fn render(&self, buf: &mut [f32], channels: u16) {
        buf.fill(0.0);

        let mut state = self.state.lock();
        while let Ok(command) = self.rx.try_recv() {
            Self::apply(&mut state, command);
        }

        let channels = usize::from(channels).max(1);
        let start = self.clock.now_samples();
        let frames = (buf.len() / channels) as u64;

        for (frame_index, frame) in buf.chunks_mut(channels).enumerate() {
            let now = start + frame_index as u64;

            for voice in state.voices.values() {
                if voice.finished_at(now) {
                    continue;
                }
                let sample = voice.sample_at(now) * voice.gain_at(now);
                if sample != 0.0 {
                    for out in frame.iter_mut() {
                        *out += sample;
                    }
                }
            }

            for effect in state.effects.iter_mut() {
                effect.process(frame);
            }
        }

        let end = start + frames;
        state.voices.retain(|_, voice| !voice.finished_at(end));
        state.volume_changes.retain(|&(at, value)| {
            if at <= end {
                self.master_volume.store(value, Ordering::SeqCst);
                false
            } else {
                true
            }
        });

        self.clock.advance(frames);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::Render;

    fn renderer() -> (Arc<SampleClock>, crossbeam_channel::Sender<RenderCommand>, Renderer) {
        let clock = Arc::new(SampleClock::new(44100));
        let (tx, rx) = crossbeam_channel::unbounded();
        let renderer = Renderer::new(clock.clone(), rx, Arc::new(AtomicU8::new(127)));
        (clock, tx, renderer)
    }

    fn constant_audio(value: f32, len: usize) -> Arc<AudioData> {
        Arc::new(AudioData {
            samples: vec![value; len],
            sample_rate: 44100,
        })
    }

    #[test]
    fn test_clock_advances_with_rendering() {
        let (clock, _tx, renderer) = renderer();
        let mut buf = vec![0.0f32; 512];

        renderer.render(&mut buf, 2);
        assert_eq!(clock.now_samples(), 256);

        renderer.render(&mut buf, 2);
        assert_eq!(clock.now_samples(), 512);
    }

    #[test]
    fn test_started_voice_is_mixed_to_all_channels() {
        let (_clock, tx, renderer) = renderer();
        tx.send(RenderCommand::Start {
            id: 1,
            data: constant_audio(0.25, 1024),
            gain: 1.0,
            start_at: 0,
        })
        .unwrap();

        let mut buf = vec![0.0f32; 8];
        renderer.render(&mut buf, 2);
        assert!(buf.iter().all(|&s| (s - 0.25).abs() < 1e-6));
    }

    #[test]
    fn test_gain_scales_output() {
        let (_clock, tx, renderer) = renderer();
        tx.send(RenderCommand::Start {
            id: 1,
            data: constant_audio(1.0, 1024),
            gain: 0.5,
            start_at: 0,
        })
        .unwrap();

        let mut buf = vec![0.0f32; 4];
        renderer.render(&mut buf, 1);
        assert!(buf.iter().all(|&s| (s - 0.5).abs() < 1e-6));
    }

    #[test]
    fn test_future_start_is_silent_until_due() {
        let (_clock, tx, renderer) = renderer();
        tx.send(RenderCommand::Start {
            id: 1,
            data: constant_audio(1.0, 1024),
            gain: 1.0,
            start_at: 4,
        })
        .unwrap();

        let mut buf = vec![0.0f32; 8];
        renderer.render(&mut buf, 1);
        assert_eq!(&buf[..4], &[0.0; 4]);
        assert!(buf[4..].iter().all(|&s| (s - 1.0).abs() < 1e-6));
    }

    #[test]
    fn test_fade_ramps_to_silence_and_drops_voice() {
        let (_clock, tx, renderer) = renderer();
        tx.send(RenderCommand::Start {
            id: 1,
            data: constant_audio(1.0, 44100),
            gain: 1.0,
            start_at: 0,
        })
        .unwrap();
        tx.send(RenderCommand::Fade {
            id: 1,
            start_value: None,
            at: 0,
            silent_at: 8,
            stop_at: 8,
        })
        .unwrap();

        let mut buf = vec![0.0f32; 8];
        renderer.render(&mut buf, 1);

        // Linear ramp from 1.0 at sample 0 down toward 0.0 at sample 8.
        assert!((buf[0] - 1.0).abs() < 1e-6);
        assert!((buf[4] - 0.5).abs() < 1e-6);
        assert!(buf[7] < buf[1]);
        assert_eq!(renderer.voice_count(), 0);
    }

    #[test]
    fn test_stop_at_drops_voice() {
        let (_clock, tx, renderer) = renderer();
        tx.send(RenderCommand::Start {
            id: 1,
            data: constant_audio(1.0, 44100),
            gain: 1.0,
            start_at: 0,
        })
        .unwrap();
        tx.send(RenderCommand::StopAt { id: 1, at: 4 }).unwrap();

        let mut buf = vec![0.0f32; 8];
        renderer.render(&mut buf, 1);
        assert!(buf[..4].iter().all(|&s| (s - 1.0).abs() < 1e-6));
        assert_eq!(&buf[4..], &[0.0; 4]);
        assert_eq!(renderer.voice_count(), 0);
    }

    #[test]
    fn test_effects_apply_in_order() {
        use crate::sampler::effects::{EffectRegistry, EffectRequest};

        let (_clock, tx, renderer) = renderer();
        let registry = EffectRegistry::builtin(44100);
        let chain = registry.build(&[EffectRequest {
            kind: "gain".to_string(),
            amount: 0.5,
        }]);

        tx.send(RenderCommand::Start {
            id: 1,
            data: constant_audio(1.0, 1024),
            gain: 1.0,
            start_at: 0,
        })
        .unwrap();
        tx.send(RenderCommand::SetEffects(chain)).unwrap();

        let mut buf = vec![0.0f32; 4];
        renderer.render(&mut buf, 1);
        assert!(buf.iter().all(|&s| (s - 0.5).abs() < 1e-6));
    }

    #[test]
    fn test_volume_change_waits_for_its_engine_time() {
        let (_clock, tx, renderer) = renderer();
        tx.send(RenderCommand::SetVolume { value: 30, at: 600 }).unwrap();

        let mut buf = vec![0.0f32; 512];
        renderer.render(&mut buf, 1);
        assert_eq!(renderer.master_volume.load(Ordering::SeqCst), 127);

        renderer.render(&mut buf, 1);
        assert_eq!(renderer.master_volume.load(Ordering::SeqCst), 30);
    }

    #[test]
    fn test_voice_drops_when_samples_exhausted() {
        let (_clock, tx, renderer) = renderer();
        tx.send(RenderCommand::Start {
            id: 1,
            data: constant_audio(1.0, 4),
            gain: 1.0,
            start_at: 0,
        })
        .unwrap();

        let mut buf = vec![0.0f32; 8];
        renderer.render(&mut buf, 1);
        assert_eq!(renderer.voice_count(), 0);
        assert_eq!(&buf[4..], &[0.0; 4]);
    }
}
