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

//! Optional output effects.
//!
//! Effects are an opt-in extension. Without a registry the engine plays dry
//! and logs that effects are unavailable. A registry maps effect kinds to
//! factories; the resulting chain processes frames in request order.

use std::collections::HashMap;

use tracing::warn;

/// A frame processor on the render path.
pub trait Effect: Send {
    /// The kind this effect was built from.
    fn name(&self) -> &str;
    /// Processes one multi-channel frame in place.
    fn process(&mut self, frame: &mut [f32]);
}

/// A requested effect and its strength.
#[derive(Clone, Debug, PartialEq)]
pub struct EffectRequest {
    /// The registered effect kind, e.g. "gain" or "delay".
    pub kind: String,
    /// Effect strength in [0, 1].
    pub amount: f32,
}

type EffectFactory = Box<dyn Fn(f32) -> Box<dyn Effect> + Send + Sync>;

/// A registry of effect factories keyed by kind.
#[derive(Default)]
pub struct EffectRegistry {
    factories: HashMap<String, EffectFactory>,
}

impl EffectRegistry {
    pub fn new() -> EffectRegistry {
        EffectRegistry::default()
    }

    /// A registry with the built-in effects.
    pub fn builtin(sample_rate: u32) -> EffectRegistry {
        let mut registry = EffectRegistry::new();
        registry.register("gain", |amount| Box::new(Gain::new(amount)));
        registry.register("delay", move |amount| {
            Box::new(Delay::new(amount, sample_rate))
        });
        registry
    }

    /// Registers a factory under the kind, replacing any existing one.
    pub fn register<F>(&mut self, kind: &str, factory: F)
    where
        F: Fn(f32) -> Box<dyn Effect> + Send + Sync + 'static,
    {
        self.factories.insert(kind.to_string(), Box::new(factory));
    }

    /// Returns true if the kind has a registered factory.
    pub fn has(&self, kind: &str) -> bool {
        self.factories.contains_key(kind)
    }

    /// Builds an ordered chain from the requests. Unknown kinds are logged
    /// and skipped; the rest of the chain still applies.
    pub fn build(&self, requests: &[EffectRequest]) -> Vec<Box<dyn Effect>> {
        let mut chain = Vec::with_capacity(requests.len());
        for request in requests {
            match self.factories.get(&request.kind) {
                Some(factory) => chain.push(factory(request.amount)),
                None => warn!(kind = request.kind, "Unknown effect kind, skipping."),
            }
        }
        chain
    }
}

/// Scales every sample by a fixed factor.
struct Gain {
    amount: f32,
}

impl Gain {
    fn new(amount: f32) -> Gain {
        Gain {
            amount: amount.clamp(0.0, 1.0),
        }
    }
}

impl Effect for Gain {
    fn name(&self) -> &str {
        "gain"
    }

    fn process(&mut self, frame: &mut [f32]) {
        for sample in frame {
            *sample *= self.amount;
        }
    }
}

/// A fixed quarter second feedback delay.
struct Delay {
    mix: f32,
    buffers: Vec<Vec<f32>>,
    pos: usize,
}

impl Delay {
    const DELAY_SECS: f32 = 0.25;
    const FEEDBACK: f32 = 0.4;

    fn new(mix: f32, sample_rate: u32) -> Delay {
        let len = ((sample_rate as f32) * Self::DELAY_SECS) as usize;
        Delay {
            mix: mix.clamp(0.0, 1.0),
            buffers: Vec::new(),
            pos: 0,
        }
        .with_len(len.max(1))
    }

    fn with_len(mut self, len: usize) -> Delay {
        self.buffers = vec![vec![0.0; len]];
        self
    }
}

impl Effect for Delay {
    fn name(&self) -> &str {
        "delay"
    }

    fn process(&mut self, frame: &mut [f32]) {
        // Grow the per-channel buffers to match the stream layout.
        while self.buffers.len() < frame.len() {
            let len = self.buffers[0].len();
            self.buffers.push(vec![0.0; len]);
        }

        for (channel, sample) in frame.iter_mut().enumerate() {
            let buffer = &mut self.buffers[channel];
            let delayed = buffer[self.pos];
            buffer[self.pos] = *sample + delayed * Self::FEEDBACK;
            *sample += delayed * self.mix;
        }
        self.pos = (self.pos + 1) % self.buffers[0].len();
    }
}
