use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::buffer::SampleBuffer;
use crate::cache::BufferCache;
use crate::error::AudioError;
use crate::recipe::{Recipe, Voice, exp_decay};

const MAJOR_TRIAD: [f64; 3] = [523.25, 659.25, 783.99]; // C5 E5 G5
const MAJOR_ARPEGGIO: [f64; 4] = [523.25, 659.25, 783.99, 1046.50]; // C5 E5 G5 C6

/// The fixed catalogue of one-shot sound effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Effect {
    Click,
    Correct,
    Incorrect,
    Complete,
}

impl Effect {
    pub const ALL: [Effect; 4] = [Effect::Click, Effect::Correct, Effect::Incorrect, Effect::Complete];

    pub fn name(&self) -> &'static str {
        match self {
            Effect::Click => "click",
            Effect::Correct => "correct",
            Effect::Incorrect => "incorrect",
            Effect::Complete => "complete",
        }
    }

    pub fn duration(&self) -> f64 {
        match self {
            Effect::Click => 0.1,
            Effect::Correct => 0.3,
            Effect::Incorrect => 0.2,
            Effect::Complete => 0.5,
        }
    }

    /// Mono recipe; every effect decays as `exp(-t / duration * k)`.
    pub fn recipe(&self) -> Recipe {
        let duration = self.duration();
        match self {
            // Short 1 kHz tick
            Effect::Click => Recipe::mono(duration).voice(Voice::tone(1000.0, exp_decay(duration, 5.0))),

            // Triad entering one voice per third of the buffer
            Effect::Correct => {
                let decay = exp_decay(duration, 2.0);
                let step = duration / MAJOR_TRIAD.len() as f64;
                Recipe::mono(duration).voices(MAJOR_TRIAD.iter().enumerate().map(|(i, &hz)| {
                    let decay = decay.clone();
                    Voice::tone(hz, move |t| 0.3 * decay(t)).starting_at(i as f64 * step)
                }))
            }

            // 200 Hz buzz tremoloed at 5 Hz
            Effect::Incorrect => {
                let decay = exp_decay(duration, 3.0);
                Recipe::mono(duration).voice(Voice::tone(200.0, move |t| {
                    (std::f64::consts::TAU * 5.0 * t).sin() * decay(t)
                }))
            }

            // Arpeggio over the first half of the buffer
            Effect::Complete => {
                let decay = exp_decay(duration, 1.5);
                let step = duration / MAJOR_ARPEGGIO.len() as f64 / 2.0;
                Recipe::mono(duration).voices(MAJOR_ARPEGGIO.iter().enumerate().map(|(i, &hz)| {
                    let decay = decay.clone();
                    Voice::tone(hz, move |t| 0.25 * decay(t)).starting_at(i as f64 * step)
                }))
            }
        }
    }
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Effect {
    type Err = AudioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Effect::ALL
            .into_iter()
            .find(|e| e.name() == s)
            .ok_or_else(|| AudioError::UnknownEffect(s.to_string()))
    }
}

/// Lazily rendered sound effects for one device sample rate.
pub struct EffectBank {
    cache: BufferCache<Effect>,
}

impl EffectBank {
    pub fn new(sample_rate: u32) -> Self {
        Self::with_seed(sample_rate, None)
    }

    pub fn with_seed(sample_rate: u32, noise_seed: Option<u64>) -> Self {
        EffectBank { cache: BufferCache::new(sample_rate, noise_seed) }
    }

    pub fn sample_rate(&self) -> u32 {
        self.cache.sample_rate()
    }

    pub fn get(&mut self, name: &str) -> Result<Arc<SampleBuffer>, AudioError> {
        let effect: Effect = name.parse()?;
        self.effect(effect)
    }

    pub fn effect(&mut self, effect: Effect) -> Result<Arc<SampleBuffer>, AudioError> {
        self.cache.get_or_render(effect, || effect.recipe())
    }

    pub fn is_rendered(&self, effect: Effect) -> bool {
        self.cache.is_cached(effect)
    }
}
