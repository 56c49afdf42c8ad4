use std::time::Instant;

use tracing::debug;

use crate::buffer::SampleBuffer;
use crate::error::AudioError;
use crate::recipe::Recipe;

/// Renders recipes into sample buffers at a fixed sample rate.
///
/// The noise source is owned by the synthesizer. A seeded synthesizer is
/// fully reproducible, an unseeded one only for recipes without noise.
pub struct Synthesizer {
    sample_rate: u32,
    rng: fastrand::Rng,
}

impl Synthesizer {
    pub fn new(sample_rate: u32) -> Self {
        Synthesizer { sample_rate, rng: fastrand::Rng::new() }
    }

    pub fn with_seed(sample_rate: u32, seed: u64) -> Self {
        Synthesizer { sample_rate, rng: fastrand::Rng::with_seed(seed) }
    }

    pub fn from_seed(sample_rate: u32, seed: Option<u64>) -> Self {
        match seed {
            Some(seed) => Self::with_seed(sample_rate, seed),
            None => Self::new(sample_rate),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn render(&mut self, recipe: &Recipe) -> Result<SampleBuffer, AudioError> {
        if self.sample_rate == 0 {
            return Err(AudioError::UnsupportedConfiguration("sample rate must be non-zero".to_string()));
        }
        if recipe.channels == 0 || recipe.channels > 2 {
            return Err(AudioError::UnsupportedConfiguration(format!(
                "{} channels requested, only mono and stereo are supported",
                recipe.channels
            )));
        }
        if recipe.spread.is_some() && recipe.channels != 2 {
            return Err(AudioError::UnsupportedConfiguration("stereo spread needs two channels".to_string()));
        }

        let frames = recipe.frame_count(self.sample_rate);
        if frames == 0 {
            return Err(AudioError::UnsupportedConfiguration(format!(
                "{}s at {} Hz produces no samples",
                recipe.duration, self.sample_rate
            )));
        }

        let started = Instant::now();
        let rate = self.sample_rate as f64;
        let headroom = recipe.headroom;

        // Channel 0 must be complete before channel 1 reads from it.
        let mut left = vec![0.0f32; frames];
        for (i, s) in left.iter_mut().enumerate() {
            let t = i as f64 / rate;
            *s = (recipe.dry_sample(t, &mut self.rng) * headroom) as f32;
        }

        let mut channels = vec![left];
        if recipe.channels == 2 {
            let left = &channels[0];
            let mut right = vec![0.0f32; frames];

            for (i, s) in right.iter_mut().enumerate() {
                let t = i as f64 / rate;
                let dry = recipe.dry_sample(t, &mut self.rng);
                *s = match &recipe.spread {
                    Some(spread) => {
                        let tap = ((t - (spread.delay)(t)) * rate).floor() as i64;
                        let tap = tap.rem_euclid(frames as i64) as usize;
                        (headroom * (spread.dry * dry + spread.feedback * left[tap] as f64)) as f32
                    }
                    None => (headroom * dry) as f32,
                };
            }
            channels.push(right);
        }

        debug!(
            "Rendered {} frames x {} channels at {} Hz in {:?}",
            frames,
            recipe.channels,
            self.sample_rate,
            started.elapsed()
        );

        SampleBuffer::new(self.sample_rate, channels)
    }
}

/// Render with a seedless noise source.
pub fn render(recipe: &Recipe, sample_rate: u32) -> Result<SampleBuffer, AudioError> {
    Synthesizer::new(sample_rate).render(recipe)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recipe::{NoiseBurst, StereoSpread, Voice, exp_decay};

    fn beep() -> Recipe {
        Recipe::mono(0.25).voice(Voice::tone(440.0, exp_decay(0.25, 3.0)))
    }

    #[test]
    fn sample_count_matches_rounded_duration() {
        for rate in [8000, 22050, 44100, 48000] {
            let buf = render(&beep(), rate).unwrap();
            assert_eq!(buf.frames(), (0.25 * rate as f64).round() as usize);
            assert_eq!(buf.sample_rate(), rate);
        }
    }

    #[test]
    fn zero_length_is_unsupported() {
        let err = render(&Recipe::mono(0.0), 44100).unwrap_err();
        assert!(matches!(err, AudioError::UnsupportedConfiguration(_)));

        let err = render(&beep(), 0).unwrap_err();
        assert!(matches!(err, AudioError::UnsupportedConfiguration(_)));
    }

    #[test]
    fn spread_on_mono_is_rejected() {
        let recipe = beep().spread(StereoSpread::fixed(0.9, 0.3, 0.02));
        assert!(matches!(render(&recipe, 44100), Err(AudioError::UnsupportedConfiguration(_))));
    }

    #[test]
    fn tonal_render_is_bit_identical() {
        let a = render(&beep(), 44100).unwrap();
        let b = render(&beep(), 44100).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn seeded_noise_is_reproducible() {
        let recipe = Recipe::mono(0.1).noise(NoiseBurst::new(|_| 0.4));
        let a = Synthesizer::with_seed(8000, 42).render(&recipe).unwrap();
        let b = Synthesizer::with_seed(8000, 42).render(&recipe).unwrap();
        let c = Synthesizer::with_seed(8000, 43).render(&recipe).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.peak() <= 0.2 * 0.9 + 1e-6);
    }

    #[test]
    fn headroom_scales_output() {
        let recipe = Recipe::mono(0.01).voice(Voice::tone(100.0, |_| 1.0)).headroom(0.5);
        let buf = render(&recipe, 8000).unwrap();
        assert!(buf.peak() <= 0.5 + 1e-6);
        assert!(buf.peak() > 0.45);
    }

    #[test]
    fn spread_taps_the_left_channel_circularly() {
        // Silent dry path isolates the feedback tap.
        let recipe = Recipe::stereo(1.25)
            .voice(Voice::tone(1.0, |_| 1.0))
            .spread(StereoSpread::fixed(0.0, 1.0, 0.25))
            .headroom(1.0);
        let buf = render(&recipe, 8).unwrap();
        let left = buf.channel(0);
        let right = buf.channel(1);
        assert_eq!(buf.frames(), 10);
        assert_eq!(right[5], left[3]);
        // Wraps to the tail of the left channel at the start.
        assert_eq!(right[0], left[8]);
    }

    #[test]
    fn stereo_without_spread_duplicates_tonal_content() {
        let recipe = Recipe::stereo(0.05).voice(Voice::tone(220.0, |_| 0.5));
        let buf = render(&recipe, 8000).unwrap();
        assert_eq!(buf.channel(0), buf.channel(1));
    }
}
