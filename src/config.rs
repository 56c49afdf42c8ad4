use crate::bus::{DEFAULT_EFFECTS_GAIN, DEFAULT_MUSIC_GAIN};

#[derive(Debug, Clone, PartialEq)]
pub struct AudioConfig {
    /// Music bus gain at startup and after unmute.
    pub music_gain: f32,
    /// Effects bus gain at startup and after unmute.
    pub effects_gain: f32,
    /// Seed for percussion noise. `None` draws a fresh seed per session.
    pub noise_seed: Option<u64>,
    /// Overrides the device's preferred sample rate.
    pub sample_rate: Option<u32>,
    /// Unmute restores the gains held before muting instead of the defaults.
    pub restore_gain_on_unmute: bool,
}

impl Default for AudioConfig {
    fn default() -> Self {
        AudioConfig {
            music_gain: DEFAULT_MUSIC_GAIN,
            effects_gain: DEFAULT_EFFECTS_GAIN,
            noise_seed: None,
            sample_rate: None,
            restore_gain_on_unmute: false,
        }
    }
}

impl AudioConfig {
    pub fn with_music_gain(mut self, gain: f32) -> Self {
        self.music_gain = gain;
        self
    }

    pub fn with_effects_gain(mut self, gain: f32) -> Self {
        self.effects_gain = gain;
        self
    }

    pub fn with_noise_seed(mut self, seed: u64) -> Self {
        self.noise_seed = Some(seed);
        self
    }

    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = Some(sample_rate);
        self
    }

    pub fn with_restore_gain_on_unmute(mut self, restore: bool) -> Self {
        self.restore_gain_on_unmute = restore;
        self
    }
}
