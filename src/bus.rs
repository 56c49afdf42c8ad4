use std::fmt;
use std::str::FromStr;

use crate::error::AudioError;

pub const DEFAULT_MUSIC_GAIN: f32 = 0.2;
pub const DEFAULT_EFFECTS_GAIN: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bus {
    Music,
    Effects,
}

impl Bus {
    pub const ALL: [Bus; 2] = [Bus::Music, Bus::Effects];

    pub fn name(&self) -> &'static str {
        match self {
            Bus::Music => "music",
            Bus::Effects => "effects",
        }
    }

    pub(crate) fn index(&self) -> usize {
        match self {
            Bus::Music => 0,
            Bus::Effects => 1,
        }
    }
}

impl fmt::Display for Bus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Bus {
    type Err = AudioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Bus::ALL
            .into_iter()
            .find(|b| b.name() == s)
            .ok_or_else(|| AudioError::UnknownBus(s.to_string()))
    }
}

/// A gain stage. Every write is clamped to [0, 1].
#[derive(Debug, Clone, PartialEq)]
pub struct MixBus {
    gain: f32,
    default_gain: f32,
    pre_mute: Option<f32>,
}

impl MixBus {
    pub fn new(default_gain: f32) -> Self {
        let default_gain = clamp_gain(default_gain);
        MixBus { gain: default_gain, default_gain, pre_mute: None }
    }

    pub fn gain(&self) -> f32 {
        self.gain
    }

    pub fn default_gain(&self) -> f32 {
        self.default_gain
    }

    pub fn is_muted(&self) -> bool {
        self.pre_mute.is_some()
    }

    pub fn set_gain(&mut self, value: f32) {
        self.gain = clamp_gain(value);
    }

    pub fn mute(&mut self) {
        if self.pre_mute.is_none() {
            self.pre_mute = Some(self.gain);
        }
        self.gain = 0.0;
    }

    /// Back to the bus default, or to the gain held before muting when
    /// `restore_previous` is set.
    pub fn unmute(&mut self, restore_previous: bool) {
        let previous = self.pre_mute.take();
        self.gain = match previous {
            Some(gain) if restore_previous => gain,
            _ => self.default_gain,
        };
    }
}

fn clamp_gain(value: f32) -> f32 {
    if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gain_is_clamped_on_every_write() {
        let mut bus = MixBus::new(0.5);
        bus.set_gain(1.7);
        assert_eq!(bus.gain(), 1.0);
        bus.set_gain(-0.3);
        assert_eq!(bus.gain(), 0.0);
        bus.set_gain(f32::NAN);
        assert_eq!(bus.gain(), 0.0);
        assert_eq!(MixBus::new(3.0).gain(), 1.0);
    }

    #[test]
    fn unmute_restores_the_default_not_the_previous_gain() {
        let mut bus = MixBus::new(DEFAULT_MUSIC_GAIN);
        bus.set_gain(0.9);
        bus.mute();
        assert_eq!(bus.gain(), 0.0);
        assert!(bus.is_muted());
        bus.unmute(false);
        assert_eq!(bus.gain(), DEFAULT_MUSIC_GAIN);
        assert!(!bus.is_muted());
    }

    #[test]
    fn unmute_can_restore_the_snapshot() {
        let mut bus = MixBus::new(DEFAULT_EFFECTS_GAIN);
        bus.set_gain(0.7);
        bus.mute();
        bus.mute();
        bus.unmute(true);
        assert_eq!(bus.gain(), 0.7);

        // Never muted: nothing to restore
        bus.unmute(true);
        assert_eq!(bus.gain(), DEFAULT_EFFECTS_GAIN);
    }

    #[test]
    fn bus_names_parse() {
        assert_eq!("music".parse::<Bus>().unwrap(), Bus::Music);
        assert_eq!("effects".parse::<Bus>().unwrap(), Bus::Effects);
        assert!(matches!("voice".parse::<Bus>(), Err(AudioError::UnknownBus(_))));
    }
}
