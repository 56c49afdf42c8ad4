use std::f64::consts::{PI, TAU};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::buffer::SampleBuffer;
use crate::cache::BufferCache;
use crate::error::AudioError;
use crate::recipe::{NoiseBurst, Recipe, StereoSpread, Voice, looped};

/// Looping background music.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Track {
    Gameplay,
    Menu,
}

impl Track {
    pub const ALL: [Track; 2] = [Track::Gameplay, Track::Menu];

    pub fn name(&self) -> &'static str {
        match self {
            Track::Gameplay => "gameplay",
            Track::Menu => "menu",
        }
    }

    /// Loop period in seconds.
    pub fn duration(&self) -> f64 {
        match self {
            Track::Gameplay => gameplay::LOOP,
            Track::Menu => menu::LOOP,
        }
    }

    pub fn recipe(&self) -> Recipe {
        match self {
            Track::Gameplay => gameplay::recipe(),
            Track::Menu => menu::recipe(),
        }
    }
}

impl fmt::Display for Track {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Track {
    type Err = AudioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Track::ALL
            .into_iter()
            .find(|t| t.name() == s)
            .ok_or_else(|| AudioError::UnknownTrack(s.to_string()))
    }
}

/// Index of the step containing `pos`, and the fraction of it already played.
fn step_at(pos: f64, lengths: &[f64]) -> (usize, f64) {
    let mut start = 0.0;
    for (i, &len) in lengths.iter().enumerate() {
        if pos < start + len {
            return (i, (pos - start) / len);
        }
        start += len;
    }
    // Float residue at the very end of the pattern.
    (lengths.len() - 1, 1.0)
}

/// Bright C major loop for the quiz itself.
///
/// 150 BPM puts exactly 20 beats (5 measures) in the 8 s loop, so every
/// rhythmic layer lines up at the wrap point.
mod gameplay {
    use super::*;

    pub const LOOP: f64 = 8.0;
    const TEMPO: f64 = 150.0;
    const BEAT: f64 = 60.0 / TEMPO;
    const MEASURE: f64 = BEAT * 4.0;
    const CHORD_LEN: f64 = 2.0;
    const HEADROOM: f64 = 0.8;

    const SCALE: [f64; 8] = [261.63, 293.66, 329.63, 349.23, 392.00, 440.00, 493.88, 523.25]; // C4-C5
    const MELODY: [usize; 8] = [0, 2, 4, 5, 7, 5, 4, 2];
    pub(super) const RHYTHM: [f64; 8] = [0.75, 0.25, 0.5, 0.5, 0.75, 0.25, 0.5, 0.5]; // beats

    const C: [f64; 3] = [261.63, 329.63, 392.00];
    const F: [f64; 3] = [349.23, 440.00, 523.25];
    const G: [f64; 3] = [392.00, 493.88, 587.33];
    const PROGRESSION: [[f64; 3]; 4] = [C, F, G, C];

    fn chord_at(t: f64) -> [f64; 3] {
        PROGRESSION[(t / CHORD_LEN) as usize % PROGRESSION.len()].map(|hz| looped(hz, LOOP))
    }

    pub fn recipe() -> Recipe {
        let scale = SCALE.map(|hz| looped(hz, LOOP));
        let rhythm: Arc<[f64]> = RHYTHM.iter().map(|b| b * BEAT).collect();

        let melody = {
            let rhythm = Arc::clone(&rhythm);
            let pitch_rhythm = Arc::clone(&rhythm);
            Voice::new(
                move |t| scale[MELODY[step_at(t % MEASURE, &pitch_rhythm).0]],
                move |t| {
                    let (_, u) = step_at(t % MEASURE, &rhythm);
                    0.2 * (PI * u).sin() * (1.0 - 0.3 * u)
                },
            )
        };

        // High C glint for the first eighth-second of every two seconds
        let sparkle = Voice::tone(looped(SCALE[7] * 2.0, LOOP), |t| {
            if (t * 8.0).floor() as u64 % 16 == 0 { 0.1 * (-(t % 0.125) * 20.0).exp() } else { 0.0 }
        });

        // Chord tones stepped every sixteenth across a two-beat cell
        let arpeggio = Voice::new(
            |t| {
                let step = ((t % (BEAT * 2.0)) / (BEAT / 4.0)).floor() as usize % 3;
                chord_at(t)[step]
            },
            |_| 0.15,
        );

        let bass = Voice::new(|t| looped(PROGRESSION[(t / CHORD_LEN) as usize % 4][0] / 2.0, LOOP), |_| 0.12);

        let kick = Voice::tone(60.0, |t| {
            let in_beat = t % BEAT;
            if in_beat < 0.05 { 0.3 * (-in_beat * 30.0).exp() } else { 0.0 }
        });

        let snare = NoiseBurst::new(|t| {
            if (t + BEAT * 2.0) % (BEAT * 4.0) < 0.05 { 0.2 * (-(t % BEAT) * 40.0).exp() } else { 0.0 }
        });

        Recipe::stereo(LOOP)
            .voices([melody, sparkle, arpeggio, bass, kick])
            .noise(snare)
            .spread(StereoSpread::fixed(0.9, 0.3, 0.02))
            .headroom(HEADROOM)
    }
}

/// Pentatonic opening theme for the menus.
///
/// Two 6 s phrases per 12 s loop: an ascending intro for the first half of
/// each phrase, then a fixed melody. The phrase is 6 s rather than 8 s so it
/// divides the loop and the seam lands on a phrase boundary.
mod menu {
    use super::*;

    pub const LOOP: f64 = 12.0;
    const PHRASE: f64 = 6.0;
    const INTRO: f64 = PHRASE / 2.0;
    const CHORD_LEN: f64 = 3.0;
    const NOTE: f64 = 0.25;
    const CHORUS_RATE: f64 = 0.75; // Hz, nine sweeps per loop
    const HEADROOM: f64 = 0.7;

    const PENTATONIC: [f64; 6] = [261.63, 293.66, 329.63, 392.00, 440.00, 523.25]; // C D E G A C
    const THEME: [usize; 15] = [4, 3, 2, 3, 4, 4, 4, 2, 3, 3, 3, 1, 2, 2, 2];

    const C: [f64; 4] = [261.63, 329.63, 392.00, 523.25];
    const AM: [f64; 4] = [220.00, 261.63, 329.63, 440.00];
    const F: [f64; 4] = [174.61, 261.63, 349.23, 440.00];
    const G: [f64; 4] = [196.00, 293.66, 392.00, 493.88];
    const PROGRESSION: [[f64; 4]; 4] = [C, AM, F, G];

    const GLOCKENSPIEL: f64 = 1046.50;
    const TIMPANI: f64 = 82.41; // E2

    fn intro_pitch(p: f64) -> f64 {
        looped(PENTATONIC[(p * 2.0) as usize % PENTATONIC.len()], LOOP)
    }

    fn intro_envelope(t: f64) -> f64 {
        let p = t % PHRASE;
        if p < INTRO { 0.3 * (1.0 - (-p * 5.0).exp()) * (-p * 0.5).exp() } else { 0.0 }
    }

    fn glock_envelope(t: f64) -> f64 {
        if (t * 2.0).floor() as u64 % 8 == 0 { (-(t % 0.5) * 10.0).exp() } else { 0.0 }
    }

    pub fn recipe() -> Recipe {
        let intro = Voice::new(|t| intro_pitch(t % PHRASE), intro_envelope);
        let intro_octave = Voice::new(|t| 2.0 * intro_pitch(t % PHRASE), |t| 0.3 * intro_envelope(t));

        let theme = Voice::new(
            |t| {
                let q = (t % PHRASE - INTRO).max(0.0);
                looped(PENTATONIC[THEME[(q / NOTE) as usize % THEME.len()]], LOOP)
            },
            |t| {
                let p = t % PHRASE;
                if p < INTRO { 0.0 } else { 0.25 * (PI * ((p - INTRO) % NOTE) / NOTE).sin() }
            },
        );

        // Sustained chord with a slow swell
        let chord = (0..4).map(|k| {
            Voice::new(
                move |t| looped(PROGRESSION[(t / CHORD_LEN) as usize % 4][k], LOOP),
                |t| 0.08 * (1.0 + 0.3 * (TAU * 0.5 * t).sin()),
            )
        });

        // Bell: fundamental plus a third harmonic
        let glock = Voice::tone(looped(GLOCKENSPIEL, LOOP), |t| 0.15 * glock_envelope(t));
        let glock_partial = Voice::tone(looped(GLOCKENSPIEL * 3.0, LOOP), |t| 0.05 * glock_envelope(t));

        // Rolled accent at each phrase start
        let timpani = Voice::tone(looped(TIMPANI, LOOP), |t| {
            let p = t % PHRASE;
            if p < 0.5 && (t * 32.0).floor() as u64 % 2 == 0 { 0.2 * (-p * 10.0).exp() } else { 0.0 }
        });

        Recipe::stereo(LOOP)
            .voices([intro, intro_octave, theme])
            .voices(chord)
            .voices([glock, glock_partial, timpani])
            .spread(StereoSpread::modulated(0.85, 0.4, |t| 0.015 + 0.005 * (TAU * CHORUS_RATE * t).sin()))
            .headroom(HEADROOM)
    }
}

/// Lazily rendered music loops for one device sample rate.
pub struct MusicComposer {
    cache: BufferCache<Track>,
}

impl MusicComposer {
    pub fn new(sample_rate: u32) -> Self {
        Self::with_seed(sample_rate, None)
    }

    pub fn with_seed(sample_rate: u32, noise_seed: Option<u64>) -> Self {
        MusicComposer { cache: BufferCache::new(sample_rate, noise_seed) }
    }

    pub fn sample_rate(&self) -> u32 {
        self.cache.sample_rate()
    }

    pub fn get(&mut self, name: &str) -> Result<Arc<SampleBuffer>, AudioError> {
        let track: Track = name.parse()?;
        self.track(track)
    }

    pub fn track(&mut self, track: Track) -> Result<Arc<SampleBuffer>, AudioError> {
        self.cache.get_or_render(track, || track.recipe())
    }

    pub fn is_rendered(&self, track: Track) -> bool {
        self.cache.is_cached(track)
    }
}
