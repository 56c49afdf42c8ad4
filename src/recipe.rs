use std::f64::consts::TAU;
use std::fmt;
use std::sync::Arc;

/// A function of recipe time in seconds.
pub type Curve = Arc<dyn Fn(f64) -> f64 + Send + Sync>;

/// Headroom applied when a recipe does not set its own.
pub const DEFAULT_HEADROOM: f64 = 0.9;

pub fn constant(value: f64) -> Curve {
    Arc::new(move |_| value)
}

/// `exp(-t / duration * k)`, the decay shared by every one-shot effect.
pub fn exp_decay(duration: f64, k: f64) -> impl Fn(f64) -> f64 + Send + Sync + Clone {
    move |t| (-t / duration * k).exp()
}

/// Nearest frequency completing a whole number of cycles over `period` seconds.
pub fn looped(hz: f64, period: f64) -> f64 {
    (hz * period).round() / period
}

/// One sine oscillator.
///
/// `frequency` and `envelope` are evaluated on recipe time. The oscillator
/// phase runs from the voice's own start, so a voice with an offset enters
/// at zero phase. Before its offset the voice is silent.
#[derive(Clone)]
pub struct Voice {
    pub frequency: Curve,
    pub envelope: Curve,
    pub offset: f64,
}

impl Voice {
    pub fn new<F, E>(frequency: F, envelope: E) -> Self
    where
        F: Fn(f64) -> f64 + Send + Sync + 'static,
        E: Fn(f64) -> f64 + Send + Sync + 'static,
    {
        Voice { frequency: Arc::new(frequency), envelope: Arc::new(envelope), offset: 0.0 }
    }

    /// Fixed-pitch voice.
    pub fn tone<E>(hz: f64, envelope: E) -> Self
    where
        E: Fn(f64) -> f64 + Send + Sync + 'static,
    {
        Voice { frequency: constant(hz), envelope: Arc::new(envelope), offset: 0.0 }
    }

    pub fn starting_at(mut self, offset: f64) -> Self {
        self.offset = offset;
        self
    }

    #[inline]
    pub fn sample(&self, t: f64) -> f64 {
        if t < self.offset {
            return 0.0;
        }
        let amp = (self.envelope)(t);
        if amp == 0.0 {
            return 0.0;
        }
        amp * (TAU * (self.frequency)(t) * (t - self.offset)).sin()
    }
}

impl fmt::Debug for Voice {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Voice").field("offset", &self.offset).finish_non_exhaustive()
    }
}

/// Gated white noise. The envelope doubles as the gate: zero means silent.
#[derive(Clone)]
pub struct NoiseBurst {
    pub envelope: Curve,
}

impl NoiseBurst {
    pub fn new<E>(envelope: E) -> Self
    where
        E: Fn(f64) -> f64 + Send + Sync + 'static,
    {
        NoiseBurst { envelope: Arc::new(envelope) }
    }

    #[inline]
    pub fn sample(&self, t: f64, rng: &mut fastrand::Rng) -> f64 {
        let amp = (self.envelope)(t);
        if amp == 0.0 {
            return 0.0;
        }
        (rng.f64() - 0.5) * amp
    }
}

impl fmt::Debug for NoiseBurst {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("NoiseBurst").finish_non_exhaustive()
    }
}

/// Channel 1 variation for stereo width:
/// `right = headroom * (dry * mix(t) + feedback * left[t - delay(t)])`.
///
/// The left channel is read circularly so the tap stays continuous across
/// the loop point.
#[derive(Clone)]
pub struct StereoSpread {
    pub dry: f64,
    pub feedback: f64,
    pub delay: Curve,
}

impl StereoSpread {
    pub fn fixed(dry: f64, feedback: f64, delay: f64) -> Self {
        StereoSpread { dry, feedback, delay: constant(delay) }
    }

    /// Chorus-style spread whose delay is itself a curve.
    pub fn modulated<D>(dry: f64, feedback: f64, delay: D) -> Self
    where
        D: Fn(f64) -> f64 + Send + Sync + 'static,
    {
        StereoSpread { dry, feedback, delay: Arc::new(delay) }
    }
}

impl fmt::Debug for StereoSpread {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("StereoSpread")
            .field("dry", &self.dry)
            .field("feedback", &self.feedback)
            .finish_non_exhaustive()
    }
}

/// Declarative description of a sound. Stateless; rendering it twice with
/// the same sample rate and noise seed gives the same buffer.
#[derive(Debug, Clone)]
pub struct Recipe {
    pub duration: f64,
    pub channels: u16,
    pub voices: Vec<Voice>,
    pub noise: Vec<NoiseBurst>,
    pub spread: Option<StereoSpread>,
    pub headroom: f64,
}

impl Recipe {
    pub fn mono(duration: f64) -> Self {
        Recipe {
            duration,
            channels: 1,
            voices: Vec::new(),
            noise: Vec::new(),
            spread: None,
            headroom: DEFAULT_HEADROOM,
        }
    }

    pub fn stereo(duration: f64) -> Self {
        Recipe { channels: 2, ..Recipe::mono(duration) }
    }

    pub fn voice(mut self, voice: Voice) -> Self {
        self.voices.push(voice);
        self
    }

    pub fn voices<I: IntoIterator<Item = Voice>>(mut self, voices: I) -> Self {
        self.voices.extend(voices);
        self
    }

    pub fn noise(mut self, burst: NoiseBurst) -> Self {
        self.noise.push(burst);
        self
    }

    pub fn spread(mut self, spread: StereoSpread) -> Self {
        self.spread = Some(spread);
        self
    }

    pub fn headroom(mut self, headroom: f64) -> Self {
        self.headroom = headroom;
        self
    }

    /// `round(duration * sample_rate)`.
    pub fn frame_count(&self, sample_rate: u32) -> usize {
        let frames = (self.duration * sample_rate as f64).round();
        if frames.is_finite() && frames > 0.0 { frames as usize } else { 0 }
    }

    pub fn has_noise(&self) -> bool {
        !self.noise.is_empty()
    }

    /// Sum of the oscillator voices at `t`, before headroom.
    pub fn tonal_sample(&self, t: f64) -> f64 {
        self.voices.iter().map(|v| v.sample(t)).sum()
    }

    /// Everything the recipe contributes at `t`, before headroom and spread.
    pub fn dry_sample(&self, t: f64, rng: &mut fastrand::Rng) -> f64 {
        let mut sample = self.tonal_sample(t);
        for burst in &self.noise {
            sample += burst.sample(t, rng);
        }
        sample
    }
}
