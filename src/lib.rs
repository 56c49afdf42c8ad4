pub mod error;
pub mod buffer;
pub mod recipe;
pub mod synth;
pub mod cache;
pub mod effects;
pub mod track;
pub mod bus;
pub mod mixer;
pub mod device;
pub mod config;
pub mod engine;

pub use error::AudioError;
pub use buffer::SampleBuffer;
pub use recipe::{Curve, NoiseBurst, Recipe, StereoSpread, Voice};
pub use synth::{Synthesizer, render};
pub use effects::{Effect, EffectBank};
pub use track::{MusicComposer, Track};
pub use bus::{Bus, MixBus, DEFAULT_EFFECTS_GAIN, DEFAULT_MUSIC_GAIN};
pub use mixer::{HandleId, HandleState, Mixer, PlaybackHandle};
pub use device::{AudioBackend, CpalBackend, DeviceSession, OfflineBackend, OfflineDevice, SessionState};
pub use config::AudioConfig;
pub use engine::PlaybackController;
