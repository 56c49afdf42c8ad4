use tracing::{debug, info, warn};

use crate::bus::Bus;
use crate::config::AudioConfig;
use crate::device::{AudioBackend, CpalBackend, DeviceSession, SessionState};
use crate::effects::{Effect, EffectBank};
use crate::error::AudioError;
use crate::mixer::{HandleId, HandleState, Mixer, PlaybackHandle};
use crate::track::{MusicComposer, Track};

/// The control surface for all game audio.
///
/// Construct one per process and pass it to whatever owns the game loop.
/// Every playback call is best-effort: unknown names, a suspended device or
/// a missing device turn into logged no-ops, never errors.
pub struct PlaybackController {
    config: AudioConfig,
    session: DeviceSession,
    effects: Option<EffectBank>,
    music: Option<MusicComposer>,
    music_handle: Option<HandleId>,
}

impl PlaybackController {
    pub fn new(config: AudioConfig, backend: Box<dyn AudioBackend>) -> Self {
        let mixer = Mixer::new(config.music_gain, config.effects_gain);
        let session = DeviceSession::new(backend, mixer, config.sample_rate);
        PlaybackController { config, session, effects: None, music: None, music_handle: None }
    }

    /// Controller bound to the default cpal output device.
    pub fn with_default_device(config: AudioConfig) -> Self {
        Self::new(config, Box::new(CpalBackend::new()))
    }

    /// Safe to call any number of times, typically from a user gesture.
    ///
    /// Buffers are not rendered here; each renders on its first play request
    /// (or through [`PlaybackController::prewarm`]).
    pub fn init(&mut self) -> Result<SessionState, AudioError> {
        let state = self.session.init()?;

        if self.effects.is_none() {
            if let Some(rate) = self.session.sample_rate() {
                self.effects = Some(EffectBank::with_seed(rate, self.config.noise_seed));
                self.music = Some(MusicComposer::with_seed(rate, self.config.noise_seed));
            }
        }

        Ok(state)
    }

    /// Render the whole catalogue now instead of on first use.
    pub fn prewarm(&mut self) -> Result<(), AudioError> {
        if let Some(bank) = self.effects.as_mut() {
            for effect in Effect::ALL {
                bank.effect(effect)?;
            }
        }
        if let Some(composer) = self.music.as_mut() {
            for track in Track::ALL {
                composer.track(track)?;
            }
        }
        Ok(())
    }

    pub fn play_effect(&mut self, name: &str) -> Option<HandleId> {
        match name.parse::<Effect>() {
            Ok(effect) => self.play(effect),
            Err(e) => {
                debug!("Ignoring effect request: {}", e);
                None
            }
        }
    }

    /// Fire a one-shot on the effects bus.
    pub fn play(&mut self, effect: Effect) -> Option<HandleId> {
        if !self.session.is_ready() {
            debug!("Audio not ready, dropping effect {}", effect);
            return None;
        }
        let bank = self.effects.as_mut()?;

        match bank.effect(effect) {
            Ok(buffer) => Some(self.session.mixer().start(buffer, Bus::Effects, false)),
            Err(e) => {
                warn!("Could not render effect {}: {}", effect, e);
                None
            }
        }
    }

    pub fn play_music(&mut self, name: &str) -> Option<HandleId> {
        match name.parse::<Track>() {
            Ok(track) => self.play_track(track),
            Err(e) => {
                debug!("Ignoring music request: {}", e);
                None
            }
        }
    }

    /// Loop a track on the music bus, replacing whatever music was playing.
    pub fn play_track(&mut self, track: Track) -> Option<HandleId> {
        if !self.session.is_ready() {
            debug!("Audio not ready, dropping music {}", track);
            return None;
        }
        self.stop_music();
        let composer = self.music.as_mut()?;

        match composer.track(track) {
            Ok(buffer) => {
                let id = self.session.mixer().start(buffer, Bus::Music, true);
                info!("Playing {} music", track);
                self.music_handle = Some(id);
                Some(id)
            }
            Err(e) => {
                warn!("Could not render track {}: {}", track, e);
                None
            }
        }
    }

    /// Stop the live music handle, if any.
    pub fn stop_music(&mut self) {
        if let Some(id) = self.music_handle.take() {
            self.session.mixer().stop(id);
            debug!("Music handle {} stopped", id);
        }
    }

    pub fn set_bus_gain(&mut self, bus: Bus, value: f32) {
        self.session.mixer().set_gain(bus, value);
    }

    /// Muting zeroes both buses. Unmuting returns them to their configured
    /// defaults unless `restore_gain_on_unmute` is set, in which case the
    /// gains from before muting come back.
    pub fn set_muted(&mut self, muted: bool) {
        let mixer = self.session.mixer();
        if muted {
            mixer.mute_all();
        } else {
            mixer.unmute_all(self.config.restore_gain_on_unmute);
        }
    }

    pub fn is_muted(&self) -> bool {
        self.session.mixer().bus(Bus::Music).is_muted()
    }

    pub fn gain(&self, bus: Bus) -> f32 {
        self.session.mixer().gain(bus)
    }

    pub fn session_state(&self) -> SessionState {
        self.session.state()
    }

    pub fn sample_rate(&self) -> Option<u32> {
        self.session.sample_rate()
    }

    /// Mirror a host suspension (tab hidden, focus lost).
    pub fn suspend(&mut self) -> SessionState {
        self.session.suspend()
    }

    pub fn resume(&mut self) -> SessionState {
        self.session.resume()
    }

    /// The live music handle, if music is playing.
    pub fn music_handle(&self) -> Option<HandleId> {
        self.music_handle
            .filter(|&id| self.session.mixer().handle_state(id) == Some(HandleState::Playing))
    }

    pub fn handle_state(&self, id: HandleId) -> Option<HandleState> {
        self.session.mixer().handle_state(id)
    }

    pub fn live_handles(&self) -> Vec<PlaybackHandle> {
        self.session.mixer().live_handles()
    }

    pub fn is_rendered(&self, effect: Effect) -> bool {
        self.effects.as_ref().is_some_and(|bank| bank.is_rendered(effect))
    }

    pub fn is_track_rendered(&self, track: Track) -> bool {
        self.music.as_ref().is_some_and(|composer| composer.is_rendered(track))
    }
}
