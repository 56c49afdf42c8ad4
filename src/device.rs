use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tracing::{debug, error, info, warn};

use crate::error::AudioError;
use crate::mixer::Mixer;

/// Lifecycle of the process-wide audio output connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Initializing,
    Ready,
    Suspended,
    /// No output device; every playback call is a no-op from here on.
    Failed,
}

/// The seam between the session and a real (or simulated) output device.
pub trait AudioBackend {
    /// Connect to the device and route its callback through `mixer`.
    /// The connection starts suspended. Returns the device sample rate.
    fn open(&mut self, mixer: Mixer, sample_rate: Option<u32>) -> Result<u32, AudioError>;

    fn resume(&mut self) -> Result<(), AudioError>;

    fn suspend(&mut self) -> Result<(), AudioError>;

    /// True while the device is not pulling samples, whoever caused it.
    fn is_suspended(&self) -> bool;
}

/// Owns the device connection and the mixer that feeds it.
pub struct DeviceSession {
    state: SessionState,
    backend: Box<dyn AudioBackend>,
    mixer: Mixer,
    requested_rate: Option<u32>,
    sample_rate: Option<u32>,
    failure: Option<String>,
}

impl DeviceSession {
    pub fn new(backend: Box<dyn AudioBackend>, mixer: Mixer, requested_rate: Option<u32>) -> Self {
        DeviceSession {
            state: SessionState::Uninitialized,
            backend,
            mixer,
            requested_rate,
            sample_rate: None,
            failure: None,
        }
    }

    /// Current state. Host-driven suspension and resumption show up here
    /// without any call into the session.
    pub fn state(&self) -> SessionState {
        match self.state {
            SessionState::Ready if self.backend.is_suspended() => SessionState::Suspended,
            SessionState::Suspended if !self.backend.is_suspended() => SessionState::Ready,
            state => state,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.state() == SessionState::Ready
    }

    pub fn sample_rate(&self) -> Option<u32> {
        self.sample_rate
    }

    pub fn mixer(&self) -> &Mixer {
        &self.mixer
    }

    /// Opens the device on first call and tries to resume it on every call.
    ///
    /// A denied resume is not an error: the session stays `Suspended` and the
    /// next call tries again. A missing device fails once with a warning and
    /// keeps failing quietly.
    pub fn init(&mut self) -> Result<SessionState, AudioError> {
        match self.state {
            SessionState::Failed => {
                let reason = self.failure.clone().unwrap_or_default();
                return Err(AudioError::DeviceUnavailable(reason));
            }
            SessionState::Uninitialized => {
                self.state = SessionState::Initializing;
                match self.backend.open(self.mixer.clone(), self.requested_rate) {
                    Ok(rate) => {
                        info!("Audio device opened at {} Hz", rate);
                        self.sample_rate = Some(rate);
                        self.state = SessionState::Suspended;
                    }
                    Err(e) => {
                        warn!("Audio disabled: {}", e);
                        self.failure = Some(e.to_string());
                        self.state = SessionState::Failed;
                        return Err(e);
                    }
                }
            }
            _ => {}
        }

        if self.state() == SessionState::Ready {
            self.state = SessionState::Ready;
            return Ok(SessionState::Ready);
        }
        Ok(self.resume())
    }

    /// Attempts to resume an opened session. Never fails; a denial is logged.
    pub fn resume(&mut self) -> SessionState {
        if !matches!(self.state, SessionState::Ready | SessionState::Suspended) {
            return self.state;
        }
        match self.backend.resume() {
            Ok(()) => {
                debug!("Audio device resumed");
                self.state = SessionState::Ready;
            }
            Err(e) => {
                warn!("Audio resume failed, will retry on next init: {}", e);
                self.state = SessionState::Suspended;
            }
        }
        self.state()
    }

    pub fn suspend(&mut self) -> SessionState {
        if self.state() == SessionState::Ready {
            match self.backend.suspend() {
                Ok(()) => self.state = SessionState::Suspended,
                Err(e) => warn!("Audio suspend failed: {}", e),
            }
        }
        self.state()
    }
}

/// Output through the default cpal host device.
pub struct CpalBackend {
    stream: Option<cpal::Stream>,
    suspended: bool,
    lost: Arc<AtomicBool>,
}

impl CpalBackend {
    pub fn new() -> Self {
        CpalBackend { stream: None, suspended: true, lost: Arc::new(AtomicBool::new(false)) }
    }
}

impl Default for CpalBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn stream_error(lost: Arc<AtomicBool>) -> impl FnMut(cpal::StreamError) + Send + 'static {
    move |err| {
        error!("Audio stream error: {}", err);
        if matches!(err, cpal::StreamError::DeviceNotAvailable) {
            lost.store(true, Ordering::Relaxed);
        }
    }
}

impl AudioBackend for CpalBackend {
    fn open(&mut self, mixer: Mixer, sample_rate: Option<u32>) -> Result<u32, AudioError> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| AudioError::DeviceUnavailable("No output device found".to_string()))?;
        let supported = device
            .default_output_config()
            .map_err(|e| AudioError::DeviceUnavailable(e.to_string()))?;

        let format = supported.sample_format();
        let mut config: cpal::StreamConfig = supported.config();
        if let Some(rate) = sample_rate {
            config.sample_rate = cpal::SampleRate(rate);
        }
        let channels = config.channels as usize;
        let rate = config.sample_rate.0;

        let stream = match format {
            cpal::SampleFormat::F32 => device.build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    mixer.render_interleaved(data, channels);
                },
                stream_error(Arc::clone(&self.lost)),
                None,
            ),
            cpal::SampleFormat::I16 => {
                let mut scratch: Vec<f32> = vec![0.0; 4096];
                device.build_output_stream(
                    &config,
                    move |data: &mut [i16], _: &cpal::OutputCallbackInfo| {
                        if scratch.len() < data.len() {
                            scratch.resize(data.len(), 0.0);
                        }
                        let block = &mut scratch[..data.len()];
                        mixer.render_interleaved(block, channels);
                        for (out, &s) in data.iter_mut().zip(block.iter()) {
                            *out = (s * 32767.0) as i16;
                        }
                    },
                    stream_error(Arc::clone(&self.lost)),
                    None,
                )
            }
            cpal::SampleFormat::U16 => {
                let mut scratch: Vec<f32> = vec![0.0; 4096];
                device.build_output_stream(
                    &config,
                    move |data: &mut [u16], _: &cpal::OutputCallbackInfo| {
                        if scratch.len() < data.len() {
                            scratch.resize(data.len(), 0.0);
                        }
                        let block = &mut scratch[..data.len()];
                        mixer.render_interleaved(block, channels);
                        for (out, &s) in data.iter_mut().zip(block.iter()) {
                            *out = (s * 32767.0 + 32768.0) as u16;
                        }
                    },
                    stream_error(Arc::clone(&self.lost)),
                    None,
                )
            }
            other => {
                return Err(AudioError::DeviceUnavailable(format!("Unsupported sample format: {:?}", other)));
            }
        }
        .map_err(|e| AudioError::DeviceUnavailable(e.to_string()))?;

        debug!("Audio stream built: {} channels, {:?}", channels, format);
        self.stream = Some(stream);
        self.suspended = true;
        Ok(rate)
    }

    fn resume(&mut self) -> Result<(), AudioError> {
        if self.lost.load(Ordering::Relaxed) {
            return Err(AudioError::DeviceUnavailable("Output device disconnected".to_string()));
        }
        let stream = self
            .stream
            .as_ref()
            .ok_or_else(|| AudioError::Stream("Stream not open".to_string()))?;
        stream.play().map_err(|e| AudioError::ResumeDenied(e.to_string()))?;
        self.suspended = false;
        Ok(())
    }

    fn suspend(&mut self) -> Result<(), AudioError> {
        if let Some(stream) = &self.stream {
            stream.pause().map_err(|e| AudioError::Stream(e.to_string()))?;
        }
        self.suspended = true;
        Ok(())
    }

    fn is_suspended(&self) -> bool {
        self.suspended || self.lost.load(Ordering::Relaxed)
    }
}

struct OfflineState {
    sample_rate: u32,
    channels: usize,
    available: bool,
    denials_left: u32,
    suspended: bool,
    mixer: Option<Mixer>,
}

/// A device with no hardware behind it.
///
/// Frames only move when pulled through an [`OfflineDevice`], which makes
/// playback timing fully controllable for headless rendering and tests.
pub struct OfflineBackend {
    shared: Arc<Mutex<OfflineState>>,
}

/// Host-side view of an [`OfflineBackend`]: pulls frames and plays the
/// part of the host policy (suspension, resume denial).
#[derive(Clone)]
pub struct OfflineDevice {
    shared: Arc<Mutex<OfflineState>>,
}

fn lock_state(shared: &Arc<Mutex<OfflineState>>) -> MutexGuard<'_, OfflineState> {
    shared.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl OfflineBackend {
    pub fn new(sample_rate: u32) -> Self {
        OfflineBackend {
            shared: Arc::new(Mutex::new(OfflineState {
                sample_rate,
                channels: 2,
                available: true,
                denials_left: 0,
                suspended: true,
                mixer: None,
            })),
        }
    }

    /// Behaves like a host with no audio output at all.
    pub fn unavailable(self) -> Self {
        lock_state(&self.shared).available = false;
        self
    }

    /// Refuse the next `count` resume attempts.
    pub fn denying_resume(self, count: u32) -> Self {
        lock_state(&self.shared).denials_left = count;
        self
    }

    pub fn device(&self) -> OfflineDevice {
        OfflineDevice { shared: Arc::clone(&self.shared) }
    }
}

impl AudioBackend for OfflineBackend {
    fn open(&mut self, mixer: Mixer, sample_rate: Option<u32>) -> Result<u32, AudioError> {
        let mut state = lock_state(&self.shared);
        if !state.available {
            return Err(AudioError::DeviceUnavailable("Offline device disabled".to_string()));
        }
        if let Some(rate) = sample_rate {
            state.sample_rate = rate;
        }
        state.mixer = Some(mixer);
        state.suspended = true;
        Ok(state.sample_rate)
    }

    fn resume(&mut self) -> Result<(), AudioError> {
        let mut state = lock_state(&self.shared);
        if state.denials_left > 0 {
            state.denials_left -= 1;
            return Err(AudioError::ResumeDenied("Blocked by host policy".to_string()));
        }
        state.suspended = false;
        Ok(())
    }

    fn suspend(&mut self) -> Result<(), AudioError> {
        lock_state(&self.shared).suspended = true;
        Ok(())
    }

    fn is_suspended(&self) -> bool {
        lock_state(&self.shared).suspended
    }
}

impl OfflineDevice {
    pub fn sample_rate(&self) -> u32 {
        lock_state(&self.shared).sample_rate
    }

    pub fn channels(&self) -> usize {
        lock_state(&self.shared).channels
    }

    /// Pull `frames` interleaved frames. Silence while suspended or unopened,
    /// and playback does not advance.
    pub fn pull(&self, frames: usize) -> Vec<f32> {
        let (mixer, channels) = {
            let state = lock_state(&self.shared);
            if state.suspended {
                return vec![0.0; frames * state.channels];
            }
            match &state.mixer {
                Some(mixer) => (mixer.clone(), state.channels),
                None => return vec![0.0; frames * state.channels],
            }
        };

        let mut out = vec![0.0; frames * channels];
        mixer.render_interleaved(&mut out, channels);
        out
    }

    /// Pull enough frames to cover `seconds` of playback.
    pub fn advance(&self, seconds: f32) -> Vec<f32> {
        let frames = (seconds * self.sample_rate() as f32).ceil() as usize;
        self.pull(frames)
    }

    /// Host-driven suspension (tab hidden, policy change).
    pub fn suspend(&self) {
        lock_state(&self.shared).suspended = true;
    }

    /// Host-driven resumption.
    pub fn resume(&self) {
        lock_state(&self.shared).suspended = false;
    }

    pub fn is_suspended(&self) -> bool {
        lock_state(&self.shared).suspended
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(backend: OfflineBackend) -> DeviceSession {
        DeviceSession::new(Box::new(backend), Mixer::new(0.2, 0.5), None)
    }

    #[test]
    fn init_opens_and_resumes() {
        let mut s = session(OfflineBackend::new(48000));
        assert_eq!(s.state(), SessionState::Uninitialized);
        assert_eq!(s.init().unwrap(), SessionState::Ready);
        assert_eq!(s.sample_rate(), Some(48000));
        assert!(s.is_ready());
    }

    #[test]
    fn init_is_idempotent() {
        let mut s = session(OfflineBackend::new(44100));
        s.init().unwrap();
        assert_eq!(s.init().unwrap(), SessionState::Ready);
        assert_eq!(s.init().unwrap(), SessionState::Ready);
    }

    #[test]
    fn requested_rate_overrides_device_rate() {
        let mut s = DeviceSession::new(Box::new(OfflineBackend::new(44100)), Mixer::new(0.2, 0.5), Some(22050));
        s.init().unwrap();
        assert_eq!(s.sample_rate(), Some(22050));
    }

    #[test]
    fn denied_resume_is_retried_on_next_init() {
        let mut s = session(OfflineBackend::new(44100).denying_resume(1));
        assert_eq!(s.init().unwrap(), SessionState::Suspended);
        assert!(!s.is_ready());
        assert_eq!(s.init().unwrap(), SessionState::Ready);
    }

    #[test]
    fn missing_device_fails_and_stays_failed() {
        let mut s = session(OfflineBackend::new(44100).unavailable());
        assert!(matches!(s.init(), Err(AudioError::DeviceUnavailable(_))));
        assert_eq!(s.state(), SessionState::Failed);
        assert!(matches!(s.init(), Err(AudioError::DeviceUnavailable(_))));
        assert_eq!(s.sample_rate(), None);
    }

    #[test]
    fn host_suspension_is_observed() {
        let backend = OfflineBackend::new(44100);
        let device = backend.device();
        let mut s = session(backend);
        s.init().unwrap();

        device.suspend();
        assert_eq!(s.state(), SessionState::Suspended);
        device.resume();
        assert_eq!(s.state(), SessionState::Ready);

        assert_eq!(s.suspend(), SessionState::Suspended);
        assert!(device.is_suspended());
        assert_eq!(s.resume(), SessionState::Ready);
    }

    #[test]
    fn resume_before_open_does_nothing() {
        let mut s = session(OfflineBackend::new(44100));
        assert_eq!(s.resume(), SessionState::Uninitialized);
    }

    #[test]
    fn suspended_device_pulls_silence() {
        let backend = OfflineBackend::new(8000);
        let device = backend.device();
        assert_eq!(device.pull(4), vec![0.0; 8]);
        assert_eq!(device.advance(0.5).len(), 8000);
    }
}
