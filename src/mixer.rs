use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::buffer::SampleBuffer;
use crate::bus::{Bus, MixBus};

/// Retired handle states kept for introspection.
const RETIRED_HISTORY: usize = 256;

pub type HandleId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleState {
    Created,
    Playing,
    /// Released by `stop` or superseded by another music request.
    Stopped,
    /// A one-shot reached the end of its buffer.
    Ended,
}

/// One device playback instance of a buffer.
#[derive(Debug, Clone)]
pub struct PlaybackHandle {
    pub id: HandleId,
    pub bus: Bus,
    pub looping: bool,
    pub state: HandleState,
    buffer: Arc<SampleBuffer>,
    position: usize,
}

impl PlaybackHandle {
    pub fn buffer(&self) -> &Arc<SampleBuffer> {
        &self.buffer
    }

    /// Next frame to be rendered.
    pub fn position(&self) -> usize {
        self.position
    }
}

struct MixState {
    buses: [MixBus; 2],
    live: Vec<PlaybackHandle>,
    retired: VecDeque<(HandleId, HandleState)>,
    next_id: HandleId,
}

impl MixState {
    fn retire(&mut self, id: HandleId, state: HandleState) {
        if self.retired.len() == RETIRED_HISTORY {
            self.retired.pop_front();
        }
        self.retired.push_back((id, state));
    }
}

/// Shared mixing state between the control thread and the device callback.
///
/// The callback only ever calls [`Mixer::render_interleaved`]; every other
/// method is a short critical section on the control thread.
#[derive(Clone)]
pub struct Mixer {
    state: Arc<Mutex<MixState>>,
}

impl Mixer {
    pub fn new(music_gain: f32, effects_gain: f32) -> Self {
        Mixer {
            state: Arc::new(Mutex::new(MixState {
                buses: [MixBus::new(music_gain), MixBus::new(effects_gain)],
                live: Vec::new(),
                retired: VecDeque::new(),
                next_id: 1,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MixState> {
        // A panic on the other side leaves plain data behind, still usable.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn bus(&self, bus: Bus) -> MixBus {
        self.lock().buses[bus.index()].clone()
    }

    pub fn gain(&self, bus: Bus) -> f32 {
        self.lock().buses[bus.index()].gain()
    }

    pub fn set_gain(&self, bus: Bus, value: f32) {
        self.lock().buses[bus.index()].set_gain(value);
    }

    pub fn mute_all(&self) {
        for bus in self.lock().buses.iter_mut() {
            bus.mute();
        }
    }

    pub fn unmute_all(&self, restore_previous: bool) {
        for bus in self.lock().buses.iter_mut() {
            bus.unmute(restore_previous);
        }
    }

    /// Creates a handle and starts it in the same critical section, so the
    /// callback never observes a `Created` handle.
    pub fn start(&self, buffer: Arc<SampleBuffer>, bus: Bus, looping: bool) -> HandleId {
        let mut state = self.lock();
        let id = state.next_id;
        state.next_id += 1;

        let mut handle = PlaybackHandle { id, bus, looping, state: HandleState::Created, buffer, position: 0 };
        handle.state = HandleState::Playing;
        state.live.push(handle);
        id
    }

    /// Stops a live handle. Returns false if it was not live.
    pub fn stop(&self, id: HandleId) -> bool {
        let mut state = self.lock();
        match state.live.iter().position(|h| h.id == id) {
            Some(index) => {
                state.live.swap_remove(index);
                state.retire(id, HandleState::Stopped);
                true
            }
            None => false,
        }
    }

    pub fn handle_state(&self, id: HandleId) -> Option<HandleState> {
        let state = self.lock();
        state
            .live
            .iter()
            .find(|h| h.id == id)
            .map(|h| h.state)
            .or_else(|| state.retired.iter().rev().find(|(rid, _)| *rid == id).map(|(_, s)| *s))
    }

    /// Snapshot of every live handle.
    pub fn live_handles(&self) -> Vec<PlaybackHandle> {
        self.lock().live.clone()
    }

    pub fn live_count(&self, bus: Bus) -> usize {
        self.lock().live.iter().filter(|h| h.bus == bus).count()
    }

    /// Mix every live handle into an interleaved output block.
    ///
    /// Mono buffers feed every output channel; stereo buffers feed the first
    /// two and repeat the right channel beyond that. One-shots that reach
    /// their end are retired as `Ended`. The mix is clamped to [-1, 1].
    pub fn render_interleaved(&self, out: &mut [f32], channels: usize) {
        out.fill(0.0);
        if channels == 0 {
            return;
        }

        let mut guard = self.lock();
        let state = &mut *guard;
        if state.live.is_empty() {
            return;
        }

        let gains = [state.buses[0].gain(), state.buses[1].gain()];
        let mut ended = Vec::new();

        for handle in state.live.iter_mut() {
            let gain = gains[handle.bus.index()];
            let frames = handle.buffer.frames();

            for frame in out.chunks_mut(channels) {
                if handle.position >= frames {
                    if handle.looping {
                        handle.position = 0;
                    } else {
                        break;
                    }
                }
                for (c, sample) in frame.iter_mut().enumerate() {
                    *sample += handle.buffer.sample(c, handle.position) * gain;
                }
                handle.position += 1;
            }

            if !handle.looping && handle.position >= frames {
                handle.state = HandleState::Ended;
                ended.push(handle.id);
            }
        }

        if !ended.is_empty() {
            state.live.retain(|h| h.state != HandleState::Ended);
            for id in ended {
                state.retire(id, HandleState::Ended);
            }
        }

        for sample in out.iter_mut() {
            *sample = sample.clamp(-1.0, 1.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(frames: usize) -> Arc<SampleBuffer> {
        let samples = (0..frames).map(|i| (i + 1) as f32 / 100.0).collect();
        Arc::new(SampleBuffer::new(1000, vec![samples]).unwrap())
    }

    #[test]
    fn one_shot_ends_after_its_buffer() {
        let mixer = Mixer::new(1.0, 1.0);
        let id = mixer.start(ramp(4), Bus::Effects, false);
        assert_eq!(mixer.handle_state(id), Some(HandleState::Playing));

        let mut out = [0.0f32; 6];
        mixer.render_interleaved(&mut out, 2);
        assert_eq!(mixer.handle_state(id), Some(HandleState::Playing));
        assert_eq!(out, [0.01, 0.01, 0.02, 0.02, 0.03, 0.03]);

        mixer.render_interleaved(&mut out, 2);
        assert_eq!(out[..2], [0.04, 0.04]);
        assert_eq!(out[2..], [0.0; 4]);
        assert_eq!(mixer.handle_state(id), Some(HandleState::Ended));
        assert!(mixer.live_handles().is_empty());
    }

    #[test]
    fn looping_handle_wraps() {
        let mixer = Mixer::new(1.0, 1.0);
        let id = mixer.start(ramp(3), Bus::Music, true);
        let mut out = [0.0f32; 5];
        mixer.render_interleaved(&mut out, 1);
        assert_eq!(out, [0.01, 0.02, 0.03, 0.01, 0.02]);
        assert_eq!(mixer.handle_state(id), Some(HandleState::Playing));
    }

    #[test]
    fn bus_gain_scales_its_handles_only() {
        let mixer = Mixer::new(0.5, 0.0);
        mixer.start(ramp(2), Bus::Music, true);
        mixer.start(ramp(2), Bus::Effects, false);
        let mut out = [0.0f32; 2];
        mixer.render_interleaved(&mut out, 1);
        assert_eq!(out, [0.005, 0.01]);
    }

    #[test]
    fn stopped_handle_renders_nothing_further() {
        let mixer = Mixer::new(1.0, 1.0);
        let id = mixer.start(ramp(8), Bus::Music, true);
        assert!(mixer.stop(id));
        assert!(!mixer.stop(id));
        assert_eq!(mixer.handle_state(id), Some(HandleState::Stopped));

        let mut out = [1.0f32; 4];
        mixer.render_interleaved(&mut out, 2);
        assert_eq!(out, [0.0; 4]);
    }

    #[test]
    fn mix_is_clamped() {
        let loud = Arc::new(SampleBuffer::new(1000, vec![vec![0.9; 4]]).unwrap());
        let mixer = Mixer::new(1.0, 1.0);
        mixer.start(Arc::clone(&loud), Bus::Effects, false);
        mixer.start(loud, Bus::Effects, false);
        let mut out = [0.0f32; 2];
        mixer.render_interleaved(&mut out, 1);
        assert_eq!(out, [1.0, 1.0]);
    }

    #[test]
    fn unknown_handle_has_no_state() {
        let mixer = Mixer::new(1.0, 1.0);
        assert_eq!(mixer.handle_state(42), None);
    }

    #[test]
    fn mute_and_unmute_all_buses() {
        let mixer = Mixer::new(0.2, 0.5);
        mixer.set_gain(Bus::Music, 0.8);
        mixer.mute_all();
        assert_eq!(mixer.gain(Bus::Music), 0.0);
        assert_eq!(mixer.gain(Bus::Effects), 0.0);
        mixer.unmute_all(false);
        assert_eq!(mixer.gain(Bus::Music), 0.2);
        assert_eq!(mixer.gain(Bus::Effects), 0.5);
    }
}
