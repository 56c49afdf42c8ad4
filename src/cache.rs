use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;

use tracing::debug;

use crate::buffer::SampleBuffer;
use crate::error::AudioError;
use crate::recipe::Recipe;
use crate::synth::Synthesizer;

/// Memoizes rendered buffers per recipe key for one sample rate.
///
/// A key renders at most once for the lifetime of the cache; a failed render
/// is not cached and is attempted again on the next request.
pub struct BufferCache<K> {
    synth: Synthesizer,
    buffers: HashMap<K, Arc<SampleBuffer>>,
}

impl<K: Copy + Eq + Hash + Debug> BufferCache<K> {
    pub fn new(sample_rate: u32, noise_seed: Option<u64>) -> Self {
        BufferCache {
            synth: Synthesizer::from_seed(sample_rate, noise_seed),
            buffers: HashMap::new(),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.synth.sample_rate()
    }

    pub fn get_or_render<F>(&mut self, key: K, recipe: F) -> Result<Arc<SampleBuffer>, AudioError>
    where
        F: FnOnce() -> Recipe,
    {
        if let Some(buffer) = self.buffers.get(&key) {
            return Ok(Arc::clone(buffer));
        }

        debug!("Rendering {:?} at {} Hz", key, self.sample_rate());
        let buffer = Arc::new(self.synth.render(&recipe())?);
        self.buffers.insert(key, Arc::clone(&buffer));
        Ok(buffer)
    }

    pub fn is_cached(&self, key: K) -> bool {
        self.buffers.contains_key(&key)
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }
}
