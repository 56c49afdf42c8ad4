use std::io::{Cursor, Seek, Write};
use std::path::Path;

use crate::error::AudioError;

/// A rendered, immutable block of audio.
///
/// Channels are stored planar (one `Vec` per channel). Buffers are handed
/// out as `Arc<SampleBuffer>` so every playback handle shares the same
/// samples read-only.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleBuffer {
    sample_rate: u32,
    channels: Vec<Vec<f32>>,
}

impl SampleBuffer {
    pub fn new(sample_rate: u32, channels: Vec<Vec<f32>>) -> Result<Self, AudioError> {
        if sample_rate == 0 {
            return Err(AudioError::UnsupportedConfiguration("sample rate must be non-zero".to_string()));
        }
        if channels.is_empty() || channels.len() > 2 {
            return Err(AudioError::UnsupportedConfiguration(format!(
                "{} channels requested, only mono and stereo are supported",
                channels.len()
            )));
        }
        let frames = channels[0].len();
        if frames == 0 {
            return Err(AudioError::UnsupportedConfiguration("buffer has no samples".to_string()));
        }
        if channels.iter().any(|c| c.len() != frames) {
            return Err(AudioError::UnsupportedConfiguration("channel lengths differ".to_string()));
        }

        Ok(SampleBuffer { sample_rate, channels })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Number of frames (samples per channel).
    pub fn frames(&self) -> usize {
        self.channels[0].len()
    }

    /// Length in seconds.
    pub fn duration(&self) -> f32 {
        self.frames() as f32 / self.sample_rate as f32
    }

    pub fn channel(&self, index: usize) -> &[f32] {
        &self.channels[index]
    }

    /// Sample for an output channel. Mono buffers feed every output channel.
    #[inline]
    pub fn sample(&self, channel: usize, frame: usize) -> f32 {
        let c = channel.min(self.channels.len() - 1);
        self.channels[c][frame]
    }

    /// Largest absolute sample value across all channels.
    pub fn peak(&self) -> f32 {
        self.channels
            .iter()
            .flat_map(|c| c.iter())
            .fold(0.0f32, |max, s| max.max(s.abs()))
    }

    pub fn write_wav<P: AsRef<Path>>(&self, path: P) -> Result<(), AudioError> {
        let mut writer = hound::WavWriter::create(path, self.wav_spec())?;
        self.write_frames(&mut writer)?;
        writer.finalize()?;
        Ok(())
    }

    /// Encode as an in-memory 16-bit PCM WAV file.
    pub fn to_wav_bytes(&self) -> Result<Vec<u8>, AudioError> {
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, self.wav_spec())?;
            self.write_frames(&mut writer)?;
            writer.finalize()?;
        }
        Ok(cursor.into_inner())
    }

    fn wav_spec(&self) -> hound::WavSpec {
        hound::WavSpec {
            channels: self.channels.len() as u16,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        }
    }

    fn write_frames<W: Write + Seek>(&self, writer: &mut hound::WavWriter<W>) -> Result<(), AudioError> {
        for frame in 0..self.frames() {
            for channel in &self.channels {
                let s = (channel[frame].clamp(-1.0, 1.0) * 32767.0) as i16;
                writer.write_sample(s)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_and_mismatched_channels() {
        assert!(SampleBuffer::new(44100, vec![]).is_err());
        assert!(SampleBuffer::new(44100, vec![vec![]]).is_err());
        assert!(SampleBuffer::new(44100, vec![vec![0.0; 4], vec![0.0; 3]]).is_err());
        assert!(SampleBuffer::new(0, vec![vec![0.0; 4]]).is_err());
        assert!(SampleBuffer::new(44100, vec![vec![0.0; 4]; 3]).is_err());
    }

    #[test]
    fn mono_feeds_every_output_channel() {
        let buf = SampleBuffer::new(8000, vec![vec![0.25, -0.5]]).unwrap();
        assert_eq!(buf.sample(0, 1), -0.5);
        assert_eq!(buf.sample(1, 1), -0.5);
        assert_eq!(buf.peak(), 0.5);
    }

    #[test]
    fn wav_bytes_read_back_with_hound() {
        let buf = SampleBuffer::new(22050, vec![vec![0.0, 0.5, -0.5, 1.0], vec![0.1; 4]]).unwrap();
        let bytes = buf.to_wav_bytes().unwrap();

        let reader = hound::WavReader::new(Cursor::new(bytes)).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 2);
        assert_eq!(spec.sample_rate, 22050);
        assert_eq!(reader.len(), 8);
    }
}
