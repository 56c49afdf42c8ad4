use thiserror::Error;

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("Unsupported configuration: {0}")]
    UnsupportedConfiguration(String),

    /// No audio output capability on the host.
    #[error("Audio device unavailable: {0}")]
    DeviceUnavailable(String),

    /// Host policy refused to resume the device; retried on the next `init()`.
    #[error("Audio resume denied: {0}")]
    ResumeDenied(String),

    #[error("Unknown effect: {0}")]
    UnknownEffect(String),

    #[error("Unknown track: {0}")]
    UnknownTrack(String),

    #[error("Unknown bus: {0}")]
    UnknownBus(String),

    #[error("Audio stream error: {0}")]
    Stream(String),

    #[error("File error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Wav error: {0}")]
    Wav(#[from] hound::Error),
}
