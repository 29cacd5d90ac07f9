//! Error types for Cadence.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type for audio operations.
#[derive(Debug, Error)]
pub enum AudioError {
    /// Failed to open the output device.
    #[error("Failed to initialize audio device: {0}")]
    DeviceInitFailed(String),

    /// Failed to create a playback channel on the device.
    #[error("Failed to create playback handle: {0}")]
    HandleCreationFailed(String),

    /// No asset with the given logical name.
    #[error("Audio asset not found: {0}")]
    AssetNotFound(String),

    /// No clip could be resolved at the given resource path.
    #[error("Audio clip '{name}' not found under {root}")]
    ResourceNotFound {
        /// Requested resource name.
        name: String,
        /// Resource root that was searched.
        root: PathBuf,
    },

    /// Failed to decode audio data.
    #[error("Failed to decode audio '{path}': {message}")]
    DecodeFailed {
        /// Source of the data.
        path: PathBuf,
        /// Decoder message.
        message: String,
    },

    /// Persistent preference storage failed.
    #[error("Preference store error: {0}")]
    Preferences(String),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for audio operations.
pub type AudioResult<T> = Result<T, AudioError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AudioError::AssetNotFound("BGMusic1".to_string());
        assert!(err.to_string().contains("BGMusic1"));

        let err = AudioError::ResourceNotFound {
            name: "tick".to_string(),
            root: PathBuf::from("assets/Resources"),
        };
        let msg = err.to_string();
        assert!(msg.contains("tick"));
        assert!(msg.contains("assets/Resources"));
    }
}
