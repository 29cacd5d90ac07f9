//! Audio clips.
//!
//! An [`AudioClip`] is a shared, immutable reference to an audio resource.
//! Cloning is cheap and two clips compare equal only when they refer to the
//! same underlying resource, the way engine object references behave.
//! Code that needs to match clips across separate loads compares
//! [`AudioClip::name`] instead.

use std::fmt;
use std::sync::Arc;

/// Decoded audio payload of a clip.
#[derive(Debug)]
pub enum ClipData {
    /// Interleaved PCM samples.
    Samples {
        /// Interleaved f32 samples.
        samples: Arc<Vec<f32>>,
        /// Sample rate in Hz.
        sample_rate: u32,
        /// Channel count.
        channels: u16,
    },
    /// No audible data; used by headless hosts and tests.
    Silent,
}

#[derive(Debug)]
struct ClipInner {
    name: String,
    length: f32,
    data: ClipData,
}

/// Shared reference to an audio resource.
#[derive(Clone)]
pub struct AudioClip {
    inner: Arc<ClipInner>,
}

impl AudioClip {
    /// Creates a clip from decoded samples. Length is derived from the data.
    #[must_use]
    pub fn from_samples(
        name: impl Into<String>,
        samples: Vec<f32>,
        sample_rate: u32,
        channels: u16,
    ) -> Self {
        let frames = samples.len() / usize::from(channels.max(1));
        let length = if sample_rate == 0 {
            0.0
        } else {
            frames as f32 / sample_rate as f32
        };

        Self {
            inner: Arc::new(ClipInner {
                name: name.into(),
                length,
                data: ClipData::Samples {
                    samples: Arc::new(samples),
                    sample_rate,
                    channels,
                },
            }),
        }
    }

    /// Creates a silent clip of the given length in seconds. Negative or
    /// non-finite lengths give an empty clip.
    #[must_use]
    pub fn silent(name: impl Into<String>, length: f32) -> Self {
        let length = if length.is_finite() { length.max(0.0) } else { 0.0 };
        Self {
            inner: Arc::new(ClipInner {
                name: name.into(),
                length,
                data: ClipData::Silent,
            }),
        }
    }

    /// Clip name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Natural length in seconds.
    #[must_use]
    pub fn length(&self) -> f32 {
        self.inner.length
    }

    /// Audio payload.
    #[must_use]
    pub fn data(&self) -> &ClipData {
        &self.inner.data
    }

    /// Whether `self` and `other` have the same name.
    #[must_use]
    pub fn same_name(&self, other: &Self) -> bool {
        self.inner.name == other.inner.name
    }
}

impl PartialEq for AudioClip {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for AudioClip {}

impl fmt::Debug for AudioClip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioClip")
            .field("name", &self.inner.name)
            .field("length", &self.inner.length)
            .finish_non_exhaustive()
    }
}

/// A named clip in an asset list.
#[derive(Debug, Clone)]
pub struct AudioAsset {
    /// Logical name used for lookup.
    pub name: String,
    /// The clip.
    pub clip: AudioClip,
}

impl AudioAsset {
    /// Creates an asset named after its clip.
    #[must_use]
    pub fn from_clip(clip: AudioClip) -> Self {
        Self {
            name: clip.name().to_string(),
            clip,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_equality() {
        let a = AudioClip::silent("theme", 10.0);
        let a2 = a.clone();
        let b = AudioClip::silent("theme", 10.0);

        assert_eq!(a, a2);
        assert_ne!(a, b);
        assert!(a.same_name(&b));
    }

    #[test]
    fn test_length_from_samples() {
        // 1 second of stereo at 100 Hz
        let clip = AudioClip::from_samples("beep", vec![0.0; 200], 100, 2);
        assert!((clip.length() - 1.0).abs() < f32::EPSILON);
        assert!(matches!(clip.data(), ClipData::Samples { channels: 2, .. }));
    }

    #[test]
    fn test_silent_length_not_negative() {
        let clip = AudioClip::silent("nothing", -3.0);
        assert!(clip.length().abs() < f32::EPSILON);
    }

    #[test]
    fn test_silent_length_must_be_finite() {
        for length in [f32::INFINITY, f32::NEG_INFINITY, f32::NAN] {
            let clip = AudioClip::silent("broken", length);
            assert!(clip.length().abs() < f32::EPSILON);
        }
    }

    #[test]
    fn test_asset_from_clip() {
        let asset = AudioAsset::from_clip(AudioClip::silent("TickTock", 1.0));
        assert_eq!(asset.name, "TickTock");
    }
}
