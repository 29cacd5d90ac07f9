//! Playback backend abstraction.
//!
//! A backend owns a set of playback channels, each addressed by a
//! [`HandleId`]. Operations on a stale or unknown handle are ignored (and
//! getters return neutral values) so the tick loop above never has to
//! handle a failure for a channel that was already torn down.

use cadence_common::{clamp01, AudioClip, AudioResult, HandleId};

/// Transport state of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    /// Not playing; position is kept.
    #[default]
    Stopped,
    /// Playing.
    Playing,
    /// Paused; `resume` continues from the current position.
    Paused,
}

impl PlaybackState {
    /// Whether audio is being produced.
    #[must_use]
    pub const fn is_playing(self) -> bool {
        matches!(self, Self::Playing)
    }
}

/// Per-channel properties shared by every backend implementation.
#[derive(Debug, Clone)]
pub struct ChannelState {
    /// Assigned clip.
    pub clip: Option<AudioClip>,
    /// Volume in `[0, 1]`.
    pub volume: f32,
    /// Muted channels keep their volume but produce silence.
    pub muted: bool,
    /// Whether playback wraps at the end of the clip.
    pub looping: bool,
    /// Playback position in seconds.
    pub position: f32,
    /// Transport state.
    pub state: PlaybackState,
}

impl Default for ChannelState {
    fn default() -> Self {
        Self {
            clip: None,
            volume: 1.0,
            muted: false,
            looping: false,
            position: 0.0,
            state: PlaybackState::Stopped,
        }
    }
}

impl ChannelState {
    /// Volume actually sent to the output, honouring mute.
    #[must_use]
    pub fn output_volume(&self) -> f32 {
        if self.muted {
            0.0
        } else {
            self.volume
        }
    }

    /// Sets the volume, clamped to `[0, 1]`.
    pub fn set_volume(&mut self, volume: f32) {
        self.volume = clamp01(volume);
    }

    /// Sets the position, clamped to the clip length.
    pub fn set_position(&mut self, seconds: f32) {
        let length = self.clip.as_ref().map_or(0.0, AudioClip::length);
        self.position = if seconds.is_nan() {
            0.0
        } else {
            seconds.clamp(0.0, length)
        };
    }

    /// Advances the position by `dt` seconds while playing.
    ///
    /// Looping channels wrap at the clip end; others stop and rewind.
    pub fn advance(&mut self, dt: f32) {
        if !self.state.is_playing() {
            return;
        }
        let length = self.clip.as_ref().map_or(0.0, AudioClip::length);
        self.position += dt.max(0.0);

        if self.position >= length {
            if self.looping && length > 0.0 {
                self.position %= length;
            } else {
                self.position = 0.0;
                self.state = PlaybackState::Stopped;
            }
        }
    }
}

/// A device or simulation capable of playing clips on independent channels.
pub trait PlaybackBackend {
    /// Short name for logging.
    fn name(&self) -> &'static str;

    /// Creates a channel.
    fn create_handle(&mut self) -> AudioResult<HandleId>;

    /// Stops and releases a channel. Returns false for stale handles.
    fn destroy_handle(&mut self, handle: HandleId) -> bool;

    /// Whether the handle refers to a live channel.
    fn is_valid(&self, handle: HandleId) -> bool;

    /// Number of live channels.
    fn handle_count(&self) -> usize;

    /// Assigns a clip. Playback is not started.
    fn set_clip(&mut self, handle: HandleId, clip: Option<AudioClip>);

    /// Assigned clip.
    fn clip(&self, handle: HandleId) -> Option<AudioClip>;

    /// Sets the channel volume.
    fn set_volume(&mut self, handle: HandleId, volume: f32);

    /// Channel volume.
    fn volume(&self, handle: HandleId) -> f32;

    /// Mutes or unmutes the channel.
    fn set_muted(&mut self, handle: HandleId, muted: bool);

    /// Whether the channel is muted.
    fn is_muted(&self, handle: HandleId) -> bool;

    /// Enables or disables looping.
    fn set_looping(&mut self, handle: HandleId, looping: bool);

    /// Whether the channel loops.
    fn is_looping(&self, handle: HandleId) -> bool;

    /// Seeks to `seconds`.
    fn set_position(&mut self, handle: HandleId, seconds: f32);

    /// Playback position in seconds.
    fn position(&self, handle: HandleId) -> f32;

    /// Starts playback from the current position.
    fn play(&mut self, handle: HandleId);

    /// Pauses playback.
    fn pause(&mut self, handle: HandleId);

    /// Resumes paused playback.
    fn resume(&mut self, handle: HandleId);

    /// Stops playback.
    fn stop(&mut self, handle: HandleId);

    /// Whether the channel is producing audio.
    fn is_playing(&self, handle: HandleId) -> bool;

    /// Advances backend bookkeeping by `dt` seconds.
    fn update(&mut self, _dt: f32) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_volume_respects_mute() {
        let mut channel = ChannelState::default();
        channel.set_volume(0.6);
        channel.muted = true;
        assert!(channel.output_volume().abs() < f32::EPSILON);
        assert!((channel.volume - 0.6).abs() < f32::EPSILON);
    }

    #[test]
    fn test_advance_wraps_when_looping() {
        let mut channel = ChannelState {
            clip: Some(AudioClip::silent("loop", 2.0)),
            looping: true,
            state: PlaybackState::Playing,
            ..ChannelState::default()
        };
        channel.advance(2.5);
        assert!((channel.position - 0.5).abs() < 0.001);
        assert!(channel.state.is_playing());
    }

    #[test]
    fn test_advance_stops_at_end() {
        let mut channel = ChannelState {
            clip: Some(AudioClip::silent("once", 1.0)),
            state: PlaybackState::Playing,
            ..ChannelState::default()
        };
        channel.advance(1.2);
        assert_eq!(channel.state, PlaybackState::Stopped);
        assert!(channel.position.abs() < f32::EPSILON);
    }

    #[test]
    fn test_set_position_clamped() {
        let mut channel = ChannelState {
            clip: Some(AudioClip::silent("clip", 3.0)),
            ..ChannelState::default()
        };
        channel.set_position(10.0);
        assert!((channel.position - 3.0).abs() < f32::EPSILON);
        channel.set_position(-1.0);
        assert!(channel.position.abs() < f32::EPSILON);
    }
}
